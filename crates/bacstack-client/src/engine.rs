//! The confirmed-request engine.
//!
//! One engine instance serves both roles: as a client it correlates
//! confirmed requests with their answers by invoke id, retries on
//! timeout, and reassembles segmented responses; as a server it
//! dispatches inbound requests to registered handlers and segments
//! oversized answers. The engine owns all per-invoke-id state; completion
//! is handed to the waiting caller through a oneshot channel, segment
//! acks through an mpsc channel.

use crate::error::ClientError;
use bacstack_core::apdu::{
    AbortPdu, ComplexAck, ConfirmedRequest, ErrorPdu, PduType, RejectPdu, SegmentAck, SimpleAck,
    UnconfirmedRequest,
};
use bacstack_core::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use bacstack_core::npdu::Npdu;
use bacstack_core::services::{ConfirmedService, UnconfirmedService};
use bacstack_core::types::{AbortReason, ErrorClass, ErrorCode, RejectReason};
use bacstack_core::{DecodeError, EncodeError};
use bacstack_datalink::{Address, Transport};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Ceiling on a reassembled APDU; a runaway peer cannot balloon memory.
const MAX_REASSEMBLED_LEN: usize = 1 << 20;
/// Scratch size for encoding a payload that will be segmented.
const MAX_SEGMENTED_PAYLOAD: usize = 1 << 20;
/// A plain NPDU (version + control) ahead of the APDU.
const PLAIN_NPDU_LEN: usize = 2;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-attempt wait for an acknowledgement.
    pub timeout: Duration,
    /// Retransmissions after the first attempt.
    pub retries: u8,
    /// Proposed window size for segmented transfers.
    pub window_size: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            retries: 3,
            window_size: 10,
        }
    }
}

/// The successful outcome of a confirmed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// SimpleAck; write-style services.
    Simple,
    /// ComplexAck payload, reassembled if it arrived in segments.
    Complex(Vec<u8>),
}

/// What a server-side handler answers with.
pub enum Reply {
    /// SimpleAck.
    Simple,
    /// ComplexAck with this encoded service payload.
    Complex(Vec<u8>),
}

/// A handler-reported failure, mapped onto the wire as Error, Reject, or
/// Abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFault {
    Error { class: ErrorClass, code: ErrorCode },
    Reject { reason: RejectReason },
    Abort { reason: AbortReason },
}

impl ServiceFault {
    pub const fn error(class: ErrorClass, code: ErrorCode) -> Self {
        Self::Error { class, code }
    }

    /// The Reject a malformed payload maps to.
    pub const fn from_decode(err: DecodeError) -> Self {
        Self::Reject {
            reason: err.reject_reason(),
        }
    }
}

/// Reply to an unconfirmed request, unicast back to the sender.
pub struct UnconfirmedReply {
    pub service: UnconfirmedService,
    pub payload: Vec<u8>,
}

type ConfirmedHandler =
    Arc<dyn Fn(&Address, &[u8]) -> Result<Reply, ServiceFault> + Send + Sync>;
type UnconfirmedHandler = Arc<dyn Fn(&Address, &[u8]) -> Option<UnconfirmedReply> + Send + Sync>;

enum Settled {
    Done(ServiceOutcome),
    Failed(PendingFailure),
}

#[derive(Debug, Clone, Copy)]
enum PendingFailure {
    Service {
        service: u8,
        class: ErrorClass,
        code: ErrorCode,
    },
    Rejected {
        reason: RejectReason,
    },
    Aborted {
        reason: AbortReason,
        from_server: bool,
    },
    Closed,
}

impl PendingFailure {
    fn into_error(self) -> ClientError {
        match self {
            Self::Service {
                service,
                class,
                code,
            } => ClientError::ServiceError {
                service,
                class,
                code,
            },
            Self::Rejected { reason } => ClientError::Rejected { reason },
            Self::Aborted {
                reason,
                from_server,
            } => ClientError::Aborted {
                reason,
                from_server,
            },
            Self::Closed => ClientError::Closed,
        }
    }
}

struct Pending {
    outcome: Option<oneshot::Sender<Settled>>,
    segment_acks: Option<mpsc::UnboundedSender<SegmentAck>>,
}

/// Reassembly state for one segmented transfer, keyed by (remote,
/// invoke id).
struct Reassembly {
    segments: BTreeMap<u8, Vec<u8>>,
    /// Total segment count; fixed once the final segment arrives.
    expected: Option<u16>,
    service: u8,
    total_len: usize,
    /// Original header of segment 0 for a request; `None` for a
    /// segmented response.
    request_header: Option<ConfirmedRequest>,
}

struct EngineState {
    next_invoke_id: Mutex<u8>,
    /// In-flight state keyed by (remote endpoint, invoke id): at most one
    /// entry per pair at any instant.
    pending: Mutex<HashMap<(SocketAddr, u8), Pending>>,
    reassembly: Mutex<HashMap<(SocketAddr, u8), Reassembly>>,
    confirmed_handlers: Mutex<HashMap<u8, ConfirmedHandler>>,
    unconfirmed_handlers: Mutex<HashMap<u8, UnconfirmedHandler>>,
    closed: AtomicBool,
}

/// The protocol engine. Cheap to share: wrap it in an [`Arc`] and clone.
pub struct Engine<T: Transport> {
    transport: Arc<T>,
    state: Arc<EngineState>,
    config: EngineConfig,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            transport: Arc::new(transport),
            state: Arc::new(EngineState {
                next_invoke_id: Mutex::new(1),
                pending: Mutex::new(HashMap::new()),
                reassembly: Mutex::new(HashMap::new()),
                confirmed_handlers: Mutex::new(HashMap::new()),
                unconfirmed_handlers: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
            config,
            recv_task: Mutex::new(None),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers the handler for a confirmed service. The handler decodes
    /// the payload itself and answers with a [`Reply`] or a
    /// [`ServiceFault`]; a panic-free handler is the handler's own
    /// responsibility, decode failures map to Reject.
    pub fn on_confirmed<F>(&self, service: ConfirmedService, handler: F)
    where
        F: Fn(&Address, &[u8]) -> Result<Reply, ServiceFault> + Send + Sync + 'static,
    {
        self.state
            .confirmed_handlers
            .lock()
            .expect("handler lock")
            .insert(service.to_u8(), Arc::new(handler));
    }

    /// Registers the handler for an unconfirmed service.
    pub fn on_unconfirmed<F>(&self, service: UnconfirmedService, handler: F)
    where
        F: Fn(&Address, &[u8]) -> Option<UnconfirmedReply> + Send + Sync + 'static,
    {
        self.state
            .unconfirmed_handlers
            .lock()
            .expect("handler lock")
            .insert(service.to_u8(), Arc::new(handler));
    }

    /// Starts the receive worker. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.recv_task.lock().expect("recv task lock");
        if slot.is_some() {
            return;
        }
        let engine = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let mut rx = vec![0u8; engine.transport.max_frame_length()];
            loop {
                if engine.state.closed.load(Ordering::Acquire) {
                    break;
                }
                match engine.transport.recv(&mut rx).await {
                    Ok((n, source)) => {
                        let frame = rx[..n].to_vec();
                        engine.handle_frame(&frame, source).await;
                    }
                    Err(err) => {
                        if engine.state.closed.load(Ordering::Acquire) {
                            break;
                        }
                        log::debug!("receive worker: dropping frame: {err}");
                    }
                }
            }
        }));
    }

    /// Stops the receive worker; every in-flight wait observes
    /// [`ClientError::Closed`].
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::Release);
        if let Some(task) = self.recv_task.lock().expect("recv task lock").take() {
            task.abort();
        }
        let mut pending = self.state.pending.lock().expect("pending lock");
        for (_, entry) in pending.drain() {
            if let Some(tx) = entry.outcome {
                let _ = tx.send(Settled::Failed(PendingFailure::Closed));
            }
        }
    }

    fn allocate_invoke_id(&self, remote: SocketAddr) -> Result<u8, ClientError> {
        let pending = self.state.pending.lock().expect("pending lock");
        let mut counter = self.state.next_invoke_id.lock().expect("invoke id lock");
        for _ in 0..=u8::MAX {
            let candidate = *counter;
            *counter = counter.wrapping_add(1);
            if !pending.contains_key(&(remote, candidate)) {
                return Ok(candidate);
            }
        }
        Err(ClientError::InvokeIdsExhausted)
    }

    fn register_pending(
        &self,
        remote: SocketAddr,
        invoke_id: u8,
        with_segment_acks: bool,
    ) -> (
        oneshot::Receiver<Settled>,
        Option<mpsc::UnboundedReceiver<SegmentAck>>,
    ) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (ack_tx, ack_rx) = if with_segment_acks {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        self.state.pending.lock().expect("pending lock").insert(
            (remote, invoke_id),
            Pending {
                outcome: Some(outcome_tx),
                segment_acks: ack_tx,
            },
        );
        (outcome_rx, ack_rx)
    }

    fn discard_pending(&self, remote: SocketAddr, invoke_id: u8) {
        self.state
            .pending
            .lock()
            .expect("pending lock")
            .remove(&(remote, invoke_id));
    }

    /// Sends a confirmed request and waits for its acknowledgement.
    ///
    /// `encode` writes the service payload. When the payload does not fit
    /// the peer's max-APDU the buffer reports `NotEnoughBuffer` and the
    /// engine switches to segmented transmission.
    pub async fn confirmed_request<F>(
        &self,
        address: &Address,
        service: ConfirmedService,
        encode: F,
    ) -> Result<ServiceOutcome, ClientError>
    where
        F: Fn(&mut EncodeBuffer<'_>) -> Result<(), EncodeError>,
    {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        let invoke_id = self.allocate_invoke_id(address.endpoint())?;
        let header_len = self.transport.header_length();
        let max_apdu = self.transport.max_apdu();
        let limit = header_len + PLAIN_NPDU_LEN + max_apdu.octets();

        let mut raw = vec![0u8; self.transport.max_frame_length().max(limit)];
        let mut buf = EncodeBuffer::with_header(&mut raw, header_len).with_limit(limit);
        Npdu::application(true).encode(&mut buf)?;
        let header = ConfirmedRequest::plain(invoke_id, service.to_u8(), max_apdu);
        header.encode(&mut buf)?;

        match encode(&mut buf) {
            Ok(()) => {
                let frame_len = buf.frame().len();
                drop(buf);
                raw.truncate(frame_len);
                self.transact_single(address, invoke_id, raw).await
            }
            Err(EncodeError::NotEnoughBuffer) => {
                drop(buf);
                self.transact_segmented(address, invoke_id, service, header, encode)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Single-frame request: transmit, await, retransmit the identical
    /// bytes on each timeout.
    async fn transact_single(
        &self,
        address: &Address,
        invoke_id: u8,
        mut frame: Vec<u8>,
    ) -> Result<ServiceOutcome, ClientError> {
        let remote = address.endpoint();
        let (mut outcome_rx, _) = self.register_pending(remote, invoke_id, false);

        let attempts = u32::from(self.config.retries) + 1;
        for _ in 0..attempts {
            if let Err(e) = self.transport.send(&mut frame, address).await {
                self.discard_pending(remote, invoke_id);
                return Err(e.into());
            }
            match timeout(self.config.timeout, &mut outcome_rx).await {
                Ok(Ok(Settled::Done(outcome))) => return Ok(outcome),
                Ok(Ok(Settled::Failed(failure))) => return Err(failure.into_error()),
                Ok(Err(_)) => {
                    // Completion sender dropped; the engine is closing.
                    return Err(ClientError::Closed);
                }
                Err(_) => continue,
            }
        }
        self.discard_pending(remote, invoke_id);
        Err(ClientError::Timeout)
    }

    /// Segmented request: window of segments, Segment-Ack gating,
    /// negative-ack rewind.
    async fn transact_segmented<F>(
        &self,
        address: &Address,
        invoke_id: u8,
        service: ConfirmedService,
        header: ConfirmedRequest,
        encode: F,
    ) -> Result<ServiceOutcome, ClientError>
    where
        F: Fn(&mut EncodeBuffer<'_>) -> Result<(), EncodeError>,
    {
        // Re-encode the payload alone, unbounded.
        let mut scratch = vec![0u8; MAX_SEGMENTED_PAYLOAD];
        let mut pbuf = EncodeBuffer::new(&mut scratch);
        match encode(&mut pbuf) {
            Ok(()) => {}
            Err(EncodeError::NotEnoughBuffer) => return Err(ClientError::RequestTooLarge),
            Err(e) => return Err(e.into()),
        }
        let payload_len = pbuf.payload().len();
        drop(pbuf);
        scratch.truncate(payload_len);

        // Segment data budget: peer max-APDU minus the 6-byte segmented
        // request header.
        let segment_data_len = self.transport.max_apdu().octets().saturating_sub(6).max(1);
        let segment_count = payload_len.div_ceil(segment_data_len);
        if segment_count > usize::from(u8::MAX) + 1 {
            self.send_abort(address, invoke_id, AbortReason::ApduTooLong)
                .await?;
            return Err(ClientError::RequestTooLarge);
        }

        let remote = address.endpoint();
        let (mut outcome_rx, ack_rx) = self.register_pending(remote, invoke_id, true);
        let mut ack_rx = ack_rx.expect("segment ack channel");
        let window = self.config.window_size.max(1);

        let result = self
            .drive_segments(
                address,
                invoke_id,
                service.to_u8(),
                &scratch,
                segment_data_len,
                segment_count,
                window,
                header,
                &mut ack_rx,
            )
            .await;
        if let Err(e) = result {
            self.discard_pending(remote, invoke_id);
            return Err(e);
        }

        // Every segment is acknowledged; wait for the service answer.
        let wait = self.config.timeout * (u32::from(self.config.retries) + 1);
        match timeout(wait, &mut outcome_rx).await {
            Ok(Ok(Settled::Done(outcome))) => Ok(outcome),
            Ok(Ok(Settled::Failed(failure))) => Err(failure.into_error()),
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.discard_pending(remote, invoke_id);
                Err(ClientError::Timeout)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive_segments(
        &self,
        address: &Address,
        invoke_id: u8,
        service: u8,
        payload: &[u8],
        segment_data_len: usize,
        segment_count: usize,
        window: u8,
        header: ConfirmedRequest,
        ack_rx: &mut mpsc::UnboundedReceiver<SegmentAck>,
    ) -> Result<(), ClientError> {
        let header_len = self.transport.header_length();
        let mut next = 0usize;
        let mut retries_left = self.config.retries;

        while next < segment_count {
            let window_end = (next + usize::from(window)).min(segment_count);
            for seq in next..window_end {
                let start = seq * segment_data_len;
                let end = ((seq + 1) * segment_data_len).min(payload.len());
                let more_follows = seq + 1 < segment_count;
                let seg_header = header.segment(seq as u8, window, more_follows);

                let mut frame =
                    vec![0u8; header_len + PLAIN_NPDU_LEN + seg_header.len() + (end - start)];
                let frame_len = {
                    let mut buf = EncodeBuffer::with_header(&mut frame, header_len);
                    Npdu::application(true).encode(&mut buf)?;
                    seg_header.encode(&mut buf)?;
                    buf.push_slice(&payload[start..end])?;
                    buf.frame().len()
                };
                frame.truncate(frame_len);
                self.transport.send(&mut frame, address).await?;
            }

            let expected_seq = (window_end - 1) as u8;
            match timeout(self.config.timeout, ack_rx.recv()).await {
                Ok(Some(ack)) if ack.negative_ack => {
                    // Rewind to just past what the peer actually has.
                    next = usize::from(ack.sequence_number.wrapping_add(1)).min(segment_count);
                    if retries_left == 0 {
                        return Err(ClientError::Timeout);
                    }
                    retries_left -= 1;
                }
                Ok(Some(ack)) if ack.sequence_number == expected_seq => {
                    next = window_end;
                    retries_left = self.config.retries;
                }
                Ok(Some(_)) => {
                    // Ack for an earlier window boundary; keep waiting.
                }
                Ok(None) => return Err(ClientError::Closed),
                Err(_) => {
                    if retries_left == 0 {
                        return Err(ClientError::Timeout);
                    }
                    retries_left -= 1;
                    // Retransmit the window.
                }
            }
        }
        Ok(())
    }

    /// Sends an unconfirmed request.
    pub async fn unconfirmed<F>(
        &self,
        address: &Address,
        service: UnconfirmedService,
        encode: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(&mut EncodeBuffer<'_>) -> Result<(), EncodeError>,
    {
        let header_len = self.transport.header_length();
        let mut raw = vec![0u8; self.transport.max_frame_length()];
        let frame_len = {
            let mut buf = EncodeBuffer::with_header(&mut raw, header_len);
            Npdu::application(false).encode(&mut buf)?;
            UnconfirmedRequest {
                service: service.to_u8(),
            }
            .encode(&mut buf)?;
            encode(&mut buf)?;
            buf.frame().len()
        };
        raw.truncate(frame_len);
        self.transport.send(&mut raw, address).await?;
        Ok(())
    }

    /// Broadcasts an unconfirmed request on the local domain.
    pub async fn broadcast<F>(
        &self,
        service: UnconfirmedService,
        encode: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(&mut EncodeBuffer<'_>) -> Result<(), EncodeError>,
    {
        let target = self.transport.broadcast_address();
        self.unconfirmed(&target, service, encode).await
    }

    async fn send_plain<F>(&self, address: &Address, encode: F) -> Result<(), ClientError>
    where
        F: FnOnce(&mut EncodeBuffer<'_>) -> Result<(), EncodeError>,
    {
        let header_len = self.transport.header_length();
        let mut raw = vec![0u8; self.transport.max_frame_length()];
        let frame_len = {
            let mut buf = EncodeBuffer::with_header(&mut raw, header_len);
            Npdu::application(false).encode(&mut buf)?;
            encode(&mut buf)?;
            buf.frame().len()
        };
        raw.truncate(frame_len);
        self.transport.send(&mut raw, address).await?;
        Ok(())
    }

    async fn send_segment_ack(
        &self,
        address: &Address,
        ack: SegmentAck,
    ) -> Result<(), ClientError> {
        self.send_plain(address, |buf| ack.encode(buf)).await
    }

    pub(crate) async fn send_abort(
        &self,
        address: &Address,
        invoke_id: u8,
        reason: AbortReason,
    ) -> Result<(), ClientError> {
        self.send_plain(address, |buf| {
            AbortPdu {
                from_server: false,
                invoke_id,
                reason,
            }
            .encode(buf)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Inbound path. Runs on the receive worker; must never return an
    // error to it.
    // ------------------------------------------------------------------

    async fn handle_frame(self: &Arc<Self>, frame: &[u8], source: Address) {
        let mut cur = DecodeCursor::new(frame);
        let npdu = match Npdu::decode(&mut cur) {
            Ok(npdu) => npdu,
            Err(err) => {
                log::debug!("dropping frame from {source}: bad network header ({err})");
                return;
            }
        };
        if npdu.is_network_message() {
            log::trace!("ignoring network-layer message from {source}");
            return;
        }
        let source = match npdu.source {
            Some(station) => source.with_routed_source(station),
            None => source,
        };
        let apdu = cur.rest();
        self.handle_apdu(apdu, &source).await;
    }

    async fn handle_apdu(self: &Arc<Self>, apdu: &[u8], source: &Address) {
        let Some(first) = apdu.first().copied() else {
            return;
        };
        let mut cur = DecodeCursor::new(apdu);
        let result = match PduType::of_first_byte(first) {
            Some(PduType::ConfirmedRequest) => self.on_confirmed_request(&mut cur, source).await,
            Some(PduType::UnconfirmedRequest) => {
                self.on_unconfirmed_request(&mut cur, source).await
            }
            Some(PduType::SimpleAck) => self.on_simple_ack(&mut cur, source),
            Some(PduType::ComplexAck) => self.on_complex_ack(&mut cur, source).await,
            Some(PduType::SegmentAck) => self.on_segment_ack(&mut cur, source),
            Some(PduType::Error) => self.on_error(&mut cur, source),
            Some(PduType::Reject) => self.on_reject(&mut cur, source),
            Some(PduType::Abort) => self.on_abort(&mut cur, source),
            None => Err(DecodeError::InvalidValue),
        };
        if let Err(err) = result {
            log::debug!("dropping apdu from {source}: {err}");
        }
    }

    async fn on_confirmed_request(
        self: &Arc<Self>,
        cur: &mut DecodeCursor<'_>,
        source: &Address,
    ) -> Result<(), DecodeError> {
        let header = ConfirmedRequest::decode(cur)?;
        let payload = cur.rest().to_vec();

        if header.segmented {
            self.on_request_segment(header, payload, source).await;
            return Ok(());
        }
        self.dispatch_confirmed(header, payload, source.clone());
        Ok(())
    }

    /// Runs the registered handler on its own task so the receive worker
    /// never blocks behind storage locks or a segmented reply.
    fn dispatch_confirmed(self: &Arc<Self>, header: ConfirmedRequest, payload: Vec<u8>, source: Address) {
        let handler = self
            .state
            .confirmed_handlers
            .lock()
            .expect("handler lock")
            .get(&header.service)
            .cloned();
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let verdict = match handler {
                None => Err(ServiceFault::Reject {
                    reason: RejectReason::UnrecognizedService,
                }),
                // A handler that panics still owes the peer an answer.
                Some(handler) => {
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handler(&source, &payload)
                    })) {
                        Ok(verdict) => verdict,
                        Err(_) => {
                            log::error!("handler for service {} panicked", header.service);
                            Err(ServiceFault::Abort {
                                reason: AbortReason::Other,
                            })
                        }
                    }
                }
            };
            if let Err(err) = engine.send_verdict(&source, &header, verdict).await {
                log::warn!("failed to answer {source}: {err}");
            }
        });
    }

    async fn send_verdict(
        self: &Arc<Self>,
        source: &Address,
        header: &ConfirmedRequest,
        verdict: Result<Reply, ServiceFault>,
    ) -> Result<(), ClientError> {
        match verdict {
            Ok(Reply::Simple) => {
                self.send_plain(source, |buf| {
                    SimpleAck {
                        invoke_id: header.invoke_id,
                        service: header.service,
                    }
                    .encode(buf)
                })
                .await
            }
            Ok(Reply::Complex(payload)) => {
                self.send_complex_ack(source, header, &payload).await
            }
            Err(ServiceFault::Error { class, code }) => {
                self.send_plain(source, |buf| {
                    ErrorPdu {
                        invoke_id: header.invoke_id,
                        service: header.service,
                        class,
                        code,
                    }
                    .encode(buf)
                })
                .await
            }
            Err(ServiceFault::Reject { reason }) => {
                self.send_plain(source, |buf| {
                    RejectPdu {
                        invoke_id: header.invoke_id,
                        reason,
                    }
                    .encode(buf)
                })
                .await
            }
            Err(ServiceFault::Abort { reason }) => {
                self.send_plain(source, |buf| {
                    AbortPdu {
                        from_server: true,
                        invoke_id: header.invoke_id,
                        reason,
                    }
                    .encode(buf)
                })
                .await
            }
        }
    }

    /// Answers with a ComplexAck, segmenting when the payload exceeds the
    /// requester's max-APDU.
    async fn send_complex_ack(
        self: &Arc<Self>,
        source: &Address,
        request: &ConfirmedRequest,
        payload: &[u8],
    ) -> Result<(), ClientError> {
        let ack = ComplexAck::plain(request.invoke_id, request.service);
        let budget = request.max_apdu.octets().saturating_sub(ack.len());
        if payload.len() <= budget {
            return self
                .send_plain(source, |buf| {
                    ack.encode(buf)?;
                    buf.push_slice(payload)
                })
                .await;
        }

        if !request.segmented_response_accepted {
            return self
                .send_plain(source, |buf| {
                    AbortPdu {
                        from_server: true,
                        invoke_id: request.invoke_id,
                        reason: AbortReason::SegmentationNotSupported,
                    }
                    .encode(buf)
                })
                .await;
        }

        // Segmented answer: the segment acks from the requester route to
        // us through the pending map.
        let segment_data_len = request.max_apdu.octets().saturating_sub(5).max(1);
        let segment_count = payload.len().div_ceil(segment_data_len);
        if segment_count > usize::from(u8::MAX) + 1 {
            return self
                .send_plain(source, |buf| {
                    AbortPdu {
                        from_server: true,
                        invoke_id: request.invoke_id,
                        reason: AbortReason::ApduTooLong,
                    }
                    .encode(buf)
                })
                .await;
        }

        let (_outcome_rx, ack_rx) =
            self.register_pending(source.endpoint(), request.invoke_id, true);
        let mut ack_rx = ack_rx.expect("segment ack channel");
        let window = self.config.window_size.max(1);
        let header_len = self.transport.header_length();

        let mut next = 0usize;
        let mut retries_left = self.config.retries;
        let result = loop {
            if next >= segment_count {
                break Ok(());
            }
            let window_end = (next + usize::from(window)).min(segment_count);
            for seq in next..window_end {
                let start = seq * segment_data_len;
                let end = ((seq + 1) * segment_data_len).min(payload.len());
                let more_follows = seq + 1 < segment_count;
                let seg = ack.segment(seq as u8, window, more_follows);
                let mut frame =
                    vec![0u8; header_len + PLAIN_NPDU_LEN + seg.len() + (end - start)];
                let frame_len = {
                    let mut buf = EncodeBuffer::with_header(&mut frame, header_len);
                    Npdu::application(false).encode(&mut buf)?;
                    seg.encode(&mut buf)?;
                    buf.push_slice(&payload[start..end])?;
                    buf.frame().len()
                };
                frame.truncate(frame_len);
                self.transport.send(&mut frame, source).await?;
            }

            let expected_seq = (window_end - 1) as u8;
            match timeout(self.config.timeout, ack_rx.recv()).await {
                Ok(Some(ack)) if ack.negative_ack => {
                    next = usize::from(ack.sequence_number.wrapping_add(1)).min(segment_count);
                    if retries_left == 0 {
                        break Err(ClientError::Timeout);
                    }
                    retries_left -= 1;
                }
                Ok(Some(ack)) if ack.sequence_number == expected_seq => {
                    next = window_end;
                    retries_left = self.config.retries;
                }
                Ok(Some(_)) => {}
                Ok(None) => break Err(ClientError::Closed),
                Err(_) => {
                    if retries_left == 0 {
                        break Err(ClientError::Timeout);
                    }
                    retries_left -= 1;
                }
            }
        };
        self.discard_pending(source.endpoint(), request.invoke_id);
        result
    }

    async fn on_unconfirmed_request(
        self: &Arc<Self>,
        cur: &mut DecodeCursor<'_>,
        source: &Address,
    ) -> Result<(), DecodeError> {
        let header = UnconfirmedRequest::decode(cur)?;
        let payload = cur.rest();
        let handler = self
            .state
            .unconfirmed_handlers
            .lock()
            .expect("handler lock")
            .get(&header.service)
            .cloned();
        let Some(handler) = handler else {
            log::trace!("no handler for unconfirmed service {}", header.service);
            return Ok(());
        };
        if let Some(reply) = handler(source, payload) {
            let result = self
                .unconfirmed(source, reply.service, |buf| buf.push_slice(&reply.payload))
                .await;
            if let Err(err) = result {
                log::warn!("failed to answer unconfirmed request from {source}: {err}");
            }
        }
        Ok(())
    }

    fn settle(&self, invoke_id: u8, remote: SocketAddr, settled: Settled) {
        let mut pending = self.state.pending.lock().expect("pending lock");
        let Some(mut entry) = pending.remove(&(remote, invoke_id)) else {
            log::trace!("unmatched answer for invoke id {invoke_id}");
            return;
        };
        if let Some(tx) = entry.outcome.take() {
            let _ = tx.send(settled);
        }
    }

    fn on_simple_ack(&self, cur: &mut DecodeCursor<'_>, source: &Address) -> Result<(), DecodeError> {
        let ack = SimpleAck::decode(cur)?;
        self.settle(
            ack.invoke_id,
            source.endpoint(),
            Settled::Done(ServiceOutcome::Simple),
        );
        Ok(())
    }

    async fn on_complex_ack(
        self: &Arc<Self>,
        cur: &mut DecodeCursor<'_>,
        source: &Address,
    ) -> Result<(), DecodeError> {
        let ack = ComplexAck::decode(cur)?;
        let payload = cur.rest();
        if ack.segmented {
            self.on_response_segment(ack, payload.to_vec(), source).await;
            return Ok(());
        }
        self.settle(
            ack.invoke_id,
            source.endpoint(),
            Settled::Done(ServiceOutcome::Complex(payload.to_vec())),
        );
        Ok(())
    }

    fn on_segment_ack(&self, cur: &mut DecodeCursor<'_>, source: &Address) -> Result<(), DecodeError> {
        let ack = SegmentAck::decode(cur)?;
        let pending = self.state.pending.lock().expect("pending lock");
        if let Some(entry) = pending.get(&(source.endpoint(), ack.invoke_id)) {
            if let Some(tx) = &entry.segment_acks {
                let _ = tx.send(ack);
            }
        }
        Ok(())
    }

    fn on_error(&self, cur: &mut DecodeCursor<'_>, source: &Address) -> Result<(), DecodeError> {
        let pdu = ErrorPdu::decode(cur)?;
        self.settle(
            pdu.invoke_id,
            source.endpoint(),
            Settled::Failed(PendingFailure::Service {
                service: pdu.service,
                class: pdu.class,
                code: pdu.code,
            }),
        );
        Ok(())
    }

    fn on_reject(&self, cur: &mut DecodeCursor<'_>, source: &Address) -> Result<(), DecodeError> {
        let pdu = RejectPdu::decode(cur)?;
        self.settle(
            pdu.invoke_id,
            source.endpoint(),
            Settled::Failed(PendingFailure::Rejected { reason: pdu.reason }),
        );
        Ok(())
    }

    fn on_abort(&self, cur: &mut DecodeCursor<'_>, source: &Address) -> Result<(), DecodeError> {
        let pdu = AbortPdu::decode(cur)?;
        self.settle(
            pdu.invoke_id,
            source.endpoint(),
            Settled::Failed(PendingFailure::Aborted {
                reason: pdu.reason,
                from_server: pdu.from_server,
            }),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Segment reassembly, shared by inbound requests (server role) and
    // inbound responses (client role).
    // ------------------------------------------------------------------

    async fn on_request_segment(
        self: &Arc<Self>,
        header: ConfirmedRequest,
        payload: Vec<u8>,
        source: &Address,
    ) {
        let sequence = header.sequence_number.unwrap_or(0);
        let window = header.window_size.unwrap_or(1).max(1);
        let assembled = self.absorb_segment(
            source,
            header.invoke_id,
            header.service,
            sequence,
            header.more_follows,
            payload,
            Some(header),
        );
        self.ack_and_finish(source, header.invoke_id, sequence, header.more_follows, window, true, assembled)
            .await;
    }

    async fn on_response_segment(
        self: &Arc<Self>,
        ack: ComplexAck,
        payload: Vec<u8>,
        source: &Address,
    ) {
        let sequence = ack.sequence_number.unwrap_or(0);
        let window = ack.window_size.unwrap_or(1).max(1);
        let assembled = self.absorb_segment(
            source,
            ack.invoke_id,
            ack.service,
            sequence,
            ack.more_follows,
            payload,
            None,
        );
        self.ack_and_finish(source, ack.invoke_id, sequence, ack.more_follows, window, false, assembled)
            .await;
    }

    /// Stores one segment; returns the synthesized whole APDU once every
    /// segment is present.
    #[allow(clippy::too_many_arguments)]
    fn absorb_segment(
        &self,
        source: &Address,
        invoke_id: u8,
        service: u8,
        sequence: u8,
        more_follows: bool,
        payload: Vec<u8>,
        request_header: Option<ConfirmedRequest>,
    ) -> Option<Vec<u8>> {
        let key = (source.endpoint(), invoke_id);
        let mut map = self.state.reassembly.lock().expect("reassembly lock");
        let entry = map.entry(key).or_insert_with(|| Reassembly {
            segments: BTreeMap::new(),
            expected: None,
            service,
            total_len: 0,
            request_header,
        });

        if entry.total_len.saturating_add(payload.len()) > MAX_REASSEMBLED_LEN {
            log::warn!("reassembly for invoke id {invoke_id} exceeded the size cap; dropping");
            map.remove(&key);
            return None;
        }
        entry.total_len += payload.len();
        entry.segments.insert(sequence, payload);
        if !more_follows {
            entry.expected = Some(u16::from(sequence) + 1);
        }

        let Some(expected) = entry.expected else {
            return None;
        };
        if entry.segments.len() < usize::from(expected) {
            return None;
        }

        // Complete: synthesize a non-segmented APDU and replay it.
        let entry = map.remove(&key).expect("reassembly entry");
        let mut whole = Vec::with_capacity(entry.total_len + 8);
        let mut head = [0u8; 8];
        let mut buf = EncodeBuffer::new(&mut head);
        let encoded = match entry.request_header {
            Some(request) => ConfirmedRequest {
                segmented: false,
                more_follows: false,
                sequence_number: None,
                window_size: None,
                ..request
            }
            .encode(&mut buf),
            None => ComplexAck::plain(invoke_id, entry.service).encode(&mut buf),
        };
        if encoded.is_err() {
            return None;
        }
        whole.extend_from_slice(buf.payload());
        for (_seq, data) in entry.segments {
            whole.extend_from_slice(&data);
        }
        Some(whole)
    }

    #[allow(clippy::too_many_arguments)]
    async fn ack_and_finish(
        self: &Arc<Self>,
        source: &Address,
        invoke_id: u8,
        sequence: u8,
        more_follows: bool,
        window: u8,
        acting_as_server: bool,
        assembled: Option<Vec<u8>>,
    ) {
        // Ack on window boundaries and on the final segment.
        if sequence % window == 0 || !more_follows {
            let ack = SegmentAck {
                negative_ack: false,
                from_server: acting_as_server,
                invoke_id,
                sequence_number: sequence,
                actual_window_size: window,
            };
            if let Err(err) = self.send_segment_ack(source, ack).await {
                log::warn!("failed to send segment ack to {source}: {err}");
            }
        }
        if let Some(whole) = assembled {
            Box::pin(self.handle_apdu(&whole, source)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, EngineConfig, Reply, ServiceFault, ServiceOutcome};
    use bacstack_core::encoding::cursor::DecodeCursor;
    use bacstack_core::services::read_property::{ReadProperty, ReadPropertyAck};
    use bacstack_core::services::ConfirmedService;
    use bacstack_core::types::{ErrorClass, ErrorCode, ObjectId, ObjectType, PropertyId, TaggedValue};
    use bacstack_datalink::{Address, Transport, UdpTransport};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    async fn engine_pair() -> (
        std::sync::Arc<Engine<UdpTransport>>,
        std::sync::Arc<Engine<UdpTransport>>,
        Address,
    ) {
        let client = Engine::new(
            UdpTransport::bind_ephemeral().await.unwrap(),
            EngineConfig {
                timeout: Duration::from_millis(300),
                retries: 1,
                window_size: 4,
            },
        );
        let server = Engine::new(
            UdpTransport::bind_ephemeral().await.unwrap(),
            EngineConfig::default(),
        );
        let port = server.transport().local_addr().unwrap().port();
        let addr = Address::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
        client.start();
        server.start();
        (client, server, addr)
    }

    #[tokio::test]
    async fn confirmed_request_complex_ack_roundtrip() {
        let (client, server, addr) = engine_pair().await;
        server.on_confirmed(ConfirmedService::ReadProperty, |_source, payload| {
            let mut cur = DecodeCursor::new(payload);
            let request = ReadProperty::decode(&mut cur).map_err(ServiceFault::from_decode)?;
            let ack = ReadPropertyAck {
                object_id: request.object_id,
                reference: request.reference,
                values: vec![TaggedValue::Real(42.5)],
            };
            let mut raw = vec![0u8; 128];
            let mut buf = bacstack_core::encoding::buffer::EncodeBuffer::new(&mut raw);
            ack.encode(&mut buf)
                .map_err(|_| ServiceFault::Abort {
                    reason: bacstack_core::types::AbortReason::Other,
                })?;
            Ok(Reply::Complex(buf.payload().to_vec()))
        });

        let request = ReadProperty::new(
            ObjectId::new(ObjectType::AnalogValue, 0),
            PropertyId::PresentValue,
        );
        let outcome = client
            .confirmed_request(&addr, ConfirmedService::ReadProperty, |buf| {
                request.encode(buf)
            })
            .await
            .unwrap();

        let ServiceOutcome::Complex(payload) = outcome else {
            panic!("expected a complex ack");
        };
        let mut cur = DecodeCursor::new(&payload);
        let ack = ReadPropertyAck::decode(&mut cur).unwrap();
        assert_eq!(ack.values, vec![TaggedValue::Real(42.5)]);
        client.close();
        server.close();
    }

    #[tokio::test]
    async fn unrecognized_service_is_rejected() {
        let (client, server, addr) = engine_pair().await;
        let request = ReadProperty::new(
            ObjectId::new(ObjectType::AnalogValue, 0),
            PropertyId::PresentValue,
        );
        let err = client
            .confirmed_request(&addr, ConfirmedService::ReadProperty, |buf| {
                request.encode(buf)
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ClientError::Rejected {
                reason: bacstack_core::types::RejectReason::UnrecognizedService
            }
        ));
        client.close();
        server.close();
    }

    #[tokio::test]
    async fn handler_error_surfaces_as_service_error() {
        let (client, server, addr) = engine_pair().await;
        server.on_confirmed(ConfirmedService::ReadProperty, |_source, _payload| {
            Err(ServiceFault::error(
                ErrorClass::Object,
                ErrorCode::UnknownObject,
            ))
        });
        let request = ReadProperty::new(
            ObjectId::new(ObjectType::AnalogValue, 9),
            PropertyId::PresentValue,
        );
        let err = client
            .confirmed_request(&addr, ConfirmedService::ReadProperty, |buf| {
                request.encode(buf)
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ClientError::ServiceError {
                class: ErrorClass::Object,
                code: ErrorCode::UnknownObject,
                ..
            }
        ));
        client.close();
        server.close();
    }

    #[tokio::test]
    async fn unanswered_request_times_out_after_retries() {
        let client = Engine::new(
            UdpTransport::bind_ephemeral().await.unwrap(),
            EngineConfig {
                timeout: Duration::from_millis(100),
                retries: 2,
                window_size: 4,
            },
        );
        client.start();
        // A bound socket that never answers.
        let silent = UdpTransport::bind_ephemeral().await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let addr = Address::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));

        let request = ReadProperty::new(
            ObjectId::new(ObjectType::AnalogValue, 0),
            PropertyId::PresentValue,
        );
        let started = std::time::Instant::now();
        let err = client
            .confirmed_request(&addr, ConfirmedService::ReadProperty, |buf| {
                request.encode(buf)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::ClientError::Timeout));
        // Three attempts of 100 ms each.
        assert!(started.elapsed() >= Duration::from_millis(280));
        client.close();
    }

    #[tokio::test]
    async fn segmented_complex_ack_reassembles() {
        let (client, server, addr) = engine_pair().await;
        // An answer far larger than any max-APDU code: forces the server
        // engine to segment and the client engine to reassemble.
        let big: Vec<u8> = (0..6000u32).map(|i| (i % 251) as u8).collect();
        let expected = big.clone();
        server.on_confirmed(ConfirmedService::ReadPropertyMultiple, move |_s, _p| {
            Ok(Reply::Complex(big.clone()))
        });

        let request = ReadProperty::new(
            ObjectId::new(ObjectType::Device, 1),
            PropertyId::ObjectList,
        );
        let outcome = client
            .confirmed_request(&addr, ConfirmedService::ReadPropertyMultiple, |buf| {
                request.encode(buf)
            })
            .await
            .unwrap();
        assert_eq!(outcome, ServiceOutcome::Complex(expected));
        client.close();
        server.close();
    }
}
