//! Known-good wire frames, byte for byte.

use bacstack_core::apdu::{ComplexAck, ConfirmedRequest, ErrorPdu, UnconfirmedRequest};
use bacstack_core::encoding::{buffer::EncodeBuffer, cursor::DecodeCursor};
use bacstack_core::npdu::Npdu;
use bacstack_core::services::i_am::IAm;
use bacstack_core::services::read_property::{ReadProperty, ReadPropertyAck};
use bacstack_core::services::who_is::WhoIs;
use bacstack_core::services::{ConfirmedService, UnconfirmedService};
use bacstack_core::types::{
    MaxApdu, ObjectId, ObjectType, PropertyId, PropertyRef, Segmentation, TaggedValue,
};

fn encode_into(buf: &mut [u8], f: impl FnOnce(&mut EncodeBuffer<'_>)) -> Vec<u8> {
    let mut writer = EncodeBuffer::new(buf);
    f(&mut writer);
    writer.payload().to_vec()
}

#[test]
fn global_who_is_frame() {
    let mut raw = [0u8; 16];
    let frame = encode_into(&mut raw, |buf| {
        Npdu::application(false).encode(buf).unwrap();
        UnconfirmedRequest {
            service: UnconfirmedService::WhoIs.to_u8(),
        }
        .encode(buf)
        .unwrap();
        WhoIs::global().encode(buf).unwrap();
    });
    assert_eq!(frame, vec![0x01, 0x00, 0x10, 0x08]);
}

#[test]
fn limited_who_is_frame() {
    let mut raw = [0u8; 16];
    let frame = encode_into(&mut raw, |buf| {
        WhoIs::limited(3, 3).encode(buf).unwrap();
    });
    assert_eq!(frame, vec![0x09, 0x03, 0x19, 0x03]);
}

#[test]
fn i_am_payload() {
    let mut raw = [0u8; 32];
    let frame = encode_into(&mut raw, |buf| {
        IAm {
            device_id: ObjectId::new(ObjectType::Device, 666),
            max_apdu: 1476,
            segmentation: Segmentation::Both,
            vendor_id: 15,
        }
        .encode(buf)
        .unwrap();
    });
    assert_eq!(
        frame,
        vec![
            0xC4, 0x02, 0x00, 0x02, 0x9A, // object id: device 666
            0x22, 0x05, 0xC4, // max-apdu 1476
            0x91, 0x00, // segmented-both
            0x21, 0x0F, // vendor 15
        ]
    );
}

#[test]
fn read_property_request_frame() {
    let mut raw = [0u8; 32];
    let frame = encode_into(&mut raw, |buf| {
        Npdu::application(true).encode(buf).unwrap();
        ConfirmedRequest::plain(
            1,
            ConfirmedService::ReadProperty.to_u8(),
            MaxApdu::UpTo1476,
        )
        .encode(buf)
        .unwrap();
        ReadProperty::new(
            ObjectId::new(ObjectType::AnalogInput, 0),
            PropertyId::PresentValue,
        )
        .encode(buf)
        .unwrap();
    });
    assert_eq!(
        frame,
        vec![
            0x01, 0x04, // npdu, expecting reply
            0x02, 0x05, 0x01, 0x0C, // confirmed request, invoke 1, read-property
            0x0C, 0x00, 0x00, 0x00, 0x00, // [0] analog-input 0
            0x19, 0x55, // [1] present-value
        ]
    );
}

#[test]
fn read_property_ack_frame() {
    let mut raw = [0u8; 64];
    let frame = encode_into(&mut raw, |buf| {
        ComplexAck::plain(1, ConfirmedService::ReadProperty.to_u8())
            .encode(buf)
            .unwrap();
        ReadPropertyAck {
            object_id: ObjectId::new(ObjectType::AnalogValue, 0),
            reference: PropertyRef::whole(PropertyId::PresentValue),
            values: vec![TaggedValue::Real(1234.5)],
        }
        .encode(buf)
        .unwrap();
    });
    assert_eq!(
        frame,
        vec![
            0x30, 0x01, 0x0C, // complex ack, invoke 1, read-property
            0x0C, 0x00, 0x80, 0x00, 0x00, // [0] analog-value 0
            0x19, 0x55, // [1] present-value
            0x3E, // open [3]
            0x44, 0x44, 0x9A, 0x50, 0x00, // real 1234.5
            0x3F, // close [3]
        ]
    );

    // And back again.
    let mut cur = DecodeCursor::new(&frame);
    let ack = ComplexAck::decode(&mut cur).unwrap();
    assert_eq!(ack.invoke_id, 1);
    let parsed = ReadPropertyAck::decode(&mut cur).unwrap();
    assert_eq!(parsed.values, vec![TaggedValue::Real(1234.5)]);
}

#[test]
fn error_pdu_frame() {
    let mut raw = [0u8; 16];
    let frame = encode_into(&mut raw, |buf| {
        ErrorPdu {
            invoke_id: 7,
            service: ConfirmedService::ReadProperty.to_u8(),
            class: bacstack_core::types::ErrorClass::Object,
            code: bacstack_core::types::ErrorCode::UnknownObject,
        }
        .encode(buf)
        .unwrap();
    });
    assert_eq!(frame, vec![0x50, 0x07, 0x0C, 0x91, 0x01, 0x91, 0x1F]);
}

#[test]
fn routed_npdu_roundtrips_with_source_and_destination() {
    use bacstack_core::npdu::RemoteStation;

    let npdu = Npdu {
        destination: Some(RemoteStation {
            network: 100,
            mac: vec![0x0A, 0x00, 0x00, 0x05, 0xBA, 0xC0],
        }),
        source: Some(RemoteStation {
            network: 2,
            mac: vec![0x07],
        }),
        hop_count: Some(254),
        expecting_reply: true,
        ..Npdu::default()
    };
    let mut raw = [0u8; 64];
    let frame = encode_into(&mut raw, |buf| {
        npdu.encode(buf).unwrap();
    });
    let mut cur = DecodeCursor::new(&frame);
    assert_eq!(Npdu::decode(&mut cur).unwrap(), npdu);
}
