pub mod buffer;
pub mod cursor;
pub mod primitives;
pub mod tag;

pub use buffer::EncodeBuffer;
pub use cursor::DecodeCursor;
pub use tag::{ApplicationTag, Tag};
