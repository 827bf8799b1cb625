//! MJPEG data-plane conventions.
//!
//! The streaming server reads an MJPEG file laid out as a sequence of
//!
//! ```text
//! <5 ASCII digits: frame length> <JPEG bytes: FF D8 ... FF D9>
//! ```
//!
//! and sends each record, split across as many datagrams as needed. The
//! JPEG End Of Image marker closes every record.

/// JPEG End Of Image marker (`FF D9`), the end-of-unit marker on the wire.
pub const JPEG_EOI: &[u8] = &[0xFF, 0xD9];

/// Length of the ASCII decimal length prefix.
pub const FRAME_LENGTH_DIGITS: usize = 5;

/// Largest payload the 5-digit prefix can describe.
pub const MAX_FRAME_LENGTH: usize = 99_999;
