//! Capture header.
//!
//! A capture opens with a 4-byte magic, a 4-byte version and three
//! length-prefixed strings (tag, game name, URL). The magic decides the
//! byte order of everything that follows.

use log::debug;

use crate::error::{DecodeError, Result};
use crate::reader::{ByteOrder, PrimitiveReader};

/// Magic number at the start of every capture.
pub const CAPTURE_MAGIC: u32 = 0x1DBF_348C;

/// The only supported format version.
pub const CAPTURE_VERSION: u32 = 10;

/// Decoded capture header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHeader {
    pub tag: String,
    pub game_name: String,
    pub url: String,
    pub byte_order: ByteOrder,
}

/// Reads the header and returns a reader positioned at the first token.
pub fn read_header(data: &[u8]) -> Result<(CaptureHeader, PrimitiveReader<'_>)> {
    let native = ByteOrder::native();
    let mut found = None;

    for order in [native, native.swapped()] {
        let mut reader = PrimitiveReader::new(data, order);
        let magic = reader.read_u32().map_err(|_| {
            DecodeError::InvalidFormat(format!(
                "{} bytes is too short for a capture header",
                data.len()
            ))
        })?;
        if magic == CAPTURE_MAGIC {
            return read_fields(reader);
        }
        found.get_or_insert(magic);
    }

    Err(DecodeError::InvalidFormat(format!(
        "bad magic {:#010x}, expected {CAPTURE_MAGIC:#010x}",
        found.unwrap_or_default()
    )))
}

fn read_fields(mut reader: PrimitiveReader<'_>) -> Result<(CaptureHeader, PrimitiveReader<'_>)> {
    let version = reader.read_u32().map_err(truncated_header)?;
    if version != CAPTURE_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: version,
            expected: CAPTURE_VERSION,
        });
    }

    let tag = reader.read_string().map_err(truncated_header)?;
    let game_name = reader.read_string().map_err(truncated_header)?;
    let url = reader.read_string().map_err(truncated_header)?;

    let header = CaptureHeader {
        tag,
        game_name,
        url,
        byte_order: reader.order(),
    };
    debug!(
        "Capture header: game '{}', tag '{}', {}",
        header.game_name,
        header.tag,
        header.byte_order.name()
    );
    Ok((header, reader))
}

fn truncated_header(err: DecodeError) -> DecodeError {
    DecodeError::InvalidFormat(format!("header cut short: {err}"))
}
