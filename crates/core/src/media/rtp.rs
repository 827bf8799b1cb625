use crate::error::FramingError;
use crate::media::mjpeg::{FRAME_LENGTH_DIGITS, JPEG_EOI, MAX_FRAME_LENGTH};

/// One data-plane unit: a length prefix followed by the payload.
///
/// ```text
/// +---------------------+---------------------------------+
/// | length (5 ASCII dd) | payload (length bytes, ..FF D9) |
/// +---------------------+---------------------------------+
/// ```
///
/// The length prefix is authoritative. The end marker must be the last
/// bytes of the payload, and is checked as a confirmation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub payload: Vec<u8>,
}

impl RawPacket {
    /// Parse a complete unit, validating it against `marker`.
    pub fn parse(unit: &[u8], marker: &[u8]) -> Result<Self, FramingError> {
        if unit.len() < FRAME_LENGTH_DIGITS {
            return Err(FramingError::TruncatedHeader(FRAME_LENGTH_DIGITS));
        }
        let (header, payload) = unit.split_at(FRAME_LENGTH_DIGITS);
        let declared = parse_length(header)?;

        if payload.len() != declared {
            return Err(FramingError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }
        if !payload.ends_with(marker) {
            return Err(FramingError::MissingEndMarker(declared));
        }

        Ok(Self {
            payload: payload.to_vec(),
        })
    }

    /// Prefix `payload` with its zero-padded length, as the server sends it.
    ///
    /// Returns `None` when the payload does not fit the 5-digit prefix.
    pub fn encode(payload: &[u8]) -> Option<Vec<u8>> {
        if payload.len() > MAX_FRAME_LENGTH {
            return None;
        }
        let mut unit = format!("{:0width$}", payload.len(), width = FRAME_LENGTH_DIGITS).into_bytes();
        unit.extend_from_slice(payload);
        Some(unit)
    }
}

/// Decode the ASCII length prefix. Surrounding spaces are tolerated.
fn parse_length(header: &[u8]) -> Result<usize, FramingError> {
    std::str::from_utf8(header)
        .ok()
        .map(str::trim)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| FramingError::InvalidLengthHeader(header.to_vec()))
}

/// Reassembles units from an arbitrary split of datagrams.
///
/// Bytes accumulate until the declared length is reached. If the end
/// marker shows up at the tail of the buffer before that, the unit is
/// reported as a [`FramingError::LengthMismatch`]. Any framing error
/// discards the buffered bytes so the next unit starts clean.
#[derive(Debug)]
pub struct UnitAssembler {
    buffer: Vec<u8>,
    marker: Vec<u8>,
}

impl UnitAssembler {
    /// Assembler for MJPEG records (JPEG EOI end marker).
    pub fn new() -> Self {
        Self::with_marker(JPEG_EOI)
    }

    pub fn with_marker(marker: &[u8]) -> Self {
        Self {
            buffer: Vec::new(),
            marker: marker.to_vec(),
        }
    }

    /// Number of bytes buffered for the unit in progress.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the unit in progress.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed one datagram and return every unit it completed, in order.
    pub fn push(&mut self, datagram: &[u8]) -> Vec<Result<Vec<u8>, FramingError>> {
        self.buffer.extend_from_slice(datagram);
        let mut units = Vec::new();

        while !self.buffer.is_empty() {
            if self.buffer.len() < FRAME_LENGTH_DIGITS {
                if self.buffer.ends_with(&self.marker) {
                    units.push(Err(FramingError::TruncatedHeader(FRAME_LENGTH_DIGITS)));
                    self.buffer.clear();
                }
                break;
            }

            let declared = match parse_length(&self.buffer[..FRAME_LENGTH_DIGITS]) {
                Ok(declared) => declared,
                Err(e) => {
                    units.push(Err(e));
                    self.buffer.clear();
                    break;
                }
            };

            let total = FRAME_LENGTH_DIGITS + declared;
            if self.buffer.len() < total {
                if self.buffer.ends_with(&self.marker) {
                    units.push(Err(FramingError::LengthMismatch {
                        declared,
                        actual: self.buffer.len() - FRAME_LENGTH_DIGITS,
                    }));
                    self.buffer.clear();
                }
                break;
            }

            let unit: Vec<u8> = self.buffer.drain(..total).collect();
            match RawPacket::parse(&unit, &self.marker) {
                Ok(packet) => units.push(Ok(packet.payload)),
                Err(e) => {
                    units.push(Err(e));
                    self.buffer.clear();
                }
            }
        }

        units
    }
}

impl Default for UnitAssembler {
    fn default() -> Self {
        Self::new()
    }
}
