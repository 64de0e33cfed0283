//! Message framing
//!
//! Decides where one logical message ends inside a client's byte stream, and how
//! an outbound payload is laid out on the wire.
//!
//! `Framing::Burst` keeps the hub's historical behavior: a message is whatever
//! arrived before the socket ran dry. Rapid writes coalesce and a delayed write
//! can split. The handler drives burst boundaries itself, so the decoder only
//! accumulates in that mode. The other two modes give the decoder explicit
//! boundaries.

use crate::error::FramingError;

const LENGTH_PREFIX: usize = 4;

/// Framing policy shared by inbound decoding and outbound encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Burst,
    Delimited { delimiter: u8, max_frame_length: usize },
    LengthPrefixed { max_frame_length: usize },
}

impl Framing {
    pub fn is_burst(&self) -> bool {
        matches!(self, Framing::Burst)
    }

    /// Lay out a payload for sending to a client
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        match self {
            Framing::Burst => payload.to_vec(),
            Framing::Delimited { delimiter, .. } => {
                let mut out = Vec::with_capacity(payload.len() + 1);
                out.extend_from_slice(payload);
                out.push(*delimiter);
                out
            }
            Framing::LengthPrefixed { .. } => {
                let length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
                let mut out = Vec::with_capacity(payload.len() + LENGTH_PREFIX);
                out.extend_from_slice(&length.to_be_bytes());
                out.extend_from_slice(payload);
                out
            }
        }
    }
}

/// Accumulates inbound bytes for one connection and cuts them into frames
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Takes everything accumulated since the last emission.
    ///
    /// Used in burst mode once the socket has nothing more immediately available.
    pub fn take_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Next complete frame, if one is buffered.
    ///
    /// Always `Ok(None)` in burst mode.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        match self.framing {
            Framing::Burst => Ok(None),
            Framing::Delimited {
                delimiter,
                max_frame_length,
            } => self.next_delimited(delimiter, max_frame_length),
            Framing::LengthPrefixed { max_frame_length } => {
                self.next_length_prefixed(max_frame_length)
            }
        }
    }

    fn next_delimited(
        &mut self,
        delimiter: u8,
        max_frame_length: usize,
    ) -> Result<Option<Vec<u8>>, FramingError> {
        let Some(pos) = self.buffer.iter().position(|&b| b == delimiter) else {
            if self.buffer.len() > max_frame_length {
                return Err(FramingError::FrameTooLong {
                    length: self.buffer.len(),
                    max: max_frame_length,
                });
            }
            return Ok(None);
        };

        let mut frame: Vec<u8> = self.buffer.drain(..=pos).collect();
        frame.pop();
        if delimiter == b'\n' && frame.last() == Some(&b'\r') {
            frame.pop();
        }

        if frame.len() > max_frame_length {
            return Err(FramingError::FrameTooLong {
                length: frame.len(),
                max: max_frame_length,
            });
        }

        Ok(Some(frame))
    }

    fn next_length_prefixed(
        &mut self,
        max_frame_length: usize,
    ) -> Result<Option<Vec<u8>>, FramingError> {
        if self.buffer.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX]);
        let length = u32::from_be_bytes(prefix) as usize;

        if length > max_frame_length {
            return Err(FramingError::FrameTooLong {
                length,
                max: max_frame_length,
            });
        }

        if self.buffer.len() < LENGTH_PREFIX + length {
            return Ok(None);
        }

        let frame = self.buffer[LENGTH_PREFIX..LENGTH_PREFIX + length].to_vec();
        self.buffer.drain(..LENGTH_PREFIX + length);
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(max: usize) -> Framing {
        Framing::Delimited {
            delimiter: b'\n',
            max_frame_length: max,
        }
    }

    #[test]
    fn test_burst_never_yields_frames() {
        let mut decoder = FrameDecoder::new(Framing::Burst);
        decoder.push(b"hel");
        decoder.push(b"lo");
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.take_all(), b"hello".to_vec());
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_delimited_splits_and_keeps_partial() {
        let mut decoder = FrameDecoder::new(lines(64));
        decoder.push(b"a\nb\r\npart");

        assert_eq!(decoder.next_frame().unwrap(), Some(b"a".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), Some(b"b".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(b"ial\n");
        assert_eq!(decoder.next_frame().unwrap(), Some(b"partial".to_vec()));
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_delimited_rejects_runaway_frame() {
        let mut decoder = FrameDecoder::new(lines(4));
        decoder.push(b"toolong");
        assert_eq!(
            decoder.next_frame(),
            Err(FramingError::FrameTooLong { length: 7, max: 4 })
        );
    }

    #[test]
    fn test_length_prefixed_waits_for_full_frame() {
        let framing = Framing::LengthPrefixed {
            max_frame_length: 16,
        };
        let encoded = framing.encode(b"ping");
        assert_eq!(&encoded[..4], &[0, 0, 0, 4]);

        let mut decoder = FrameDecoder::new(framing);
        decoder.push(&encoded[..5]);
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.push(&encoded[5..]);
        assert_eq!(decoder.next_frame().unwrap(), Some(b"ping".to_vec()));
    }

    #[test]
    fn test_length_prefixed_rejects_oversize_declaration() {
        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed {
            max_frame_length: 8,
        });
        decoder.push(&100u32.to_be_bytes());
        assert_eq!(
            decoder.next_frame(),
            Err(FramingError::FrameTooLong {
                length: 100,
                max: 8
            })
        );
    }

    #[test]
    fn test_encode_appends_delimiter() {
        assert_eq!(lines(8).encode(b"hi"), b"hi\n".to_vec());
        assert_eq!(Framing::Burst.encode(b"hi"), b"hi".to_vec());
    }
}
