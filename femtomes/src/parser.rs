//! Byte-at-a-time decoder for the Femtomes binary frame
//!
//! A frame is laid out as:
//! - 3 bytes: preamble `0xAA 0x44 0xB5`
//! - 1 byte: header length, preamble included
//! - remaining header bytes (message id, message length, time tags, ...)
//! - N bytes: payload, N given by the header's message length
//! - 4 bytes: CRC-32 (little-endian) over the header, then the payload

use log::debug;

pub(crate) mod checksum;
pub mod rtcm;

use crate::{
    constants::{
        FEMTO_CRC_LEN, FEMTO_HEADER_LEN, FEMTO_HEADER_LEN_OFFSET, FEMTO_MAX_PAYLOAD_LEN,
        FEMTO_MIN_HEADER_LEN, FEMTO_MSG_ID_OFFSET, FEMTO_MSG_LEN_OFFSET, FEMTO_MSG_TYPE_OFFSET,
        FEMTO_PORT_ADDR_OFFSET, FEMTO_PREAMBLE, FEMTO_PREAMBLE_1, FEMTO_PREAMBLE_2,
        FEMTO_PREAMBLE_3, FEMTO_PREAMBLE_LEN, FEMTO_SEQUENCE_OFFSET, FEMTO_TOW_OFFSET,
        FEMTO_WEEK_OFFSET,
    },
    error::{Error, Result},
};
use checksum::{frame_crc, FrameCrc};

pub use checksum::calculate_block_crc32;

/// Position of the decoder inside the framing protocol
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Waiting for `0xAA`
    #[default]
    Preamble1,
    /// Waiting for `0x44`
    Preamble2,
    /// Waiting for `0xB5`
    Preamble3,
    /// Header length byte
    HeaderLength,
    /// Remaining header bytes
    HeaderData,
    /// Payload bytes
    Data,
    /// CRC byte 0, least significant
    Crc1,
    /// CRC byte 1
    Crc2,
    /// CRC byte 2
    Crc3,
    /// CRC byte 3, completes the frame
    Crc4,
}

/// Decoded view of the standard binary header
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub header_len: u8,
    pub message_id: u16,
    pub message_type: u8,
    pub port_addr: u8,
    pub message_len: u16,
    pub sequence: u16,
    /// GPS week number
    pub week: u16,
    /// GPS time of week, milliseconds
    pub tow_ms: u32,
}

impl FrameHeader {
    /// Parses the header bytes. Fields lying past the end of `bytes` read as zero,
    /// short headers are legal on the wire.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let u8_at = |offset: usize| bytes.get(offset).copied().unwrap_or(0);
        let u16_at = |offset: usize| u16::from_le_bytes([u8_at(offset), u8_at(offset + 1)]);
        let u32_at = |offset: usize| {
            u32::from_le_bytes([
                u8_at(offset),
                u8_at(offset + 1),
                u8_at(offset + 2),
                u8_at(offset + 3),
            ])
        };
        Self {
            header_len: u8_at(FEMTO_HEADER_LEN_OFFSET),
            message_id: u16_at(FEMTO_MSG_ID_OFFSET),
            message_type: u8_at(FEMTO_MSG_TYPE_OFFSET),
            port_addr: u8_at(FEMTO_PORT_ADDR_OFFSET),
            message_len: u16_at(FEMTO_MSG_LEN_OFFSET),
            sequence: u16_at(FEMTO_SEQUENCE_OFFSET),
            week: u16_at(FEMTO_WEEK_OFFSET),
            tow_ms: u32_at(FEMTO_TOW_OFFSET),
        }
    }
}

/// A frame being assembled by [`FrameDecoder`]. Its content is only meaningful right
/// after the decoder reported it complete.
#[derive(Debug, Clone)]
pub struct Frame {
    header: [u8; FEMTO_HEADER_LEN],
    payload: [u8; FEMTO_MAX_PAYLOAD_LEN],
    crc: u32,
    /// Header + payload bytes stored so far
    read: usize,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            header: [0; FEMTO_HEADER_LEN],
            payload: [0; FEMTO_MAX_PAYLOAD_LEN],
            crc: 0,
            read: 0,
        }
    }
}

impl Frame {
    pub fn header_len(&self) -> usize {
        usize::from(self.header[FEMTO_HEADER_LEN_OFFSET])
    }

    pub fn message_len(&self) -> usize {
        usize::from(u16::from_le_bytes([
            self.header[FEMTO_MSG_LEN_OFFSET],
            self.header[FEMTO_MSG_LEN_OFFSET + 1],
        ]))
    }

    pub fn message_id(&self) -> u16 {
        u16::from_le_bytes([
            self.header[FEMTO_MSG_ID_OFFSET],
            self.header[FEMTO_MSG_ID_OFFSET + 1],
        ])
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader::from_bytes(self.header_bytes())
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.header[..self.header_len().min(FEMTO_HEADER_LEN)]
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.message_len().min(FEMTO_MAX_PAYLOAD_LEN)]
    }

    /// Checksum received in the trailer
    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn read(&self) -> usize {
        self.read
    }

    fn crc_matches(&self) -> bool {
        frame_crc(self.header_bytes(), self.payload()) == self.crc
    }
}

/// Framing state machine. Feed it one byte at a time with [`FrameDecoder::consume_byte`];
/// it never allocates and never blocks, so bytes may come from reads of any size.
///
/// Frames with a bad checksum are dropped silently and counted in
/// [`FrameDecoder::crc_failures`].
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    state: DecodeState,
    frame: Frame,
    crc_failures: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Last frame assembled. Valid until the next byte is consumed.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Number of complete frames dropped because their checksum did not match
    pub fn crc_failures(&self) -> u64 {
        self.crc_failures
    }

    /// Drops any partial frame and waits for the next preamble.
    pub fn reset(&mut self) {
        self.state = DecodeState::Preamble1;
        self.frame.read = 0;
    }

    /// Feeds one byte. Returns the number of header + payload bytes of the frame when
    /// this byte completed a frame whose checksum matches.
    pub fn consume_byte(&mut self, byte: u8) -> Option<usize> {
        let (next, complete) = self.transition(byte);
        self.state = next;
        complete
    }

    fn transition(&mut self, byte: u8) -> (DecodeState, Option<usize>) {
        use DecodeState::*;

        match self.state {
            Preamble1 => (Self::restart(byte), None),
            Preamble2 => match byte {
                FEMTO_PREAMBLE_2 => (Preamble3, None),
                _ => (Self::restart(byte), None),
            },
            Preamble3 => match byte {
                FEMTO_PREAMBLE_3 => (HeaderLength, None),
                _ => (Self::restart(byte), None),
            },
            HeaderLength => {
                if usize::from(byte) < FEMTO_MIN_HEADER_LEN {
                    debug!("header length {byte} too short, dropping frame");
                    return (Preamble1, None);
                }
                self.frame.header[..FEMTO_PREAMBLE_LEN].copy_from_slice(&FEMTO_PREAMBLE);
                self.frame.header[FEMTO_HEADER_LEN_OFFSET] = byte;
                self.frame.read = FEMTO_PREAMBLE_LEN + 1;
                (HeaderData, None)
            },
            HeaderData => {
                if self.frame.read >= FEMTO_HEADER_LEN {
                    debug!(
                        "header length {} overflows the header buffer",
                        self.frame.header_len()
                    );
                    return (Preamble1, None);
                }
                self.frame.header[self.frame.read] = byte;
                self.frame.read += 1;
                if self.frame.read < self.frame.header_len() {
                    return (HeaderData, None);
                }

                let message_len = self.frame.message_len();
                if message_len > FEMTO_MAX_PAYLOAD_LEN {
                    debug!("message length {message_len} overflows the payload buffer");
                    (Preamble1, None)
                } else if message_len == 0 {
                    (Crc1, None)
                } else {
                    (Data, None)
                }
            },
            Data => {
                let index = self.frame.read - self.frame.header_len();
                if index >= FEMTO_MAX_PAYLOAD_LEN {
                    return (Preamble1, None);
                }
                self.frame.payload[index] = byte;
                self.frame.read += 1;
                if self.frame.read >= self.frame.header_len() + self.frame.message_len() {
                    (Crc1, None)
                } else {
                    (Data, None)
                }
            },
            Crc1 => {
                self.frame.crc = u32::from(byte);
                (Crc2, None)
            },
            Crc2 => {
                self.frame.crc |= u32::from(byte) << 8;
                (Crc3, None)
            },
            Crc3 => {
                self.frame.crc |= u32::from(byte) << 16;
                (Crc4, None)
            },
            Crc4 => {
                self.frame.crc |= u32::from(byte) << 24;
                if self.frame.crc_matches() {
                    (Preamble1, Some(self.frame.read))
                } else {
                    self.crc_failures += 1;
                    debug!(
                        "dropping frame {} with bad checksum {:#010x}",
                        self.frame.message_id(),
                        self.frame.crc
                    );
                    (Preamble1, None)
                }
            },
        }
    }

    /// State to continue from after a preamble mismatch: the rejected byte may itself
    /// open the next frame.
    fn restart(byte: u8) -> DecodeState {
        if byte == FEMTO_PREAMBLE_1 {
            DecodeState::Preamble2
        } else {
            DecodeState::Preamble1
        }
    }
}

/// Fields of a standard 28 byte header to put in front of a payload. Header and
/// message lengths are not part of it, they follow from the encoding.
///
/// ```
/// use femtomes::{FrameBuilder, FrameDecoder};
///
/// let bytes = FrameBuilder {
///     message_id: 42,
///     sequence: 3,
///     ..FrameBuilder::default()
/// }
/// .into_frame_bytes(&[1, 2, 3])
/// .unwrap();
///
/// let mut decoder = FrameDecoder::new();
/// let completed = bytes.iter().filter_map(|b| decoder.consume_byte(*b)).count();
/// assert_eq!(completed, 1);
/// assert_eq!(decoder.frame().header().sequence, 3);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameBuilder {
    pub message_id: u16,
    pub message_type: u8,
    pub port_addr: u8,
    pub sequence: u16,
    /// GPS week number
    pub week: u16,
    /// GPS time of week, milliseconds
    pub tow_ms: u32,
}

impl FrameBuilder {
    /// Header, `payload` and the two-stage CRC trailer
    pub fn into_frame_bytes(self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > FEMTO_MAX_PAYLOAD_LEN {
            return Err(Error::InvalidFrame("payload larger than the payload buffer"));
        }

        let mut bytes = Vec::with_capacity(FEMTO_HEADER_LEN + payload.len() + FEMTO_CRC_LEN);
        bytes.extend_from_slice(&FEMTO_PREAMBLE);
        bytes.push(FEMTO_HEADER_LEN as u8);
        bytes.extend_from_slice(&self.message_id.to_le_bytes());
        bytes.push(self.message_type);
        bytes.push(self.port_addr);
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&self.sequence.to_le_bytes());
        bytes.extend_from_slice(&[0, 0]); // idle time, time status
        bytes.extend_from_slice(&self.week.to_le_bytes());
        bytes.extend_from_slice(&self.tow_ms.to_le_bytes());
        bytes.resize(FEMTO_HEADER_LEN, 0); // receiver status, reserved, sw version

        let mut crc = FrameCrc::new();
        crc.update(&bytes);
        crc.update(payload);
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&crc.result().to_le_bytes());
        Ok(bytes)
    }
}

/// Frame carrying `payload` as message `message_id`, every other header field zero.
pub fn encode_frame(message_id: u16, payload: &[u8]) -> Result<Vec<u8>> {
    FrameBuilder {
        message_id,
        ..FrameBuilder::default()
    }
    .into_frame_bytes(payload)
}
