//! RTCM3 framer for the correction stream a base-station receiver interleaves with its
//! binary logs.
//!
//! An RTCM3 transport frame is `0xD3`, 6 reserved bits (zero) and a 10 bit big-endian
//! payload length, the payload, then a 24 bit CRC-24Q over everything before it.

use log::debug;

use crate::constants::{
    RTCM_CRC_SIZE, RTCM_HEADER_SIZE, RTCM_LENGTH_MASK, RTCM_MAX_FRAME_LEN, RTCM_SYNC_CHAR,
};

const CRC24Q_POLY: u32 = 0x0186_4cfb;

/// CRC-24Q as used by RTCM3 and SBAS
pub const fn crc24q(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    let mut i = 0;
    while i < data.len() {
        crc ^= (data[i] as u32) << 16;
        let mut bit = 0;
        while bit < 8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24Q_POLY;
            }
            bit += 1;
        }
        i += 1;
    }
    crc & 0x00ff_ffff
}

/// Extracts complete RTCM3 frames from a byte stream fed one byte at a time.
///
/// A sync byte that turns out not to open a frame (reserved bits set, bad CRC) is
/// dropped alone and the bytes buffered behind it are scanned again, so a real frame
/// inside the length announced by a false header is still found.
#[derive(Debug, Clone)]
pub struct RtcmParser {
    /// Candidate frame, always starting with the sync char when non-empty
    buf: Vec<u8>,
    /// Length of the frame at the start of `buf` last handed out
    complete: Option<usize>,
}

impl Default for RtcmParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcmParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(RTCM_MAX_FRAME_LEN),
            complete: None,
        }
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.complete = None;
    }

    /// Feeds one byte. Returns the whole frame (header, payload and CRC) when this byte
    /// completed one with a valid checksum.
    ///
    /// At most one frame is returned per call. A second frame already sitting in the
    /// rescanned bytes is returned by the next call.
    pub fn consume_byte(&mut self, byte: u8) -> Option<&[u8]> {
        if let Some(len) = self.complete.take() {
            self.buf.drain(..len);
        }
        self.buf.push(byte);
        self.scan()
    }

    fn scan(&mut self) -> Option<&[u8]> {
        loop {
            match self.buf.iter().position(|b| *b == RTCM_SYNC_CHAR) {
                Some(start) => {
                    self.buf.drain(..start);
                },
                None => {
                    self.buf.clear();
                    return None;
                },
            }

            if self.buf.len() >= 2 && self.buf[1] & !((RTCM_LENGTH_MASK >> 8) as u8) != 0 {
                // reserved bits set, not a frame start
                self.buf.drain(..1);
                continue;
            }
            if self.buf.len() < RTCM_HEADER_SIZE {
                return None;
            }

            let frame_len = RTCM_HEADER_SIZE + self.payload_len() + RTCM_CRC_SIZE;
            if self.buf.len() < frame_len {
                return None;
            }

            let body = frame_len - RTCM_CRC_SIZE;
            let received =
                u32::from_be_bytes([0, self.buf[body], self.buf[body + 1], self.buf[body + 2]]);
            let valid = crc24q(&self.buf[..body]) == received;
            if valid {
                self.complete = Some(frame_len);
                return Some(&self.buf[..frame_len]);
            }

            debug!("dropping RTCM sync of a {frame_len} byte candidate with bad CRC");
            self.buf.drain(..1);
        }
    }

    fn payload_len(&self) -> usize {
        usize::from(u16::from_be_bytes([self.buf[1], self.buf[2]]) & RTCM_LENGTH_MASK)
    }
}
