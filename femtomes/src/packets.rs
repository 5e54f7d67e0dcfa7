//! Message dispatch: turns a validated [`Frame`] into the caller's [`GpsPosition`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use core::f32::consts::PI;
use log::debug;

use crate::{constants::FEMTO_MSG_ID_PX4GPS, parser::Frame};

mod px4_gps;
pub use px4_gps::Px4Gps;

/// Position/velocity record handed to the caller, mirrors the PX4
/// `vehicle_gps_position` topic.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsPosition {
    /// Monotonic capture time, microseconds
    pub timestamp: u64,
    pub time_utc_usec: u64,
    /// Latitude, 1e-7 degrees
    pub lat: i32,
    /// Longitude, 1e-7 degrees
    pub lon: i32,
    /// Altitude above MSL, millimeters
    pub alt: i32,
    /// Altitude above the ellipsoid, millimeters
    pub alt_ellipsoid: i32,
    pub s_variance_m_s: f32,
    pub c_variance_rad: f32,
    pub eph: f32,
    pub epv: f32,
    pub hdop: f32,
    pub vdop: f32,
    pub noise_per_ms: i32,
    pub jamming_indicator: i32,
    pub vel_m_s: f32,
    pub vel_n_m_s: f32,
    pub vel_e_m_s: f32,
    pub vel_d_m_s: f32,
    pub cog_rad: f32,
    pub timestamp_time_relative: i32,
    /// Heading in radians [-pi, pi], NaN when the receiver has none
    pub heading: f32,
    pub heading_offset: f32,
    pub fix_type: u8,
    pub vel_ned_valid: bool,
    pub satellites_used: u8,
}

impl GpsPosition {
    pub fn lat_degrees(&self) -> f64 {
        f64::from(self.lat) * 1e-7
    }

    pub fn lon_degrees(&self) -> f64 {
        f64::from(self.lon) * 1e-7
    }

    pub fn alt_meters(&self) -> f64 {
        f64::from(self.alt) * 1e-3
    }

    /// UTC time of the solution, `None` until the receiver knows it.
    pub fn utc_time(&self) -> Option<DateTime<Utc>> {
        if self.time_utc_usec == 0 {
            return None;
        }
        let secs = i64::try_from(self.time_utc_usec / 1_000_000).ok()?;
        let nanos = (self.time_utc_usec % 1_000_000) as u32 * 1_000;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Subtracts the antenna heading offset, keeping the result in [-pi, pi].
    pub fn apply_heading_offset(&mut self, heading_offset: f32) {
        self.heading_offset = heading_offset;
        if !self.heading.is_finite() {
            return;
        }
        let mut heading = self.heading - heading_offset;
        while heading > PI {
            heading -= 2.0 * PI;
        }
        while heading < -PI {
            heading += 2.0 * PI;
        }
        self.heading = heading;
    }
}

/// Messages this driver knows how to read
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacketRef {
    Px4Gps(Px4Gps),
    Unknown { message_id: u16 },
}

pub fn match_packet(message_id: u16, payload: &[u8]) -> PacketRef {
    match message_id {
        FEMTO_MSG_ID_PX4GPS => PacketRef::Px4Gps(Px4Gps::from_payload(payload)),
        _ => PacketRef::Unknown { message_id },
    }
}

/// Decodes a complete frame into `position`. Returns the number of records produced:
/// 1 for a PX4GPS message, 0 for anything else, in which case `position` is untouched.
pub fn handle_frame(frame: &Frame, position: &mut GpsPosition, timestamp: u64) -> usize {
    match match_packet(frame.message_id(), frame.payload()) {
        PacketRef::Px4Gps(msg) => {
            *position = GpsPosition::default();
            msg.copy_into(position);
            position.timestamp = timestamp;
            1
        },
        PacketRef::Unknown { message_id } => {
            debug!("ignoring message {message_id}");
            0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{encode_frame, FrameDecoder};

    fn decode(bytes: &[u8]) -> FrameDecoder {
        let mut decoder = FrameDecoder::new();
        let completed = bytes.iter().filter_map(|b| decoder.consume_byte(*b)).count();
        assert_eq!(completed, 1);
        decoder
    }

    #[test]
    fn px4gps_frame_fills_record() {
        let mut payload = vec![0u8; Px4Gps::PAYLOAD_LEN];
        payload[8..12].copy_from_slice(&123_456_789i32.to_le_bytes());
        payload[86] = 12;
        let bytes = encode_frame(FEMTO_MSG_ID_PX4GPS, &payload).unwrap();
        let decoder = decode(&bytes);

        let mut position = GpsPosition {
            eph: 99.0,
            ..GpsPosition::default()
        };
        assert_eq!(handle_frame(decoder.frame(), &mut position, 5_000), 1);
        assert_eq!(position.lat, 123_456_789);
        assert_eq!(position.satellites_used, 12);
        assert_eq!(position.timestamp, 5_000);
        // record is rebuilt from scratch
        assert_eq!(position.eph, 0.0);
    }

    #[test]
    fn unknown_message_is_ignored() {
        let bytes = encode_frame(42, &[1, 2, 3]).unwrap();
        let decoder = decode(&bytes);

        let mut position = GpsPosition {
            lat: 7,
            ..GpsPosition::default()
        };
        assert_eq!(handle_frame(decoder.frame(), &mut position, 1), 0);
        assert_eq!(position.lat, 7);
    }

    #[test]
    fn heading_offset_wraps() {
        let mut position = GpsPosition {
            heading: -3.0,
            ..GpsPosition::default()
        };
        position.apply_heading_offset(1.0);
        assert!((position.heading - (2.0 * PI - 4.0)).abs() < 1e-5);
        assert_eq!(position.heading_offset, 1.0);

        let mut position = GpsPosition {
            heading: f32::NAN,
            ..GpsPosition::default()
        };
        position.apply_heading_offset(1.0);
        assert!(position.heading.is_nan());
    }

    #[test]
    fn utc_time_conversion() {
        let position = GpsPosition {
            time_utc_usec: 1_600_000_000_500_000,
            ..GpsPosition::default()
        };
        let time = position.utc_time().unwrap();
        assert_eq!(time.timestamp(), 1_600_000_000);
        assert_eq!(time.timestamp_subsec_micros(), 500_000);
        assert!(GpsPosition::default().utc_time().is_none());
    }
}
