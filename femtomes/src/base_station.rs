//! Base-station settings and the survey-in status reported while running as a base.

use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the receiver is asked to stream once configured
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputMode {
    /// Position/velocity records only
    #[default]
    Gps,
    /// Position records plus RTCM corrections, the receiver acts as a base station
    Rtcm,
}

/// Survey-in targets. `POSAVE AUTO` takes no arguments and the receiver applies its own
/// limits, so these values are only reported in the driver's log.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurveyInSettings {
    /// Target accuracy, millimeters
    pub acc_limit_mm: u32,
    /// Minimum survey duration, seconds
    pub min_duration_s: u32,
}

impl Default for SurveyInSettings {
    fn default() -> Self {
        Self {
            acc_limit_mm: 2_000,
            min_duration_s: 180,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedPositionSettings {
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Meters above the ellipsoid
    pub altitude: f32,
}

/// How a base station learns its own position
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BaseSettings {
    SurveyIn(SurveyInSettings),
    FixedPosition(FixedPositionSettings),
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self::SurveyIn(SurveyInSettings::default())
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
    pub struct SurveyInFlags: u8 {
        const VALID = 1 << 0;
        const ACTIVE = 1 << 1;
    }
}

/// Survey-in progress, handed to [`crate::DriverCallbacks::survey_in_status`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurveyInStatus {
    /// Degrees, NaN while unknown
    pub latitude: f64,
    /// Degrees, NaN while unknown
    pub longitude: f64,
    /// Meters, NaN while unknown
    pub altitude: f32,
    /// Seconds since survey-in started
    pub duration: u32,
    /// Millimeters, 0 when unknown
    pub mean_accuracy: u32,
    pub flags: SurveyInFlags,
}

impl SurveyInStatus {
    pub fn new(active: bool, valid: bool) -> Self {
        let mut flags = SurveyInFlags::empty();
        flags.set(SurveyInFlags::ACTIVE, active);
        flags.set(SurveyInFlags::VALID, valid);
        Self {
            latitude: f64::NAN,
            longitude: f64::NAN,
            altitude: f32::NAN,
            duration: 0,
            mean_accuracy: 0,
            flags,
        }
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64, altitude: f32) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self.altitude = altitude;
        self
    }

    pub fn is_active(&self) -> bool {
        self.flags.contains(SurveyInFlags::ACTIVE)
    }

    pub fn is_valid(&self) -> bool {
        self.flags.contains(SurveyInFlags::VALID)
    }
}

/// Receiver board, as reported in the version reply
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BoardType {
    Bt672,
    Bt682,
    Bt680,
    Bt681,
    Bt6A0,
    #[default]
    Other,
}

impl BoardType {
    const IDENTIFIERS: [(&'static str, BoardType); 5] = [
        ("6A0", BoardType::Bt6A0),
        ("672", BoardType::Bt672),
        ("682", BoardType::Bt682),
        ("680", BoardType::Bt680),
        ("681", BoardType::Bt681),
    ];

    /// Looks for a board identifier anywhere in a version reply.
    pub fn from_version_reply(reply: &str) -> Self {
        let reply = reply.to_ascii_uppercase();
        Self::IDENTIFIERS
            .iter()
            .find(|(id, _)| reply.contains(id))
            .map(|(_, board)| *board)
            .unwrap_or_default()
    }

    /// Whether the board can run as an RTK base and stream corrections
    pub fn supports_base_station(self) -> bool {
        self == BoardType::Bt6A0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_encoding() {
        assert_eq!(SurveyInStatus::new(false, false).flags.bits(), 0);
        assert_eq!(SurveyInStatus::new(false, true).flags.bits(), 1);
        assert_eq!(SurveyInStatus::new(true, false).flags.bits(), 2);
        assert_eq!(SurveyInStatus::new(true, true).flags.bits(), 3);
    }

    #[test]
    fn new_status_has_unknown_position() {
        let status = SurveyInStatus::new(true, false);
        assert!(status.is_active());
        assert!(!status.is_valid());
        assert!(status.latitude.is_nan());
        assert!(status.altitude.is_nan());

        let status = status.with_position(37.0, -122.0, 30.0);
        assert_eq!(
            (status.latitude, status.longitude, status.altitude),
            (37.0, -122.0, 30.0)
        );
    }

    #[test]
    fn board_detection() {
        assert_eq!(
            BoardType::from_version_reply("#VERSION,COM1;BT-6a0 FW 2.1"),
            BoardType::Bt6A0
        );
        assert_eq!(BoardType::from_version_reply("board 682"), BoardType::Bt682);
        assert_eq!(BoardType::from_version_reply("<VERSION OK"), BoardType::Other);
        assert!(BoardType::Bt6A0.supports_base_station());
        assert!(!BoardType::Bt672.supports_base_station());
    }
}
