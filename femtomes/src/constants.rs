use core::time::Duration;

pub const FEMTO_PREAMBLE_1: u8 = 0xaa;
pub const FEMTO_PREAMBLE_2: u8 = 0x44;
pub const FEMTO_PREAMBLE_3: u8 = 0xb5;
pub(crate) const FEMTO_PREAMBLE: [u8; FEMTO_PREAMBLE_LEN] =
    [FEMTO_PREAMBLE_1, FEMTO_PREAMBLE_2, FEMTO_PREAMBLE_3];
pub(crate) const FEMTO_PREAMBLE_LEN: usize = 3;

/// Size of the standard binary header, preamble included.
pub const FEMTO_HEADER_LEN: usize = 28;
/// Capacity of the payload buffer, frames announcing more are dropped.
pub const FEMTO_MAX_PAYLOAD_LEN: usize = 256;
pub const FEMTO_CRC_LEN: usize = 4;

pub(crate) const FEMTO_HEADER_LEN_OFFSET: usize = 3; // After the preamble
pub(crate) const FEMTO_MSG_ID_OFFSET: usize = 4;
pub(crate) const FEMTO_MSG_TYPE_OFFSET: usize = 6;
pub(crate) const FEMTO_PORT_ADDR_OFFSET: usize = 7;
pub(crate) const FEMTO_MSG_LEN_OFFSET: usize = 8;
pub(crate) const FEMTO_SEQUENCE_OFFSET: usize = 10;
pub(crate) const FEMTO_WEEK_OFFSET: usize = 14;
pub(crate) const FEMTO_TOW_OFFSET: usize = 16;

/// Smallest header length that still carries the message-length field.
pub(crate) const FEMTO_MIN_HEADER_LEN: usize = FEMTO_MSG_LEN_OFFSET + 2;

/// Message id of the PX4GPS position/velocity log.
pub const FEMTO_MSG_ID_PX4GPS: u16 = 8001;

pub const RTCM_SYNC_CHAR: u8 = 0xd3;
pub(crate) const RTCM_HEADER_SIZE: usize = 3; // sync char (1) + length field (2)
pub(crate) const RTCM_CRC_SIZE: usize = 3;
pub(crate) const RTCM_LENGTH_MASK: u16 = 0x03ff; // 10 bits for length (6 bits reserved)
pub(crate) const RTCM_MAX_FRAME_LEN: usize =
    RTCM_HEADER_SIZE + RTCM_LENGTH_MASK as usize + RTCM_CRC_SIZE;

/// Size of the scratch buffer used for every transport read.
pub(crate) const READ_BUFFER_SIZE: usize = 150;

/// Factory default of the receivers, tried first during baud discovery.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_BAUD_RATES: [u32; 5] = [115_200, 9_600, 38_400, 19_200, 57_600];

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(200);
pub(crate) const ACK_POLL_INTERVAL: Duration = Duration::from_millis(1);
pub(crate) const SURVEY_IN_UPDATE_INTERVAL_US: u64 = 1_000_000;
