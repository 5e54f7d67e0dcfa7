//! # femtomes
//!
//! Driver for Femtomes GNSS receivers: brings the receiver to a known baud rate and
//! output configuration over its ASCII command protocol, then decodes the binary
//! position stream into [`GpsPosition`] records.
//!
//! An example of using this library to talk to a receiver can be seen in the
//! femtomes_cli crate of this workspace.
//!
//! Talking to a Receiver
//! =====================
//!
//! A [`Device`] owns a [`Transport`] (a serial port with the `serialport` feature), a
//! [`Clock`] and a [`DriverCallbacks`] value receiving survey-in status and RTCM
//! corrections:
//! ```no_run
//! # #[cfg(feature = "serialport")] {
//! use std::time::Duration;
//! use femtomes::{Device, GpsPosition, OutputMode};
//!
//! let port = serialport::new("/dev/ttyUSB0", 115_200).open().unwrap();
//! let mut device = Device::with_defaults(port);
//! device.configure(0, OutputMode::Gps).unwrap();
//!
//! let mut position = GpsPosition::default();
//! loop {
//!     match device.receive(&mut position, Duration::from_millis(200)) {
//!         Ok(_) => println!("{} {}", position.lat_degrees(), position.lon_degrees()),
//!         Err(femtomes::Error::Timeout) => continue,
//!         Err(e) => panic!("{e}"),
//!     }
//! }
//! # }
//! ```
//!
//! Decoding Frames
//! ===============
//!
//! The [`FrameDecoder`] takes one byte at a time, so reads of any size can be fed to it.
//! It reports a frame only once its CRC-32 trailer matches:
//! ```
//! use femtomes::{encode_frame, handle_frame, FrameDecoder, GpsPosition};
//!
//! let bytes = encode_frame(femtomes::FEMTO_MSG_ID_PX4GPS, &[0; 87]).unwrap();
//!
//! let mut decoder = FrameDecoder::new();
//! let mut position = GpsPosition::default();
//! for byte in bytes {
//!     if decoder.consume_byte(byte).is_some() {
//!         assert_eq!(handle_frame(decoder.frame(), &mut position, 1), 1);
//!     }
//! }
//! ```

pub use crate::{
    base_station::{
        BaseSettings, BoardType, FixedPositionSettings, OutputMode, SurveyInFlags,
        SurveyInSettings, SurveyInStatus,
    },
    command::CommandEngine,
    constants::*,
    device::{Device, DriverCallbacks, DriverConfig},
    error::{Error, Result},
    packets::{handle_frame, match_packet, GpsPosition, PacketRef, Px4Gps},
    parser::{
        calculate_block_crc32, encode_frame,
        rtcm::{crc24q, RtcmParser},
        DecodeState, Frame, FrameBuilder, FrameDecoder, FrameHeader,
    },
    transport::{Clock, MonotonicClock, Transport},
};

mod base_station;
pub mod command;
mod constants;
mod device;
mod error;
mod packets;
mod parser;
#[cfg(feature = "serialport")]
mod serialport;
mod transport;
