#![allow(dead_code)]

//! Simulated receiver shared by the integration tests.
//!
//! Time only moves when the driver waits: a read that finds nothing to deliver advances
//! the shared clock by its whole timeout, so tests run instantly and deterministically.

use byteorder::{LittleEndian, WriteBytesExt};
use femtomes::{
    encode_frame, Clock, DriverCallbacks, SurveyInStatus, Transport, FEMTO_MSG_ID_PX4GPS,
};
use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn starting_at(us: u64) -> Self {
        Self(Rc::new(Cell::new(us)))
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }

    fn set(&self, us: u64) {
        self.0.set(us);
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.0.get()
    }
}

pub struct SimReceiver {
    clock: SimClock,
    /// Rate the receiver's port runs at
    pub receiver_baud: u32,
    /// Rate the host side is set to
    pub host_baud: u32,
    pub reply_delay_us: u64,
    pub version_reply: String,
    /// Commands starting with one of these are never answered
    pub ignored: Vec<&'static str>,
    /// Stream data is delivered one chunk per read, each advancing the clock by this much
    pub chunk_interval_us: u64,
    /// Multi-line replies come one line per read, `reply_delay_us` apart
    pub split_replies: bool,
    pub fail_reads: bool,
    pending: VecDeque<(u64, Vec<u8>)>,
    stream: VecDeque<Vec<u8>>,
    pub written: Vec<String>,
    pub baud_history: Vec<u32>,
}

impl SimReceiver {
    pub fn new(clock: &SimClock, receiver_baud: u32) -> Self {
        Self {
            clock: clock.clone(),
            receiver_baud,
            host_baud: 0,
            reply_delay_us: 5_000,
            version_reply: "<VERSION OK\r\n#VERSION,BT-6A0,FW 3.0.1\r\n".to_string(),
            ignored: Vec::new(),
            chunk_interval_us: 0,
            split_replies: false,
            fail_reads: false,
            pending: VecDeque::new(),
            stream: VecDeque::new(),
            written: Vec::new(),
            baud_history: Vec::new(),
        }
    }

    /// Host and receiver already agree on `baud`.
    pub fn connected(clock: &SimClock, baud: u32) -> Self {
        let mut receiver = Self::new(clock, baud);
        receiver.host_baud = baud;
        receiver
    }

    pub fn push_stream(&mut self, chunk: impl Into<Vec<u8>>) {
        self.stream.push_back(chunk.into());
    }

    pub fn wrote(&self, command: &str) -> bool {
        self.written.iter().any(|w| w == command)
    }

    fn answer(&self, command: &str) -> Option<String> {
        if self.ignored.iter().any(|prefix| command.starts_with(prefix)) {
            return None;
        }
        let reply = match command.trim_end() {
            "UNLOGALL" => "<UNLOGALL OK\r\n",
            "VERSION" => self.version_reply.as_str(),
            "POSAVE AUTO" => "<POSAVE OK\r\n",
            "SAVECONFIG" => "<SAVECONFIG OK\r\n",
            cmd if cmd.starts_with("LOG ") => "<LOG OK\r\n",
            cmd if cmd.starts_with("FIX POSITION ") => "<FIX OK\r\n",
            _ => return None,
        };
        Some(reply.to_string())
    }
}

impl Transport for SimReceiver {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if self.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "receiver unplugged"));
        }
        let now = self.clock.now_us();
        let deadline = now + timeout.as_micros() as u64;

        if let Some((ready_at, mut bytes)) = self.pending.pop_front() {
            if ready_at <= deadline {
                self.clock.set(now.max(ready_at));
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    bytes.drain(..n);
                    self.pending.push_front((ready_at, bytes));
                }
                return Ok(n);
            }
            self.pending.push_front((ready_at, bytes));
        }

        if let Some(mut chunk) = self.stream.pop_front() {
            self.clock.advance(self.chunk_interval_us);
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                chunk.drain(..n);
                self.stream.push_front(chunk);
            }
            return Ok(n);
        }

        self.clock.set(deadline);
        Ok(0)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let command = String::from_utf8_lossy(data).into_owned();
        self.written.push(command.clone());

        if self.host_baud != self.receiver_baud {
            // line noise at the wrong rate
            return Ok(data.len());
        }

        if let Some(baud) = command
            .trim_end()
            .strip_prefix("COM1 ")
            .and_then(|baud| baud.parse().ok())
        {
            if !self.ignored.contains(&"COM") {
                self.receiver_baud = baud;
            }
        } else if let Some(reply) = self.answer(&command) {
            let mut ready_at = self.clock.now_us() + self.reply_delay_us;
            if self.split_replies {
                for line in reply.split_inclusive('\n') {
                    self.pending.push_back((ready_at, line.as_bytes().to_vec()));
                    ready_at += self.reply_delay_us;
                }
            } else {
                self.pending.push_back((ready_at, reply.into_bytes()));
            }
        }
        Ok(data.len())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()> {
        self.host_baud = baud_rate;
        self.baud_history.push(baud_rate);
        Ok(())
    }
}

/// Records everything the driver reports through its callbacks
#[derive(Debug, Default)]
pub struct Recorder {
    pub statuses: Vec<SurveyInStatus>,
    pub rtcm: Vec<Vec<u8>>,
}

impl DriverCallbacks for Recorder {
    fn survey_in_status(&mut self, status: SurveyInStatus) {
        self.statuses.push(status);
    }

    fn rtcm_message(&mut self, message: &[u8]) {
        self.rtcm.push(message.to_vec());
    }
}

/// Fields of a PX4GPS payload the tests care about
#[derive(Debug, Default, Clone, Copy)]
pub struct Fix {
    pub time_utc_usec: u64,
    pub lat: i32,
    pub lon: i32,
    pub alt: i32,
    pub heading: f32,
    pub fix_type: u8,
    pub satellites_used: u8,
}

pub fn px4gps_payload(fix: &Fix) -> Vec<u8> {
    let mut wtr = Vec::with_capacity(87);
    wtr.write_u64::<LittleEndian>(fix.time_utc_usec).unwrap();
    wtr.write_i32::<LittleEndian>(fix.lat).unwrap();
    wtr.write_i32::<LittleEndian>(fix.lon).unwrap();
    wtr.write_i32::<LittleEndian>(fix.alt).unwrap();
    wtr.write_i32::<LittleEndian>(fix.alt + 32_000).unwrap(); // alt_ellipsoid
    for var in [0.5f32, 0.01, 1.2, 2.1, 0.9, 1.4] {
        // s_var, c_var, eph, epv, hdop, vdop
        wtr.write_f32::<LittleEndian>(var).unwrap();
    }
    wtr.write_i32::<LittleEndian>(120).unwrap(); // noise
    wtr.write_i32::<LittleEndian>(3).unwrap(); // jamming
    for vel in [1.5f32, 1.0, -1.0, 0.1, 0.78] {
        // vel, vel_n, vel_e, vel_d, cog
        wtr.write_f32::<LittleEndian>(vel).unwrap();
    }
    wtr.write_i32::<LittleEndian>(0).unwrap(); // timestamp_time_relative
    wtr.write_f32::<LittleEndian>(fix.heading).unwrap();
    wtr.write_u8(fix.fix_type).unwrap();
    wtr.write_u8(1).unwrap(); // vel_ned_valid
    wtr.write_u8(fix.satellites_used).unwrap();
    assert_eq!(wtr.len(), 87);
    wtr
}

pub fn px4gps_frame(fix: &Fix) -> Vec<u8> {
    encode_frame(FEMTO_MSG_ID_PX4GPS, &px4gps_payload(fix)).unwrap()
}

pub fn rtcm_frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0xd3];
    bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(payload);
    let crc = femtomes::crc24q(&bytes);
    bytes.extend_from_slice(&crc.to_be_bytes()[1..]);
    bytes
}
