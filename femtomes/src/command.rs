//! ASCII command protocol: line commands terminated by CR-LF, acknowledged by a reply
//! line containing a success token.

use core::time::Duration;
use log::{debug, trace};

use crate::{
    constants::{ACK_POLL_INTERVAL, READ_BUFFER_SIZE},
    error::{Error, Result},
    transport::{Clock, Transport},
};

/// Disables every log the receiver is currently emitting
pub const CMD_UNLOG_ALL: &str = "UNLOGALL\r\n";
pub const REPLY_UNLOG_ALL: &str = "<UNLOGALL OK";

pub const CMD_VERSION: &str = "VERSION\r\n";
pub const REPLY_VERSION: &str = "<VERSION OK";

pub const REPLY_LOG: &str = "<LOG OK";

/// Starts averaging the receiver's own position (survey-in)
pub const CMD_POSAVE_AUTO: &str = "POSAVE AUTO\r\n";
pub const REPLY_POSAVE: &str = "<POSAVE OK";

pub const REPLY_FIX: &str = "<FIX OK";

/// Streams RTCM corrections every second
pub const CMD_LOG_RTCM: &str = "LOG RTCM 1\r\n";

/// Persists the current configuration in the receiver's non-volatile memory
pub const CMD_SAVE_CONFIG: &str = "SAVECONFIG\r\n";
pub const REPLY_SAVE_CONFIG: &str = "<SAVECONFIG OK";

/// Accumulated reply bytes kept while waiting for a token
const REPLY_BUFFER_CAPACITY: usize = 1024;

/// `LOG PX4GPSB <period>`, binary PX4GPS log every `period` seconds.
pub fn log_position_command(period: f32) -> String {
    format!("LOG PX4GPSB {period}\r\n")
}

/// Switches the receiver port `port` to `baud_rate`. Not acknowledged, the receiver
/// changes rate right away.
pub fn baud_change_command(port: char, baud_rate: u32) -> String {
    format!("COM{port} {baud_rate}\r\n")
}

/// Fixes the base station position, degrees and meters.
pub fn fixed_position_command(latitude: f64, longitude: f64, altitude: f32) -> String {
    format!("FIX POSITION {latitude:.8} {longitude:.8} {altitude:.5}\r\n")
}

/// Sends commands and waits for their acknowledgement.
///
/// The engine only knows how to run one exchange; retries and the choice of commands
/// belong to the caller.
#[derive(Debug, Default)]
pub struct CommandEngine {
    reply: Vec<u8>,
}

impl CommandEngine {
    pub fn new() -> Self {
        Self {
            reply: Vec::with_capacity(REPLY_BUFFER_CAPACITY),
        }
    }

    /// Everything received during the last exchange, lossily decoded as text
    pub fn last_reply(&self) -> String {
        String::from_utf8_lossy(&self.reply).into_owned()
    }

    /// Writes `command`, then polls `transport` in short reads until `expected` shows up
    /// anywhere in the received bytes or `budget * multiplier` has elapsed.
    ///
    /// A transport read error ends the exchange at once with [`Error::Io`]. Running out of
    /// time gives [`Error::NoReply`].
    pub fn send_and_wait_for_reply<T, C>(
        &mut self,
        transport: &mut T,
        clock: &C,
        command: &str,
        expected: &str,
        budget: Duration,
        multiplier: u32,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        self.reply.clear();
        let written = transport.write(command.as_bytes())?;
        if written != command.len() {
            debug!(
                "short write for {:?}: {written} of {} bytes",
                command.trim_end(),
                command.len()
            );
        }

        let window = budget.saturating_mul(multiplier).as_micros() as u64;
        let started = clock.now_us();
        let mut chunk = [0u8; READ_BUFFER_SIZE];

        while clock.now_us().saturating_sub(started) < window {
            let n = transport.read(&mut chunk, ACK_POLL_INTERVAL)?;
            if n == 0 {
                continue;
            }
            self.push(&chunk[..n], expected.len());
            if find(&self.reply, expected.as_bytes()).is_some() {
                debug!("command {:?} acknowledged", command.trim_end());
                return Ok(());
            }
        }

        debug!("no reply to command {:?}", command.trim_end());
        trace!("received instead: {:?}", self.last_reply());
        Err(Error::NoReply {
            command: command.trim_end().to_string(),
        })
    }

    /// Keeps reading after a matched reply until the line following the one holding
    /// `token` is complete, or `window` has elapsed. Details of a reply, such as the
    /// version string, are printed on that line and may arrive in a later read than the
    /// token. Running out of time is not an error, the reply is just left as received.
    pub fn read_line_after<T, C>(
        &mut self,
        transport: &mut T,
        clock: &C,
        token: &str,
        window: Duration,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        let window = window.as_micros() as u64;
        let started = clock.now_us();
        let mut chunk = [0u8; READ_BUFFER_SIZE];

        while !line_complete_after(&self.reply, token.as_bytes()) {
            if clock.now_us().saturating_sub(started) >= window {
                debug!("line after {token:?} still incomplete");
                break;
            }
            let n = transport.read(&mut chunk, ACK_POLL_INTERVAL)?;
            if n > 0 {
                self.push(&chunk[..n], token.len());
            }
        }
        Ok(())
    }

    /// Appends `bytes`, dropping the oldest data past the capacity but always keeping
    /// enough of the tail for a token split across reads.
    fn push(&mut self, bytes: &[u8], token_len: usize) {
        self.reply.extend_from_slice(bytes);
        if self.reply.len() > REPLY_BUFFER_CAPACITY {
            let keep = REPLY_BUFFER_CAPACITY.max(token_len + bytes.len());
            let excess = self.reply.len().saturating_sub(keep);
            self.reply.drain(..excess);
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Whether the token's own line and the line after it both ended
fn line_complete_after(reply: &[u8], token: &[u8]) -> bool {
    find(reply, token)
        .is_some_and(|pos| reply[pos..].iter().filter(|b| **b == b'\n').count() >= 2)
}
