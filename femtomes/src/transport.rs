//! Collaborators the driver runs on: a byte transport and a monotonic clock.

use std::io;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Half-duplex byte link to the receiver, typically a serial port
pub trait Transport {
    /// Reads whatever arrives within `timeout` into `buf`. `Ok(0)` means nothing came
    /// in, an error aborts the current receive or command cycle.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Writes `data`, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()> {
        (**self).set_baud_rate(baud_rate)
    }
}

/// Monotonic time source, microseconds
pub trait Clock {
    fn now_us(&self) -> u64;
}

/// [`Clock`] backed by [`Instant`], counting from the first clock created in the process.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        Self {
            epoch: *EPOCH.get_or_init(Instant::now),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}
