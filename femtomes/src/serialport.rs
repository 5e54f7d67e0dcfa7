use ::serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::transport::Transport;

impl Transport for Box<dyn SerialPort> {
    /// Reads the serial port, converting timeouts into "no data received"
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.set_timeout(timeout)?;
        match Read::read(self, buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_all(data)?;
        self.flush()?;
        Ok(data.len())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> io::Result<()> {
        SerialPort::set_baud_rate(self.as_mut(), baud_rate)?;
        Ok(())
    }
}
