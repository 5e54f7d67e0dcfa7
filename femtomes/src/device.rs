//! Driver entry points: the receive loop and the configuration sequencer.

use core::time::Duration;
use log::{debug, info, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    base_station::{BaseSettings, BoardType, OutputMode, SurveyInStatus},
    command::{
        baud_change_command, fixed_position_command, log_position_command, CommandEngine,
        CMD_LOG_RTCM, CMD_POSAVE_AUTO, CMD_SAVE_CONFIG, CMD_UNLOG_ALL, CMD_VERSION, REPLY_FIX,
        REPLY_LOG, REPLY_POSAVE, REPLY_SAVE_CONFIG, REPLY_UNLOG_ALL, REPLY_VERSION,
    },
    constants::{
        DEFAULT_BAUD_RATE, DEFAULT_BAUD_RATES, DEFAULT_RESPONSE_TIMEOUT, READ_BUFFER_SIZE,
        SURVEY_IN_UPDATE_INTERVAL_US,
    },
    error::{Error, Result},
    packets::{self, GpsPosition},
    parser::{rtcm::RtcmParser, FrameDecoder},
    transport::{Clock, MonotonicClock, Transport},
};

/// Tunables of the driver. The defaults match the receivers' factory setup.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct DriverConfig {
    /// Operating rate after configuration
    pub target_baud_rate: u32,
    /// Rates tried during discovery, in order
    pub baud_rates: Vec<u32>,
    /// Time budget of one acknowledged command
    pub response_timeout: Duration,
    /// An acknowledged command gives up after `response_timeout * ack_timeout_multiplier`
    pub ack_timeout_multiplier: u32,
    /// [`Device::receive`] gives up after `timeout * receive_timeout_multiplier`
    pub receive_timeout_multiplier: u32,
    /// Handshakes tried at each candidate rate
    pub discovery_attempts: u32,
    /// Handshakes tried after switching to the target rate
    pub upgrade_attempts: u32,
    /// How long to drain the line after asking for a new baud rate
    pub settle_time: Duration,
    /// Receiver port we are wired to, as named in `COM<port>` commands
    pub receiver_port: char,
    /// Period of the position log, seconds
    pub position_rate: f32,
    /// Antenna heading offset, radians, subtracted from every heading
    pub heading_offset: f32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            target_baud_rate: DEFAULT_BAUD_RATE,
            baud_rates: DEFAULT_BAUD_RATES.to_vec(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            ack_timeout_multiplier: 2,
            receive_timeout_multiplier: 4,
            discovery_attempts: 2,
            upgrade_attempts: 10,
            settle_time: Duration::from_millis(200),
            receiver_port: '1',
            position_rate: 0.2,
            heading_offset: 0.0,
        }
    }
}

/// Receives what the driver reports besides position records
pub trait DriverCallbacks {
    fn survey_in_status(&mut self, _status: SurveyInStatus) {}

    /// One complete RTCM3 frame, CRC included, ready to be forwarded to rovers
    fn rtcm_message(&mut self, _message: &[u8]) {}
}

impl DriverCallbacks for () {}

#[derive(Debug, Clone, Copy)]
struct SurveyInProgress {
    started_us: u64,
    last_update_us: u64,
    duration_s: u32,
}

/// A Femtomes receiver on the other end of `transport`.
///
/// Call [`Device::configure`] once, then [`Device::receive`] in a loop.
pub struct Device<T, C = MonotonicClock, H = ()> {
    transport: T,
    clock: C,
    callbacks: H,
    config: DriverConfig,
    decoder: FrameDecoder,
    rtcm: RtcmParser,
    commands: CommandEngine,
    read_buf: [u8; READ_BUFFER_SIZE],
    read_len: usize,
    read_pos: usize,
    baud_rate: u32,
    output_mode: OutputMode,
    base_settings: BaseSettings,
    board: BoardType,
    correction_output_active: bool,
    survey_in: Option<SurveyInProgress>,
}

impl<T: Transport> Device<T> {
    /// Device on the system clock, without callbacks and with the default configuration
    pub fn with_defaults(transport: T) -> Self {
        Self::new(transport, MonotonicClock::new(), (), DriverConfig::default())
    }
}

impl<T: Transport, C: Clock, H: DriverCallbacks> Device<T, C, H> {
    pub fn new(transport: T, clock: C, callbacks: H, config: DriverConfig) -> Self {
        Self {
            transport,
            clock,
            callbacks,
            config,
            decoder: FrameDecoder::new(),
            rtcm: RtcmParser::new(),
            commands: CommandEngine::new(),
            read_buf: [0; READ_BUFFER_SIZE],
            read_len: 0,
            read_pos: 0,
            baud_rate: 0,
            output_mode: OutputMode::default(),
            base_settings: BaseSettings::default(),
            board: BoardType::default(),
            correction_output_active: false,
            survey_in: None,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn callbacks(&self) -> &H {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut H {
        &mut self.callbacks
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Rate the transport runs at, 0 until [`Device::configure`] found the receiver
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn board(&self) -> BoardType {
        self.board
    }

    pub fn base_settings(&self) -> BaseSettings {
        self.base_settings
    }

    /// Takes effect at the next correction activation
    pub fn set_base_settings(&mut self, settings: BaseSettings) {
        self.base_settings = settings;
    }

    pub fn correction_output_active(&self) -> bool {
        self.correction_output_active
    }

    /// Seconds since survey-in started, `None` when no survey-in is running
    pub fn survey_in_duration(&self) -> Option<u32> {
        self.survey_in.map(|progress| progress.duration_s)
    }

    /// Waits for the next position record and writes it to `position`.
    ///
    /// Each transport read waits up to `timeout * 2`. Without a record after
    /// `timeout * receive_timeout_multiplier` this returns [`Error::Timeout`]. Bytes read
    /// past the end of a record are kept for the next call.
    pub fn receive(&mut self, position: &mut GpsPosition, timeout: Duration) -> Result<usize> {
        let started = self.clock.now_us();
        let window = timeout.saturating_mul(self.config.receive_timeout_multiplier);
        let read_timeout = timeout.saturating_mul(2);

        loop {
            while self.read_pos < self.read_len {
                let byte = self.read_buf[self.read_pos];
                self.read_pos += 1;

                if self.output_mode == OutputMode::Rtcm {
                    if let Some(message) = self.rtcm.consume_byte(byte) {
                        self.callbacks.rtcm_message(message);
                    }
                }
                if self.decoder.consume_byte(byte).is_some() && self.handle_frame(position) > 0 {
                    return Ok(1);
                }
            }

            if self.clock.now_us().saturating_sub(started) > micros(window) {
                debug!("no position record within {window:?}");
                return Err(Error::Timeout);
            }

            self.read_pos = 0;
            self.read_len = 0;
            self.read_len = self.transport.read(&mut self.read_buf, read_timeout)?;
        }
    }

    fn handle_frame(&mut self, position: &mut GpsPosition) -> usize {
        let timestamp = self.clock.now_us();
        let produced = packets::handle_frame(self.decoder.frame(), position, timestamp);
        if produced > 0 {
            position.apply_heading_offset(self.config.heading_offset);
            self.update_survey_in(timestamp);
        }
        produced
    }

    fn update_survey_in(&mut self, now: u64) {
        let Some(progress) = self.survey_in.as_mut() else {
            return;
        };
        if now.saturating_sub(progress.last_update_us) < SURVEY_IN_UPDATE_INTERVAL_US {
            return;
        }
        progress.last_update_us = now;
        progress.duration_s = (now.saturating_sub(progress.started_us) / 1_000_000) as u32;
        self.send_survey_in_status(SurveyInStatus::new(true, false));
    }

    /// Brings the receiver to `config.target_baud_rate` and starts the position log, plus
    /// the correction output when `mode` asks for it and the board can provide it.
    ///
    /// `baud_rate` restricts discovery to that single rate, 0 tries every configured
    /// candidate. Returns the rate the transport ends up at.
    pub fn configure(&mut self, baud_rate: u32, mode: OutputMode) -> Result<u32> {
        self.output_mode = mode;
        self.correction_output_active = false;
        self.survey_in = None;
        self.decode_init();

        let detected = self.detect_baud_rate(baud_rate)?;
        info!("receiver answering at {detected} baud");

        let target = self.config.target_baud_rate;
        if detected != target {
            self.change_baud_rate(target)?;
            info!("switched receiver to {target} baud");
        }

        let log_position = log_position_command(self.config.position_rate);
        if self.acked(&log_position, REPLY_LOG)? {
            debug!("position log enabled");
        } else {
            warn!("receiver did not acknowledge {:?}", log_position.trim_end());
        }

        if mode == OutputMode::Rtcm {
            if self.board.supports_base_station() {
                self.activate_correction_output()?;
            } else {
                warn!("board {:?} cannot run as a base station", self.board);
            }
        }

        Ok(self.baud_rate)
    }

    fn detect_baud_rate(&mut self, requested: u32) -> Result<u32> {
        let candidates = if requested == 0 {
            self.config.baud_rates.clone()
        } else {
            vec![requested]
        };

        for baud_rate in candidates {
            self.transport.set_baud_rate(baud_rate)?;
            self.baud_rate = baud_rate;
            debug!("trying {baud_rate} baud");

            for _ in 0..self.config.discovery_attempts {
                if self.handshake()? {
                    return Ok(baud_rate);
                }
            }
        }

        warn!("receiver did not answer at any baud rate");
        self.baud_rate = 0;
        Err(Error::BaudDetectionFailed)
    }

    fn change_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        let command = baud_change_command(self.config.receiver_port, baud_rate);
        self.transport.write(command.as_bytes())?;

        self.decode_init();
        self.drain(self.config.settle_time)?;
        self.decode_init();
        self.transport.set_baud_rate(baud_rate)?;
        self.baud_rate = baud_rate;

        for _ in 0..self.config.upgrade_attempts {
            if self.handshake()? {
                return Ok(());
            }
        }

        warn!("receiver silent after switching to {baud_rate} baud");
        Err(Error::BaudChangeFailed { baud_rate })
    }

    /// Silences the receiver and asks for its version, which also tells the board type.
    fn handshake(&mut self) -> Result<bool> {
        if !self.acked(CMD_UNLOG_ALL, REPLY_UNLOG_ALL)? {
            return Ok(false);
        }
        if !self.acked(CMD_VERSION, REPLY_VERSION)? {
            return Ok(false);
        }
        self.board = BoardType::from_version_reply(&self.commands.last_reply());
        if self.board == BoardType::Other {
            self.commands.read_line_after(
                &mut self.transport,
                &self.clock,
                REPLY_VERSION,
                self.config.response_timeout,
            )?;
            self.board = BoardType::from_version_reply(&self.commands.last_reply());
        }
        debug!("board type {:?}", self.board);
        Ok(true)
    }

    /// Discards whatever the receiver sends during `period`.
    fn drain(&mut self, period: Duration) -> Result<()> {
        let started = self.clock.now_us();
        let period_us = micros(period);
        let mut scratch = [0u8; READ_BUFFER_SIZE];

        loop {
            let elapsed = self.clock.now_us().saturating_sub(started);
            if elapsed >= period_us {
                break;
            }
            self.transport
                .read(&mut scratch, Duration::from_micros(period_us - elapsed))?;
        }
        self.read_pos = 0;
        self.read_len = 0;
        Ok(())
    }

    fn decode_init(&mut self) {
        self.decoder.reset();
        self.rtcm.reset();
    }

    /// Runs one acknowledged command with the configured time budget.
    pub fn send_and_wait_for_reply(&mut self, command: &str, reply: &str) -> Result<()> {
        self.commands.send_and_wait_for_reply(
            &mut self.transport,
            &self.clock,
            command,
            reply,
            self.config.response_timeout,
            self.config.ack_timeout_multiplier,
        )
    }

    /// Like [`Device::send_and_wait_for_reply`], with a missing reply as `Ok(false)`.
    fn acked(&mut self, command: &str, reply: &str) -> Result<bool> {
        match self.send_and_wait_for_reply(command, reply) {
            Ok(()) => Ok(true),
            Err(Error::NoReply { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Starts the base station: survey-in or fixed position depending on the base
    /// settings. Does nothing unless the output mode is [`OutputMode::Rtcm`], and only
    /// runs once per [`Device::configure`].
    pub fn activate_correction_output(&mut self) -> Result<()> {
        if self.correction_output_active || self.output_mode != OutputMode::Rtcm {
            return Ok(());
        }
        self.correction_output_active = true;

        match self.base_settings {
            BaseSettings::SurveyIn(settings) => {
                info!(
                    "enabling survey-in (accuracy {} mm, at least {} s)",
                    settings.acc_limit_mm, settings.min_duration_s
                );
                if self.acked(CMD_POSAVE_AUTO, REPLY_POSAVE)? {
                    let now = self.clock.now_us();
                    self.survey_in = Some(SurveyInProgress {
                        started_us: now,
                        last_update_us: now,
                        duration_s: 0,
                    });
                    self.send_survey_in_status(SurveyInStatus::new(true, false));
                } else {
                    warn!("receiver did not acknowledge survey-in");
                }
            },
            BaseSettings::FixedPosition(settings) => {
                info!(
                    "setting base station position to {:.8} {:.8} {:.3}",
                    settings.latitude, settings.longitude, settings.altitude
                );
                let command = fixed_position_command(
                    settings.latitude,
                    settings.longitude,
                    settings.altitude,
                );
                if self.acked(&command, REPLY_FIX)? {
                    self.send_survey_in_status(SurveyInStatus::new(true, false));
                } else {
                    warn!("receiver did not acknowledge the fixed position");
                }

                self.activate_rtcm_output()?;
                self.send_survey_in_status(SurveyInStatus::new(false, true).with_position(
                    settings.latitude,
                    settings.longitude,
                    settings.altitude,
                ));
            },
        }
        Ok(())
    }

    /// Enables the RTCM log and saves the configuration. Both are best effort.
    pub fn activate_rtcm_output(&mut self) -> Result<()> {
        for (command, reply) in [(CMD_LOG_RTCM, REPLY_LOG), (CMD_SAVE_CONFIG, REPLY_SAVE_CONFIG)] {
            if !self.acked(command, reply)? {
                warn!("receiver did not acknowledge {:?}", command.trim_end());
            }
        }
        Ok(())
    }

    /// Reports `status` with the current survey-in duration.
    pub fn send_survey_in_status(&mut self, mut status: SurveyInStatus) {
        status.duration = self.survey_in_duration().unwrap_or(0);
        self.callbacks.survey_in_status(status);
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
