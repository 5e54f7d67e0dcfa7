use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, ValueEnum};
use femtomes::{
    BaseSettings, Device, DriverCallbacks, DriverConfig, Error, FixedPositionSettings,
    GpsPosition, MonotonicClock, OutputMode, SurveyInSettings, SurveyInStatus,
};
use log::{debug, error, info, warn};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Position records only
    Gps,
    /// Position records plus RTCM corrections (base station)
    Rtcm,
}

/// Configure a Femtomes receiver and print its position records as JSON lines
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port the receiver is connected to
    #[arg(short, long)]
    port: String,

    /// Baud rate the receiver currently uses, 0 to detect it
    #[arg(short, long, default_value_t = 0)]
    baud: u32,

    /// Baud rate to switch the receiver to
    #[arg(long, default_value_t = femtomes::DEFAULT_BAUD_RATE)]
    target_baud: u32,

    #[arg(short, long, value_enum, default_value_t = Mode::Gps)]
    mode: Mode,

    /// Survey-in accuracy limit, millimeters. Only logged, the receiver applies its own
    #[arg(long, default_value_t = 2_000)]
    survey_in_acc: u32,

    /// Survey-in minimum duration, seconds. Only logged, like --survey-in-acc
    #[arg(long, default_value_t = 180)]
    survey_in_dur: u32,

    /// Fixed base position latitude, degrees. Replaces survey-in when given with
    /// --fixed-lon and --fixed-alt.
    #[arg(long, requires_all = ["fixed_lon", "fixed_alt"], allow_negative_numbers = true)]
    fixed_lat: Option<f64>,

    #[arg(long, requires_all = ["fixed_lat", "fixed_alt"], allow_negative_numbers = true)]
    fixed_lon: Option<f64>,

    /// Meters
    #[arg(long, requires_all = ["fixed_lat", "fixed_lon"], allow_negative_numbers = true)]
    fixed_alt: Option<f32>,

    /// Antenna heading offset, radians
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    heading_offset: f32,

    /// Stop after this many records
    #[arg(short, long)]
    count: Option<usize>,
}

impl Args {
    fn base_settings(&self) -> BaseSettings {
        match (self.fixed_lat, self.fixed_lon, self.fixed_alt) {
            (Some(latitude), Some(longitude), Some(altitude)) => {
                BaseSettings::FixedPosition(FixedPositionSettings {
                    latitude,
                    longitude,
                    altitude,
                })
            },
            _ => BaseSettings::SurveyIn(SurveyInSettings {
                acc_limit_mm: self.survey_in_acc,
                min_duration_s: self.survey_in_dur,
            }),
        }
    }
}

/// Prints survey-in progress, counts forwarded corrections
#[derive(Default)]
struct Console {
    rtcm_frames: u64,
}

impl DriverCallbacks for Console {
    fn survey_in_status(&mut self, status: SurveyInStatus) {
        match serde_json::to_string(&status) {
            Ok(json) => println!("{{\"survey_in\":{json}}}"),
            Err(e) => warn!("cannot serialize survey-in status: {e}"),
        }
    }

    fn rtcm_message(&mut self, message: &[u8]) {
        self.rtcm_frames += 1;
        debug!("RTCM frame #{} ({} bytes)", self.rtcm_frames, message.len());
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_env("FEMTOMES_LOG")
        .init();

    let args = Args::parse();
    let initial_baud = if args.baud == 0 {
        args.target_baud
    } else {
        args.baud
    };
    let port = serialport::new(&args.port, initial_baud)
        .timeout(Duration::from_millis(10))
        .open()
        .with_context(|| format!("opening serial port {}", args.port))?;

    let config = DriverConfig {
        target_baud_rate: args.target_baud,
        heading_offset: args.heading_offset,
        ..DriverConfig::default()
    };
    let mut device = Device::new(port, MonotonicClock::new(), Console::default(), config);
    device.set_base_settings(args.base_settings());

    let mode = match args.mode {
        Mode::Gps => OutputMode::Gps,
        Mode::Rtcm => OutputMode::Rtcm,
    };
    let baud = device
        .configure(args.baud, mode)
        .context("configuring the receiver")?;
    info!("receiver {:?} configured at {baud} baud", device.board());

    let mut position = GpsPosition::default();
    let mut records = 0;
    while args.count.is_none_or(|count| records < count) {
        match device.receive(&mut position, femtomes::DEFAULT_RESPONSE_TIMEOUT) {
            Ok(_) => {
                records += 1;
                print_record(&position)?;
            },
            Err(Error::Timeout) => warn!("no position record, still waiting"),
            Err(e) => {
                error!("receive failed: {e}");
                return Err(e).context("reading from the receiver");
            },
        }
    }

    info!(
        "{records} records, {} frames with bad CRC",
        device.decoder().crc_failures()
    );
    Ok(())
}

fn print_record(position: &GpsPosition) -> Result<()> {
    let mut record = serde_json::to_value(position)?;
    if let (Some(object), Some(utc)) = (record.as_object_mut(), position.utc_time()) {
        object.insert(
            "utc".to_string(),
            utc.to_rfc3339_opts(SecondsFormat::Micros, true).into(),
        );
    }
    println!("{record}");
    Ok(())
}
