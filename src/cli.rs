use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{HistogramConfig, WaveformConfig};
use crate::connection::{CONTROL_PORT, DATA_PORT, RetryPolicy};
use crate::proto::command::{TriggerChannel, TriggerDirection, VerticalRange};
use crate::sink::Outputs;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rosy-client",
    about = "ROSY time loss / post mortem acquisition client"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Time loss histogram mode
    Histogram(HistogramModeOpts),
    /// Post mortem mode (blocks until the trigger)
    Waveform(WaveformModeOpts),
    /// Time loss and post mortem in parallel
    Both(BothModeOpts),
    /// Post mortem capture read out through the time loss device
    WaveformViaHistogram(WaveformModeOpts),
}

#[derive(Args, Debug, Clone)]
pub struct DeviceOpts {
    /// Instrument host name or IP address
    #[arg(long)]
    pub host: String,
    /// Control (command) port
    #[arg(long, default_value_t = CONTROL_PORT)]
    pub control_port: u16,
    /// Post mortem data port
    #[arg(long, default_value_t = DATA_PORT)]
    pub data_port: u16,
    /// Connect attempts per endpoint
    #[arg(long, default_value_t = 5)]
    pub connect_attempts: u32,
    /// Delay between connect attempts in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,
    /// Device id sent with every command
    #[arg(long, default_value_t = 0)]
    pub device: u32,
}

impl DeviceOpts {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OutputOpts {
    /// Do not write sample files
    #[arg(long, default_value_t = false)]
    pub no_save: bool,
    /// Directory for sample files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
    /// Print an excerpt of every buffer
    #[arg(long, default_value_t = false)]
    pub preview: bool,
}

impl OutputOpts {
    pub fn outputs(&self) -> std::io::Result<Outputs> {
        Outputs::new(
            self.preview,
            (!self.no_save).then_some(self.out_dir.as_path()),
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct HistogramOpts {
    /// Histogram fetches; 0 polls until the capture starts (or forever)
    #[arg(long, default_value_t = 10)]
    pub iterations: u32,
    /// Signal threshold in mV
    #[arg(long, default_value_t = 15.0)]
    pub threshold: f64,
    /// Wait before each histogram fetch, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_ms: u64,
}

impl HistogramOpts {
    pub fn to_config(&self) -> HistogramConfig {
        HistogramConfig {
            iterations: (self.iterations > 0).then_some(self.iterations),
            threshold_mv: self.threshold,
            poll_interval: Duration::from_millis(self.poll_ms),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct WaveformOpts {
    /// Samples after (positive) or before (negative) the trigger
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub delay: i64,
    /// Channel A range: 100mV 200mV 500mV 1V 2V 5V 10V 20V, off, or a raw range code
    #[arg(long, default_value = "1V")]
    pub range_a: VerticalRange,
    #[arg(long, default_value = "off")]
    pub range_b: VerticalRange,
    #[arg(long, default_value = "off")]
    pub range_c: VerticalRange,
    #[arg(long, default_value = "off")]
    pub range_d: VerticalRange,
    /// A, B, C, D or EXT
    #[arg(long, default_value = "EXT")]
    pub trigger_channel: TriggerChannel,
    /// RISING, FALLING or RISE_FALL
    #[arg(long, default_value = "RISING")]
    pub trigger_direction: TriggerDirection,
    /// Trigger threshold in mV (1..1000)
    #[arg(long, default_value_t = 250)]
    pub trigger_threshold: i16,
    /// Samples per channel; -1 for the maximum
    #[arg(long, default_value_t = 1_000_000, allow_negative_numbers = true)]
    pub samples: i64,
    /// Sampling period in seconds; -1 for the minimum
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    pub sampling_period: f64,
}

impl WaveformOpts {
    pub fn to_config(&self) -> WaveformConfig {
        WaveformConfig {
            delay_samples: self.delay,
            ranges: [self.range_a, self.range_b, self.range_c, self.range_d],
            trigger_channel: self.trigger_channel,
            trigger_threshold_mv: self.trigger_threshold,
            trigger_direction: self.trigger_direction,
            sample_count: self.samples,
            sampling_period_s: self.sampling_period,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct HistogramModeOpts {
    #[command(flatten)]
    pub dev: DeviceOpts,
    #[command(flatten)]
    pub out: OutputOpts,
    #[command(flatten)]
    pub hist: HistogramOpts,
}

#[derive(Args, Debug, Clone)]
pub struct WaveformModeOpts {
    #[command(flatten)]
    pub dev: DeviceOpts,
    #[command(flatten)]
    pub out: OutputOpts,
    #[command(flatten)]
    pub wave: WaveformOpts,
}

#[derive(Args, Debug, Clone)]
pub struct BothModeOpts {
    #[command(flatten)]
    pub dev: DeviceOpts,
    #[command(flatten)]
    pub out: OutputOpts,
    #[command(flatten)]
    pub hist: HistogramOpts,
    #[command(flatten)]
    pub wave: WaveformOpts,
}
