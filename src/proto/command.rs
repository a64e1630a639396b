use std::fmt;
use std::str::FromStr;

use super::codec::encode_command;
use crate::config::WaveformConfig;

/// Success token for every procedure/function reply.
pub const RESPONSE_OK: &str = "0";

#[derive(Debug, Clone)]
pub enum Command {
    // ---- Handshake ----
    Hello,
    Version,

    // ---- Device lifecycle ----
    AcquireDevice { device: u32 },
    ReleaseDevice { device: u32 },
    StopAcquisition { device: u32 },
    SetTimelossDevice { device: u32, role: DeviceRole },

    // ---- Histogram ----
    SetupHistogram { device: u32, threshold_mv: f64 },
    GetHistogram { device: u32 },

    // ---- Post mortem (waveform) ----
    SetupPostMortem { device: u32, config: WaveformConfig },
    GetPostMortemData { device: u32 },

    // ---- Terminate ----
    Bye,
}

impl Command {
    /// Wire lines: verb first, then positional arguments.
    pub fn lines(&self) -> Vec<String> {
        use Command::*;
        match self {
            Hello => vec!["hello".into()],
            Version => vec!["version 1.0".into()],
            AcquireDevice { device } => vec!["function acquireDevice".into(), device.to_string()],
            ReleaseDevice { device } => vec!["procedure releaseDevice".into(), device.to_string()],
            StopAcquisition { device } => {
                vec!["procedure stopAcquisition".into(), device.to_string()]
            }
            SetTimelossDevice { device, role } => vec![
                "procedure setTimelossDevice".into(),
                device.to_string(),
                (*role as u32).to_string(),
            ],
            SetupHistogram {
                device,
                threshold_mv,
            } => vec![
                "procedure setupHistogram".into(),
                device.to_string(),
                threshold_mv.to_string(),
            ],
            GetHistogram { device } => vec!["function getHistogram".into(), device.to_string()],
            SetupPostMortem { device, config } => {
                let mut out = vec!["procedure setupPostMortem".to_string()];
                out.extend(waveform_args(*device, config));
                out
            }
            GetPostMortemData { device } => {
                vec!["function getPostMortemData".into(), device.to_string()]
            }
            Bye => vec!["bye".into()],
        }
    }

    /// Short name used in diagnostics.
    pub fn verb(&self) -> &'static str {
        use Command::*;
        match self {
            Hello => "hello",
            Version => "version",
            AcquireDevice { .. } => "acquireDevice",
            ReleaseDevice { .. } => "releaseDevice",
            StopAcquisition { .. } => "stopAcquisition",
            SetTimelossDevice { .. } => "setTimelossDevice",
            SetupHistogram { .. } => "setupHistogram",
            GetHistogram { .. } => "getHistogram",
            SetupPostMortem { .. } => "setupPostMortem",
            GetPostMortemData { .. } => "getPostMortemData",
            Bye => "bye",
        }
    }
}

/// Public API: serialize a command to newline-terminated lines.
pub fn format_command(cmd: &Command) -> String {
    encode_command(&cmd.lines())
}

/// Positional arguments of `procedure setupPostMortem`. The device has no
/// field names, so this order is the protocol.
pub fn waveform_args(device: u32, c: &WaveformConfig) -> Vec<String> {
    vec![
        device.to_string(),
        c.delay_samples.to_string(),
        c.ranges[0].code().to_string(),
        c.ranges[1].code().to_string(),
        c.ranges[2].code().to_string(),
        c.ranges[3].code().to_string(),
        c.trigger_channel.as_str().to_string(),
        c.trigger_threshold_mv.to_string(),
        c.trigger_direction.as_str().to_string(),
        c.sample_count.to_string(),
        c.sampling_period_s.to_string(),
    ]
}

/// Inverse of [`waveform_args`], as the instrument reads them.
#[cfg(test)]
pub fn parse_waveform_args(args: &[String]) -> Result<(u32, WaveformConfig), String> {
    if args.len() != 11 {
        return Err(format!("expected 11 arguments, got {}", args.len()));
    }
    fn num<T: FromStr>(s: &str, what: &str) -> Result<T, String> {
        s.parse::<T>().map_err(|_| format!("bad {what}: {s}"))
    }
    let range = |s: &str| VerticalRange::from_code(num(s, "range")?);
    Ok((
        num(&args[0], "device")?,
        WaveformConfig {
            delay_samples: num(&args[1], "delay")?,
            ranges: [
                range(&args[2])?,
                range(&args[3])?,
                range(&args[4])?,
                range(&args[5])?,
            ],
            trigger_channel: args[6].parse()?,
            trigger_threshold_mv: num(&args[7], "threshold")?,
            trigger_direction: args[8].parse()?,
            sample_count: num(&args[9], "sample count")?,
            sampling_period_s: num(&args[10], "sampling period")?,
        },
    ))
}

/// Which physical device plays the histogram (time loss) role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    TimeLoss = 0,
    PostMortem = 1,
}

/// Input range of one channel; `Disabled` switches the channel off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalRange {
    Mv100,
    Mv200,
    Mv500,
    V1,
    V2,
    V5,
    V10,
    V20,
    Disabled,
}

impl VerticalRange {
    pub fn code(self) -> i32 {
        match self {
            VerticalRange::Mv100 => 3,
            VerticalRange::Mv200 => 4,
            VerticalRange::Mv500 => 5,
            VerticalRange::V1 => 6,
            VerticalRange::V2 => 7,
            VerticalRange::V5 => 8,
            VerticalRange::V10 => 9,
            VerticalRange::V20 => 10,
            VerticalRange::Disabled => -1,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, String> {
        Ok(match code {
            3 => VerticalRange::Mv100,
            4 => VerticalRange::Mv200,
            5 => VerticalRange::Mv500,
            6 => VerticalRange::V1,
            7 => VerticalRange::V2,
            8 => VerticalRange::V5,
            9 => VerticalRange::V10,
            10 => VerticalRange::V20,
            -1 => VerticalRange::Disabled,
            _ => return Err(format!("unknown range code {code}")),
        })
    }

    pub fn is_enabled(self) -> bool {
        self != VerticalRange::Disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerChannel {
    A,
    B,
    C,
    D,
    Ext,
}

impl TriggerChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerChannel::A => "A",
            TriggerChannel::B => "B",
            TriggerChannel::C => "C",
            TriggerChannel::D => "D",
            TriggerChannel::Ext => "EXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDirection {
    Rising,
    Falling,
    RiseFall,
}

impl TriggerDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerDirection::Rising => "RISING",
            TriggerDirection::Falling => "FALLING",
            TriggerDirection::RiseFall => "RISE_FALL",
        }
    }
}

// FromStr for CLI parsing and for reading arguments back.

impl FromStr for VerticalRange {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // raw range codes are accepted too
        if let Ok(code) = s.parse::<i32>() {
            return Self::from_code(code);
        }
        match s.to_ascii_lowercase().as_str() {
            "100mv" => Ok(VerticalRange::Mv100),
            "200mv" => Ok(VerticalRange::Mv200),
            "500mv" => Ok(VerticalRange::Mv500),
            "1v" => Ok(VerticalRange::V1),
            "2v" => Ok(VerticalRange::V2),
            "5v" => Ok(VerticalRange::V5),
            "10v" => Ok(VerticalRange::V10),
            "20v" => Ok(VerticalRange::V20),
            "off" | "disabled" => Ok(VerticalRange::Disabled),
            _ => Err(format!(
                "range must be one of 100mV, 200mV, 500mV, 1V, 2V, 5V, 10V, 20V, off (got {s})"
            )),
        }
    }
}

impl FromStr for TriggerChannel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(TriggerChannel::A),
            "B" => Ok(TriggerChannel::B),
            "C" => Ok(TriggerChannel::C),
            "D" => Ok(TriggerChannel::D),
            "EXT" => Ok(TriggerChannel::Ext),
            _ => Err(format!("trigger channel must be A, B, C, D or EXT (got {s})")),
        }
    }
}

impl FromStr for TriggerDirection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RISING" => Ok(TriggerDirection::Rising),
            "FALLING" => Ok(TriggerDirection::Falling),
            "RISE_FALL" => Ok(TriggerDirection::RiseFall),
            _ => Err(format!(
                "trigger direction must be RISING, FALLING or RISE_FALL (got {s})"
            )),
        }
    }
}

impl fmt::Display for TriggerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TriggerDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ---------- tests ---------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> WaveformConfig {
        WaveformConfig {
            delay_samples: -250,
            ranges: [
                VerticalRange::V1,
                VerticalRange::Disabled,
                VerticalRange::Mv200,
                VerticalRange::Disabled,
            ],
            trigger_channel: TriggerChannel::Ext,
            trigger_threshold_mv: 250,
            trigger_direction: TriggerDirection::RiseFall,
            sample_count: 1_000_000,
            sampling_period_s: -1.0,
        }
    }

    #[test]
    fn waveform_args_fixed_order() {
        let args = waveform_args(0, &sample_config());
        assert_eq!(
            args,
            vec!["0", "-250", "6", "-1", "4", "-1", "EXT", "250", "RISE_FALL", "1000000", "-1"]
        );
    }

    #[test]
    fn waveform_args_read_back() {
        let config = sample_config();
        let (device, parsed) = parse_waveform_args(&waveform_args(1, &config)).unwrap();
        assert_eq!(device, 1);
        assert_eq!(parsed, config);
    }

    #[test]
    fn setup_post_mortem_is_verb_plus_args() {
        let cmd = Command::SetupPostMortem {
            device: 0,
            config: sample_config(),
        };
        let line = format_command(&cmd);
        assert!(line.starts_with("procedure setupPostMortem\n0\n-250\n6\n"));
        assert!(line.ends_with("1000000\n-1\n"));
        assert_eq!(line.matches('\n').count(), 12);
    }

    #[test]
    fn simple_commands() {
        assert_eq!(format_command(&Command::Hello), "hello\n");
        assert_eq!(format_command(&Command::Version), "version 1.0\n");
        assert_eq!(
            format_command(&Command::SetupHistogram {
                device: 0,
                threshold_mv: 15.0
            }),
            "procedure setupHistogram\n0\n15\n"
        );
        assert_eq!(
            format_command(&Command::SetTimelossDevice {
                device: 0,
                role: DeviceRole::PostMortem
            }),
            "procedure setTimelossDevice\n0\n1\n"
        );
        assert_eq!(format_command(&Command::Bye), "bye\n");
    }

    #[test]
    fn enum_parsing() {
        assert_eq!("1V".parse::<VerticalRange>().unwrap(), VerticalRange::V1);
        assert_eq!("off".parse::<VerticalRange>().unwrap(), VerticalRange::Disabled);
        assert!("3V".parse::<VerticalRange>().is_err());
        assert_eq!("ext".parse::<TriggerChannel>().unwrap(), TriggerChannel::Ext);
        assert_eq!(
            "rise_fall".parse::<TriggerDirection>().unwrap(),
            TriggerDirection::RiseFall
        );
        assert_eq!("6".parse::<VerticalRange>().unwrap(), VerticalRange::V1);
        assert_eq!("-1".parse::<VerticalRange>().unwrap(), VerticalRange::Disabled);
        assert!("2".parse::<VerticalRange>().is_err());
    }
}
