use std::time::Duration;

use crate::proto::command::{TriggerChannel, TriggerDirection, VerticalRange};

/// Channel labels in configuration order.
pub const CHANNEL_NAMES: [char; 4] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Clone)]
pub struct HistogramConfig {
    pub iterations: Option<u32>, // None = poll until stopped
    pub threshold_mv: f64,
    pub poll_interval: Duration, // sleep before each fetch
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformConfig {
    /// Positive: start this many samples after the trigger; negative: pre-trigger samples.
    pub delay_samples: i64,
    pub ranges: [VerticalRange; 4],
    pub trigger_channel: TriggerChannel,
    pub trigger_threshold_mv: i16,
    pub trigger_direction: TriggerDirection,
    pub sample_count: i64,     // -1 = maximum
    pub sampling_period_s: f64, // -1 = minimum
}

impl WaveformConfig {
    /// Enabled channels as (configuration index, label), in A,B,C,D order.
    pub fn enabled_channels(&self) -> Vec<(usize, char)> {
        self.ranges
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_enabled())
            .map(|(i, _)| (i, CHANNEL_NAMES[i]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_channels_skip_disabled() {
        let mut c = WaveformConfig {
            delay_samples: 0,
            ranges: [VerticalRange::Disabled; 4],
            trigger_channel: TriggerChannel::A,
            trigger_threshold_mv: 100,
            trigger_direction: TriggerDirection::Rising,
            sample_count: -1,
            sampling_period_s: -1.0,
        };
        assert!(c.enabled_channels().is_empty());
        c.ranges[1] = VerticalRange::V2;
        c.ranges[3] = VerticalRange::Mv100;
        assert_eq!(c.enabled_channels(), vec![(1, 'B'), (3, 'D')]);
    }
}
