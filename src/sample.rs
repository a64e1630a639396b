/// Width of one histogram bin.
pub const BIN_WIDTH_NS: f64 = 1.6;

/// One time-loss histogram as returned by `getHistogram`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bins: Vec<i32>,
}

impl Histogram {
    /// Start time of bin `i`.
    pub fn time_ns(i: usize) -> f64 {
        i as f64 * BIN_WIDTH_NS
    }

    pub fn span_ns(&self) -> f64 {
        Self::time_ns(self.bins.len())
    }
}

/// One sub-block of a channel's post-mortem buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformBlock {
    pub channel: char,
    pub index: usize, // sub-block number within the channel
    pub samples: Vec<i16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_labels() {
        assert_eq!(Histogram::time_ns(0), 0.0);
        assert!((Histogram::time_ns(10) - 16.0).abs() < 1e-9);
        let h = Histogram {
            bins: vec![0; 1000],
        };
        assert!((h.span_ns() - 1600.0).abs() < 1e-9);
    }
}
