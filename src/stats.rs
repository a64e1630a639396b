use std::time::Duration;

use log::info;

/// Byte and timing totals for a run of binary block transfers.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    pub blocks: u64,
    pub bytes: u64,
    busy: Duration,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, bytes: usize, took: Duration) {
        self.blocks += 1;
        self.bytes += bytes as u64;
        self.busy += took;
    }

    pub fn elapsed(&self) -> Duration {
        self.busy
    }

    pub fn kbytes_per_sec(&self) -> f64 {
        let secs = self.busy.as_secs_f64().max(1e-6);
        (self.bytes as f64) / secs / 1000.0
    }

    pub fn log(&self, what: &str) {
        info!(
            "[stats] {}: blocks={} bytes={} over {:.1} ms => {:.1} kB/s",
            what,
            self.blocks,
            self.bytes,
            self.elapsed().as_secs_f64() * 1000.0,
            self.kbytes_per_sec()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates() {
        let mut s = TransferStats::new();
        s.record(2000, Duration::from_millis(1));
        s.record(2000, Duration::from_millis(1));
        assert_eq!(s.blocks, 2);
        assert_eq!(s.bytes, 4000);
        assert_eq!(s.elapsed(), Duration::from_millis(2));
        assert!((s.kbytes_per_sec() - 2000.0).abs() < 1e-6);
    }
}
