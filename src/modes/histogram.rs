use anyhow::{Context, Result};
use log::info;

use crate::cli::HistogramModeOpts;
use crate::modes::{poll_histograms, read_final_histogram, with_session};

pub fn run(opts: HistogramModeOpts) -> Result<()> {
    let config = opts.hist.to_config();
    let sink = opts.out.outputs().context("preparing outputs")?;

    with_session(&opts.dev, |s| {
        s.start_histogram(config.threshold_mv)
            .context("setting up histogram")?;
        let n = poll_histograms(s, &config, &sink)?;
        info!("[mode] {} histograms read", n);
        s.stop_acquisition().context("stopping acquisition")?;
        read_final_histogram(s, &config, &sink)
    })
}
