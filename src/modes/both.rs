use anyhow::{Context, Result};
use log::info;

use crate::cli::BothModeOpts;
use crate::coordinator::run_combined;
use crate::modes::{read_final_histogram, with_session};

pub fn run(opts: BothModeOpts) -> Result<()> {
    let hist = opts.hist.to_config();
    let wave = opts.wave.to_config();
    let sink = opts.out.outputs().context("preparing outputs")?;

    with_session(&opts.dev, |s| {
        let outcome =
            run_combined(s, &hist, &wave, &sink).context("parallel time loss / post mortem run")?;
        info!(
            "[mode] parallel run done: {} histograms, {} channel(s) of post mortem data",
            outcome.histograms, outcome.waveform.channels
        );
        s.stop_acquisition().context("stopping acquisition")?;
        read_final_histogram(s, &hist, &sink)
    })
}
