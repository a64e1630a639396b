use anyhow::{Context, Result};
use log::info;

use crate::cli::WaveformModeOpts;
use crate::modes::with_session;
use crate::sink::SampleSink;

pub fn run(opts: WaveformModeOpts) -> Result<()> {
    let config = opts.wave.to_config();
    let sink = opts.out.outputs().context("preparing outputs")?;

    with_session(&opts.dev, |s| {
        s.start_waveform(&config)
            .context("setting up post mortem")?;
        s.arm_waveform_capture().context("arming post mortem")?;
        let summary = s
            .stream_waveform_blocks(
                || info!("[mode] triggered, reading post mortem data"),
                |b| sink.waveform(&b),
            )
            .context("reading post mortem data")?;
        info!(
            "[mode] post mortem: {} channel(s) x {} block(s) of {} bytes",
            summary.channels, summary.blocks_per_channel, summary.block_bytes
        );
        s.stop_acquisition().context("stopping acquisition")?;
        Ok(())
    })
}
