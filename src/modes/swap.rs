use anyhow::{Context, Result};
use log::info;

use crate::cli::WaveformModeOpts;
use crate::modes::with_session;
use crate::proto::command::DeviceRole;
use crate::sink::SampleSink;

/// Post mortem capture of the time loss device's inputs: hand the time loss
/// role to the post mortem device, capture, then swap back.
pub fn run(opts: WaveformModeOpts) -> Result<()> {
    let config = opts.wave.to_config();
    let sink = opts.out.outputs().context("preparing outputs")?;

    with_session(&opts.dev, |s| {
        s.stop_acquisition().context("stopping acquisition")?;
        s.swap_device_roles(DeviceRole::PostMortem)
            .context("moving time loss role")?;
        s.start_waveform(&config)
            .context("setting up post mortem")?;
        s.arm_waveform_capture().context("arming post mortem")?;
        let blocks = s
            .fetch_waveform_blocks()
            .context("reading post mortem data")?;
        info!("[mode] {} post mortem blocks read", blocks.len());
        for b in &blocks {
            sink.waveform(b).context("storing post mortem block")?;
        }
        s.stop_acquisition().context("stopping acquisition")?;
        s.swap_device_roles(DeviceRole::TimeLoss)
            .context("restoring time loss role")?;
        s.stop_acquisition().context("stopping acquisition")?;
        Ok(())
    })
}
