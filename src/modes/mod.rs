use std::sync::atomic::AtomicBool;
use std::thread;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::cli::DeviceOpts;
use crate::config::HistogramConfig;
use crate::coordinator::histogram_flow;
use crate::session::DeviceSession;
use crate::sink::SampleSink;

pub mod both;
pub mod histogram;
pub mod swap;
pub mod waveform;

/// Connect, handshake and acquire the device, run `body`, then release.
/// On failure both connections are closed and the error is returned.
pub fn with_session(dev: &DeviceOpts, body: impl FnOnce(&mut DeviceSession) -> Result<()>) -> Result<()> {
    info!("[mode] connecting to {} (device {})", dev.host, dev.device);
    let mut session = DeviceSession::open(
        &dev.host,
        dev.control_port,
        dev.data_port,
        dev.device,
        &dev.retry_policy(),
    )
    .with_context(|| format!("opening session with {}", dev.host))?;

    let res = session
        .acquire_device()
        .context("acquiring device")
        .and_then(|_| body(&mut session));
    match res {
        Ok(()) => session.release_device().context("releasing device"),
        Err(e) => {
            warn!("[mode] aborting in state {:?}", session.state());
            session.close();
            Err(e)
        }
    }
}

/// Poll histograms on the control connection until `config.iterations`.
pub fn poll_histograms(
    session: &mut DeviceSession,
    config: &HistogramConfig,
    sink: &dyn SampleSink,
) -> Result<u32> {
    // nothing raises this outside combined mode
    let never = AtomicBool::new(false);
    let n = histogram_flow(config.iterations, config.poll_interval, &never, |_| {
        let h = session.fetch_histogram()?;
        sink.histogram(&h)?;
        Ok(())
    })
    .context("polling histograms")?;
    Ok(n)
}

/// One more histogram readout once acquisition is stopped.
pub fn read_final_histogram(
    session: &mut DeviceSession,
    config: &HistogramConfig,
    sink: &dyn SampleSink,
) -> Result<()> {
    thread::sleep(config.poll_interval);
    let h = session
        .fetch_histogram()
        .context("reading histogram after stop")?;
    sink.histogram(&h).context("storing final histogram")?;
    Ok(())
}
