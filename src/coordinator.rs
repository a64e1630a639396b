//! Histogram polling and single-shot waveform capture, side by side.
//!
//! Both flows are configured sequentially on the control connection, then
//! run on scoped threads: the histogram flow keeps polling the control
//! connection, the waveform flow blocks on the data connection until the
//! device triggers. The waveform flow raises a shared flag as soon as the
//! capture begins to arrive; the histogram flow checks it at every iteration
//! boundary and stops. Neither flow is interrupted mid-read.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{error, info};

use crate::config::{HistogramConfig, WaveformConfig};
use crate::proto::ProtoError;
use crate::session::{DeviceSession, WaveformSummary};
use crate::sink::SampleSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Histogram,
    Waveform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedOutcome {
    pub histograms: u32,
    pub waveform: WaveformSummary,
}

/// Fetch histograms until `iterations` is reached or `stop` is raised.
/// `stop` is checked before each wait and again right before each fetch.
/// Returns the number of completed fetches.
pub fn histogram_flow(
    iterations: Option<u32>,
    poll_interval: Duration,
    stop: &AtomicBool,
    mut fetch: impl FnMut(u32) -> Result<(), ProtoError>,
) -> Result<u32, ProtoError> {
    let mut done = 0;
    loop {
        if let Some(max) = iterations
            && done >= max
        {
            break;
        }
        if stop.load(Ordering::Acquire) {
            break;
        }
        if !poll_interval.is_zero() {
            thread::sleep(poll_interval);
            if stop.load(Ordering::Acquire) {
                break;
            }
        }
        fetch(done)?;
        done += 1;
    }
    Ok(done)
}

/// Configure both modes, arm the capture and run both flows to completion.
/// The first error to occur is returned once both flows have finished.
pub fn run_combined(
    session: &mut DeviceSession,
    histogram: &HistogramConfig,
    waveform: &WaveformConfig,
    sink: &dyn SampleSink,
) -> Result<CombinedOutcome, ProtoError> {
    session.start_histogram(histogram.threshold_mv)?;
    session.start_waveform(waveform)?;
    session.arm_waveform_capture()?;

    // scoped to this run
    let waveform_started = AtomicBool::new(false);
    let first_failure: OnceLock<Flow> = OnceLock::new();

    let (mut hist, mut wave) = session.split()?;
    let data_closer = wave.closer()?;

    let (hist_res, wave_res) = thread::scope(|s| {
        let h = s.spawn(|| {
            let res = histogram_flow(
                histogram.iterations,
                histogram.poll_interval,
                &waveform_started,
                |_| {
                    let h = hist.fetch()?;
                    sink.histogram(&h)?;
                    Ok(())
                },
            );
            match &res {
                Ok(n) => info!("[coord] histogram flow ended after {} fetches", n),
                Err(e) => {
                    let _ = first_failure.set(Flow::Histogram);
                    error!("[coord] histogram flow failed: {}", e);
                    // a capture that never triggers would block forever;
                    // one already arriving is read to the end
                    if !waveform_started.load(Ordering::Acquire) {
                        data_closer.close();
                    }
                }
            }
            res
        });
        let w = s.spawn(|| {
            let res = wave.fetch(
                || {
                    info!("[coord] post mortem data arriving, stopping histogram polling");
                    waveform_started.store(true, Ordering::Release);
                },
                |block| sink.waveform(&block),
            );
            match &res {
                Ok(summary) => info!(
                    "[coord] waveform flow ended: {} channel(s) x {} block(s) of {} bytes",
                    summary.channels, summary.blocks_per_channel, summary.block_bytes
                ),
                Err(e) => {
                    let _ = first_failure.set(Flow::Waveform);
                    error!("[coord] waveform flow failed: {}", e);
                    waveform_started.store(true, Ordering::Release);
                }
            }
            res
        });
        (
            h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)),
            w.join().unwrap_or_else(|p| std::panic::resume_unwind(p)),
        )
    });

    match (hist_res, wave_res) {
        (Ok(histograms), Ok(waveform)) => Ok(CombinedOutcome {
            histograms,
            waveform,
        }),
        (Err(he), Err(we)) => match first_failure.get() {
            Some(Flow::Waveform) => Err(we),
            _ => Err(he),
        },
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}
