use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, info};

use crate::sample::{Histogram, WaveformBlock};

const HISTOGRAM_PREVIEW_BINS: usize = 20;
const WAVEFORM_PREVIEW_EDGE: usize = 5;

/// Receives every parsed sample buffer. Shared by both acquisition flows.
pub trait SampleSink: Sync {
    fn histogram(&self, h: &Histogram) -> io::Result<()>;
    fn waveform(&self, block: &WaveformBlock) -> io::Result<()>;
}

/// Prints a short excerpt of each buffer to stdout.
#[derive(Debug, Default)]
pub struct ConsolePreview;

impl SampleSink for ConsolePreview {
    fn histogram(&self, h: &Histogram) -> io::Result<()> {
        write_histogram_preview(&mut io::stdout().lock(), h)
    }
    fn waveform(&self, block: &WaveformBlock) -> io::Result<()> {
        write_waveform_preview(&mut io::stdout().lock(), block)
    }
}

pub fn write_histogram_preview(w: &mut impl Write, h: &Histogram) -> io::Result<()> {
    writeln!(w, "HISTOGRAM ({} bins, {:.1} ns):", h.bins.len(), h.span_ns())?;
    for (i, v) in h.bins.iter().take(HISTOGRAM_PREVIEW_BINS).enumerate() {
        writeln!(w, "{:.1} , {}", Histogram::time_ns(i), v)?;
    }
    writeln!(w)
}

pub fn write_waveform_preview(w: &mut impl Write, block: &WaveformBlock) -> io::Result<()> {
    let n = block.samples.len();
    writeln!(
        w,
        "DATA channel {} block {} ({} samples):",
        block.channel, block.index, n
    )?;
    if n <= 2 * WAVEFORM_PREVIEW_EDGE {
        for (i, v) in block.samples.iter().enumerate() {
            writeln!(w, "{} , {}", i, v)?;
        }
    } else {
        for (i, v) in block.samples.iter().enumerate().take(WAVEFORM_PREVIEW_EDGE) {
            writeln!(w, "{} , {}", i, v)?;
        }
        writeln!(w, "...")?;
        for (i, v) in block.samples.iter().enumerate().skip(n - WAVEFORM_PREVIEW_EDGE) {
            writeln!(w, "{} , {}", i, v)?;
        }
    }
    writeln!(w)
}

/// One text file per histogram (`<utc>_TL-<n>.txt`) and per waveform
/// sub-block (`PM-<n>.txt`), each line `index , value`.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    histograms: AtomicU32,
    blocks: AtomicU32,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            histograms: AtomicU32::new(0),
            blocks: AtomicU32::new(0),
        })
    }
}

fn write_listing<T: std::fmt::Display>(path: &Path, values: &[T]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for (i, v) in values.iter().enumerate() {
        writeln!(w, "{} , {}", i, v)?;
    }
    w.flush()?;
    debug!("[sink] wrote {} ({} values)", path.display(), values.len());
    Ok(())
}

impl SampleSink for FileSink {
    fn histogram(&self, h: &Histogram) -> io::Result<()> {
        let n = self.histograms.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        write_listing(&self.dir.join(format!("{}_TL-{}.txt", stamp, n)), &h.bins)
    }
    fn waveform(&self, block: &WaveformBlock) -> io::Result<()> {
        let n = self.blocks.fetch_add(1, Ordering::Relaxed);
        write_listing(&self.dir.join(format!("PM-{}.txt", n)), &block.samples)
    }
}

/// The sinks selected on the command line.
#[derive(Debug, Default)]
pub struct Outputs {
    preview: Option<ConsolePreview>,
    files: Option<FileSink>,
}

impl Outputs {
    pub fn new(preview: bool, save_dir: Option<&Path>) -> io::Result<Self> {
        let files = match save_dir {
            Some(dir) => {
                info!("[sink] saving samples under {}", dir.display());
                Some(FileSink::new(dir)?)
            }
            None => None,
        };
        Ok(Self {
            preview: preview.then_some(ConsolePreview),
            files,
        })
    }
}

impl SampleSink for Outputs {
    fn histogram(&self, h: &Histogram) -> io::Result<()> {
        if let Some(p) = &self.preview {
            p.histogram(h)?;
        }
        if let Some(f) = &self.files {
            f.histogram(h)?;
        }
        Ok(())
    }
    fn waveform(&self, block: &WaveformBlock) -> io::Result<()> {
        if let Some(p) = &self.preview {
            p.waveform(block)?;
        }
        if let Some(f) = &self.files {
            f.waveform(block)?;
        }
        Ok(())
    }
}
