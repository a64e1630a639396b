use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod connection;
mod coordinator;
mod modes;
mod proto;
mod sample;
mod session;
mod sink;
mod stats;
#[cfg(test)]
mod testutil;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cli::Cli::parse();
    match args.cmd {
        cli::Cmd::Histogram(opts) => modes::histogram::run(opts),
        cli::Cmd::Waveform(opts) => modes::waveform::run(opts),
        cli::Cmd::Both(opts) => modes::both::run(opts),
        cli::Cmd::WaveformViaHistogram(opts) => modes::swap::run(opts),
    }
}
