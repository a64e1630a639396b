//! Command/response sequencing for one instrument session.
//!
//! A [`DeviceSession`] owns the control and the data connection and walks the
//! device through its lifecycle:
//!
//! ```text
//! Disconnected -> Connected -> DeviceAcquired -> Configured -> Acquiring -> Stopped -> Released
//! ```
//!
//! Every exchange blocks until its reply (or binary block) is complete. Any
//! failed exchange is returned to the caller; nothing here retries.

use std::io;
use std::time::Instant;

use log::{debug, info};

use crate::config::WaveformConfig;
use crate::connection::{Closer, RetryPolicy, Role, SessionConnection};
use crate::proto::ProtoError;
use crate::proto::command::{Command, DeviceRole};
use crate::sample::{Histogram, WaveformBlock};
use crate::stats::TransferStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    DeviceAcquired,
    Configured,
    Acquiring,
    Stopped,
    Released,
}

/// Shape of one post-mortem readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformSummary {
    pub channels: usize,
    pub blocks_per_channel: usize,
    pub block_bytes: usize,
}

#[derive(Debug)]
pub struct DeviceSession {
    control: SessionConnection,
    data: Option<SessionConnection>, // attached after the handshake
    device: u32,
    state: SessionState,
    waveform: Option<WaveformConfig>,
    armed: bool,
}

impl DeviceSession {
    pub fn new(control: SessionConnection, device: u32) -> Self {
        Self {
            control,
            data: None,
            device,
            state: SessionState::Disconnected,
            waveform: None,
            armed: false,
        }
    }

    /// Connect the control endpoint, handshake, then connect the data endpoint.
    pub fn open(
        host: &str,
        control_port: u16,
        data_port: u16,
        device: u32,
        policy: &RetryPolicy,
    ) -> Result<Self, ProtoError> {
        let control = SessionConnection::connect(Role::Control, host, control_port, policy)?;
        let mut session = Self::new(control, device);
        let res = session.handshake().and_then(|_| {
            let data = SessionConnection::connect(Role::Data, host, data_port, policy)?;
            session.attach_data(data);
            Ok(())
        });
        if let Err(e) = res {
            session.close();
            return Err(e);
        }
        Ok(session)
    }

    pub fn attach_data(&mut self, data: SessionConnection) {
        self.data = Some(data);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn require(&self, op: &'static str, allowed: &[SessionState]) -> Result<(), ProtoError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ProtoError::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    fn transact(&mut self, cmd: Command) -> Result<(), ProtoError> {
        self.control.send(&cmd)?;
        self.control.expect_ok(cmd.verb())
    }

    /// Greeting and version exchange; the device offers no renegotiation.
    pub fn handshake(&mut self) -> Result<(), ProtoError> {
        self.require("handshake", &[SessionState::Disconnected])?;
        self.control.send(&Command::Hello)?;
        self.control.expect("hello", "hello")?;
        self.control.send(&Command::Version)?;
        self.control.expect("version", "welcome")?;
        info!("[session] handshake complete");
        self.state = SessionState::Connected;
        Ok(())
    }

    pub fn acquire_device(&mut self) -> Result<(), ProtoError> {
        self.require("acquireDevice", &[SessionState::Connected])?;
        self.transact(Command::AcquireDevice {
            device: self.device,
        })?;
        info!("[session] device {} acquired", self.device);
        self.state = SessionState::DeviceAcquired;
        Ok(())
    }

    pub fn start_histogram(&mut self, threshold_mv: f64) -> Result<(), ProtoError> {
        self.require("setupHistogram", SETUP_STATES)?;
        self.transact(Command::SetupHistogram {
            device: self.device,
            threshold_mv,
        })?;
        info!("[session] histogram configured, threshold={} mV", threshold_mv);
        self.state = SessionState::Configured;
        Ok(())
    }

    pub fn start_waveform(&mut self, config: &WaveformConfig) -> Result<(), ProtoError> {
        self.require("setupPostMortem", SETUP_STATES)?;
        self.transact(Command::SetupPostMortem {
            device: self.device,
            config: config.clone(),
        })?;
        info!(
            "[session] post mortem configured, channels={:?} trigger={} {} {} mV",
            config.enabled_channels().iter().map(|(_, c)| *c).collect::<String>(),
            config.trigger_channel,
            config.trigger_direction,
            config.trigger_threshold_mv
        );
        self.waveform = Some(config.clone());
        self.state = SessionState::Configured;
        Ok(())
    }

    pub fn fetch_histogram(&mut self) -> Result<Histogram, ProtoError> {
        self.require(
            "getHistogram",
            &[
                SessionState::Configured,
                SessionState::Acquiring,
                SessionState::Stopped,
            ],
        )?;
        let h = read_histogram(&mut self.control, self.device)?;
        if self.state != SessionState::Stopped {
            self.state = SessionState::Acquiring;
        }
        Ok(h)
    }

    /// Arm the single-shot capture. The data arrives later on the data
    /// connection, once the device triggers.
    pub fn arm_waveform_capture(&mut self) -> Result<(), ProtoError> {
        self.require(
            "getPostMortemData",
            &[SessionState::Configured, SessionState::Acquiring],
        )?;
        if self.waveform.is_none() {
            return Err(ProtoError::InvalidState {
                op: "getPostMortemData",
                state: self.state,
            });
        }
        self.control.send(&Command::GetPostMortemData {
            device: self.device,
        })?;
        info!("[session] post mortem armed, waiting for trigger");
        self.armed = true;
        self.state = SessionState::Acquiring;
        Ok(())
    }

    /// Read one armed capture from the data connection, collecting every block.
    pub fn fetch_waveform_blocks(&mut self) -> Result<Vec<WaveformBlock>, ProtoError> {
        let mut blocks = Vec::new();
        self.stream_waveform_blocks(
            || {},
            |b| {
                blocks.push(b);
                Ok(())
            },
        )?;
        Ok(blocks)
    }

    /// Read one armed capture, handing each block to `on_block` as it lands.
    pub fn stream_waveform_blocks(
        &mut self,
        on_started: impl FnOnce(),
        on_block: impl FnMut(WaveformBlock) -> io::Result<()>,
    ) -> Result<WaveformSummary, ProtoError> {
        let (_, mut reader) = self.split()?;
        reader.fetch(on_started, on_block)
    }

    pub fn stop_acquisition(&mut self) -> Result<(), ProtoError> {
        self.require(
            "stopAcquisition",
            &[
                SessionState::DeviceAcquired,
                SessionState::Configured,
                SessionState::Acquiring,
                SessionState::Stopped,
            ],
        )?;
        self.transact(Command::StopAcquisition {
            device: self.device,
        })?;
        info!("[session] acquisition stopped");
        self.armed = false;
        self.state = SessionState::Stopped;
        Ok(())
    }

    /// Relabel which physical device plays the histogram role. With
    /// [`DeviceRole::PostMortem`] the histogram device's inputs can be read
    /// out through a regular post-mortem capture.
    pub fn swap_device_roles(&mut self, role: DeviceRole) -> Result<(), ProtoError> {
        self.require(
            "setTimelossDevice",
            &[SessionState::DeviceAcquired, SessionState::Stopped],
        )?;
        self.transact(Command::SetTimelossDevice {
            device: self.device,
            role,
        })?;
        info!("[session] time loss role now on {:?} device", role);
        Ok(())
    }

    /// Release the device, say `bye` and close both connections.
    pub fn release_device(&mut self) -> Result<(), ProtoError> {
        self.require(
            "releaseDevice",
            &[
                SessionState::DeviceAcquired,
                SessionState::Configured,
                SessionState::Acquiring,
                SessionState::Stopped,
            ],
        )?;
        self.transact(Command::ReleaseDevice {
            device: self.device,
        })?;
        // no reply to bye
        self.control.send(&Command::Bye)?;
        self.close();
        self.state = SessionState::Released;
        info!("[session] device {} released", self.device);
        Ok(())
    }

    pub fn close(&mut self) {
        self.control.close();
        if let Some(data) = &mut self.data {
            data.close();
        }
    }

    /// Split into the two halves the concurrent flows drive: histogram
    /// fetches on the control connection, the armed capture on the data
    /// connection. Consumes the armed capture.
    pub fn split(&mut self) -> Result<(HistogramReader<'_>, WaveformReader<'_>), ProtoError> {
        let (Some(config), Some(data), true) = (&self.waveform, self.data.as_mut(), self.armed) else {
            return Err(ProtoError::InvalidState {
                op: "getPostMortemData",
                state: self.state,
            });
        };
        let channels = config.enabled_channels().into_iter().map(|(_, c)| c).collect();
        self.armed = false;
        Ok((
            HistogramReader {
                conn: &mut self.control,
                device: self.device,
            },
            WaveformReader {
                conn: data,
                channels,
            },
        ))
    }
}

const SETUP_STATES: &[SessionState] = &[
    SessionState::DeviceAcquired,
    SessionState::Configured,
    SessionState::Stopped,
];

fn read_histogram(conn: &mut SessionConnection, device: u32) -> Result<Histogram, ProtoError> {
    conn.send(&Command::GetHistogram { device })?;
    let size = conn.read_int("getHistogram size")?;
    let size = usize::try_from(size).map_err(|_| ProtoError::MalformedReply {
        exchange: "getHistogram size",
        line: size.to_string(),
    })?;
    let bins = conn.read_block::<i32>(size)?;
    conn.expect_ok("getHistogram")?;
    let h = Histogram { bins };
    info!(
        "[session] histogram length {} bins, time interval {:.1} ns",
        h.bins.len(),
        h.span_ns()
    );
    Ok(h)
}

/// Control-connection half used by the histogram flow.
pub struct HistogramReader<'a> {
    conn: &'a mut SessionConnection,
    device: u32,
}

impl HistogramReader<'_> {
    pub fn fetch(&mut self) -> Result<Histogram, ProtoError> {
        read_histogram(self.conn, self.device)
    }
}

/// Data-connection half used by the waveform flow.
pub struct WaveformReader<'a> {
    conn: &'a mut SessionConnection,
    channels: Vec<char>,
}

impl WaveformReader<'_> {
    pub fn closer(&self) -> Result<Closer, ProtoError> {
        self.conn.closer()
    }

    /// Status line, buffer size per channel (fires `on_started`), sub-block
    /// count, then every sub-block of every enabled channel in A,B,C,D order.
    pub fn fetch(
        &mut self,
        on_started: impl FnOnce(),
        mut on_block: impl FnMut(WaveformBlock) -> io::Result<()>,
    ) -> Result<WaveformSummary, ProtoError> {
        self.conn.expect_ok("getPostMortemData")?;
        let buffer = self.conn.read_int("post mortem buffer size")?;
        on_started();
        let blocks = self.conn.read_int("post mortem sub-block count")?;
        debug!("[session] post mortem buffer={} bytes blocks={}", buffer, blocks);

        if self.channels.is_empty() {
            return Err(ProtoError::ChannelCountMismatch {
                configured: 0,
                offered: format!("{} bytes per channel", buffer),
            });
        }
        if blocks < 1 || buffer < 0 || buffer % blocks != 0 {
            return Err(ProtoError::BlockLayout { buffer, blocks });
        }
        let block_bytes = (buffer / blocks) as usize;
        let blocks = blocks as usize;

        for &channel in &self.channels {
            let mut stats = TransferStats::new();
            for index in 0..blocks {
                let t0 = Instant::now();
                let samples = self.conn.read_block::<i16>(block_bytes)?;
                stats.record(block_bytes, t0.elapsed());
                on_block(WaveformBlock {
                    channel,
                    index,
                    samples,
                })?;
            }
            stats.log(&format!("channel {}", channel));
        }

        Ok(WaveformSummary {
            channels: self.channels.len(),
            blocks_per_channel: blocks,
            block_bytes,
        })
    }
}
