use thiserror::Error;

use crate::connection::Role;
use crate::session::SessionState;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("could not connect {role} endpoint {addr} after {attempts} attempts")]
    FatalConnect {
        role: Role,
        addr: String,
        attempts: u32,
    },
    #[error("{exchange}: expected reply {expected:?}, got {got:?}")]
    UnexpectedReply {
        exchange: &'static str,
        expected: String,
        got: String,
    },
    #[error("{exchange}: expected an integer, got {line:?}")]
    MalformedReply {
        exchange: &'static str,
        line: String,
    },
    #[error("short read: expected {expected} bytes, stream closed after {got}")]
    ShortRead { expected: usize, got: usize },
    #[error("reply line exceeds {limit} bytes without a terminator")]
    LineTooLong { limit: usize },
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("channel count mismatch: {configured} channel(s) enabled, device offered {offered}")]
    ChannelCountMismatch { configured: usize, offered: String },
    #[error("buffer of {buffer} bytes cannot be split into {blocks} sub-block(s)")]
    BlockLayout { buffer: i64, blocks: i64 },
    #[error("block of {bytes} bytes is not a multiple of the {width}-byte sample width")]
    MisalignedBlock { bytes: usize, width: usize },
    #[error("{op} not allowed in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: SessionState,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
