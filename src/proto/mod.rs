pub mod codec;
pub mod command;
pub mod error;

pub use error::ProtoError;
