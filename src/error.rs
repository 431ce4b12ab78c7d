use std::io;

use thiserror::Error;

use crate::bridge::HandleId;

/// Errors raised by the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The executor reported failure for a fragment.
    #[error("remote execution failed for `{fragment}`: {message}")]
    RemoteExecution { fragment: String, message: String },

    /// The local value has no remote representation. Raised before any remote command.
    #[error("unsupported type for remote marshaling: {0}")]
    UnsupportedType(String),

    #[error("cannot convert remote text {text:?} to {expected}")]
    Conversion { text: String, expected: &'static str },

    #[error("handle {0} was not obtained through property access, so it has no receiver")]
    NoReceiver(HandleId),

    #[error("handle {0} has already been released")]
    StaleHandle(HandleId),

    /// A handle from one bridge was passed to an operation of another.
    #[error("handle {0} belongs to a different bridge")]
    ForeignHandle(HandleId),

    #[error("cannot reinitialize the remote store while {live} handle(s) are live")]
    StoreInUse { live: usize },

    #[error("invalid Lua name: {0:?}")]
    InvalidName(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
