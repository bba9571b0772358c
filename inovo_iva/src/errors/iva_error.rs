use std::io;

use thiserror::Error;

/// Failures of the socket layer. Surfaced to the session unchanged; nothing
/// here is retried except listener accepts, which never produce an error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("read error: {0}")]
    Read(#[source] io::Error),
    #[error("end of communication")]
    EndOfCommunication,
    #[error("write error: {0}")]
    Write(#[source] io::Error),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

/// Local encode/decode failures. These never reach the wire.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("field `{field}` cannot be encoded: {reason}")]
    UnencodableValue { field: String, reason: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Raised while building a command, before any I/O happens.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("invalid motion target: {0}")]
    InvalidTarget(String),
    #[error("parameter `{field}` = {value} is outside {min}..={max}")]
    ParameterOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("expected 6 joint values, got {0}")]
    InvalidJointCount(usize),
    #[error("joint index {0} is outside 1..=6")]
    InvalidJointIndex(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("pop requested with no open context")]
    EmptyContextStack,
    #[error("controller rejected instruction: {0}")]
    ControllerRejected(String),
}

#[derive(Debug, Error)]
pub enum IvaError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("bridge call failed: {0}")]
    Bridge(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IvaError {
    /// The controller's literal reply when it rejected an instruction.
    pub fn rejection(&self) -> Option<&str> {
        match self {
            IvaError::Session(SessionError::ControllerRejected(msg)) => Some(msg),
            _ => None,
        }
    }

    pub fn is_end_of_communication(&self) -> bool {
        matches!(self, IvaError::Transport(TransportError::EndOfCommunication))
    }
}
