//! Common error types for spindle
//!
//! One closed taxonomy shared by every component. Each error carries an
//! [`ErrorKind`] identifying the failure category and, through it, a
//! [`Blame`] naming the party responsible. The protocol layer uses the
//! blame to decide how a failure is reported; programmer-blamed failures
//! indicate a broken internal invariant and are not produced on the
//! recoverable paths.

use thiserror::Error;

/// Common result type for spindle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories across the daemon
///
/// Defined once at build time; every [`Error`] variant maps to exactly one
/// kind and every kind to exactly one blame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Tried to read a nonexistent file
    NoFile,
    /// State transition not allowed
    BadState,
    /// Command was malformed
    BadCommand,
    /// Tried to read a corrupt or unreadable file
    BadFile,
    /// Program improperly configured
    BadConfig,
    /// Couldn't open the audio backend
    AudioInit,
    /// General internal error, usually fatal
    Internal,
    /// Allocation of a playback resource failed
    NoMem,
    /// Reached end of stream while reading
    Eof,
    /// Incomplete computation, try again
    Incomplete,
    /// Unclassified failure
    Unknown,
}

/// Which party is responsible for an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blame {
    /// End-user is at fault (bad input, illegal request)
    User,
    /// Environment is at fault (missing device, corrupt file)
    Environment,
    /// Programmer is at fault (broken invariant, missing mapping)
    Programmer,
}

impl ErrorKind {
    /// Blame classification for this failure category
    pub fn blame(self) -> Blame {
        match self {
            ErrorKind::NoFile | ErrorKind::BadState | ErrorKind::BadCommand => Blame::User,
            ErrorKind::BadFile
            | ErrorKind::BadConfig
            | ErrorKind::AudioInit
            | ErrorKind::Eof
            | ErrorKind::Incomplete => Blame::Environment,
            ErrorKind::Internal | ErrorKind::NoMem | ErrorKind::Unknown => Blame::Programmer,
        }
    }
}

/// Common error type across the spindle crates
#[derive(Error, Debug)]
pub enum Error {
    /// Tried to read a nonexistent file
    #[error("no such file: {0}")]
    NoFile(String),

    /// State transition not allowed
    #[error("{0}")]
    BadState(&'static str),

    /// Command was malformed
    #[error("{0}")]
    BadCommand(String),

    /// Tried to read a corrupt file
    #[error("bad file: {0}")]
    BadFile(String),

    /// Program improperly configured
    #[error("bad configuration: {0}")]
    BadConfig(String),

    /// Couldn't open the audio backend
    #[error("audio backend init failed: {0}")]
    AudioInit(String),

    /// General internal error
    #[error("internal error: {0}")]
    Internal(String),

    /// Allocation of a playback resource failed
    #[error("out of memory: {0}")]
    NoMem(String),

    /// Reached end of stream while reading
    #[error("end of stream")]
    Eof,

    /// Incomplete computation, try again
    #[error("incomplete, try again")]
    Incomplete,

    /// Unclassified failure
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoFile(_) => ErrorKind::NoFile,
            Error::BadState(_) => ErrorKind::BadState,
            Error::BadCommand(_) => ErrorKind::BadCommand,
            Error::BadFile(_) => ErrorKind::BadFile,
            Error::BadConfig(_) => ErrorKind::BadConfig,
            Error::AudioInit(_) => ErrorKind::AudioInit,
            Error::Internal(_) => ErrorKind::Internal,
            Error::NoMem(_) => ErrorKind::NoMem,
            Error::Eof => ErrorKind::Eof,
            Error::Incomplete => ErrorKind::Incomplete,
            Error::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Blame classification, delegated to the kind
    pub fn blame(&self) -> Blame {
        self.kind().blame()
    }

    /// True when the failure is recoverable at the protocol level
    ///
    /// User and environment failures are reported and the daemon carries
    /// on; a programmer-blamed failure means an invariant broke.
    pub fn is_recoverable(&self) -> bool {
        self.blame() != Blame::Programmer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_blame_kinds() {
        assert_eq!(ErrorKind::NoFile.blame(), Blame::User);
        assert_eq!(ErrorKind::BadState.blame(), Blame::User);
        assert_eq!(ErrorKind::BadCommand.blame(), Blame::User);
    }

    #[test]
    fn test_environment_blame_kinds() {
        assert_eq!(ErrorKind::BadFile.blame(), Blame::Environment);
        assert_eq!(ErrorKind::BadConfig.blame(), Blame::Environment);
        assert_eq!(ErrorKind::AudioInit.blame(), Blame::Environment);
        assert_eq!(ErrorKind::Eof.blame(), Blame::Environment);
        assert_eq!(ErrorKind::Incomplete.blame(), Blame::Environment);
    }

    #[test]
    fn test_programmer_blame_kinds() {
        assert_eq!(ErrorKind::Internal.blame(), Blame::Programmer);
        assert_eq!(ErrorKind::NoMem.blame(), Blame::Programmer);
        assert_eq!(ErrorKind::Unknown.blame(), Blame::Programmer);
    }

    #[test]
    fn test_error_kind_round_trip() {
        let err = Error::NoFile("track.mp3".to_string());
        assert_eq!(err.kind(), ErrorKind::NoFile);
        assert_eq!(err.blame(), Blame::User);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_internal_errors_are_not_recoverable() {
        assert!(!Error::Internal("hit end of command list".to_string()).is_recoverable());
        assert!(Error::BadState("already playing").is_recoverable());
    }

    #[test]
    fn test_display_carries_reason() {
        let err = Error::BadState("player is shutting down");
        assert_eq!(err.to_string(), "player is shutting down");

        let err = Error::NoFile("missing.flac".to_string());
        assert_eq!(err.to_string(), "no such file: missing.flac");
    }
}
