//! Error types for inbibw

use std::path::PathBuf;

use thiserror::Error;

/// Result type for benchmark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for benchmark operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration (non-positive iteration count,
    /// zero message size, unknown transport, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A message size string could not be parsed
    #[error("Invalid size '{input}': {reason}")]
    InvalidSize {
        /// The string as given on the command line
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// The traffic pattern needs more participants than the group holds
    #[error("Need at least {required} participants, got {available}")]
    InsufficientParticipants {
        /// Minimum group size for the pattern
        required: usize,
        /// Actual group size
        available: usize,
    },

    /// Elapsed time too small to derive a rate from
    #[error("Unmeasurable duration: {elapsed:e} s")]
    UnmeasurableDuration {
        /// The measured elapsed time in seconds
        elapsed: f64,
    },

    /// A send, receive, barrier or reduction failed to complete
    #[error("Transport failure: {0}")]
    Transport(String),

    /// MPI error with code
    #[error("MPI error (code {0})")]
    Mpi(i32),

    /// MPI has already been initialized
    #[error("MPI has already been initialized")]
    AlreadyInitialized,

    /// Invalid rank specified
    #[error("Invalid rank: {0}")]
    InvalidRank(usize),

    /// Filesystem error from the hostfile tool
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an error from an MPI return code.
    pub fn from_code(code: i32) -> Self {
        Error::Mpi(code)
    }

    /// Check an MPI return code, returning Ok(()) for success.
    pub fn check(code: i32) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(Error::from_code(code))
        }
    }

    /// Whether this error must bring down the whole distributed job.
    ///
    /// Configuration and transport failures are fatal: a benchmark run by an
    /// inconsistent subset of participants produces meaningless numbers, and a
    /// participant that quits alone leaves its peers blocked. Skipped tests and
    /// undefined rates are reported and the run continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::InsufficientParticipants { .. } | Error::UnmeasurableDuration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_success_code() {
        assert!(Error::check(0).is_ok());
    }

    #[test]
    fn check_failure_code_keeps_value() {
        match Error::check(17) {
            Err(Error::Mpi(code)) => assert_eq!(code, 17),
            other => panic!("expected Mpi error, got {other:?}"),
        }
    }

    #[test]
    fn fatal_classification() {
        assert!(Error::Configuration("bad".into()).is_fatal());
        assert!(Error::Transport("lost peer".into()).is_fatal());
        assert!(Error::Mpi(1).is_fatal());
        assert!(!Error::InsufficientParticipants {
            required: 2,
            available: 1
        }
        .is_fatal());
        assert!(!Error::UnmeasurableDuration { elapsed: 0.0 }.is_fatal());
    }

    #[test]
    fn display_messages() {
        let err = Error::InvalidSize {
            input: "3x".into(),
            reason: "unknown size suffix 'x'".into(),
        };
        assert_eq!(format!("{err}"), "Invalid size '3x': unknown size suffix 'x'");

        let err = Error::InsufficientParticipants {
            required: 2,
            available: 1,
        };
        assert_eq!(format!("{err}"), "Need at least 2 participants, got 1");
    }
}
