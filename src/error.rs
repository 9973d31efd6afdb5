use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::{Frame, PlayerHandle};

/// This enum contains all error messages this library can return. Most API
/// functions will generally return a [`Result<(), NetplayError>`].
///
/// Mispredictions are *not* errors; they are handled internally by rollback.
///
/// [`Result<(), NetplayError>`]: std::result::Result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetplayError {
    /// Advancing one more frame would push the number of still-unconfirmed
    /// predicted frames past the configured bound. The driver must skip ticks
    /// until remote confirmations catch up.
    PredictionThreshold,
    /// A correction arrived for a frame older than the retained history
    /// window. The pre-image state is gone, so the correction cannot be
    /// applied locally; the simulation has provably diverged for that frame.
    ///
    /// This is reported, never fatal: the driver loop should keep running in
    /// a degraded state and rely on authoritative state sync (if any).
    StaleCorrection {
        /// The frame the correction targeted.
        frame: Frame,
        /// The oldest frame still retained in history.
        oldest_retained: Frame,
    },
    /// A message referenced a player handle that is not a remote participant
    /// of this session.
    InvalidPlayerHandle {
        /// The handle that was invalid.
        handle: PlayerHandle,
    },
    /// You made an invalid request, usually by using wrong parameters for
    /// function calls.
    InvalidRequest {
        /// Further specifies why the request was invalid.
        info: String,
    },
    /// Serialization or deserialization of data failed.
    Serialization {
        /// A description of what failed to serialize/deserialize.
        context: String,
    },
    /// An internal invariant was violated. This indicates an engine bug, not
    /// a runtime or network condition; please report it.
    Internal {
        /// A description of the internal error.
        context: String,
    },
}

impl Display for NetplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetplayError::PredictionThreshold => {
                write!(
                    f,
                    "Prediction threshold is reached, cannot advance without remote confirmations."
                )
            }
            NetplayError::StaleCorrection {
                frame,
                oldest_retained,
            } => {
                write!(
                    f,
                    "Correction for frame {} precedes retained history (oldest retained: {}); local state has diverged",
                    frame, oldest_retained
                )
            }
            NetplayError::InvalidPlayerHandle { handle } => {
                write!(f, "Invalid player handle {}", handle)
            }
            NetplayError::InvalidRequest { info } => {
                write!(f, "Invalid Request: {}", info)
            }
            NetplayError::Serialization { context } => {
                write!(f, "Serialization error: {}", context)
            }
            NetplayError::Internal { context } => {
                write!(f, "Internal error (please report as bug): {}", context)
            }
        }
    }
}

impl Error for NetplayError {}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn display_messages_are_descriptive() {
        let err = NetplayError::StaleCorrection {
            frame: Frame::new(3),
            oldest_retained: Frame::new(10),
        };
        let text = err.to_string();
        assert!(text.contains('3'));
        assert!(text.contains("10"));

        let err = NetplayError::InvalidPlayerHandle {
            handle: PlayerHandle::new(7),
        };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(
            NetplayError::PredictionThreshold,
            NetplayError::PredictionThreshold
        );
        assert_ne!(
            NetplayError::PredictionThreshold,
            NetplayError::Internal {
                context: "x".to_owned()
            }
        );
    }

    #[test]
    fn implements_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&NetplayError::PredictionThreshold);
    }
}
