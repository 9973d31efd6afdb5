//! Binary codec for wire message serialization.
//!
//! Centralizes the bincode configuration so every peer encodes identically.
//! Fixed-size integer encoding keeps message sizes deterministic, which
//! matters for anything frame-indexed.
//!
//! # Examples
//!
//! ```
//! use netplay_rollback::codec::{decode, encode};
//!
//! let value: u32 = 42;
//! let bytes = encode(&value).unwrap();
//! let decoded: u32 = decode(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

use serde::{de::DeserializeOwned, Serialize};

use crate::NetplayError;

fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Encodes a serde value into its canonical byte representation.
///
/// # Errors
///
/// Returns [`NetplayError::Serialization`] if bincode fails; the underlying
/// reason is preserved in the error context.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetplayError> {
    bincode::serde::encode_to_vec(value, config()).map_err(|err| NetplayError::Serialization {
        context: format!("encode failed: {err}"),
    })
}

/// Decodes a serde value from its canonical byte representation.
///
/// Trailing bytes are rejected: a wire message must decode exactly.
///
/// # Errors
///
/// Returns [`NetplayError::Serialization`] on malformed or truncated input.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, NetplayError> {
    let (value, read) = bincode::serde::decode_from_slice(bytes, config()).map_err(|err| {
        NetplayError::Serialization {
            context: format!("decode failed: {err}"),
        }
    })?;
    if read != bytes.len() {
        return Err(NetplayError::Serialization {
            context: format!(
                "decode consumed {read} of {} bytes; trailing garbage",
                bytes.len()
            ),
        });
    }
    Ok(value)
}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod codec_tests {
    use super::*;
    use crate::{Frame, Message, PlayerInputs, Simulation};
    use serde::Deserialize;
    use web_time::Duration;

    #[derive(Clone, Debug, PartialEq, serde::Serialize, Deserialize)]
    struct MiniState {
        ticks: u64,
        score: [i32; 2],
    }

    impl Simulation<u16> for MiniState {
        fn initial() -> Self {
            MiniState {
                ticks: 0,
                score: [0, 0],
            }
        }
        fn timestep() -> Duration {
            Duration::from_millis(16)
        }
        fn step(&self, _inputs: &PlayerInputs<u16>, _dt: Duration) -> Self {
            self.clone()
        }
    }

    struct MiniConfig;
    impl crate::Config for MiniConfig {
        type Input = u16;
        type State = MiniState;
    }

    #[test]
    fn message_round_trip() {
        let message: Message<MiniConfig> = Message::Input {
            frame: Frame::new(17),
            input: 513,
        };
        let bytes = encode(&message).unwrap();
        let decoded: Message<MiniConfig> = decode(&bytes).unwrap();
        match decoded {
            Message::Input { frame, input } => {
                assert_eq!(frame, Frame::new(17));
                assert_eq!(input, 513);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn state_round_trip() {
        let message: Message<MiniConfig> = Message::State {
            frame: Frame::new(30),
            state: MiniState {
                ticks: 30,
                score: [3, -1],
            },
        };
        let bytes = encode(&message).unwrap();
        let decoded: Message<MiniConfig> = decode(&bytes).unwrap();
        match decoded {
            Message::State { frame, state } => {
                assert_eq!(frame, Frame::new(30));
                assert_eq!(state.score, [3, -1]);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = encode(&12345u64).unwrap();
        let result: Result<u64, _> = decode(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(NetplayError::Serialization { .. })));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&7u32).unwrap();
        bytes.push(0xFF);
        let result: Result<u32, _> = decode(&bytes);
        assert!(matches!(result, Err(NetplayError::Serialization { .. })));
    }

    #[test]
    fn garbage_is_rejected() {
        let result: Result<Message<MiniConfig>, _> = decode(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(result.is_err());
    }
}
