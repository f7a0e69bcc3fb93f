//! # `Envelope` Frame
//!
//! The wrapper for every request and response on the worker socket.
//!
//! ## Properties
//!
//! - **Versioning**: Every frame carries a `version` field, checked before
//!   the payload is acted on.
//! - **Correlation**: A response reuses the `correlation_id` of its request so
//!   clients can match replies while notifications are interleaved.
//! - **No Identity**: The envelope carries no sender identity. Identity is a
//!   property of the connection, not of a frame, and cannot be spoofed by
//!   payload contents.

use serde::{Deserialize, Serialize};

use crate::errors::MessageError;

/// A versioned, correlated wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version for forward compatibility.
    pub version: u16,

    /// Client chosen identifier, echoed in the response.
    pub correlation_id: u64,

    /// The actual message payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Current protocol version.
    pub const CURRENT_VERSION: u16 = 1;

    /// Wrap a payload at the current protocol version.
    pub fn new(correlation_id: u64, payload: T) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            correlation_id,
            payload,
        }
    }

    /// Build the reply frame for this request.
    pub fn reply<R>(&self, payload: R) -> Envelope<R> {
        Envelope {
            version: Self::CURRENT_VERSION,
            correlation_id: self.correlation_id,
            payload,
        }
    }

    /// Reject frames from a different protocol version.
    pub fn check_version(&self) -> Result<(), MessageError> {
        if self.version != Self::CURRENT_VERSION {
            return Err(MessageError::UnsupportedVersion {
                received: self.version,
                supported: Self::CURRENT_VERSION,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_keeps_correlation_id() {
        let request = Envelope::new(42, "ping");
        let reply = request.reply(true);
        assert_eq!(reply.correlation_id, 42);
        assert_eq!(reply.version, Envelope::<bool>::CURRENT_VERSION);
    }

    #[test]
    fn test_future_version_rejected() {
        let mut frame = Envelope::new(1, ());
        frame.version = 9;
        assert!(matches!(
            frame.check_version(),
            Err(MessageError::UnsupportedVersion { received: 9, .. })
        ));
    }
}
