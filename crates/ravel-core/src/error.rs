//! Error types for message consumption.
//!
//! Every [`Error`] ends the stream it occurred in. Signature failures are not
//! errors: they are recorded in the metadata and the message still decrypts.

use std::{fmt, io};

use ravel_crypto::CryptoError;
use ravel_proto::{KeyIdentifier, ProtocolError, Unsupported};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    resolver::KeySource,
    syntax::{InputSymbol, StackSymbol, State},
};

/// Grammar violation with full diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("unexpected {input} in state {state} with stack {}", StackDisplay(.stack))]
pub struct MalformedMessage {
    /// Symbols accepted before the rejection, oldest first.
    pub history: Vec<InputSymbol>,
    /// Control state at the rejection.
    pub state: State,
    /// Stack at the rejection, bottom first.
    pub stack: Vec<StackSymbol>,
    /// Rejected symbol.
    pub input: InputSymbol,
}

struct StackDisplay<'a>(&'a [StackSymbol]);

impl fmt::Display for StackDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, symbol) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{symbol}")?;
        }
        f.write_str("]")
    }
}

fn recipient_name(recipient: &Option<KeyIdentifier>) -> String {
    recipient.map_or_else(|| "<anonymous>".to_string(), |r| r.to_string())
}

/// Why one credential failed to open one key packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    /// No private key matches the packet's recipient.
    #[error("no private key for recipient {}", recipient_name(.recipient))]
    NoMatchingKey {
        /// Recipient named by the packet.
        recipient: Option<KeyIdentifier>,
    },

    /// Key packet version does not belong with the encrypted data version.
    #[error("version {esk} key packet cannot open version {data} encrypted data")]
    VersionMismatch {
        /// Key packet version.
        esk: u8,
        /// Encrypted data version.
        data: u8,
    },

    /// Algorithm refused by policy.
    #[error("{0} rejected by policy")]
    Rejected(Unsupported),

    /// Primitive operation failed.
    #[error(transparent)]
    Crypto(CryptoError),

    /// Decryption produced something that is not a usable session key.
    #[error("decrypted session key is malformed")]
    InvalidSessionKey,

    /// Candidate session key does not decrypt the data's first block.
    #[error("session key failed the quick check")]
    QuickCheckFailed,

    /// Candidate passed the quick check but the layer failed authentication
    /// under it.
    #[error("layer failed authentication: {reason}")]
    IntegrityCheckFailed {
        /// Which check failed.
        reason: &'static str,
    },
}

impl AttemptFailure {
    /// Algorithm that caused the failure, if that was the only reason.
    pub fn unsupported(&self) -> Option<Unsupported> {
        match self {
            Self::Rejected(unsupported) | Self::Crypto(CryptoError::Unsupported(unsupported)) => {
                Some(*unsupported)
            },
            _ => None,
        }
    }
}

/// One failed trial of a credential against a key packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttempt {
    /// Index of the key packet among the layer's key packets. `None` for
    /// caller-supplied session keys.
    pub esk_index: Option<usize>,
    /// Credential that was tried, if any matched the packet.
    pub credential: Option<KeySource>,
    /// Reason for the failure.
    pub failure: AttemptFailure,
}

/// Every trial failed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("no acceptable decryption key after {} attempts", .attempts.len())]
pub struct KeyResolutionError {
    /// Failed trials in the order they were made.
    pub attempts: Vec<KeyAttempt>,
}

/// Broad class of an [`Error`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The packet sequence is not a well-formed message.
    Structure,
    /// No credential opened the message.
    Decryption,
    /// Decrypted data failed authentication, or had none.
    Integrity,
    /// The message needs an algorithm that is missing or refused.
    Unsupported,
    /// A configured limit was hit.
    Resource,
    /// The API was used out of order.
    Usage,
    /// The underlying reader failed.
    Io,
}

/// Errors from consuming a message.
#[derive(Debug, Error)]
pub enum Error {
    /// Packet sequence violates the message grammar.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] MalformedMessage),

    /// No credential could open the message.
    #[error(transparent)]
    NoAcceptableDecryptionKey(#[from] KeyResolutionError),

    /// Decrypted data failed authentication.
    #[error("integrity check failed: {reason}")]
    IntegrityCheckFailed {
        /// Which check failed.
        reason: &'static str,
    },

    /// An algorithm the message needs is not implemented or not allowed.
    #[error("unsupported {0}")]
    UnsupportedAlgorithm(Unsupported),

    /// Encrypted data without integrity protection.
    #[error("encrypted data is not integrity protected")]
    MissingIntegrityProtection,

    /// Layers nest deeper than configured.
    #[error("message nests more than {limit} layers")]
    NestingTooDeep {
        /// Configured maximum depth.
        limit: usize,
    },

    /// A layer expands beyond the configured size.
    #[error("decompressed data exceeds {limit} bytes")]
    LimitExceeded {
        /// Configured maximum.
        limit: u64,
    },

    /// Compressed data is corrupt.
    #[error("decompression failed: {0}")]
    Decompression(#[source] io::Error),

    /// A packet could not be decoded.
    #[error("packet error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A primitive operation failed unexpectedly.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// The underlying reader failed.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Metadata was requested before the message was fully read.
    #[error("message not fully consumed")]
    Incomplete,

    /// The stream failed earlier and cannot be used.
    #[error("stream failed earlier and is unusable")]
    Poisoned,
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Unsupported(unsupported) => Self::UnsupportedAlgorithm(unsupported),
            other => Self::Crypto(other),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => Self::other(other),
        }
    }
}

impl Error {
    /// Recovers the [`Error`] carried by an `io::Error` from
    /// [`DecryptionStream`](crate::DecryptionStream)'s `Read` impl.
    pub fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(err) = inner.downcast::<Self>() {
                    return *err;
                }
            }
            return Self::Poisoned;
        }
        Self::Io(err)
    }

    /// Broad class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedMessage(_) | Self::Protocol(_) | Self::Decompression(_) => {
                ErrorCategory::Structure
            },
            Self::NoAcceptableDecryptionKey(_) | Self::Crypto(_) => ErrorCategory::Decryption,
            Self::IntegrityCheckFailed { .. } | Self::MissingIntegrityProtection => {
                ErrorCategory::Integrity
            },
            Self::UnsupportedAlgorithm(_) => ErrorCategory::Unsupported,
            Self::NestingTooDeep { .. } | Self::LimitExceeded { .. } => ErrorCategory::Resource,
            Self::Incomplete | Self::Poisoned => ErrorCategory::Usage,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Returns true if the stream cannot continue after this error.
    ///
    /// Only [`Error::Incomplete`] leaves the stream usable: read further and
    /// ask again.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Incomplete)
    }
}
