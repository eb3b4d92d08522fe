use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every failure the devirtualization
/// pipeline can report.
///
/// Errors fall into two severity classes with different propagation rules:
///
/// # Fatal errors (abort the pipeline at the next stage boundary)
/// - [`Error::ResourceNotFound`] - the VM's embedded resource cannot be located
/// - [`Error::KeyUnavailable`] - the RVA-backed session key bytes are missing
/// - [`Error::ModulusMissing`] - no modulus string, even after the fallback
/// - [`Error::DispatcherNotFound`] - the VM dispatcher type cannot be located
///
/// # Per-method errors (the offending method is skipped, others continue)
/// - [`Error::Unidentified`] - the method uses a virtual opcode no pattern matched
/// - [`Error::UnknownOperandType`] - an operand-type code outside the known table
/// - [`Error::BranchMisaligned`] - a branch target off an instruction boundary
/// - [`Error::UnsupportedHandlerKind`] - an exception-handler kind we do not map
/// - [`Error::DecryptionOverflow`] - a decrypted block payload exceeds its block
///
/// Structural corruption in any wire format is reported as [`Error::Malformed`]
/// with the source location where the problem was detected.
#[derive(Error, Debug)]
pub enum Error {
    /// No embedded resource matches the name read from the stream getter.
    ///
    /// The associated string is the resource name the getter referenced, or a
    /// description of which discovery step came up empty.
    #[error("VM resource not found: {0}")]
    ResourceNotFound(String),

    /// The field that should carry the per-build session key has no RVA-backed
    /// data segment.
    #[error("VM session key bytes unavailable (no RVA data on key field {0})")]
    KeyUnavailable(Token),

    /// The modulus string is absent and the build-specific fallback is empty.
    #[error("RSA modulus string missing")]
    ModulusMissing,

    /// The VM dispatcher type could not be located, or its constructor yields
    /// no opcode registrations.
    #[error("VM dispatcher not found")]
    DispatcherNotFound,

    /// A method uses a virtual opcode that no catalog pattern identified.
    ///
    /// Recorded per opcode during matching; surfaced per method during
    /// translation. The associated value is the virtual code.
    #[error("virtual opcode 0x{0:02x} is unidentified")]
    Unidentified(u32),

    /// Two catalog patterns with different targets accepted the same
    /// handler.
    ///
    /// Detected by the matcher after every accepted match by scanning the
    /// remaining candidates. Selection keeps the first accepted pattern, so
    /// this is reported per opcode and never fatal.
    #[error("virtual opcode 0x{0:02x} matched more than one pattern")]
    PatternAmbiguous(u32),

    /// An operand-type code outside the documented 0..=12 mapping.
    ///
    /// Fatal for the method that uses the opcode carrying it; other methods
    /// translate normally.
    #[error("unknown virtual operand type {0}")]
    UnknownOperandType(u8),

    /// A branch target does not land on an instruction boundary.
    ///
    /// The associated value is the offending byte offset relative to the start
    /// of the method's instruction section.
    #[error("branch target 0x{0:x} does not align with an instruction boundary")]
    BranchMisaligned(u32),

    /// An exception-handler kind byte we do not map.
    ///
    /// Kinds 0 (exception), 1 (finally) and 2 (filter) are supported; kind 4
    /// (fault) is reserved and deliberately unmapped.
    #[error("unsupported exception handler kind {0}")]
    UnsupportedHandlerKind(u8),

    /// A decrypted block declares a payload longer than the block can hold.
    ///
    /// # Fields
    ///
    /// * `block` - Index of the offending ciphertext block
    /// * `declared` - The payload length byte the plaintext declared
    #[error("decrypted block {block} declares payload of {declared} bytes, exceeding its block size")]
    DecryptionOverflow {
        /// Index of the offending ciphertext block
        block: usize,
        /// The payload length the plaintext block declared
        declared: usize,
    },

    /// A wire structure is damaged and could not be parsed.
    ///
    /// Carries the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading a byte stream.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Failed to lock a shared resource (poisoned mutex).
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns the stable machine tag for this error kind.
    ///
    /// Tags are what the translation report serializes; messages are free to
    /// change, tags are not.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Error::ResourceNotFound(_) => "resource-not-found",
            Error::KeyUnavailable(_) => "key-unavailable",
            Error::ModulusMissing => "modulus-missing",
            Error::DispatcherNotFound => "dispatcher-not-found",
            Error::Unidentified(_) => "unidentified",
            Error::PatternAmbiguous(_) => "pattern-ambiguous",
            Error::UnknownOperandType(_) => "unknown-operand-type",
            Error::BranchMisaligned(_) => "branch-misaligned",
            Error::UnsupportedHandlerKind(_) => "unsupported-handler-kind",
            Error::DecryptionOverflow { .. } => "decryption-overflow",
            Error::Malformed { .. } => "malformed",
            Error::OutOfBounds => "out-of-bounds",
            Error::LockError => "lock-error",
        }
    }

    /// Returns true if this error aborts the whole pipeline rather than a
    /// single method.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ResourceNotFound(_)
                | Error::KeyUnavailable(_)
                | Error::ModulusMissing
                | Error::DispatcherNotFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_stable() {
        assert_eq!(Error::ModulusMissing.tag(), "modulus-missing");
        assert_eq!(Error::UnknownOperandType(2).tag(), "unknown-operand-type");
        assert_eq!(Error::BranchMisaligned(7).tag(), "branch-misaligned");
        assert_eq!(
            Error::DecryptionOverflow {
                block: 0,
                declared: 300
            }
            .tag(),
            "decryption-overflow"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::DispatcherNotFound.is_fatal());
        assert!(Error::ResourceNotFound("x".into()).is_fatal());
        assert!(!Error::Unidentified(3).is_fatal());
        assert!(!Error::UnsupportedHandlerKind(4).is_fatal());
    }

    #[test]
    fn test_malformed_macro_carries_location() {
        let err = malformed_error!("bad length {}", 12);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad length 12");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("expected Malformed"),
        }
    }
}
