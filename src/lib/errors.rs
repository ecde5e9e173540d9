//! Custom error types for varsum operations.

use thiserror::Error;

/// Result type alias for varsum operations
pub type Result<T> = std::result::Result<T, VarsumError>;

/// Error type for varsum operations
#[derive(Error, Debug)]
pub enum VarsumError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Malformed input data
    #[error("Invalid input at {location}: {reason}")]
    InvalidInput {
        /// Where the problem was found (path, key, or virtual offset)
        location: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Input ended before a complete record or block
    #[error("Truncated input at {location}: {reason}")]
    Truncated {
        /// Where the stream ended
        location: String,
        /// What was being read
        reason: String,
    },

    /// Positions decreased within a contig
    #[error("Unsorted input on contig '{contig}': position {position} after {previous}")]
    UnsortedInput {
        /// Contig being scanned
        contig: String,
        /// Last accepted position
        previous: u64,
        /// The out-of-order position
        position: u64,
    },

    /// A stride jump landed somewhere that does not look like the expected
    /// record context; the caller rescans the slice without striding.
    #[error("Stride landed badly at virtual offset {virtual_offset:#x}: {reason}")]
    StrideLanding {
        /// Virtual offset of the suspect landing point
        virtual_offset: u64,
        /// What the validation found
        reason: String,
    },

    /// Allele symbol outside the packed-nucleotide table
    #[error("Unencodable allele symbol 0x{symbol:02x} at offset {index}")]
    UnencodableSymbol {
        /// The offending byte
        symbol: u8,
        /// Byte offset within the allele
        index: usize,
    },

    /// Encoded summary record failed to decode
    #[error("Malformed summary record: {reason}")]
    MalformedRecord {
        /// Explanation of the problem
        reason: String,
    },

    /// Object store operation failed
    #[error("Store operation on '{key}' failed: {reason}")]
    Store {
        /// Object key involved
        key: String,
        /// Explanation of the failure
        reason: String,
        /// Whether retrying may succeed
        retryable: bool,
    },

    /// Aggregation state already has pending work for this key
    #[error("Aggregation key '{key}' already has pending work units")]
    AlreadyRegistered {
        /// The aggregation key
        key: String,
    },

    /// Coordination store operation failed
    #[error("Coordination update for '{key}' failed: {reason}")]
    Coordination {
        /// The aggregation key
        key: String,
        /// Explanation of the failure
        reason: String,
        /// Whether retrying may succeed
        retryable: bool,
    },

    /// Merged region span ran backwards
    #[error("Invalid span for '{key}': start {start} > end {end}")]
    InvalidSpan {
        /// Contig or key the span was computed for
        key: String,
        /// Span start
        start: u64,
        /// Span end
        end: u64,
    },

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VarsumError {
    /// Whether the operation that produced this error may succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            Self::Store { retryable, .. } | Self::Coordination { retryable, .. } => *retryable,
            Self::Io(e) => matches!(
                e.kind(),
                ErrorKind::TimedOut
                    | ErrorKind::Interrupted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter() {
        let error = VarsumError::InvalidParameter {
            parameter: "threads".to_string(),
            reason: "must be >= 1".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Invalid parameter 'threads'"));
        assert!(msg.contains("must be >= 1"));
    }

    #[test]
    fn test_unsorted_input() {
        let error = VarsumError::UnsortedInput {
            contig: "chr1".to_string(),
            previous: 5000,
            position: 4999,
        };
        let msg = format!("{error}");
        assert!(msg.contains("chr1"));
        assert!(msg.contains("4999"));
        assert!(msg.contains("5000"));
    }

    #[test]
    fn test_stride_landing() {
        let error = VarsumError::StrideLanding {
            virtual_offset: 0x1234_0005,
            reason: "position not numeric".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Stride landed badly"));
        assert!(msg.contains("position not numeric"));
    }

    #[test]
    fn test_unencodable_symbol() {
        let error = VarsumError::UnencodableSymbol { symbol: b'X', index: 3 };
        let msg = format!("{error}");
        assert!(msg.contains("0x58"));
        assert!(msg.contains("offset 3"));
    }

    #[test]
    fn test_already_registered() {
        let error = VarsumError::AlreadyRegistered { key: "mydata".to_string() };
        let msg = format!("{error}");
        assert!(msg.contains("'mydata'"));
        assert!(msg.contains("pending work"));
    }

    #[test]
    fn test_retryable_flags() {
        let transient = VarsumError::Store {
            key: "a/b".to_string(),
            reason: "503".to_string(),
            retryable: true,
        };
        assert!(transient.is_retryable());

        let permanent = VarsumError::Store {
            key: "a/b".to_string(),
            reason: "no such key".to_string(),
            retryable: false,
        };
        assert!(!permanent.is_retryable());

        let timeout = VarsumError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(timeout.is_retryable());

        let missing =
            VarsumError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(!missing.is_retryable());

        let unsorted = VarsumError::UnsortedInput {
            contig: "1".to_string(),
            previous: 2,
            position: 1,
        };
        assert!(!unsorted.is_retryable());
    }
}
