// error.rs - Error taxonomy for the timeline engine
//
// ClassificationError: one header line could not be classified.
// ParseError: the whole trace is rejected; no partial timeline is returned.
// ResolutionError: one resolution query failed; other queries stay valid.

use thiserror::Error;

use crate::frontend::Frontend;
use crate::id::RecordIndex;

/// A dump-header line that the scope classifier cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("unexpected character at column {column}")]
    InvalidToken { column: usize },

    #[error("unrecognized dump header '{0}'")]
    UnrecognizedHeader(String),

    #[error("dump header for pass '{0}' names no target")]
    MissingTarget(String),

    #[error("unrecognized pass target '{0}'")]
    UnrecognizedTarget(String),
}

/// Fatal errors while turning trace text into a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("trace is empty")]
    EmptyTrace,

    #[error("trace contains no pass dumps")]
    NoPasses,

    #[error("unsupported file kind '{0}'")]
    UnsupportedFileKind(String),

    #[error("{frontend} sources only accept an optimization level, not a pass list")]
    CustomPassesUnsupported { frontend: Frontend },

    #[error("invalid pass pipeline '{text}': {message}")]
    InvalidPipeline { text: String, message: String },

    #[error("line {line}: {source}")]
    Classification {
        line: usize,
        #[source]
        source: ClassificationError,
    },

    #[error("line {line}: dump after {pass} has no IR body")]
    MissingBody { line: usize, pass: String },

    #[error("line {line}: initial IR dump appears after the first pass")]
    MisplacedStart { line: usize },

    #[error("record {index} refers to record #{target}, which is not an earlier record with IR")]
    InvalidBackReference { index: RecordIndex, target: u32 },
}

/// Failure of a single before/after query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("record {index} is out of range (timeline has {len} records)")]
    OutOfRange { index: RecordIndex, len: usize },

    #[error("record {index}: function '{function}' is not defined in the preceding module snapshot")]
    SpliceTargetMissing { index: RecordIndex, function: String },

    #[error("record {index}: IR back-reference chain does not terminate")]
    ReferenceCycle { index: RecordIndex },

    #[error("cache was built for timeline generation {cache} but the timeline is at generation {timeline}; call invalidate()")]
    StaleCache { cache: u64, timeline: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_error_carries_line() {
        let err = ParseError::Classification {
            line: 12,
            source: ClassificationError::UnrecognizedTarget("<bogus>".into()),
        };
        assert_eq!(err.to_string(), "line 12: unrecognized pass target '<bogus>'");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn custom_pass_message_names_frontend() {
        let err = ParseError::CustomPassesUnsupported {
            frontend: Frontend::Cpp,
        };
        assert_eq!(
            err.to_string(),
            "C++ sources only accept an optimization level, not a pass list"
        );
    }

    #[test]
    fn resolution_errors_name_the_record() {
        let err = ResolutionError::OutOfRange {
            index: RecordIndex(9),
            len: 4,
        };
        assert_eq!(err.to_string(), "record #9 is out of range (timeline has 4 records)");
    }
}
