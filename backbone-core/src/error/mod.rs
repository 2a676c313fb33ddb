//! Core error types for the backbone crates

use thiserror::Error;

/// Main error type for backbone operations
///
/// The first block of variants are the per-record problems raised while
/// normalizing a checklist. They are recovered locally and end up as issues
/// in a report. Only the infrastructure variants below abort a run.
#[derive(Error, Debug)]
pub enum BackboneError {
    #[error("Unparsable name: {0}")]
    UnparsableName(String),

    #[error("Dangling reference: {field} {reference} of record {record}")]
    DanglingReference {
        record: String,
        field: &'static str,
        reference: String,
    },

    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    #[error("Duplicate stable id: {0}")]
    DuplicateStableId(String),

    #[error("Corrupt record stream: {0}")]
    CorruptStream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl BackboneError {
    /// True for errors that must abort a whole normalization run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BackboneError::CorruptStream(_)
                | BackboneError::Configuration(_)
                | BackboneError::Io(_)
                | BackboneError::Transaction(_)
        )
    }

    /// Short, stable name of the error class used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            BackboneError::UnparsableName(_) => "UnparsableName",
            BackboneError::DanglingReference { .. } => "DanglingReference",
            BackboneError::CycleDetected(_) => "CycleDetected",
            BackboneError::DuplicateStableId(_) => "DuplicateStableId",
            BackboneError::CorruptStream(_) => "CorruptStream",
            BackboneError::Io(_) => "Io",
            BackboneError::Serialization(_) => "Serialization",
            BackboneError::Configuration(_) => "Configuration",
            BackboneError::Parse(_) => "Parse",
            BackboneError::InvalidInput(_) => "InvalidInput",
            BackboneError::NotFound(_) => "NotFound",
            BackboneError::Transaction(_) => "Transaction",
            BackboneError::Other(_) => "Other",
        }
    }
}

/// Result type alias for backbone operations
pub type BackboneResult<T> = Result<T, BackboneError>;

impl From<serde_json::Error> for BackboneError {
    fn from(err: serde_json::Error) -> Self {
        BackboneError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for BackboneError {
    fn from(err: anyhow::Error) -> Self {
        BackboneError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let unparsable = BackboneError::UnparsableName("?".to_string());
        assert_eq!(format!("{}", unparsable), "Unparsable name: ?");

        let dangling = BackboneError::DanglingReference {
            record: "12".to_string(),
            field: "parentNameUsageID",
            reference: "99".to_string(),
        };
        assert_eq!(
            format!("{}", dangling),
            "Dangling reference: parentNameUsageID 99 of record 12"
        );

        let cycle = BackboneError::CycleDetected("1 -> 2 -> 1".to_string());
        assert_eq!(format!("{}", cycle), "Cycle detected: 1 -> 2 -> 1");

        let duplicate = BackboneError::DuplicateStableId("7".to_string());
        assert_eq!(format!("{}", duplicate), "Duplicate stable id: 7");

        let corrupt = BackboneError::CorruptStream("line 3".to_string());
        assert_eq!(format!("{}", corrupt), "Corrupt record stream: line 3");

        let config_error = BackboneError::Configuration("missing field".to_string());
        assert_eq!(format!("{}", config_error), "Configuration error: missing field");

        let tx = BackboneError::Transaction("no open transaction".to_string());
        assert_eq!(format!("{}", tx), "Transaction error: no open transaction");
    }

    #[test]
    fn test_fatal_classes() {
        assert!(BackboneError::CorruptStream("x".into()).is_fatal());
        assert!(BackboneError::Configuration("x".into()).is_fatal());
        assert!(BackboneError::Io(io::Error::new(io::ErrorKind::Other, "x")).is_fatal());

        assert!(!BackboneError::UnparsableName("x".into()).is_fatal());
        assert!(!BackboneError::CycleDetected("x".into()).is_fatal());
        assert!(!BackboneError::DuplicateStableId("x".into()).is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: BackboneError = io_err.into();

        match err {
            BackboneError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let parse_result: Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{invalid json}");
        let err: BackboneError = parse_result.unwrap_err().into();
        assert!(matches!(err, BackboneError::Serialization(_)));
        assert_eq!(err.kind(), "Serialization");
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: BackboneError = anyhow::anyhow!("boom").into();
        assert_eq!(format!("{}", err), "Other error: boom");
    }

    #[test]
    fn test_error_propagation() {
        fn inner() -> BackboneResult<()> {
            Err(BackboneError::NotFound("usage 3".to_string()))
        }

        fn outer() -> BackboneResult<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.kind(), "NotFound");
    }
}
