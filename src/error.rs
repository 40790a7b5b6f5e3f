#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_SYNTAX: &str = "CJS-ERR-SYNTAX";
pub const ERR_NAMED_EXPORTS: &str = "CJS-ERR-NAMED-EXPORTS";
pub const ERR_PATTERN: &str = "CJS-ERR-PATTERN";
pub const ERR_OPTIONS: &str = "CJS-ERR-OPTIONS";
pub const ERR_EDIT_OVERLAP: &str = "CJS-ERR-EDIT-OVERLAP";

pub type Result<T> = std::result::Result<T, CommonJsError>;

// ═══════════════════════════════════════════════════════════════════════════════
// COMMONJS ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CommonJsError {
    /// The module could not be parsed. Fatal for that module only.
    #[error("{message} in {id} ({line}:{column})")]
    Syntax {
        id: String,
        message: String,
        line: u32,
        column: u32,
    },

    /// Named exports were configured for a module that turned out not to be CommonJS.
    #[error(
        "Custom named exports were specified for {id} but it does not appear to be a CommonJS module"
    )]
    NamedExportsMismatch { id: String },

    #[error("invalid filter pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    /// Two edits claimed intersecting source ranges.
    #[error("overlapping edits at {}..{} and {}..{}", first.0, first.1, second.0, second.1)]
    OverlappingEdits { first: (u32, u32), second: (u32, u32) },
}

impl CommonJsError {
    pub fn code(&self) -> &'static str {
        match self {
            CommonJsError::Syntax { .. } => ERR_SYNTAX,
            CommonJsError::NamedExportsMismatch { .. } => ERR_NAMED_EXPORTS,
            CommonJsError::InvalidPattern { .. } => ERR_PATTERN,
            CommonJsError::InvalidOptions(_) => ERR_OPTIONS,
            CommonJsError::OverlappingEdits { .. } => ERR_EDIT_OVERLAP,
        }
    }

    /// Module id the error belongs to, when it is tied to one module.
    pub fn module_id(&self) -> Option<&str> {
        match self {
            CommonJsError::Syntax { id, .. } | CommonJsError::NamedExportsMismatch { id } => {
                Some(id)
            }
            _ => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let (line, column) = match self {
            CommonJsError::Syntax { line, column, .. } => (Some(*line), Some(*column)),
            _ => (None, None),
        };
        Diagnostic {
            code: self.code().to_string(),
            message: self.to_string(),
            id: self.module_id().map(str::to_string),
            line,
            column,
        }
    }
}

/// Host-facing, serializable form of a [`CommonJsError`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub id: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_mentions_module_id() {
        let err = CommonJsError::Syntax {
            id: "/src/broken.js".to_string(),
            message: "Unexpected token".to_string(),
            line: 3,
            column: 7,
        };
        let text = err.to_string();
        assert!(text.contains("/src/broken.js"), "got: {}", text);
        assert!(text.starts_with("Unexpected token"), "got: {}", text);
        assert_eq!(err.code(), ERR_SYNTAX);
    }

    #[test]
    fn test_diagnostic_serializes_camel_case() {
        let err = CommonJsError::NamedExportsMismatch {
            id: "lib.js".to_string(),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.id.as_deref(), Some("lib.js"));
        assert_eq!(diag.line, None);

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"code\":\"CJS-ERR-NAMED-EXPORTS\""), "got: {}", json);
        assert!(json.contains("does not appear to be a CommonJS module"), "got: {}", json);
    }
}
