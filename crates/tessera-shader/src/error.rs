use std::fmt;

use crate::types::ShaderDomain;

/// Error produced while reflecting shader source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A uniform or struct field names a type that is neither built in nor a
    /// struct declared earlier in the same shader.
    UnknownType { type_name: String, name: String },
    /// A `struct` block or `uniform` statement is missing a token the
    /// declaration grammar requires.
    Malformed { statement: String, reason: &'static str },
    /// `#type <stage>` names a stage other than vertex/fragment/pixel.
    UnknownStage(String),
    /// The source has no section for this stage.
    MissingStage(ShaderDomain),
}

impl ParseError {
    pub(crate) fn malformed(statement: &str, reason: &'static str) -> Self {
        Self::Malformed { statement: statement.trim().to_string(), reason }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownType { type_name, name } => {
                write!(f, "unknown type '{}' for declaration '{}'", type_name, name)
            }
            ParseError::Malformed { statement, reason } => {
                write!(f, "malformed declaration {:?}: {}", statement, reason)
            }
            ParseError::UnknownStage(stage) => write!(f, "unknown shader stage '{}'", stage),
            ParseError::MissingStage(domain) => {
                write!(f, "shader source has no {} stage", domain.name())
            }
        }
    }
}

impl std::error::Error for ParseError {}
