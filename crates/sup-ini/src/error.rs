//! Error types for ini parsing.

/// Errors raised while parsing ini text.
///
/// Line numbers are 1-based and refer to the text handed to the parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IniError {
    #[error("line {line}: option '{key}' appears before any [section] header")]
    OptionOutsideSection { line: usize, key: String },

    #[error("line {line}: malformed section header '{text}'")]
    MalformedHeader { line: usize, text: String },

    #[error("line {line}: expected 'key=value', found '{text}'")]
    MissingDelimiter { line: usize, text: String },

    #[error("line {line}: option name is empty")]
    EmptyKey { line: usize },
}

impl IniError {
    /// Line on which the error was detected.
    pub fn line(&self) -> usize {
        match self {
            Self::OptionOutsideSection { line, .. }
            | Self::MalformedHeader { line, .. }
            | Self::MissingDelimiter { line, .. }
            | Self::EmptyKey { line } => *line,
        }
    }
}
