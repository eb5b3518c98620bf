use thiserror::Error;

/// The seven error kinds produced by the compiler's phases, one thiserror
/// variant per phase family. Lexer/Token/Parser are kept distinct (rather
/// than folded into one "SyntaxError") because the front end reports them
/// at different granularities: a lexer error is a bad character, a token
/// error is a malformed literal, a parser error is a bad grammar position.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WisniaError {
    #[error("Lexer error on line {line}: {reason}")]
    Lexer { line: usize, reason: String },

    #[error("Token error on line {line}: {reason}")]
    Token { line: usize, reason: String },

    #[error("Parser error on line {line}: {reason}")]
    Parser { line: usize, reason: String },

    #[error("Semantic error on line {line}: {reason}")]
    Semantic { line: usize, reason: String },

    #[error("Instruction error: {reason}")]
    Instruction { reason: String },

    #[error("Not implemented: {reason}")]
    NotImplemented { reason: String },

    #[error("Code generation error: {reason}")]
    CodeGeneration { reason: String },
}

impl WisniaError {
    pub fn lexer(line: usize, reason: impl Into<String>) -> Self {
        WisniaError::Lexer { line, reason: reason.into() }
    }

    pub fn token(line: usize, reason: impl Into<String>) -> Self {
        WisniaError::Token { line, reason: reason.into() }
    }

    pub fn parser(line: usize, reason: impl Into<String>) -> Self {
        WisniaError::Parser { line, reason: reason.into() }
    }

    pub fn semantic(line: usize, reason: impl Into<String>) -> Self {
        WisniaError::Semantic { line, reason: reason.into() }
    }

    pub fn instruction(reason: impl Into<String>) -> Self {
        WisniaError::Instruction { reason: reason.into() }
    }

    pub fn not_implemented(reason: impl Into<String>) -> Self {
        WisniaError::NotImplemented { reason: reason.into() }
    }

    pub fn codegen(reason: impl Into<String>) -> Self {
        WisniaError::CodeGeneration { reason: reason.into() }
    }
}
