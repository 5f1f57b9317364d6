//! Error types for oxidized-maxwell

use thiserror::Error;

/// Errors raised while translating an IR program into MSL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The opcode or feature is recognised but has no translation yet
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Logic error: {0}")]
    Logic(String),
}

impl ShaderError {
    /// Shorthand used by emit rules for partial translations
    pub fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented(what.into())
    }
}

/// Guest GPU memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Unmapped GPU address: 0x{0:010x}")]
    Unmapped(u64),

    #[error("Access out of range at 0x{addr:010x} (size 0x{size:x})")]
    OutOfRange { addr: u64, size: u64 },
}

/// Errors that abort one pipeline build
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Shader translation failed: {0}")]
    Translation(#[from] ShaderError),

    #[error("Shader compilation failed for {stage}: {message}")]
    Compilation { stage: String, message: String },

    #[error("Pipeline state creation failed: {0}")]
    PipelineState(String),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Vertex program disabled")]
    NoVertexProgram,

    #[error("No program terminator found at 0x{0:010x}")]
    UnterminatedProgram(u64),

    #[error("No channel bound")]
    NoChannel,

    #[error("Pipeline build panicked: {0}")]
    BuildPanicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
