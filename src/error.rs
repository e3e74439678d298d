use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Recoverable analysis errors. Internal interpreter contract violations
/// (stack-kind mismatches, volatile-local narrowing, out-of-range slot ids)
/// are bugs in an opcode's modeled semantics, not properties of the analyzed
/// program, and abort via assertion instead of flowing through here.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: `{value}` ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}
