use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No targets registered")]
    EmptyRegistry,

    #[error("Registry incomplete, failed targets never re-registered: {}", .0.join(", "))]
    IncompleteRegistry(Vec<String>),

    #[error("Rule unavailable: {0}")]
    RuleUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Report serialization error: {0}")]
    ReportSerialize(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProvenanceError>;
