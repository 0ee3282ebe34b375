use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("invalid options: {0}")]
    Options(String),

    #[error("malformed input {path}: {reason}")]
    MalformedInput { path: String, reason: String },

    #[error("structural error: {0}")]
    Structural(String),

    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("config parse error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConvertError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
