use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed coordinate map, missing background template,
    /// or an unusable generator configuration. Fatal for the document unit.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("chart asset error: {0}")]
    Asset(String),

    #[error("merge failed: {0}")]
    Merge(String),
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::Pdf(e.to_string())
    }
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
