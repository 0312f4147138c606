use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid selector `{query}`: {message}")]
    Selector { query: String, message: String },

    #[error("invalid overlay config: {0}")]
    Config(#[from] json5::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn selector(query: &str, message: impl Into<String>) -> Self {
        Self::Selector {
            query: query.to_string(),
            message: message.into(),
        }
    }
}
