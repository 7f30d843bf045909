/// Every failure the library can report.
///
/// `Configuration` errors describe a network or trainer that cannot work as
/// assembled. `Data` errors describe missing or unusable input; the task
/// executor skips the affected action and carries on with the next one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Incompatible layer shapes, invalid batch size, trainer misuse.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing datasource, unreadable or empty dataset, unknown reader.
    #[error("data error: {0}")]
    Data(String),

    /// Malformed weights file, or one that does not match the network.
    #[error("weights error: {0}")]
    Weights(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    pub fn weights(msg: impl Into<String>) -> Self {
        Error::Weights(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
