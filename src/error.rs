use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpicedashError {
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("connection: {message}")]
    Connection { message: String },

    #[error("query: {message}")]
    Query { message: String },

    #[error("throttled: {message}")]
    Throttled { message: String },

    #[error("timeout: {message}")]
    Timeout { message: String },

    #[error("inconsistent stream: column '{column}' changed type from {expected} to {found}")]
    InconsistentStream {
        column: String,
        expected: String,
        found: String,
    },

    #[error("decode: {message}")]
    Decode { message: String },

    #[error("config: {message}")]
    Config { message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("format: {message}")]
    Format { message: String },
}

impl SpicedashError {
    /// The bare message without the category prefix.
    ///
    /// Remote failures surface to the host verbatim, so this is what ends up
    /// in a response or a health-check message.
    pub fn detail(&self) -> String {
        match self {
            Self::BadRequest { message }
            | Self::Connection { message }
            | Self::Query { message }
            | Self::Throttled { message }
            | Self::Timeout { message }
            | Self::Decode { message }
            | Self::Config { message }
            | Self::Format { message } => message.clone(),
            Self::Io(e) => e.to_string(),
            Self::InconsistentStream { .. } => self.to_string(),
        }
    }
}
