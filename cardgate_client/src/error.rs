use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CardgateApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("{code}: {message}")]
    InvalidField { code: &'static str, message: String },
    #[error("Transaction.Not.Initialized: {0}")]
    NotInitialized(String),
    #[error("{code}: {message}. Response: {response}")]
    UnexpectedResponse { code: &'static str, message: String, response: String },
    #[error("Invalid callback payload: {0}")]
    InvalidCallback(String),
}

impl CardgateApiError {
    pub fn invalid_field<S: Into<String>>(code: &'static str, message: S) -> Self {
        Self::InvalidField { code, message: message.into() }
    }

    /// The dotted error code the gateway client library family uses, e.g. `Transaction.Amount.Invalid`. Transport
    /// errors have no such code.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidField { code, .. } => Some(*code),
            Self::NotInitialized(_) => Some("Transaction.Not.Initialized"),
            Self::UnexpectedResponse { code, .. } => Some(*code),
            _ => None,
        }
    }
}
