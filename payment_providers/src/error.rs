use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach provider: {0}")]
    RequestError(String),
    #[error("Invalid provider response: {0}")]
    ResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Provider declined the charge ({code}): {message}")]
    Declined { code: String, message: String },
    #[error("Provider is temporarily unavailable. Status {status}. {message}")]
    Unavailable { status: u16, message: String },
    #[error("Provider rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}

impl ProviderError {
    /// 5xx and 429 responses and transport failures are worth retrying. Everything else is a permanent answer and
    /// a retry would only replay the same rejection.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RequestError(_) => true,
            ProviderError::Unavailable { .. } => true,
            _ => false,
        }
    }

    /// Maps an HTTP failure status to the transient or permanent side of the taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        if status >= 500 || status == 429 {
            ProviderError::Unavailable { status, message }
        } else {
            ProviderError::Rejected { status, message }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::from_status(503, "down".into()).is_retryable());
        assert!(ProviderError::from_status(429, "slow down".into()).is_retryable());
        assert!(ProviderError::RequestError("connect timeout".into()).is_retryable());
        assert!(!ProviderError::from_status(400, "bad".into()).is_retryable());
        assert!(!ProviderError::Declined { code: "card_declined".into(), message: "no".into() }.is_retryable());
    }
}
