use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use payment_providers::ProviderError;
use thiserror::Error;
use topup_payment_engine::PaymentGatewayError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Webhook signature verification failed.")]
    InvalidSignature,
    #[error("The payment was declined. {code}: {message}")]
    PaymentDeclined { code: String, message: String },
    #[error("The payment provider is temporarily unavailable. {0}")]
    ProviderUnavailable(String),
    #[error("The requested action is not allowed. {0}")]
    ActionForbidden(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::ActionForbidden(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id}")),
            PaymentGatewayError::TransactionNotFound(txid) => Self::NoRecordFound(format!("Transaction {txid}")),
            PaymentGatewayError::VoucherNotFound(code) => Self::NoRecordFound(format!("Voucher {code}")),
            PaymentGatewayError::PayoutNotFound(id) => Self::NoRecordFound(format!("Payout #{id}")),
            PaymentGatewayError::TransferNotFound(id) => Self::NoRecordFound(format!("Transfer {id}")),
            PaymentGatewayError::FulfillmentForbidden(s) => Self::ActionForbidden(s),
            PaymentGatewayError::PayoutRetryForbidden(s) => Self::ActionForbidden(s),
            PaymentGatewayError::OrderModificationForbidden => {
                Self::ActionForbidden("The order cannot be modified".to_string())
            },
            other => Self::BackendError(other.to_string()),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Declined { code, message } => Self::PaymentDeclined { code, message },
            ProviderError::Unavailable { status, message } => {
                Self::ProviderUnavailable(format!("Status {status}. {message}"))
            },
            ProviderError::RequestError(s) => Self::ProviderUnavailable(s),
            other => Self::BackendError(other.to_string()),
        }
    }
}
