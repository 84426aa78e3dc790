use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use thiserror::Error;
use vending_payment_engine::{
    security::GateRejection,
    traits::{DeviceAuthApiError, PaymentGatewayError},
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
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
    #[error("The order is in a conflicting state. {0}")]
    OrderConflict(String),
    #[error("The payment gateway could not be reached or rejected the request. {0}")]
    PaymentGatewayUnavailable(String),
    #[error("Request rejected by the security gate")]
    SecurityRejected(GateRejection),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::OrderConflict(_) => StatusCode::CONFLICT,
            Self::PaymentGatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::SecurityRejected(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Security rejections carry a deliberately generic body. The detail is in the server log
        // and the audit trail, not in anything a probing client gets to see.
        let body = match self {
            Self::SecurityRejected(rejection) => serde_json::json!({
                "success": false,
                "error": "SECURITY_REJECTED",
                "code": rejection.client_code(),
                "message": rejection.client_message(),
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            PaymentGatewayError::OrderNotFound(code) => Self::NoRecordFound(format!("Order {code}")),
            PaymentGatewayError::InvalidStateChange { .. } => Self::OrderConflict(e.to_string()),
            PaymentGatewayError::UnsupportedAction(e) => Self::Unspecified(e),
        }
    }
}

impl From<DeviceAuthApiError> for ServerError {
    fn from(e: DeviceAuthApiError) -> Self {
        match e {
            DeviceAuthApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            DeviceAuthApiError::DeviceNotFound(id) => Self::NoRecordFound(format!("Machine {id}")),
            DeviceAuthApiError::DeviceRevoked(id) => Self::OrderConflict(format!("Machine {id} is revoked")),
            DeviceAuthApiError::SessionNotFound => Self::NoRecordFound("Session".to_string()),
        }
    }
}

impl From<GateRejection> for ServerError {
    fn from(rejection: GateRejection) -> Self {
        Self::SecurityRejected(rejection)
    }
}
