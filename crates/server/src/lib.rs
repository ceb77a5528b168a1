use api_types::ErrorBody;
use axum::{
    Json,
    extract::{
        Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use engine::EngineError;

pub use server::{router, run, run_with_listener, spawn_with_listener};

mod accounts;
mod funds;
mod server;
mod transfers;

pub mod types {
    pub mod account {
        pub use api_types::account::{AccountNew, AccountView};
        pub use engine::Account;
    }

    pub mod fund {
        pub use api_types::fund::{FundCategory, FundList, FundNew, FundUpdate, FundView, RiskTier};
        pub use engine::Fund;
    }

    pub mod transfer {
        pub use api_types::transfer::{InvestNew, InvestResponse, TransferList, TransferView};
        pub use engine::{ExecutedTransfer, Transfer};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::AccountNotFound(_)
        | EngineError::FundNotFound(_)
        | EngineError::TransferNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
        EngineError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::CorruptedRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidAmount(_)
        | EngineError::InsufficientBalance(_)
        | EngineError::FundNotAssociated(_)
        | EngineError::FundAlreadyAssociated(_)
        | EngineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::StorageUnavailable(cause) => {
            tracing::error!("storage unavailable: {cause}");
            "storage unavailable".to_string()
        }
        EngineError::CorruptedRecord(cause) => {
            tracing::error!("corrupted record: {cause}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, error) = match self {
            ServerError::Engine(err) => (
                status_for_engine_error(&err),
                err.code().to_string(),
                message_for_engine_error(err),
            ),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, "BAD_REQUEST".to_string(), err),
        };

        (status, Json(ErrorBody { code, error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<JsonRejection> for ServerError {
    fn from(value: JsonRejection) -> Self {
        Self::Generic(value.body_text())
    }
}

impl From<PathRejection> for ServerError {
    fn from(value: PathRejection) -> Self {
        Self::Generic(value.body_text())
    }
}

/// Unwraps a JSON body, turning any rejection into a 400.
fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    let Json(value) = body?;
    Ok(value)
}

/// Unwraps path parameters, turning any rejection into a 400.
fn params<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ServerError> {
    let Path(value) = path?;
    Ok(value)
}
