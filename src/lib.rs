//! Billetera is a REST API for managing personal finances with wallets and
//! envelope budgeting.
//!
//! Wallets hold money in a currency, envelopes hold budget that has been
//! assigned from wallets, and transactions move money in and out of both.
//! Every endpoint lives under `/api` and responds with a JSON body shaped as
//! `{"success": bool, "data" | "error": ..., "warnings": [...]}`.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use time::Date;
use tokio::signal;

mod api_response;
mod app_state;
mod auth;
mod category;
mod currency;
mod database_id;
mod db;
mod endpoints;
mod envelope;
mod extract;
mod logging;
mod name;
mod pagination;
mod routing;
mod subscription;
mod text_enum;
mod timezone;
mod transaction;
mod user_config;
mod wallet;
mod warning;

#[cfg(test)]
mod test_utils;

pub use api_response::ApiResponse;
pub use app_state::AppState;
pub use auth::{PasswordHash, User, UserID, ValidatedPassword, get_user_by_email};
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use warning::Warning;

/// Functions for populating a database outside of the request handlers, e.g.
/// for seeding demo data.
pub mod seed {
    pub use crate::auth::create_user;
    pub use crate::category::{CategoryKind, create_category, create_subcategory};
    pub use crate::envelope::{NewEnvelope, assign_budget, create_envelope};
    pub use crate::subscription::start_free_subscription;
    pub use crate::transaction::{TransactionKind, TransactionRequest, record_transaction};
    pub use crate::user_config::create_default_user_config;
    pub use crate::wallet::{NewWallet, WalletType, create_wallet};
}

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request did not carry a valid auth cookie.
    #[error("you must be logged in to access this resource")]
    Unauthenticated,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email address is not shaped like an email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address is already used by another user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// An empty string was used to name an entity, e.g. a wallet.
    ///
    /// The string describes the kind of entity.
    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),

    /// The name is already used by a live entity of the same kind.
    #[error("a {0} named \"{1}\" already exists")]
    DuplicateName(&'static str, String),

    /// A monetary amount failed validation, e.g. a deposit of zero dollars.
    #[error("invalid amount {0}: {1}")]
    InvalidAmount(f64, &'static str),

    /// The currency code is not three ASCII letters.
    #[error("\"{0}\" is not a valid currency code")]
    InvalidCurrency(String),

    /// Money was moved between entities that hold different currencies.
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch {
        /// The currency of the source.
        expected: String,
        /// The currency of the destination.
        actual: String,
    },

    /// A transfer named the same wallet or envelope as source and destination.
    #[error("the source and destination {0} must be different")]
    SameSourceAndDestination(&'static str),

    /// A date in the future was used to create a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// The user tried to move more budget out of an envelope than they have
    /// free, i.e. assigned minus spent.
    #[error("insufficient budget: {available:.2} available, {requested:.2} requested")]
    InsufficientBudget {
        /// The free budget of the user in the envelope.
        available: f64,
        /// The amount the user asked to move.
        requested: f64,
    },

    /// A field referenced an entity that does not exist or is not visible
    /// to the user, e.g. a transaction with an unknown category.
    #[error("the {0} with ID {1} does not exist")]
    InvalidReference(&'static str, i64),

    /// The request body or query was malformed, or failed a validation that
    /// has no dedicated variant.
    #[error("{0}")]
    InvalidInput(String),

    /// The user is logged in but may not act on the resource.
    #[error("{0}")]
    Forbidden(String),

    /// The user's plan does not allow any more of a resource.
    #[error("plan limit reached: {0}")]
    PlanLimitReached(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An edit was based on a stale copy of a transaction.
    #[error(
        "the transaction was changed by another request (expected version {expected}, found {actual})"
    )]
    VersionConflict {
        /// The version the client based its edit on.
        expected: i64,
        /// The version currently stored.
        actual: i64,
    },

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl Error {
    /// The HTTP status code used when this error is sent to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) | Error::PlanLimitReached(_) => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::VersionConflict { .. } => StatusCode::CONFLICT,
            Error::HashingError(_)
            | Error::InvalidTimezoneError(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Server errors are not intended to be shown to the client.
        let message = if status.is_server_error() {
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, ApiResponse::<()>::failure(message)).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{ApiResponse, Error};

    async fn body_of(error: Error) -> (StatusCode, ApiResponse<()>) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn client_errors_include_message() {
        let (status, body) = body_of(Error::InvalidAmount(-1.0, "must be greater than zero")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
        assert_eq!(
            body.error.as_deref(),
            Some("invalid amount -1: must be greater than zero")
        );
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let (status, body) = body_of(Error::SqlError(rusqlite::Error::InvalidQuery)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.success);
        assert!(!body.error.unwrap().contains("SQL"));
    }

    #[test]
    fn maps_status_codes() {
        assert_eq!(Error::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Forbidden("nope".to_owned()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::VersionConflict {
                expected: 1,
                actual: 2
            }
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
