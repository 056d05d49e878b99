//! Route handlers for transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    ApiResponse, AppState, Error, PaginationConfig, UserID,
    db::lock_connection,
    extract::{JsonBody, QueryParams},
    pagination::Page,
    timezone::local_today,
    transaction::{
        core::{
            Transaction, TransactionId, TransactionRequest, UpdateTransaction, delete_transaction,
            get_transaction, record_transaction, update_transaction,
        },
        query::{TransactionQuery, list_transactions},
    },
};

/// The state needed by the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The config that controls how to page the transaction list.
    pub pagination_config: PaginationConfig,
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for recording a transaction, responds with 201 Created.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(request): JsonBody<TransactionRequest>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (created, warnings) = record_transaction(user_id, &request, today, &transaction)?;
    transaction.commit()?;

    tracing::info!(
        "User {user_id} recorded {} transaction {}",
        created.kind,
        created.id
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::success(created).with_warnings(warnings),
    )
        .into_response())
}

/// A route handler for listing the user's transactions with filters and paging.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    QueryParams(query): QueryParams<TransactionQuery>,
) -> Result<ApiResponse<Page<Transaction>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_transactions(user_id, &query, &state.pagination_config, &connection)
        .map(ApiResponse::success)
}

/// A route handler for getting a single transaction.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<ApiResponse<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_transaction(transaction_id, user_id, &connection).map(ApiResponse::success)
}

/// A route handler for replacing a transaction.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
    JsonBody(update): JsonBody<UpdateTransaction>,
) -> Result<ApiResponse<Transaction>, Error> {
    let today = local_today(&state.local_timezone)?;
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (updated, warnings) =
        update_transaction(transaction_id, user_id, &update, today, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(updated).with_warnings(warnings))
}

/// A route handler for soft deleting a transaction and reverting its effect.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<ApiResponse<()>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let warnings = delete_transaction(transaction_id, user_id, &transaction)?;
    transaction.commit()?;

    tracing::info!("User {user_id} deleted transaction {transaction_id}");

    Ok(ApiResponse::success(()).with_warnings(warnings))
}
