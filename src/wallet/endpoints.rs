//! Route handlers for wallets.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    ApiResponse, AppState, Error, UserID,
    db::lock_connection,
    extract::JsonBody,
    timezone::local_today,
    wallet::{
        core::{
            CurrencyTotal, NewWallet, UpdateWallet, Wallet, WalletId, create_wallet,
            delete_wallet, get_wallet, get_wallet_summary, list_wallets, update_wallet,
        },
        movement::{
            AdjustForm, MovementForm, TransferForm, WalletMovement, WalletTransfer,
            adjust_wallet, deposit_to_wallet, transfer_between_wallets, withdraw_from_wallet,
        },
    },
};

/// The state needed by the wallet endpoints.
#[derive(Debug, Clone)]
pub struct WalletState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The database connection for managing wallets.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for WalletState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating a wallet, responds with 201 Created.
pub async fn create_wallet_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(new_wallet): JsonBody<NewWallet>,
) -> Result<Response, Error> {
    let today = local_today(&state.local_timezone)?;
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let wallet = create_wallet(user_id, &new_wallet, today, &transaction)?;
    transaction.commit()?;

    tracing::info!("User {user_id} created wallet {}", wallet.id);

    Ok((StatusCode::CREATED, ApiResponse::success(wallet)).into_response())
}

/// A route handler for listing the logged in user's wallets.
pub async fn list_wallets_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<Vec<Wallet>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_wallets(user_id, &connection).map(ApiResponse::success)
}

/// A route handler for getting the per currency totals of the user's wallets.
pub async fn get_wallet_summary_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<Vec<CurrencyTotal>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_wallet_summary(user_id, &connection).map(ApiResponse::success)
}

/// A route handler for getting a single wallet.
pub async fn get_wallet_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    Path(wallet_id): Path<WalletId>,
) -> Result<ApiResponse<Wallet>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_wallet(wallet_id, user_id, &connection).map(ApiResponse::success)
}

/// A route handler for renaming a wallet or changing its kind.
pub async fn update_wallet_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    Path(wallet_id): Path<WalletId>,
    JsonBody(update): JsonBody<UpdateWallet>,
) -> Result<ApiResponse<Wallet>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_wallet(wallet_id, user_id, &update, &connection).map(ApiResponse::success)
}

/// A route handler for soft deleting a wallet.
pub async fn delete_wallet_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    Path(wallet_id): Path<WalletId>,
) -> Result<ApiResponse<()>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    delete_wallet(wallet_id, user_id, &transaction)?;
    transaction.commit()?;

    tracing::info!("User {user_id} deleted wallet {wallet_id}");

    Ok(ApiResponse::success(()))
}

/// A route handler for correcting a wallet's balance.
pub async fn adjust_wallet_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    Path(wallet_id): Path<WalletId>,
    JsonBody(form): JsonBody<AdjustForm>,
) -> Result<ApiResponse<WalletMovement>, Error> {
    let today = local_today(&state.local_timezone)?;
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (movement, warnings) = adjust_wallet(wallet_id, user_id, &form, today, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(movement).with_warnings(warnings))
}

/// A route handler for putting money into a wallet.
pub async fn deposit_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    Path(wallet_id): Path<WalletId>,
    JsonBody(form): JsonBody<MovementForm>,
) -> Result<ApiResponse<WalletMovement>, Error> {
    let today = local_today(&state.local_timezone)?;
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (movement, warnings) = deposit_to_wallet(wallet_id, user_id, &form, today, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(movement).with_warnings(warnings))
}

/// A route handler for taking money out of a wallet.
pub async fn withdraw_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    Path(wallet_id): Path<WalletId>,
    JsonBody(form): JsonBody<MovementForm>,
) -> Result<ApiResponse<WalletMovement>, Error> {
    let today = local_today(&state.local_timezone)?;
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (movement, warnings) =
        withdraw_from_wallet(wallet_id, user_id, &form, today, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(movement).with_warnings(warnings))
}

/// A route handler for moving money between two wallets.
pub async fn transfer_endpoint(
    State(state): State<WalletState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(form): JsonBody<TransferForm>,
) -> Result<ApiResponse<WalletTransfer>, Error> {
    let today = local_today(&state.local_timezone)?;
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (transfer, warnings) = transfer_between_wallets(user_id, &form, today, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(transfer).with_warnings(warnings))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        ApiResponse,
        endpoints::{self, format_endpoint},
        test_utils::{create_test_server, create_test_user, create_test_wallet, log_in_as},
    };

    #[tokio::test]
    async fn create_then_get_wallet() {
        let (server, state) = create_test_server();
        create_test_user("ana@example.com", &state.db_connection.lock().unwrap());
        let cookie = log_in_as(&server, "ana@example.com").await;

        let response = server
            .post(endpoints::WALLETS)
            .add_cookie(cookie.clone())
            .json(&json!({
                "name": "Everyday",
                "wallet_type": "bank",
                "currency": "nzd",
                "initial_balance": 120.5
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<serde_json::Value> = response.json();
        let wallet = body.data.unwrap();
        assert_eq!(wallet["currency"], "NZD");
        assert_eq!(wallet["real_balance"], 120.5);

        let response = server
            .get(&format_endpoint(
                endpoints::WALLET,
                wallet["id"].as_i64().unwrap(),
            ))
            .add_cookie(cookie)
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn create_with_negative_balance_is_bad_request() {
        let (server, state) = create_test_server();
        create_test_user("ana@example.com", &state.db_connection.lock().unwrap());
        let cookie = log_in_as(&server, "ana@example.com").await;

        let response = server
            .post(endpoints::WALLETS)
            .add_cookie(cookie)
            .json(&json!({"name": "Overdrawn", "initial_balance": -5}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ApiResponse<()> = response.json();
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("invalid amount -5: must not be negative"));
    }

    #[tokio::test]
    async fn fourth_wallet_on_free_plan_is_forbidden() {
        let (server, state) = create_test_server();
        {
            let connection = state.db_connection.lock().unwrap();
            let user = create_test_user("ana@example.com", &connection);
            for name in ["One", "Two", "Three"] {
                create_test_wallet(user.id, name, 0.0, &connection);
            }
        }
        let cookie = log_in_as(&server, "ana@example.com").await;

        let response = server
            .post(endpoints::WALLETS)
            .add_cookie(cookie)
            .json(&json!({"name": "Four"}))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn withdraw_returns_negative_balance_warning() {
        let (server, state) = create_test_server();
        let wallet_id = {
            let connection = state.db_connection.lock().unwrap();
            let user = create_test_user("ana@example.com", &connection);
            create_test_wallet(user.id, "Cash", 10.0, &connection).id
        };
        let cookie = log_in_as(&server, "ana@example.com").await;

        let response = server
            .post(&format_endpoint(endpoints::WALLET_WITHDRAW, wallet_id))
            .add_cookie(cookie)
            .json(&json!({"amount": 12.0}))
            .await;

        response.assert_status_ok();
        let body: ApiResponse<serde_json::Value> = response.json();
        assert_eq!(body.warnings.len(), 1);
        assert_eq!(body.data.unwrap()["wallet"]["real_balance"], -2.0);
    }

    #[tokio::test]
    async fn deleted_wallet_is_not_found() {
        let (server, state) = create_test_server();
        let wallet_id = {
            let connection = state.db_connection.lock().unwrap();
            let user = create_test_user("ana@example.com", &connection);
            create_test_wallet(user.id, "Cash", 10.0, &connection).id
        };
        let cookie = log_in_as(&server, "ana@example.com").await;
        let path = format_endpoint(endpoints::WALLET, wallet_id);

        server
            .delete(&path)
            .add_cookie(cookie.clone())
            .await
            .assert_status_ok();

        server
            .get(&path)
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let body: ApiResponse<Vec<serde_json::Value>> = server
            .get(endpoints::WALLETS)
            .add_cookie(cookie)
            .await
            .json();
        assert!(body.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_users_wallet_is_forbidden() {
        let (server, state) = create_test_server();
        let wallet_id = {
            let connection = state.db_connection.lock().unwrap();
            let ana = create_test_user("ana@example.com", &connection);
            create_test_user("bob@example.com", &connection);
            create_test_wallet(ana.id, "Cash", 10.0, &connection).id
        };
        let cookie = log_in_as(&server, "bob@example.com").await;

        server
            .get(&format_endpoint(endpoints::WALLET, wallet_id))
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn transfer_and_summary() {
        let (server, state) = create_test_server();
        let (from, to) = {
            let connection = state.db_connection.lock().unwrap();
            let user = create_test_user("ana@example.com", &connection);
            (
                create_test_wallet(user.id, "Bank", 100.0, &connection).id,
                create_test_wallet(user.id, "Savings", 0.0, &connection).id,
            )
        };
        let cookie = log_in_as(&server, "ana@example.com").await;

        server
            .post(endpoints::WALLET_TRANSFER)
            .add_cookie(cookie.clone())
            .json(&json!({"from_wallet_id": from, "to_wallet_id": to, "amount": 25}))
            .await
            .assert_status_ok();

        let body: ApiResponse<serde_json::Value> = server
            .get(endpoints::WALLET_SUMMARY)
            .add_cookie(cookie)
            .await
            .json();
        let summary = body.data.unwrap();
        assert_eq!(summary[0]["currency"], "USD");
        assert_eq!(summary[0]["real_balance"], 100.0);
        assert_eq!(summary[0]["wallet_count"], 2);
    }
}
