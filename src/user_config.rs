//! Per-user preferences and the endpoints for reading the logged in user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{
    ApiResponse, AppState, Error, User, UserID,
    auth::get_user_by_id,
    currency::Currency,
    db::lock_connection,
    extract::JsonBody,
    wallet::{WalletId, get_wallet},
};

/// The preferences of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// The user the preferences belong to.
    pub user_id: UserID,
    /// The currency new wallets and envelopes use when none is given.
    pub default_currency: Currency,
    /// The wallet clients should preselect, if any.
    pub default_wallet_id: Option<WalletId>,
}

/// Create the user config table.
pub fn create_user_config_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user_config (
            user_id INTEGER PRIMARY KEY,
            default_currency TEXT NOT NULL,
            default_wallet_id INTEGER,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(default_wallet_id) REFERENCES wallet(id) ON DELETE SET NULL
        )",
        (),
    )?;

    Ok(())
}

/// Store the default preferences for a newly registered user.
pub fn create_default_user_config(
    user_id: UserID,
    connection: &Connection,
) -> Result<UserConfig, Error> {
    let config = UserConfig {
        user_id,
        default_currency: Currency::default(),
        default_wallet_id: None,
    };

    connection.execute(
        "INSERT OR IGNORE INTO user_config (user_id, default_currency, default_wallet_id)
         VALUES (?1, ?2, NULL)",
        (user_id.as_i64(), config.default_currency.as_ref()),
    )?;

    Ok(config)
}

/// Get the preferences of `user_id`, falling back to the defaults if none were stored.
pub fn get_user_config(user_id: UserID, connection: &Connection) -> Result<UserConfig, Error> {
    let config = connection
        .prepare(
            "SELECT user_id, default_currency, default_wallet_id FROM user_config
             WHERE user_id = :user_id",
        )?
        .query_row(&[(":user_id", &user_id.as_i64())], map_user_config_row)
        .optional()?;

    Ok(config.unwrap_or(UserConfig {
        user_id,
        default_currency: Currency::default(),
        default_wallet_id: None,
    }))
}

/// The fields a user can change in their preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserConfig {
    /// The new default currency code.
    pub default_currency: String,
    /// The new default wallet, or `None` to clear it.
    #[serde(default)]
    pub default_wallet_id: Option<WalletId>,
}

/// Replace the preferences of `user_id`.
///
/// # Errors
///
/// Returns an [Error::InvalidCurrency] for a malformed currency, or the error
/// from [get_wallet] if the default wallet is not a live wallet of the user.
pub fn update_user_config(
    user_id: UserID,
    update: &UpdateUserConfig,
    connection: &Connection,
) -> Result<UserConfig, Error> {
    let default_currency = Currency::new(&update.default_currency)?;

    if let Some(wallet_id) = update.default_wallet_id {
        get_wallet(wallet_id, user_id, connection)?;
    }

    connection.execute(
        "INSERT INTO user_config (user_id, default_currency, default_wallet_id)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
            default_currency = excluded.default_currency,
            default_wallet_id = excluded.default_wallet_id",
        (
            user_id.as_i64(),
            default_currency.as_ref(),
            update.default_wallet_id,
        ),
    )?;

    Ok(UserConfig {
        user_id,
        default_currency,
        default_wallet_id: update.default_wallet_id,
    })
}

fn map_user_config_row(row: &Row) -> Result<UserConfig, rusqlite::Error> {
    let user_id = UserID::new(row.get(0)?);
    let raw_currency: String = row.get(1)?;
    let default_wallet_id = row.get(2)?;

    Ok(UserConfig {
        user_id,
        default_currency: Currency::new_unchecked(&raw_currency),
        default_wallet_id,
    })
}

/// The state needed by the user endpoints.
#[derive(Debug, Clone)]
pub struct UserConfigState {
    /// The database connection for managing user preferences.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UserConfigState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for getting the logged in user.
pub async fn get_current_user_endpoint(
    State(state): State<UserConfigState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<User>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_user_by_id(user_id, &connection).map(ApiResponse::success)
}

/// A route handler for getting the logged in user's preferences.
pub async fn get_user_config_endpoint(
    State(state): State<UserConfigState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<UserConfig>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_user_config(user_id, &connection).map(ApiResponse::success)
}

/// A route handler for replacing the logged in user's preferences.
pub async fn update_user_config_endpoint(
    State(state): State<UserConfigState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(update): JsonBody<UpdateUserConfig>,
) -> Result<ApiResponse<UserConfig>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_user_config(user_id, &update, &connection).map(ApiResponse::success)
}
