#![allow(missing_docs)]

//! Shared helpers for tests: in-memory databases, test users and a logged in client.

use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, PaginationConfig, PasswordHash, User, UserID, ValidatedPassword,
    auth::{COOKIE_TOKEN, create_user},
    build_router,
    db::initialize,
    endpoints,
    subscription::{change_plan, start_free_subscription},
    user_config::create_default_user_config,
    wallet::{NewWallet, Wallet, WalletType, create_wallet},
};

/// A password that passes the strength check.
pub const TEST_PASSWORD: &str = "averysafeandsecurepassword";

pub fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize(&connection).expect("Could not initialize database.");
    connection
}

pub fn create_test_state() -> AppState {
    AppState::new(
        Connection::open_in_memory().expect("Could not open database in memory."),
        "42",
        "Etc/UTC",
        PaginationConfig::default(),
    )
    .expect("Could not create app state.")
}

/// Register a user with [TEST_PASSWORD] on the free plan.
///
/// The bcrypt cost is kept low so the tests run quickly.
pub fn create_test_user(email: &str, connection: &Connection) -> User {
    let password_hash = PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4)
        .expect("Could not hash password.");
    let display_name = email.split('@').next().unwrap_or(email);

    let user = create_user(email, display_name, password_hash, connection)
        .expect("Could not create test user.");
    start_free_subscription(user.id, connection).expect("Could not start subscription.");
    create_default_user_config(user.id, connection).expect("Could not create user config.");

    user
}

/// Move `user_id` onto the plan with `plan_code`, e.g. "family".
pub fn upgrade_test_user(user_id: UserID, plan_code: &str, connection: &Connection) {
    change_plan(user_id, plan_code, connection).expect("Could not change plan.");
}

/// Create a cash wallet in the user's default currency holding `balance`.
pub fn create_test_wallet(
    user_id: UserID,
    name: &str,
    balance: f64,
    connection: &Connection,
) -> Wallet {
    create_wallet(
        user_id,
        &NewWallet {
            name: name.to_owned(),
            wallet_type: WalletType::Cash,
            currency: None,
            initial_balance: balance,
        },
        OffsetDateTime::now_utc().date(),
        connection,
    )
    .expect("Could not create test wallet.")
}

/// A server with every route of the application and the state behind it.
pub fn create_test_server() -> (TestServer, AppState) {
    let state = create_test_state();
    let server =
        TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

    (server, state)
}

/// Log in as the test user registered with `email` and return their auth cookie.
pub async fn log_in_as(server: &TestServer, email: &str) -> Cookie<'static> {
    let response = server
        .post(endpoints::LOG_IN)
        .json(&json!({"email": email, "password": TEST_PASSWORD}))
        .await;

    response.assert_status_ok();
    response.cookie(COOKIE_TOKEN)
}
