//! The endpoint for registering a new user.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    ApiResponse, AppState, Error, PasswordHash, ValidatedPassword,
    auth::{
        cookie::set_auth_cookie,
        user::{create_user, normalize_email},
    },
    db::lock_connection,
    extract::JsonBody,
    subscription::start_free_subscription,
    user_config::create_default_user_config,
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection for storing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The details needed to register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterForm {
    /// The email address to log in with.
    pub email: String,
    /// The name shown to other users, defaults to the first part of the email.
    #[serde(default)]
    pub display_name: Option<String>,
    /// The plain text password.
    pub password: String,
}

/// Register a new user on the free plan and log them in.
///
/// Responds with 201 Created and the new user on success.
pub async fn register_user(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    JsonBody(user_data): JsonBody<RegisterForm>,
) -> Result<Response, Error> {
    let email = normalize_email(&user_data.email)?;
    let display_name = match user_data.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => email
            .split_once('@')
            .map(|(local, _)| local.to_owned())
            .unwrap_or_else(|| email.clone()),
    };

    let validated_password =
        ValidatedPassword::new(&user_data.password, &[&email, &display_name])?;
    let password_hash = PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST)?;

    let user = {
        let mut connection = lock_connection(&state.db_connection)?;
        let transaction = connection.transaction()?;

        let user = create_user(&email, &display_name, password_hash, &transaction)?;
        start_free_subscription(user.id, &transaction)?;
        create_default_user_config(user.id, &transaction)?;

        transaction.commit()?;
        user
    };

    tracing::info!("Registered user {}", user.id);

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((StatusCode::CREATED, jar, ApiResponse::success(user)).into_response())
}

#[cfg(test)]
mod register_tests {
    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        ApiResponse, AppState,
        auth::{cookie::COOKIE_TOKEN, user::get_user_by_email},
        endpoints,
        subscription::get_effective_plan,
        test_utils::{TEST_PASSWORD, create_test_state},
        user_config::get_user_config,
    };

    use super::register_user;

    fn get_test_server() -> (TestServer, AppState) {
        let state = create_test_state();
        let app = Router::new()
            .route(endpoints::USERS, post(register_user))
            .with_state(state.clone());

        (
            TestServer::try_new(app).expect("Could not create test server."),
            state,
        )
    }

    #[tokio::test]
    async fn register_creates_user_subscription_and_config() {
        let (server, state) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "Ana@Example.com",
                "display_name": "Ana",
                "password": TEST_PASSWORD
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
        let body: ApiResponse<serde_json::Value> = response.json();
        let data = body.data.unwrap();
        assert_eq!(data["email"], "ana@example.com");
        assert!(data.get("password_hash").is_none());

        let connection = state.db_connection.lock().unwrap();
        let user = get_user_by_email("ana@example.com", &connection).unwrap();
        assert_eq!(get_effective_plan(user.id, &connection).unwrap().code, "free");
        assert_eq!(
            get_user_config(user.id, &connection)
                .unwrap()
                .default_currency
                .as_ref(),
            "USD"
        );
    }

    #[tokio::test]
    async fn register_defaults_display_name_to_email_local_part() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "bob@example.com",
                "password": TEST_PASSWORD
            }))
            .await;

        let body: ApiResponse<serde_json::Value> = response.json();
        assert_eq!(body.data.unwrap()["display_name"], "bob");
    }

    #[tokio::test]
    async fn register_rejects_weak_password() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({"email": "ana@example.com", "password": "password"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let (server, _) = get_test_server();
        let body = json!({
            "email": "ana@example.com",
            "password": TEST_PASSWORD
        });
        server
            .post(endpoints::USERS)
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.post(endpoints::USERS).json(&body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ApiResponse<()> = response.json();
        assert_eq!(
            body.error.as_deref(),
            Some("the email address is already registered")
        );
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({"email": "not-an-email", "password": TEST_PASSWORD}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
