//! The endpoint for logging in with an email and password.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    ApiResponse, AppState, Error,
    auth::{cookie::set_auth_cookie, user::get_user_by_email},
    db::lock_connection,
    extract::JsonBody,
};

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// The credentials sent by the client to log in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// The email address the user registered with.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
    /// Whether to keep the user logged in for a week.
    #[serde(default)]
    pub remember_me: bool,
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request the auth cookie is set and the user is returned.
///
/// # Errors
///
/// Responds with 401 Unauthorized if the email is unknown or the password is
/// wrong, and 500 if an internal error occurred when verifying the password.
pub async fn post_log_in(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    JsonBody(user_data): JsonBody<LogInData>,
) -> Result<Response, Error> {
    let user = {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_email(&user_data.email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    let is_password_valid = user
        .password_hash
        .verify(&user_data.password)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !is_password_valid {
        tracing::info!("Failed log-in attempt for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let cookie_duration = if user_data.remember_me {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let jar = set_auth_cookie(jar, user.id, cookie_duration)?;

    Ok((jar, ApiResponse::success(user)).into_response())
}

#[cfg(test)]
mod log_in_tests {
    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        ApiResponse,
        auth::cookie::COOKIE_TOKEN,
        endpoints,
        test_utils::{TEST_PASSWORD, create_test_state, create_test_user},
    };

    use super::post_log_in;

    fn get_test_server() -> TestServer {
        let state = create_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            create_test_user("ana@example.com", &connection);
        }

        let app = Router::new()
            .route(endpoints::LOG_IN, post(post_log_in))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let server = get_test_server();

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "Ana@example.com", "password": TEST_PASSWORD}))
            .await;

        response.assert_status_ok();
        let body: ApiResponse<serde_json::Value> = response.json();
        assert!(body.success);
        assert_eq!(body.data.unwrap()["email"], "ana@example.com");
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let server = get_test_server();

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "ana@example.com", "password": "wrong password"}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let server = get_test_server();

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "bob@example.com", "password": TEST_PASSWORD}))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: ApiResponse<()> = response.json();
        assert_eq!(body.error.as_deref(), Some("invalid email or password"));
    }

    #[tokio::test]
    async fn log_in_rejects_malformed_body() {
        let server = get_test_server();

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "ana@example.com"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
