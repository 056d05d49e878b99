//! Route handlers for envelopes, their budget and their participants.

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
    envelope::{
        budget::{
            BudgetAssignment, BudgetForm, BudgetMovement, EnvelopeTransfer, EnvelopeTransferForm,
            assign_budget, list_assignments, return_budget, transfer_budget,
        },
        core::{
            EnvelopeId, EnvelopeView, NewEnvelope, UpdateEnvelope, create_envelope,
            delete_envelope, get_envelope, list_envelopes, update_envelope,
        },
        participant::{
            ParticipantDetails, ParticipantForm, add_participant, list_participants,
            remove_participant,
        },
    },
    extract::JsonBody,
};

/// The state needed by the envelope endpoints.
#[derive(Debug, Clone)]
pub struct EnvelopeState {
    /// The database connection for managing envelopes.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EnvelopeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating an envelope, responds with 201 Created.
pub async fn create_envelope_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(new_envelope): JsonBody<NewEnvelope>,
) -> Result<Response, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let envelope = create_envelope(user_id, &new_envelope, &transaction)?;
    transaction.commit()?;

    tracing::info!("User {user_id} created envelope {}", envelope.envelope.id);

    Ok((StatusCode::CREATED, ApiResponse::success(envelope)).into_response())
}

/// A route handler for listing the envelopes the user participates in.
pub async fn list_envelopes_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<Vec<EnvelopeView>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_envelopes(user_id, &connection).map(ApiResponse::success)
}

/// A route handler for getting a single envelope.
pub async fn get_envelope_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
) -> Result<ApiResponse<EnvelopeView>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_envelope(envelope_id, user_id, &connection).map(ApiResponse::success)
}

/// A route handler for renaming an envelope or changing whether it is shared.
pub async fn update_envelope_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
    JsonBody(update): JsonBody<UpdateEnvelope>,
) -> Result<ApiResponse<EnvelopeView>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_envelope(envelope_id, user_id, &update, &connection).map(ApiResponse::success)
}

/// A route handler for soft deleting an envelope.
pub async fn delete_envelope_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
) -> Result<ApiResponse<()>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    delete_envelope(envelope_id, user_id, &transaction)?;
    transaction.commit()?;

    tracing::info!("User {user_id} deleted envelope {envelope_id}");

    Ok(ApiResponse::success(()))
}

/// A route handler for assigning budget from a wallet to an envelope.
pub async fn assign_budget_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
    JsonBody(form): JsonBody<BudgetForm>,
) -> Result<ApiResponse<BudgetMovement>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (movement, warnings) =
        assign_budget(envelope_id, user_id, form.wallet_id, form.amount, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(movement).with_warnings(warnings))
}

/// A route handler for returning unspent budget to a wallet.
pub async fn return_budget_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
    JsonBody(form): JsonBody<BudgetForm>,
) -> Result<ApiResponse<BudgetMovement>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let movement = return_budget(envelope_id, user_id, form.wallet_id, form.amount, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(movement))
}

/// A route handler for moving budget between two envelopes.
pub async fn transfer_budget_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(form): JsonBody<EnvelopeTransferForm>,
) -> Result<ApiResponse<EnvelopeTransfer>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let (transfer, warnings) = transfer_budget(user_id, &form, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(transfer).with_warnings(warnings))
}

/// A route handler for getting the budget ledger of an envelope.
pub async fn list_assignments_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
) -> Result<ApiResponse<Vec<BudgetAssignment>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_assignments(envelope_id, user_id, &connection).map(ApiResponse::success)
}

/// A route handler for adding a participant to a shared envelope, responds with 201 Created.
pub async fn add_participant_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
    JsonBody(form): JsonBody<ParticipantForm>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let participant = add_participant(envelope_id, user_id, &form, &connection)?;

    tracing::info!(
        "User {user_id} added user {} to envelope {envelope_id}",
        participant.user_id
    );

    Ok((StatusCode::CREATED, ApiResponse::success(participant)).into_response())
}

/// A route handler for listing the participants of an envelope.
pub async fn list_participants_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path(envelope_id): Path<EnvelopeId>,
) -> Result<ApiResponse<Vec<ParticipantDetails>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_participants(envelope_id, user_id, &connection).map(ApiResponse::success)
}

/// A route handler for removing a participant from an envelope.
pub async fn remove_participant_endpoint(
    State(state): State<EnvelopeState>,
    Extension(user_id): Extension<UserID>,
    Path((envelope_id, participant_id)): Path<(EnvelopeId, UserID)>,
) -> Result<ApiResponse<()>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    remove_participant(envelope_id, user_id, participant_id, &connection)?;

    Ok(ApiResponse::success(()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        ApiResponse,
        endpoints::{self, format_endpoint},
        test_utils::{
            create_test_server, create_test_user, create_test_wallet, log_in_as,
            upgrade_test_user,
        },
    };

    #[tokio::test]
    async fn create_assign_and_list_ledger() {
        let (server, state) = create_test_server();
        let wallet_id = {
            let connection = state.db_connection.lock().unwrap();
            let user = create_test_user("ana@example.com", &connection);
            create_test_wallet(user.id, "Cash", 100.0, &connection).id
        };
        let cookie = log_in_as(&server, "ana@example.com").await;

        let response = server
            .post(endpoints::ENVELOPES)
            .add_cookie(cookie.clone())
            .json(&json!({"name": "Groceries"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<serde_json::Value> = response.json();
        let envelope_id = body.data.unwrap()["id"].as_i64().unwrap();

        let response = server
            .post(&format_endpoint(endpoints::ENVELOPE_ASSIGN, envelope_id))
            .add_cookie(cookie.clone())
            .json(&json!({"wallet_id": wallet_id, "amount": 150}))
            .await;
        response.assert_status_ok();
        let body: ApiResponse<serde_json::Value> = response.json();
        assert_eq!(body.warnings.len(), 1);
        assert_eq!(body.data.unwrap()["envelope"]["assigned_budget"], 150.0);

        let body: ApiResponse<Vec<serde_json::Value>> = server
            .get(&format_endpoint(endpoints::ENVELOPE_ASSIGNMENTS, envelope_id))
            .add_cookie(cookie)
            .await
            .json();
        let ledger = body.data.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0]["kind"], "assign");
    }

    #[tokio::test]
    async fn return_more_than_free_budget_is_bad_request() {
        let (server, state) = create_test_server();
        let wallet_id = {
            let connection = state.db_connection.lock().unwrap();
            let user = create_test_user("ana@example.com", &connection);
            create_test_wallet(user.id, "Cash", 100.0, &connection).id
        };
        let cookie = log_in_as(&server, "ana@example.com").await;
        let body: ApiResponse<serde_json::Value> = server
            .post(endpoints::ENVELOPES)
            .add_cookie(cookie.clone())
            .json(&json!({"name": "Groceries"}))
            .await
            .json();
        let envelope_id = body.data.unwrap()["id"].as_i64().unwrap();

        let response = server
            .post(&format_endpoint(endpoints::ENVELOPE_RETURN, envelope_id))
            .add_cookie(cookie)
            .json(&json!({"wallet_id": wallet_id, "amount": 1}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn participant_can_see_but_not_delete() {
        let (server, state) = create_test_server();
        {
            let connection = state.db_connection.lock().unwrap();
            let owner = create_test_user("ana@example.com", &connection);
            create_test_user("bob@example.com", &connection);
            upgrade_test_user(owner.id, "family", &connection);
        }
        let owner_cookie = log_in_as(&server, "ana@example.com").await;
        let body: ApiResponse<serde_json::Value> = server
            .post(endpoints::ENVELOPES)
            .add_cookie(owner_cookie.clone())
            .json(&json!({"name": "House", "is_shared": true}))
            .await
            .json();
        let envelope_id = body.data.unwrap()["id"].as_i64().unwrap();

        server
            .post(&format_endpoint(endpoints::ENVELOPE_PARTICIPANTS, envelope_id))
            .add_cookie(owner_cookie.clone())
            .json(&json!({"email": "bob@example.com", "role": "editor"}))
            .await
            .assert_status(StatusCode::CREATED);

        let bob_cookie = log_in_as(&server, "bob@example.com").await;
        let path = format_endpoint(endpoints::ENVELOPE, envelope_id);
        server
            .get(&path)
            .add_cookie(bob_cookie.clone())
            .await
            .assert_status_ok();
        server
            .delete(&path)
            .add_cookie(bob_cookie)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let body: ApiResponse<Vec<serde_json::Value>> = server
            .get(&format_endpoint(endpoints::ENVELOPE_PARTICIPANTS, envelope_id))
            .add_cookie(owner_cookie)
            .await
            .json();
        assert_eq!(body.data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_envelope_is_not_found() {
        let (server, state) = create_test_server();
        create_test_user("ana@example.com", &state.db_connection.lock().unwrap());
        let cookie = log_in_as(&server, "ana@example.com").await;

        server
            .get(&format_endpoint(endpoints::ENVELOPE, 42))
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
