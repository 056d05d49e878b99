//! Route handlers for plans, subscriptions and invitations.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    ApiResponse, AppState, Error, UserID,
    db::lock_connection,
    extract::JsonBody,
    subscription::{
        core::{
            SubscriptionOverview, cancel_subscription, change_plan, get_subscription_overview,
            remove_member,
        },
        invitation::{
            Invitation, InvitationId, InvitationList, accept_invitation, create_invitation,
            decline_invitation, list_invitations, revoke_invitation,
        },
        plan::{Plan, get_all_plans},
    },
};

/// The state needed by the subscription endpoints.
#[derive(Debug, Clone)]
pub struct SubscriptionState {
    /// The database connection for managing subscriptions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SubscriptionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The plan a user wants to move to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlanForm {
    /// The code of the plan, e.g. "premium".
    pub plan_code: String,
}

/// The person to invite to a shared subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationForm {
    /// The email address of the person to invite.
    pub email: String,
}

/// A route handler for listing the available plans.
pub async fn get_plans_endpoint(
    State(state): State<SubscriptionState>,
) -> Result<ApiResponse<Vec<Plan>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_all_plans(&connection).map(ApiResponse::success)
}

/// A route handler for getting the logged in user's subscription.
pub async fn get_subscription_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<SubscriptionOverview>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_subscription_overview(user_id, &connection).map(ApiResponse::success)
}

/// A route handler for moving the logged in user to another plan.
pub async fn change_plan_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(form): JsonBody<ChangePlanForm>,
) -> Result<ApiResponse<SubscriptionOverview>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let overview = change_plan(user_id, &form.plan_code, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(overview))
}

/// A route handler for cancelling the logged in user's paid plan.
pub async fn cancel_subscription_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<SubscriptionOverview>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let overview = cancel_subscription(user_id, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(overview))
}

/// A route handler for removing a member from a shared subscription.
pub async fn remove_member_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
    Path(member_id): Path<UserID>,
) -> Result<ApiResponse<()>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    remove_member(user_id, member_id, &connection).map(ApiResponse::success)
}

/// A route handler for inviting someone to share the logged in user's plan.
///
/// Responds with 201 Created and the invitation on success.
pub async fn create_invitation_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
    JsonBody(form): JsonBody<InvitationForm>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let invitation = create_invitation(user_id, &form.email, &connection)?;

    Ok((StatusCode::CREATED, ApiResponse::success(invitation)).into_response())
}

/// A route handler for listing sent and received invitations.
pub async fn list_invitations_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiResponse<InvitationList>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    list_invitations(user_id, &connection).map(ApiResponse::success)
}

/// A route handler for accepting an invitation.
pub async fn accept_invitation_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
    Path(invitation_id): Path<InvitationId>,
) -> Result<ApiResponse<Invitation>, Error> {
    let mut connection = lock_connection(&state.db_connection)?;
    let transaction = connection.transaction()?;

    let invitation = accept_invitation(invitation_id, user_id, &transaction)?;
    transaction.commit()?;

    Ok(ApiResponse::success(invitation))
}

/// A route handler for declining an invitation.
pub async fn decline_invitation_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
    Path(invitation_id): Path<InvitationId>,
) -> Result<ApiResponse<Invitation>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    decline_invitation(invitation_id, user_id, &connection).map(ApiResponse::success)
}

/// A route handler for revoking an invitation.
pub async fn revoke_invitation_endpoint(
    State(state): State<SubscriptionState>,
    Extension(user_id): Extension<UserID>,
    Path(invitation_id): Path<InvitationId>,
) -> Result<ApiResponse<Invitation>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    revoke_invitation(invitation_id, user_id, &connection).map(ApiResponse::success)
}
