//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};

use crate::{
    ApiResponse, AppState, Error,
    auth::{auth_guard, get_log_out, post_log_in, register_user},
    category::{
        create_category_endpoint, create_subcategory_endpoint, delete_category_endpoint,
        delete_subcategory_endpoint, list_categories_endpoint, list_subcategories_endpoint,
        update_category_endpoint, update_subcategory_endpoint,
    },
    endpoints,
    envelope::{
        add_participant_endpoint, assign_budget_endpoint, create_envelope_endpoint,
        delete_envelope_endpoint, get_envelope_endpoint, list_assignments_endpoint,
        list_envelopes_endpoint, list_participants_endpoint, remove_participant_endpoint,
        return_budget_endpoint, transfer_budget_endpoint, update_envelope_endpoint,
    },
    subscription::{
        accept_invitation_endpoint, cancel_subscription_endpoint, change_plan_endpoint,
        create_invitation_endpoint, decline_invitation_endpoint, get_plans_endpoint,
        get_subscription_endpoint, list_invitations_endpoint, remove_member_endpoint,
        revoke_invitation_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
    user_config::{get_current_user_endpoint, get_user_config_endpoint, update_user_config_endpoint},
    wallet::{
        adjust_wallet_endpoint, create_wallet_endpoint, delete_wallet_endpoint, deposit_endpoint,
        get_wallet_endpoint, get_wallet_summary_endpoint, list_wallets_endpoint,
        transfer_endpoint, update_wallet_endpoint, withdraw_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::COFFEE, get(get_coffee))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::PLANS, get(get_plans_endpoint));

    let protected_routes = Router::new()
        .route(endpoints::CURRENT_USER, get(get_current_user_endpoint))
        .route(
            endpoints::USER_CONFIG,
            get(get_user_config_endpoint).put(update_user_config_endpoint),
        )
        .route(
            endpoints::WALLETS,
            get(list_wallets_endpoint).post(create_wallet_endpoint),
        )
        .route(endpoints::WALLET_SUMMARY, get(get_wallet_summary_endpoint))
        .route(endpoints::WALLET_TRANSFER, post(transfer_endpoint))
        .route(
            endpoints::WALLET,
            get(get_wallet_endpoint)
                .put(update_wallet_endpoint)
                .delete(delete_wallet_endpoint),
        )
        .route(endpoints::WALLET_ADJUST, post(adjust_wallet_endpoint))
        .route(endpoints::WALLET_DEPOSIT, post(deposit_endpoint))
        .route(endpoints::WALLET_WITHDRAW, post(withdraw_endpoint))
        .route(
            endpoints::ENVELOPES,
            get(list_envelopes_endpoint).post(create_envelope_endpoint),
        )
        .route(endpoints::ENVELOPE_TRANSFER, post(transfer_budget_endpoint))
        .route(
            endpoints::ENVELOPE,
            get(get_envelope_endpoint)
                .put(update_envelope_endpoint)
                .delete(delete_envelope_endpoint),
        )
        .route(endpoints::ENVELOPE_ASSIGN, post(assign_budget_endpoint))
        .route(endpoints::ENVELOPE_RETURN, post(return_budget_endpoint))
        .route(
            endpoints::ENVELOPE_ASSIGNMENTS,
            get(list_assignments_endpoint),
        )
        .route(
            endpoints::ENVELOPE_PARTICIPANTS,
            get(list_participants_endpoint).post(add_participant_endpoint),
        )
        .route(
            endpoints::ENVELOPE_PARTICIPANT,
            delete(remove_participant_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::SUBCATEGORIES,
            get(list_subcategories_endpoint).post(create_subcategory_endpoint),
        )
        .route(
            endpoints::SUBCATEGORY,
            put(update_subcategory_endpoint).delete(delete_subcategory_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::SUBSCRIPTION,
            get(get_subscription_endpoint)
                .post(change_plan_endpoint)
                .delete(cancel_subscription_endpoint),
        )
        .route(
            endpoints::SUBSCRIPTION_MEMBER,
            delete(remove_member_endpoint),
        )
        .route(
            endpoints::INVITATIONS,
            get(list_invitations_endpoint).post(create_invitation_endpoint),
        )
        .route(
            endpoints::INVITATION,
            delete(revoke_invitation_endpoint),
        )
        .route(
            endpoints::INVITATION_ACCEPT,
            post(accept_invitation_endpoint),
        )
        .route(
            endpoints::INVITATION_DECLINE,
            post(decline_invitation_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (
        StatusCode::IM_A_TEAPOT,
        ApiResponse::<()>::failure("I'm a teapot".to_owned()),
    )
        .into_response()
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
