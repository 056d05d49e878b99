//! Account tiers, the subscriptions users hold and sharing a plan with invited members.

mod core;
mod endpoints;
mod invitation;
mod plan;

pub use core::{
    create_subscription_tables, ensure_envelope_limit, ensure_sharing_allowed,
    ensure_wallet_limit, get_effective_plan, start_free_subscription,
};
pub use endpoints::{
    accept_invitation_endpoint, cancel_subscription_endpoint, change_plan_endpoint,
    create_invitation_endpoint, decline_invitation_endpoint, get_plans_endpoint,
    get_subscription_endpoint, list_invitations_endpoint, remove_member_endpoint,
    revoke_invitation_endpoint,
};

#[cfg(test)]
pub(crate) use core::change_plan;
