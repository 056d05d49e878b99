//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/wallets/{wallet_id}', use [format_endpoint].

/// The route to request a cup of coffee (experimental).
pub const COFFEE: &str = "/api/coffee";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register users.
pub const USERS: &str = "/api/users";
/// The route to get the logged in user.
pub const CURRENT_USER: &str = "/api/user";
/// The route to read and replace the logged in user's preferences.
pub const USER_CONFIG: &str = "/api/user/config";

/// The route to create and list wallets.
pub const WALLETS: &str = "/api/wallets";
/// The route to get the balance totals of all wallets.
pub const WALLET_SUMMARY: &str = "/api/wallets/summary";
/// The route to move money between two wallets.
pub const WALLET_TRANSFER: &str = "/api/wallets/transfer";
/// The route to get, update or delete a wallet.
pub const WALLET: &str = "/api/wallets/{wallet_id}";
/// The route to correct the balance of a wallet.
pub const WALLET_ADJUST: &str = "/api/wallets/{wallet_id}/adjust";
/// The route to add money to a wallet.
pub const WALLET_DEPOSIT: &str = "/api/wallets/{wallet_id}/deposit";
/// The route to take money out of a wallet.
pub const WALLET_WITHDRAW: &str = "/api/wallets/{wallet_id}/withdraw";

/// The route to create and list envelopes.
pub const ENVELOPES: &str = "/api/envelopes";
/// The route to move budget between two envelopes.
pub const ENVELOPE_TRANSFER: &str = "/api/envelopes/transfer";
/// The route to get, update or delete an envelope.
pub const ENVELOPE: &str = "/api/envelopes/{envelope_id}";
/// The route to assign budget from a wallet to an envelope.
pub const ENVELOPE_ASSIGN: &str = "/api/envelopes/{envelope_id}/assign";
/// The route to return budget from an envelope to a wallet.
pub const ENVELOPE_RETURN: &str = "/api/envelopes/{envelope_id}/return";
/// The route to list the budget assignment ledger of an envelope.
pub const ENVELOPE_ASSIGNMENTS: &str = "/api/envelopes/{envelope_id}/assignments";
/// The route to list and add the participants of an envelope.
pub const ENVELOPE_PARTICIPANTS: &str = "/api/envelopes/{envelope_id}/participants";
/// The route to remove a participant from an envelope.
pub const ENVELOPE_PARTICIPANT: &str = "/api/envelopes/{envelope_id}/participants/{user_id}";

/// The route to create and list categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to update or delete a category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route to create and list the subcategories of a category.
pub const SUBCATEGORIES: &str = "/api/categories/{category_id}/subcategories";
/// The route to update or delete a subcategory.
pub const SUBCATEGORY: &str = "/api/subcategories/{subcategory_id}";

/// The route to create and list transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to get, update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// The route to list the available plans.
pub const PLANS: &str = "/api/plans";
/// The route to get, change or cancel the logged in user's subscription.
pub const SUBSCRIPTION: &str = "/api/subscription";
/// The route to remove a member from a shared subscription.
pub const SUBSCRIPTION_MEMBER: &str = "/api/subscription/members/{user_id}";
/// The route to send and list invitations.
pub const INVITATIONS: &str = "/api/invitations";
/// The route to revoke an invitation.
pub const INVITATION: &str = "/api/invitations/{invitation_id}";
/// The route to accept an invitation.
pub const INVITATION_ACCEPT: &str = "/api/invitations/{invitation_id}/accept";
/// The route to decline an invitation.
pub const INVITATION_DECLINE: &str = "/api/invitations/{invitation_id}/decline";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
