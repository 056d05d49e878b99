//! Subscriptions, shared plan members and the limits a plan places on a user.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    subscription::plan::{FREE_PLAN_CODE, Plan, PlanId, get_plan_by_code, map_plan_row},
    text_enum::text_enum,
};

/// Database identifier for a subscription.
pub type SubscriptionId = i64;

text_enum! {
    /// Whether a subscription is the one currently in use.
    pub enum SubscriptionStatus {
        /// The subscription the user is currently on.
        Active => "active",
        /// A subscription that was replaced or cancelled.
        Cancelled => "cancelled",
    }
}

/// A user's subscription to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// The ID of the subscription.
    pub id: SubscriptionId,
    /// The user paying for the subscription.
    pub user_id: UserID,
    /// The plan subscribed to.
    pub plan_id: PlanId,
    /// Whether the subscription is in use.
    pub status: SubscriptionStatus,
    /// When the subscription started.
    pub started_at: OffsetDateTime,
    /// When the subscription was cancelled or replaced.
    pub cancelled_at: Option<OffsetDateTime>,
}

/// A user who shares another user's subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// The ID of the member.
    pub user_id: UserID,
    /// The email address of the member.
    pub email: String,
    /// The display name of the member.
    pub display_name: String,
}

/// Everything a client needs to show a user's subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOverview {
    /// The user's own subscription.
    pub subscription: Subscription,
    /// The plan the user's limits come from, which is the owner's plan for members.
    pub effective_plan: Plan,
    /// The user whose subscription is shared with this user, if any.
    pub shared_by: Option<UserID>,
    /// The users this user shares their subscription with.
    pub members: Vec<Member>,
}

/// Create the plan, subscription, member and invitation tables.
pub fn create_subscription_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    super::plan::create_plan_table(connection)?;

    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS subscription (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            plan_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            cancelled_at TEXT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(plan_id) REFERENCES plan(id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_subscription_active_user
        ON subscription(user_id) WHERE status = 'active';

        CREATE TABLE IF NOT EXISTS subscription_member (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            member_id INTEGER NOT NULL,
            joined_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(owner_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(member_id) REFERENCES user(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_subscription_member_live
        ON subscription_member(member_id) WHERE deleted_at IS NULL;",
    )?;

    super::invitation::create_invitation_table(connection)?;

    Ok(())
}

/// Put `user_id` on the free plan.
///
/// # Errors
///
/// Returns an [Error::InvalidInput] if the user already has an active subscription.
pub fn start_free_subscription(
    user_id: UserID,
    connection: &Connection,
) -> Result<Subscription, Error> {
    let plan = get_plan_by_code(FREE_PLAN_CODE, connection)?;

    insert_subscription(user_id, plan.id, connection)
}

fn insert_subscription(
    user_id: UserID,
    plan_id: PlanId,
    connection: &Connection,
) -> Result<Subscription, Error> {
    connection
        .prepare(
            "INSERT INTO subscription (user_id, plan_id, status, started_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, user_id, plan_id, status, started_at, cancelled_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                plan_id,
                SubscriptionStatus::Active,
                OffsetDateTime::now_utc(),
            ),
            map_subscription_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::InvalidInput("the user already has an active subscription".to_owned()),
            error => error.into(),
        })
}

/// Get the subscription `user_id` is currently on.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the user has no active subscription.
pub fn get_active_subscription(
    user_id: UserID,
    connection: &Connection,
) -> Result<Subscription, Error> {
    connection
        .prepare(
            "SELECT id, user_id, plan_id, status, started_at, cancelled_at FROM subscription
             WHERE user_id = :user_id AND status = 'active'",
        )?
        .query_row(&[(":user_id", &user_id.as_i64())], map_subscription_row)
        .map_err(Error::from)
}

/// Get the owner of the subscription `user_id` is a member of, if any.
pub fn get_subscription_owner(
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<UserID>, Error> {
    let owner = connection
        .prepare(
            "SELECT owner_id FROM subscription_member
             WHERE member_id = :member_id AND deleted_at IS NULL",
        )?
        .query_row(&[(":member_id", &user_id.as_i64())], |row| {
            row.get(0).map(UserID::new)
        })
        .optional()?;

    Ok(owner)
}

/// Get the plan whose limits apply to `user_id`.
///
/// Members of a shared subscription get the owner's plan, everyone else gets
/// the plan of their own active subscription. This only reads, it never
/// creates a subscription.
pub fn get_effective_plan(user_id: UserID, connection: &Connection) -> Result<Plan, Error> {
    let plan_owner = get_subscription_owner(user_id, connection)?.unwrap_or(user_id);

    let plan = connection
        .prepare(
            "SELECT plan.id, plan.code, plan.name, plan.monthly_price, plan.max_wallets,
                plan.max_envelopes, plan.max_members
             FROM subscription
             INNER JOIN plan ON plan.id = subscription.plan_id
             WHERE subscription.user_id = :user_id AND subscription.status = 'active'",
        )?
        .query_row(&[(":user_id", &plan_owner.as_i64())], map_plan_row)
        .optional()?;

    // Users without a subscription row get the free plan's limits.
    match plan {
        Some(plan) => Ok(plan),
        None => get_plan_by_code(FREE_PLAN_CODE, connection),
    }
}

/// Get the users that share the subscription of `owner_id`.
pub fn get_members(owner_id: UserID, connection: &Connection) -> Result<Vec<Member>, Error> {
    connection
        .prepare(
            "SELECT user.id, user.email, user.display_name
             FROM subscription_member
             INNER JOIN user ON user.id = subscription_member.member_id
             WHERE subscription_member.owner_id = :owner_id
               AND subscription_member.deleted_at IS NULL
             ORDER BY subscription_member.joined_at ASC",
        )?
        .query_map(&[(":owner_id", &owner_id.as_i64())], |row| {
            Ok(Member {
                user_id: UserID::new(row.get(0)?),
                email: row.get(1)?,
                display_name: row.get(2)?,
            })
        })?
        .map(|maybe_member| maybe_member.map_err(Error::from))
        .collect()
}

/// Get the subscription, effective plan and members of `user_id`.
pub fn get_subscription_overview(
    user_id: UserID,
    connection: &Connection,
) -> Result<SubscriptionOverview, Error> {
    Ok(SubscriptionOverview {
        subscription: get_active_subscription(user_id, connection)?,
        effective_plan: get_effective_plan(user_id, connection)?,
        shared_by: get_subscription_owner(user_id, connection)?,
        members: get_members(user_id, connection)?,
    })
}

/// Move `user_id` onto the plan with the code `plan_code`.
///
/// The current subscription is cancelled and a new one started so the history
/// of plans is kept.
///
/// # Errors
///
/// Returns an:
/// - [Error::InvalidInput] if the plan does not exist, is the current plan, or
///   has room for fewer people than already share the subscription,
/// - [Error::Forbidden] if the user is a member of someone else's subscription.
pub fn change_plan(
    user_id: UserID,
    plan_code: &str,
    connection: &Connection,
) -> Result<SubscriptionOverview, Error> {
    if get_subscription_owner(user_id, connection)?.is_some() {
        return Err(Error::Forbidden(
            "members of a shared subscription cannot change its plan".to_owned(),
        ));
    }

    let new_plan = get_plan_by_code(plan_code, connection)?;
    let current = get_active_subscription(user_id, connection)?;

    if current.plan_id == new_plan.id {
        return Err(Error::InvalidInput(format!(
            "you are already on the {} plan",
            new_plan.name
        )));
    }

    let member_count = get_members(user_id, connection)?.len() as i64;
    if member_count + 1 > new_plan.max_members {
        return Err(Error::InvalidInput(format!(
            "the {} plan allows {} member(s), remove members before changing plan",
            new_plan.name, new_plan.max_members
        )));
    }

    replace_subscription(user_id, &current, &new_plan, connection)?;

    get_subscription_overview(user_id, connection)
}

/// Cancel `current` and start a subscription to `new_plan` in its place.
fn replace_subscription(
    user_id: UserID,
    current: &Subscription,
    new_plan: &Plan,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE subscription SET status = ?1, cancelled_at = ?2 WHERE id = ?3",
        (
            SubscriptionStatus::Cancelled,
            OffsetDateTime::now_utc(),
            current.id,
        ),
    )?;
    insert_subscription(user_id, new_plan.id, connection)?;

    if !new_plan.allows_sharing() {
        super::invitation::revoke_pending_invitations(user_id, connection)?;
    }

    tracing::info!("User {user_id} changed plan to {}", new_plan.code);

    Ok(())
}

/// Cancel the paid subscription of `user_id`, moving them to the free plan.
///
/// A member of someone else's subscription leaves it and keeps their own
/// subscription. An owner of a shared subscription loses their members and
/// pending invitations, since the free plan does not include sharing.
///
/// # Errors
///
/// Returns an [Error::InvalidInput] if the user is on the free plan and does
/// not share anyone else's subscription.
pub fn cancel_subscription(
    user_id: UserID,
    connection: &Connection,
) -> Result<SubscriptionOverview, Error> {
    let was_member = get_subscription_owner(user_id, connection)?.is_some();
    if was_member {
        remove_member(user_id, user_id, connection)?;
    }

    let free_plan = get_plan_by_code(FREE_PLAN_CODE, connection)?;
    let current = get_active_subscription(user_id, connection)?;

    if current.plan_id == free_plan.id {
        if was_member {
            return get_subscription_overview(user_id, connection);
        }

        return Err(Error::InvalidInput(
            "the free plan cannot be cancelled".to_owned(),
        ));
    }

    connection.execute(
        "UPDATE subscription_member SET deleted_at = ?1
         WHERE owner_id = ?2 AND deleted_at IS NULL",
        (OffsetDateTime::now_utc(), user_id.as_i64()),
    )?;
    replace_subscription(user_id, &current, &free_plan, connection)?;

    get_subscription_overview(user_id, connection)
}

/// Link `member_id` to the subscription of `owner_id`.
pub(super) fn add_member(
    owner_id: UserID,
    member_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO subscription_member (owner_id, member_id, joined_at) VALUES (?1, ?2, ?3)",
            (
                owner_id.as_i64(),
                member_id.as_i64(),
                OffsetDateTime::now_utc(),
            ),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::InvalidInput("the user already shares a subscription".to_owned()),
            error => error.into(),
        })?;

    Ok(())
}

/// Remove `member_id` from the subscription they share.
///
/// Only the owner of the subscription or the member themselves may do this.
pub fn remove_member(
    actor_id: UserID,
    member_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let owner_id = get_subscription_owner(member_id, connection)?.ok_or(Error::NotFound)?;

    if actor_id != owner_id && actor_id != member_id {
        return Err(Error::Forbidden(
            "only the subscription owner can remove other members".to_owned(),
        ));
    }

    connection.execute(
        "UPDATE subscription_member SET deleted_at = ?1
         WHERE member_id = ?2 AND deleted_at IS NULL",
        (OffsetDateTime::now_utc(), member_id.as_i64()),
    )?;

    Ok(())
}

/// Check that `user_id`'s plan lets them share envelopes.
pub fn ensure_sharing_allowed(user_id: UserID, connection: &Connection) -> Result<Plan, Error> {
    let plan = get_effective_plan(user_id, connection)?;

    if !plan.allows_sharing() {
        return Err(Error::PlanLimitReached(format!(
            "the {} plan does not include sharing",
            plan.name
        )));
    }

    Ok(plan)
}

/// Check that `user_id` may create another wallet.
pub fn ensure_wallet_limit(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let plan = get_effective_plan(user_id, connection)?;
    let Some(max_wallets) = plan.max_wallets else {
        return Ok(());
    };

    let wallet_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM wallet WHERE user_id = ?1 AND deleted_at IS NULL",
        [user_id.as_i64()],
        |row| row.get(0),
    )?;

    if wallet_count >= max_wallets {
        return Err(Error::PlanLimitReached(format!(
            "the {} plan allows at most {max_wallets} wallets",
            plan.name
        )));
    }

    Ok(())
}

/// Check that `user_id` may create another envelope.
pub fn ensure_envelope_limit(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let plan = get_effective_plan(user_id, connection)?;
    let Some(max_envelopes) = plan.max_envelopes else {
        return Ok(());
    };

    let envelope_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM envelope WHERE owner_id = ?1 AND deleted_at IS NULL",
        [user_id.as_i64()],
        |row| row.get(0),
    )?;

    if envelope_count >= max_envelopes {
        return Err(Error::PlanLimitReached(format!(
            "the {} plan allows at most {max_envelopes} envelopes",
            plan.name
        )));
    }

    Ok(())
}

fn map_subscription_row(row: &Row) -> Result<Subscription, rusqlite::Error> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        plan_id: row.get(2)?,
        status: row.get(3)?,
        started_at: row.get(4)?,
        cancelled_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        auth::{PasswordHash, create_user},
        subscription::core::{
            SubscriptionStatus, add_member, cancel_subscription, change_plan,
            ensure_sharing_allowed, ensure_wallet_limit, get_active_subscription,
            get_effective_plan, get_members, get_subscription_owner, remove_member,
        },
        subscription::invitation::{InvitationStatus, create_invitation, list_invitations},
        test_utils::{create_test_user, create_test_wallet, get_test_connection},
    };

    #[test]
    fn new_users_are_on_the_free_plan() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        let subscription = get_active_subscription(user.id, &connection).unwrap();

        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(get_effective_plan(user.id, &connection).unwrap().code, "free");
    }

    #[test]
    fn change_plan_cancels_previous_subscription() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        let previous = get_active_subscription(user.id, &connection).unwrap();

        let overview = change_plan(user.id, "premium", &connection).unwrap();

        assert_eq!(overview.effective_plan.code, "premium");
        assert_ne!(overview.subscription.id, previous.id);
        let status: String = connection
            .query_row(
                "SELECT status FROM subscription WHERE id = ?1",
                [previous.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(status, "cancelled");
    }

    #[test]
    fn change_plan_rejects_current_plan() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        let result = change_plan(user.id, "free", &connection);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn change_plan_rejects_downgrade_with_members() {
        let connection = get_test_connection();
        let owner = create_test_user("ana@example.com", &connection);
        let member = create_test_user("bob@example.com", &connection);
        change_plan(owner.id, "family", &connection).unwrap();
        add_member(owner.id, member.id, &connection).unwrap();

        let result = change_plan(owner.id, "premium", &connection);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn members_get_the_owners_plan() {
        let connection = get_test_connection();
        let owner = create_test_user("ana@example.com", &connection);
        let member = create_test_user("bob@example.com", &connection);
        change_plan(owner.id, "family", &connection).unwrap();

        add_member(owner.id, member.id, &connection).unwrap();

        assert_eq!(get_effective_plan(member.id, &connection).unwrap().code, "family");
        assert_eq!(get_members(owner.id, &connection).unwrap().len(), 1);
    }

    #[test]
    fn members_cannot_change_plan() {
        let connection = get_test_connection();
        let owner = create_test_user("ana@example.com", &connection);
        let member = create_test_user("bob@example.com", &connection);
        change_plan(owner.id, "family", &connection).unwrap();
        add_member(owner.id, member.id, &connection).unwrap();

        let result = change_plan(member.id, "premium", &connection);

        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn member_can_leave_and_falls_back_to_own_plan() {
        let connection = get_test_connection();
        let owner = create_test_user("ana@example.com", &connection);
        let member = create_test_user("bob@example.com", &connection);
        change_plan(owner.id, "family", &connection).unwrap();
        add_member(owner.id, member.id, &connection).unwrap();

        remove_member(member.id, member.id, &connection).unwrap();

        assert_eq!(get_effective_plan(member.id, &connection).unwrap().code, "free");
        assert!(get_members(owner.id, &connection).unwrap().is_empty());
    }

    #[test]
    fn only_owner_or_member_can_remove_member() {
        let connection = get_test_connection();
        let owner = create_test_user("ana@example.com", &connection);
        let member = create_test_user("bob@example.com", &connection);
        let stranger = create_test_user("eve@example.com", &connection);
        change_plan(owner.id, "family", &connection).unwrap();
        add_member(owner.id, member.id, &connection).unwrap();

        let result = remove_member(stranger.id, member.id, &connection);

        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn cancel_moves_to_free_plan() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        change_plan(user.id, "premium", &connection).unwrap();

        let overview = cancel_subscription(user.id, &connection).unwrap();

        assert_eq!(overview.effective_plan.code, "free");
    }

    #[test]
    fn owner_cancel_unlinks_members_and_revokes_invitations() {
        let connection = get_test_connection();
        let owner = create_test_user("ana@example.com", &connection);
        let member = create_test_user("bob@example.com", &connection);
        change_plan(owner.id, "family", &connection).unwrap();
        add_member(owner.id, member.id, &connection).unwrap();
        let invitation = create_invitation(owner.id, "eve@example.com", &connection).unwrap();

        let overview = cancel_subscription(owner.id, &connection).unwrap();

        assert_eq!(overview.effective_plan.code, "free");
        assert!(overview.members.is_empty());
        assert_eq!(get_subscription_owner(member.id, &connection).unwrap(), None);
        assert_eq!(get_effective_plan(member.id, &connection).unwrap().code, "free");
        let sent = list_invitations(owner.id, &connection).unwrap().sent;
        assert_eq!(sent[0].id, invitation.id);
        assert_eq!(sent[0].status, InvitationStatus::Revoked);
    }

    #[test]
    fn member_cancel_leaves_shared_subscription() {
        let connection = get_test_connection();
        let owner = create_test_user("ana@example.com", &connection);
        let member = create_test_user("bob@example.com", &connection);
        change_plan(owner.id, "family", &connection).unwrap();
        add_member(owner.id, member.id, &connection).unwrap();
        let own_subscription = get_active_subscription(member.id, &connection).unwrap();

        let overview = cancel_subscription(member.id, &connection).unwrap();

        assert_eq!(overview.shared_by, None);
        assert_eq!(overview.effective_plan.code, "free");
        assert_eq!(overview.subscription.id, own_subscription.id);
        assert_eq!(get_effective_plan(owner.id, &connection).unwrap().code, "family");
        assert!(get_members(owner.id, &connection).unwrap().is_empty());
    }

    #[test]
    fn reading_plan_does_not_create_subscription() {
        let connection = get_test_connection();
        let user = create_user(
            "ana@example.com",
            "Ana",
            PasswordHash::new_unchecked("hash"),
            &connection,
        )
        .unwrap();

        assert_eq!(get_effective_plan(user.id, &connection).unwrap().code, "free");
        assert_eq!(
            get_active_subscription(user.id, &connection),
            Err(Error::NotFound)
        );
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(id) FROM subscription WHERE user_id = ?1",
                [user.id.as_i64()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn cancel_free_plan_fails() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        assert!(matches!(
            cancel_subscription(user.id, &connection),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn free_plan_limits_wallets() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        for name in ["One", "Two", "Three"] {
            create_test_wallet(user.id, name, 0.0, &connection);
        }

        let result = ensure_wallet_limit(user.id, &connection);

        assert!(matches!(result, Err(Error::PlanLimitReached(_))));
        change_plan(user.id, "premium", &connection).unwrap();
        assert_eq!(ensure_wallet_limit(user.id, &connection), Ok(()));
    }

    #[test]
    fn sharing_requires_family_plan() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        assert!(matches!(
            ensure_sharing_allowed(user.id, &connection),
            Err(Error::PlanLimitReached(_))
        ));
        change_plan(user.id, "family", &connection).unwrap();
        assert!(ensure_sharing_allowed(user.id, &connection).is_ok());
    }
}
