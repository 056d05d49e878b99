//! Invitations to join a shared subscription.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    auth::{get_user_by_id, normalize_email},
    subscription::core::{add_member, ensure_sharing_allowed, get_members, get_subscription_owner},
    text_enum::text_enum,
};

/// Database identifier for an invitation.
pub type InvitationId = i64;

text_enum! {
    /// Where an invitation is in its life cycle.
    pub enum InvitationStatus {
        /// Waiting for the invitee to respond.
        Pending => "pending",
        /// The invitee joined the subscription.
        Accepted => "accepted",
        /// The invitee turned the invitation down.
        Declined => "declined",
        /// The inviter withdrew the invitation.
        Revoked => "revoked",
    }
}

/// An offer from a subscription owner for another user to share their plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    /// The ID of the invitation.
    pub id: InvitationId,
    /// The user who owns the subscription being shared.
    pub inviter_id: UserID,
    /// The email address of the person invited.
    pub email: String,
    /// Where the invitation is in its life cycle.
    pub status: InvitationStatus,
    /// When the invitation was sent.
    pub created_at: OffsetDateTime,
    /// When the invitation was accepted, declined or revoked.
    pub responded_at: Option<OffsetDateTime>,
}

/// The invitations a user has sent and the pending ones addressed to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationList {
    /// Invitations sent by the user, newest first.
    pub sent: Vec<Invitation>,
    /// Pending invitations addressed to the user's email, newest first.
    pub received: Vec<Invitation>,
}

pub(super) fn create_invitation_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS invitation (
            id INTEGER PRIMARY KEY,
            inviter_id INTEGER NOT NULL,
            email TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            responded_at TEXT,
            FOREIGN KEY(inviter_id) REFERENCES user(id) ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Invite the person with `email` to share the subscription of `inviter_id`.
///
/// # Errors
///
/// Returns an:
/// - [Error::InvalidEmail] if the email is malformed,
/// - [Error::InvalidInput] if the inviter invites themselves or already has a
///   pending invitation for the email,
/// - [Error::Forbidden] if the inviter is a member of someone else's subscription,
/// - [Error::PlanLimitReached] if the plan does not allow sharing or is full.
pub fn create_invitation(
    inviter_id: UserID,
    email: &str,
    connection: &Connection,
) -> Result<Invitation, Error> {
    let email = normalize_email(email)?;
    let inviter = get_user_by_id(inviter_id, connection)?;

    if inviter.email == email {
        return Err(Error::InvalidInput("you cannot invite yourself".to_owned()));
    }

    if get_subscription_owner(inviter_id, connection)?.is_some() {
        return Err(Error::Forbidden(
            "only the subscription owner can invite members".to_owned(),
        ));
    }

    let plan = ensure_sharing_allowed(inviter_id, connection)?;

    let pending_for_email: i64 = connection.query_row(
        "SELECT COUNT(id) FROM invitation WHERE inviter_id = ?1 AND email = ?2 AND status = ?3",
        (inviter_id.as_i64(), &email, InvitationStatus::Pending),
        |row| row.get(0),
    )?;
    if pending_for_email > 0 {
        return Err(Error::InvalidInput(format!(
            "{email} already has a pending invitation"
        )));
    }

    // The owner takes up one seat.
    let seats_taken = 1 + get_members(inviter_id, connection)?.len() as i64
        + count_pending_invitations(inviter_id, connection)?;
    if seats_taken >= plan.max_members {
        return Err(Error::PlanLimitReached(format!(
            "the {} plan allows at most {} members",
            plan.name, plan.max_members
        )));
    }

    let invitation = connection
        .prepare(
            "INSERT INTO invitation (inviter_id, email, status, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, inviter_id, email, status, created_at, responded_at",
        )?
        .query_row(
            (
                inviter_id.as_i64(),
                &email,
                InvitationStatus::Pending,
                OffsetDateTime::now_utc(),
            ),
            map_invitation_row,
        )?;

    tracing::info!("User {inviter_id} invited {email}");

    Ok(invitation)
}

fn count_pending_invitations(inviter_id: UserID, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM invitation WHERE inviter_id = ?1 AND status = ?2",
            (inviter_id.as_i64(), InvitationStatus::Pending),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Get the invitations sent by `user_id` and the pending ones addressed to them.
pub fn list_invitations(user_id: UserID, connection: &Connection) -> Result<InvitationList, Error> {
    let user = get_user_by_id(user_id, connection)?;

    let sent = connection
        .prepare(
            "SELECT id, inviter_id, email, status, created_at, responded_at FROM invitation
             WHERE inviter_id = ?1 ORDER BY created_at DESC, id DESC",
        )?
        .query_map([user_id.as_i64()], map_invitation_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let received = connection
        .prepare(
            "SELECT id, inviter_id, email, status, created_at, responded_at FROM invitation
             WHERE email = ?1 AND status = ?2 ORDER BY created_at DESC, id DESC",
        )?
        .query_map((&user.email, InvitationStatus::Pending), map_invitation_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InvitationList { sent, received })
}

fn get_invitation(id: InvitationId, connection: &Connection) -> Result<Invitation, Error> {
    connection
        .prepare(
            "SELECT id, inviter_id, email, status, created_at, responded_at FROM invitation
             WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_invitation_row)
        .map_err(Error::from)
}

/// Get invitation `id` if it is pending and addressed to `user_id`.
fn get_pending_invitation_for(
    id: InvitationId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Invitation, Error> {
    let invitation = get_invitation(id, connection)?;
    let user = get_user_by_id(user_id, connection)?;

    if invitation.email != user.email {
        return Err(Error::Forbidden(
            "the invitation was sent to another email address".to_owned(),
        ));
    }

    if invitation.status != InvitationStatus::Pending {
        return Err(Error::InvalidInput(format!(
            "the invitation has already been {}",
            invitation.status
        )));
    }

    Ok(invitation)
}

fn set_status(
    id: InvitationId,
    status: InvitationStatus,
    connection: &Connection,
) -> Result<Invitation, Error> {
    connection
        .prepare(
            "UPDATE invitation SET status = ?1, responded_at = ?2 WHERE id = ?3
             RETURNING id, inviter_id, email, status, created_at, responded_at",
        )?
        .query_row(
            (status, OffsetDateTime::now_utc(), id),
            map_invitation_row,
        )
        .map_err(Error::from)
}

/// Accept invitation `id` as `user_id`, joining the inviter's subscription.
///
/// # Errors
///
/// Returns an:
/// - [Error::NotFound] if the invitation does not exist,
/// - [Error::Forbidden] if it was sent to another email,
/// - [Error::InvalidInput] if it is no longer pending, or the user already
///   shares a subscription or has members of their own,
/// - [Error::PlanLimitReached] if the inviter's plan no longer allows sharing.
pub fn accept_invitation(
    id: InvitationId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Invitation, Error> {
    let invitation = get_pending_invitation_for(id, user_id, connection)?;

    if get_subscription_owner(user_id, connection)?.is_some() {
        return Err(Error::InvalidInput(
            "leave your current shared subscription before accepting".to_owned(),
        ));
    }

    if !get_members(user_id, connection)?.is_empty() {
        return Err(Error::InvalidInput(
            "you cannot join another subscription while sharing your own".to_owned(),
        ));
    }

    ensure_sharing_allowed(invitation.inviter_id, connection)?;
    add_member(invitation.inviter_id, user_id, connection)?;

    tracing::info!(
        "User {user_id} joined the subscription of user {}",
        invitation.inviter_id
    );

    set_status(id, InvitationStatus::Accepted, connection)
}

/// Decline invitation `id` as `user_id`.
pub fn decline_invitation(
    id: InvitationId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Invitation, Error> {
    get_pending_invitation_for(id, user_id, connection)?;

    set_status(id, InvitationStatus::Declined, connection)
}

/// Withdraw invitation `id`, which must have been sent by `user_id`.
pub fn revoke_invitation(
    id: InvitationId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Invitation, Error> {
    let invitation = get_invitation(id, connection)?;

    if invitation.inviter_id != user_id {
        return Err(Error::Forbidden(
            "only the sender can revoke an invitation".to_owned(),
        ));
    }

    if invitation.status != InvitationStatus::Pending {
        return Err(Error::InvalidInput(format!(
            "the invitation has already been {}",
            invitation.status
        )));
    }

    set_status(id, InvitationStatus::Revoked, connection)
}

/// Revoke every pending invitation sent by `inviter_id`.
pub(super) fn revoke_pending_invitations(
    inviter_id: UserID,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute(
            "UPDATE invitation SET status = ?1, responded_at = ?2
             WHERE inviter_id = ?3 AND status = ?4",
            (
                InvitationStatus::Revoked,
                OffsetDateTime::now_utc(),
                inviter_id.as_i64(),
                InvitationStatus::Pending,
            ),
        )
        .map_err(Error::from)
}

fn map_invitation_row(row: &Row) -> Result<Invitation, rusqlite::Error> {
    Ok(Invitation {
        id: row.get(0)?,
        inviter_id: UserID::new(row.get(1)?),
        email: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        responded_at: row.get(5)?,
    })
}
