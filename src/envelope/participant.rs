//! Sharing an envelope with other users.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    auth::get_user_by_email,
    envelope::core::{
        EnvelopeId, EnvelopeParticipant, Role, count_participants, get_envelope,
        get_owned_envelope, get_participant, insert_participant, map_participant_row,
    },
    subscription::ensure_sharing_allowed,
};

/// The body of a request to add a participant to an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantForm {
    /// The email address of a registered user.
    pub email: String,
    /// Either editor or viewer.
    pub role: Role,
}

/// A participant along with who they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDetails {
    /// The participation.
    #[serde(flatten)]
    pub participant: EnvelopeParticipant,
    /// The participant's email address.
    pub email: String,
    /// The participant's display name.
    pub display_name: String,
}

/// Add the user registered with `form.email` to shared envelope `envelope_id`.
///
/// # Errors
///
/// This function will return a:
/// - [Error::Forbidden] if `owner_id` does not own the envelope,
/// - [Error::InvalidInput] if the envelope is not shared, the role is owner,
///   no user has the email or the user already participates,
/// - [Error::PlanLimitReached] if the owner's plan does not allow sharing or
///   the envelope already has as many participants as the plan allows.
pub fn add_participant(
    envelope_id: EnvelopeId,
    owner_id: UserID,
    form: &ParticipantForm,
    connection: &Connection,
) -> Result<EnvelopeParticipant, Error> {
    let view = get_owned_envelope(envelope_id, owner_id, connection)?;

    if !view.envelope.is_shared {
        return Err(Error::InvalidInput(
            "only shared envelopes can have participants".to_owned(),
        ));
    }

    if form.role == Role::Owner {
        return Err(Error::InvalidInput(
            "an envelope can only have one owner".to_owned(),
        ));
    }

    let plan = ensure_sharing_allowed(owner_id, connection)?;
    if count_participants(envelope_id, connection)? >= plan.max_members {
        return Err(Error::PlanLimitReached(format!(
            "the {} plan allows at most {} participants per envelope",
            plan.name, plan.max_members
        )));
    }

    let user = get_user_by_email(&form.email, connection).map_err(|error| match error {
        Error::NotFound => {
            Error::InvalidInput(format!("no user is registered with {}", form.email.trim()))
        }
        error => error,
    })?;

    insert_participant(envelope_id, user.id, form.role, connection)
}

/// Get the live participants of envelope `envelope_id`, owner first.
pub fn list_participants(
    envelope_id: EnvelopeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<ParticipantDetails>, Error> {
    get_envelope(envelope_id, user_id, connection)?;

    connection
        .prepare(
            "SELECT participant.envelope_id, participant.user_id, participant.role,
                participant.assigned_budget, participant.spent, user.email, user.display_name
             FROM envelope_participant participant
             INNER JOIN user ON user.id = participant.user_id
             WHERE participant.envelope_id = :envelope_id AND participant.deleted_at IS NULL
             ORDER BY participant.id ASC",
        )?
        .query_map(&[(":envelope_id", &envelope_id)], |row| {
            Ok(ParticipantDetails {
                participant: map_participant_row(row)?,
                email: row.get(5)?,
                display_name: row.get(6)?,
            })
        })?
        .map(|maybe_participant| maybe_participant.map_err(Error::from))
        .collect()
}

/// Remove `user_id` from envelope `envelope_id`.
///
/// The envelope's totals keep what the removed participant assigned and spent.
///
/// # Errors
///
/// Returns an [Error::Forbidden] if `owner_id` does not own the envelope, an
/// [Error::InvalidInput] if the owner tries to remove themselves, or an
/// [Error::NotFound] if the user does not participate in the envelope.
pub fn remove_participant(
    envelope_id: EnvelopeId,
    owner_id: UserID,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    get_owned_envelope(envelope_id, owner_id, connection)?;

    if user_id == owner_id {
        return Err(Error::InvalidInput(
            "the owner cannot be removed from an envelope".to_owned(),
        ));
    }

    if get_participant(envelope_id, user_id, connection)?.is_none() {
        return Err(Error::NotFound);
    }

    connection.execute(
        "UPDATE envelope_participant SET deleted_at = ?1
         WHERE envelope_id = ?2 AND user_id = ?3 AND deleted_at IS NULL",
        (OffsetDateTime::now_utc(), envelope_id, user_id.as_i64()),
    )?;

    Ok(())
}
