//! Defines the envelope model, its tables and the queries for creating,
//! reading, updating and deleting envelopes.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID, Warning,
    currency::{Currency, exceeds},
    database_id::DatabaseId,
    name::Name,
    subscription::{ensure_envelope_limit, ensure_sharing_allowed},
    text_enum::text_enum,
    user_config::get_user_config,
};

/// Database identifier for an envelope.
pub type EnvelopeId = DatabaseId;

text_enum! {
    /// What a participant may do with an envelope.
    pub enum Role {
        /// Created the envelope, may do anything with it.
        Owner => "owner",
        /// May assign, return and spend budget.
        Editor => "editor",
        /// May only look at the envelope.
        Viewer => "viewer",
    }
}

impl Role {
    /// Whether the role may move budget in or out of the envelope and spend from it.
    pub fn can_use_budget(&self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }
}

/// A budget bucket that money is assigned to and spent from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The ID of the envelope.
    pub id: EnvelopeId,
    /// The user who created the envelope.
    pub owner_id: UserID,
    /// The name of the envelope, unique among the owner's envelopes.
    pub name: Name,
    /// The currency of the budget.
    pub currency: Currency,
    /// Whether other users may be added as participants.
    pub is_shared: bool,
    /// The budget assigned by all participants.
    pub assigned_budget: f64,
    /// The amount spent by all participants.
    pub spent: f64,
    /// When the envelope was created.
    pub created_at: OffsetDateTime,
}

impl Envelope {
    /// A [Warning::Overspent] if more was spent than assigned.
    pub fn overspent_warning(&self) -> Option<Warning> {
        exceeds(self.spent, self.assigned_budget).then_some(Warning::Overspent {
            envelope_id: self.id,
            assigned: self.assigned_budget,
            spent: self.spent,
        })
    }
}

/// A user's membership of an envelope and their share of its budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeParticipant {
    /// The envelope.
    pub envelope_id: EnvelopeId,
    /// The participating user.
    pub user_id: UserID,
    /// What the user may do with the envelope.
    pub role: Role,
    /// The budget this user has assigned to the envelope.
    pub assigned_budget: f64,
    /// The amount this user has spent from the envelope.
    pub spent: f64,
}

impl EnvelopeParticipant {
    /// The budget this user can still return or move, i.e. assigned minus spent.
    pub fn free_budget(&self) -> f64 {
        self.assigned_budget - self.spent
    }
}

/// An envelope along with the requesting user's share of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeView {
    /// The envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// The requesting user's participation.
    pub participant: EnvelopeParticipant,
}

/// The details needed to create an envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEnvelope {
    /// The name of the envelope.
    pub name: String,
    /// The currency code, defaults to the user's default currency.
    #[serde(default)]
    pub currency: Option<String>,
    /// Whether other users may be added as participants.
    #[serde(default)]
    pub is_shared: bool,
}

/// The fields of an envelope that can be changed after it is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    /// The new name.
    pub name: String,
    /// Whether other users may be added as participants.
    pub is_shared: bool,
}

/// Create the envelope, participant and budget assignment tables.
pub fn create_envelope_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS envelope (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            currency TEXT NOT NULL,
            is_shared INTEGER NOT NULL DEFAULT 0,
            assigned_budget REAL NOT NULL DEFAULT 0,
            spent REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(owner_id) REFERENCES user(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_envelope_owner_name
        ON envelope(owner_id, name) WHERE deleted_at IS NULL;

        CREATE TABLE IF NOT EXISTS envelope_participant (
            id INTEGER PRIMARY KEY,
            envelope_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            assigned_budget REAL NOT NULL DEFAULT 0,
            spent REAL NOT NULL DEFAULT 0,
            deleted_at TEXT,
            FOREIGN KEY(envelope_id) REFERENCES envelope(id) ON DELETE CASCADE,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_envelope_participant_live
        ON envelope_participant(envelope_id, user_id) WHERE deleted_at IS NULL;

        CREATE TABLE IF NOT EXISTS budget_assignment (
            id INTEGER PRIMARY KEY,
            envelope_id INTEGER NOT NULL,
            wallet_id INTEGER,
            user_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            kind TEXT NOT NULL,
            related_envelope_id INTEGER,
            created_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(envelope_id) REFERENCES envelope(id) ON DELETE CASCADE,
            FOREIGN KEY(wallet_id) REFERENCES wallet(id) ON DELETE SET NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(related_envelope_id) REFERENCES envelope(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_budget_assignment_wallet
        ON budget_assignment(wallet_id) WHERE deleted_at IS NULL;",
    )?;

    Ok(())
}

fn map_duplicate_name(error: rusqlite::Error, name: &Name) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateName("envelope", name.to_string()),
        error => error.into(),
    }
}

/// Create an envelope owned by `owner_id`, who becomes its first participant.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EmptyName] if the name is blank,
/// - [Error::InvalidCurrency] if the currency code is malformed,
/// - [Error::PlanLimitReached] if the owner's plan does not allow another
///   envelope, or does not allow sharing for a shared envelope,
/// - [Error::DuplicateName] if the owner has a live envelope with the same name.
pub fn create_envelope(
    owner_id: UserID,
    new_envelope: &NewEnvelope,
    connection: &Connection,
) -> Result<EnvelopeView, Error> {
    let name = Name::new(&new_envelope.name, "envelope")?;
    let currency = match &new_envelope.currency {
        Some(code) => Currency::new(code)?,
        None => get_user_config(owner_id, connection)?.default_currency,
    };

    ensure_envelope_limit(owner_id, connection)?;
    if new_envelope.is_shared {
        ensure_sharing_allowed(owner_id, connection)?;
    }

    let envelope = connection
        .prepare(
            "INSERT INTO envelope (owner_id, name, currency, is_shared, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, owner_id, name, currency, is_shared, assigned_budget, spent,
                created_at",
        )?
        .query_row(
            (
                owner_id.as_i64(),
                name.as_ref(),
                currency.as_ref(),
                new_envelope.is_shared,
                OffsetDateTime::now_utc(),
            ),
            map_envelope_row,
        )
        .map_err(|error| map_duplicate_name(error, &name))?;

    let participant = insert_participant(envelope.id, owner_id, Role::Owner, connection)?;

    Ok(EnvelopeView {
        envelope,
        participant,
    })
}

pub(super) fn insert_participant(
    envelope_id: EnvelopeId,
    user_id: UserID,
    role: Role,
    connection: &Connection,
) -> Result<EnvelopeParticipant, Error> {
    connection
        .prepare(
            "INSERT INTO envelope_participant (envelope_id, user_id, role) VALUES (?1, ?2, ?3)
             RETURNING envelope_id, user_id, role, assigned_budget, spent",
        )?
        .query_row(
            (envelope_id, user_id.as_i64(), role),
            map_participant_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::InvalidInput("the user already participates in the envelope".to_owned()),
            error => error.into(),
        })
}

/// Get the live envelope `id` without checking who may see it.
fn get_envelope_unchecked(
    id: EnvelopeId,
    connection: &Connection,
) -> Result<Envelope, Error> {
    connection
        .prepare(
            "SELECT id, owner_id, name, currency, is_shared, assigned_budget, spent, created_at
             FROM envelope WHERE id = :id AND deleted_at IS NULL",
        )?
        .query_row(&[(":id", &id)], map_envelope_row)
        .map_err(Error::from)
}

/// Get the live participation of `user_id` in envelope `envelope_id`, if any.
pub(super) fn get_participant(
    envelope_id: EnvelopeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<EnvelopeParticipant>, Error> {
    connection
        .prepare(
            "SELECT envelope_id, user_id, role, assigned_budget, spent FROM envelope_participant
             WHERE envelope_id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
        )?
        .query_row((envelope_id, user_id.as_i64()), map_participant_row)
        .optional()
        .map_err(Error::from)
}

/// Get envelope `id` as seen by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the envelope does not exist or was
/// deleted, or an [Error::Forbidden] if the user does not participate in it.
pub fn get_envelope(
    id: EnvelopeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<EnvelopeView, Error> {
    let envelope = get_envelope_unchecked(id, connection)?;
    let participant = get_participant(id, user_id, connection)?.ok_or_else(|| {
        Error::Forbidden("you do not have access to this envelope".to_owned())
    })?;

    Ok(EnvelopeView {
        envelope,
        participant,
    })
}

/// Get envelope `id` for `user_id` to move budget or spend from.
///
/// # Errors
///
/// Returns the errors of [get_envelope], or an [Error::Forbidden] if the user
/// is only a viewer.
pub fn get_envelope_for_budget(
    id: EnvelopeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<EnvelopeView, Error> {
    let view = get_envelope(id, user_id, connection)?;

    if !view.participant.role.can_use_budget() {
        return Err(Error::Forbidden(
            "viewers cannot assign, return or spend budget".to_owned(),
        ));
    }

    Ok(view)
}

/// Like [get_envelope_for_budget], but a missing envelope is reported as a
/// bad reference since the ID came from a request body.
pub fn get_referenced_envelope(
    id: EnvelopeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<EnvelopeView, Error> {
    get_envelope_for_budget(id, user_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidReference("envelope", id),
        error => error,
    })
}

/// Get envelope `id` if `user_id` owns it.
pub(super) fn get_owned_envelope(
    id: EnvelopeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<EnvelopeView, Error> {
    let view = get_envelope(id, user_id, connection)?;

    if view.participant.role != Role::Owner {
        return Err(Error::Forbidden(
            "only the owner can change this envelope".to_owned(),
        ));
    }

    Ok(view)
}

/// Get the live envelopes `user_id` participates in ordered by name.
pub fn list_envelopes(user_id: UserID, connection: &Connection) -> Result<Vec<EnvelopeView>, Error> {
    connection
        .prepare(
            "SELECT envelope.id, envelope.owner_id, envelope.name, envelope.currency,
                envelope.is_shared, envelope.assigned_budget, envelope.spent, envelope.created_at,
                participant.envelope_id, participant.user_id, participant.role,
                participant.assigned_budget, participant.spent
             FROM envelope
             INNER JOIN envelope_participant participant
                ON participant.envelope_id = envelope.id AND participant.deleted_at IS NULL
             WHERE participant.user_id = :user_id AND envelope.deleted_at IS NULL
             ORDER BY envelope.name ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], |row| {
            Ok(EnvelopeView {
                envelope: map_envelope_row(row)?,
                participant: map_participant_row_at(row, 8)?,
            })
        })?
        .map(|maybe_view| maybe_view.map_err(Error::from))
        .collect()
}

/// Rename envelope `id` or change whether it is shared.
///
/// # Errors
///
/// Returns an [Error::Forbidden] if the user is not the owner, an
/// [Error::InvalidInput] if sharing is turned off while others participate, or
/// an [Error::PlanLimitReached] if sharing is turned on without a plan that allows it.
pub fn update_envelope(
    id: EnvelopeId,
    user_id: UserID,
    update: &UpdateEnvelope,
    connection: &Connection,
) -> Result<EnvelopeView, Error> {
    let name = Name::new(&update.name, "envelope")?;
    let view = get_owned_envelope(id, user_id, connection)?;

    if update.is_shared && !view.envelope.is_shared {
        ensure_sharing_allowed(user_id, connection)?;
    }

    if !update.is_shared && count_participants(id, connection)? > 1 {
        return Err(Error::InvalidInput(
            "remove the other participants before making the envelope private".to_owned(),
        ));
    }

    let envelope = connection
        .prepare(
            "UPDATE envelope SET name = ?1, is_shared = ?2 WHERE id = ?3
             RETURNING id, owner_id, name, currency, is_shared, assigned_budget, spent,
                created_at",
        )?
        .query_row((name.as_ref(), update.is_shared, id), map_envelope_row)
        .map_err(|error| map_duplicate_name(error, &name))?;

    Ok(EnvelopeView {
        envelope,
        participant: view.participant,
    })
}

pub(super) fn count_participants(
    envelope_id: EnvelopeId,
    connection: &Connection,
) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM envelope_participant
             WHERE envelope_id = ?1 AND deleted_at IS NULL",
            [envelope_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Soft delete envelope `id` along with its participants and budget assignments.
///
/// Deleting the assignments releases the budget reserved from wallets.
/// Transactions keep their reference to the deleted envelope.
pub fn delete_envelope(id: EnvelopeId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    get_owned_envelope(id, user_id, connection)?;
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "UPDATE budget_assignment SET deleted_at = ?1 WHERE envelope_id = ?2 AND deleted_at IS NULL",
        (now, id),
    )?;
    connection.execute(
        "UPDATE envelope_participant SET deleted_at = ?1
         WHERE envelope_id = ?2 AND deleted_at IS NULL",
        (now, id),
    )?;
    connection.execute("UPDATE envelope SET deleted_at = ?1 WHERE id = ?2", (now, id))?;

    Ok(())
}

/// Add `delta` to the amount `user_id` has spent from envelope `envelope_id`.
///
/// Applies to deleted envelopes and former participants too, so that editing
/// or deleting an old transaction keeps the envelope's history consistent.
pub(crate) fn apply_spent_delta(
    envelope_id: EnvelopeId,
    user_id: UserID,
    delta: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE envelope SET spent = spent + ?1 WHERE id = ?2",
        (delta, envelope_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::InvalidReference("envelope", envelope_id));
    }

    connection.execute(
        "UPDATE envelope_participant SET spent = spent + ?1
         WHERE id = (
            SELECT MAX(id) FROM envelope_participant WHERE envelope_id = ?2 AND user_id = ?3
         )",
        (delta, envelope_id, user_id.as_i64()),
    )?;

    Ok(())
}

/// A [Warning::Overspent] if envelope `envelope_id` has been overspent.
pub(crate) fn check_overspent(
    envelope_id: EnvelopeId,
    connection: &Connection,
) -> Result<Option<Warning>, Error> {
    let (assigned_budget, spent): (f64, f64) = connection.query_row(
        "SELECT assigned_budget, spent FROM envelope WHERE id = ?1",
        [envelope_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(exceeds(spent, assigned_budget).then_some(Warning::Overspent {
        envelope_id,
        assigned: assigned_budget,
        spent,
    }))
}

/// Map a database row to an [Envelope].
pub fn map_envelope_row(row: &Row) -> Result<Envelope, rusqlite::Error> {
    let raw_name: String = row.get(2)?;
    let raw_currency: String = row.get(3)?;

    Ok(Envelope {
        id: row.get(0)?,
        owner_id: UserID::new(row.get(1)?),
        name: Name::new_unchecked(&raw_name),
        currency: Currency::new_unchecked(&raw_currency),
        is_shared: row.get(4)?,
        assigned_budget: row.get(5)?,
        spent: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(super) fn map_participant_row(row: &Row) -> Result<EnvelopeParticipant, rusqlite::Error> {
    map_participant_row_at(row, 0)
}

fn map_participant_row_at(
    row: &Row,
    offset: usize,
) -> Result<EnvelopeParticipant, rusqlite::Error> {
    Ok(EnvelopeParticipant {
        envelope_id: row.get(offset)?,
        user_id: UserID::new(row.get(offset + 1)?),
        role: row.get(offset + 2)?,
        assigned_budget: row.get(offset + 3)?,
        spent: row.get(offset + 4)?,
    })
}
