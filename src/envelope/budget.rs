//! The budget assignment ledger: assigning budget from wallets, returning it
//! and moving it between envelopes.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID, Warning,
    currency::{ensure_positive, ensure_same_currency, exceeds},
    database_id::DatabaseId,
    envelope::core::{
        EnvelopeId, EnvelopeView, get_envelope, get_envelope_for_budget, get_referenced_envelope,
    },
    text_enum::text_enum,
    wallet::{WalletId, get_referenced_wallet},
};

/// Database identifier for a budget assignment.
pub type BudgetAssignmentId = DatabaseId;

text_enum! {
    /// How a ledger row changed an envelope's budget.
    pub enum AssignmentKind {
        /// Budget reserved from a wallet.
        Assign => "assign",
        /// Budget released back to a wallet.
        Return => "return",
        /// Budget received from another envelope.
        TransferIn => "transfer_in",
        /// Budget sent to another envelope.
        TransferOut => "transfer_out",
    }
}

/// A row in the ledger of an envelope's budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAssignment {
    /// The ID of the ledger row.
    pub id: BudgetAssignmentId,
    /// The envelope whose budget changed.
    pub envelope_id: EnvelopeId,
    /// The wallet the budget was reserved from or released to.
    pub wallet_id: Option<WalletId>,
    /// The participant who moved the budget.
    pub user_id: UserID,
    /// The positive amount moved.
    pub amount: f64,
    /// The direction of the movement.
    pub kind: AssignmentKind,
    /// The other envelope of a transfer.
    pub related_envelope_id: Option<EnvelopeId>,
    /// When the budget was moved.
    pub created_at: OffsetDateTime,
}

/// The body of a request to assign or return budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetForm {
    /// The wallet to reserve budget from or release it to.
    pub wallet_id: WalletId,
    /// The amount to move.
    pub amount: f64,
}

/// The body of a request to move budget between envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeTransferForm {
    /// The envelope to take budget from.
    pub from_envelope_id: EnvelopeId,
    /// The envelope to give budget to.
    pub to_envelope_id: EnvelopeId,
    /// The amount to move.
    pub amount: f64,
}

/// An envelope after an assignment or return, and the ledger row written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetMovement {
    /// The envelope as seen by the user who moved the budget.
    pub envelope: EnvelopeView,
    /// The ledger row.
    pub assignment: BudgetAssignment,
}

/// Both envelopes after a transfer and the pair of ledger rows written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeTransfer {
    /// The source envelope.
    pub from_envelope: EnvelopeView,
    /// The destination envelope.
    pub to_envelope: EnvelopeView,
    /// The `transfer_out` row of the source envelope.
    pub transfer_out: BudgetAssignment,
    /// The `transfer_in` row of the destination envelope.
    pub transfer_in: BudgetAssignment,
}

/// Reserve `amount` of wallet `wallet_id` as budget for envelope `envelope_id`.
///
/// The wallet's balance is not changed. If the live budget assigned out of
/// the wallet is more than its real balance, a [Warning::OverAssigned] is
/// returned.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidAmount] if `amount` is not positive,
/// - [Error::NotFound] or [Error::Forbidden] if the user cannot use the envelope's budget,
/// - [Error::InvalidReference] or [Error::Forbidden] for a bad wallet,
/// - [Error::CurrencyMismatch] if the wallet and envelope currencies differ.
pub fn assign_budget(
    envelope_id: EnvelopeId,
    user_id: UserID,
    wallet_id: WalletId,
    amount: f64,
    connection: &Connection,
) -> Result<(BudgetMovement, Vec<Warning>), Error> {
    let amount = ensure_positive(amount)?;
    let view = get_envelope_for_budget(envelope_id, user_id, connection)?;
    let wallet = get_referenced_wallet(wallet_id, user_id, connection)?;
    ensure_same_currency(&view.envelope.currency, &wallet.currency)?;

    apply_assigned_delta(envelope_id, user_id, amount, connection)?;
    let assignment = insert_assignment(
        envelope_id,
        Some(wallet_id),
        user_id,
        amount,
        AssignmentKind::Assign,
        None,
        connection,
    )?;

    let assigned_from_wallet = get_assigned_from_wallet(wallet_id, connection)?;
    let warnings = if exceeds(assigned_from_wallet, wallet.real_balance) {
        vec![Warning::OverAssigned {
            wallet_id,
            assigned: assigned_from_wallet,
            balance: wallet.real_balance,
        }]
    } else {
        Vec::new()
    };

    let envelope = get_envelope(envelope_id, user_id, connection)?;

    Ok((
        BudgetMovement {
            envelope,
            assignment,
        },
        warnings,
    ))
}

/// Release `amount` of the user's free budget in envelope `envelope_id` back
/// to wallet `wallet_id`.
///
/// # Errors
///
/// Returns the errors of [assign_budget], or an [Error::InsufficientBudget] if
/// `amount` is more than the user's assigned budget minus what they spent, or
/// more than the wallet still has assigned to envelopes.
pub fn return_budget(
    envelope_id: EnvelopeId,
    user_id: UserID,
    wallet_id: WalletId,
    amount: f64,
    connection: &Connection,
) -> Result<BudgetMovement, Error> {
    let amount = ensure_positive(amount)?;
    let view = get_envelope_for_budget(envelope_id, user_id, connection)?;
    let wallet = get_referenced_wallet(wallet_id, user_id, connection)?;
    ensure_same_currency(&view.envelope.currency, &wallet.currency)?;
    ensure_free_budget(&view, amount)?;

    // A wallet cannot take back more than it has assigned.
    let assigned_from_wallet = get_assigned_from_wallet(wallet_id, connection)?;
    if exceeds(amount, assigned_from_wallet) {
        return Err(Error::InsufficientBudget {
            available: assigned_from_wallet.max(0.0),
            requested: amount,
        });
    }

    apply_assigned_delta(envelope_id, user_id, -amount, connection)?;
    let assignment = insert_assignment(
        envelope_id,
        Some(wallet_id),
        user_id,
        amount,
        AssignmentKind::Return,
        None,
        connection,
    )?;

    let envelope = get_envelope(envelope_id, user_id, connection)?;

    Ok(BudgetMovement {
        envelope,
        assignment,
    })
}

/// Move `amount` of the user's free budget from one envelope to another.
///
/// # Errors
///
/// This function will return a:
/// - [Error::SameSourceAndDestination] if both envelopes are the same,
/// - [Error::InvalidReference] or [Error::Forbidden] if the user cannot use
///   the budget of either envelope,
/// - [Error::CurrencyMismatch] if the envelope currencies differ,
/// - [Error::InsufficientBudget] if `amount` is more than the user's free
///   budget in the source envelope.
pub fn transfer_budget(
    user_id: UserID,
    form: &EnvelopeTransferForm,
    connection: &Connection,
) -> Result<(EnvelopeTransfer, Vec<Warning>), Error> {
    let amount = ensure_positive(form.amount)?;

    if form.from_envelope_id == form.to_envelope_id {
        return Err(Error::SameSourceAndDestination("envelope"));
    }

    let from = get_referenced_envelope(form.from_envelope_id, user_id, connection)?;
    let to = get_referenced_envelope(form.to_envelope_id, user_id, connection)?;
    ensure_same_currency(&from.envelope.currency, &to.envelope.currency)?;
    ensure_free_budget(&from, amount)?;

    apply_assigned_delta(from.envelope.id, user_id, -amount, connection)?;
    apply_assigned_delta(to.envelope.id, user_id, amount, connection)?;

    let transfer_out = insert_assignment(
        from.envelope.id,
        None,
        user_id,
        amount,
        AssignmentKind::TransferOut,
        Some(to.envelope.id),
        connection,
    )?;
    let transfer_in = insert_assignment(
        to.envelope.id,
        None,
        user_id,
        amount,
        AssignmentKind::TransferIn,
        Some(from.envelope.id),
        connection,
    )?;

    let from_envelope = get_envelope(from.envelope.id, user_id, connection)?;
    let to_envelope = get_envelope(to.envelope.id, user_id, connection)?;
    let warnings = from_envelope
        .envelope
        .overspent_warning()
        .into_iter()
        .collect();

    Ok((
        EnvelopeTransfer {
            from_envelope,
            to_envelope,
            transfer_out,
            transfer_in,
        },
        warnings,
    ))
}

/// Get the live ledger of envelope `envelope_id`, newest first.
pub fn list_assignments(
    envelope_id: EnvelopeId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<BudgetAssignment>, Error> {
    get_envelope(envelope_id, user_id, connection)?;

    connection
        .prepare(
            "SELECT id, envelope_id, wallet_id, user_id, amount, kind, related_envelope_id,
                created_at
             FROM budget_assignment
             WHERE envelope_id = :envelope_id AND deleted_at IS NULL
             ORDER BY id DESC",
        )?
        .query_map(&[(":envelope_id", &envelope_id)], map_assignment_row)?
        .map(|maybe_assignment| maybe_assignment.map_err(Error::from))
        .collect()
}

fn ensure_free_budget(view: &EnvelopeView, amount: f64) -> Result<(), Error> {
    let available = view.participant.free_budget();

    if exceeds(amount, available) {
        return Err(Error::InsufficientBudget {
            available,
            requested: amount,
        });
    }

    Ok(())
}

fn apply_assigned_delta(
    envelope_id: EnvelopeId,
    user_id: UserID,
    delta: f64,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE envelope SET assigned_budget = assigned_budget + ?1 WHERE id = ?2",
        (delta, envelope_id),
    )?;
    connection.execute(
        "UPDATE envelope_participant SET assigned_budget = assigned_budget + ?1
         WHERE envelope_id = ?2 AND user_id = ?3 AND deleted_at IS NULL",
        (delta, envelope_id, user_id.as_i64()),
    )?;

    Ok(())
}

fn insert_assignment(
    envelope_id: EnvelopeId,
    wallet_id: Option<WalletId>,
    user_id: UserID,
    amount: f64,
    kind: AssignmentKind,
    related_envelope_id: Option<EnvelopeId>,
    connection: &Connection,
) -> Result<BudgetAssignment, Error> {
    connection
        .prepare(
            "INSERT INTO budget_assignment
                (envelope_id, wallet_id, user_id, amount, kind, related_envelope_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING id, envelope_id, wallet_id, user_id, amount, kind, related_envelope_id,
                created_at",
        )?
        .query_row(
            (
                envelope_id,
                wallet_id,
                user_id.as_i64(),
                amount,
                kind,
                related_envelope_id,
                OffsetDateTime::now_utc(),
            ),
            map_assignment_row,
        )
        .map_err(Error::from)
}

/// The budget reserved from wallet `wallet_id` by live assignments, net of returns.
fn get_assigned_from_wallet(wallet_id: WalletId, connection: &Connection) -> Result<f64, Error> {
    connection
        .query_row(
            "SELECT COALESCE(SUM(
                CASE kind WHEN 'assign' THEN amount WHEN 'return' THEN -amount ELSE 0 END
             ), 0)
             FROM budget_assignment WHERE wallet_id = ?1 AND deleted_at IS NULL",
            [wallet_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

fn map_assignment_row(row: &Row) -> Result<BudgetAssignment, rusqlite::Error> {
    Ok(BudgetAssignment {
        id: row.get(0)?,
        envelope_id: row.get(1)?,
        wallet_id: row.get(2)?,
        user_id: UserID::new(row.get(3)?),
        amount: row.get(4)?,
        kind: row.get(5)?,
        related_envelope_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}
