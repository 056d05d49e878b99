//! Defines the transaction model and the queries that record, edit and delete
//! transactions along with their effect on wallet balances and envelope spending.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error, UserID, Warning,
    category::{CategoryId, CategoryKind, SubcategoryId, get_category, get_subcategory},
    currency::{ensure_non_zero, ensure_positive, ensure_same_currency},
    database_id::DatabaseId,
    envelope::{EnvelopeId, apply_spent_delta, check_overspent, get_referenced_envelope},
    text_enum::text_enum,
    wallet::{WalletId, apply_balance_delta, check_negative_balance, get_referenced_wallet},
};

/// Database identifier for a transaction.
pub type TransactionId = DatabaseId;

text_enum! {
    /// What a transaction does to the balance of its wallets.
    pub enum TransactionKind {
        /// Money spent out of a wallet, optionally from an envelope's budget.
        Expense => "expense",
        /// Money earned into a wallet.
        Income => "income",
        /// Money moved from one wallet to another.
        Transfer => "transfer",
        /// Money put into a wallet.
        Deposit => "deposit",
        /// A signed correction to a wallet's balance.
        Adjustment => "adjustment",
    }
}

impl Default for TransactionKind {
    fn default() -> Self {
        Self::Expense
    }
}

/// A recorded movement of money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user who recorded the transaction.
    pub user_id: UserID,
    /// The wallet money moved out of or into.
    pub wallet_id: WalletId,
    /// The wallet money moved into for a transfer.
    pub destination_wallet_id: Option<WalletId>,
    /// The envelope an expense was spent from.
    pub envelope_id: Option<EnvelopeId>,
    /// The category of an expense or income.
    pub category_id: Option<CategoryId>,
    /// The subcategory of an expense or income.
    pub subcategory_id: Option<SubcategoryId>,
    /// The amount moved, only adjustments may be negative.
    pub amount: f64,
    /// What the transaction does to the balance of its wallets.
    pub kind: TransactionKind,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the money moved.
    pub date: Date,
    /// Incremented by every edit.
    pub version: i64,
    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,
}

/// The details needed to record or replace a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// What the transaction does to the balance of its wallets.
    pub kind: TransactionKind,
    /// The wallet money moves out of or into.
    pub wallet_id: WalletId,
    /// The wallet money moves into, required for transfers only.
    #[serde(default)]
    pub destination_wallet_id: Option<WalletId>,
    /// The envelope to spend from, expenses only.
    #[serde(default)]
    pub envelope_id: Option<EnvelopeId>,
    /// The category, expenses and income only.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// The subcategory, which must belong to the category if both are given.
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
    /// The amount, positive except for adjustments which must be non-zero.
    pub amount: f64,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// When the money moved, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
}

/// The body of a request to edit a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTransaction {
    /// The replacement details.
    #[serde(flatten)]
    pub request: TransactionRequest,
    /// The version the edit is based on, if the client wants stale edits rejected.
    #[serde(default)]
    pub version: Option<i64>,
}

/// A [TransactionRequest] that passed validation.
struct ValidatedRequest {
    kind: TransactionKind,
    wallet_id: WalletId,
    destination_wallet_id: Option<WalletId>,
    envelope_id: Option<EnvelopeId>,
    category_id: Option<CategoryId>,
    subcategory_id: Option<SubcategoryId>,
    amount: f64,
    description: String,
    date: Date,
}

/// Create the transaction table.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            wallet_id INTEGER NOT NULL,
            destination_wallet_id INTEGER,
            envelope_id INTEGER,
            category_id INTEGER,
            subcategory_id INTEGER,
            amount REAL NOT NULL,
            kind TEXT NOT NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(wallet_id) REFERENCES wallet(id),
            FOREIGN KEY(destination_wallet_id) REFERENCES wallet(id),
            FOREIGN KEY(envelope_id) REFERENCES envelope(id) ON DELETE SET NULL,
            FOREIGN KEY(category_id) REFERENCES category(id) ON DELETE SET NULL,
            FOREIGN KEY(subcategory_id) REFERENCES subcategory(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_date
        ON \"transaction\"(user_id, date) WHERE deleted_at IS NULL;",
    )?;

    Ok(())
}

/// Check `request` against the rules for its kind and the entities it references.
fn validate_request(
    user_id: UserID,
    request: &TransactionRequest,
    today: Date,
    connection: &Connection,
) -> Result<ValidatedRequest, Error> {
    let date = request.date.unwrap_or(today);
    if date > today {
        return Err(Error::FutureDate(date));
    }

    let amount = match request.kind {
        TransactionKind::Adjustment => ensure_non_zero(request.amount)?,
        _ => ensure_positive(request.amount)?,
    };

    let wallet = get_referenced_wallet(request.wallet_id, user_id, connection)?;

    let destination_wallet_id = match (request.kind, request.destination_wallet_id) {
        (TransactionKind::Transfer, Some(destination_id)) => {
            if destination_id == wallet.id {
                return Err(Error::SameSourceAndDestination("wallet"));
            }

            let destination = get_referenced_wallet(destination_id, user_id, connection)?;
            ensure_same_currency(&wallet.currency, &destination.currency)?;
            Some(destination_id)
        }
        (TransactionKind::Transfer, None) => {
            return Err(Error::InvalidInput(
                "a transfer needs a destination wallet".to_owned(),
            ));
        }
        (_, Some(_)) => {
            return Err(Error::InvalidInput(
                "only transfers have a destination wallet".to_owned(),
            ));
        }
        (_, None) => None,
    };

    if let Some(envelope_id) = request.envelope_id {
        if request.kind != TransactionKind::Expense {
            return Err(Error::InvalidInput(
                "only expenses can be spent from an envelope".to_owned(),
            ));
        }

        let view = get_referenced_envelope(envelope_id, user_id, connection)?;
        ensure_same_currency(&wallet.currency, &view.envelope.currency)?;
    }

    let expected_category_kind = match request.kind {
        TransactionKind::Expense => Some(CategoryKind::Expense),
        TransactionKind::Income => Some(CategoryKind::Income),
        _ => None,
    };

    let mut category_id = request.category_id;
    if let Some(subcategory_id) = request.subcategory_id {
        let subcategory = get_subcategory(subcategory_id, user_id, connection).map_err(
            |error| match error {
                Error::NotFound => Error::InvalidReference("subcategory", subcategory_id),
                error => error,
            },
        )?;

        match category_id {
            Some(id) if id != subcategory.category_id => {
                return Err(Error::InvalidInput(format!(
                    "subcategory {subcategory_id} does not belong to category {id}"
                )));
            }
            _ => category_id = Some(subcategory.category_id),
        }
    }

    if let Some(id) = category_id {
        let Some(expected_kind) = expected_category_kind else {
            return Err(Error::InvalidInput(format!(
                "{} transactions cannot have a category",
                request.kind
            )));
        };

        let category = get_category(id, user_id, connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidReference("category", id),
            error => error,
        })?;

        if category.kind != expected_kind {
            return Err(Error::InvalidInput(format!(
                "category {id} is for {} transactions, not {}",
                category.kind, request.kind
            )));
        }
    }

    Ok(ValidatedRequest {
        kind: request.kind,
        wallet_id: wallet.id,
        destination_wallet_id,
        envelope_id: request.envelope_id,
        category_id,
        subcategory_id: request.subcategory_id,
        amount,
        description: request.description.trim().to_owned(),
        date,
    })
}

/// Record a transaction and apply its effect to the balances of its wallets.
///
/// Expenses also add to the spending of their envelope. Balances are applied
/// to both the real and projected balance. Wallets that end up below zero and
/// envelopes that end up overspent are reported as warnings.
///
/// # Errors
///
/// This function will return a:
/// - [Error::FutureDate] if the date is after `today`,
/// - [Error::InvalidAmount] if the amount is not positive, or zero for an adjustment,
/// - [Error::InvalidReference] or [Error::Forbidden] if a referenced wallet,
///   envelope, category or subcategory is not usable by the user,
/// - [Error::SameSourceAndDestination] or [Error::CurrencyMismatch] for a bad transfer,
/// - [Error::InvalidInput] if a field does not fit the kind of transaction.
pub fn record_transaction(
    user_id: UserID,
    request: &TransactionRequest,
    today: Date,
    connection: &Connection,
) -> Result<(Transaction, Vec<Warning>), Error> {
    let validated = validate_request(user_id, request, today, connection)?;

    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, wallet_id, destination_wallet_id, envelope_id,
                category_id, subcategory_id, amount, kind, description, date, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11)
             RETURNING id, user_id, wallet_id, destination_wallet_id, envelope_id, category_id,
                subcategory_id, amount, kind, description, date, version, created_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                validated.wallet_id,
                validated.destination_wallet_id,
                validated.envelope_id,
                validated.category_id,
                validated.subcategory_id,
                validated.amount,
                validated.kind,
                &validated.description,
                validated.date,
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )?;

    apply_effect(&transaction, 1.0, connection)?;
    let warnings = collect_warnings(&[&transaction], connection)?;

    Ok((transaction, warnings))
}

/// Get the live transaction `id` recorded by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the transaction does not exist or was
/// deleted, or an [Error::Forbidden] if another user recorded it.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, wallet_id, destination_wallet_id, envelope_id, category_id,
                subcategory_id, amount, kind, description, date, version, created_at
             FROM \"transaction\" WHERE id = :id AND deleted_at IS NULL",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    if transaction.user_id != user_id {
        return Err(Error::Forbidden(
            "you do not have access to this transaction".to_owned(),
        ));
    }

    Ok(transaction)
}

/// Replace transaction `id` with `update.request`.
///
/// The effect of the old transaction is reverted and the effect of the new
/// one applied. The version is incremented.
///
/// # Errors
///
/// Returns the errors of [get_transaction] and [record_transaction], or an
/// [Error::VersionConflict] if `update.version` is given and is not the
/// current version.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: &UpdateTransaction,
    today: Date,
    connection: &Connection,
) -> Result<(Transaction, Vec<Warning>), Error> {
    let old = get_transaction(id, user_id, connection)?;

    if let Some(expected) = update.version
        && expected != old.version
    {
        return Err(Error::VersionConflict {
            expected,
            actual: old.version,
        });
    }

    let validated = validate_request(user_id, &update.request, today, connection)?;

    apply_effect(&old, -1.0, connection)?;

    let new = connection
        .prepare(
            "UPDATE \"transaction\" SET wallet_id = ?1, destination_wallet_id = ?2,
                envelope_id = ?3, category_id = ?4, subcategory_id = ?5, amount = ?6, kind = ?7,
                description = ?8, date = ?9, version = version + 1
             WHERE id = ?10
             RETURNING id, user_id, wallet_id, destination_wallet_id, envelope_id, category_id,
                subcategory_id, amount, kind, description, date, version, created_at",
        )?
        .query_row(
            (
                validated.wallet_id,
                validated.destination_wallet_id,
                validated.envelope_id,
                validated.category_id,
                validated.subcategory_id,
                validated.amount,
                validated.kind,
                &validated.description,
                validated.date,
                id,
            ),
            map_transaction_row,
        )?;

    apply_effect(&new, 1.0, connection)?;
    let warnings = collect_warnings(&[&old, &new], connection)?;

    Ok((new, warnings))
}

/// Soft delete transaction `id` and revert its effect.
///
/// Returns the warnings for wallets left below zero, e.g. after deleting a deposit.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Warning>, Error> {
    let transaction = get_transaction(id, user_id, connection)?;

    apply_effect(&transaction, -1.0, connection)?;
    connection.execute(
        "UPDATE \"transaction\" SET deleted_at = ?1 WHERE id = ?2",
        (OffsetDateTime::now_utc(), id),
    )?;

    collect_warnings(&[&transaction], connection)
}

/// Apply the effect of `transaction` scaled by `sign`, which is `1.0` to
/// apply it and `-1.0` to revert it.
fn apply_effect(transaction: &Transaction, sign: f64, connection: &Connection) -> Result<(), Error> {
    let amount = transaction.amount * sign;

    match transaction.kind {
        TransactionKind::Expense => {
            apply_balance_delta(transaction.wallet_id, -amount, connection)?;

            if let Some(envelope_id) = transaction.envelope_id {
                apply_spent_delta(envelope_id, transaction.user_id, amount, connection)?;
            }
        }
        TransactionKind::Income | TransactionKind::Deposit | TransactionKind::Adjustment => {
            apply_balance_delta(transaction.wallet_id, amount, connection)?;
        }
        TransactionKind::Transfer => {
            apply_balance_delta(transaction.wallet_id, -amount, connection)?;

            if let Some(destination_id) = transaction.destination_wallet_id {
                apply_balance_delta(destination_id, amount, connection)?;
            }
        }
    }

    Ok(())
}

/// The warnings for every wallet and envelope touched by `transactions`.
fn collect_warnings(
    transactions: &[&Transaction],
    connection: &Connection,
) -> Result<Vec<Warning>, Error> {
    let mut wallet_ids: Vec<WalletId> = Vec::new();
    let mut envelope_ids: Vec<EnvelopeId> = Vec::new();

    for transaction in transactions {
        for wallet_id in [Some(transaction.wallet_id), transaction.destination_wallet_id]
            .into_iter()
            .flatten()
        {
            if !wallet_ids.contains(&wallet_id) {
                wallet_ids.push(wallet_id);
            }
        }

        if let Some(envelope_id) = transaction.envelope_id
            && !envelope_ids.contains(&envelope_id)
        {
            envelope_ids.push(envelope_id);
        }
    }

    let mut warnings = Vec::new();

    for wallet_id in wallet_ids {
        warnings.extend(check_negative_balance(wallet_id, connection)?);
    }

    for envelope_id in envelope_ids {
        warnings.extend(check_overspent(envelope_id, connection)?);
    }

    Ok(warnings)
}

/// Map a database row to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        wallet_id: row.get(2)?,
        destination_wallet_id: row.get(3)?,
        envelope_id: row.get(4)?,
        category_id: row.get(5)?,
        subcategory_id: row.get(6)?,
        amount: row.get(7)?,
        kind: row.get(8)?,
        description: row.get(9)?,
        date: row.get(10)?,
        version: row.get(11)?,
        created_at: row.get(12)?,
    })
}
