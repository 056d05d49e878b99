//! Moving money into, out of and between wallets.
//!
//! Every movement is recorded as a transaction so the wallet's balance can
//! always be explained by its history.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, UserID, Warning,
    currency::{ensure_non_zero, ensure_positive},
    transaction::{Transaction, TransactionKind, TransactionRequest, record_transaction},
    wallet::core::{Wallet, WalletId, get_wallet},
};

/// A correction to a wallet's balance, e.g. after counting the cash in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustForm {
    /// The signed amount to add to the balance.
    pub delta: f64,
    /// Why the balance was corrected.
    #[serde(default)]
    pub description: Option<String>,
}

/// Money put into or taken out of a single wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementForm {
    /// How much money moved, must be greater than zero.
    pub amount: f64,
    /// What the money was for.
    #[serde(default)]
    pub description: Option<String>,
    /// When the money moved, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
}

/// Money moved from one of the user's wallets to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferForm {
    /// The wallet the money leaves.
    pub from_wallet_id: WalletId,
    /// The wallet the money arrives in.
    pub to_wallet_id: WalletId,
    /// How much money moved, must be greater than zero.
    pub amount: f64,
    /// What the transfer was for.
    #[serde(default)]
    pub description: Option<String>,
    /// When the money moved, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
}

/// A wallet after money moved in or out of it, and the transaction recording it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletMovement {
    /// The wallet with its new balance.
    pub wallet: Wallet,
    /// The transaction that records the movement.
    pub transaction: Transaction,
}

/// Both wallets after a transfer, and the transaction recording it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransfer {
    /// The wallet the money left.
    pub from_wallet: Wallet,
    /// The wallet the money arrived in.
    pub to_wallet: Wallet,
    /// The transaction that records the transfer.
    pub transaction: Transaction,
}

fn description_or(description: &Option<String>, default: &str) -> String {
    match description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => description.to_owned(),
        _ => default.to_owned(),
    }
}

/// Add `form.delta` to the balance of wallet `wallet_id` and record an
/// adjustment transaction.
pub fn adjust_wallet(
    wallet_id: WalletId,
    user_id: UserID,
    form: &AdjustForm,
    today: Date,
    connection: &rusqlite::Connection,
) -> Result<(WalletMovement, Vec<Warning>), Error> {
    let delta = ensure_non_zero(form.delta)?;

    move_money(
        wallet_id,
        user_id,
        TransactionRequest {
            kind: TransactionKind::Adjustment,
            wallet_id,
            amount: delta,
            description: description_or(&form.description, "Balance adjustment"),
            date: Some(today),
            ..Default::default()
        },
        today,
        connection,
    )
}

/// Put money into wallet `wallet_id`.
pub fn deposit_to_wallet(
    wallet_id: WalletId,
    user_id: UserID,
    form: &MovementForm,
    today: Date,
    connection: &rusqlite::Connection,
) -> Result<(WalletMovement, Vec<Warning>), Error> {
    let amount = ensure_positive(form.amount)?;

    move_money(
        wallet_id,
        user_id,
        TransactionRequest {
            kind: TransactionKind::Deposit,
            wallet_id,
            amount,
            description: description_or(&form.description, "Deposit"),
            date: form.date,
            ..Default::default()
        },
        today,
        connection,
    )
}

/// Take money out of wallet `wallet_id`.
///
/// Withdrawing more than the wallet holds is allowed and reported as a
/// [Warning::NegativeBalance].
pub fn withdraw_from_wallet(
    wallet_id: WalletId,
    user_id: UserID,
    form: &MovementForm,
    today: Date,
    connection: &rusqlite::Connection,
) -> Result<(WalletMovement, Vec<Warning>), Error> {
    let amount = ensure_positive(form.amount)?;

    move_money(
        wallet_id,
        user_id,
        TransactionRequest {
            kind: TransactionKind::Expense,
            wallet_id,
            amount,
            description: description_or(&form.description, "Withdrawal"),
            date: form.date,
            ..Default::default()
        },
        today,
        connection,
    )
}

fn move_money(
    wallet_id: WalletId,
    user_id: UserID,
    request: TransactionRequest,
    today: Date,
    connection: &rusqlite::Connection,
) -> Result<(WalletMovement, Vec<Warning>), Error> {
    // The wallet comes from the URL, so a missing wallet is a 404 rather than a bad reference.
    get_wallet(wallet_id, user_id, connection)?;

    let (transaction, warnings) = record_transaction(user_id, &request, today, connection)?;
    let wallet = get_wallet(wallet_id, user_id, connection)?;

    Ok((
        WalletMovement {
            wallet,
            transaction,
        },
        warnings,
    ))
}

/// Move money between two of the user's wallets.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not greater than zero,
/// - [Error::SameSourceAndDestination] if both wallets are the same,
/// - [Error::CurrencyMismatch] if the wallets hold different currencies,
/// - [Error::InvalidReference] or [Error::Forbidden] if either wallet is not
///   a live wallet of the user.
pub fn transfer_between_wallets(
    user_id: UserID,
    form: &TransferForm,
    today: Date,
    connection: &rusqlite::Connection,
) -> Result<(WalletTransfer, Vec<Warning>), Error> {
    let amount = ensure_positive(form.amount)?;

    let (transaction, warnings) = record_transaction(
        user_id,
        &TransactionRequest {
            kind: TransactionKind::Transfer,
            wallet_id: form.from_wallet_id,
            destination_wallet_id: Some(form.to_wallet_id),
            amount,
            description: description_or(&form.description, "Transfer"),
            date: form.date,
            ..Default::default()
        },
        today,
        connection,
    )?;

    Ok((
        WalletTransfer {
            from_wallet: get_wallet(form.from_wallet_id, user_id, connection)?,
            to_wallet: get_wallet(form.to_wallet_id, user_id, connection)?,
            transaction,
        },
        warnings,
    ))
}
