//! Defines the wallet model and its database queries.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error, UserID, Warning,
    currency::{Currency, ensure_not_negative},
    database_id::DatabaseId,
    name::Name,
    subscription::ensure_wallet_limit,
    text_enum::text_enum,
    transaction::{TransactionKind, TransactionRequest, record_transaction},
    user_config::get_user_config,
};

/// Database identifier for a wallet.
pub type WalletId = DatabaseId;

text_enum! {
    /// What kind of place a wallet's money is kept in.
    pub enum WalletType {
        /// Notes and coins.
        Cash => "cash",
        /// A transaction or everyday bank account.
        Bank => "bank",
        /// A credit card, which usually has a negative balance.
        CreditCard => "credit_card",
        /// A savings account.
        Savings => "savings",
        /// Shares, funds and the like.
        Investment => "investment",
    }
}

impl Default for WalletType {
    fn default() -> Self {
        Self::Cash
    }
}

/// A place where a user keeps money in a single currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// The ID of the wallet.
    pub id: WalletId,
    /// The user who owns the wallet.
    pub user_id: UserID,
    /// The name of the wallet, unique among the user's wallets.
    pub name: Name,
    /// What kind of place the money is kept in.
    pub wallet_type: WalletType,
    /// The currency of every amount in the wallet.
    pub currency: Currency,
    /// The money actually in the wallet.
    pub real_balance: f64,
    /// The balance the wallet is expected to have once recorded transactions settle.
    pub projected_balance: f64,
    /// When the wallet was created.
    pub created_at: OffsetDateTime,
}

/// The details needed to create a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWallet {
    /// The name of the wallet.
    pub name: String,
    /// What kind of place the money is kept in.
    #[serde(default)]
    pub wallet_type: WalletType,
    /// The currency code, defaults to the user's default currency.
    #[serde(default)]
    pub currency: Option<String>,
    /// The money already in the wallet, recorded as a deposit.
    #[serde(default)]
    pub initial_balance: f64,
}

/// The fields of a wallet that can be changed after it is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateWallet {
    /// The new name of the wallet.
    pub name: String,
    /// The new kind of the wallet.
    pub wallet_type: WalletType,
}

/// The totals of a user's wallets that share a currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyTotal {
    /// The currency of the totals.
    pub currency: Currency,
    /// The number of live wallets in the currency.
    pub wallet_count: i64,
    /// The sum of the real balances.
    pub real_balance: f64,
    /// The sum of the projected balances.
    pub projected_balance: f64,
}

/// Create the wallet table.
pub fn create_wallet_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS wallet (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            wallet_type TEXT NOT NULL,
            currency TEXT NOT NULL,
            real_balance REAL NOT NULL DEFAULT 0,
            projected_balance REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_wallet_user_name
        ON wallet(user_id, name) WHERE deleted_at IS NULL;",
    )?;

    Ok(())
}

/// Create a wallet for `user_id`.
///
/// A positive initial balance is recorded as a deposit dated `today`, so the
/// wallet's history explains its balance.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EmptyName] if the name is blank,
/// - [Error::InvalidAmount] if the initial balance is negative,
/// - [Error::InvalidCurrency] if the currency code is malformed,
/// - [Error::PlanLimitReached] if the user's plan does not allow another wallet,
/// - [Error::DuplicateName] if the user has a live wallet with the same name.
pub fn create_wallet(
    user_id: UserID,
    new_wallet: &NewWallet,
    today: Date,
    connection: &Connection,
) -> Result<Wallet, Error> {
    let name = Name::new(&new_wallet.name, "wallet")?;
    let initial_balance = ensure_not_negative(new_wallet.initial_balance)?;
    let currency = match &new_wallet.currency {
        Some(code) => Currency::new(code)?,
        None => get_user_config(user_id, connection)?.default_currency,
    };

    ensure_wallet_limit(user_id, connection)?;

    let wallet = connection
        .prepare(
            "INSERT INTO wallet (user_id, name, wallet_type, currency, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, user_id, name, wallet_type, currency, real_balance,
                projected_balance, created_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                name.as_ref(),
                new_wallet.wallet_type,
                currency.as_ref(),
                OffsetDateTime::now_utc(),
            ),
            map_wallet_row,
        )
        .map_err(|error| map_unique_name_error(error, &name))?;

    if initial_balance > 0.0 {
        record_transaction(
            user_id,
            &TransactionRequest {
                kind: TransactionKind::Deposit,
                wallet_id: wallet.id,
                amount: initial_balance,
                description: "Initial balance".to_owned(),
                date: Some(today),
                ..Default::default()
            },
            today,
            connection,
        )?;

        return get_wallet(wallet.id, user_id, connection);
    }

    Ok(wallet)
}

fn map_unique_name_error(error: rusqlite::Error, name: &Name) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateName("wallet", name.to_string()),
        error => error.into(),
    }
}

/// Get the live wallet `id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the wallet does not exist or was deleted,
/// or an [Error::Forbidden] if it belongs to another user.
pub fn get_wallet(id: WalletId, user_id: UserID, connection: &Connection) -> Result<Wallet, Error> {
    let wallet = connection
        .prepare(
            "SELECT id, user_id, name, wallet_type, currency, real_balance, projected_balance,
                created_at
             FROM wallet WHERE id = :id AND deleted_at IS NULL",
        )?
        .query_row(&[(":id", &id)], map_wallet_row)?;

    if wallet.user_id != user_id {
        return Err(Error::Forbidden(
            "you do not have access to this wallet".to_owned(),
        ));
    }

    Ok(wallet)
}

/// Like [get_wallet], but a missing wallet is reported as a bad reference
/// since the ID came from a request body rather than the URL.
pub fn get_referenced_wallet(
    id: WalletId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Wallet, Error> {
    get_wallet(id, user_id, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidReference("wallet", id),
        error => error,
    })
}

/// Get the live wallets of `user_id` ordered by name.
pub fn list_wallets(user_id: UserID, connection: &Connection) -> Result<Vec<Wallet>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, wallet_type, currency, real_balance, projected_balance,
                created_at
             FROM wallet WHERE user_id = :user_id AND deleted_at IS NULL
             ORDER BY name ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_wallet_row)?
        .map(|maybe_wallet| maybe_wallet.map_err(Error::from))
        .collect()
}

/// Rename or change the kind of wallet `id`.
pub fn update_wallet(
    id: WalletId,
    user_id: UserID,
    update: &UpdateWallet,
    connection: &Connection,
) -> Result<Wallet, Error> {
    let name = Name::new(&update.name, "wallet")?;
    get_wallet(id, user_id, connection)?;

    connection
        .prepare(
            "UPDATE wallet SET name = ?1, wallet_type = ?2 WHERE id = ?3
             RETURNING id, user_id, name, wallet_type, currency, real_balance,
                projected_balance, created_at",
        )?
        .query_row((name.as_ref(), update.wallet_type, id), map_wallet_row)
        .map_err(|error| map_unique_name_error(error, &name))
}

/// Soft delete wallet `id`.
///
/// The wallet's transactions are kept. If the wallet was the user's default
/// wallet, the default is cleared.
pub fn delete_wallet(id: WalletId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    get_wallet(id, user_id, connection)?;

    connection.execute(
        "UPDATE wallet SET deleted_at = ?1 WHERE id = ?2",
        (OffsetDateTime::now_utc(), id),
    )?;
    connection.execute(
        "UPDATE user_config SET default_wallet_id = NULL WHERE default_wallet_id = ?1",
        [id],
    )?;

    Ok(())
}

/// Total the live wallets of `user_id` per currency.
pub fn get_wallet_summary(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<CurrencyTotal>, Error> {
    connection
        .prepare(
            "SELECT currency, COUNT(id), COALESCE(SUM(real_balance), 0),
                COALESCE(SUM(projected_balance), 0)
             FROM wallet WHERE user_id = :user_id AND deleted_at IS NULL
             GROUP BY currency ORDER BY currency ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], |row| {
            let currency: String = row.get(0)?;

            Ok(CurrencyTotal {
                currency: Currency::new_unchecked(&currency),
                wallet_count: row.get(1)?,
                real_balance: row.get(2)?,
                projected_balance: row.get(3)?,
            })
        })?
        .map(|maybe_total| maybe_total.map_err(Error::from))
        .collect()
}

/// Add `delta` to the real and projected balance of wallet `id`.
///
/// Soft deleted wallets are updated too so that editing or deleting an old
/// transaction keeps the wallet's history consistent.
pub(crate) fn apply_balance_delta(
    id: WalletId,
    delta: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE wallet SET real_balance = real_balance + ?1,
            projected_balance = projected_balance + ?1
         WHERE id = ?2",
        (delta, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::InvalidReference("wallet", id));
    }

    Ok(())
}

/// A [Warning::NegativeBalance] if wallet `id` is overdrawn.
pub(crate) fn check_negative_balance(
    id: WalletId,
    connection: &Connection,
) -> Result<Option<Warning>, Error> {
    let balance: f64 = connection.query_row(
        "SELECT real_balance FROM wallet WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;

    Ok((balance < 0.0).then_some(Warning::NegativeBalance {
        wallet_id: id,
        balance,
    }))
}

/// Map a database row to a [Wallet].
pub fn map_wallet_row(row: &Row) -> Result<Wallet, rusqlite::Error> {
    let raw_name: String = row.get(2)?;
    let raw_currency: String = row.get(4)?;

    Ok(Wallet {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: Name::new_unchecked(&raw_name),
        wallet_type: row.get(3)?,
        currency: Currency::new_unchecked(&raw_currency),
        real_balance: row.get(5)?,
        projected_balance: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Error, UserID,
        test_utils::{create_test_user, create_test_wallet, get_test_connection},
        wallet::core::{
            NewWallet, UpdateWallet, WalletType, create_wallet, delete_wallet, get_wallet,
            get_wallet_summary, list_wallets, update_wallet,
        },
    };

    fn new_wallet(name: &str, initial_balance: f64) -> NewWallet {
        NewWallet {
            name: name.to_owned(),
            wallet_type: WalletType::Bank,
            currency: None,
            initial_balance,
        }
    }

    #[test]
    fn create_records_initial_balance_as_deposit() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        let wallet = create_wallet(
            user.id,
            &new_wallet("Everyday", 250.0),
            date!(2025 - 06 - 01),
            &connection,
        )
        .unwrap();

        assert_eq!(wallet.real_balance, 250.0);
        assert_eq!(wallet.projected_balance, 250.0);
        assert_eq!(wallet.currency.as_ref(), "USD");
        let (kind, amount): (String, f64) = connection
            .query_row(
                "SELECT kind, amount FROM \"transaction\" WHERE wallet_id = ?1",
                [wallet.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(kind, "deposit");
        assert_eq!(amount, 250.0);
    }

    #[test]
    fn create_with_zero_balance_writes_no_transaction() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        let wallet = create_wallet(
            user.id,
            &new_wallet("Empty", 0.0),
            date!(2025 - 06 - 01),
            &connection,
        )
        .unwrap();

        let count: i64 = connection
            .query_row(
                "SELECT COUNT(id) FROM \"transaction\" WHERE wallet_id = ?1",
                [wallet.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn create_rejects_negative_initial_balance() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        let result = create_wallet(
            user.id,
            &new_wallet("Overdrawn", -1.0),
            date!(2025 - 06 - 01),
            &connection,
        );

        assert_eq!(
            result,
            Err(Error::InvalidAmount(-1.0, "must not be negative"))
        );
    }

    #[test]
    fn create_rejects_blank_name_and_bad_currency() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        assert_eq!(
            create_wallet(user.id, &new_wallet("  ", 0.0), date!(2025 - 06 - 01), &connection),
            Err(Error::EmptyName("wallet"))
        );

        let mut euro_wallet = new_wallet("Euros", 0.0);
        euro_wallet.currency = Some("EURO".to_owned());
        assert!(matches!(
            create_wallet(user.id, &euro_wallet, date!(2025 - 06 - 01), &connection),
            Err(Error::InvalidCurrency(_))
        ));
    }

    #[test]
    fn create_rejects_duplicate_live_name() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        create_test_wallet(user.id, "Cash", 0.0, &connection);

        let result = create_wallet(
            user.id,
            &new_wallet("cash", 0.0),
            date!(2025 - 06 - 01),
            &connection,
        );

        assert_eq!(
            result,
            Err(Error::DuplicateName("wallet", "cash".to_owned()))
        );
    }

    #[test]
    fn deleted_name_can_be_reused() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        let wallet = create_test_wallet(user.id, "Cash", 0.0, &connection);
        delete_wallet(wallet.id, user.id, &connection).unwrap();

        let result = create_wallet(
            user.id,
            &new_wallet("Cash", 0.0),
            date!(2025 - 06 - 01),
            &connection,
        );

        assert!(result.is_ok());
    }

    #[test]
    fn deleted_wallets_are_hidden() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        let wallet = create_test_wallet(user.id, "Cash", 10.0, &connection);
        create_test_wallet(user.id, "Bank", 20.0, &connection);

        delete_wallet(wallet.id, user.id, &connection).unwrap();

        assert_eq!(get_wallet(wallet.id, user.id, &connection), Err(Error::NotFound));
        let names: Vec<_> = list_wallets(user.id, &connection)
            .unwrap()
            .into_iter()
            .map(|wallet| wallet.name.to_string())
            .collect();
        assert_eq!(names, ["Bank"]);
    }

    #[test]
    fn other_users_wallet_is_forbidden() {
        let connection = get_test_connection();
        let ana = create_test_user("ana@example.com", &connection);
        let wallet = create_test_wallet(ana.id, "Cash", 10.0, &connection);

        let result = get_wallet(wallet.id, UserID::new(ana.id.as_i64() + 1), &connection);

        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn update_renames_wallet() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        let wallet = create_test_wallet(user.id, "Cash", 10.0, &connection);

        let updated = update_wallet(
            wallet.id,
            user.id,
            &UpdateWallet {
                name: "Savings".to_owned(),
                wallet_type: WalletType::Savings,
            },
            &connection,
        )
        .unwrap();

        assert_eq!(updated.name.as_ref(), "Savings");
        assert_eq!(updated.wallet_type, WalletType::Savings);
        assert_eq!(updated.real_balance, 10.0);
    }

    #[test]
    fn summary_groups_by_currency() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        create_test_wallet(user.id, "Cash", 10.0, &connection);
        create_test_wallet(user.id, "Bank", 15.5, &connection);
        let mut euros = new_wallet("Euros", 7.0);
        euros.currency = Some("eur".to_owned());
        create_wallet(user.id, &euros, date!(2025 - 06 - 01), &connection).unwrap();

        let summary = get_wallet_summary(user.id, &connection).unwrap();

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].currency.as_ref(), "EUR");
        assert_eq!(summary[0].real_balance, 7.0);
        assert_eq!(summary[1].currency.as_ref(), "USD");
        assert_eq!(summary[1].wallet_count, 2);
        assert_eq!(summary[1].real_balance, 25.5);
    }
}
