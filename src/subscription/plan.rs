//! Account tiers and the limits they place on a user.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Database identifier for a plan.
pub type PlanId = i64;

/// The code of the plan every user starts on.
pub const FREE_PLAN_CODE: &str = "free";

/// An account tier.
///
/// Limits of `None` mean the plan does not restrict that resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// The ID of the plan.
    pub id: PlanId,
    /// The stable code clients use to pick the plan, e.g. "premium".
    pub code: String,
    /// The display name of the plan.
    pub name: String,
    /// The price per month in USD.
    pub monthly_price: f64,
    /// How many live wallets a user may have.
    pub max_wallets: Option<i64>,
    /// How many live envelopes a user may own.
    pub max_envelopes: Option<i64>,
    /// How many people may share the subscription, including its owner.
    pub max_members: i64,
}

impl Plan {
    /// Whether the plan lets its subscribers share envelopes and invite members.
    pub fn allows_sharing(&self) -> bool {
        self.max_members > 1
    }
}

/// Create the plan table and insert the built-in plans.
pub fn create_plan_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS plan (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            monthly_price REAL NOT NULL,
            max_wallets INTEGER,
            max_envelopes INTEGER,
            max_members INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO plan (code, name, monthly_price, max_wallets, max_envelopes, max_members)
        VALUES
            ('free', 'Free', 0.0, 3, 5, 1),
            ('premium', 'Premium', 4.99, NULL, NULL, 1),
            ('family', 'Family', 9.99, NULL, NULL, 5);",
    )?;

    Ok(())
}

/// Get every plan ordered by price.
pub fn get_all_plans(connection: &Connection) -> Result<Vec<Plan>, Error> {
    connection
        .prepare(
            "SELECT id, code, name, monthly_price, max_wallets, max_envelopes, max_members
             FROM plan ORDER BY monthly_price ASC",
        )?
        .query_map([], map_plan_row)?
        .map(|maybe_plan| maybe_plan.map_err(|error| error.into()))
        .collect()
}

/// Get the plan with the code `code`.
///
/// # Errors
///
/// Returns an [Error::InvalidInput] if no plan has the code.
pub fn get_plan_by_code(code: &str, connection: &Connection) -> Result<Plan, Error> {
    connection
        .prepare(
            "SELECT id, code, name, monthly_price, max_wallets, max_envelopes, max_members
             FROM plan WHERE code = :code",
        )?
        .query_row(&[(":code", &code.trim().to_lowercase())], map_plan_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::InvalidInput(format!("\"{code}\" is not a valid plan"))
            }
            error => error.into(),
        })
}

pub(super) fn map_plan_row(row: &Row) -> Result<Plan, rusqlite::Error> {
    Ok(Plan {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        monthly_price: row.get(3)?,
        max_wallets: row.get(4)?,
        max_envelopes: row.get(5)?,
        max_members: row.get(6)?,
    })
}
