//! Database initialisation and connection helpers.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::{
    Error,
    auth::create_user_table,
    category::create_category_tables,
    envelope::create_envelope_tables,
    subscription::create_subscription_tables,
    transaction::create_transaction_table,
    user_config::create_user_config_table,
    wallet::create_wallet_table,
};

/// Create all the application's tables and seed the subscription plans.
///
/// Safe to call on a database that has already been initialised.
///
/// # Errors
///
/// Returns an error if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    create_user_table(connection)?;
    create_subscription_tables(connection)?;
    create_user_config_table(connection)?;
    create_wallet_table(connection)?;
    create_category_tables(connection)?;
    create_envelope_tables(connection)?;
    create_transaction_table(connection)?;

    Ok(())
}

/// Lock the shared database connection.
///
/// # Errors
///
/// Returns an [Error::DatabaseLockError] if the lock is poisoned.
pub fn lock_connection(
    db_connection: &Arc<Mutex<Connection>>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("Could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        assert_eq!(Ok(()), initialize(&connection));
        assert_eq!(Ok(()), initialize(&connection));
    }

    #[test]
    fn enables_foreign_keys() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let enabled: bool = connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert!(enabled);
    }
}
