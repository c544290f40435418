//! Sets up the application database.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    auth::create_user_table,
    bank::{create_account_table, create_bank_table},
    category::{create_category_table, create_subcategory_table},
    rule::create_rule_table,
    transaction::{create_allocation_table, create_transaction_table},
};

/// Create the application tables if they do not already exist.
///
/// Foreign key enforcement is switched on for `connection`, tables are created in
/// dependency order inside a single exclusive transaction.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_bank_table(&transaction)?;
    create_account_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_category_table(&transaction)?;
    create_subcategory_table(&transaction)?;
    create_allocation_table(&transaction)?;
    create_rule_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Lock the shared connection, logging and mapping a poisoned lock to
/// [Error::DatabaseLockError].
pub fn lock_connection(
    db_connection: &Mutex<Connection>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}
