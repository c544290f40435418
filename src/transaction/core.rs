//! Defines the core data models and database queries for transactions.

use std::collections::HashMap;

use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    auth::UserID,
    bank::{Account, AccountId, map_account_columns},
    category::{CategoryId, SubcategoryId},
};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub type TransactionId = i64;
pub type AllocationId = i64;

// ============================================================================
// MODELS
// ============================================================================

/// The ID and name of a category or subcategory an allocation points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

/// A portion of a transaction's value assigned to one category/subcategory pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub category_id: CategoryId,
    pub subcategory_id: Option<SubcategoryId>,
    /// Positive for income, negative for expenses.
    pub amount: f64,
    pub category: NamedRef,
    pub subcategory: Option<NamedRef>,
}

/// A bank transaction with its account and category allocations.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// The identifier the bank export gave this transaction.
    pub external_id: String,
    pub account_id: AccountId,
    #[serde(with = "iso_date")]
    pub operation_date: Date,
    #[serde(with = "iso_date::option")]
    pub value_date: Option<Date>,
    /// The description from the bank.
    pub description: String,
    /// The user's own description, shown instead of `description` when set.
    pub user_description: Option<String>,
    /// The sum of the allocation amounts.
    pub amount: f64,
    pub categories: Vec<Allocation>,
    pub account: Account,
}

impl Transaction {
    /// Start building a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        external_id: &str,
        account_id: AccountId,
        operation_date: Date,
        description: &str,
    ) -> TransactionBuilder {
        TransactionBuilder {
            external_id: external_id.to_owned(),
            account_id,
            operation_date,
            value_date: None,
            description: description.to_owned(),
            user_description: None,
            allocations: Vec::new(),
        }
    }
}

/// One allocation to store for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAllocation {
    pub category_id: CategoryId,
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
    pub amount: f64,
}

impl NewAllocation {
    pub fn new(category_id: CategoryId, subcategory_id: Option<SubcategoryId>, amount: f64) -> Self {
        Self {
            category_id,
            subcategory_id,
            amount,
        }
    }

    /// The category/subcategory pair that must be unique within a transaction.
    pub fn pair(&self) -> (CategoryId, Option<SubcategoryId>) {
        (self.category_id, self.subcategory_id)
    }
}

/// A builder for new transactions, used by imports, seeding and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBuilder {
    pub external_id: String,
    pub account_id: AccountId,
    pub operation_date: Date,
    pub value_date: Option<Date>,
    pub description: String,
    pub user_description: Option<String>,
    pub allocations: Vec<NewAllocation>,
}

impl TransactionBuilder {
    /// Set the date the bank settled the transaction.
    pub fn value_date(mut self, value_date: Date) -> Self {
        self.value_date = Some(value_date);
        self
    }

    pub fn user_description(mut self, user_description: &str) -> Self {
        self.user_description = Some(user_description.to_owned());
        self
    }

    /// Add an allocation of `amount` to a category and optional subcategory.
    pub fn allocation(
        mut self,
        category_id: CategoryId,
        subcategory_id: Option<SubcategoryId>,
        amount: f64,
    ) -> Self {
        self.allocations
            .push(NewAllocation::new(category_id, subcategory_id, amount));
        self
    }
}

// ============================================================================
// DATABASE
// ============================================================================

pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            external_id TEXT NOT NULL,
            account_id INTEGER NOT NULL,
            operation_date TEXT NOT NULL,
            value_date TEXT,
            description TEXT NOT NULL,
            user_description TEXT,
            FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE CASCADE,
            UNIQUE(account_id, external_id)
        )",
        (),
    )?;

    // Improve performance of the date range predicate and date sorting
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_operation_date ON \"transaction\"(operation_date)",
        (),
    )?;

    Ok(())
}

pub fn create_allocation_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transaction_category (
            id INTEGER PRIMARY KEY,
            transaction_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            subcategory_id INTEGER,
            amount REAL NOT NULL,
            FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id),
            FOREIGN KEY(subcategory_id) REFERENCES subcategory(id)
        )",
        (),
    )?;

    // A transaction may use each category/subcategory pair once.
    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_allocation_pair
        ON transaction_category(transaction_id, category_id, IFNULL(subcategory_id, 0))",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_allocation_category_id ON transaction_category(category_id)",
        (),
    )?;

    Ok(())
}

/// Insert a transaction and its allocations.
///
/// # Errors
/// Returns [Error::DuplicateAllocation] if two allocations share a category/subcategory pair,
/// [Error::InvalidReference] if the account, a category or a subcategory does not exist, or
/// an SQL error. Nothing is stored when an error is returned.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<TransactionId, Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "INSERT INTO \"transaction\"
            (external_id, account_id, operation_date, value_date, description, user_description)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            &builder.external_id,
            builder.account_id,
            builder.operation_date,
            builder.value_date,
            &builder.description,
            &builder.user_description,
        ),
    )?;
    let transaction_id = transaction.last_insert_rowid();

    insert_allocations(transaction_id, &builder.allocations, &transaction)?;
    transaction.commit()?;

    Ok(transaction_id)
}

pub(crate) fn insert_allocations(
    transaction_id: TransactionId,
    allocations: &[NewAllocation],
    connection: &Connection,
) -> Result<(), Error> {
    let mut statement = connection.prepare(
        "INSERT INTO transaction_category (transaction_id, category_id, subcategory_id, amount)
        VALUES (?1, ?2, ?3, ?4)",
    )?;

    for allocation in allocations {
        statement.execute((
            transaction_id,
            allocation.category_id,
            allocation.subcategory_id,
            allocation.amount,
        ))?;
    }

    Ok(())
}

const TRANSACTION_COLUMNS: &str = "t.id, t.external_id, t.account_id, t.operation_date, \
    t.value_date, t.description, t.user_description, \
    a.id, a.bank_id, a.account_type, a.account_number, b.id, b.name";

/// The joins every user-scoped transaction query starts from.
pub(crate) const TRANSACTION_FROM: &str = "FROM \"transaction\" t \
    INNER JOIN account a ON a.id = t.account_id \
    INNER JOIN bank b ON b.id = a.bank_id";

/// Whether `transaction_id` exists and belongs to `user_id`.
pub(crate) fn transaction_exists(
    user_id: UserID,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<bool, Error> {
    let query = format!("SELECT EXISTS (SELECT 1 {TRANSACTION_FROM} WHERE t.id = ?1 AND b.user_id = ?2)");

    connection
        .query_row(&query, (transaction_id, user_id.as_i64()), |row| row.get(0))
        .map_err(Error::from)
}

/// Get one of `user_id`'s transactions with its account and allocations.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not belong to the user.
pub fn get_transaction(
    user_id: UserID,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    load_transactions(user_id, &[transaction_id], connection)?
        .pop()
        .ok_or(Error::NotFound)
}

/// Load `user_id`'s transactions with the given IDs, in the order of `ids`.
///
/// IDs that do not belong to the user are skipped.
pub(crate) fn load_transactions(
    user_id: UserID,
    ids: &[TransactionId],
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} {TRANSACTION_FROM} WHERE b.user_id = ? AND t.id IN ({placeholders})"
    );
    let params = std::iter::once(Value::Integer(user_id.as_i64()))
        .chain(ids.iter().map(|id| Value::Integer(*id)));

    let mut transactions: HashMap<TransactionId, Transaction> = connection
        .prepare(&query)?
        .query_map(params_from_iter(params), map_transaction_row)?
        .map(|row| row.map(|transaction| (transaction.id, transaction)))
        .collect::<Result<_, _>>()?;

    for (transaction_id, allocation) in load_allocations(ids, connection)? {
        if let Some(transaction) = transactions.get_mut(&transaction_id) {
            transaction.amount += allocation.amount;
            transaction.categories.push(allocation);
        }
    }

    Ok(ids
        .iter()
        .filter_map(|id| transactions.remove(id))
        .collect())
}

fn load_allocations(
    ids: &[TransactionId],
    connection: &Connection,
) -> Result<Vec<(TransactionId, Allocation)>, Error> {
    let placeholders = vec!["?"; ids.len()].join(", ");
    let query = format!(
        "SELECT tc.transaction_id, tc.id, tc.category_id, tc.subcategory_id, tc.amount, c.name, s.name
        FROM transaction_category tc
        INNER JOIN category c ON c.id = tc.category_id
        LEFT JOIN subcategory s ON s.id = tc.subcategory_id
        WHERE tc.transaction_id IN ({placeholders})
        ORDER BY tc.id"
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(ids), |row| {
            let category_id = row.get(2)?;
            let subcategory_id: Option<SubcategoryId> = row.get(3)?;
            let subcategory_name: Option<String> = row.get(6)?;

            let allocation = Allocation {
                id: row.get(1)?,
                category_id,
                subcategory_id,
                amount: row.get(4)?,
                category: NamedRef {
                    id: category_id,
                    name: row.get(5)?,
                },
                subcategory: subcategory_id
                    .zip(subcategory_name)
                    .map(|(id, name)| NamedRef { id, name }),
            };

            Ok((row.get(0)?, allocation))
        })?
        .map(|row| row.map_err(Error::from))
        .collect()
}

fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        external_id: row.get(1)?,
        account_id: row.get(2)?,
        operation_date: row.get(3)?,
        value_date: row.get(4)?,
        description: row.get(5)?,
        user_description: row.get(6)?,
        amount: 0.0,
        categories: Vec::new(),
        account: map_account_columns(row, 7)?,
    })
}
