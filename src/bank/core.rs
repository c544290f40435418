use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::UserID};

pub type BankId = i64;
pub type AccountId = i64;

/// A bank that holds some of the user's accounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bank {
    pub id: BankId,
    pub name: String,
}

/// The kinds of account transactions can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// A physical bank account.
    BankAccount,
    /// A virtual card issued against a bank account.
    VirtualCard,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::BankAccount => "bank_account",
            AccountType::VirtualCard => "virtual_card",
        }
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "bank_account" => Ok(AccountType::BankAccount),
            "virtual_card" => Ok(AccountType::VirtualCard),
            other => Err(FromSqlError::Other(
                format!("unknown account type {other}").into(),
            )),
        }
    }
}

/// An account at a bank, including the bank it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub bank_id: BankId,
    pub account_type: AccountType,
    pub account_number: String,
    pub bank: Bank,
}

pub fn create_bank_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS bank (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_bank_user_id ON bank(user_id)",
        (),
    )?;

    Ok(())
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            bank_id INTEGER NOT NULL,
            account_type TEXT NOT NULL CHECK (account_type IN ('bank_account', 'virtual_card')),
            account_number TEXT NOT NULL,
            FOREIGN KEY(bank_id) REFERENCES bank(id) ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_bank_id ON account(bank_id)",
        (),
    )?;

    Ok(())
}

/// Create a bank owned by `user_id`.
///
/// # Errors
/// Returns [Error::InvalidReference] if the user does not exist, or an SQL error.
pub fn create_bank(user_id: UserID, name: &str, connection: &Connection) -> Result<Bank, Error> {
    connection.execute(
        "INSERT INTO bank (user_id, name) VALUES (?1, ?2)",
        (user_id.as_i64(), name),
    )?;

    Ok(Bank {
        id: connection.last_insert_rowid(),
        name: name.to_owned(),
    })
}

/// Create an account at `bank_id`.
///
/// # Errors
/// Returns [Error::InvalidReference] if the bank does not exist, or an SQL error.
pub fn create_account(
    bank_id: BankId,
    account_type: AccountType,
    account_number: &str,
    connection: &Connection,
) -> Result<AccountId, Error> {
    connection.execute(
        "INSERT INTO account (bank_id, account_type, account_number) VALUES (?1, ?2, ?3)",
        (bank_id, account_type, account_number),
    )?;

    Ok(connection.last_insert_rowid())
}

/// Map the account columns `a.id, a.bank_id, a.account_type, a.account_number, b.id, b.name`
/// starting at `offset`.
pub(crate) fn map_account_columns(row: &Row, offset: usize) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(offset)?,
        bank_id: row.get(offset + 1)?,
        account_type: row.get(offset + 2)?,
        account_number: row.get(offset + 3)?,
        bank: Bank {
            id: row.get(offset + 4)?,
            name: row.get(offset + 5)?,
        },
    })
}
