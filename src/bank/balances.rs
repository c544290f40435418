//! The balance of each bank, derived from the allocations of its accounts' transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error, api_response::ApiSuccess, auth::UserID, bank::BankId, db::lock_connection,
};

#[derive(Clone)]
pub struct BankState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BankState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct AccountCounts {
    pub bank_account: u32,
    pub virtual_card: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankBalance {
    pub id: BankId,
    pub name: String,
    pub balance: f64,
    pub account_counts: AccountCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankBalances {
    pub banks: Vec<BankBalance>,
    pub total_balance: f64,
}

/// Get every bank owned by `user_id` with its balance and account counts, ordered by name.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_bank_balances(user_id: UserID, connection: &Connection) -> Result<BankBalances, Error> {
    let banks = connection
        .prepare(
            "SELECT b.id, b.name,
                COALESCE((
                    SELECT SUM(tc.amount)
                    FROM transaction_category tc
                    INNER JOIN \"transaction\" t ON t.id = tc.transaction_id
                    INNER JOIN account a ON a.id = t.account_id
                    WHERE a.bank_id = b.id
                ), 0),
                (SELECT COUNT(*) FROM account a WHERE a.bank_id = b.id AND a.account_type = 'bank_account'),
                (SELECT COUNT(*) FROM account a WHERE a.bank_id = b.id AND a.account_type = 'virtual_card')
            FROM bank b
            WHERE b.user_id = ?1
            ORDER BY b.name COLLATE NOCASE, b.id",
        )?
        .query_map([user_id.as_i64()], |row| {
            Ok(BankBalance {
                id: row.get(0)?,
                name: row.get(1)?,
                balance: row.get(2)?,
                account_counts: AccountCounts {
                    bank_account: row.get(3)?,
                    virtual_card: row.get(4)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total_balance = banks.iter().map(|bank| bank.balance).sum();

    Ok(BankBalances {
        banks,
        total_balance,
    })
}

/// A route handler for `GET /api/bank-balances`.
pub async fn get_bank_balances_endpoint(
    State(state): State<BankState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiSuccess<BankBalances>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_bank_balances(user_id, &connection).map(ApiSuccess)
}
