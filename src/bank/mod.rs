//! Banks, their accounts and the balance of each bank.

mod balances;
mod core;

pub use balances::{BankState, get_bank_balances_endpoint};
pub use core::{
    Account, AccountId, AccountType, Bank, BankId, create_account, create_account_table,
    create_bank, create_bank_table,
};
pub(crate) use core::map_account_columns;
