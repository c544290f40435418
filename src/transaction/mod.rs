//! Transactions, their category allocations, and the filtered transaction listing.
//!
//! - `core`: the `Transaction` model, its builder and the tables behind them
//! - `filter`: the request-scoped [FilterState]
//! - `query`: turns a [FilterState] into SQL and pages the results
//! - `update`: description edits and allocation replacement
//! - `endpoints`: the route handlers

mod core;
mod endpoints;
mod filter;
mod query;
mod update;

pub use core::{
    Allocation, AllocationId, NamedRef, NewAllocation, Transaction, TransactionBuilder,
    TransactionId, create_allocation_table, create_transaction, create_transaction_table,
    get_transaction,
};
pub(crate) use core::{TRANSACTION_FROM, insert_allocations};
pub use endpoints::{
    TransactionState, get_filtered_transactions_endpoint, get_transaction_endpoint,
    post_filtered_transactions_endpoint, update_categories_endpoint, update_description_endpoint,
};
pub use filter::{
    CategorySelection, DateRange, FilterState, SearchFilter, Sort, SortColumn, SortDirection,
    SubcategorySelection, TypeFilter,
};
pub(crate) use query::{ALLOCATION_FROM, SqlFilter, allocation_filter, like_pattern};
pub use query::{TransactionPage, count_transactions, query_transactions};
pub use update::{replace_allocations, update_description};
