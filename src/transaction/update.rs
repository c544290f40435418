//! Edits to a single transaction: the user description and the category allocations.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::{
    Error,
    auth::UserID,
    category::{check_category_pair, get_categories},
    transaction::{
        NewAllocation, TransactionId,
        core::{insert_allocations, transaction_exists},
    },
};

pub const INVALID_CATEGORIES_MSG: &str = "Invalid categories data";

/// Set or clear the user description of one of `user_id`'s transactions.
///
/// The description is trimmed and an empty description clears the override. Returns the
/// stored value.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not belong to the user.
pub fn update_description(
    user_id: UserID,
    transaction_id: TransactionId,
    user_description: Option<&str>,
    connection: &Connection,
) -> Result<Option<String>, Error> {
    let user_description = user_description
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .map(str::to_owned);

    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET user_description = ?1
        WHERE id = ?2 AND account_id IN (
            SELECT a.id FROM account a INNER JOIN bank b ON b.id = a.bank_id WHERE b.user_id = ?3
        )",
        (&user_description, transaction_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(user_description)
}

/// Replace every allocation of one of `user_id`'s transactions with `allocations`.
///
/// The old allocations are deleted and the new ones inserted in one SQLite transaction, so
/// on error the transaction keeps the allocations it had.
///
/// # Errors
/// - [Error::Validation] if `allocations` is empty,
/// - [Error::DuplicateAllocation] if a category/subcategory pair appears twice,
/// - [Error::NotFound] if the transaction does not belong to the user,
/// - [Error::InvalidCategory] if a category is not one of the user's,
/// - [Error::InvalidSubcategory] if a subcategory does not belong to its category.
pub fn replace_allocations(
    user_id: UserID,
    transaction_id: TransactionId,
    allocations: &[NewAllocation],
    connection: &Connection,
) -> Result<(), Error> {
    if allocations.is_empty() {
        return Err(Error::Validation(INVALID_CATEGORIES_MSG.to_owned()));
    }

    let mut pairs = HashSet::new();
    if !allocations.iter().all(|allocation| pairs.insert(allocation.pair())) {
        return Err(Error::DuplicateAllocation);
    }

    if !transaction_exists(user_id, transaction_id, connection)? {
        return Err(Error::NotFound);
    }

    let categories = get_categories(user_id, connection)?;
    for allocation in allocations {
        check_category_pair(&categories, allocation.category_id, allocation.subcategory_id)?;
    }

    let transaction = connection.unchecked_transaction()?;
    transaction.execute(
        "DELETE FROM transaction_category WHERE transaction_id = ?1",
        [transaction_id],
    )?;
    insert_allocations(transaction_id, allocations, &transaction)?;
    transaction.commit()?;

    tracing::debug!(
        "Replaced allocations of transaction {transaction_id} with {} new ones",
        allocations.len()
    );

    Ok(())
}
