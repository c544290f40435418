//! Database fixtures shared by unit and handler tests.

use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::Connection;
use time::Date;

use crate::{
    PasswordHash, Transaction, UserID, ValidatedPassword,
    auth::create_user,
    bank::{AccountId, AccountType, create_account, create_bank},
    category::{CategoryId, SubcategoryId, create_category, create_subcategory},
    db::initialize,
    transaction::{NewAllocation, TransactionId, create_transaction},
};

/// The password of every seeded user.
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

static NEXT_EXTERNAL_ID: AtomicU64 = AtomicU64::new(1);

#[track_caller]
pub(crate) fn test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");
    initialize(&connection).expect("Could not initialize database");
    connection
}

/// Create a user whose password is [TEST_PASSWORD], hashed with the lowest bcrypt cost.
#[track_caller]
pub(crate) fn seed_user(connection: &Connection, email: &str) -> UserID {
    let password_hash = PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4)
        .expect("Could not hash password");

    create_user(email, password_hash, connection)
        .expect("Could not create user")
        .id
}

/// Create a bank named "Test Bank" with one bank account for `user_id`.
#[track_caller]
pub(crate) fn seed_account(connection: &Connection, user_id: UserID) -> AccountId {
    let bank = create_bank(user_id, "Test Bank", connection).expect("Could not create bank");

    create_account(bank.id, AccountType::BankAccount, "12-3456-7890123-00", connection)
        .expect("Could not create account")
}

/// Create a category called `name` with a single subcategory called "General".
#[track_caller]
pub(crate) fn seed_category(
    connection: &Connection,
    user_id: UserID,
    name: &str,
) -> (CategoryId, SubcategoryId) {
    let category = create_category(user_id, name, connection).expect("Could not create category");
    let subcategory = create_subcategory(user_id, category.id, "General", connection)
        .expect("Could not create subcategory");

    (category.id, subcategory.id)
}

#[track_caller]
pub(crate) fn seed_transaction(
    connection: &Connection,
    account_id: AccountId,
    operation_date: Date,
    description: &str,
    allocations: &[NewAllocation],
) -> TransactionId {
    let external_id = format!("seed-{}", NEXT_EXTERNAL_ID.fetch_add(1, Ordering::Relaxed));
    let mut builder = Transaction::build(&external_id, account_id, operation_date, description);
    builder.allocations = allocations.to_vec();

    create_transaction(builder, connection).expect("Could not create transaction")
}

pub(crate) fn alloc(
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
    amount: f64,
) -> NewAllocation {
    NewAllocation::new(category_id, subcategory_id, amount)
}
