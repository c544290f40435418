use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;
use time::{Date, Duration, OffsetDateTime};

use tallybook::{
    AccountType, PasswordHash, Transaction, ValidatedPassword, create_account, create_bank,
    create_category, create_rule, create_subcategory, create_transaction, create_user,
    initialize_db,
};

/// A utility for creating a demo database for the tallybook server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

const DEMO_EMAIL: &str = "test@example.com";
const DEMO_PASSWORD: &str = "test";

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    if output_path
        .extension()
        .is_none_or(|extension| extension.is_empty())
    {
        eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
        exit(1);
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let connection = Connection::open(output_path)?;
    initialize_db(&connection)?;

    println!("Creating user {DEMO_EMAIL} with password \"{DEMO_PASSWORD}\"...");
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(DEMO_PASSWORD),
        PasswordHash::DEFAULT_COST,
    )?;
    let user = create_user(DEMO_EMAIL, password_hash, &connection)?;

    println!("Creating banks and accounts...");
    let bank = create_bank(user.id, "Demo Bank", &connection)?;
    let everyday = create_account(bank.id, AccountType::BankAccount, "12-3456-0001", &connection)?;
    let card = create_account(bank.id, AccountType::VirtualCard, "4111-0002", &connection)?;
    let savings_bank = create_bank(user.id, "Savings Co", &connection)?;
    let savings =
        create_account(savings_bank.id, AccountType::BankAccount, "38-9000-0003", &connection)?;

    println!("Creating categories and rules...");
    let income = create_category(user.id, "Income", &connection)?;
    let salary = create_subcategory(user.id, income.id, "Salary", &connection)?;
    let food = create_category(user.id, "Food", &connection)?;
    let groceries = create_subcategory(user.id, food.id, "Groceries", &connection)?;
    let takeaways = create_subcategory(user.id, food.id, "Takeaways", &connection)?;
    let home = create_category(user.id, "Home", &connection)?;
    let rent = create_subcategory(user.id, home.id, "Rent", &connection)?;
    let fun = create_category(user.id, "Entertainment", &connection)?;
    let transfers = create_category(user.id, "transfers ♻️", &connection)?;

    create_rule(user.id, "countdown", food.id, Some(groceries.id), &connection)?;
    create_rule(user.id, "uber eats", food.id, Some(takeaways.id), &connection)?;
    create_rule(user.id, "netflix", fun.id, None, &connection)?;

    println!("Creating transactions...");
    let today = OffsetDateTime::now_utc().date();
    let mut count = 0;

    for months_back in 0..6_i64 {
        let date = |day_offset: i64| -> Date { today - Duration::days(months_back * 30 + day_offset) };
        let prefix = format!("demo-{months_back}");

        let transactions = [
            Transaction::build(&format!("{prefix}-salary"), everyday, date(1), "ACME LTD SALARY")
                .allocation(income.id, Some(salary.id), 4200.0),
            Transaction::build(&format!("{prefix}-rent"), everyday, date(2), "AP RENT FLAT 2")
                .allocation(home.id, Some(rent.id), -1800.0),
            Transaction::build(&format!("{prefix}-grocer"), card, date(5), "COUNTDOWN KILBIRNIE")
                .allocation(food.id, Some(groceries.id), -164.35),
            Transaction::build(&format!("{prefix}-split"), card, date(9), "WAREHOUSE WELLINGTON")
                .user_description("Groceries and a board game")
                .allocation(food.id, Some(groceries.id), -42.0)
                .allocation(fun.id, None, -59.99),
            Transaction::build(&format!("{prefix}-netflix"), card, date(12), "NETFLIX.COM")
                .allocation(fun.id, None, -22.99),
            Transaction::build(&format!("{prefix}-out"), everyday, date(3), "TRANSFER TO SAVINGS")
                .allocation(transfers.id, None, -500.0),
            Transaction::build(&format!("{prefix}-in"), savings, date(3), "TRANSFER FROM EVERYDAY")
                .allocation(transfers.id, None, 500.0),
        ];

        for transaction in transactions {
            create_transaction(transaction, &connection)?;
            count += 1;
        }
    }

    println!("Created {count} transactions. Log in as {DEMO_EMAIL} to try it out.");

    Ok(())
}
