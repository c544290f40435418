use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::{Error, auth::UserID};

pub type CategoryId = i64;
pub type SubcategoryId = i64;

/// A subcategory, always owned by exactly one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub category_id: CategoryId,
    pub name: String,
}

/// A category with its subcategories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub subcategories: Vec<Subcategory>,
}

impl Category {
    /// Whether `subcategory_id` belongs to this category.
    pub fn has_subcategory(&self, subcategory_id: SubcategoryId) -> bool {
        self.subcategories
            .iter()
            .any(|subcategory| subcategory.id == subcategory_id)
    }
}

/// Check that `category_id` is one of `categories` and that `subcategory_id`, when given,
/// belongs to it.
pub(crate) fn check_category_pair(
    categories: &[Category],
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
) -> Result<(), Error> {
    let category = categories
        .iter()
        .find(|category| category.id == category_id)
        .ok_or(Error::InvalidCategory(category_id))?;

    match subcategory_id {
        Some(subcategory_id) if !category.has_subcategory(subcategory_id) => {
            Err(Error::InvalidSubcategory {
                category_id,
                subcategory_id,
            })
        }
        _ => Ok(()),
    }
}

pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            UNIQUE(user_id, name)
        )",
        (),
    )?;

    Ok(())
}

pub fn create_subcategory_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS subcategory (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES category(id),
            UNIQUE(category_id, name)
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_subcategory_category_id ON subcategory(category_id)",
        (),
    )?;

    Ok(())
}

fn validate_name(name: &str) -> Result<String, Error> {
    let name = name.trim();

    if name.is_empty() {
        Err(Error::EmptyCategoryName)
    } else {
        Ok(name.to_owned())
    }
}

/// Create a category for `user_id`.
///
/// # Errors
/// Returns [Error::EmptyCategoryName] for a blank name or [Error::DuplicateCategoryName] if
/// the user already has a category called `name`.
pub fn create_category(
    user_id: UserID,
    name: &str,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = validate_name(name)?;

    connection.execute(
        "INSERT INTO category (user_id, name) VALUES (?1, ?2)",
        (user_id.as_i64(), &name),
    )?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        name,
        subcategories: Vec::new(),
    })
}

/// Create a subcategory under one of `user_id`'s categories.
///
/// # Errors
/// Returns [Error::NotFound] if the category does not belong to the user,
/// [Error::EmptyCategoryName] for a blank name or [Error::DuplicateSubcategoryName].
pub fn create_subcategory(
    user_id: UserID,
    category_id: CategoryId,
    name: &str,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    let name = validate_name(name)?;

    if !category_exists(user_id, category_id, connection)? {
        return Err(Error::NotFound);
    }

    connection.execute(
        "INSERT INTO subcategory (category_id, name) VALUES (?1, ?2)",
        (category_id, &name),
    )?;

    Ok(Subcategory {
        id: connection.last_insert_rowid(),
        category_id,
        name,
    })
}

/// Get `user_id`'s categories with their subcategories, both ordered by name.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    let mut categories: Vec<Category> = connection
        .prepare("SELECT id, name FROM category WHERE user_id = ?1 ORDER BY name, id")?
        .query_map([user_id.as_i64()], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                subcategories: Vec::new(),
            })
        })?
        .collect::<Result<_, _>>()?;

    let subcategories = connection
        .prepare(
            "SELECT s.id, s.category_id, s.name
            FROM subcategory s
            INNER JOIN category c ON c.id = s.category_id
            WHERE c.user_id = ?1
            ORDER BY s.name, s.id",
        )?
        .query_map([user_id.as_i64()], map_subcategory_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for subcategory in subcategories {
        if let Some(category) = categories
            .iter_mut()
            .find(|category| category.id == subcategory.category_id)
        {
            category.subcategories.push(subcategory);
        }
    }

    Ok(categories)
}

pub(crate) fn category_exists(
    user_id: UserID,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT 1 FROM category WHERE id = ?1 AND user_id = ?2",
            (category_id, user_id.as_i64()),
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(Error::from)
}

/// Rename one of `user_id`'s categories.
///
/// # Errors
/// Returns [Error::UpdateMissingCategory] if the category does not belong to the user.
pub fn update_category(
    user_id: UserID,
    category_id: CategoryId,
    name: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let name = validate_name(name)?;

    let rows_affected = connection.execute(
        "UPDATE category SET name = ?1 WHERE id = ?2 AND user_id = ?3",
        (&name, category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    Ok(())
}

/// Delete one of `user_id`'s categories.
///
/// Rules that point at the category are deleted with it.
///
/// # Errors
/// Returns [Error::DeleteMissingCategory] if the category does not belong to the user,
/// [Error::CategoryHasSubcategories] if it still has subcategories and
/// [Error::CategoryInUse] if a transaction allocation references it.
pub fn delete_category(
    user_id: UserID,
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    if !category_exists(user_id, category_id, &transaction)? {
        return Err(Error::DeleteMissingCategory);
    }

    let subcategory_count: i64 = transaction.query_row(
        "SELECT COUNT(*) FROM subcategory WHERE category_id = ?1",
        [category_id],
        |row| row.get(0),
    )?;
    if subcategory_count > 0 {
        return Err(Error::CategoryHasSubcategories);
    }

    let in_use: bool = transaction.query_row(
        "SELECT EXISTS (SELECT 1 FROM transaction_category WHERE category_id = ?1)",
        [category_id],
        |row| row.get(0),
    )?;
    if in_use {
        return Err(Error::CategoryInUse);
    }

    transaction.execute("DELETE FROM category WHERE id = ?1", [category_id])?;
    transaction.commit()?;

    Ok(())
}

/// Get one of `user_id`'s subcategories.
///
/// # Errors
/// Returns [Error::NotFound] if the subcategory does not belong to the user.
pub fn get_subcategory(
    user_id: UserID,
    subcategory_id: SubcategoryId,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    connection
        .query_row(
            "SELECT s.id, s.category_id, s.name
            FROM subcategory s
            INNER JOIN category c ON c.id = s.category_id
            WHERE s.id = ?1 AND c.user_id = ?2",
            (subcategory_id, user_id.as_i64()),
            map_subcategory_row,
        )
        .map_err(Error::from)
}

/// Rename one of `user_id`'s subcategories.
///
/// # Errors
/// Returns [Error::UpdateMissingSubcategory] if the subcategory does not belong to the user.
pub fn update_subcategory(
    user_id: UserID,
    subcategory_id: SubcategoryId,
    name: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let name = validate_name(name)?;

    let rows_affected = connection.execute(
        "UPDATE subcategory SET name = ?1
        WHERE id = ?2
          AND category_id IN (SELECT id FROM category WHERE user_id = ?3)",
        (&name, subcategory_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingSubcategory);
    }

    Ok(())
}

/// Delete one of `user_id`'s subcategories.
///
/// # Errors
/// Returns [Error::DeleteMissingSubcategory] if the subcategory does not belong to the user
/// and [Error::SubcategoryInUse] if a transaction allocation references it.
pub fn delete_subcategory(
    user_id: UserID,
    subcategory_id: SubcategoryId,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    match get_subcategory(user_id, subcategory_id, &transaction) {
        Ok(_) => {}
        Err(Error::NotFound) => return Err(Error::DeleteMissingSubcategory),
        Err(error) => return Err(error),
    }

    let in_use: bool = transaction.query_row(
        "SELECT EXISTS (SELECT 1 FROM transaction_category WHERE subcategory_id = ?1)",
        [subcategory_id],
        |row| row.get(0),
    )?;
    if in_use {
        return Err(Error::SubcategoryInUse);
    }

    transaction.execute("DELETE FROM subcategory WHERE id = ?1", [subcategory_id])?;
    transaction.commit()?;

    Ok(())
}

fn map_subcategory_row(row: &Row) -> Result<Subcategory, rusqlite::Error> {
    Ok(Subcategory {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Error,
        test_utils::{alloc, seed_account, seed_transaction, seed_user, test_connection},
    };

    use super::{
        create_category, create_subcategory, delete_category, delete_subcategory,
        get_categories, update_category, update_subcategory,
    };

    #[test]
    fn categories_are_listed_by_name_with_subcategories() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let other_user = seed_user(&connection, "sam@example.com");
        let transport = create_category(user_id, "Transport", &connection).unwrap();
        let food = create_category(user_id, " Food ", &connection).unwrap();
        create_category(other_user, "Hidden", &connection).unwrap();
        create_subcategory(user_id, food.id, "Takeaways", &connection).unwrap();
        create_subcategory(user_id, food.id, "Groceries", &connection).unwrap();

        let categories = get_categories(user_id, &connection).unwrap();

        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Food", "Transport"]);
        let subcategory_names: Vec<_> = categories[0]
            .subcategories
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(subcategory_names, ["Groceries", "Takeaways"]);
        assert!(categories[1].subcategories.is_empty());
        assert_eq!(categories[1].id, transport.id);
    }

    #[test]
    fn blank_name_is_rejected() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");

        assert_eq!(
            create_category(user_id, "   ", &connection),
            Err(Error::EmptyCategoryName)
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let food = create_category(user_id, "Food", &connection).unwrap();
        create_subcategory(user_id, food.id, "Groceries", &connection).unwrap();

        assert_eq!(
            create_category(user_id, "Food", &connection),
            Err(Error::DuplicateCategoryName)
        );
        assert_eq!(
            create_subcategory(user_id, food.id, "Groceries", &connection),
            Err(Error::DuplicateSubcategoryName)
        );
    }

    #[test]
    fn subcategory_needs_own_category() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let other_user = seed_user(&connection, "sam@example.com");
        let theirs = create_category(other_user, "Theirs", &connection).unwrap();

        assert_eq!(
            create_subcategory(user_id, theirs.id, "Mine now", &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn category_with_subcategory_cannot_be_deleted() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let food = create_category(user_id, "Food", &connection).unwrap();
        create_subcategory(user_id, food.id, "Groceries", &connection).unwrap();

        let result = delete_category(user_id, food.id, &connection);

        assert_eq!(result, Err(Error::CategoryHasSubcategories));
        assert_eq!(get_categories(user_id, &connection).unwrap().len(), 1);
    }

    #[test]
    fn category_in_use_cannot_be_deleted() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let account_id = seed_account(&connection, user_id);
        let food = create_category(user_id, "Food", &connection).unwrap();
        seed_transaction(
            &connection,
            account_id,
            date!(2024 - 05 - 01),
            "Bakery",
            &[alloc(food.id, None, -8.5)],
        );

        assert_eq!(
            delete_category(user_id, food.id, &connection),
            Err(Error::CategoryInUse)
        );
    }

    #[test]
    fn unused_category_is_deleted() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let food = create_category(user_id, "Food", &connection).unwrap();

        delete_category(user_id, food.id, &connection).unwrap();

        assert!(get_categories(user_id, &connection).unwrap().is_empty());
        assert_eq!(
            delete_category(user_id, food.id, &connection),
            Err(Error::DeleteMissingCategory)
        );
    }

    #[test]
    fn subcategory_in_use_cannot_be_deleted() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let account_id = seed_account(&connection, user_id);
        let food = create_category(user_id, "Food", &connection).unwrap();
        let groceries = create_subcategory(user_id, food.id, "Groceries", &connection).unwrap();
        seed_transaction(
            &connection,
            account_id,
            date!(2024 - 05 - 01),
            "Supermarket",
            &[alloc(food.id, Some(groceries.id), -80.0)],
        );

        assert_eq!(
            delete_subcategory(user_id, groceries.id, &connection),
            Err(Error::SubcategoryInUse)
        );
    }

    #[test]
    fn rename_is_scoped_to_owner() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let other_user = seed_user(&connection, "sam@example.com");
        let food = create_category(user_id, "Food", &connection).unwrap();
        let groceries = create_subcategory(user_id, food.id, "Groceries", &connection).unwrap();

        assert_eq!(
            update_category(other_user, food.id, "Mine", &connection),
            Err(Error::UpdateMissingCategory)
        );
        assert_eq!(
            update_subcategory(other_user, groceries.id, "Mine", &connection),
            Err(Error::UpdateMissingSubcategory)
        );

        update_category(user_id, food.id, "Eating", &connection).unwrap();
        update_subcategory(user_id, groceries.id, "Supermarket", &connection).unwrap();
        let categories = get_categories(user_id, &connection).unwrap();
        assert_eq!(categories[0].name, "Eating");
        assert_eq!(categories[0].subcategories[0].name, "Supermarket");
    }
}
