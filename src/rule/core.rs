//! The rule model and its database queries.

use rusqlite::{Connection, Row};
use serde::Serialize;

use crate::{
    Error,
    auth::UserID,
    category::{CategoryId, SubcategoryId, check_category_pair, get_categories},
};

pub type RuleId = i64;

pub const RULE_REQUIRED_FIELDS_MSG: &str = "Pattern and category are required";

/// Assigns a category, and optionally a subcategory, to transactions whose description
/// contains `pattern`. Matching ignores ASCII case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub id: RuleId,
    pub pattern: String,
    pub category_id: CategoryId,
    pub subcategory_id: Option<SubcategoryId>,
    /// The name of the category the rule assigns.
    pub category_name: String,
}

impl Rule {
    /// Whether `description` contains the rule's pattern, ignoring ASCII case.
    pub fn matches(&self, description: &str) -> bool {
        description
            .to_ascii_lowercase()
            .contains(&self.pattern.to_ascii_lowercase())
    }
}

pub fn create_rule_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS rule (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            pattern TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            subcategory_id INTEGER,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(subcategory_id) REFERENCES subcategory(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_rule_user_id ON rule(user_id)",
        (),
    )?;

    Ok(())
}

/// Trim `pattern` and check the category pair belongs to `user_id`.
fn validate_rule(
    user_id: UserID,
    pattern: &str,
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
    connection: &Connection,
) -> Result<String, Error> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(Error::Validation(RULE_REQUIRED_FIELDS_MSG.to_owned()));
    }

    let categories = get_categories(user_id, connection)?;
    check_category_pair(&categories, category_id, subcategory_id)?;

    Ok(pattern.to_owned())
}

/// Create a rule for `user_id`.
///
/// # Errors
/// Returns [Error::Validation] for a blank pattern, [Error::InvalidCategory] or
/// [Error::InvalidSubcategory] if the category pair is not one of the user's, or an SQL error.
pub fn create_rule(
    user_id: UserID,
    pattern: &str,
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
    connection: &Connection,
) -> Result<Rule, Error> {
    let pattern = validate_rule(user_id, pattern, category_id, subcategory_id, connection)?;

    connection.execute(
        "INSERT INTO rule (user_id, pattern, category_id, subcategory_id) VALUES (?1, ?2, ?3, ?4)",
        (user_id.as_i64(), &pattern, category_id, subcategory_id),
    )?;

    get_rule(user_id, connection.last_insert_rowid(), connection)
}

const SELECT_RULE: &str = "SELECT r.id, r.pattern, r.category_id, r.subcategory_id, c.name
    FROM rule r INNER JOIN category c ON c.id = r.category_id";

/// Get one of `user_id`'s rules.
///
/// # Errors
/// Returns [Error::NotFound] if the rule does not belong to the user.
pub fn get_rule(user_id: UserID, rule_id: RuleId, connection: &Connection) -> Result<Rule, Error> {
    connection
        .prepare(&format!("{SELECT_RULE} WHERE r.id = ?1 AND r.user_id = ?2"))?
        .query_row((rule_id, user_id.as_i64()), map_rule_row)
        .map_err(Error::from)
}

/// Get all of `user_id`'s rules ordered by pattern.
pub fn get_rules(user_id: UserID, connection: &Connection) -> Result<Vec<Rule>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_RULE} WHERE r.user_id = ?1 ORDER BY r.pattern COLLATE NOCASE, r.id"
        ))?
        .query_map([user_id.as_i64()], map_rule_row)?
        .map(|maybe_rule| maybe_rule.map_err(Error::from))
        .collect()
}

/// Get `user_id`'s rules whose pattern occurs in `description`.
pub fn get_matching_rules(
    user_id: UserID,
    description: &str,
    connection: &Connection,
) -> Result<Vec<Rule>, Error> {
    Ok(get_rules(user_id, connection)?
        .into_iter()
        .filter(|rule| rule.matches(description))
        .collect())
}

/// Change the pattern and category pair of one of `user_id`'s rules.
///
/// # Errors
/// Returns [Error::UpdateMissingRule] if the rule does not belong to the user, or the
/// validation errors of [create_rule].
pub fn update_rule(
    user_id: UserID,
    rule_id: RuleId,
    pattern: &str,
    category_id: CategoryId,
    subcategory_id: Option<SubcategoryId>,
    connection: &Connection,
) -> Result<Rule, Error> {
    let pattern = validate_rule(user_id, pattern, category_id, subcategory_id, connection)?;

    let rows_affected = connection.execute(
        "UPDATE rule SET pattern = ?1, category_id = ?2, subcategory_id = ?3
        WHERE id = ?4 AND user_id = ?5",
        (&pattern, category_id, subcategory_id, rule_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingRule);
    }

    get_rule(user_id, rule_id, connection)
}

/// Delete one of `user_id`'s rules.
///
/// # Errors
/// Returns [Error::DeleteMissingRule] if the rule does not belong to the user.
pub fn delete_rule(user_id: UserID, rule_id: RuleId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM rule WHERE id = ?1 AND user_id = ?2",
        (rule_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRule);
    }

    Ok(())
}

fn map_rule_row(row: &Row) -> Result<Rule, rusqlite::Error> {
    Ok(Rule {
        id: row.get(0)?,
        pattern: row.get(1)?,
        category_id: row.get(2)?,
        subcategory_id: row.get(3)?,
        category_name: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        category::{create_category, delete_subcategory},
        test_utils::{seed_category, seed_user, test_connection},
    };

    use super::{
        create_rule, delete_rule, get_matching_rules, get_rule, get_rules, update_rule,
    };

    #[test]
    fn create_rule_trims_pattern_and_names_category() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let (food, groceries) = seed_category(&connection, user_id, "Food");

        let rule = create_rule(user_id, "  countdown ", food, Some(groceries), &connection).unwrap();

        assert!(rule.id > 0);
        assert_eq!(rule.pattern, "countdown");
        assert_eq!(rule.category_name, "Food");
        assert_eq!(rule.subcategory_id, Some(groceries));
        assert_eq!(get_rule(user_id, rule.id, &connection), Ok(rule));
    }

    #[test]
    fn create_rule_requires_pattern() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let (food, _) = seed_category(&connection, user_id, "Food");

        assert_eq!(
            create_rule(user_id, "   ", food, None, &connection),
            Err(Error::Validation("Pattern and category are required".to_owned()))
        );
    }

    #[test]
    fn create_rule_rejects_foreign_category_pair() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let other = seed_user(&connection, "sam@example.com");
        let (food, groceries) = seed_category(&connection, user_id, "Food");
        let travel = create_category(user_id, "Travel", &connection).unwrap().id;

        assert_eq!(
            create_rule(other, "bus", food, None, &connection),
            Err(Error::InvalidCategory(food))
        );
        assert_eq!(
            create_rule(user_id, "bus", travel, Some(groceries), &connection),
            Err(Error::InvalidSubcategory {
                category_id: travel,
                subcategory_id: groceries
            })
        );
    }

    #[test]
    fn rules_are_listed_by_pattern_per_user() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let other = seed_user(&connection, "sam@example.com");
        let (food, _) = seed_category(&connection, user_id, "Food");
        let (other_food, _) = seed_category(&connection, other, "Food");
        create_rule(user_id, "Zoo", food, None, &connection).unwrap();
        create_rule(user_id, "apple", food, None, &connection).unwrap();
        create_rule(other, "bakery", other_food, None, &connection).unwrap();

        let patterns: Vec<String> = get_rules(user_id, &connection)
            .unwrap()
            .into_iter()
            .map(|rule| rule.pattern)
            .collect();

        assert_eq!(patterns, ["apple", "Zoo"]);
    }

    #[test]
    fn matching_rules_ignore_case() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let (food, _) = seed_category(&connection, user_id, "Food");
        let prime = create_rule(user_id, "amazon prime", food, None, &connection).unwrap();
        create_rule(user_id, "netflix", food, None, &connection).unwrap();

        let got = get_matching_rules(user_id, "AMAZON PRIME*2K4", &connection).unwrap();

        assert_eq!(got, [prime]);
    }

    #[test]
    fn update_and_delete_rule() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let (food, groceries) = seed_category(&connection, user_id, "Food");
        let rule = create_rule(user_id, "shop", food, None, &connection).unwrap();

        let updated =
            update_rule(user_id, rule.id, "supermarket", food, Some(groceries), &connection).unwrap();
        assert_eq!(updated.pattern, "supermarket");
        assert_eq!(updated.subcategory_id, Some(groceries));

        delete_rule(user_id, rule.id, &connection).unwrap();
        assert_eq!(get_rule(user_id, rule.id, &connection), Err(Error::NotFound));
        assert_eq!(
            delete_rule(user_id, rule.id, &connection),
            Err(Error::DeleteMissingRule)
        );
        assert_eq!(
            update_rule(user_id, rule.id, "x", food, None, &connection),
            Err(Error::UpdateMissingRule)
        );
    }

    #[test]
    fn deleting_subcategory_removes_its_rules() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let (food, groceries) = seed_category(&connection, user_id, "Food");
        create_rule(user_id, "shop", food, Some(groceries), &connection).unwrap();

        delete_subcategory(user_id, groceries, &connection).unwrap();

        assert!(get_rules(user_id, &connection).unwrap().is_empty());
    }
}
