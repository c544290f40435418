//! How many transactions use each category and subcategory.

use axum::{Extension, extract::State};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error,
    api_response::ApiSuccess,
    auth::UserID,
    category::{CategoryId, CategoryState, SubcategoryId},
    db::lock_connection,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryCount {
    pub id: SubcategoryId,
    pub name: String,
    pub transaction_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub id: CategoryId,
    pub name: String,
    pub transaction_count: u64,
    pub subcategories: Vec<SubcategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCounts {
    pub categories: Vec<CategoryCount>,
}

/// Count the distinct transactions allocated to each of `user_id`'s categories and
/// subcategories. Unused categories and subcategories are listed with a count of zero.
pub fn get_category_transaction_counts(
    user_id: UserID,
    connection: &Connection,
) -> Result<CategoryCounts, Error> {
    let mut categories: Vec<CategoryCount> = connection
        .prepare(
            "SELECT c.id, c.name, COUNT(DISTINCT tc.transaction_id)
            FROM category c
            LEFT JOIN transaction_category tc ON tc.category_id = c.id
            WHERE c.user_id = ?1
            GROUP BY c.id
            ORDER BY c.name, c.id",
        )?
        .query_map([user_id.as_i64()], |row| {
            Ok(CategoryCount {
                id: row.get(0)?,
                name: row.get(1)?,
                transaction_count: row.get(2)?,
                subcategories: Vec::new(),
            })
        })?
        .collect::<Result<_, _>>()?;

    let subcategories = connection
        .prepare(
            "SELECT s.category_id, s.id, s.name, COUNT(DISTINCT tc.transaction_id)
            FROM subcategory s
            INNER JOIN category c ON c.id = s.category_id
            LEFT JOIN transaction_category tc ON tc.subcategory_id = s.id
            WHERE c.user_id = ?1
            GROUP BY s.id
            ORDER BY s.name, s.id",
        )?
        .query_map([user_id.as_i64()], |row| {
            let category_id: CategoryId = row.get(0)?;
            let count = SubcategoryCount {
                id: row.get(1)?,
                name: row.get(2)?,
                transaction_count: row.get(3)?,
            };

            Ok((category_id, count))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (category_id, count) in subcategories {
        if let Some(category) = categories
            .iter_mut()
            .find(|category| category.id == category_id)
        {
            category.subcategories.push(count);
        }
    }

    Ok(CategoryCounts { categories })
}

/// A route handler for `GET /api/category-transaction-counts`.
pub async fn get_category_transaction_counts_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiSuccess<CategoryCounts>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_category_transaction_counts(user_id, &connection).map(ApiSuccess)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        category::{create_category, create_subcategory},
        test_utils::{alloc, seed_account, seed_transaction, seed_user, test_connection},
    };

    use super::get_category_transaction_counts;

    #[test]
    fn counts_distinct_transactions() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let account_id = seed_account(&connection, user_id);
        let food = create_category(user_id, "Food", &connection).unwrap();
        let travel = create_category(user_id, "Travel", &connection).unwrap();
        let groceries = create_subcategory(user_id, food.id, "Groceries", &connection).unwrap();
        create_subcategory(user_id, food.id, "Takeaways", &connection).unwrap();

        seed_transaction(
            &connection,
            account_id,
            date!(2024 - 02 - 01),
            "Supermarket",
            &[
                alloc(food.id, Some(groceries.id), -50.0),
                alloc(food.id, None, -5.0),
            ],
        );
        seed_transaction(
            &connection,
            account_id,
            date!(2024 - 02 - 02),
            "Cafe",
            &[alloc(food.id, None, -4.5)],
        );

        let counts = get_category_transaction_counts(user_id, &connection).unwrap();

        let food_count = &counts.categories[0];
        assert_eq!(food_count.name, "Food");
        assert_eq!(food_count.transaction_count, 2);
        assert_eq!(food_count.subcategories[0].name, "Groceries");
        assert_eq!(food_count.subcategories[0].transaction_count, 1);
        assert_eq!(food_count.subcategories[1].transaction_count, 0);
        assert_eq!(counts.categories[1].id, travel.id);
        assert_eq!(counts.categories[1].transaction_count, 0);
    }
}
