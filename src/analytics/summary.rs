//! Database queries behind the analytics views.
//!
//! Every function here works on individual allocations, so a split transaction can count
//! towards income and expenses at the same time.

use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    analytics::aggregation::{Period, PeriodBucket, Totals, group_by_period},
    auth::UserID,
    category::{CategoryId, SubcategoryId},
    transaction::{ALLOCATION_FROM, FilterState, allocation_filter},
};

/// The amounts of `user_id`'s allocations matching `filter`, with their operation dates.
///
/// Allocations in `transfers_category` are left out.
pub fn get_dated_amounts(
    user_id: UserID,
    filter: &FilterState,
    transfers_category: &str,
    connection: &Connection,
) -> Result<Vec<(Date, f64)>, Error> {
    let sql = allocation_filter(user_id, filter, Some(transfers_category));
    let query = format!(
        "SELECT t.operation_date, tc.amount {ALLOCATION_FROM} {}",
        sql.where_clause()
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(sql.params()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Income and expenses by period for the analytics chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub period: Period,
    pub buckets: Vec<PeriodBucket>,
}

pub fn get_analytics(
    user_id: UserID,
    filter: &FilterState,
    period: Period,
    transfers_category: &str,
    connection: &Connection,
) -> Result<Analytics, Error> {
    let rows = get_dated_amounts(user_id, filter, transfers_category, connection)?;

    Ok(Analytics {
        period,
        buckets: group_by_period(&rows, period),
    })
}

pub fn get_totals(
    user_id: UserID,
    filter: &FilterState,
    transfers_category: &str,
    connection: &Connection,
) -> Result<Totals, Error> {
    let rows = get_dated_amounts(user_id, filter, transfers_category, connection)?;

    Ok(Totals::from_amounts(rows.into_iter().map(|(_, amount)| amount)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryTotal {
    pub id: SubcategoryId,
    pub name: String,
    pub amount: f64,
    pub transaction_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category_id: CategoryId,
    pub category_name: String,
    pub total_amount: f64,
    pub subcategories: Vec<SubcategoryTotal>,
}

/// Sum `user_id`'s matching allocations per category, with a breakdown per subcategory.
///
/// Categories without matching allocations are left out. Categories are ordered by name and
/// their subcategories by name.
pub fn get_category_totals(
    user_id: UserID,
    filter: &FilterState,
    connection: &Connection,
) -> Result<Vec<CategoryTotal>, Error> {
    let sql = allocation_filter(user_id, filter, None);
    let query = format!(
        "SELECT tc.category_id, c.name, tc.subcategory_id, s.name,
            SUM(tc.amount), COUNT(DISTINCT tc.transaction_id)
        {ALLOCATION_FROM}
        LEFT JOIN subcategory s ON s.id = tc.subcategory_id
        {}
        GROUP BY tc.category_id, tc.subcategory_id
        ORDER BY c.name, tc.category_id, s.name",
        sql.where_clause()
    );

    let rows = connection
        .prepare(&query)?
        .query_map(params_from_iter(sql.params()), |row| {
            let subcategory_id: Option<SubcategoryId> = row.get(2)?;
            let subcategory_name: Option<String> = row.get(3)?;

            Ok((
                row.get::<_, CategoryId>(0)?,
                row.get::<_, String>(1)?,
                subcategory_id.zip(subcategory_name),
                row.get::<_, f64>(4)?,
                row.get::<_, u64>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut totals: Vec<CategoryTotal> = Vec::new();

    for (category_id, category_name, subcategory, amount, transaction_count) in rows {
        if totals
            .last()
            .is_none_or(|total| total.category_id != category_id)
        {
            totals.push(CategoryTotal {
                category_id,
                category_name,
                total_amount: 0.0,
                subcategories: Vec::new(),
            });
        }
        let Some(total) = totals.last_mut() else {
            continue;
        };

        total.total_amount += amount;

        if let Some((id, name)) = subcategory {
            total.subcategories.push(SubcategoryTotal {
                id,
                name,
                amount,
                transaction_count,
            });
        }
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        analytics::aggregation::Period,
        app_state::FilterConfig,
        category::create_category,
        pagination::PaginationConfig,
        test_utils::{alloc, seed_account, seed_category, seed_transaction, seed_user, test_connection},
        transaction::FilterState,
    };

    use super::{get_analytics, get_category_totals, get_totals};

    const TRANSFERS: &str = "transfers ♻️";

    fn filter(raw: &str) -> FilterState {
        FilterState::from_urlencoded(raw, &FilterConfig::default(), &PaginationConfig::default())
    }

    #[test]
    fn analytics_groups_by_month_and_skips_transfers() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let account_id = seed_account(&connection, user_id);
        let (food, _) = seed_category(&connection, user_id, "Food");
        let transfers = create_category(user_id, TRANSFERS, &connection).unwrap().id;
        seed_transaction(&connection, account_id, date!(2024 - 01 - 15), "Shop", &[alloc(food, None, -50.0)]);
        seed_transaction(&connection, account_id, date!(2024 - 02 - 02), "Refund", &[alloc(food, None, 100.0)]);
        seed_transaction(&connection, account_id, date!(2024 - 02 - 03), "To savings", &[alloc(transfers, None, -500.0)]);

        let analytics = get_analytics(user_id, &filter(""), Period::Month, TRANSFERS, &connection).unwrap();

        assert_eq!(analytics.buckets.len(), 2);
        assert_eq!(analytics.buckets[0].period, "2024-01");
        assert_eq!(analytics.buckets[0].income, 0.0);
        assert_eq!(analytics.buckets[0].expenses, 50.0);
        assert_eq!(analytics.buckets[1].period, "2024-02");
        assert_eq!(analytics.buckets[1].income, 100.0);
        assert_eq!(analytics.buckets[1].expenses, 0.0);
    }

    #[test]
    fn filters_apply_to_each_allocation() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let account_id = seed_account(&connection, user_id);
        let (food, _) = seed_category(&connection, user_id, "Food");
        let (fun, _) = seed_category(&connection, user_id, "Fun");
        seed_transaction(
            &connection,
            account_id,
            date!(2024 - 03 - 01),
            "Split",
            &[alloc(food, None, -20.0), alloc(fun, None, -5.0)],
        );

        let totals = get_totals(
            user_id,
            &filter(&format!("categories.selected%5B%5D={food}&categories.isNegative=true")),
            TRANSFERS,
            &connection,
        )
        .unwrap();
        assert_eq!(totals.total_expenses, 5.0);

        let totals = get_totals(user_id, &filter("type=income"), TRANSFERS, &connection).unwrap();
        assert_eq!(totals.total_expenses, 0.0);
        assert_eq!(totals.total_income, 0.0);
    }

    #[test]
    fn category_totals_break_down_subcategories() {
        let connection = test_connection();
        let user_id = seed_user(&connection, "jo@example.com");
        let account_id = seed_account(&connection, user_id);
        let (food, general) = seed_category(&connection, user_id, "Food");
        let (rent, _) = seed_category(&connection, user_id, "Rent");
        seed_transaction(
            &connection,
            account_id,
            date!(2024 - 03 - 01),
            "Shop",
            &[alloc(food, Some(general), -20.0), alloc(food, None, -5.0)],
        );
        seed_transaction(&connection, account_id, date!(2024 - 03 - 02), "Shop", &[alloc(food, Some(general), -10.0)]);
        seed_transaction(&connection, account_id, date!(2024 - 03 - 03), "Landlord", &[alloc(rent, None, -400.0)]);

        let totals = get_category_totals(user_id, &filter("dateFrom=2024-03-01"), &connection).unwrap();

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].category_name, "Food");
        assert_eq!(totals[0].total_amount, -35.0);
        assert_eq!(totals[0].subcategories.len(), 1);
        assert_eq!(totals[0].subcategories[0].amount, -30.0);
        assert_eq!(totals[0].subcategories[0].transaction_count, 2);
        assert_eq!(totals[1].category_name, "Rent");
        assert!(totals[1].subcategories.is_empty());
    }
}
