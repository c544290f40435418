//! Income, expenses and per-category spending for a run of recent months or years.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;
use time::{Date, Month};

use crate::{
    Error,
    analytics::aggregation::Period,
    auth::UserID,
    category::CategoryId,
    transaction::ALLOCATION_FROM,
};

/// The largest number of periods one request may ask for.
pub const MAX_PERIOD_COUNT: i64 = 120;

pub const INVALID_PERIOD_MSG: &str = "Invalid period. Must be month or year.";
pub const INVALID_OFFSET_MSG: &str = "Invalid offset. Must be a non-negative number.";
pub const INVALID_COUNT_MSG: &str = "Invalid count. Must be a positive number.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAmount {
    pub category_id: CategoryId,
    pub category_name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialPeriod {
    pub period: String,
    pub income: f64,
    pub expenses: f64,
    /// Income minus expenses.
    pub net: f64,
    /// The summed amount per category, ordered by category name.
    pub categories: Vec<CategoryAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    pub chart_data: Vec<FinancialPeriod>,
}

/// Which periods to summarise, validated from raw query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancialRange {
    pub period: Period,
    /// How many periods before the current one the last summarised period is.
    pub offset: i64,
    pub count: i64,
}

impl FinancialRange {
    /// Parse `period`, `offset` and `count`, defaulting to the five months up to and
    /// including the current one.
    ///
    /// # Errors
    /// Returns [Error::Validation] if `period` is not `month` or `year`, `offset` is negative
    /// or not a number, or `count` is not a positive number within [MAX_PERIOD_COUNT].
    pub fn parse(
        period: Option<&str>,
        offset: Option<&str>,
        count: Option<&str>,
    ) -> Result<Self, Error> {
        let period = match period.map(Period::parse) {
            None => Period::Month,
            Some(Some(period @ (Period::Month | Period::Year))) => period,
            Some(_) => return Err(Error::Validation(INVALID_PERIOD_MSG.to_owned())),
        };

        let offset = match offset.map(|offset| offset.trim().parse::<i64>()) {
            None => 0,
            Some(Ok(offset)) if offset >= 0 => offset,
            Some(_) => return Err(Error::Validation(INVALID_OFFSET_MSG.to_owned())),
        };

        let count = match count.map(|count| count.trim().parse::<i64>()) {
            None => 5,
            Some(Ok(count)) if count > 0 && count <= MAX_PERIOD_COUNT => count,
            Some(Ok(count)) if count > MAX_PERIOD_COUNT => {
                return Err(Error::Validation(format!(
                    "Invalid count. Must be at most {MAX_PERIOD_COUNT}."
                )));
            }
            Some(_) => return Err(Error::Validation(INVALID_COUNT_MSG.to_owned())),
        };

        Ok(Self {
            period,
            offset,
            count,
        })
    }
}

/// The first day of the period `periods_back` periods before the one containing `today`.
///
/// A negative `periods_back` counts forwards.
fn period_start(period: Period, today: Date, periods_back: i64) -> Result<Date, Error> {
    let out_of_range = || Error::Validation(INVALID_OFFSET_MSG.to_owned());

    let (year, month) = match period {
        Period::Year => (
            i64::from(today.year())
                .checked_sub(periods_back)
                .ok_or_else(out_of_range)?,
            Month::January,
        ),
        _ => {
            let index = (i64::from(today.year()) * 12 + i64::from(u8::from(today.month())) - 1)
                .checked_sub(periods_back)
                .ok_or_else(out_of_range)?;
            let month = u8::try_from(index.rem_euclid(12) + 1).map_err(|_| out_of_range())?;

            (
                index.div_euclid(12),
                Month::try_from(month).map_err(|_| out_of_range())?,
            )
        }
    };

    let year = i32::try_from(year).map_err(|_| out_of_range())?;

    Date::from_calendar_date(year, month, 1).map_err(|_| out_of_range())
}

/// Summarise `user_id`'s allocations for `range.count` consecutive periods ending
/// `range.offset` periods before the one containing `today`, oldest first.
///
/// Periods without allocations are included with zeros. Allocations in
/// `transfers_category` are left out.
pub fn get_financial_data(
    user_id: UserID,
    range: FinancialRange,
    today: Date,
    transfers_category: &str,
    connection: &Connection,
) -> Result<FinancialData, Error> {
    let period = range.period;
    let oldest_back = range
        .offset
        .checked_add(range.count - 1)
        .ok_or_else(|| Error::Validation(INVALID_OFFSET_MSG.to_owned()))?;
    let first = period_start(period, today, oldest_back)?;
    let end = period_start(period, today, range.offset - 1)?;

    let mut periods: BTreeMap<String, (f64, f64, BTreeMap<CategoryId, CategoryAmount>)> =
        BTreeMap::new();
    for back in (range.offset..=oldest_back).rev() {
        let start = period_start(period, today, back)?;
        periods.insert(period.key(start), Default::default());
    }

    let rows = connection
        .prepare(&format!(
            "SELECT t.operation_date, tc.category_id, c.name, tc.amount {ALLOCATION_FROM}
            WHERE b.user_id = ?1 AND c.name <> ?2
                AND t.operation_date >= ?3 AND t.operation_date < ?4"
        ))?
        .query_map(
            (user_id.as_i64(), transfers_category, first, end),
            |row| {
                Ok((
                    row.get::<_, Date>(0)?,
                    row.get::<_, CategoryId>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    for (date, category_id, category_name, amount) in rows {
        let Some((income, expenses, categories)) = periods.get_mut(&period.key(date)) else {
            continue;
        };

        if amount >= 0.0 {
            *income += amount;
        } else {
            *expenses += amount.abs();
        }

        categories
            .entry(category_id)
            .or_insert_with(|| CategoryAmount {
                category_id,
                category_name,
                amount: 0.0,
            })
            .amount += amount;
    }

    let chart_data = periods
        .into_iter()
        .map(|(period, (income, expenses, categories))| {
            let mut categories: Vec<CategoryAmount> = categories.into_values().collect();
            categories.sort_by(|a, b| a.category_name.cmp(&b.category_name));

            FinancialPeriod {
                period,
                income,
                expenses,
                net: income - expenses,
                categories,
            }
        })
        .collect();

    Ok(FinancialData { chart_data })
}
