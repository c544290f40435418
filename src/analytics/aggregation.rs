//! Grouping of signed allocation amounts into income and expense buckets by period.

use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

/// The length of an aggregation bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// ISO weeks, keyed `YYYY-Www`.
    Week,
    /// Calendar months, keyed `YYYY-MM`.
    #[default]
    Month,
    /// Calendar years, keyed `YYYY`.
    Year,
}

impl Period {
    /// Parse a `period` query value. Anything unrecognised is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "year" => Some(Period::Year),
            _ => None,
        }
    }

    /// The bucket key for `date`.
    ///
    /// Keys are zero padded so sorting them as strings sorts them by time.
    pub fn key(&self, date: Date) -> String {
        match self {
            Period::Week => {
                let (year, week, _) = date.to_iso_week_date();
                format!("{year}-W{week:02}")
            }
            Period::Month => format!("{}-{:02}", date.year(), u8::from(date.month())),
            Period::Year => format!("{}", date.year()),
        }
    }
}

/// Income and expenses for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub period: String,
    /// The sum of non-negative amounts.
    pub income: f64,
    /// The sum of the absolute values of negative amounts.
    pub expenses: f64,
}

impl PeriodBucket {
    fn new(period: String) -> Self {
        Self {
            period,
            income: 0.0,
            expenses: 0.0,
        }
    }

    fn add(&mut self, amount: f64) {
        if amount >= 0.0 {
            self.income += amount;
        } else {
            self.expenses += amount.abs();
        }
    }
}

/// Group `(date, amount)` pairs into buckets of `period`, ordered by key.
///
/// Only periods with at least one amount get a bucket.
pub fn group_by_period(rows: &[(Date, f64)], period: Period) -> Vec<PeriodBucket> {
    let mut buckets: BTreeMap<String, PeriodBucket> = BTreeMap::new();

    for (date, amount) in rows {
        let key = period.key(*date);
        buckets
            .entry(key.clone())
            .or_insert_with(|| PeriodBucket::new(key))
            .add(*amount);
    }

    buckets.into_values().collect()
}

/// Income and expense totals over a set of amounts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_income: f64,
    pub total_expenses: f64,
    /// Income minus expenses.
    pub net_amount: f64,
}

impl Totals {
    pub fn from_amounts(amounts: impl IntoIterator<Item = f64>) -> Self {
        let mut bucket = PeriodBucket::new(String::new());
        amounts.into_iter().for_each(|amount| bucket.add(amount));

        Self {
            total_income: bucket.income,
            total_expenses: bucket.expenses,
            net_amount: bucket.income - bucket.expenses,
        }
    }
}
