//! Translates a [FilterState] into SQL for counting, ordering and paging transactions.

use std::{collections::HashMap, time::Instant};

use rusqlite::{Connection, ToSql, params_from_iter};
use serde::Serialize;

use crate::{
    Error,
    auth::UserID,
    pagination::PageInfo,
    transaction::{
        Transaction, TransactionId,
        core::{TRANSACTION_FROM, load_transactions},
        filter::{FilterState, SortColumn, SortDirection, TypeFilter},
    },
};

/// Above this many allocation rows an amount sort is logged as expensive.
const AMOUNT_SORT_WARN_ROWS: usize = 5000;

/// The joins for queries that work on individual allocations rather than whole transactions.
pub(crate) const ALLOCATION_FROM: &str = "FROM transaction_category tc \
    INNER JOIN category c ON c.id = tc.category_id \
    INNER JOIN \"transaction\" t ON t.id = tc.transaction_id \
    INNER JOIN account a ON a.id = t.account_id \
    INNER JOIN bank b ON b.id = a.bank_id";

/// A list of SQL conditions joined with `AND` and their positional parameters.
#[derive(Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl SqlFilter {
    fn push(&mut self, clause: impl Into<String>, params: Vec<Box<dyn ToSql>>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    pub(crate) fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.params.iter().map(|param| param.as_ref())
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn param(value: impl ToSql + 'static) -> Box<dyn ToSql> {
    Box::new(value)
}

fn id_params(ids: &[i64]) -> Vec<Box<dyn ToSql>> {
    ids.iter().map(|id| param(*id)).collect()
}

/// Escape `term` for use inside a `LIKE ... ESCAPE '\'` pattern and wrap it in wildcards.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');

    for char in term.chars() {
        if matches!(char, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(char);
    }

    pattern.push('%');
    pattern
}

fn push_date_range(sql: &mut SqlFilter, filter: &FilterState) {
    sql.push(
        "t.operation_date >= ?",
        vec![param(filter.date_range.from)],
    );

    if let Some(to) = filter.date_range.to {
        sql.push("t.operation_date <= ?", vec![param(to)]);
    }
}

fn push_search(sql: &mut SqlFilter, filter: &FilterState) {
    if filter.search.value.is_empty() {
        return;
    }

    let pattern = like_pattern(&filter.search.value);
    let matches = "(t.description LIKE ? ESCAPE '\\' \
        OR COALESCE(t.user_description, '') LIKE ? ESCAPE '\\')";
    let clause = if filter.search.is_negative {
        format!("NOT {matches}")
    } else {
        matches.to_owned()
    };

    sql.push(clause, vec![param(pattern.clone()), param(pattern)]);
}

/// Conditions selecting `user_id`'s transactions that match `filter`.
///
/// Conditions on allocations are existence checks so that a negated category selection
/// keeps a transaction only when none of its allocations use a selected category.
pub(crate) fn transaction_filter(user_id: UserID, filter: &FilterState) -> SqlFilter {
    let mut sql = SqlFilter::default();
    sql.push("b.user_id = ?", vec![param(user_id.as_i64())]);

    push_date_range(&mut sql, filter);

    match filter.type_filter {
        TypeFilter::All => {}
        TypeFilter::Income => sql.push(
            "EXISTS (SELECT 1 FROM transaction_category tc \
                WHERE tc.transaction_id = t.id AND tc.amount >= 0.01)",
            Vec::new(),
        ),
        TypeFilter::Expense => sql.push(
            "EXISTS (SELECT 1 FROM transaction_category tc \
                WHERE tc.transaction_id = t.id AND tc.amount < 0)",
            Vec::new(),
        ),
    }

    let categories = &filter.categories.selected;
    if !categories.is_empty() {
        let exists = if filter.categories.is_negative {
            "NOT EXISTS"
        } else {
            "EXISTS"
        };
        sql.push(
            format!(
                "{exists} (SELECT 1 FROM transaction_category tc \
                WHERE tc.transaction_id = t.id AND tc.category_id IN ({}))",
                placeholders(categories.len())
            ),
            id_params(categories),
        );
    }

    let subcategories = &filter.subcategories.selected;
    if !subcategories.is_empty() {
        sql.push(
            format!(
                "EXISTS (SELECT 1 FROM transaction_category tc \
                WHERE tc.transaction_id = t.id AND tc.subcategory_id IN ({}))",
                placeholders(subcategories.len())
            ),
            id_params(subcategories),
        );
    }

    push_search(&mut sql, filter);

    sql
}

/// Conditions selecting `user_id`'s allocations that match `filter`, for use with
/// [ALLOCATION_FROM].
///
/// Unlike [transaction_filter], the type and category conditions apply to each allocation
/// on its own. Allocations in the category named `excluded_category` are left out.
pub(crate) fn allocation_filter(
    user_id: UserID,
    filter: &FilterState,
    excluded_category: Option<&str>,
) -> SqlFilter {
    let mut sql = SqlFilter::default();
    sql.push("b.user_id = ?", vec![param(user_id.as_i64())]);

    if let Some(excluded_category) = excluded_category {
        sql.push("c.name <> ?", vec![param(excluded_category.to_owned())]);
    }

    push_date_range(&mut sql, filter);

    match filter.type_filter {
        TypeFilter::All => {}
        TypeFilter::Income => sql.push("tc.amount >= 0.01", Vec::new()),
        TypeFilter::Expense => sql.push("tc.amount < 0", Vec::new()),
    }

    let categories = &filter.categories.selected;
    if !categories.is_empty() {
        let operator = if filter.categories.is_negative {
            "NOT IN"
        } else {
            "IN"
        };
        sql.push(
            format!(
                "tc.category_id {operator} ({})",
                placeholders(categories.len())
            ),
            id_params(categories),
        );
    }

    let subcategories = &filter.subcategories.selected;
    if !subcategories.is_empty() {
        sql.push(
            format!("tc.subcategory_id IN ({})", placeholders(subcategories.len())),
            id_params(subcategories),
        );
    }

    push_search(&mut sql, filter);

    sql
}

/// A page of transactions and where it sits among all matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    #[serde(flatten)]
    pub page: PageInfo,
}

/// Count `user_id`'s transactions that match `filter`.
pub fn count_transactions(
    user_id: UserID,
    filter: &FilterState,
    connection: &Connection,
) -> Result<u64, Error> {
    let sql = transaction_filter(user_id, filter);
    let query = format!("SELECT COUNT(*) {TRANSACTION_FROM} {}", sql.where_clause());

    connection
        .query_row(&query, params_from_iter(sql.params()), |row| row.get(0))
        .map_err(Error::from)
}

/// Get the page of `user_id`'s transactions described by `filter`.
///
/// A page past the last one is empty, and `current_page` still echoes the requested page.
pub fn query_transactions(
    user_id: UserID,
    filter: &FilterState,
    connection: &Connection,
) -> Result<TransactionPage, Error> {
    let started = Instant::now();

    let total_count = count_transactions(user_id, filter, connection)?;
    let ids = if total_count == 0 {
        Vec::new()
    } else if filter.sort.column == SortColumn::Amount {
        page_ids_by_amount(user_id, filter, connection)?
    } else {
        page_ids(user_id, filter, connection)?
    };
    let transactions = load_transactions(user_id, &ids, connection)?;

    tracing::debug!(
        "Loaded {} of {total_count} transactions in {}ms",
        transactions.len(),
        started.elapsed().as_millis()
    );

    Ok(TransactionPage {
        transactions,
        page: PageInfo::new(total_count, filter.page),
    })
}

/// Order and page in SQL for the columns stored on the transaction row.
fn page_ids(
    user_id: UserID,
    filter: &FilterState,
    connection: &Connection,
) -> Result<Vec<TransactionId>, Error> {
    let sql = transaction_filter(user_id, filter);
    let direction = filter.sort.direction.as_sql();
    let order = match filter.sort.column {
        SortColumn::Description => format!(
            "(t.user_description IS NULL), t.user_description COLLATE NOCASE {direction}, \
            t.description COLLATE NOCASE {direction}, t.id {direction}"
        ),
        _ => format!("t.operation_date {direction}, t.id {direction}"),
    };
    let query = format!(
        "SELECT t.id {TRANSACTION_FROM} {} ORDER BY {order} LIMIT ? OFFSET ?",
        sql.where_clause()
    );

    let limit = filter.page.page_size as i64;
    let offset = i64::try_from(filter.page.offset()).unwrap_or(i64::MAX);
    let params = sql
        .params()
        .chain([&limit as &dyn ToSql, &offset as &dyn ToSql]);

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params), |row| row.get(0))?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Order by the derived amount, which means summing every matching transaction's
/// allocations before the page can be cut.
fn page_ids_by_amount(
    user_id: UserID,
    filter: &FilterState,
    connection: &Connection,
) -> Result<Vec<TransactionId>, Error> {
    let sql = transaction_filter(user_id, filter);
    let query = format!(
        "SELECT t.id, alloc.amount {TRANSACTION_FROM} \
        LEFT JOIN transaction_category alloc ON alloc.transaction_id = t.id {}",
        sql.where_clause()
    );

    let rows = connection
        .prepare(&query)?
        .query_map(params_from_iter(sql.params()), |row| {
            Ok((row.get::<_, TransactionId>(0)?, row.get::<_, Option<f64>>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if rows.len() > AMOUNT_SORT_WARN_ROWS {
        tracing::warn!(
            "Sorting {} allocation rows in memory to order transactions by amount",
            rows.len()
        );
    }

    let mut totals: HashMap<TransactionId, f64> = HashMap::new();
    for (transaction_id, amount) in rows {
        *totals.entry(transaction_id).or_default() += amount.unwrap_or_default();
    }

    Ok(sort_and_slice(totals.into_iter().collect(), filter))
}

fn sort_and_slice(mut totals: Vec<(TransactionId, f64)>, filter: &FilterState) -> Vec<TransactionId> {
    totals.sort_by(|(a_id, a_total), (b_id, b_total)| {
        a_total.total_cmp(b_total).then(a_id.cmp(b_id))
    });

    if filter.sort.direction == SortDirection::Desc {
        totals.reverse();
    }

    let offset = usize::try_from(filter.page.offset()).unwrap_or(usize::MAX);
    let page_size = usize::try_from(filter.page.page_size).unwrap_or(usize::MAX);

    totals
        .into_iter()
        .skip(offset)
        .take(page_size)
        .map(|(transaction_id, _)| transaction_id)
        .collect()
}
