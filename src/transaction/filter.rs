//! The request-scoped description of which transactions to show and how.
//!
//! A [FilterState] is parsed from query-string or form pairs. Parsing never fails: values
//! that are missing or malformed fall back to their defaults and non-numeric IDs are dropped.

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    app_state::FilterConfig,
    category::{CategoryId, SubcategoryId},
    pagination::{PageRequest, PaginationConfig},
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// Which allocations count, by sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    /// Allocations of at least 0.01.
    Income,
    /// Negative allocations.
    Expense,
}

/// Inclusive bounds on the operation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Date,
    /// `None` means no upper bound.
    pub to: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CategorySelection {
    pub selected: Vec<CategoryId>,
    /// Keep transactions with no allocation in `selected` instead of at least one.
    pub is_negative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubcategorySelection {
    pub selected: Vec<SubcategoryId>,
}

/// Case-insensitive substring search over the bank and user descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchFilter {
    /// The trimmed search term, empty when not searching.
    pub value: String,
    /// Keep transactions where neither description matches.
    pub is_negative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Date,
    /// The derived total of a transaction's allocations.
    Amount,
    /// The user description where set, then the bank description.
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// Everything needed to select, order and page transactions for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub type_filter: TypeFilter,
    pub date_range: DateRange,
    pub categories: CategorySelection,
    pub subcategories: SubcategorySelection,
    pub search: SearchFilter,
    pub sort: Sort,
    pub page: PageRequest,
}

impl FilterState {
    /// The filter used when a request has no parameters.
    pub fn new(filter_config: &FilterConfig, pagination_config: &PaginationConfig) -> Self {
        Self::from_pairs(&[], filter_config, pagination_config)
    }

    /// Parse a url-encoded query string or form body.
    pub fn from_urlencoded(
        raw: &str,
        filter_config: &FilterConfig,
        pagination_config: &PaginationConfig,
    ) -> Self {
        // Decoding into strings is lenient: a malformed escape is kept as literal text.
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_default();

        Self::from_pairs(&pairs, filter_config, pagination_config)
    }

    /// Build a filter from decoded key/value pairs.
    ///
    /// Keys accepted (aliases separated by `|`):
    /// `type`, `dateFrom`, `dateTo`,
    /// `categories.selected[]|categories[]|categories.selected`,
    /// `categories.isNegative|isNegative`, `subcategories.selected[]|subcategories[]`,
    /// `searchTerm|search.value`, `search.isNegative`, `sort.column`, `sort.direction`,
    /// `page` and `pageSize`.
    pub fn from_pairs(
        pairs: &[(String, String)],
        filter_config: &FilterConfig,
        pagination_config: &PaginationConfig,
    ) -> Self {
        let first = |keys: &[&str]| {
            pairs
                .iter()
                .find(|(key, _)| keys.contains(&key.as_str()))
                .map(|(_, value)| value.as_str())
        };
        let all = |keys: &[&str]| {
            pairs
                .iter()
                .filter(|(key, _)| keys.contains(&key.as_str()))
                .map(|(_, value)| value.as_str())
                .collect::<Vec<_>>()
        };

        let type_filter = match first(&["type"]).map(str::trim) {
            Some("income") => TypeFilter::Income,
            Some("expense" | "expenses") => TypeFilter::Expense,
            _ => TypeFilter::All,
        };

        let date_range = DateRange {
            from: first(&["dateFrom"])
                .and_then(parse_date)
                .unwrap_or(filter_config.epoch),
            to: first(&["dateTo"]).and_then(parse_date),
        };

        let categories = CategorySelection {
            selected: parse_ids(&all(&[
                "categories.selected[]",
                "categories[]",
                "categories.selected",
            ])),
            is_negative: first(&["categories.isNegative", "isNegative"])
                .is_some_and(parse_bool),
        };

        let subcategories = SubcategorySelection {
            selected: parse_ids(&all(&["subcategories.selected[]", "subcategories[]"])),
        };

        let search = SearchFilter {
            value: first(&["searchTerm", "search.value"])
                .map(str::trim)
                .unwrap_or_default()
                .to_owned(),
            is_negative: first(&["search.isNegative"]).is_some_and(parse_bool),
        };

        let column = match first(&["sort.column"]).map(str::trim) {
            Some("amount") => Some(SortColumn::Amount),
            Some("description" | "user_description") => Some(SortColumn::Description),
            Some("date" | "operation_date") => Some(SortColumn::Date),
            _ => None,
        };
        let sort = match column {
            Some(column) => Sort {
                column,
                direction: match first(&["sort.direction"]).map(str::trim) {
                    Some(direction) if direction.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                    _ => SortDirection::Desc,
                },
            },
            None => Sort::default(),
        };

        let page = PageRequest::from_raw(first(&["page"]), first(&["pageSize"]), pagination_config);

        Self {
            type_filter,
            date_range,
            categories,
            subcategories,
            search,
            sort,
            page,
        }
    }
}

fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DATE_FORMAT).ok()
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim(), "true" | "1" | "on")
}

/// Parse every value as an ID, splitting comma separated lists and dropping anything that is
/// not an integer.
fn parse_ids(values: &[&str]) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();

    for id in values
        .iter()
        .flat_map(|value| value.split(','))
        .filter_map(|value| value.trim().parse().ok())
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    ids
}
