//! The page and API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/rules/{rule_id}', use [format_endpoint].

/// The signed-in landing page.
pub const ROOT: &str = "/";
/// The log-in / sign-up page and its form actions.
pub const AUTH: &str = "/auth";
/// The confirmation landing path, reachable whether signed in or not.
pub const AUTH_CONFIRM: &str = "/auth/confirm";
/// Clears the session cookies.
pub const SIGN_OUT: &str = "/auth/signout";

/// The paginated, filtered transaction listing.
pub const FILTERED_TRANSACTIONS: &str = "/api/transactions/filtered";
/// Income and expense totals over the filtered allocations.
pub const TRANSACTION_TOTALS: &str = "/api/transactions/totals";
/// Per-category totals for a date range.
pub const CATEGORY_TOTALS: &str = "/api/transactions/category-totals";
/// Ask the prediction backend for a transaction's category.
pub const PREDICT_CATEGORY: &str = "/api/transactions/predict-category";
/// A single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The user description of a transaction.
pub const TRANSACTION_DESCRIPTION: &str = "/api/transactions/{transaction_id}/description";
/// The category allocations of a transaction.
pub const TRANSACTION_CATEGORIES: &str = "/api/transactions/{transaction_id}/categories";

/// Income and expenses bucketed by month or ISO week.
pub const ANALYTICS: &str = "/api/analytics";
/// Chart data for consecutive months or years.
pub const FINANCIAL_DATA: &str = "/api/financial-data";
/// The balance of each bank.
pub const BANK_BALANCES: &str = "/api/bank-balances";
/// How many transactions use each category and subcategory.
pub const CATEGORY_TRANSACTION_COUNTS: &str = "/api/category-transaction-counts";

/// List or create categories.
pub const CATEGORIES: &str = "/api/categories";
/// Update or delete a category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// Add a subcategory to a category.
pub const CATEGORY_SUBCATEGORIES: &str = "/api/categories/{category_id}/subcategories";
/// The rules with the names of the categories they assign.
pub const CATEGORY_RULES: &str = "/api/categories/rules";
/// Update or delete a subcategory.
pub const SUBCATEGORY: &str = "/api/subcategories/{subcategory_id}";

/// List or create rules.
pub const RULES: &str = "/api/rules";
/// Update or delete a rule.
pub const RULE: &str = "/api/rules/{rule_id}";
/// Apply a rule to the existing transactions.
pub const APPLY_RULE: &str = "/api/rules/{rule_id}/apply";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/rules/{rule_id}', '{rule_id}' is the parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
