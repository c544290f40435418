//! Route handlers for the aggregate views.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, RawQuery, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    analytics::{
        aggregation::{Period, Totals},
        financial::{FinancialData, FinancialRange, get_financial_data},
        summary::{Analytics, CategoryTotal, get_analytics, get_category_totals, get_totals},
    },
    api_response::ApiSuccess,
    app_state::FilterConfig,
    auth::UserID,
    db::lock_connection,
    pagination::PaginationConfig,
    refresh::{ANALYTICS_VIEW, RefreshRegistry, run_unless_superseded},
    timezone::local_today,
    transaction::FilterState,
};

/// The state needed for the aggregate views.
#[derive(Clone)]
pub struct AnalyticsState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub filter_config: FilterConfig,
    pub pagination_config: PaginationConfig,
    /// The canonical timezone name that decides which period is the current one.
    pub local_timezone: String,
    pub refresh_registry: RefreshRegistry,
}

impl FromRef<AppState> for AnalyticsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            filter_config: state.filter_config.clone(),
            pagination_config: state.pagination_config.clone(),
            local_timezone: state.local_timezone.clone(),
            refresh_registry: state.refresh_registry.clone(),
        }
    }
}

impl AnalyticsState {
    fn filter(&self, query: Option<&str>) -> FilterState {
        FilterState::from_urlencoded(
            query.unwrap_or_default(),
            &self.filter_config,
            &self.pagination_config,
        )
    }
}

/// Look up a single value in a url-encoded query string.
fn query_value(query: Option<&str>, key: &str) -> Option<String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query.unwrap_or_default())
        .ok()?
        .into_iter()
        .find_map(|(name, value)| (name == key).then_some(value))
}

/// A route handler for `GET /api/analytics`.
///
/// `period` may be `week` or `month` and defaults to `month`. The rest of the query string
/// is read as a transaction filter.
pub async fn get_analytics_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    RawQuery(query): RawQuery,
) -> Result<ApiSuccess<Analytics>, Error> {
    let period = match query_value(query.as_deref(), "period") {
        None => Period::Month,
        Some(raw) => match Period::parse(&raw) {
            Some(period @ (Period::Week | Period::Month)) => period,
            _ => {
                return Err(Error::Validation(
                    "Invalid period. Must be week or month.".to_owned(),
                ));
            }
        },
    };
    let filter = state.filter(query.as_deref());
    let ticket = state.refresh_registry.begin(user_id, ANALYTICS_VIEW);
    let db_connection = state.db_connection;
    let transfers_category = state.filter_config.transfers_category;

    run_unless_superseded(ticket, move || {
        let start = std::time::Instant::now();
        let connection = lock_connection(&db_connection)?;
        let analytics = get_analytics(user_id, &filter, period, &transfers_category, &connection)?;
        tracing::debug!(
            "Built {} analytics buckets in {}ms",
            analytics.buckets.len(),
            start.elapsed().as_millis()
        );

        Ok(analytics)
    })
    .await
    .map(ApiSuccess)
}

/// A route handler for `GET /api/transactions/totals`.
pub async fn get_totals_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    RawQuery(query): RawQuery,
) -> Result<ApiSuccess<Totals>, Error> {
    let filter = state.filter(query.as_deref());
    let connection = lock_connection(&state.db_connection)?;

    get_totals(
        user_id,
        &filter,
        &state.filter_config.transfers_category,
        &connection,
    )
    .map(ApiSuccess)
}

/// A route handler for `GET /api/transactions/category-totals`.
pub async fn get_category_totals_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    RawQuery(query): RawQuery,
) -> Result<ApiSuccess<Vec<CategoryTotal>>, Error> {
    let filter = state.filter(query.as_deref());
    let connection = lock_connection(&state.db_connection)?;

    get_category_totals(user_id, &filter, &connection).map(ApiSuccess)
}

/// A route handler for `GET /api/financial-data`.
pub async fn get_financial_data_endpoint(
    State(state): State<AnalyticsState>,
    Extension(user_id): Extension<UserID>,
    RawQuery(query): RawQuery,
) -> Result<ApiSuccess<FinancialData>, Error> {
    let query = query.as_deref();
    let range = FinancialRange::parse(
        query_value(query, "period").as_deref(),
        query_value(query, "offset").as_deref(),
        query_value(query, "count").as_deref(),
    )?;
    let today = local_today(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    get_financial_data(
        user_id,
        range,
        today,
        &state.filter_config.transfers_category,
        &connection,
    )
    .map(ApiSuccess)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use time::macros::date;

    use crate::{
        db::lock_connection,
        endpoints,
        test_utils::{alloc, seed_account, seed_category, seed_transaction, signed_in_app},
    };

    #[tokio::test]
    async fn analytics_buckets_by_week() {
        let app = signed_in_app().await;
        {
            let connection = lock_connection(&app.state.db_connection).unwrap();
            let account_id = seed_account(&connection, app.user_id);
            let (food, _) = seed_category(&connection, app.user_id, "Food");
            seed_transaction(&connection, account_id, date!(2024 - 01 - 02), "Shop", &[alloc(food, None, -12.5)]);
            seed_transaction(&connection, account_id, date!(2024 - 01 - 10), "Refund", &[alloc(food, None, 2.5)]);
        }

        let response = app
            .server
            .get(endpoints::ANALYTICS)
            .add_query_param("period", "week")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(
            body,
            json!({
                "success": true,
                "data": {
                    "period": "week",
                    "buckets": [
                        { "period": "2024-W01", "income": 0.0, "expenses": 12.5 },
                        { "period": "2024-W02", "income": 2.5, "expenses": 0.0 },
                    ]
                }
            })
        );
    }

    #[tokio::test]
    async fn analytics_rejects_year_period() {
        let app = signed_in_app().await;

        let response = app
            .server
            .get(endpoints::ANALYTICS)
            .add_query_param("period", "year")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn totals_respect_type_filter() {
        let app = signed_in_app().await;
        {
            let connection = lock_connection(&app.state.db_connection).unwrap();
            let account_id = seed_account(&connection, app.user_id);
            let (food, _) = seed_category(&connection, app.user_id, "Food");
            seed_transaction(&connection, account_id, date!(2024 - 04 - 02), "Shop", &[alloc(food, None, -30.0)]);
            seed_transaction(&connection, account_id, date!(2024 - 04 - 03), "Wages", &[alloc(food, None, 80.0)]);
        }

        let all: Value = app.server.get(endpoints::TRANSACTION_TOTALS).await.json();
        assert_eq!(
            all["data"],
            json!({ "totalIncome": 80.0, "totalExpenses": 30.0, "netAmount": 50.0 })
        );

        let expenses: Value = app
            .server
            .get(endpoints::TRANSACTION_TOTALS)
            .add_query_param("type", "expense")
            .await
            .json();
        assert_eq!(expenses["data"]["totalIncome"], 0.0);
        assert_eq!(expenses["data"]["netAmount"], -30.0);
    }

    #[tokio::test]
    async fn category_totals_by_date_range() {
        let app = signed_in_app().await;
        {
            let connection = lock_connection(&app.state.db_connection).unwrap();
            let account_id = seed_account(&connection, app.user_id);
            let (food, general) = seed_category(&connection, app.user_id, "Food");
            seed_transaction(&connection, account_id, date!(2024 - 05 - 01), "Shop", &[alloc(food, Some(general), -9.0)]);
            seed_transaction(&connection, account_id, date!(2024 - 06 - 01), "Shop", &[alloc(food, Some(general), -1.0)]);
        }

        let body: Value = app
            .server
            .get(endpoints::CATEGORY_TOTALS)
            .add_query_param("dateFrom", "2024-05-01")
            .add_query_param("dateTo", "2024-05-31")
            .await
            .json();

        assert_eq!(body["data"][0]["categoryName"], "Food");
        assert_eq!(body["data"][0]["totalAmount"], -9.0);
        assert_eq!(body["data"][0]["subcategories"][0]["name"], "General");
        assert_eq!(body["data"][0]["subcategories"][0]["transactionCount"], 1);
    }

    #[tokio::test]
    async fn financial_data_defaults_to_five_months() {
        let app = signed_in_app().await;

        let response = app.server.get(endpoints::FINANCIAL_DATA).await;

        response.assert_status_ok();
        let body: Value = response.json();
        let chart_data = body["data"]["chartData"].as_array().unwrap();
        assert_eq!(chart_data.len(), 5);
        assert!(chart_data.iter().all(|period| period["net"] == 0.0));
    }

    #[tokio::test]
    async fn financial_data_rejects_negative_offset() {
        let app = signed_in_app().await;

        let response = app
            .server
            .get(endpoints::FINANCIAL_DATA)
            .add_query_param("offset", "-2")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(
            body,
            json!({
                "success": false,
                "error": "Invalid offset. Must be a non-negative number."
            })
        );
    }
}
