//! Application router configuration.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    analytics::{
        get_analytics_endpoint, get_category_totals_endpoint, get_financial_data_endpoint,
        get_totals_endpoint,
    },
    auth::{auth_gate, get_auth_page, get_confirm, post_auth, post_sign_out},
    bank::get_bank_balances_endpoint,
    category::{
        create_category_endpoint, create_subcategory_endpoint, delete_category_endpoint,
        delete_subcategory_endpoint, get_category_transaction_counts_endpoint,
        list_categories_endpoint, update_category_endpoint, update_subcategory_endpoint,
    },
    endpoints,
    home::get_home_page,
    not_found::get_404_not_found,
    prediction::predict_category_endpoint,
    rule::{
        apply_rule_endpoint, create_rule_endpoint, delete_rule_endpoint, list_rules_endpoint,
        update_rule_endpoint,
    },
    transaction::{
        get_filtered_transactions_endpoint, get_transaction_endpoint,
        post_filtered_transactions_endpoint, update_categories_endpoint,
        update_description_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Every route, including the fallback, sits behind the auth gate.
pub fn build_router(state: AppState) -> Router {
    let page_routes = Router::new()
        .route(endpoints::ROOT, get(get_home_page))
        .route(endpoints::AUTH, get(get_auth_page).post(post_auth))
        .route(endpoints::AUTH_CONFIRM, get(get_confirm))
        .route(endpoints::SIGN_OUT, post(post_sign_out));

    let transaction_routes = Router::new()
        .route(
            endpoints::FILTERED_TRANSACTIONS,
            get(get_filtered_transactions_endpoint).post(post_filtered_transactions_endpoint),
        )
        .route(endpoints::TRANSACTION_TOTALS, get(get_totals_endpoint))
        .route(endpoints::CATEGORY_TOTALS, get(get_category_totals_endpoint))
        .route(endpoints::PREDICT_CATEGORY, post(predict_category_endpoint))
        .route(endpoints::TRANSACTION, get(get_transaction_endpoint))
        .route(
            endpoints::TRANSACTION_DESCRIPTION,
            put(update_description_endpoint),
        )
        .route(
            endpoints::TRANSACTION_CATEGORIES,
            put(update_categories_endpoint),
        );

    let aggregate_routes = Router::new()
        .route(endpoints::ANALYTICS, get(get_analytics_endpoint))
        .route(endpoints::FINANCIAL_DATA, get(get_financial_data_endpoint))
        .route(endpoints::BANK_BALANCES, get(get_bank_balances_endpoint))
        .route(
            endpoints::CATEGORY_TRANSACTION_COUNTS,
            get(get_category_transaction_counts_endpoint),
        );

    let category_routes = Router::new()
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(endpoints::CATEGORY_RULES, get(list_rules_endpoint))
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::CATEGORY_SUBCATEGORIES,
            post(create_subcategory_endpoint),
        )
        .route(
            endpoints::SUBCATEGORY,
            put(update_subcategory_endpoint).delete(delete_subcategory_endpoint),
        )
        .route(
            endpoints::RULES,
            get(list_rules_endpoint).post(create_rule_endpoint),
        )
        .route(
            endpoints::RULE,
            put(update_rule_endpoint).delete(delete_rule_endpoint),
        )
        .route(endpoints::APPLY_RULE, post(apply_rule_endpoint));

    page_routes
        .merge(transaction_routes)
        .merge(aggregate_routes)
        .merge(category_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), auth_gate))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        build_router, endpoints,
        test_utils::{signed_in_app, test_state},
    };

    #[tokio::test]
    async fn anonymous_api_requests_are_unauthorized() {
        let server = TestServer::try_new(build_router(test_state())).unwrap();

        for path in [
            endpoints::FILTERED_TRANSACTIONS,
            endpoints::ANALYTICS,
            endpoints::CATEGORIES,
            endpoints::RULES,
        ] {
            let response = server.get(path).await;

            response.assert_status(StatusCode::UNAUTHORIZED);
            response.assert_json(&json!({ "success": false, "error": "Unauthorized" }));
        }
    }

    #[tokio::test]
    async fn anonymous_page_requests_redirect_to_auth() {
        let server = TestServer::try_new(build_router(test_state())).unwrap();

        let response = server.get(endpoints::ROOT).await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), endpoints::AUTH);
    }

    #[tokio::test]
    async fn signed_in_user_is_sent_home_from_auth_page() {
        let app = signed_in_app().await;

        let response = app.server.get(endpoints::AUTH).await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), endpoints::ROOT);
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_not_found() {
        let app = signed_in_app().await;

        let response = app.server.get("/api/nope").await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn category_rules_route_is_not_shadowed_by_category_id() {
        let app = signed_in_app().await;

        let response = app.server.get(endpoints::CATEGORY_RULES).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "success": true, "data": [] }));
    }
}
