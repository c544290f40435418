//! Route handlers for listing and editing transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, RawQuery, State},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    api_response::{ApiJson, ApiPath, ApiSuccess},
    app_state::FilterConfig,
    auth::UserID,
    db::lock_connection,
    pagination::PaginationConfig,
    refresh::{RefreshRegistry, TRANSACTIONS_VIEW, run_unless_superseded},
    transaction::{
        NewAllocation, Transaction, TransactionId, get_transaction,
        filter::FilterState,
        query::{TransactionPage, query_transactions},
        update::{INVALID_CATEGORIES_MSG, replace_allocations, update_description},
    },
};

/// The state needed to list and edit transactions.
#[derive(Clone)]
pub struct TransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub pagination_config: PaginationConfig,
    pub filter_config: FilterConfig,
    pub refresh_registry: RefreshRegistry,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
            filter_config: state.filter_config.clone(),
            refresh_registry: state.refresh_registry.clone(),
        }
    }
}

/// A route handler for `GET /api/transactions/filtered`, the filter is read from the query
/// string.
pub async fn get_filtered_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    RawQuery(query): RawQuery,
) -> Result<ApiSuccess<TransactionPage>, Error> {
    let filter = FilterState::from_urlencoded(
        query.as_deref().unwrap_or_default(),
        &state.filter_config,
        &state.pagination_config,
    );

    filtered_transactions(state, user_id, filter).await
}

/// A route handler for `POST /api/transactions/filtered`, the filter is read from a
/// url-encoded form body.
pub async fn post_filtered_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    body: String,
) -> Result<ApiSuccess<TransactionPage>, Error> {
    let filter =
        FilterState::from_urlencoded(&body, &state.filter_config, &state.pagination_config);

    filtered_transactions(state, user_id, filter).await
}

async fn filtered_transactions(
    state: TransactionState,
    user_id: UserID,
    filter: FilterState,
) -> Result<ApiSuccess<TransactionPage>, Error> {
    let ticket = state.refresh_registry.begin(user_id, TRANSACTIONS_VIEW);
    let db_connection = state.db_connection;

    run_unless_superseded(ticket, move || {
        let connection = lock_connection(&db_connection)?;
        query_transactions(user_id, &filter, &connection)
    })
    .await
    .map(ApiSuccess)
}

/// A route handler for `GET /api/transactions/{transaction_id}`.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(transaction_id): ApiPath<TransactionId>,
) -> Result<ApiSuccess<Transaction>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_transaction(user_id, transaction_id, &connection).map(ApiSuccess)
}

#[derive(Debug, Deserialize)]
pub struct DescriptionBody {
    #[serde(default)]
    pub user_description: Option<String>,
}

/// A route handler for `PUT /api/transactions/{transaction_id}/description`.
pub async fn update_description_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(transaction_id): ApiPath<TransactionId>,
    ApiJson(body): ApiJson<DescriptionBody>,
) -> Result<ApiSuccess<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let user_description = update_description(
        user_id,
        transaction_id,
        body.user_description.as_deref(),
        &connection,
    )?;

    Ok(ApiSuccess(json!({
        "id": transaction_id,
        "user_description": user_description,
    })))
}

/// A route handler for `PUT /api/transactions/{transaction_id}/categories`.
///
/// The body is `{"categories": [{"categoryId", "subcategoryId", "amount"}, ...]}` and
/// replaces every allocation of the transaction.
pub async fn update_categories_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(transaction_id): ApiPath<TransactionId>,
    ApiJson(body): ApiJson<Value>,
) -> Result<ApiSuccess<Transaction>, Error> {
    let allocations = parse_allocations(&body)?;
    let connection = lock_connection(&state.db_connection)?;

    replace_allocations(user_id, transaction_id, &allocations, &connection)?;
    tracing::info!(
        "User {user_id} recategorised transaction {transaction_id} into {} allocations",
        allocations.len()
    );

    get_transaction(user_id, transaction_id, &connection).map(ApiSuccess)
}

fn parse_allocations(body: &Value) -> Result<Vec<NewAllocation>, Error> {
    let invalid = || Error::Validation(INVALID_CATEGORIES_MSG.to_owned());

    let categories = body
        .get("categories")
        .and_then(Value::as_array)
        .filter(|categories| !categories.is_empty())
        .ok_or_else(invalid)?;

    categories
        .iter()
        .map(|category| NewAllocation::deserialize(category).map_err(|_| invalid()))
        .collect()
}
