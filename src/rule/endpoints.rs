//! Route handlers for managing and applying rules.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    api_response::{ApiJson, ApiPath, ApiSuccess},
    auth::UserID,
    category::{CategoryId, SubcategoryId},
    db::lock_connection,
    rule::{
        RULE_REQUIRED_FIELDS_MSG, Rule, RuleId, apply_rule, create_rule, delete_rule, get_rules,
        update_rule,
    },
};

/// The state needed to manage rules.
#[derive(Debug, Clone)]
pub struct RuleState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RuleState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The body for creating or editing a rule.
#[derive(Debug, Deserialize)]
pub struct RuleBody {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub subcategory_id: Option<SubcategoryId>,
}

impl RuleBody {
    fn required(&self) -> Result<(&str, CategoryId), Error> {
        match (self.pattern.as_deref(), self.category_id) {
            (Some(pattern), Some(category_id)) if !pattern.trim().is_empty() => {
                Ok((pattern, category_id))
            }
            _ => Err(Error::Validation(RULE_REQUIRED_FIELDS_MSG.to_owned())),
        }
    }
}

/// A route handler for `GET /api/rules` and `GET /api/categories/rules`.
pub async fn list_rules_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiSuccess<Vec<Rule>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_rules(user_id, &connection).map(ApiSuccess)
}

/// A route handler for `POST /api/rules`.
pub async fn create_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(body): ApiJson<RuleBody>,
) -> Result<ApiSuccess<Rule>, Error> {
    let (pattern, category_id) = body.required()?;
    let connection = lock_connection(&state.db_connection)?;

    let rule = create_rule(user_id, pattern, category_id, body.subcategory_id, &connection)?;
    tracing::info!("User {user_id} created rule {} for \"{}\"", rule.id, rule.pattern);

    Ok(ApiSuccess(rule))
}

/// A route handler for `PUT /api/rules/{rule_id}`.
pub async fn update_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(rule_id): ApiPath<RuleId>,
    ApiJson(body): ApiJson<RuleBody>,
) -> Result<ApiSuccess<Rule>, Error> {
    let (pattern, category_id) = body.required()?;
    let connection = lock_connection(&state.db_connection)?;

    update_rule(
        user_id,
        rule_id,
        pattern,
        category_id,
        body.subcategory_id,
        &connection,
    )
    .map(ApiSuccess)
}

/// A route handler for `DELETE /api/rules/{rule_id}`.
pub async fn delete_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(rule_id): ApiPath<RuleId>,
) -> Result<ApiSuccess<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_rule(user_id, rule_id, &connection)?;

    Ok(ApiSuccess(json!({ "id": rule_id })))
}

/// A route handler for `POST /api/rules/{rule_id}/apply`.
pub async fn apply_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(rule_id): ApiPath<RuleId>,
) -> Result<ApiSuccess<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let affected_count = apply_rule(user_id, rule_id, &connection)?;

    Ok(ApiSuccess(json!({ "affectedCount": affected_count })))
}
