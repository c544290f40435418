//! Route handlers for managing categories and subcategories.

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
    category::{
        Category, CategoryId, Subcategory, SubcategoryId, create_category, create_subcategory,
        delete_category, delete_subcategory, get_categories, update_category, update_subcategory,
    },
    db::lock_connection,
};

/// The state needed to manage categories.
#[derive(Clone)]
pub struct CategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The body for creating or renaming a category or subcategory.
#[derive(Debug, Deserialize)]
pub struct NameBody {
    #[serde(default)]
    pub name: Option<String>,
}

impl NameBody {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// A route handler for `GET /api/categories`.
pub async fn list_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
) -> Result<ApiSuccess<Vec<Category>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_categories(user_id, &connection).map(ApiSuccess)
}

/// A route handler for `POST /api/categories`.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(body): ApiJson<NameBody>,
) -> Result<ApiSuccess<Category>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let category = create_category(user_id, body.name(), &connection)?;
    tracing::info!("User {user_id} created category {}", category.id);

    Ok(ApiSuccess(category))
}

/// A route handler for `PUT /api/categories/{category_id}`.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(category_id): ApiPath<CategoryId>,
    ApiJson(body): ApiJson<NameBody>,
) -> Result<ApiSuccess<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_category(user_id, category_id, body.name(), &connection)?;

    Ok(ApiSuccess(
        json!({ "id": category_id, "name": body.name().trim() }),
    ))
}

/// A route handler for `DELETE /api/categories/{category_id}`.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(category_id): ApiPath<CategoryId>,
) -> Result<ApiSuccess<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    match delete_category(user_id, category_id, &connection) {
        Ok(()) => Ok(ApiSuccess(json!({ "id": category_id }))),
        Err(error) => {
            tracing::debug!("Could not delete category {category_id}: {error}");
            Err(error)
        }
    }
}

/// A route handler for `POST /api/categories/{category_id}/subcategories`.
pub async fn create_subcategory_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(category_id): ApiPath<CategoryId>,
    ApiJson(body): ApiJson<NameBody>,
) -> Result<ApiSuccess<Subcategory>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    create_subcategory(user_id, category_id, body.name(), &connection).map(ApiSuccess)
}

/// A route handler for `PUT /api/subcategories/{subcategory_id}`.
pub async fn update_subcategory_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(subcategory_id): ApiPath<SubcategoryId>,
    ApiJson(body): ApiJson<NameBody>,
) -> Result<ApiSuccess<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_subcategory(user_id, subcategory_id, body.name(), &connection)?;

    Ok(ApiSuccess(
        json!({ "id": subcategory_id, "name": body.name().trim() }),
    ))
}

/// A route handler for `DELETE /api/subcategories/{subcategory_id}`.
pub async fn delete_subcategory_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    ApiPath(subcategory_id): ApiPath<SubcategoryId>,
) -> Result<ApiSuccess<Value>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_subcategory(user_id, subcategory_id, &connection)?;

    Ok(ApiSuccess(json!({ "id": subcategory_id })))
}
