use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    api_response::{ApiJson, ApiSuccess},
    auth::UserID,
    category::get_categories,
    db::lock_connection,
    prediction::{CategoryPredictor, Prediction, predict_category},
    rule::get_matching_rules,
};

pub const DESCRIPTION_REQUIRED_MSG: &str = "Transaction description is required";

/// The state needed to predict categories.
#[derive(Clone)]
pub struct PredictionState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub predictor: Option<Arc<dyn CategoryPredictor>>,
}

impl FromRef<AppState> for PredictionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            predictor: state.predictor.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictBody {
    #[serde(default)]
    pub transaction_description: Option<String>,
}

/// A route handler for `POST /api/transactions/predict-category`.
pub async fn predict_category_endpoint(
    State(state): State<PredictionState>,
    Extension(user_id): Extension<UserID>,
    ApiJson(body): ApiJson<PredictBody>,
) -> Result<ApiSuccess<Prediction>, Error> {
    let description = body
        .transaction_description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .ok_or_else(|| Error::Validation(DESCRIPTION_REQUIRED_MSG.to_owned()))?;

    let predictor = state.predictor.ok_or(Error::PredictionUnavailable)?;

    let (categories, hints) = {
        let connection = lock_connection(&state.db_connection)?;
        (
            get_categories(user_id, &connection)?,
            get_matching_rules(user_id, description, &connection)?,
        )
    };

    if categories.is_empty() {
        return Err(Error::Validation(
            "Create a category before predicting one".to_owned(),
        ));
    }

    let prediction = predict_category(predictor.as_ref(), description, &categories, &hints).await?;
    tracing::debug!(
        "Predicted category {} for \"{description}\" with {} rule hints",
        prediction.category_id,
        hints.len()
    );

    Ok(ApiSuccess(prediction))
}
