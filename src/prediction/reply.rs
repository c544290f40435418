//! Parses and checks the classifier's reply.

use serde::Serialize;
use serde_json::Value;

use crate::{
    Error,
    category::{Category, CategoryId, SubcategoryId, check_category_pair},
};

/// A category guess that has been checked against the user's categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub category_id: CategoryId,
    pub subcategory_id: Option<SubcategoryId>,
}

/// Read the first JSON object in `reply` as a [Prediction].
///
/// # Errors
/// Returns [Error::InvalidPrediction] if there is no JSON object, `categoryId` is not an
/// integer, `subcategoryId` is neither null nor an integer, the category is not one of
/// `categories`, or the subcategory does not belong to the category.
pub fn parse_prediction(reply: &str, categories: &[Category]) -> Result<Prediction, Error> {
    let object = first_json_object(reply)
        .ok_or_else(|| Error::InvalidPrediction(format!("no JSON object in reply {reply:?}")))?;

    let category_id = object
        .get("categoryId")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::InvalidPrediction("categoryId is not a number".to_owned()))?;

    let subcategory_id = match object.get("subcategoryId") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.as_i64().ok_or_else(|| {
            Error::InvalidPrediction("subcategoryId is not a number or null".to_owned())
        })?),
    };

    check_category_pair(categories, category_id, subcategory_id)
        .map_err(|error| Error::InvalidPrediction(error.to_string()))?;

    Ok(Prediction {
        category_id,
        subcategory_id,
    })
}

/// The first complete JSON object in `text`, ignoring anything around it.
fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(Value::is_object)
    })
}
