//! Best-effort category prediction through an external text-completion service.

mod endpoint;
mod openai;
mod prompt;
mod reply;

use async_trait::async_trait;

use crate::{Error, category::Category, rule::Rule};

pub use endpoint::{PredictionState, predict_category_endpoint};
pub use openai::{OpenAiPredictor, PredictionConfig};
pub use prompt::{ChatPrompt, SYSTEM_PROMPT, build_prompt};
pub use reply::{Prediction, parse_prediction};

/// A text-completion backend that can answer a classification prompt.
#[async_trait]
pub trait CategoryPredictor: Send + Sync {
    /// Send `prompt` and return the raw reply text.
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, Error>;
}

/// Ask `predictor` which of `categories` fits `description`.
///
/// # Errors
/// Returns [Error::InvalidPrediction] if the reply does not name one of `categories`, or a
/// subcategory of the named category. Errors from `predictor` are passed through.
pub async fn predict_category(
    predictor: &dyn CategoryPredictor,
    description: &str,
    categories: &[Category],
    hints: &[Rule],
) -> Result<Prediction, Error> {
    let prompt = build_prompt(description, categories, hints);
    let reply = predictor.complete(&prompt).await?;

    parse_prediction(&reply, categories)
}
