//! Builds the chat prompt that asks for a transaction's category.

use crate::{category::Category, rule::Rule};

pub const SYSTEM_PROMPT: &str = "You are a financial transaction classifier. \
Your task is to analyze a transaction description and choose the most appropriate category \
and subcategory from the provided options. Choose exactly one category and optionally one \
subcategory if available.

Rules:
1. Always respond with a valid category ID from the list
2. Only use subcategory IDs that belong to the chosen category
3. If no appropriate subcategory exists, return null for subcategoryId
4. Respond only with the JSON object, no explanation needed";

/// A system and a user message for a chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// Describe `description` and the available `categories` to the classifier.
///
/// `hints` are rules whose pattern matches the description. They are listed as suggestions,
/// the reply is still checked against `categories`.
pub fn build_prompt(description: &str, categories: &[Category], hints: &[Rule]) -> ChatPrompt {
    let mut user = format!("Transaction description: \"{description}\"\n\nAvailable Categories:\n");

    for category in categories {
        user.push_str(&format!("- {} (id: {})\n", category.name, category.id));

        if !category.subcategories.is_empty() {
            user.push_str("    Subcategories:\n");
            for subcategory in &category.subcategories {
                user.push_str(&format!(
                    "      - {} (id: {})\n",
                    subcategory.name, subcategory.id
                ));
            }
        }
    }

    if !hints.is_empty() {
        user.push_str("\nThe user has rules that match this description:\n");
        for rule in hints {
            user.push_str(&format!(
                "- \"{}\" => categoryId {}",
                rule.pattern, rule.category_id
            ));
            match rule.subcategory_id {
                Some(subcategory_id) => {
                    user.push_str(&format!(", subcategoryId {subcategory_id}\n"));
                }
                None => user.push('\n'),
            }
        }
    }

    user.push_str(
        "\nRespond with only a JSON object in this format:\n\
        {\n  \"categoryId\": number,\n  \"subcategoryId\": number or null\n}",
    );

    ChatPrompt {
        system: SYSTEM_PROMPT.to_owned(),
        user,
    }
}
