//! Tallybook is a self-hosted web app for reviewing and categorising bank transactions.
//!
//! This library provides a JSON API for listing, filtering and categorising transactions,
//! managing categories and auto-categorisation rules, and aggregating income and expenses
//! by period. A small set of HTML pages handles signing in and out.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod analytics;
mod api_response;
mod app_state;
mod auth;
mod bank;
mod category;
mod db;
mod endpoints;
mod home;
mod html;
mod internal_server_error;
mod logging;
mod not_found;
mod pagination;
mod prediction;
mod refresh;
mod routing;
mod rule;
mod timezone;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppState, FilterConfig};
pub use auth::{
    PasswordHash, User, UserID, ValidatedPassword, create_user, get_user_by_email, update_password,
};
pub use bank::{AccountType, create_account, create_bank};
pub use category::{create_category, create_subcategory};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use prediction::{CategoryPredictor, OpenAiPredictor, PredictionConfig};
pub use routing::build_router;
pub use rule::create_rule;
pub use transaction::{NewAllocation, Transaction, create_transaction};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate_signal) => {
                terminate_signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request did not carry a valid session.
    #[error("unauthorized")]
    Unauthorized,

    /// The session cookie is missing from the cookie jar in the request.
    #[error("no session cookie in the cookie jar")]
    CookieMissing,

    /// There was an error formatting or extending the session expiry.
    #[error("could not create session expiry: {0}")]
    InvalidDateFormat(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email address is not plausibly valid.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address is already registered.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// A required field was missing or blank, or a parameter was malformed.
    ///
    /// The string is shown to the client.
    #[error("{0}")]
    Validation(String),

    /// A category name was empty.
    #[error("Category name is required")]
    EmptyCategoryName,

    /// The user already has a category with the same name.
    #[error("A category with that name already exists")]
    DuplicateCategoryName,

    /// The category already has a subcategory with the same name.
    #[error("A subcategory with that name already exists in this category")]
    DuplicateSubcategoryName,

    /// Tried to delete a category that still has subcategories.
    #[error("Cannot delete category with subcategories")]
    CategoryHasSubcategories,

    /// Tried to delete a category that is referenced by a transaction allocation.
    #[error("Cannot delete category with associated transactions")]
    CategoryInUse,

    /// Tried to delete a subcategory that is referenced by a transaction allocation.
    #[error("Cannot delete subcategory with associated transactions")]
    SubcategoryInUse,

    /// A category ID did not refer to one of the user's categories.
    #[error("category {0} does not exist")]
    InvalidCategory(i64),

    /// A subcategory ID did not belong to the category it was paired with.
    #[error("subcategory {subcategory_id} does not belong to category {category_id}")]
    InvalidSubcategory {
        /// The category the subcategory was paired with.
        category_id: i64,
        /// The offending subcategory.
        subcategory_id: i64,
    },

    /// The same category and subcategory pair was given twice for one transaction.
    #[error(
        "Cannot assign the same category and subcategory combination multiple times to a transaction"
    )]
    DuplicateAllocation,

    /// A foreign key constraint failed.
    #[error("a referenced record does not exist")]
    InvalidReference,

    /// The external prediction service answered with something unusable.
    #[error("invalid prediction: {0}")]
    InvalidPrediction(String),

    /// No prediction backend has been configured.
    #[error("category prediction is not configured")]
    PredictionUnavailable,

    /// The request to the prediction service failed.
    #[error("prediction request failed: {0}")]
    PredictionRequest(String),

    /// A newer refresh of the same view started before this one finished.
    #[error("superseded by a newer request")]
    Superseded,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a transaction that does not exist.
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to update a category that does not exist.
    #[error("tried to update a category that is not in the database")]
    UpdateMissingCategory,

    /// Tried to delete a category that does not exist.
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,

    /// Tried to update a subcategory that does not exist.
    #[error("tried to update a subcategory that is not in the database")]
    UpdateMissingSubcategory,

    /// Tried to delete a subcategory that does not exist.
    #[error("tried to delete a subcategory that is not in the database")]
    DeleteMissingSubcategory,

    /// Tried to update a rule that does not exist.
    #[error("tried to update a rule that is not in the database")]
    UpdateMissingRule,

    /// Tried to delete a rule that does not exist.
    #[error("tried to delete a rule that is not in the database")]
    DeleteMissingRule,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    TaskFailed(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("subcategory.") =>
            {
                Error::DuplicateSubcategoryName
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("category.") =>
            {
                Error::DuplicateCategoryName
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("allocation_pair") =>
            {
                Error::DuplicateAllocation
            }
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, _) if sql_error.extended_code == 787 => {
                Error::InvalidReference
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized | Error::CookieMissing | Error::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Error::TooWeak(_)
            | Error::InvalidEmail(_)
            | Error::DuplicateEmail
            | Error::Validation(_)
            | Error::EmptyCategoryName
            | Error::DuplicateCategoryName
            | Error::DuplicateSubcategoryName
            | Error::CategoryHasSubcategories
            | Error::CategoryInUse
            | Error::SubcategoryInUse
            | Error::InvalidCategory(_)
            | Error::InvalidSubcategory { .. }
            | Error::DuplicateAllocation
            | Error::InvalidReference
            | Error::InvalidPrediction(_) => StatusCode::BAD_REQUEST,
            Error::NotFound
            | Error::UpdateMissingTransaction
            | Error::UpdateMissingCategory
            | Error::DeleteMissingCategory
            | Error::UpdateMissingSubcategory
            | Error::DeleteMissingSubcategory
            | Error::UpdateMissingRule
            | Error::DeleteMissingRule => StatusCode::NOT_FOUND,
            Error::Superseded => StatusCode::CONFLICT,
            Error::PredictionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidDateFormat(_)
            | Error::HashingError(_)
            | Error::PredictionRequest(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::TaskFailed(_)
            | Error::InvalidTimezoneError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            match self {
                Error::PredictionUnavailable => self.to_string(),
                error => {
                    // Details stay in the server logs.
                    tracing::error!("An unexpected error occurred: {}", error);
                    "Internal server error".to_owned()
                }
            }
        } else {
            match self {
                Error::Unauthorized | Error::CookieMissing => "Unauthorized".to_owned(),
                Error::InvalidPrediction(reason) => {
                    tracing::warn!("Rejected category prediction: {reason}");
                    "Failed to predict category".to_owned()
                }
                error => error.to_string(),
            }
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
