//! Implements a struct that holds the state of the server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::{Date, Duration, macros::date};

use crate::{
    Error, auth::DEFAULT_SESSION_DURATION, db::initialize, pagination::PaginationConfig,
    prediction::CategoryPredictor, refresh::RefreshRegistry,
};

/// Defaults for filtering and aggregating transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// The lower date bound used when a filter does not specify one.
    pub epoch: Date,
    /// The exact name of the category holding transfers between the user's own accounts.
    ///
    /// Allocations in this category are left out of income and expense totals.
    pub transfers_category: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            epoch: date!(2024 - 01 - 01),
            transfers_category: "transfers ♻️".to_owned(),
        }
    }
}

/// The state of the server.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// How long a session stays valid without activity.
    pub session_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The config that controls how to page listings.
    pub pagination_config: PaginationConfig,

    /// Defaults for transaction filters and analytics.
    pub filter_config: FilterConfig,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The service used to guess a transaction's category, if one is configured.
    pub predictor: Option<Arc<dyn CategoryPredictor>>,

    /// Tracks in-flight listing refreshes so newer ones can supersede older ones.
    pub refresh_registry: RefreshRegistry,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        local_timezone: &str,
        pagination_config: PaginationConfig,
        filter_config: FilterConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            session_duration: DEFAULT_SESSION_DURATION,
            local_timezone: local_timezone.to_owned(),
            pagination_config,
            filter_config,
            db_connection: Arc::new(Mutex::new(db_connection)),
            predictor: None,
            refresh_registry: RefreshRegistry::default(),
        })
    }

    /// Use `predictor` for category predictions.
    pub fn with_predictor(mut self, predictor: Arc<dyn CategoryPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
