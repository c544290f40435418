//! A test server running the full router with a signed-in user.

use axum::http::StatusCode;
use axum_test::TestServer;
use rusqlite::Connection;

use crate::{
    AppState, FilterConfig, PaginationConfig, UserID, auth::COOKIE_TOKEN, build_router,
    db::lock_connection, endpoints,
    test_utils::seed::{TEST_PASSWORD, seed_user},
};

pub(crate) const TEST_EMAIL: &str = "test@example.com";

pub(crate) struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub user_id: UserID,
}

pub(crate) fn test_state() -> AppState {
    AppState::new(
        Connection::open_in_memory().expect("Could not open in-memory database"),
        "42",
        "Etc/UTC",
        PaginationConfig::default(),
        FilterConfig::default(),
    )
    .expect("Could not create app state")
}

/// Start the app and log in as a freshly seeded user.
pub(crate) async fn signed_in_app() -> TestApp {
    signed_in_app_with(|state| state).await
}

/// Like [signed_in_app], with `configure` applied to the state before the router is built.
pub(crate) async fn signed_in_app_with(configure: impl FnOnce(AppState) -> AppState) -> TestApp {
    let state = configure(test_state());
    let user_id = {
        let connection = lock_connection(&state.db_connection).expect("Could not lock database");
        seed_user(&connection, TEST_EMAIL)
    };

    let mut server =
        TestServer::try_new(build_router(state.clone())).expect("Could not create test server.");

    let response = server
        .post(endpoints::AUTH)
        .form(&[
            ("action", "login"),
            ("email", TEST_EMAIL),
            ("password", TEST_PASSWORD),
        ])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    server.add_cookie(response.cookie(COOKIE_TOKEN));

    TestApp {
        server,
        state,
        user_id,
    }
}
