//! The signed-in landing page.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::html;
use rusqlite::Connection;

use crate::{
    AppState,
    auth::{UserID, get_user_by_id},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base},
    internal_server_error::InternalServerError,
};

#[derive(Clone)]
pub struct HomePageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for HomePageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Greet the user and list the JSON endpoints the front end talks to.
pub async fn get_home_page(
    State(state): State<HomePageState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let user = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return InternalServerError::default().into_response();
            }
        };

        match get_user_by_id(user_id, &connection) {
            Ok(user) => user,
            Err(error) => {
                tracing::error!("could not load user {user_id}: {error}");
                return InternalServerError::default().into_response();
            }
        }
    };

    let content = html! {
        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold" { "Tallybook" }

            p { "Signed in as " span id="user-email" { (user.email) } }

            ul class="list-disc pl-6"
            {
                li { a href=(endpoints::FILTERED_TRANSACTIONS) class=(LINK_STYLE) { "Transactions" } }
                li { a href=(endpoints::CATEGORIES) class=(LINK_STYLE) { "Categories" } }
                li { a href=(endpoints::RULES) class=(LINK_STYLE) { "Rules" } }
                li { a href=(endpoints::ANALYTICS) class=(LINK_STYLE) { "Analytics" } }
            }

            form method="post" action=(endpoints::SIGN_OUT)
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Sign out" }
            }
        }
    };

    base("Home", &content).into_response()
}

#[cfg(test)]
mod home_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, extract::State, http::StatusCode};
    use rusqlite::Connection;
    use scraper::Selector;

    use crate::{
        auth::{PasswordHash, UserID, create_user, create_user_table},
        endpoints,
        test_utils::{assert_status_ok, assert_valid_html, parse_html_document},
    };

    use super::{HomePageState, get_home_page};

    fn get_state() -> (HomePageState, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        create_user_table(&connection).unwrap();
        let user = create_user(
            "jo@example.com",
            PasswordHash::new_unchecked("hunter2"),
            &connection,
        )
        .unwrap();

        (
            HomePageState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            user.id,
        )
    }

    #[tokio::test]
    async fn home_page_shows_email_and_sign_out() {
        let (state, user_id) = get_state();

        let response = get_home_page(State(state), Extension(user_id)).await;

        assert_status_ok(&response);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        let email = document
            .select(&Selector::parse("#user-email").unwrap())
            .next()
            .unwrap();
        assert_eq!(email.text().collect::<String>(), "jo@example.com");
        let form = document
            .select(&Selector::parse("form").unwrap())
            .next()
            .unwrap();
        assert_eq!(form.value().attr("action"), Some(endpoints::SIGN_OUT));
    }

    #[tokio::test]
    async fn missing_user_is_an_internal_error() {
        let (state, _) = get_state();

        let response = get_home_page(State(state), Extension(UserID::new(999))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
