//! The log-in / sign-up page and its form actions.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        PasswordHash, REMEMBER_ME_SESSION_DURATION, User, ValidatedPassword, create_user,
        get_user_by_email, normalize_email, set_session_cookie,
    },
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, auth_card, base, email_input, password_input},
    internal_server_error::InternalServerError,
};

pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Incorrect email or password.";
pub const DUPLICATE_EMAIL_ERROR_MSG: &str = "An account with that email already exists.";
const INTERNAL_ERROR_MSG: &str = "An internal error occurred. Please try again later.";

/// The state needed to log in or sign up.
#[derive(Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long a session lasts without "remember me".
    pub session_duration: Duration,
    /// The bcrypt cost for new passwords.
    pub password_cost: u32,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_duration: state.session_duration,
            password_cost: PasswordHash::DEFAULT_COST,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// Which form to show first on the auth page.
#[derive(Deserialize, Default)]
pub struct AuthPageQuery {
    pub mode: Option<String>,
}

/// The form actions handled by `POST /auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthAction {
    Login,
    Signup,
}

/// The raw data entered by the user in either auth form.
#[derive(Clone, Deserialize)]
pub struct AuthFormData {
    pub action: AuthAction,
    pub email: String,
    pub password: String,
    /// Checkbox value: present means "remember me", absent means a normal session.
    pub remember_me: Option<String>,
}

fn log_in_form(email: &str, error_message: Option<&str>) -> Markup {
    html! {
        form
            method="post"
            action=(endpoints::AUTH)
            hx-post=(endpoints::AUTH)
            hx-target="#auth-forms"
            class="space-y-4 md:space-y-6"
        {
            input type="hidden" name="action" value="login";

            (email_input("login-email", email))
            (password_input("login-password", error_message))

            div class="flex items-center gap-x-3"
            {
                input type="checkbox" name="remember_me" id="remember_me" class="rounded-xs";

                label for="remember_me" class="block text-sm font-medium text-gray-900 dark:text-white"
                {
                    "Keep me logged in for one week"
                }
            }

            button type="submit" id="login-button" class=(BUTTON_PRIMARY_STYLE) { "Log in" }
        }
    }
}

fn sign_up_form(email: &str, error_message: Option<&str>) -> Markup {
    html! {
        form
            method="post"
            action=(endpoints::AUTH)
            hx-post=(endpoints::AUTH)
            hx-target="#auth-forms"
            class="space-y-4 md:space-y-6"
        {
            input type="hidden" name="action" value="signup";

            (email_input("signup-email", email))
            (password_input("signup-password", error_message))

            button type="submit" id="signup-button" class=(BUTTON_PRIMARY_STYLE) { "Sign up" }
        }
    }
}

fn auth_forms(log_in: Markup, sign_up: Markup) -> Markup {
    html! {
        div id="auth-forms" class="space-y-8"
        {
            (log_in)

            p class="text-sm font-light text-gray-500 dark:text-gray-400" { "New here? Create an account." }

            (sign_up)
        }
    }
}

/// Display the log-in / sign-up page.
pub async fn get_auth_page(Query(query): Query<AuthPageQuery>) -> Response {
    let title = match query.mode.as_deref() {
        Some("signup") => "Create an account",
        _ => "Log in to your account",
    };
    let forms = auth_forms(log_in_form("", None), sign_up_form("", None));

    base("Log In", &auth_card(title, &forms)).into_response()
}

/// Handle the log-in and sign-up form actions.
///
/// On success the session cookie is set and the client is sent to the home page, both with a
/// plain 303 redirect and an `HX-Redirect` header for htmx submissions. On failure the forms
/// are returned with an error message under the password field of the submitted form.
pub async fn post_auth(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Form(form): Form<AuthFormData>,
) -> Response {
    let result = match form.action {
        AuthAction::Login => log_in(&state, &form),
        AuthAction::Signup => sign_up(&state, &form),
    };

    let user = match result {
        Ok(user) => user,
        Err(message) => return render_form_error(&form, &message),
    };

    let duration = if form.remember_me.is_some() {
        REMEMBER_ME_SESSION_DURATION
    } else {
        state.session_duration
    };

    match set_session_cookie(jar, user.id, duration) {
        Ok(jar) => (
            jar,
            HxRedirect(endpoints::ROOT.to_owned()),
            Redirect::to(endpoints::ROOT),
        )
            .into_response(),
        Err(error) => {
            tracing::error!("Error setting session cookie: {error}");
            InternalServerError::default().into_response()
        }
    }
}

fn log_in(state: &LoginState, form: &AuthFormData) -> Result<User, String> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        INTERNAL_ERROR_MSG.to_owned()
    })?;

    let user = match get_user_by_email(&form.email, &connection) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(INVALID_CREDENTIALS_ERROR_MSG.to_owned()),
        Err(error) => {
            tracing::error!("Unhandled error while looking up user: {error}");
            return Err(INTERNAL_ERROR_MSG.to_owned());
        }
    };

    match user.password_hash.verify(&form.password) {
        Ok(true) => Ok(user),
        Ok(false) => Err(INVALID_CREDENTIALS_ERROR_MSG.to_owned()),
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            Err(INTERNAL_ERROR_MSG.to_owned())
        }
    }
}

fn sign_up(state: &LoginState, form: &AuthFormData) -> Result<User, String> {
    let email = normalize_email(&form.email).map_err(|error| error.to_string())?;
    let password =
        ValidatedPassword::new(&form.password, &[email.as_str()]).map_err(|error| error.to_string())?;
    let password_hash = PasswordHash::new(password, state.password_cost).map_err(|error| {
        tracing::error!("Could not hash password: {error}");
        INTERNAL_ERROR_MSG.to_owned()
    })?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        INTERNAL_ERROR_MSG.to_owned()
    })?;

    match create_user(&email, password_hash, &connection) {
        Ok(user) => {
            tracing::info!("Registered user {}", user.id);
            Ok(user)
        }
        Err(Error::DuplicateEmail) => Err(DUPLICATE_EMAIL_ERROR_MSG.to_owned()),
        Err(error) => {
            tracing::error!("Could not create user: {error}");
            Err(INTERNAL_ERROR_MSG.to_owned())
        }
    }
}

fn render_form_error(form: &AuthFormData, message: &str) -> Response {
    let forms = match form.action {
        AuthAction::Login => auth_forms(
            log_in_form(&form.email, Some(message)),
            sign_up_form("", None),
        ),
        AuthAction::Signup => auth_forms(
            log_in_form("", None),
            sign_up_form(&form.email, Some(message)),
        ),
    };

    (StatusCode::OK, forms).into_response()
}

/// The landing path after following a confirmation link.
///
/// Signed-in users continue to `next` when it is a local path, everyone else is sent to the
/// log-in page.
#[derive(Deserialize, Default)]
pub struct ConfirmQuery {
    pub next: Option<String>,
}

pub async fn get_confirm(
    user_id: Option<axum::Extension<crate::auth::UserID>>,
    Query(query): Query<ConfirmQuery>,
) -> Redirect {
    if user_id.is_none() {
        return Redirect::to(endpoints::AUTH);
    }

    match query.next.as_deref() {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => Redirect::to(next),
        Some(next) => {
            tracing::warn!("Ignoring non-local confirmation redirect: {next}");
            Redirect::to(endpoints::ROOT)
        }
        None => Redirect::to(endpoints::ROOT),
    }
}

#[cfg(test)]
mod log_in_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        body::Body,
        extract::{Query, State},
        http::{Response, StatusCode, header::SET_COOKIE},
        response::IntoResponse,
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
    use rusqlite::Connection;
    use scraper::Selector;
    use time::OffsetDateTime;

    use crate::{
        app_state::create_cookie_key,
        auth::{
            COOKIE_TOKEN, DEFAULT_SESSION_DURATION, PasswordHash, UserID, ValidatedPassword,
            create_user, create_user_table, get_user_by_email,
        },
        endpoints,
        test_utils::{
            assert_hx_redirect, assert_valid_html, get_header, parse_html_document,
            parse_html_fragment,
        },
    };

    use super::{
        AuthAction, AuthFormData, AuthPageQuery, ConfirmQuery, DUPLICATE_EMAIL_ERROR_MSG,
        INVALID_CREDENTIALS_ERROR_MSG, LoginState, get_auth_page, get_confirm, post_auth,
    };

    const TEST_PASSWORD: &str = "averysafeandsecurepassword";

    fn get_state() -> LoginState {
        let connection = Connection::open_in_memory().unwrap();
        create_user_table(&connection).unwrap();
        let password_hash =
            PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4).unwrap();
        create_user("jo@example.com", password_hash, &connection).unwrap();

        LoginState {
            cookie_key: create_cookie_key("log in tests"),
            session_duration: DEFAULT_SESSION_DURATION,
            password_cost: 4,
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    fn form(action: AuthAction, email: &str, password: &str) -> AuthFormData {
        AuthFormData {
            action,
            email: email.to_owned(),
            password: password.to_owned(),
            remember_me: None,
        }
    }

    async fn submit(state: LoginState, form: AuthFormData) -> Response<Body> {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        post_auth(State(state), jar, Form(form)).await
    }

    #[track_caller]
    fn assert_session_cookie_set(response: &Response<Body>) {
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|header| Cookie::parse(header.to_str().ok()?.to_owned()).ok())
            .find(|cookie| cookie.name() == COOKIE_TOKEN)
            .expect("session cookie not set");

        assert!(cookie.expires_datetime() > Some(OffsetDateTime::now_utc()));
    }

    async fn assert_form_error(response: Response<Body>, message: &str) {
        assert_eq!(response.status(), StatusCode::OK);
        let fragment = parse_html_fragment(response).await;
        let selector = Selector::parse("p.text-red-500").unwrap();
        let text: String = fragment
            .select(&selector)
            .next()
            .expect("expected an error message")
            .text()
            .collect();
        assert_eq!(text.trim(), message);
    }

    #[tokio::test]
    async fn auth_page_has_both_forms() {
        let response = get_auth_page(Query(AuthPageQuery::default())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        let actions = Selector::parse("input[name=action]").unwrap();
        let values: Vec<_> = document
            .select(&actions)
            .filter_map(|input| input.value().attr("value"))
            .collect();
        assert_eq!(values, ["login", "signup"]);
    }

    #[tokio::test]
    async fn log_in_with_valid_credentials_redirects_home() {
        let response = submit(
            get_state(),
            form(AuthAction::Login, "Jo@Example.com", TEST_PASSWORD),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(get_header(&response, "location"), endpoints::ROOT);
        assert_hx_redirect(&response, endpoints::ROOT);
        assert_session_cookie_set(&response);
    }

    #[tokio::test]
    async fn log_in_with_wrong_password_shows_error() {
        let response = submit(
            get_state(),
            form(AuthAction::Login, "jo@example.com", "not-the-password"),
        )
        .await;

        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_form_error(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn log_in_with_unknown_email_shows_same_error() {
        let response = submit(
            get_state(),
            form(AuthAction::Login, "someone@example.com", TEST_PASSWORD),
        )
        .await;

        assert_form_error(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn sign_up_creates_user_and_session() {
        let state = get_state();

        let response = submit(
            state.clone(),
            form(
                AuthAction::Signup,
                "sam@example.com",
                "correct-horse-battery-staple-9!",
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_session_cookie_set(&response);
        let connection = state.db_connection.lock().unwrap();
        assert!(get_user_by_email("sam@example.com", &connection).is_ok());
    }

    #[tokio::test]
    async fn sign_up_with_existing_email_shows_error() {
        let response = submit(
            get_state(),
            form(
                AuthAction::Signup,
                "jo@example.com",
                "correct-horse-battery-staple-9!",
            ),
        )
        .await;

        assert_form_error(response, DUPLICATE_EMAIL_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn sign_up_with_weak_password_shows_error() {
        let response = submit(
            get_state(),
            form(AuthAction::Signup, "sam@example.com", "password"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let fragment = parse_html_fragment(response).await;
        let selector = Selector::parse("p.text-red-500").unwrap();
        let text: String = fragment.select(&selector).next().unwrap().text().collect();
        assert!(text.starts_with("password is too weak"), "got {text}");
    }

    #[tokio::test]
    async fn confirm_sends_anonymous_users_to_log_in() {
        let response = get_confirm(None, Query(ConfirmQuery::default()))
            .await
            .into_response();

        assert_eq!(get_header(&response, "location"), endpoints::AUTH);
    }

    #[tokio::test]
    async fn confirm_only_follows_local_paths() {
        let user = Some(Extension(UserID::new(1)));

        let local = get_confirm(
            user.clone(),
            Query(ConfirmQuery {
                next: Some("/categories".to_owned()),
            }),
        )
        .await
        .into_response();
        let external = get_confirm(
            user,
            Query(ConfirmQuery {
                next: Some("//evil.example.com".to_owned()),
            }),
        )
        .await
        .into_response();

        assert_eq!(get_header(&local, "location"), "/categories");
        assert_eq!(get_header(&external, "location"), endpoints::ROOT);
    }
}
