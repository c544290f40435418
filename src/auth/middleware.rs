//! The auth gate: decides, for every request, whether it may proceed.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{Method, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::{
        Token, UserID,
        cookie::{get_token_from_cookies, set_token_cookie},
        get_user_by_id,
    },
    endpoints,
};

/// The state needed for the auth gate.
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long a session stays valid without activity.
    pub session_duration: Duration,
    /// Used to check that the session's user still exists.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_duration: state.session_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// The kinds of route the gate treats differently.
#[derive(Debug, PartialEq, Eq)]
enum RouteKind {
    /// Always allowed through, e.g. signing out.
    Open,
    /// The log-in/sign-up pages, only for anonymous visitors.
    Auth,
    /// Reachable whether signed in or not.
    Confirm,
    /// JSON endpoints.
    Api,
    /// Everything else.
    Page,
}

fn classify(method: &Method, path: &str) -> RouteKind {
    if method == Method::POST && path == endpoints::SIGN_OUT {
        RouteKind::Open
    } else if path.contains(endpoints::AUTH_CONFIRM) {
        RouteKind::Confirm
    } else if path == endpoints::AUTH || path.starts_with("/auth/") {
        RouteKind::Auth
    } else if path.starts_with("/api/") || path == "/api" {
        RouteKind::Api
    } else {
        RouteKind::Page
    }
}

/// Resolve the session carried by the request, if it is valid.
///
/// A session is valid when the cookie decrypts, the token has not expired and its user
/// still exists. Anything else is treated as anonymous.
fn authenticate(
    jar: &PrivateCookieJar,
    state: &AuthState,
    now: OffsetDateTime,
) -> Result<Option<Token>, Error> {
    let token = match get_token_from_cookies(jar) {
        Ok(token) => token,
        Err(_) => return Ok(None),
    };

    if token.is_expired(now) {
        tracing::debug!("Session for user {} has expired", token.user_id);
        return Ok(None);
    }

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    match get_user_by_id(token.user_id, &connection) {
        Ok(_) => Ok(Some(token)),
        Err(Error::NotFound) => {
            tracing::warn!("Session refers to unknown user {}", token.user_id);
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Middleware applied to every route.
///
/// - Sign-out requests always pass.
/// - Anonymous requests to API routes get a 401 JSON error, anonymous page requests are
///   redirected to the log-in page.
/// - Signed-in requests to the log-in page are redirected home, except for the confirmation
///   path.
/// - Signed-in requests get the [UserID] as a request extension and have their session
///   extended.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_gate(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let kind = classify(request.method(), request.uri().path());

    if kind == RouteKind::Open {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let jar = jar_from_parts(&mut parts, &state).await;
    let now = OffsetDateTime::now_utc();

    let token = match authenticate(&jar, &state, now) {
        Ok(token) => token,
        Err(error) => return error.into_response(),
    };

    let token = match (token, kind) {
        (None, RouteKind::Api) => return Error::Unauthorized.into_response(),
        (None, RouteKind::Page) => return Redirect::to(endpoints::AUTH).into_response(),
        (None, _) => return next.run(Request::from_parts(parts, body)).await,
        (Some(_), RouteKind::Auth) => return Redirect::to(endpoints::ROOT).into_response(),
        (Some(token), _) => token,
    };

    parts.extensions.insert(token.user_id);
    let response = next.run(Request::from_parts(parts, body)).await;

    match token.extended(now, state.session_duration) {
        Some(extended) => append_session_cookie(response, jar, extended),
        None => response,
    }
}

async fn jar_from_parts(parts: &mut Parts, state: &AuthState) -> PrivateCookieJar {
    match PrivateCookieJar::from_request_parts(parts, state).await {
        Ok(jar) => jar,
        Err(never) => match never {},
    }
}

fn append_session_cookie(response: Response, jar: PrivateCookieJar, token: Token) -> Response {
    let jar = match set_token_cookie(jar, token) {
        Ok(jar) => jar,
        Err(error) => {
            tracing::error!("Error extending session: {error}. Keeping the current cookie.");
            return response;
        }
    };

    let (mut parts, body) = response.into_parts();
    for (key, value) in jar.into_response().headers().iter() {
        if key == SET_COOKIE {
            parts.headers.append(key, value.to_owned());
        }
    }

    Response::from_parts(parts, body)
}
