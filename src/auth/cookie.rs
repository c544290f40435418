//! Reading and writing the encrypted session cookie.

use axum_extra::extract::{
    CookieJar, PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{Token, UserID},
};

/// Every cookie the app sets for a session starts with this prefix.
pub const SESSION_COOKIE_PREFIX: &str = "tallybook-";
/// The cookie holding the encrypted [Token].
pub const COOKIE_TOKEN: &str = "tallybook-session";
/// How long a session lasts without activity.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::minutes(30);
/// How long a session lasts when the user asks to be remembered.
pub const REMEMBER_ME_SESSION_DURATION: Duration = Duration::days(7);

/// Add a session cookie for `user_id` that is valid for `duration` from now.
///
/// # Errors
///
/// Returns [Error::InvalidDateFormat] if the token cannot be serialized.
pub fn set_session_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let token = Token::new(user_id, OffsetDateTime::now_utc(), duration);

    set_token_cookie(jar, token)
}

pub(super) fn set_token_cookie(
    jar: PrivateCookieJar,
    token: Token,
) -> Result<PrivateCookieJar, Error> {
    let value =
        serde_json::to_string(&token).map_err(|error| Error::InvalidDateFormat(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, value))
            .expires(token.expires_at)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

/// Decrypt and parse the session token.
///
/// # Errors
///
/// Returns [Error::CookieMissing] if there is no cookie that decrypts with the server key, or
/// [Error::Unauthorized] if its contents are not a token.
pub fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;

    serde_json::from_str(cookie.value_trimmed()).map_err(|error| {
        tracing::warn!("Could not parse session token: {error}");
        Error::Unauthorized
    })
}

/// Expire every cookie in `jar` whose name starts with [SESSION_COOKIE_PREFIX].
///
/// The plain jar is used so cookies that no longer decrypt, e.g. after the server secret
/// changed, are cleared as well.
pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    let names: Vec<String> = jar
        .iter()
        .map(|cookie| cookie.name().to_owned())
        .filter(|name| name.starts_with(SESSION_COOKIE_PREFIX))
        .collect();

    names.into_iter().fold(jar, |jar, name| {
        jar.remove(Cookie::build((name, "")).path("/"))
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
    use axum_extra::extract::{CookieJar, PrivateCookieJar};
    use time::{Duration, OffsetDateTime};

    use crate::{Error, app_state::create_cookie_key, auth::UserID};

    use super::{
        COOKIE_TOKEN, clear_session_cookies, get_token_from_cookies, set_session_cookie,
    };

    fn get_jar() -> PrivateCookieJar {
        PrivateCookieJar::new(create_cookie_key("cookie tests"))
    }

    #[test]
    fn session_cookie_round_trips_token() {
        let jar = set_session_cookie(get_jar(), UserID::new(7), Duration::minutes(5)).unwrap();

        let token = get_token_from_cookies(&jar).unwrap();

        assert_eq!(token.user_id, UserID::new(7));
        assert!(token.expires_at > OffsetDateTime::now_utc());
    }

    #[test]
    fn session_cookie_is_locked_down() {
        let jar = set_session_cookie(get_jar(), UserID::new(7), Duration::minutes(5)).unwrap();

        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn missing_cookie_is_reported() {
        assert_eq!(get_token_from_cookies(&get_jar()), Err(Error::CookieMissing));
    }

    #[test]
    fn clear_removes_only_prefixed_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("tallybook-session=abc; tallybook-remember=1; theme=dark"),
        );

        let jar = clear_session_cookies(CookieJar::from_headers(&headers));

        assert!(jar.get("tallybook-session").is_none());
        assert!(jar.get("tallybook-remember").is_none());
        assert!(jar.get("theme").is_some());

        let mut remaining: Vec<_> = jar.iter().map(|cookie| cookie.name().to_owned()).collect();
        remaining.sort();
        assert_eq!(remaining, ["theme"]);
    }
}
