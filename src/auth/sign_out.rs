//! Sign-out handler that clears the session cookies and sends the client back to log in.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;

use crate::{auth::cookie::clear_session_cookies, endpoints};

/// Clear every session cookie and redirect the client to the auth page.
pub async fn post_sign_out(jar: CookieJar) -> Response {
    let jar = clear_session_cookies(jar);

    (jar, Redirect::to(endpoints::AUTH)).into_response()
}

#[cfg(test)]
mod sign_out_tests {
    use axum::{
        body::Body,
        http::{
            HeaderMap, HeaderValue, Response, StatusCode,
            header::{COOKIE, SET_COOKIE},
        },
    };
    use axum_extra::extract::{CookieJar, cookie::Cookie};
    use time::OffsetDateTime;

    use crate::{endpoints, test_utils::get_header};

    use super::post_sign_out;

    #[track_caller]
    fn removed_cookies(response: &Response<Body>) -> Vec<Cookie<'static>> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|header| Cookie::parse(header.to_str().unwrap().to_owned()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn sign_out_clears_session_cookies_and_redirects() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static(
                "tallybook-session=encrypted; tallybook-refresh=encrypted; theme=dark",
            ),
        );

        let response = post_sign_out(CookieJar::from_headers(&headers)).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(get_header(&response, "location"), endpoints::AUTH);

        let cookies = removed_cookies(&response);
        let mut names: Vec<_> = cookies.iter().map(|cookie| cookie.name()).collect();
        names.sort();
        assert_eq!(names, ["tallybook-refresh", "tallybook-session"]);
        for cookie in &cookies {
            assert_eq!(cookie.value(), "");
            assert!(cookie.expires_datetime() < Some(OffsetDateTime::now_utc()));
        }
    }

    #[tokio::test]
    async fn sign_out_without_cookies_still_redirects() {
        let response = post_sign_out(CookieJar::new()).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers().get(SET_COOKIE).is_none());
    }
}
