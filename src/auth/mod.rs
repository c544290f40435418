//! Sessions, users and the pages for signing in and out.

mod cookie;
mod log_in;
mod middleware;
mod password;
mod sign_out;
mod token;
mod user;

pub use cookie::{
    COOKIE_TOKEN, DEFAULT_SESSION_DURATION, REMEMBER_ME_SESSION_DURATION, SESSION_COOKIE_PREFIX,
    clear_session_cookies, get_token_from_cookies, set_session_cookie,
};
pub use log_in::{get_auth_page, get_confirm, post_auth};
pub use middleware::{AuthState, auth_gate};
pub use password::{PasswordHash, ValidatedPassword};
pub use sign_out::post_sign_out;
pub use token::Token;
pub use user::{
    User, UserID, create_user, create_user_table, get_user_by_email, get_user_by_id,
    normalize_email, update_password,
};
