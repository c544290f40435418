#![allow(missing_docs)]

pub(crate) mod app;
pub(crate) mod html;
pub(crate) mod http;
pub(crate) mod seed;

pub(crate) use app::{TestApp, signed_in_app, signed_in_app_with, test_state};
pub(crate) use html::{assert_valid_html, parse_html_document, parse_html_fragment};
pub(crate) use http::{assert_content_type, assert_hx_redirect, assert_status_ok, get_header};
pub(crate) use seed::{
    alloc, seed_account, seed_category, seed_transaction, seed_user, test_connection,
};
