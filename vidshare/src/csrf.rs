//! Anti-forgery token negotiation.
//!
//! Every mutating request is preceded by its own round trip to [`CSRF_PATH`].
//! That response only exists to set the [`CSRF_COOKIE`] cookie; its body is
//! discarded and the token is taken from that response's own `Set-Cookie`.
//! A cookie left in the jar by an earlier negotiation is never reused as the
//! token. Tokens are never cached between calls.

use crate::Error;
use percent_encoding::percent_decode_str;
use reqwest::{Client, Response};
use url::Url;

/// Endpoint whose only effect is setting a fresh anti-forgery cookie.
pub const CSRF_PATH: &str = "/api/auth/csrf/";
/// Name of the anti-forgery cookie.
pub const CSRF_COOKIE: &str = "csrftoken";
/// Header that mirrors the cookie on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Requests a fresh cookie from `endpoint` and returns its token.
///
/// Only a transport failure aborts the negotiation; the status of the
/// cookie-issuing response is not inspected. A response that sets no
/// [`CSRF_COOKIE`] yields [`Error::MissingCsrfCookie`].
pub(crate) async fn negotiate(client: &Client, endpoint: Url) -> Result<String, Error> {
    let response = client.get(endpoint).send().await?;
    tracing::debug!(
        status = response.status().as_u16(),
        "anti-forgery cookie requested"
    );
    issued_token(&response).ok_or(Error::MissingCsrfCookie(CSRF_COOKIE))
}

fn issued_token(response: &Response) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name() == CSRF_COOKIE)
        .map(|cookie| decode_cookie_value(cookie.value()))
}

/// URI-decodes a cookie value.
pub(crate) fn decode_cookie_value(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
