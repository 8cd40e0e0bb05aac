//! Bearer-token authentication hook.

use axum::http::{header, HeaderMap};

/// Decides whether a request's bearer token grants access.
/// `token` is `None` when no `Authorization: Bearer ...` header was sent.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: Option<&str>) -> bool;
}

/// Accepts every request. The default until a real validator is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAnyToken;

impl TokenValidator for AcceptAnyToken {
    fn validate(&self, _token: Option<&str>) -> bool {
        true
    }
}

impl<F> TokenValidator for F
where
    F: Fn(Option<&str>) -> bool + Send + Sync,
{
    fn validate(&self, token: Option<&str>) -> bool {
        self(token)
    }
}

/// Token from `Authorization: Bearer <token>`. Scheme match is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
