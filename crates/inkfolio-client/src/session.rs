//! Session carrier — the capability that supplies the current bearer token.
//!
//! The workflow never inspects or refreshes the token; it forwards whatever
//! the carrier returns at each step. There is deliberately no process-wide
//! token singleton: hosts pass a carrier per workflow invocation.

/// Supplies the bearer token for outgoing requests. `None` means anonymous —
/// the backend tracks anonymous usage via its session cookie instead.
pub trait SessionCarrier: Send + Sync {
    fn current_token(&self) -> Option<String>;
}

/// Anonymous session: no token, cookie-tracked quota only.
pub struct Anonymous;

impl SessionCarrier for Anonymous {
    fn current_token(&self) -> Option<String> {
        None
    }
}

/// Fixed token, e.g. one read from storage at startup.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken(token.into())
    }
}

impl SessionCarrier for StaticToken {
    fn current_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
