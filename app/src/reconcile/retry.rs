//! Retry policy for requests rejected with 401.

/// How many times a single channel may refresh the token and retry.
pub const MAX_AUTH_RETRIES: u32 = 1;

/// Where a channel's status request stands with respect to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAttempt {
    First,
    RetriedAfterRefresh,
}

impl AuthAttempt {
    pub fn retries_used(self) -> u32 {
        match self {
            AuthAttempt::First => 0,
            AuthAttempt::RetriedAfterRefresh => 1,
        }
    }

    /// The state after a 401, or `None` once the retry budget is spent.
    pub fn after_unauthorized(self) -> Option<Self> {
        if self.retries_used() >= MAX_AUTH_RETRIES {
            return None;
        }
        match self {
            AuthAttempt::First => Some(AuthAttempt::RetriedAfterRefresh),
            AuthAttempt::RetriedAfterRefresh => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_refresh_then_give_up() {
        assert_eq!(MAX_AUTH_RETRIES, 1);
        let second = AuthAttempt::First.after_unauthorized();
        assert_eq!(second, Some(AuthAttempt::RetriedAfterRefresh));
        assert_eq!(AuthAttempt::RetriedAfterRefresh.after_unauthorized(), None);
    }

    #[test]
    fn attempts_never_exceed_ceiling() {
        let mut attempt = AuthAttempt::First;
        let mut retries = 0;
        while let Some(next) = attempt.after_unauthorized() {
            attempt = next;
            retries += 1;
        }
        assert_eq!(retries, MAX_AUTH_RETRIES);
        assert_eq!(attempt.retries_used(), MAX_AUTH_RETRIES);
    }
}
