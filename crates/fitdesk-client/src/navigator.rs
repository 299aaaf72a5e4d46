//! Login redirection hook used by the forced-logout path

use parking_lot::Mutex;
use std::fmt;
use tracing::warn;

/// Sends the user back to the login entry point
///
/// Invoked by the gateway after it has cleared the stored session in
/// response to an unauthorized answer.
pub trait Navigator: Send + Sync + fmt::Debug {
    /// Redirect to `location`, the configured login path
    fn redirect_to_login(&self, location: &str);
}

/// Navigator that only records the redirect in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect_to_login(&self, location: &str) {
        warn!(location = %location, "Session ended, login required");
    }
}

/// Navigator that remembers every redirect it was asked to perform
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations redirected to, oldest first
    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }

    /// Number of redirects performed
    #[must_use]
    pub fn count(&self) -> usize {
        self.visits.lock().len()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, location: &str) {
        self.visits.lock().push(location.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_recording_navigator_keeps_order() {
        let navigator = RecordingNavigator::new();
        navigator.redirect_to_login("/login");
        navigator.redirect_to_login("/signin");

        assert_eq!(navigator.count(), 2);
        assert_eq!(navigator.visits(), vec!["/login", "/signin"]);
    }
}
