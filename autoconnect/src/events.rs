//! Login success notifications.

use squash_credentials::UserContext;
use std::sync::Arc;

/// Raised once per successful interactive login.
#[derive(Clone)]
pub struct LoginSuccessEvent {
    pub session_id: String,
    pub context: UserContext,
    /// Login name and secret just validated by the authentication provider
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginSuccessEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginSuccessEvent")
            .field("session_id", &self.session_id)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Receives login success notifications.
///
/// Implementations must return promptly and never fail the login.
pub trait LoginListener: Send + Sync {
    fn on_login_success(&self, event: &LoginSuccessEvent);
}

/// Fan-out of login events to registered listeners.
#[derive(Default, Clone)]
pub struct LoginEvents {
    listeners: Vec<Arc<dyn LoginListener>>,
}

impl LoginEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn LoginListener>) {
        self.listeners.push(listener);
    }

    /// Notifies every listener exactly once.
    pub fn publish(&self, event: &LoginSuccessEvent) {
        for listener in &self.listeners {
            listener.on_login_success(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl LoginListener for Recorder {
        fn on_login_success(&self, event: &LoginSuccessEvent) {
            self.0.lock().unwrap().push(event.session_id.clone());
        }
    }

    #[test]
    fn test_each_listener_notified_once() {
        let first = Arc::new(Recorder(Mutex::new(Vec::new())));
        let second = Arc::new(Recorder(Mutex::new(Vec::new())));

        let mut events = LoginEvents::new();
        events.subscribe(first.clone());
        events.subscribe(second.clone());

        events.publish(&LoginSuccessEvent {
            session_id: "s1".into(),
            context: UserContext::new("alice"),
            username: "alice".into(),
            password: "pw".into(),
        });

        assert_eq!(*first.0.lock().unwrap(), vec!["s1".to_string()]);
        assert_eq!(*second.0.lock().unwrap(), vec!["s1".to_string()]);
    }

    #[test]
    fn test_debug_hides_password() {
        let event = LoginSuccessEvent {
            session_id: "s1".into(),
            context: UserContext::new("alice"),
            username: "alice".into(),
            password: "pw-secret".into(),
        };
        assert!(!format!("{:?}", event).contains("pw-secret"));
    }
}
