use std::sync::atomic::{AtomicBool, Ordering};

/// Signed-in state of the current user.
///
/// Owned by [`crate::AppContext`] rather than living in module state, so each
/// context (and each test) starts signed out.
#[derive(Debug, Default)]
pub struct SessionState {
    authenticated: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticate(&self) {
        self.authenticated.store(true, Ordering::SeqCst);
        tracing::info!("User signed in");
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn sign_out(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        tracing::info!("User signed out");
    }
}
