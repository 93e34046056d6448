//! Signed-in session state shared across views.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lms_core::Clock;
use lms_core::model::{User, UserId};
use storage::repository::{SessionRepository, StorageError, StoredSession};
use tokio::sync::watch;
use tracing::info;

/// Snapshot published to every subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<StoredSession>,
    pub unread_notifications: usize,
    pub unread_announcements: usize,
}

impl SessionState {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user().map(|u| u.id)
    }
}

/// Owns the current session and broadcasts changes over a `watch` channel.
pub struct SessionStore {
    clock: Clock,
    repo: Arc<dyn SessionRepository>,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn SessionRepository>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self { clock, repo, state }
    }

    /// Load the persisted session, if any, and publish it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be read.
    pub async fn restore(&self) -> Result<Option<StoredSession>, StorageError> {
        let session = self.repo.load_session().await?;
        self.update(|state| state.session.clone_from(&session));
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be saved.
    pub async fn sign_in(
        &self,
        user: User,
        token: impl Into<String>,
    ) -> Result<StoredSession, StorageError> {
        let session = StoredSession {
            user,
            token: token.into(),
            saved_at: self.clock.now(),
        };
        self.repo.save_session(&session).await?;
        info!(user_id = %session.user.id, "signed in");
        self.state.send_replace(SessionState {
            session: Some(session.clone()),
            ..SessionState::default()
        });
        Ok(session)
    }

    /// Forget the session and reset all published state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session row cannot be removed.
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        self.repo.clear_session().await?;
        self.state.send_replace(SessionState::default());
        info!("signed out");
        Ok(())
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Mutate the published state; subscribers are woken only on change.
    pub fn update(&self, f: impl FnOnce(&mut SessionState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }

    pub fn set_unread_notifications(&self, count: usize) {
        self.update(|state| state.unread_notifications = count);
    }

    pub fn set_unread_announcements(&self, count: usize) {
        self.update(|state| state.unread_announcements = count);
    }
}

//
// ─── LIVENESS ──────────────────────────────────────────────────────────────────
//

/// Held by a view for as long as it is shown. Dropping it marks every
/// [`Liveness`] handed out as dead.
#[derive(Debug)]
pub struct ViewGuard {
    alive: Arc<AtomicBool>,
}

impl ViewGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    #[must_use]
    pub fn liveness(&self) -> Liveness {
        Liveness {
            alive: Arc::clone(&self.alive),
        }
    }
}

impl Default for ViewGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ViewGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Cheap handle async work checks before applying its result.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Liveness {
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// `Some(value)` while the view is alive, otherwise the value is dropped.
    #[must_use]
    pub fn deliver<T>(&self, value: T) -> Option<T> {
        self.is_alive().then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn user() -> User {
        User {
            id: UserId::new(9),
            name: "Lin".into(),
            email: None,
            username: None,
            role: Some("student".into()),
        }
    }

    #[tokio::test]
    async fn sign_in_publishes_and_persists() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = SessionStore::new(fixed_clock(), repo.clone());
        let mut rx = store.subscribe();

        store.sign_in(user(), "tok").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().user_id(), Some(UserId::new(9)));

        let restored = SessionStore::new(fixed_clock(), repo);
        let session = restored.restore().await.unwrap().unwrap();
        assert_eq!(session.saved_at, fixed_now());
        assert_eq!(restored.current().user_id(), Some(UserId::new(9)));
    }

    #[tokio::test]
    async fn unchanged_counts_do_not_wake_subscribers() {
        let store = SessionStore::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        let mut rx = store.subscribe();

        store.set_unread_notifications(3);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.set_unread_notifications(3);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn sign_out_resets_state() {
        let store = SessionStore::new(fixed_clock(), Arc::new(InMemoryRepository::new()));
        store.sign_in(user(), "tok").await.unwrap();
        store.set_unread_announcements(2);

        store.sign_out().await.unwrap();
        assert_eq!(store.current(), SessionState::default());
        assert!(store.restore().await.unwrap().is_none());
    }

    #[test]
    fn dropped_guard_discards_results() {
        let guard = ViewGuard::new();
        let liveness = guard.liveness();
        assert_eq!(liveness.deliver(1), Some(1));

        drop(guard);
        assert!(!liveness.is_alive());
        assert_eq!(liveness.deliver(2), None);
    }
}
