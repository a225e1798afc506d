//! Session bootstrap, run once each time a protected view mounts.
//!
//! Outcomes:
//! - no session (or the session lookup fails): clear the store, redirect to the
//!   entry route, render nothing protected;
//! - session for a user other than the cached one: fetch the profile row and cache
//!   it, or clear and redirect if the fetch fails;
//! - session for the cached user: reuse the cache, no fetch.
//!
//! A successful mount returns a `SessionGuard`. While it lives, a sign-out anywhere
//! in the process clears the store and redirects to the entry route. Dropping the
//! guard (the view unmounting) stops the listener.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{Backend, Session};
use crate::session::navigator::{Navigator, Route};
use crate::session::store::{SessionStore, SessionUser};

pub enum Mount {
    Ready { user: SessionUser, guard: SessionGuard },
    Redirected(Route),
}

impl Mount {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Mount::Ready { user, .. } => Some(user),
            Mount::Redirected(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct SessionBootstrap {
    backend: Backend,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
}

impl SessionBootstrap {
    pub fn new(backend: Backend, store: SessionStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            backend,
            store,
            navigator,
        }
    }

    pub async fn mount(&self) -> Mount {
        // Subscribe before looking anything up so a sign-out racing the profile
        // fetch is still observed by the guard.
        let mut changes = self.backend.auth.subscribe();
        changes.borrow_and_update();

        let session = match self.backend.auth.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("No active session");
                return self.bounce();
            }
            Err(e) => {
                warn!("Session check failed: {e}");
                return self.bounce();
            }
        };

        let user = match self.store.get() {
            Some(cached) if cached.id == session.identity() => {
                debug!("Reusing cached profile for user {}", cached.id);
                cached
            }
            _ => match self.load_user(&session).await {
                Some(user) => user,
                None => return self.bounce(),
            },
        };

        let guard = SessionGuard::listen(changes, self.store.clone(), self.navigator.clone());
        Mount::Ready { user, guard }
    }

    async fn load_user(&self, session: &Session) -> Option<SessionUser> {
        let id = session.identity();
        match self.backend.rows.fetch_profile(id).await {
            Ok(Some(profile)) => {
                let user = SessionUser::from_profile(&profile, session.user.email.as_deref());
                self.store.set(user.clone());
                info!("Session store populated for user {id}");
                Some(user)
            }
            Ok(None) => {
                warn!("No profile row for user {id}");
                None
            }
            Err(e) => {
                warn!("Profile fetch failed for user {id}: {e}");
                None
            }
        }
    }

    fn bounce(&self) -> Mount {
        self.store.clear();
        self.navigator.redirect(Route::Entry);
        Mount::Redirected(Route::Entry)
    }
}

/// Scoped session-change listener. Dropping it deregisters the listener.
pub struct SessionGuard {
    task: JoinHandle<()>,
}

impl SessionGuard {
    fn listen(
        mut changes: watch::Receiver<Option<Session>>,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let signed_out = changes.borrow_and_update().is_none();
                if signed_out {
                    info!("Session ended, returning to entry");
                    store.clear();
                    navigator.redirect(Route::Entry);
                    break;
                }
            }
        });
        Self { task }
    }

    /// False once a sign-out has been handled or the auth client went away.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}
