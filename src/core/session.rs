//! Purpose: Hold the authenticated session (credential + profile) for one client.
//! Exports: `SessionStore`, `Profile`, `SessionEvent`.
//! Role: Sole owner of session state; every mutation goes through its methods.
//! Invariants: `is_logged_in` is true exactly when a non-empty credential is held.
//! Invariants: `logout` resets credential and profile in a single lock scope.
//! Invariants: Observers run outside the state lock.

use crate::core::credentials::CredentialFile;
use crate::core::error::Error;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub id: Option<u64>,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub fish_balance: u64,
    pub can_claim_daily: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    CredentialChanged,
    ProfileChanged,
    LoggedOut,
}

type Observer = Box<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: Mutex<SessionState>,
    observers: Mutex<Vec<Observer>>,
    credentials: Option<CredentialFile>,
}

struct SessionState {
    token: Option<String>,
    profile: Profile,
}

impl SessionStore {
    /// Builds a session backed by a credential file, rehydrating any token
    /// stored by a previous run.
    pub fn load(credentials: CredentialFile) -> Result<Self, Error> {
        let token = credentials.load()?;
        if token.is_some() {
            debug!(path = %credentials.path().display(), "restored credential");
        }
        Ok(Self::build(token, Some(credentials)))
    }

    /// Builds a session with no persistence. Used by tests and embedders that
    /// manage credentials themselves.
    pub fn in_memory() -> Self {
        Self::build(None, None)
    }

    fn build(token: Option<String>, credentials: Option<CredentialFile>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    token,
                    profile: Profile::default(),
                }),
                observers: Mutex::new(Vec::new()),
                credentials,
            }),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.state()
            .token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    pub fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    pub fn profile(&self) -> Profile {
        self.state().profile.clone()
    }

    /// Stores the credential in memory and in the credential file. The token
    /// is opaque; no shape validation happens here.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), Error> {
        let token = token.into();
        if let Some(credentials) = &self.inner.credentials {
            credentials.store(&token)?;
        }
        self.state().token = Some(token);
        self.notify(&SessionEvent::CredentialChanged);
        Ok(())
    }

    /// Replaces the held profile wholesale.
    pub fn set_profile(&self, profile: Profile) {
        self.state().profile = profile;
        self.notify(&SessionEvent::ProfileChanged);
    }

    /// Records a server-confirmed daily claim: balance moves to the
    /// server-reported value and eligibility clears. Does not perform the
    /// network call.
    pub fn record_daily_claim(&self, new_balance: u64) {
        {
            let mut state = self.state();
            state.profile.fish_balance = new_balance;
            state.profile.can_claim_daily = false;
        }
        self.notify(&SessionEvent::ProfileChanged);
    }

    /// Decrements the balance after a server-confirmed spend. Insufficient
    /// balance is a silent no-op: callers confirm affordability through the
    /// server response, this clamp only keeps the local copy non-negative.
    pub fn record_spend(&self, amount: u64) {
        let changed = {
            let mut state = self.state();
            if state.profile.fish_balance >= amount {
                state.profile.fish_balance -= amount;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify(&SessionEvent::ProfileChanged);
        }
    }

    /// Clears credential and profile together, then removes the persisted
    /// credential.
    pub fn logout(&self) -> Result<(), Error> {
        {
            let mut state = self.state();
            state.token = None;
            state.profile = Profile::default();
        }
        if let Some(credentials) = &self.inner.credentials {
            credentials.clear()?;
        }
        self.notify(&SessionEvent::LoggedOut);
        Ok(())
    }

    pub fn subscribe(&self, observer: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(Box::new(observer));
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn notify(&self, event: &SessionEvent) {
        let observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        for observer in observers.iter() {
            observer(event);
        }
    }
}
