//! Consent Manager
//!
//! Holds the current [`ConsentState`], decides whether tracking may
//! happen, buffers events while consent is pending and notifies
//! listeners on every transition.
//!
//! ## States
//!
//! - **default**: configured defaults, no user action recorded
//! - **explicit**: the user granted, revoked or updated at least once
//!   (a valid stored blob counts as explicit)
//!
//! ## Gate
//!
//! With `wait_for_consent`, tracking is blocked until consent becomes
//! explicit, whatever the default analytics flag says. Otherwise tracking
//! is allowed iff analytics is explicitly `true`.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};
use trailmark_core::config::ConsentConfig;
use trailmark_core::domain::{ConsentCategory, ConsentState, StoredConsent, TrackingEvent};
use trailmark_storage::SafeStorage;

/// Maximum events held while waiting for consent
pub const CONSENT_BUFFER_CAPACITY: usize = 100;

/// Change callback, invoked with `(new_state, previous_state)`
pub type ConsentListener =
    Arc<dyn Fn(&ConsentState, &ConsentState) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`ConsentManager::on_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsentListenerId(u64);

struct ConsentInner {
    state: ConsentState,
    explicit: bool,
    buffer: VecDeque<TrackingEvent>,
    listeners: BTreeMap<u64, ConsentListener>,
    next_listener: u64,
}

/// Consent state holder and tracking gate
pub struct ConsentManager {
    config: ConsentConfig,
    storage: SafeStorage,
    inner: Mutex<ConsentInner>,
}

impl ConsentManager {
    /// Creates the manager and restores any stored consent.
    ///
    /// A stored blob written under another schema version is removed and
    /// the configured defaults apply.
    pub fn new(config: ConsentConfig, storage: SafeStorage) -> Self {
        let (state, explicit) = match storage.get_json::<StoredConsent>(&config.storage_key) {
            Some(stored) if stored.is_current() => {
                debug!(version = stored.version, "Restored stored consent");
                (stored.state, true)
            }
            Some(stored) => {
                info!(
                    stored_version = stored.version,
                    "Stored consent has an outdated schema, using defaults"
                );
                storage.remove(&config.storage_key);
                (config.default_state.clone(), false)
            }
            None => (config.default_state.clone(), false),
        };

        Self {
            inner: Mutex::new(ConsentInner {
                state,
                explicit,
                buffer: VecDeque::new(),
                listeners: BTreeMap::new(),
                next_listener: 0,
            }),
            config,
            storage,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConsentInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current consent state
    pub fn state(&self) -> ConsentState {
        self.lock().state.clone()
    }

    /// True once the user has acted (or a valid stored blob was loaded)
    pub fn has_explicit_consent(&self) -> bool {
        self.lock().explicit
    }

    /// Whether an event may be sent right now
    pub fn can_track(&self) -> bool {
        let inner = self.lock();
        if self.config.wait_for_consent && !inner.explicit {
            return false;
        }
        inner.state.is_granted(ConsentCategory::Analytics)
    }

    /// Whether blocked events should be buffered rather than dropped
    pub fn is_waiting(&self) -> bool {
        self.config.wait_for_consent && !self.lock().explicit
    }

    /// Whether anonymous mode is configured
    pub fn anonymous_mode(&self) -> bool {
        self.config.anonymous_mode
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Overlays the categories `partial` specifies
    pub fn grant(&self, partial: &ConsentState) {
        self.transition(|state| state.merge(partial));
    }

    /// Forces each listed category to `false`
    pub fn revoke(&self, categories: &[ConsentCategory]) {
        self.transition(|state| {
            for category in categories {
                state.set(*category, Some(false));
            }
        });
    }

    /// Replaces the state wholesale
    pub fn update(&self, state: ConsentState) {
        self.transition(move |current| *current = state);
    }

    /// Returns to the configured defaults and clears stored consent
    pub fn reset(&self) {
        let (new_state, previous) = {
            let mut inner = self.lock();
            let previous = std::mem::replace(&mut inner.state, self.config.default_state.clone());
            inner.explicit = false;
            (inner.state.clone(), previous)
        };
        self.storage.remove(&self.config.storage_key);
        info!("Consent reset to defaults");
        self.notify(&new_state, &previous);
    }

    fn transition(&self, apply: impl FnOnce(&mut ConsentState)) {
        let (new_state, previous) = {
            let mut inner = self.lock();
            let previous = inner.state.clone();
            apply(&mut inner.state);
            inner.explicit = true;
            (inner.state.clone(), previous)
        };

        if !self
            .storage
            .set_json(&self.config.storage_key, &StoredConsent::new(new_state.clone()))
        {
            warn!("Consent could not be persisted, it will last for this page only");
        }
        debug!(?new_state, ?previous, "Consent updated");
        self.notify(&new_state, &previous);
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Registers a change callback
    pub fn on_change(&self, listener: ConsentListener) -> ConsentListenerId {
        let mut inner = self.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(id, listener);
        ConsentListenerId(id)
    }

    /// Removes a change callback; returns false if it was not registered
    pub fn remove_listener(&self, id: ConsentListenerId) -> bool {
        self.lock().listeners.remove(&id.0).is_some()
    }

    /// Invokes every listener outside the lock; failures are logged only
    fn notify(&self, new_state: &ConsentState, previous: &ConsentState) {
        let listeners: Vec<(u64, ConsentListener)> = self
            .lock()
            .listeners
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(new_state, previous))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(listener = id, error = %e, "Consent listener failed"),
                Err(_) => error!(listener = id, "Consent listener panicked"),
            }
        }
    }

    // ========================================================================
    // Buffer
    // ========================================================================

    /// Holds an event until consent is decided.
    ///
    /// Returns true if the oldest buffered event was dropped to make room.
    pub fn buffer_event(&self, event: TrackingEvent) -> bool {
        let mut inner = self.lock();
        let evicted = if inner.buffer.len() >= CONSENT_BUFFER_CAPACITY {
            inner.buffer.pop_front();
            true
        } else {
            false
        };
        inner.buffer.push_back(event);
        evicted
    }

    /// Drains and returns every buffered event, oldest first
    pub fn flush_buffer(&self) -> Vec<TrackingEvent> {
        self.lock().buffer.drain(..).collect()
    }

    /// Number of buffered events
    pub fn buffered_len(&self) -> usize {
        self.lock().buffer.len()
    }
}
