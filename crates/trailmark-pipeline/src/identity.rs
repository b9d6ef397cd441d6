//! Identity Manager
//!
//! Produces the `(visitor_id, session_id)` pair under four mutually
//! exclusive modes, chosen by precedence:
//!
//! 1. [`IdentityMode::Anonymous`]: anonymous mode configured and no
//!    explicit consent recorded; `anon_` id in session storage
//! 2. [`IdentityMode::Cookieless`]: `anon_` id in session storage
//! 3. [`IdentityMode::Cookie`]: one-year first-party cookie
//! 4. [`IdentityMode::Persistent`]: long-lived persistent storage
//!
//! Session ids slide: every read refreshes the last-activity timestamp,
//! and a read after more than `session_timeout` of inactivity starts a
//! new session. Storage failures never surface: with nowhere to keep an
//! identifier, every call returns a fresh transient one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};
use trailmark_core::config::TrackerConfig;
use trailmark_core::domain::{SessionId, VisitorId};
use trailmark_core::ports::CookieOptions;
use trailmark_storage::{keys, SafeCookies, SafeStorage};

use crate::consent::ConsentManager;

/// Visitor cookie lifetime
const VISITOR_COOKIE_DAYS: u32 = 365;

/// Wall clock in epoch milliseconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Where the visitor id lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    Anonymous,
    Cookieless,
    Cookie,
    Persistent,
}

impl IdentityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityMode::Anonymous => "anonymous",
            IdentityMode::Cookieless => "cookieless",
            IdentityMode::Cookie => "cookie",
            IdentityMode::Persistent => "persistent",
        }
    }

    /// Whether ids minted in this mode are session-scoped
    pub fn is_session_scoped(&self) -> bool {
        matches!(self, IdentityMode::Anonymous | IdentityMode::Cookieless)
    }
}

/// Backing stores for identifiers
#[derive(Clone)]
pub struct IdentityStores {
    /// localStorage-shaped, survives restarts
    pub persistent: SafeStorage,
    /// sessionStorage-shaped, tab lifetime
    pub session: SafeStorage,
    pub cookies: SafeCookies,
}

/// Identity-related configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOptions {
    pub anonymous_mode: bool,
    pub cookieless: bool,
    pub use_cookies: bool,
    pub cookie_domain: Option<String>,
    pub session_timeout: Duration,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for IdentityOptions {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            anonymous_mode: config.consent.anonymous_mode,
            cookieless: config.cookieless_mode,
            use_cookies: config.use_cookies,
            cookie_domain: config.cookie_domain.clone(),
            session_timeout: Duration::from_millis(config.session_timeout_ms),
        }
    }
}

/// Visitor and session identifier source
pub struct IdentityManager {
    stores: IdentityStores,
    options: IdentityOptions,
    consent: Arc<ConsentManager>,
    clock: Clock,
    mode: Mutex<IdentityMode>,
}

impl IdentityManager {
    /// Creates the manager. The consent manager must already exist because
    /// anonymous mode depends on whether consent is explicit.
    pub fn new(
        stores: IdentityStores,
        options: IdentityOptions,
        consent: Arc<ConsentManager>,
    ) -> Self {
        let mode = resolve_mode(&options, consent.has_explicit_consent());
        debug!(mode = mode.as_str(), "Identity mode selected");
        Self {
            stores,
            options,
            consent,
            clock: Arc::new(|| Utc::now().timestamp_millis()),
            mode: Mutex::new(mode),
        }
    }

    /// Replaces the wall clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn mode(&self) -> IdentityMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_mode(&self, mode: IdentityMode) {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    // ========================================================================
    // Visitor
    // ========================================================================

    /// Current visitor id, minted on first use.
    ///
    /// When the mode's store cannot be written the id is transient and the
    /// next call mints another.
    pub fn visitor_id(&self) -> VisitorId {
        let mode = self.mode();
        if let Some(stored) = self.read_visitor(mode) {
            return stored;
        }

        let id = if mode.is_session_scoped() {
            VisitorId::anonymous()
        } else {
            VisitorId::generate()
        };
        if self.write_visitor(mode, &id) {
            info!(mode = mode.as_str(), visitor_id = %id, "New visitor id");
        } else {
            debug!(mode = mode.as_str(), visitor_id = %id, "Visitor id not stored, transient");
        }
        id
    }

    fn read_visitor(&self, mode: IdentityMode) -> Option<VisitorId> {
        let raw = match mode {
            IdentityMode::Anonymous | IdentityMode::Cookieless => {
                self.stores.session.get(keys::VISITOR_ID)
            }
            IdentityMode::Cookie => self.stores.cookies.get(keys::VISITOR_COOKIE),
            IdentityMode::Persistent => self.stores.persistent.get(keys::VISITOR_ID),
        }?;
        let id: VisitorId = raw.parse().ok()?;
        // A persistent id is never reused in a session-scoped mode and vice versa
        (id.is_anonymous() == mode.is_session_scoped()).then_some(id)
    }

    fn write_visitor(&self, mode: IdentityMode, id: &VisitorId) -> bool {
        match mode {
            IdentityMode::Anonymous | IdentityMode::Cookieless => {
                self.stores.session.set(keys::VISITOR_ID, id.as_str())
            }
            IdentityMode::Cookie => self.stores.cookies.set(
                keys::VISITOR_COOKIE,
                id.as_str(),
                &self.cookie_options(),
            ),
            IdentityMode::Persistent => self.stores.persistent.set(keys::VISITOR_ID, id.as_str()),
        }
    }

    fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            max_age_days: VISITOR_COOKIE_DAYS,
            domain: self.options.cookie_domain.clone(),
            ..CookieOptions::default()
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    fn session_store(&self) -> &SafeStorage {
        if self.mode().is_session_scoped() {
            &self.stores.session
        } else {
            &self.stores.persistent
        }
    }

    /// Current session id; every call also records activity
    pub fn session_id(&self) -> SessionId {
        let now = (self.clock)();
        let store = self.session_store();
        let timeout = self.options.session_timeout.as_millis() as i64;

        let stored = store
            .get(keys::SESSION_ID)
            .and_then(|raw| raw.parse::<SessionId>().ok())
            .zip(
                store
                    .get(keys::SESSION_LAST_ACTIVITY)
                    .and_then(|raw| raw.trim().parse::<i64>().ok()),
            );

        let session_id = match stored {
            Some((id, last)) if now - last <= timeout => id,
            Some((id, last)) => {
                let fresh = SessionId::new();
                info!(expired = %id, idle_ms = now - last, session_id = %fresh, "Session expired");
                fresh
            }
            None => {
                let fresh = SessionId::new();
                debug!(session_id = %fresh, "New session");
                fresh
            }
        };
        let persisted = store.set(keys::SESSION_ID, &session_id.to_string())
            && store.set(keys::SESSION_LAST_ACTIVITY, &now.to_string());
        if !persisted {
            debug!(session_id = %session_id, "Session not stored, transient");
        }
        session_id
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Removes every identifier from every store
    pub fn clear_all(&self) {
        for store in [&self.stores.persistent, &self.stores.session] {
            store.remove(keys::VISITOR_ID);
            store.remove(keys::SESSION_ID);
            store.remove(keys::SESSION_LAST_ACTIVITY);
        }
        self.stores
            .cookies
            .remove(keys::VISITOR_COOKIE, self.options.cookie_domain.as_deref());
        debug!("Identifiers cleared");
    }

    /// Clears all identifiers and mints new ones (logout)
    pub fn reset(&self) -> (VisitorId, SessionId) {
        self.clear_all();
        self.set_mode(resolve_mode(&self.options, self.consent.has_explicit_consent()));
        let visitor = self.visitor_id();
        let session = self.session_id();
        info!(mode = self.mode().as_str(), visitor_id = %visitor, "Identity reset");
        (visitor, session)
    }

    /// Leaves anonymous mode once consent is explicit.
    ///
    /// The anonymous id is discarded and the next mode in precedence mints
    /// the replacement. Outside anonymous mode this is just [`Self::visitor_id`].
    pub fn upgrade_after_consent(&self) -> VisitorId {
        if self.mode() != IdentityMode::Anonymous {
            return self.visitor_id();
        }

        let session = self
            .stores
            .session
            .get(keys::SESSION_ID)
            .zip(self.stores.session.get(keys::SESSION_LAST_ACTIVITY));
        self.stores.session.remove(keys::VISITOR_ID);

        let next = resolve_mode(&self.options, true);
        self.set_mode(next);

        // Keep the running session in its new home
        if let Some((id, last)) = session {
            let store = self.session_store();
            store.set(keys::SESSION_ID, &id);
            store.set(keys::SESSION_LAST_ACTIVITY, &last);
        }

        let id = self.visitor_id();
        info!(mode = next.as_str(), visitor_id = %id, "Identity upgraded after consent");
        id
    }
}

fn resolve_mode(options: &IdentityOptions, explicit_consent: bool) -> IdentityMode {
    if options.anonymous_mode && !explicit_consent {
        IdentityMode::Anonymous
    } else if options.cookieless {
        IdentityMode::Cookieless
    } else if options.use_cookies {
        IdentityMode::Cookie
    } else {
        IdentityMode::Persistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use trailmark_core::config::ConsentConfig;
    use trailmark_core::domain::ConsentState;
    use trailmark_core::ports::IKeyValueStore;
    use trailmark_storage::{MemoryCookieJar, MemoryStore};

    struct Fixture {
        persistent: Arc<MemoryStore>,
        session: Arc<MemoryStore>,
        jar: Arc<MemoryCookieJar>,
        consent: Arc<ConsentManager>,
        now: Arc<AtomicI64>,
    }

    impl Fixture {
        fn new(anonymous_mode: bool) -> Self {
            let persistent = Arc::new(MemoryStore::new());
            let consent = ConsentManager::new(
                ConsentConfig {
                    anonymous_mode,
                    ..ConsentConfig::default()
                },
                SafeStorage::new(persistent.clone()),
            );
            Self {
                persistent,
                session: Arc::new(MemoryStore::new()),
                jar: Arc::new(MemoryCookieJar::new()),
                consent: Arc::new(consent),
                now: Arc::new(AtomicI64::new(1_700_000_000_000)),
            }
        }

        fn manager(&self, options: IdentityOptions) -> IdentityManager {
            let now = self.now.clone();
            IdentityManager::new(
                IdentityStores {
                    persistent: SafeStorage::new(self.persistent.clone()),
                    session: SafeStorage::new(self.session.clone()),
                    cookies: SafeCookies::new(self.jar.clone()),
                },
                options,
                self.consent.clone(),
            )
            .with_clock(Arc::new(move || now.load(Ordering::SeqCst)))
        }

        fn advance(&self, ms: i64) {
            self.now.fetch_add(ms, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_persistent_mode_is_stable_across_instances() {
        let fx = Fixture::new(false);
        let first = fx.manager(IdentityOptions::default());
        assert_eq!(first.mode(), IdentityMode::Persistent);
        let id = first.visitor_id();
        assert!(!id.is_anonymous());
        assert_eq!(first.visitor_id(), id);

        let second = fx.manager(IdentityOptions::default());
        assert_eq!(second.visitor_id(), id);
        assert_eq!(fx.persistent.get(keys::VISITOR_ID).unwrap().unwrap(), id.as_str());
    }

    #[test]
    fn test_mode_precedence() {
        let fx = Fixture::new(true);
        let all = IdentityOptions {
            anonymous_mode: true,
            cookieless: true,
            use_cookies: true,
            ..IdentityOptions::default()
        };
        assert_eq!(fx.manager(all.clone()).mode(), IdentityMode::Anonymous);
        assert_eq!(resolve_mode(&all, true), IdentityMode::Cookieless);

        let cookie = IdentityOptions {
            use_cookies: true,
            ..IdentityOptions::default()
        };
        assert_eq!(resolve_mode(&cookie, false), IdentityMode::Cookie);
    }

    #[test]
    fn test_cookie_mode_sets_year_long_cookie() {
        let fx = Fixture::new(false);
        let identity = fx.manager(IdentityOptions {
            use_cookies: true,
            cookie_domain: Some(".example.com".into()),
            ..IdentityOptions::default()
        });
        let id = identity.visitor_id();

        let cookie = fx.jar.cookie(keys::VISITOR_COOKIE).unwrap();
        assert_eq!(cookie.value, id.as_str());
        assert_eq!(cookie.domain.as_deref(), Some(".example.com"));
        let days = (cookie.expires - Utc::now()).num_days();
        assert!((364..=365).contains(&days));
        assert!(fx.persistent.get(keys::VISITOR_ID).unwrap().is_none());
    }

    #[test]
    fn test_cookieless_uses_session_storage_only() {
        let fx = Fixture::new(false);
        let identity = fx.manager(IdentityOptions {
            cookieless: true,
            ..IdentityOptions::default()
        });
        let id = identity.visitor_id();
        identity.session_id();

        assert!(id.is_anonymous());
        assert!(fx.persistent.get(keys::VISITOR_ID).unwrap().is_none());
        assert!(fx.persistent.get(keys::SESSION_ID).unwrap().is_none());
        assert_eq!(fx.session.get(keys::VISITOR_ID).unwrap().unwrap(), id.as_str());
        assert!(fx.session.get(keys::SESSION_ID).unwrap().is_some());
    }

    #[test]
    fn test_session_slides_and_expires() {
        let fx = Fixture::new(false);
        let identity = fx.manager(IdentityOptions {
            session_timeout: Duration::from_secs(60),
            ..IdentityOptions::default()
        });

        let first = identity.session_id();
        fx.advance(50_000);
        assert_eq!(identity.session_id(), first);
        // Activity at 50s slid the window, so 100s is still inside it
        fx.advance(50_000);
        assert_eq!(identity.session_id(), first);

        fx.advance(61_000);
        let second = identity.session_id();
        assert_ne!(second, first);
        assert_eq!(
            fx.persistent.get(keys::SESSION_LAST_ACTIVITY).unwrap().unwrap(),
            fx.now.load(Ordering::SeqCst).to_string()
        );
    }

    #[test]
    fn test_unavailable_storage_yields_transient_ids() {
        let fx = Fixture::new(false);
        let dead = Arc::new(MemoryStore::unavailable());
        let identity = IdentityManager::new(
            IdentityStores {
                persistent: SafeStorage::new(dead.clone()),
                session: SafeStorage::new(dead),
                cookies: SafeCookies::new(fx.jar.clone()),
            },
            IdentityOptions::default(),
            fx.consent.clone(),
        );

        let id = identity.visitor_id();
        assert!(!id.is_anonymous());
        assert_ne!(identity.visitor_id(), id);
        let session = identity.session_id();
        assert_ne!(identity.session_id(), session);
    }

    #[test]
    fn test_reset_regenerates_everything() {
        let fx = Fixture::new(false);
        let identity = fx.manager(IdentityOptions::default());
        let visitor = identity.visitor_id();
        let session = identity.session_id();

        let (new_visitor, new_session) = identity.reset();
        assert_ne!(new_visitor, visitor);
        assert_ne!(new_session, session);
        assert_eq!(
            fx.persistent.get(keys::VISITOR_ID).unwrap().unwrap(),
            new_visitor.as_str()
        );
    }

    #[test]
    fn test_upgrade_after_consent_leaves_anonymous_mode() {
        let fx = Fixture::new(true);
        let identity = fx.manager(IdentityOptions {
            anonymous_mode: true,
            ..IdentityOptions::default()
        });
        let anon = identity.visitor_id();
        let session = identity.session_id();
        assert!(anon.is_anonymous());
        assert!(fx.persistent.get(keys::VISITOR_ID).unwrap().is_none());

        fx.consent.grant(&ConsentState::all_granted());
        let upgraded = identity.upgrade_after_consent();

        assert!(!upgraded.is_anonymous());
        assert_eq!(identity.mode(), IdentityMode::Persistent);
        assert_eq!(identity.visitor_id(), upgraded);
        assert_eq!(identity.session_id(), session);
        assert!(fx.session.get(keys::VISITOR_ID).unwrap().is_none());
        // Idempotent once upgraded
        assert_eq!(identity.upgrade_after_consent(), upgraded);
    }
}
