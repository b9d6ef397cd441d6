//! Trailmark Storage - Storage Adapter
//!
//! Provides:
//! - `SafeStorage` / `SafeCookies`: wrappers that never fail; every error
//!   degrades to "no value" / `false` with a debug log
//! - `MemoryStore`: in-process key-value store (session storage, tests)
//! - `FileStore`: JSON-file-backed persistent store for native hosts
//! - `MemoryCookieJar`: in-process cookie jar with expiry and domain
//! - `keys`: the storage keys the SDK writes

pub mod cookies;
pub mod file;
pub mod memory;
pub mod safe;

pub use cookies::MemoryCookieJar;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use safe::{SafeCookies, SafeStorage};

use std::path::PathBuf;

use thiserror::Error;

/// Storage keys written by the SDK. All share [`keys::PREFIX`].
pub mod keys {
    /// Common prefix, used for GDPR purges
    pub const PREFIX: &str = "trailmark_";
    pub const VISITOR_ID: &str = "trailmark_visitor_id";
    pub const SESSION_ID: &str = "trailmark_session_id";
    /// Epoch milliseconds, stored as a plain string
    pub const SESSION_LAST_ACTIVITY: &str = "trailmark_session_last_activity";
    pub const EVENT_QUEUE: &str = "trailmark_event_queue";
    /// Visitor cookie name
    pub const VISITOR_COOKIE: &str = "trailmark_vid";
}

/// Errors raised by the bundled store implementations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage is disabled (private browsing, policy)
    #[error("Storage unavailable")]
    Unavailable,

    /// The backing file could not be read or written
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file holds invalid JSON
    #[error("Corrupt store file {0}")]
    Corrupt(PathBuf),

    /// Adding the value would exceed the store's quota
    #[error("Quota exceeded writing {key} ({needed} bytes over)")]
    QuotaExceeded { key: String, needed: usize },
}
