//! Storage ports (driven/secondary ports)
//!
//! Browser storage is synchronous, so these traits are too. Implementations
//! may fail for any adapter-specific reason (private browsing, quota,
//! disabled storage); callers in the pipeline go through a wrapper that
//! turns every failure into "no value".

/// Key-value storage (localStorage / sessionStorage shaped)
pub trait IKeyValueStore: Send + Sync {
    /// Reads the value stored under `key`
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Removes `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Lists every key currently stored
    fn keys(&self) -> anyhow::Result<Vec<String>>;
}

/// SameSite cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

/// Attributes applied when writing a cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Lifetime in days
    pub max_age_days: u32,
    pub domain: Option<String>,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age_days: 365,
            domain: None,
            path: "/".to_string(),
            same_site: SameSite::Lax,
            secure: false,
        }
    }
}

/// First-party cookie access
pub trait ICookieJar: Send + Sync {
    /// Reads a cookie value by name; expired cookies read as `None`
    fn get(&self, name: &str) -> anyhow::Result<Option<String>>;

    /// Writes a cookie
    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> anyhow::Result<()>;

    /// Expires a cookie
    fn remove(&self, name: &str, domain: Option<&str>) -> anyhow::Result<()>;
}
