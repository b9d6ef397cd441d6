//! In-process cookie jar
//!
//! Keeps expiry and domain so identity tests can check what a browser
//! would have been asked to store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use trailmark_core::ports::{CookieOptions, ICookieJar, SameSite};

/// A cookie as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub value: String,
    pub expires: DateTime<Utc>,
    pub domain: Option<String>,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
}

impl StoredCookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// HashMap-backed [`ICookieJar`]
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, StoredCookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full record of a live cookie, for inspection
    pub fn cookie(&self, name: &str) -> Option<StoredCookie> {
        let now = Utc::now();
        self.lock()
            .get(name)
            .filter(|c| !c.is_expired(now))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredCookie>> {
        self.cookies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ICookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.cookie(name).map(|c| c.value))
    }

    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> anyhow::Result<()> {
        let cookie = StoredCookie {
            value: value.to_string(),
            expires: Utc::now() + Duration::days(i64::from(options.max_age_days)),
            domain: options.domain.clone(),
            path: options.path.clone(),
            same_site: options.same_site,
            secure: options.secure,
        };
        self.lock().insert(name.to_string(), cookie);
        Ok(())
    }

    fn remove(&self, name: &str, domain: Option<&str>) -> anyhow::Result<()> {
        let mut cookies = self.lock();
        // A browser only expires the cookie whose domain matches
        let matches = cookies
            .get(name)
            .map(|c| c.domain.as_deref() == domain)
            .unwrap_or(false);
        if matches {
            cookies.remove(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_year_cookie() {
        let jar = MemoryCookieJar::new();
        let options = CookieOptions {
            domain: Some(".example.com".into()),
            ..CookieOptions::default()
        };
        jar.set("trailmark_vid", "abc", &options).unwrap();

        let cookie = jar.cookie("trailmark_vid").unwrap();
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.domain.as_deref(), Some(".example.com"));
        assert_eq!(cookie.same_site, SameSite::Lax);
        let days = (cookie.expires - Utc::now()).num_days();
        assert!((364..=365).contains(&days));
    }

    #[test]
    fn test_zero_age_cookie_is_expired() {
        let jar = MemoryCookieJar::new();
        let options = CookieOptions {
            max_age_days: 0,
            ..CookieOptions::default()
        };
        jar.set("gone", "x", &options).unwrap();
        assert_eq!(jar.get("gone").unwrap(), None);
    }

    #[test]
    fn test_remove_requires_matching_domain() {
        let jar = MemoryCookieJar::new();
        let options = CookieOptions {
            domain: Some(".example.com".into()),
            ..CookieOptions::default()
        };
        jar.set("trailmark_vid", "abc", &options).unwrap();

        jar.remove("trailmark_vid", None).unwrap();
        assert!(jar.get("trailmark_vid").unwrap().is_some());

        jar.remove("trailmark_vid", Some(".example.com")).unwrap();
        assert!(jar.get("trailmark_vid").unwrap().is_none());
    }
}
