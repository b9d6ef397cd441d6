//! Plugin identifiers
//!
//! The set of plugins is closed; configuration selects from it by name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Identifier of a built-in plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginName {
    PageView,
    Scroll,
    Forms,
    Clicks,
    Engagement,
    Downloads,
    ExitIntent,
    Errors,
    Performance,
}

impl PluginName {
    /// Every plugin, in load order
    pub const ALL: [PluginName; 9] = [
        PluginName::PageView,
        PluginName::Scroll,
        PluginName::Forms,
        PluginName::Clicks,
        PluginName::Engagement,
        PluginName::Downloads,
        PluginName::ExitIntent,
        PluginName::Errors,
        PluginName::Performance,
    ];

    /// Configuration name of the plugin
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginName::PageView => "page_view",
            PluginName::Scroll => "scroll",
            PluginName::Forms => "forms",
            PluginName::Clicks => "clicks",
            PluginName::Engagement => "engagement",
            PluginName::Downloads => "downloads",
            PluginName::ExitIntent => "exit_intent",
            PluginName::Errors => "errors",
            PluginName::Performance => "performance",
        }
    }

    /// Plugins enabled when the configuration does not say otherwise
    pub fn defaults() -> Vec<PluginName> {
        vec![
            PluginName::PageView,
            PluginName::Forms,
            PluginName::Scroll,
            PluginName::Clicks,
            PluginName::Engagement,
        ]
    }
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::UnknownPlugin(s.to_string()))
    }
}
