//! Trailmark Plugins - DOM signal observers
//!
//! Each plugin is an independent observer with an `init`/`destroy`
//! lifecycle. `init` subscribes to page signals and may emit events
//! right away; `destroy` detaches every listener it added and stops its
//! timers.
//!
//! ## Modules
//!
//! - [`plugin`] - the `Plugin` capability trait, `PluginContext`,
//!   `TrackerHandle` and listener bookkeeping
//! - [`registry`] - closed mapping from `PluginName` to constructors and
//!   failure-isolated loading
//! - [`host`] - in-process implementations of the page ports
//!   (`SignalBus`, `StaticPageContext`, `ScriptedHistory`)
//! - [`plugins`] - the nine observers

pub mod host;
pub mod plugin;
pub mod plugins;
pub mod registry;
mod util;

pub use host::{ScriptedHistory, SignalBus, StaticPageContext};
pub use plugin::{Plugin, PluginContext, Subscriptions, TrackerHandle};
pub use plugins::downloads::{get_file_extension, is_download_url};
pub use registry::{create_plugin, destroy_plugins, load_plugins};

#[cfg(test)]
pub(crate) mod testing;
