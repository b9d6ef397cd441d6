//! Closed plugin registry
//!
//! Maps every [`PluginName`] to its constructor and loads a list of
//! plugins with per-plugin failure isolation: an `init` error or panic is
//! logged and the plugin is skipped, the rest still load.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, warn};
use trailmark_core::domain::PluginName;

use crate::plugin::{Plugin, PluginContext};
use crate::plugins::{
    ClicksPlugin, DownloadsPlugin, EngagementPlugin, ErrorsPlugin, ExitIntentPlugin, FormsPlugin,
    PageViewPlugin, PerformancePlugin, ScrollPlugin,
};

/// Constructs the plugin registered under `name`
pub fn create_plugin(name: PluginName) -> Box<dyn Plugin> {
    match name {
        PluginName::PageView => Box::new(PageViewPlugin::new()),
        PluginName::Scroll => Box::new(ScrollPlugin::new()),
        PluginName::Forms => Box::new(FormsPlugin::new()),
        PluginName::Clicks => Box::new(ClicksPlugin::new()),
        PluginName::Engagement => Box::new(EngagementPlugin::new()),
        PluginName::Downloads => Box::new(DownloadsPlugin::new()),
        PluginName::ExitIntent => Box::new(ExitIntentPlugin::new()),
        PluginName::Errors => Box::new(ErrorsPlugin::new()),
        PluginName::Performance => Box::new(PerformancePlugin::new()),
    }
}

/// Creates and initializes each named plugin, in order
///
/// Duplicate names are loaded once. Returns the plugins whose `init`
/// succeeded.
pub fn load_plugins(names: &[PluginName], ctx: &PluginContext) -> Vec<Box<dyn Plugin>> {
    let mut loaded: Vec<Box<dyn Plugin>> = Vec::with_capacity(names.len());

    for &name in names {
        if loaded.iter().any(|p| p.name() == name) {
            debug!(plugin = %name, "Plugin listed twice, skipping duplicate");
            continue;
        }

        let mut plugin = create_plugin(name);
        let ctx = ctx.clone();
        match catch_unwind(AssertUnwindSafe(|| plugin.init(ctx))) {
            Ok(Ok(())) => {
                debug!(plugin = %name, "Plugin loaded");
                loaded.push(plugin);
            }
            Ok(Err(e)) => {
                warn!(plugin = %name, error = %e, "Plugin failed to initialize");
                plugin.destroy();
            }
            Err(_) => {
                error!(plugin = %name, "Plugin panicked during initialization");
            }
        }
    }

    loaded
}

/// Destroys every plugin, isolating panics
pub fn destroy_plugins(plugins: &mut Vec<Box<dyn Plugin>>) {
    for mut plugin in plugins.drain(..) {
        let name = plugin.name();
        if catch_unwind(AssertUnwindSafe(|| plugin.destroy())).is_err() {
            error!(plugin = %name, "Plugin panicked during destroy");
        } else {
            debug!(plugin = %name, "Plugin destroyed");
        }
    }
}
