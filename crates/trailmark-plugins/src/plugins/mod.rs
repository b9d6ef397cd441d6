//! The built-in observers

pub mod clicks;
pub mod downloads;
pub mod engagement;
pub mod errors;
pub mod exit_intent;
pub mod forms;
pub mod page_view;
pub mod performance;
pub mod scroll;

pub use clicks::ClicksPlugin;
pub use downloads::DownloadsPlugin;
pub use engagement::EngagementPlugin;
pub use errors::ErrorsPlugin;
pub use exit_intent::ExitIntentPlugin;
pub use forms::FormsPlugin;
pub use page_view::PageViewPlugin;
pub use performance::PerformancePlugin;
pub use scroll::ScrollPlugin;
