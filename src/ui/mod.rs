// UI and formatting module

pub mod formatters;
pub mod messages;

// Re-export commonly used items for cleaner imports
pub use formatters::{format_age, format_alert, format_flag, format_state, format_timestamp, format_trend};
pub use messages::{dimmed, info, success, warn};
