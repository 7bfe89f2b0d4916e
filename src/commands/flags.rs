use anyhow::Result;

use super::StateStores;
use crate::core::MonitorConfig;
use crate::ui;

/// Record the user's monitoring preference
pub fn set_monitoring(enabled: bool) -> Result<()> {
    let config = MonitorConfig::load()?;
    let flags = StateStores::open(&config)?.run_flags();

    flags.set_user_enabled_monitoring(enabled)?;
    flags.set_is_first_run(false)?;

    if enabled {
        ui::success("Monitoring enabled.");
    } else {
        ui::success("Monitoring disabled.");
        if flags.service_flagged_running() {
            ui::dimmed("A running monitor keeps sampling until it is stopped.");
        }
    }
    Ok(())
}
