use anyhow::{Context, Result};
use clap::ArgMatches;

use crate::core::MonitorConfig;
use crate::ui;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = MonitorConfig::load()?;

    if matches.get_flag("save") {
        config.validate()?;
        config.save().context("Failed to save configuration")?;
        ui::success(&format!(
            "Configuration written to {}",
            MonitorConfig::config_path()?.display()
        ));
        return Ok(());
    }

    if let Err(e) = config.validate() {
        ui::warn(&format!("Configuration is invalid: {}", e));
    }

    ui::dimmed(&format!("# {}", MonitorConfig::config_path()?.display()));
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
