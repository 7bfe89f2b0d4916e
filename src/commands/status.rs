use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use super::StateStores;
use crate::core::device_monitor::WidgetState;
use crate::core::MonitorConfig;
use crate::ui::{self, format_age, format_flag, format_timestamp};

/// Records older than this many sampling intervals are reported as stale
const STALE_INTERVALS: u32 = 2;

pub fn execute() -> Result<()> {
    let config = MonitorConfig::load()?;
    let stores = StateStores::open(&config)?;
    let flags = stores.run_flags();

    println!("{}", "Run state".cyan().bold());
    println!(
        "  Monitoring enabled: {}",
        format_flag(flags.user_enabled_monitoring())
    );
    // No live service in this process; the flag is checked against its owner pid
    let running = flags.reconcile_running(None)?;
    match flags.service_pid().filter(|_| running) {
        Some(pid) => println!(
            "  Service running:    {} {}",
            format_flag(true),
            format!("(pid {})", pid).dimmed()
        ),
        None => println!("  Service running:    {}", format_flag(running)),
    }
    println!("  First run:          {}", format_flag(flags.is_first_run()));
    println!();

    let Some(state) = WidgetState::load(stores.widget.as_ref()) else {
        ui::info("No sample recorded yet. Run 'devpulse sample' or 'devpulse run'.");
        return Ok(());
    };

    let now = Utc::now().timestamp_millis();
    let max_age = config.sampling.interval() * STALE_INTERVALS;
    let age = format_age(now - state.last_update);

    println!("{}", "Last sample".cyan().bold());
    if state.is_stale(now, max_age) {
        println!(
            "  {} ({}, {})",
            format_timestamp(state.last_update),
            age,
            "stale".yellow()
        );
    } else {
        println!("  {} ({})", format_timestamp(state.last_update), age);
    }

    let latency = if state.latency.is_empty() {
        "--"
    } else {
        state.latency.as_str()
    };

    println!("  Battery:  {}", state.battery);
    println!("  Memory:   {}", state.ram);
    println!("  CPU:      {}", state.cpu);
    println!("  Network:  ↓ {} ↑ {} | Ping {}", state.download, state.upload, latency);
    println!("  Thermal:  {}", state.thermal);
    println!("  Power:    {}", state.power);
    println!(
        "  Health:   {}/10 (streak {} day{})",
        state.health_score,
        state.streak,
        if state.streak == 1 { "" } else { "s" }
    );

    Ok(())
}
