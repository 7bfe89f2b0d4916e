//! `run` and `sample` command handlers.

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use super::{build_runtime, build_service, StateStores};
use crate::core::device_monitor::{compose_summary, PowerTrend, WidgetState};
use crate::core::run_flags::process_alive;
use crate::core::MonitorConfig;
use crate::ui::{self, format_alert, format_state, format_timestamp, format_trend};

/// Run the sampling loop in the foreground until Ctrl+C
pub fn handle_run(matches: &ArgMatches) -> Result<()> {
    let mut config = MonitorConfig::load()?;
    if let Some(&secs) = matches.get_one::<u64>("interval") {
        config.sampling.interval_ms = secs.saturating_mul(1000);
    }
    config.validate()?;

    let stores = StateStores::open(&config)?;
    let flags = stores.run_flags();

    if flags.is_first_run() {
        flags.set_user_enabled_monitoring(true)?;
        flags.set_is_first_run(false)?;
    }

    if !flags.user_enabled_monitoring() && !matches.get_flag("force") {
        bail!("Monitoring is disabled. Run 'devpulse enable' or pass --force");
    }

    if let Some(pid) = flags.live_owner(process_alive)? {
        bail!("A monitor is already running (pid {})", pid);
    }

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("{}", "Stopping monitor...".yellow().bold());
        shutdown_signal.cancel();
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let runtime = build_runtime()?;
    let state = runtime.block_on(async {
        let service = build_service(&config, &stores)?;
        service.start().await.context("Failed to start monitoring")?;

        println!(
            "{} {}",
            "Monitor state:".cyan().bold(),
            format_state(service.state())
        );
        println!("{}", "Press Ctrl+C to stop".dimmed());
        println!();

        let mut widgets = service.widget_updates();
        let power = service.power_updates();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = widgets.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(state) = widgets.borrow_and_update().clone() {
                        let trend = power.borrow().stats.power_trend;
                        print_widget_line(&state, trend);
                    }
                }
            }
        }

        service.stop().await.context("Failed to stop monitoring")?;
        Ok::<_, anyhow::Error>(service.state())
    })?;

    ui::success(&format!("Monitor {}.", state));
    Ok(())
}

fn print_widget_line(state: &WidgetState, trend: PowerTrend) {
    println!(
        "{} 🔋 {}  💾 {}  ⚡ {} ({})  🌡 {}  {}",
        format_timestamp(state.last_update).dimmed(),
        state.battery,
        state.ram,
        state.power,
        format_trend(trend),
        state.thermal,
        format!("health {}/10", state.health_score).bold()
    );
}

/// Run one sampling cycle and print its result
pub fn handle_sample(matches: &ArgMatches) -> Result<()> {
    let config = MonitorConfig::load()?;
    config.validate()?;
    let stores = StateStores::open(&config)?;

    let runtime = build_runtime()?;
    let report = runtime.block_on(async {
        let service = build_service(&config, &stores)?;
        service
            .run_single_cycle()
            .await
            .context("Sampling cycle failed")
    })?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Device sample".cyan().bold());
    println!();
    println!("{}", compose_summary(&report));
    println!();

    println!(
        "{} {:.2} W avg, {:.2} W peak over {} samples, trend {}",
        "Power:".bold(),
        report.stats.average_power_watts,
        report.stats.peak_power_watts,
        report.stats.sample_count,
        format_trend(report.stats.power_trend)
    );
    for component in &report.snapshot.components {
        println!(
            "  {:<8} {:>6.2} W  {}",
            component.component,
            component.power_consumption_watts,
            component.status.dimmed()
        );
    }

    if !report.alerts.is_empty() {
        println!();
        for alert in &report.alerts {
            println!("{}", format_alert(alert));
        }
    }

    let failed = report.failed_count();
    if failed > 0 {
        println!();
        ui::warn(&format!("{} reader(s) could not measure this cycle", failed));
    }

    Ok(())
}
