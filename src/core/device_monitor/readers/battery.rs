use battery::units::electric_potential::volt;
use battery::units::power::watt;
use battery::units::ratio::percent;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::BatterySource;
use crate::core::device_monitor::metrics::{BatteryReading, BatteryState};
use crate::error::{PulseError, Result};

/// Battery readings straight from `/sys/class/power_supply/<BAT>/`.
///
/// Units as exported by the kernel: µA, µV, µAh, µW.
pub struct SysfsBatterySource {
    power_supply_dir: PathBuf,
}

impl SysfsBatterySource {
    pub fn new(sys_root: &Path) -> Self {
        Self {
            power_supply_dir: sys_root.join("sys/class/power_supply"),
        }
    }

    fn find_battery(&self) -> Result<PathBuf> {
        let entries = fs::read_dir(&self.power_supply_dir).map_err(|e| {
            PulseError::reader(format!("{}: {}", self.power_supply_dir.display(), e))
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| read_trimmed(&path.join("type")).as_deref() == Some("Battery"))
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| PulseError::reader("no battery power supply present"))
    }
}

impl BatterySource for SysfsBatterySource {
    fn read(&self) -> Result<BatteryReading> {
        let dir = self.find_battery()?;

        let state = match read_trimmed(&dir.join("status")).as_deref() {
            Some("Charging") => BatteryState::Charging,
            Some("Discharging") => BatteryState::Discharging,
            Some("Full") => BatteryState::Full,
            Some("Not charging") => BatteryState::NotCharging,
            _ => BatteryState::Unknown,
        };

        // A negative or oversized reading is a driver fault, not a voltage
        let voltage_mv =
            read_i64(&dir.join("voltage_now")).and_then(|uv| u32::try_from(uv / 1000).ok());

        let magnitude_ua = read_i64(&dir.join("current_now"))
            .map(i64::abs)
            .or_else(|| {
                // Some drivers only export power; I = P / V from the same measurement
                let power_uw = read_i64(&dir.join("power_now"))?;
                let mv = voltage_mv.filter(|mv| *mv > 0)?;
                Some(power_uw.abs() * 1000 / mv as i64)
            });

        // Kernel sign conventions differ between drivers; status is authoritative
        let current_ua = magnitude_ua.map(|ua| match state {
            BatteryState::Discharging => -ua,
            _ => ua,
        });

        let charge_counter_uah = read_i64(&dir.join("charge_counter"))
            .or_else(|| read_i64(&dir.join("charge_now")));

        let capacity_percent = read_i64(&dir.join("capacity")).map(|c| c.clamp(0, 100) as u8);

        Ok(BatteryReading {
            capacity_percent,
            current_ua,
            voltage_mv,
            charge_counter_uah,
            state,
        })
    }
}

/// Cross-platform fallback through the `battery` crate
pub struct BatteryCrateSource;

impl BatterySource for BatteryCrateSource {
    fn read(&self) -> Result<BatteryReading> {
        let manager = battery::Manager::new()
            .map_err(|e| PulseError::reader(format!("battery manager: {}", e)))?;
        let battery = manager
            .batteries()
            .map_err(|e| PulseError::reader(format!("battery enumeration: {}", e)))?
            .flatten()
            .next()
            .ok_or_else(|| PulseError::reader("no battery present"))?;

        let state = match battery.state() {
            battery::State::Charging => BatteryState::Charging,
            battery::State::Discharging => BatteryState::Discharging,
            battery::State::Full => BatteryState::Full,
            _ => BatteryState::Unknown,
        };

        let volts = battery.voltage().get::<volt>() as f64;
        let watts = battery.energy_rate().get::<watt>() as f64;

        let voltage_mv = (volts > 0.0).then(|| (volts * 1000.0).round() as u32);
        let current_ua = (volts > 0.0).then(|| {
            let ua = (watts.abs() / volts * 1_000_000.0).round() as i64;
            if state == BatteryState::Discharging {
                -ua
            } else {
                ua
            }
        });

        Ok(BatteryReading {
            capacity_percent: Some(battery.state_of_charge().get::<percent>().round().clamp(0.0, 100.0) as u8),
            current_ua,
            voltage_mv,
            charge_counter_uah: None,
            state,
        })
    }
}

/// Sysfs when the host exposes it, the `battery` crate otherwise
pub fn default_battery_source(sys_root: &Path) -> Arc<dyn BatterySource> {
    if sys_root.join("sys/class/power_supply").is_dir() {
        Arc::new(SysfsBatterySource::new(sys_root))
    } else {
        Arc::new(BatteryCrateSource)
    }
}

/// `"<pct>% · <state> · <V>V <mA>mA"`, leaving out what the source did not report
pub fn format_battery(reading: &BatteryReading) -> String {
    let mut parts = Vec::new();

    if let Some(pct) = reading.capacity_percent {
        parts.push(format!("{}%", pct));
    }
    parts.push(reading.state.label().to_string());

    let electrical = match (reading.voltage_mv, reading.current_ua) {
        (Some(mv), Some(ua)) => Some(format!("{:.2}V {}mA", mv as f64 / 1000.0, ua.abs() / 1000)),
        (Some(mv), None) => Some(format!("{:.2}V", mv as f64 / 1000.0)),
        (None, Some(ua)) => Some(format!("{}mA", ua.abs() / 1000)),
        (None, None) => None,
    };
    if let Some(electrical) = electrical {
        parts.push(electrical);
    }

    parts.join(" · ")
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_i64(path: &Path) -> Option<i64> {
    read_trimmed(path)?.parse().ok()
}
