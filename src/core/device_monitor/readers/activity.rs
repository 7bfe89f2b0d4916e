use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::{CpuRefreshKind, Networks, RefreshKind, System};

use super::ActivitySource;
use crate::core::device_monitor::metrics::SubsystemActivity;

/// Subsystem activity on a Linux host.
///
/// Keeps its `sysinfo` handles between calls: CPU usage and network traffic are
/// deltas against the previous refresh.
pub struct LinuxActivitySource {
    backlight_dir: PathBuf,
    proc_dir: PathBuf,
    state: Mutex<SysinfoState>,
}

struct SysinfoState {
    system: System,
    networks: Networks,
}

impl LinuxActivitySource {
    pub fn new(sys_root: &Path) -> Self {
        let refresh = RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage());
        Self {
            backlight_dir: sys_root.join("sys/class/backlight"),
            proc_dir: sys_root.join("proc"),
            state: Mutex::new(SysinfoState {
                system: System::new_with_specifics(refresh),
                networks: Networks::new_with_refreshed_list(),
            }),
        }
    }
}

impl ActivitySource for LinuxActivitySource {
    fn sample(&self) -> SubsystemActivity {
        let (cpu_load_percent, wifi_active) = {
            let mut state = self.state.lock();
            state.system.refresh_cpu_usage();
            state.networks.refresh(true);

            let wifi_active = state.networks.iter().any(|(name, data)| {
                is_wireless(name) && (data.received() > 0 || data.transmitted() > 0)
            });
            (state.system.global_cpu_usage(), wifi_active)
        };

        SubsystemActivity {
            display_brightness: backlight_level(&self.backlight_dir),
            camera_active: video_device_open(&self.proc_dir),
            wifi_active,
            cpu_load_percent,
        }
    }
}

fn is_wireless(interface: &str) -> bool {
    interface.starts_with("wl")
}

/// Brightness fraction of the first backlight, `None` when off or absent
pub(crate) fn backlight_level(backlight_dir: &Path) -> Option<f32> {
    let mut devices: Vec<PathBuf> = fs::read_dir(backlight_dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .collect();
    devices.sort();
    let device = devices.first()?;

    let read = |name: &str| -> Option<f32> {
        fs::read_to_string(device.join(name)).ok()?.trim().parse().ok()
    };

    // bl_power 0 means on (FB_BLANK_UNBLANK)
    if read("bl_power").is_some_and(|p| p != 0.0) {
        return None;
    }

    let brightness = read("actual_brightness").or_else(|| read("brightness"))?;
    let max = read("max_brightness").filter(|m| *m > 0.0)?;
    if brightness <= 0.0 {
        return None;
    }
    Some((brightness / max).clamp(0.0, 1.0))
}

/// Whether any process holds a `/dev/video*` node open
pub(crate) fn video_device_open(proc_dir: &Path) -> bool {
    let Ok(processes) = fs::read_dir(proc_dir) else {
        return false;
    };

    processes
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()))
        })
        .any(|entry| {
            let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
                return false;
            };
            fds.flatten().any(|fd| {
                fs::read_link(fd.path())
                    .map(|target| target.to_string_lossy().starts_with("/dev/video"))
                    .unwrap_or(false)
            })
        })
}
