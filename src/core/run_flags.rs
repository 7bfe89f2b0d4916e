//! Durable run-state flags consumed by the CLI and the sampling service.

use serde_json::Value;
use std::sync::Arc;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

use crate::core::device_monitor::ServiceState;
use crate::core::kv_store::KeyValueStore;
use crate::error::Result;

const USER_ENABLED_MONITORING: &str = "user_enabled_monitoring";
const SERVICE_FLAGGED_RUNNING: &str = "service_flagged_running";
const SERVICE_PID: &str = "service_pid";
const DO_NOT_ASK_AGAIN: &str = "do_not_ask_again";
const IS_FIRST_RUN: &str = "is_first_run";

/// Ask the OS whether `pid` names a live (non-zombie) process.
pub fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );

    system
        .process(pid)
        .is_some_and(|process| process.status() != ProcessStatus::Zombie)
}

/// Named boolean flags over an injected store.
///
/// Flags are independent of each other. The running flag is paired with the
/// pid of the process that set it so other processes can verify it.
#[derive(Clone)]
pub struct RunFlags {
    store: Arc<dyn KeyValueStore>,
}

impl RunFlags {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn user_enabled_monitoring(&self) -> bool {
        self.store.get_bool(USER_ENABLED_MONITORING).unwrap_or(false)
    }

    pub fn set_user_enabled_monitoring(&self, value: bool) -> Result<()> {
        self.store.set(USER_ENABLED_MONITORING, Value::Bool(value))
    }

    pub fn service_flagged_running(&self) -> bool {
        self.store.get_bool(SERVICE_FLAGGED_RUNNING).unwrap_or(false)
    }

    pub fn set_service_flagged_running(&self, value: bool) -> Result<()> {
        self.store.set(SERVICE_FLAGGED_RUNNING, Value::Bool(value))
    }

    /// Pid of the process that last raised the running flag
    pub fn service_pid(&self) -> Option<u32> {
        self.store
            .get_i64(SERVICE_PID)
            .and_then(|pid| u32::try_from(pid).ok())
    }

    /// Record that process `pid` is now monitoring.
    pub fn mark_running(&self, pid: u32) -> Result<()> {
        self.store.set(SERVICE_PID, Value::from(pid))?;
        self.set_service_flagged_running(true)
    }

    pub fn mark_stopped(&self) -> Result<()> {
        self.set_service_flagged_running(false)?;
        self.store.remove(SERVICE_PID)
    }

    pub fn do_not_ask_again(&self) -> bool {
        self.store.get_bool(DO_NOT_ASK_AGAIN).unwrap_or(false)
    }

    pub fn set_do_not_ask_again(&self, value: bool) -> Result<()> {
        self.store.set(DO_NOT_ASK_AGAIN, Value::Bool(value))
    }

    /// True until something explicitly records that onboarding happened.
    pub fn is_first_run(&self) -> bool {
        self.store.get_bool(IS_FIRST_RUN).unwrap_or(true)
    }

    pub fn set_is_first_run(&self, value: bool) -> Result<()> {
        self.store.set(IS_FIRST_RUN, Value::Bool(value))
    }

    /// Decide whether the service is running.
    ///
    /// A live in-process state always wins. Without one, the durable flag is
    /// only trusted while the pid stored next to it names a live process; a
    /// flag left behind by a killed process is cleared either way.
    pub fn reconcile_running(&self, live: Option<ServiceState>) -> Result<bool> {
        match live {
            Some(state) => {
                let running = state == ServiceState::Monitoring;
                if self.service_flagged_running() != running {
                    log::debug!(
                        "Correcting stale running flag (flag={}, live={:?})",
                        !running,
                        state
                    );
                    if running {
                        self.mark_running(std::process::id())?;
                    } else {
                        self.mark_stopped()?;
                    }
                }
                Ok(running)
            }
            None => Ok(self.live_owner(process_alive)?.is_some()),
        }
    }

    /// Pid of the live process holding the running flag, if any.
    ///
    /// `is_alive` is the OS liveness check, normally [`process_alive`]. A
    /// raised flag whose owner is gone, or that has no owner recorded, is
    /// cleared.
    pub fn live_owner<F>(&self, is_alive: F) -> Result<Option<u32>>
    where
        F: Fn(u32) -> bool,
    {
        if !self.service_flagged_running() {
            return Ok(None);
        }

        match self.service_pid() {
            Some(pid) if is_alive(pid) => Ok(Some(pid)),
            owner => {
                log::info!("Clearing stale running flag (owner {:?} is gone)", owner);
                self.mark_stopped()?;
                Ok(None)
            }
        }
    }
}
