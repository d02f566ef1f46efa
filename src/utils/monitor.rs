#[cfg(feature = "monitor")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "monitor")]
use sysinfo::{Pid, RefreshKind, System};

/// Process memory sampling used to log resident memory around CSV batches.
#[cfg(feature = "monitor")]
#[derive(Clone)]
pub struct MemoryMonitor {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
    enabled: bool,
}

#[cfg(feature = "monitor")]
impl MemoryMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("⚠️ Memory monitoring unavailable: {}", e);
                None
            }
        };

        let system = if enabled && pid.is_some() {
            System::new_with_specifics(RefreshKind::everything())
        } else {
            System::new()
        };

        Self {
            system: Arc::new(Mutex::new(system)),
            pid,
            enabled: enabled && pid.is_some(),
        }
    }

    /// Resident set size in MB, or `None` when disabled.
    pub fn memory_mb(&self) -> Option<f64> {
        if !self.enabled {
            return None;
        }

        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_all();

        let process = system.process(pid)?;
        Some(process.memory() as f64 / 1024.0 / 1024.0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// Builds without sysinfo get a no-op monitor.
#[cfg(not(feature = "monitor"))]
#[derive(Clone)]
pub struct MemoryMonitor;

#[cfg(not(feature = "monitor"))]
impl MemoryMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn memory_mb(&self) -> Option<f64> {
        None
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MemoryMonitor {
    pub fn log_usage(&self, label: &str) -> Option<f64> {
        let current = self.memory_mb()?;
        tracing::info!("🧠 {}: {:.1} MB", label, current);
        Some(current)
    }

    pub fn log_change(&self, start: Option<f64>) {
        if let (Some(start), Some(end)) = (start, self.memory_mb()) {
            tracing::info!(
                "🧠 Final memory usage: {:.1} MB (change: {:+.1} MB)",
                end,
                end - start
            );
        }
    }
}
