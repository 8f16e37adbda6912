//! System metrics consumed by the monitoring built-ins.
//!
//! [`MetricsProvider`] is the seam between the formatting code and the host;
//! [`SystemMetrics`] implements it with `sysinfo`.

use anyhow::{Result, anyhow};
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, ProcessesToUpdate, System};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSnapshot {
    pub usage_percent: f32,
    pub cores: usize,
}

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Disk figures in bytes for the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSnapshot {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Source of host resource figures.
pub trait MetricsProvider {
    fn cpu(&mut self) -> Result<CpuSnapshot>;
    fn memory(&mut self) -> Result<MemorySnapshot>;
    fn processes(&mut self) -> Result<Vec<ProcessSnapshot>>;
    fn uptime(&mut self) -> Result<Duration>;
    fn disk(&mut self, path: &Path) -> Result<DiskSnapshot>;
}

/// [`MetricsProvider`] backed by the `sysinfo` crate.
pub struct SystemMetrics {
    sys: System,
}

impl SystemMetrics {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for SystemMetrics {
    fn cpu(&mut self) -> Result<CpuSnapshot> {
        // usage is a delta between two refreshes
        self.sys.refresh_cpu_all();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.sys.refresh_cpu_usage();
        Ok(CpuSnapshot {
            usage_percent: self.sys.global_cpu_usage(),
            cores: self.sys.cpus().len(),
        })
    }

    fn memory(&mut self) -> Result<MemorySnapshot> {
        self.sys.refresh_memory();
        Ok(MemorySnapshot {
            total: self.sys.total_memory(),
            available: self.sys.available_memory(),
            used: self.sys.used_memory(),
            free: self.sys.free_memory(),
        })
    }

    fn processes(&mut self) -> Result<Vec<ProcessSnapshot>> {
        self.sys.refresh_memory();
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.sys.refresh_processes(ProcessesToUpdate::All, true);

        let total = self.sys.total_memory().max(1) as f64;
        Ok(self
            .sys
            .processes()
            .values()
            .map(|p| ProcessSnapshot {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu_percent: p.cpu_usage(),
                memory_percent: (p.memory() as f64 / total * 100.0) as f32,
            })
            .collect())
    }

    fn uptime(&mut self) -> Result<Duration> {
        Ok(Duration::from_secs(System::uptime()))
    }

    fn disk(&mut self, path: &Path) -> Result<DiskSnapshot> {
        let disks = Disks::new_with_refreshed_list();
        // the disk with the longest mount point containing `path`
        let disk = disks
            .list()
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| anyhow!("no disk mounted at {}", path.display()))?;
        let total = disk.total_space();
        let free = disk.available_space();
        Ok(DiskSnapshot {
            total,
            used: total.saturating_sub(free),
            free,
        })
    }
}

/// Host name used in the prompt.
pub fn host_name() -> String {
    System::host_name().unwrap_or_else(|| "localhost".to_string())
}
