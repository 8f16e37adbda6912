//! Monitoring built-ins: format [`MetricsProvider`] figures into fixed templates.

use crate::builtin::BuiltinCommand;
use crate::command::Flow;
use crate::metrics::MetricsProvider;
use crate::session::Session;
use anyhow::Result;
use std::io::Write;

const GIB: u64 = 1024 * 1024 * 1024;

/// Number of rows `processes` prints.
pub const TOP_PROCESSES: usize = 20;

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Show overall CPU usage.
pub struct Cpu;

impl BuiltinCommand for Cpu {
    fn names() -> &'static [&'static str] {
        &["cpu"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Cpu
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        match metrics.cpu() {
            Ok(cpu) => writeln!(
                stdout,
                "CPU Usage: {:.1}% (Cores: {})",
                cpu.usage_percent, cpu.cores
            )?,
            Err(e) => writeln!(stdout, "Error getting system info: {e}")?,
        }
        Ok(Flow::Continue)
    }
}

/// Show memory totals in whole gigabytes.
pub struct Memory;

impl BuiltinCommand for Memory {
    fn names() -> &'static [&'static str] {
        &["memory"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Memory
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let mem = match metrics.memory() {
            Ok(mem) => mem,
            Err(e) => {
                writeln!(stdout, "Error getting system info: {e}")?;
                return Ok(Flow::Continue);
            }
        };
        writeln!(stdout, "Memory Usage:")?;
        writeln!(stdout, "Total: {} GB", mem.total / GIB)?;
        writeln!(stdout, "Available: {} GB", mem.available / GIB)?;
        writeln!(
            stdout,
            "Used: {} GB ({:.1}%)",
            mem.used / GIB,
            percent(mem.used, mem.total)
        )?;
        writeln!(stdout, "Free: {} GB", mem.free / GIB)?;
        Ok(Flow::Continue)
    }
}

/// Show the busiest processes, highest CPU first.
pub struct Processes;

impl BuiltinCommand for Processes {
    fn names() -> &'static [&'static str] {
        &["processes", "ps"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Processes
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let mut procs = match metrics.processes() {
            Ok(procs) => procs,
            Err(e) => {
                writeln!(stdout, "Error getting system info: {e}")?;
                return Ok(Flow::Continue);
            }
        };
        procs.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));

        writeln!(stdout, "PID    NAME                 CPU%   MEM%")?;
        for p in procs.iter().take(TOP_PROCESSES) {
            writeln!(
                stdout,
                "{:6} {:20} {:6.1}% {:6.1}%",
                p.pid, p.name, p.cpu_percent, p.memory_percent
            )?;
        }
        Ok(Flow::Continue)
    }
}

/// Show time since boot.
pub struct Uptime;

impl BuiltinCommand for Uptime {
    fn names() -> &'static [&'static str] {
        &["uptime"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Uptime
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        match metrics.uptime() {
            Ok(up) => {
                let secs = up.as_secs();
                writeln!(
                    stdout,
                    "Uptime: {} days, {} hours, {} minutes",
                    secs / 86_400,
                    secs % 86_400 / 3_600,
                    secs % 3_600 / 60
                )?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "uptime unavailable");
                writeln!(stdout, "Uptime: Unable to determine")?;
            }
        }
        Ok(Flow::Continue)
    }
}

/// Show usage of the filesystem holding the session directory.
pub struct Df;

impl BuiltinCommand for Df {
    fn names() -> &'static [&'static str] {
        &["df"]
    }

    fn from_args(_args: &[&str]) -> Self {
        Df
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        session: &mut Session,
        metrics: &mut dyn MetricsProvider,
    ) -> Result<Flow> {
        let disk = match metrics.disk(session.current_dir()) {
            Ok(disk) => disk,
            Err(e) => {
                tracing::warn!(error = %e, "disk usage unavailable");
                writeln!(stdout, "Disk usage: Unable to determine")?;
                return Ok(Flow::Continue);
            }
        };
        let (total, used, free) = (disk.total / GIB, disk.used / GIB, disk.free / GIB);
        writeln!(stdout, "Disk Usage:")?;
        writeln!(stdout, "Total: {total} GB")?;
        writeln!(stdout, "Used: {used} GB ({:.1}%)", percent(used, total))?;
        writeln!(stdout, "Free: {free} GB")?;
        Ok(Flow::Continue)
    }
}
