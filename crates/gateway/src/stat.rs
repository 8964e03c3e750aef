// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine process statistics.

use serde_json::{json, Value};
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

/// Point-in-time usage snapshot of one engine process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStats {
    pub cpu_percent: f32,
    pub cpu_user: f64,
    pub cpu_system: f64,
    pub memory_percent: f32,
    pub rss: u64,
    pub vms: u64,
}

impl ProcessStats {
    pub fn to_value(&self) -> Value {
        json!({
            "cpu": {
                "percent": self.cpu_percent,
                "user": self.cpu_user,
                "system": self.cpu_system,
            },
            "memory": {
                "percent": self.memory_percent,
                "rss": self.rss,
                "vms": self.vms,
            },
        })
    }
}

/// A fresh (empty) system probe; refreshed per sample.
pub fn system() -> System {
    System::new()
}

/// Sample a process, or `None` when it no longer exists.
pub fn sample(system: &mut System, pid: u32) -> Option<ProcessStats> {
    let sys_pid = Pid::from_u32(pid);
    system.refresh_memory();
    if !system.refresh_process(sys_pid) {
        return None;
    }
    let process = system.process(sys_pid)?;
    let rss = process.memory();
    let total = system.total_memory();
    let memory_percent = if total > 0 { (rss as f64 / total as f64 * 100.0) as f32 } else { 0.0 };
    let (cpu_user, cpu_system) = cpu_times(pid);
    Some(ProcessStats {
        cpu_percent: process.cpu_usage(),
        cpu_user,
        cpu_system,
        memory_percent,
        rss,
        vms: process.virtual_memory(),
    })
}

/// Resident set size in bytes; 0 when the process is gone.
pub fn rss(system: &mut System, pid: u32) -> u64 {
    let sys_pid = Pid::from_u32(pid);
    if !system.refresh_process(sys_pid) {
        return 0;
    }
    system.process(sys_pid).map_or(0, |process| process.memory())
}

/// Cumulative user/system CPU seconds. sysinfo exposes no user/system
/// split, so this reads the scheduler fields from `/proc` directly.
#[cfg(target_os = "linux")]
fn cpu_times(pid: u32) -> (f64, f64) {
    let Ok(contents) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return (0.0, 0.0);
    };
    // fields 14 and 15 (utime, stime), counted after the parenthesised comm
    let Some(rest) = contents.rsplit_once(')').map(|(_, rest)| rest) else {
        return (0.0, 0.0);
    };
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime: f64 = fields.get(11).and_then(|field| field.parse().ok()).unwrap_or(0.0);
    let stime: f64 = fields.get(12).and_then(|field| field.parse().ok()).unwrap_or(0.0);
    let ticks = clock_ticks();
    (utime / ticks, stime / ticks)
}

#[cfg(target_os = "linux")]
fn clock_ticks() -> f64 {
    match nix::unistd::sysconf(nix::unistd::SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) if ticks > 0 => ticks as f64,
        _ => 100.0,
    }
}

#[cfg(not(target_os = "linux"))]
fn cpu_times(_pid: u32) -> (f64, f64) {
    (0.0, 0.0)
}

#[cfg(test)]
#[path = "stat_tests.rs"]
mod tests;
