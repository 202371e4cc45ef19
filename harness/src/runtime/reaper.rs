//! Workload Proxy Reaper
//!
//! Last-resort cleanup for workload proxy processes the scheduler failed to
//! tear down. Processes are found by a marker embedded in their command line
//! and killed outright.

use std::process::Command;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::error::HarnessResult;

#[derive(Debug, Clone, Default)]
pub struct ProxyReaper;

impl ProxyReaper {
    pub fn new() -> Self {
        Self
    }

    /// SIGKILL every process whose command line matches one of `markers`
    ///
    /// Returns how many processes were killed. Processes that vanish in the
    /// meantime are not an error.
    pub fn reap<I, S>(&self, markers: I) -> HarnessResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut killed_count = 0;

        for marker in markers {
            let marker = marker.as_ref();
            for pid in self.find_processes_by_marker(marker)? {
                match self.kill_process(pid) {
                    Ok(true) => {
                        killed_count += 1;
                        debug!("🔪 Killed workload proxy {} ({})", pid, marker);
                    }
                    Ok(false) => debug!("✅ Process {} already gone", pid),
                    Err(e) => warn!("⚠️ Failed to kill process {} ({}): {}", pid, marker, e),
                }
            }
        }

        if killed_count > 0 {
            info!("🔪 Reaped {} surviving workload proxies", killed_count);
        }
        Ok(killed_count)
    }

    /// Find all process IDs whose full command line matches `marker`
    pub fn find_processes_by_marker(&self, marker: &str) -> HarnessResult<Vec<i32>> {
        let output = Command::new("pgrep")
            .arg("-f") // Match full command line
            .arg(marker)
            .output()?;

        if !output.status.success() {
            // pgrep returns non-zero when no processes found - this is normal
            return Ok(vec![]);
        }

        let own_pid = std::process::id() as i32;
        let pids = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<i32>().ok())
            .filter(|pid| *pid != own_pid)
            .collect();

        Ok(pids)
    }

    /// `Ok(false)` when the process no longer exists
    fn kill_process(&self, pid: i32) -> Result<bool, nix::errno::Errno> {
        match signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
            Ok(()) => Ok(true),
            Err(nix::errno::Errno::ESRCH) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
