//! Process Supervisor
//!
//! Owns one supervised scheduler process: its port, private work directory,
//! generated secret file and child handle. `start` spawns the child and then
//! keeps probing the readiness endpoint until it answers, because a live OS
//! process is not yet a scheduler that accepts requests.

use std::io::ErrorKind;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use rand::{Rng, distributions::Alphanumeric};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::config::supervisor::{HTTP_PORT_KEY, SupervisorConfig, flatten_args};
use crate::error::{HarnessError, HarnessResult};

pub const READINESS_PATH: &str = "/v2/leader";
const SECRET_FILE_NAME: &str = "scheduler-secret";
const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between readiness probes: starts at `min`, doubles, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1),
            max: Duration::from_secs(5),
        }
    }
}

impl Backoff {
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max).max(self.min)
    }
}

enum ProcessState {
    NotStarted,
    Running(Child),
    Stopped,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    listen_port: u16,
    work_dir: Option<TempDir>,
    work_dir_path: PathBuf,
    secret_file: PathBuf,
    settings: Vec<(String, String)>,
    state: ProcessState,
    client: reqwest::Client,
    backoff: Backoff,
}

impl ProcessSupervisor {
    /// Allocate a port and a work directory and compute the launch settings
    ///
    /// Nothing is spawned; see [`ProcessSupervisor::launch`] for the
    /// auto-starting variant.
    pub fn configure(config: SupervisorConfig) -> HarnessResult<Self> {
        let listen_port = allocate_port()?;
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", config.suite_name, listen_port))
            .tempdir()?;
        let work_dir_path = work_dir.path().to_path_buf();
        let secret_file = write_secret(work_dir.path())?;
        let settings = config.settings(listen_port, &secret_file);

        let client = reqwest::Client::builder()
            .timeout(PROBE_REQUEST_TIMEOUT)
            .no_proxy()
            .build()?;

        tracing::info!(
            "🔧 Configured supervised process '{}' on port {} in {}",
            config.suite_name,
            listen_port,
            work_dir_path.display()
        );

        Ok(Self {
            config,
            listen_port,
            work_dir: Some(work_dir),
            work_dir_path,
            secret_file,
            settings,
            state: ProcessState::NotStarted,
            client,
            backoff: Backoff::default(),
        })
    }

    /// Configure, then start right away when the config asks for it
    pub async fn launch(config: SupervisorConfig) -> HarnessResult<Self> {
        let auto_start = config.auto_start;
        let mut supervisor = Self::configure(config)?;
        if auto_start {
            supervisor.start().await?;
        }
        Ok(supervisor)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Port the readiness probe targets: an `http_port` override if one was
    /// given, the allocated port otherwise
    pub fn probe_port(&self) -> u16 {
        self.settings
            .iter()
            .find(|(key, _)| key == HTTP_PORT_KEY)
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(self.listen_port)
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.probe_port())
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir_path
    }

    pub fn secret_file(&self) -> &Path {
        &self.secret_file
    }

    pub fn settings(&self) -> &[(String, String)] {
        &self.settings
    }

    /// Full argument vector passed after the program name
    pub fn args(&self) -> Vec<String> {
        let mut args = self.config.launch.prefix_args.clone();
        args.extend(flatten_args(&self.settings));
        args
    }

    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            ProcessState::Running(child) => child.id(),
            _ => None,
        }
    }

    /// Check whether the child is alive, noting an unexpected exit
    pub fn is_running(&mut self) -> bool {
        let exited = match &mut self.state {
            ProcessState::Running(child) => match child.try_wait() {
                Ok(None) => return true,
                Ok(Some(status)) => status.to_string(),
                Err(e) => e.to_string(),
            },
            _ => return false,
        };

        tracing::warn!("⚠️ Supervised process on port {} exited: {}", self.probe_port(), exited);
        self.state = ProcessState::Stopped;
        false
    }

    /// Spawn the child and wait until it answers the readiness probe
    ///
    /// A no-op when a child is already running. There is no attempt ceiling:
    /// bound the wait with [`ProcessSupervisor::start_within`] or an outer
    /// timeout. Whatever ends the wait early (the child exiting, the future
    /// being dropped) also kills the child, so `start` can simply be retried.
    pub async fn start(&mut self) -> HarnessResult<()> {
        if self.is_running() {
            tracing::debug!("✅ Supervised process on port {} already running", self.probe_port());
            return Ok(());
        }

        let mut child = self.spawn()?;
        match self.await_ready(&mut child).await {
            Ok(attempts) => {
                tracing::info!(
                    "✅ Supervised process (PID: {:?}) ready on port {} after {} probes",
                    child.id(),
                    self.probe_port(),
                    attempts
                );
                self.state = ProcessState::Running(child);
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ Supervised process failed to become ready: {}", e);
                if let Err(kill_err) = child.kill().await {
                    tracing::debug!("Child already gone after failed start: {}", kill_err);
                }
                Err(e)
            }
        }
    }

    /// [`ProcessSupervisor::start`] bounded by the caller's timeout
    pub async fn start_within(&mut self, timeout: Duration) -> HarnessResult<()> {
        let port = self.probe_port();
        match tokio::time::timeout(timeout, self.start()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("⏰ Supervised process on port {} not ready within {:?}", port, timeout);
                Err(HarnessError::ReadinessTimeout { port, waited: timeout })
            }
        }
    }

    /// Kill the child if there is one
    pub async fn stop(&mut self) -> HarnessResult<()> {
        match std::mem::replace(&mut self.state, ProcessState::Stopped) {
            ProcessState::Running(mut child) => {
                tracing::info!("🔨 Killing supervised process (PID: {:?})", child.id());
                child.kill().await?;
                tracing::info!("✅ Supervised process on port {} stopped", self.probe_port());
                Ok(())
            }
            previous => {
                self.state = previous;
                Ok(())
            }
        }
    }

    /// Stop the child and remove the work directory
    ///
    /// Never fails: the directory may already be gone, and teardown has to
    /// carry on either way.
    pub async fn close(&mut self) {
        if let Err(e) = self.stop().await {
            tracing::warn!("⚠️ Failed to stop supervised process: {}", e);
        }

        if let Some(work_dir) = self.work_dir.take() {
            let path = work_dir.path().to_path_buf();
            match work_dir.close() {
                Ok(()) => tracing::debug!("🗑️ Removed work directory {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("⚠️ Failed to remove work directory {}: {}", path.display(), e),
            }
        }
    }

    fn spawn(&self) -> HarnessResult<Child> {
        let program = &self.config.launch.program;
        tracing::info!(
            "🚀 Starting supervised process: {} {}",
            program,
            self.args().join(" ")
        );

        let mut cmd = Command::new(program);
        cmd.args(self.args())
            .current_dir(&self.work_dir_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if self.config.forward_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = cmd.spawn().map_err(|source| HarnessError::SpawnFailure {
            program: program.clone(),
            source,
        })?;

        let prefix = format!("{}-{}", self.config.suite_name, self.probe_port());
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, prefix.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, prefix);
        }

        Ok(child)
    }

    async fn await_ready(&self, child: &mut Child) -> HarnessResult<u32> {
        let url = format!("{}{}", self.url(), READINESS_PATH);
        let mut delay = self.backoff.min;
        let mut attempts = 0u32;

        loop {
            if let Some(status) = child.try_wait()? {
                return Err(HarnessError::ProcessExited {
                    status: status.to_string(),
                });
            }

            attempts += 1;
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(attempts),
                Ok(response) => {
                    tracing::debug!("⏳ {} not ready yet: HTTP {}", url, response.status());
                }
                Err(e) => {
                    tracing::debug!("⏳ {} not reachable yet: {}", url, e);
                }
            }

            tokio::time::sleep(delay).await;
            delay = self.backoff.next(delay);
        }
    }
}

/// Ask the OS for a free port. The listener is dropped right away, so the
/// port is only very likely, not guaranteed, to still be free at spawn time.
fn allocate_port() -> HarnessResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn write_secret(dir: &Path) -> HarnessResult<PathBuf> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let path = dir.join(SECRET_FILE_NAME);
    std::fs::write(&path, secret)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(path)
}

fn forward_lines<R>(stream: R, prefix: String)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(target: "supervised", "[{}] {}", prefix, line);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchCommand;

    fn config() -> SupervisorConfig {
        SupervisorConfig::builder()
            .suite_name("unit")
            .auto_start(false)
            .launch(LaunchCommand::custom("sh", ["-c", "sleep 30"]))
            .build()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let backoff = Backoff::default();
        assert_eq!(backoff.next(Duration::from_millis(1)), Duration::from_millis(2));
        assert_eq!(backoff.next(Duration::from_secs(4)), Duration::from_secs(5));
        assert_eq!(backoff.next(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_configure_writes_secret_and_settings() {
        let supervisor = ProcessSupervisor::configure(config()).unwrap();
        assert!(supervisor.work_dir().is_dir());
        let secret = std::fs::read_to_string(supervisor.secret_file()).unwrap();
        assert_eq!(secret.len(), 32);

        let args = supervisor.args();
        assert_eq!(&args[..2], &["-c", "sleep 30"]);
        let port_flag = args.iter().position(|a| a == "--http_port").unwrap();
        assert_eq!(args[port_flag + 1], supervisor.listen_port().to_string());
        assert_eq!(supervisor.probe_port(), supervisor.listen_port());
    }

    #[test]
    fn test_http_port_override_drives_probe_port() {
        let config = SupervisorConfig::builder().extra("http_port", "4321").build();
        let supervisor = ProcessSupervisor::configure(config).unwrap();
        assert_eq!(supervisor.probe_port(), 4321);
        assert_eq!(supervisor.url(), "http://localhost:4321");
    }

    #[tokio::test]
    async fn test_close_never_started_is_safe() {
        let mut supervisor = ProcessSupervisor::configure(config()).unwrap();
        let dir = supervisor.work_dir().to_path_buf();
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.pid(), None);

        supervisor.close().await;
        assert!(!dir.exists());
        // a second close has nothing left to do
        supervisor.close().await;
        supervisor.stop().await.unwrap();
    }
}
