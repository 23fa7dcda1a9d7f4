//! Bounded subprocess runner
//!
//! Every plugin invocation, whether introspection or a tool call, goes
//! through [`run_bounded`]. On unix each plugin runs in its own process
//! group, and a timeout or a dropped caller future kills the whole group,
//! so commands the plugin started die with it. Elsewhere only the direct
//! child is killed (`kill_on_drop`).

use smcp_core::EntryPoint;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Environment every plugin runs with
const PLUGIN_ENV: &[(&str, &str)] = &[
    ("PYTHONUNBUFFERED", "1"),
    ("PYTHONIOENCODING", "utf-8"),
];

/// What to run
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
        }
    }

    /// Launch line for a plugin entry point, run from the plugin's own directory.
    pub fn for_entry_point(entry: &EntryPoint) -> Self {
        let (program, args) = entry.program_and_args();
        let mut process = Self::new(program).args(args);
        process.working_dir = entry.plugin_dir().map(|d| d.to_path_buf());
        for (key, value) in PLUGIN_ENV {
            process = process.env(*key, *value);
        }
        process
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a process that ran to completion
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} killed after {after:?}")]
    TimedOut { program: String, after: Duration },
}

/// Run `process` with stdin closed, capturing stdout and stderr separately.
///
/// The child is killed if it outlives `limit` or if the returned future is
/// dropped before completion.
pub async fn run_bounded(process: &ProcessSpec, limit: Duration) -> Result<ProcessOutput, ProcessError> {
    let mut cmd = Command::new(&process.program);
    cmd.args(&process.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &process.env {
        cmd.env(key, value);
    }
    if let Some(ref dir) = process.working_dir {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    trace!(command = %process.command_line(), "Spawning plugin process");
    let started = Instant::now();
    let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: process.program.clone(),
        source,
    })?;
    let group = GroupKill::new(child.id());

    // On timeout, or if this future is dropped, `group` kills everything
    // the plugin started.
    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ProcessError::Wait {
            program: process.program.clone(),
            source,
        })?,
        Err(_) => {
            debug!(command = %process.command_line(), ?limit, "Plugin process timed out");
            return Err(ProcessError::TimedOut {
                program: process.program.clone(),
                after: limit,
            });
        }
    };

    group.disarm();
    Ok(ProcessOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration: started.elapsed(),
    })
}

/// SIGKILLs a child's process group when dropped, unless disarmed.
///
/// The group id equals the child's pid because of `process_group(0)`. It
/// stays reserved while any member is alive, so the signal can't reach an
/// unrelated group.
struct GroupKill {
    pgid: Option<i32>,
}

impl GroupKill {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    /// The child exited on its own; leave the group alone.
    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    #[cfg(unix)]
    fn drop(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid.take() else {
            return;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => trace!(pgid, "Killed plugin process group"),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!(pgid, error = %e, "Failed to kill plugin process group"),
        }
    }

    #[cfg(not(unix))]
    fn drop(&mut self) {
        self.pgid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_for_entry_point() {
        let entry = EntryPoint::interpreted("sh", "/plugins/demo/cli.sh");
        let process = ProcessSpec::for_entry_point(&entry).arg("status");

        assert_eq!(process.program, "sh");
        assert_eq!(process.args, vec!["/plugins/demo/cli.sh", "status"]);
        assert_eq!(process.working_dir, Some(PathBuf::from("/plugins/demo")));
        assert!(process
            .env
            .iter()
            .any(|(k, v)| k == "PYTHONUNBUFFERED" && v == "1"));
        assert_eq!(process.command_line(), "sh /plugins/demo/cli.sh status");
    }

    #[tokio::test]
    async fn test_run_captures_streams_separately() {
        let process = ProcessSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = run_bounded(&process, Duration::from_secs(5)).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let process = ProcessSpec::new("sh").args(["-c", "exec sleep 5"]);
        let started = Instant::now();
        let err = run_bounded(&process, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    /// Start `sh` with a backgrounded `sleep` and return its pid file.
    #[cfg(unix)]
    fn backgrounded_sleep(dir: &std::path::Path) -> (ProcessSpec, PathBuf) {
        let pid_file = dir.join("sleep.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());
        (ProcessSpec::new("sh").args(["-c".to_string(), script]), pid_file)
    }

    /// Zombies count as dead; only their new parent can still reap them.
    #[cfg(unix)]
    fn alive(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| !rest.trim_start().starts_with('Z'))
                .unwrap_or(true),
            Err(_) => nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok(),
        }
    }

    #[cfg(unix)]
    async fn assert_reaped(pid_file: &std::path::Path) {
        let pid: i32 = std::fs::read_to_string(pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while alive(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!alive(pid), "background sleep {} outlived its plugin", pid);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_commands_started_by_the_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let (process, pid_file) = backgrounded_sleep(dir.path());

        let err = run_bounded(&process, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert_reaped(&pid_file).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_run_kills_commands_started_by_the_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let (process, pid_file) = backgrounded_sleep(dir.path());

        let cancelled =
            tokio::time::timeout(Duration::from_millis(500), run_bounded(&process, Duration::from_secs(60)))
                .await;
        assert!(cancelled.is_err());
        assert_reaped(&pid_file).await;
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let process = ProcessSpec::new("/definitely/not/a/program");
        let err = run_bounded(&process, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
