//! Subprogram launcher
//!
//! Runs commands through `/bin/sh -c` with stdin closed and stdout/stderr
//! sent to a per-launch log file, and reaps them once they exit.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use log::{info, warn};

/// A running subprogram
#[derive(Debug)]
struct Subprogram {
    command: String,
    child: Child,
}

/// Launches and tracks subprograms
#[derive(Debug, Default)]
pub struct Launcher {
    /// Where `subprogram.N.log` files go; output is inherited when unset
    log_dir: Option<PathBuf>,
    /// Extra environment for every child
    environment: BTreeMap<String, String>,
    /// Number of launches so far, used to name log files
    exec_count: usize,
    children: Vec<Subprogram>,
}

impl Launcher {
    pub fn new(log_dir: Option<PathBuf>, environment: BTreeMap<String, String>) -> Self {
        Self {
            log_dir,
            environment,
            exec_count: 0,
            children: Vec::new(),
        }
    }

    /// Start `command` through the shell, returning its PID
    pub fn spawn(&mut self, command: &str) -> Result<u32> {
        let index = self.exec_count;
        self.exec_count += 1;

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(command)
            .envs(&self.environment)
            .stdin(Stdio::null());

        let log_file = match &self.log_dir {
            Some(dir) => {
                let path = log_path(dir, index);
                let file = File::create(&path)
                    .with_context(|| format!("Failed to open {} for writing", path.display()))?;
                let stderr = file
                    .try_clone()
                    .with_context(|| format!("Failed to duplicate {}", path.display()))?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
                Some(path)
            }
            None => None,
        };

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {:?}", command))?;
        let pid = child.id();
        match &log_file {
            Some(path) => info!("Started {:?} as PID [{}] logfile [{}]", command, pid, path.display()),
            None => info!("Started {:?} as PID [{}]", command, pid),
        }

        self.children.push(Subprogram {
            command: command.to_string(),
            child,
        });
        Ok(pid)
    }

    /// Collect exited children without blocking
    pub fn reap(&mut self) -> Vec<(u32, ExitStatus)> {
        let mut exited = Vec::new();
        self.children.retain_mut(|sub| match sub.child.try_wait() {
            Ok(Some(status)) => {
                let pid = sub.child.id();
                info!("PID [{}] {:?} exited: {}", pid, sub.command, status);
                exited.push((pid, status));
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll PID [{}]: {}", sub.child.id(), e);
                false
            }
        });
        exited
    }

    /// PIDs of children that have not been reaped yet
    pub fn running(&self) -> Vec<u32> {
        self.children.iter().map(|sub| sub.child.id()).collect()
    }

    pub fn exec_count(&self) -> usize {
        self.exec_count
    }
}

fn log_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("subprogram.{}.log", index))
}
