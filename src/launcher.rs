//! Bring-up action: (re)start one service from its compose file.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use crate::error::DeployError;

#[async_trait]
pub trait ServiceLauncher: Send + Sync {
    /// Detached, no-deps (re)start of `service` declared in `compose_file`
    async fn up(&self, compose_file: &Path, service: &str) -> Result<(), DeployError>;
}

/// Runs `<command> -f <file> up -d --no-deps <service>`
#[derive(Debug, Clone)]
pub struct ComposeLauncher {
    program: String,
    prefix_args: Vec<String>,
}

impl Default for ComposeLauncher {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            prefix_args: vec!["compose".to_string()],
        }
    }
}

impl ComposeLauncher {
    /// `command` is the compose tool split into words, e.g. `["docker-compose"]`
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, prefix_args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            prefix_args: prefix_args.to_vec(),
        })
    }

    pub fn command_line(&self, compose_file: &Path, service: &str) -> Vec<String> {
        let mut args = vec![self.program.clone()];
        args.extend(self.prefix_args.iter().cloned());
        args.extend([
            "-f".to_string(),
            compose_file.display().to_string(),
            "up".to_string(),
            "-d".to_string(),
            "--no-deps".to_string(),
            service.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl ServiceLauncher for ComposeLauncher {
    async fn up(&self, compose_file: &Path, service: &str) -> Result<(), DeployError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .arg("-f")
            .arg(compose_file)
            .args(["up", "-d", "--no-deps", service]);

        log::debug!(
            "spawning: {} {:?}",
            self.program,
            cmd.as_std().get_args().collect::<Vec<_>>()
        );

        let output = cmd.output().await.map_err(|e| DeployError::Start {
            service: service.to_string(),
            compose_file: compose_file.to_path_buf(),
            reason: format!("failed to execute {}: {e}", self.program),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DeployError::Start {
                service: service.to_string(),
                compose_file: compose_file.to_path_buf(),
                reason: format!("exited with {}: {}", output.status, stderr.trim()),
            })
        }
    }
}
