//! Container runtime seam.
//!
//! Environments talk to containers only through [`ContainerRuntime`]; the
//! production implementation shells out to the docker CLI.
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// A host-to-container port publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub host_address: String,
    pub host_port: u16,
    pub container_port: u16,
}

/// Everything needed to start one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub name: Option<String>,
    pub image: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Host path -> container path, mounted read-write.
    pub rw: BTreeMap<PathBuf, String>,
    /// Host path -> container path, mounted read-only.
    pub ro: BTreeMap<PathBuf, String>,
    /// Container name -> alias.
    pub links: BTreeMap<String, String>,
    pub ports: Vec<PortBinding>,
    /// Run in the background and leave the container in place.
    pub detach: bool,
}

impl RunSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn rw(mut self, host: impl AsRef<Path>, container: impl Into<String>) -> Self {
        self.rw.insert(host.as_ref().to_path_buf(), container.into());
        self
    }

    pub fn ro(mut self, host: impl AsRef<Path>, container: impl Into<String>) -> Self {
        self.ro.insert(host.as_ref().to_path_buf(), container.into());
        self
    }

    pub fn link(mut self, container: impl Into<String>, alias: impl Into<String>) -> Self {
        self.links.insert(container.into(), alias.into());
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn port(mut self, binding: PortBinding) -> Self {
        self.ports.push(binding);
        self
    }

    pub fn detached(mut self) -> Self {
        self.detach = true;
        self
    }

    /// Render `docker run` arguments (everything after the program name).
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if self.detach {
            args.push("-d".to_string());
        } else {
            args.push("--rm".to_string());
        }
        if let Some(name) = &self.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        for (host, container) in &self.rw {
            args.push("-v".to_string());
            args.push(format!("{}:{container}:rw", host.display()));
        }
        for (host, container) in &self.ro {
            args.push("-v".to_string());
            args.push(format!("{}:{container}:ro", host.display()));
        }
        for (container, alias) in &self.links {
            args.push("--link".to_string());
            args.push(format!("{container}:{alias}"));
        }
        for binding in &self.ports {
            args.push("-p".to_string());
            args.push(format!(
                "{}:{}:{}",
                binding.host_address, binding.host_port, binding.container_port
            ));
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Captured output of a finished container command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

pub trait ContainerRuntime {
    /// Run a container; blocks until it exits unless `spec.detach` is set.
    fn run(&self, spec: &RunSpec) -> Result<RunOutput>;

    /// Force-remove a container. Removing an absent container is not an error.
    fn remove(&self, name: &str) -> Result<()>;

    fn is_running(&self, name: &str) -> Result<bool>;
}

/// [`ContainerRuntime`] backed by the docker command line.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl DockerCli {
    /// Resolve a command line such as `docker` or `sudo docker` on `PATH`.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut words = shell_words::split(command_line)
            .with_context(|| format!("parse docker command: {command_line}"))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| anyhow!("docker command must be non-empty"))?;
        let program = which::which(&program)
            .with_context(|| format!("{program} not found; is docker installed?"))?;
        Ok(Self {
            program,
            prefix_args: words.collect(),
        })
    }

    fn exec(&self, args: &[String]) -> Result<std::process::Output> {
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.prefix_args)
            .args(args)
            .output()
            .with_context(|| format!("run {}", self.program.display()))?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            subcommand = args.first().map(String::as_str).unwrap_or_default(),
            status = output.status.code().unwrap_or(-1),
            "docker command complete"
        );
        Ok(output)
    }
}

fn first_stderr_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

impl ContainerRuntime for DockerCli {
    fn run(&self, spec: &RunSpec) -> Result<RunOutput> {
        let args = spec.to_args();
        tracing::debug!(command = %shell_words::join(&args), "docker run");
        let output = self.exec(&args)?;
        if !output.status.success() {
            let detail = first_stderr_line(&output.stderr);
            let detail = if detail.is_empty() {
                format!("status {}", output.status)
            } else {
                detail
            };
            return Err(anyhow!(
                "container {} ({}) failed: {detail}",
                spec.name.as_deref().unwrap_or("<anonymous>"),
                spec.image
            ));
        }
        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn remove(&self, name: &str) -> Result<()> {
        let args = ["rm".to_string(), "-f".to_string(), name.to_string()];
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(());
        }
        let detail = first_stderr_line(&output.stderr);
        if detail.contains("No such container") {
            return Ok(());
        }
        Err(anyhow!("remove container {name} failed: {detail}"))
    }

    fn is_running(&self, name: &str) -> Result<bool> {
        let args = [
            "inspect".to_string(),
            "-f".to_string(),
            "{{.State.Running}}".to_string(),
            name.to_string(),
        ];
        let output = self.exec(&args)?;
        if !output.status.success() {
            return Ok(false);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }
}
