//! Process-based capability runtime
//!
//! Every invocation starts one OS process. The child inherits the server's
//! environment with the registry's static env and then the invocation's env merged
//! on top. Stdout is the result channel; stderr carries diagnostics and
//! `__CAPABILITY_EVENT__:` progress lines.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use market_research_sdk::{
    async_trait, names, Capability, CapabilityError, CapabilityEvent, CapabilityOutput,
    CapabilityResult, Invocation,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, info, warn};

/// How to run one named capability
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilitySpec {
    pub program: PathBuf,
    /// Leading arguments, placed before the invocation's arguments
    pub args: Vec<String>,
    /// Static environment, applied before the invocation's environment
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CapabilitySpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Capability name -> how to run it. Immutable once the server starts.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    specs: BTreeMap<String, CapabilitySpec>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every known capability to `program <capability-name>`
    pub fn for_binary(program: &Path, generate_timeout: Duration, store_timeout: Duration) -> Self {
        let mut registry = Self::new();
        for name in names::ALL {
            let timeout = if name == names::GENERATE_RESEARCH {
                generate_timeout
            } else {
                store_timeout
            };
            registry.register(name, CapabilitySpec::new(program).arg(name).timeout(timeout));
        }
        registry
    }

    /// Add or replace the spec for `name`
    pub fn register(&mut self, name: impl Into<String>, spec: CapabilitySpec) {
        self.specs.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&CapabilitySpec> {
        self.specs.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Runs capabilities as child processes
#[derive(Debug, Clone)]
pub struct ProcessCapability {
    registry: Arc<CapabilityRegistry>,
}

impl ProcessCapability {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Build the child command: spec args then invocation args, spec env then invocation env
    fn build_command(spec: &CapabilitySpec, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .args(invocation.args())
            .envs(&spec.env)
            .envs(invocation.env_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Capability for ProcessCapability {
    async fn invoke(&self, invocation: Invocation) -> CapabilityResult<CapabilityOutput> {
        let name = invocation.capability().to_string();
        let spec = self
            .registry
            .get(&name)
            .ok_or_else(|| CapabilityError::Unknown(name.clone()))?;

        debug!(
            capability = %name,
            program = %spec.program.display(),
            args = ?invocation.args(),
            env_keys = ?invocation.env_keys(),
            "spawning capability"
        );

        let started = Instant::now();
        let mut child = Self::build_command(spec, &invocation)
            .spawn()
            .map_err(|source| CapabilityError::Spawn {
                capability: name.clone(),
                source,
            })?;

        let io_error = |source: io::Error| CapabilityError::Io {
            capability: name.clone(),
            source,
        };
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error(io::Error::new(io::ErrorKind::Other, "stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io_error(io::Error::new(io::ErrorKind::Other, "stderr not captured")))?;

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe
        let run = async {
            tokio::try_join!(
                read_stdout(stdout),
                parse_capability_stderr(&name, stderr),
                child.wait()
            )
        };

        let outcome = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.ok(),
            None => Some(run.await),
        };

        let (stdout, diagnostic, status) = match outcome {
            Some(result) => result.map_err(io_error)?,
            None => {
                let _ = child.kill().await;
                let timeout = spec.timeout.unwrap_or_default();
                warn!(capability = %name, ?timeout, "capability timed out, process killed");
                return Err(CapabilityError::TimedOut {
                    capability: name,
                    timeout,
                });
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if status.success() {
            let output = CapabilityOutput::from_stdout(&stdout);
            debug!(
                capability = %name,
                elapsed_ms,
                output = output.kind(),
                "capability finished"
            );
            return Ok(output);
        }

        let diagnostic = invocation.redact(diagnostic.trim());
        warn!(
            capability = %name,
            exit_code = ?status.code(),
            elapsed_ms,
            "capability exited with failure"
        );
        Err(CapabilityError::Failed {
            capability: name,
            code: status.code(),
            diagnostic,
        })
    }

    fn capabilities(&self) -> Vec<String> {
        self.registry.names()
    }
}

/// Collect full stdout; invalid UTF-8 is replaced rather than rejected
async fn read_stdout(mut stdout: ChildStdout) -> io::Result<String> {
    let mut buffer = Vec::new();
    stdout.read_to_end(&mut buffer).await?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Parse capability stderr for `__CAPABILITY_EVENT__:<JSON>` lines; everything else is diagnostics
async fn parse_capability_stderr(capability: &str, stderr: ChildStderr) -> io::Result<String> {
    let mut segments = BufReader::new(stderr).split(b'\n');
    let mut diagnostic = Vec::new();

    while let Some(segment) = segments.next_segment().await? {
        let line = String::from_utf8_lossy(&segment);
        let line = line.trim_end_matches('\r');

        match CapabilityEvent::parse_line(line) {
            Some(event) => log_event(capability, &event),
            None => diagnostic.push(line.to_string()),
        }
    }

    Ok(diagnostic.join("\n"))
}

fn log_event(capability: &str, event: &CapabilityEvent) {
    match event {
        CapabilityEvent::StageStarted {
            stage,
            name,
            total_stages,
        } => info!(capability, stage, total_stages, "stage started: {}", name),
        CapabilityEvent::StageCompleted { stage, name, tokens } => {
            info!(capability, stage, tokens = ?tokens, "stage completed: {}", name)
        }
        CapabilityEvent::StageFailed { stage, name, error } => {
            warn!(capability, stage, %error, "stage failed: {}", name)
        }
    }
}
