//! Common utilities for runtime tests

use std::path::PathBuf;
use std::time::Duration;

use market_research::runtime::{CapabilityRegistry, CapabilitySpec, ProcessCapability};

/// Runtime with a single capability `name` backed by `spec`
pub fn runtime_with(name: &str, spec: CapabilitySpec) -> ProcessCapability {
    let mut registry = CapabilityRegistry::new();
    registry.register(name, spec);
    ProcessCapability::new(registry)
}

/// `sh -c <script>`; invocation args land in `$0`, `$1`, ...
pub fn shell(script: &str) -> CapabilitySpec {
    CapabilitySpec::new("/bin/sh")
        .arg("-c")
        .arg(script)
        .timeout(Duration::from_secs(10))
}

/// Runtime with a single capability running `script` in `sh`
pub fn script_runtime(name: &str, script: &str) -> ProcessCapability {
    runtime_with(name, shell(script))
}

pub fn capability_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_research-capability"))
}
