//! Process-group environment for the worker.
//!
//! The composer never touches the orchestrator's own environment. It takes
//! a snapshot of the inherited variables and returns a new map that is
//! handed to the spawn call as the child's complete environment.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use crate::plan::Topology;

pub const ENV_RANK: &str = "RANK";
pub const ENV_LOCAL_RANK: &str = "LOCAL_RANK";
pub const ENV_WORLD_SIZE: &str = "WORLD_SIZE";
pub const ENV_NNODES: &str = "NNODES";
pub const ENV_MASTER_ADDR: &str = "MASTER_ADDR";
pub const ENV_MASTER_PORT: &str = "MASTER_PORT";
pub const ENV_VISIBLE_DEVICES: &str = "CUDA_VISIBLE_DEVICES";
pub const ENV_NCCL_DEBUG: &str = "NCCL_DEBUG";

/// Settings applied to single-process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRendezvous {
    pub master_addr: String,
    pub master_port: u16,
    /// Device selector used when the inherited environment sets none.
    pub default_devices: String,
    pub nccl_debug: String,
}

impl Default for LocalRendezvous {
    fn default() -> Self {
        Self {
            master_addr: "127.0.0.1".to_string(),
            master_port: 12345,
            default_devices: "0".to_string(),
            nccl_debug: "WARN".to_string(),
        }
    }
}

/// Complete environment for one worker launch.
///
/// Names and values are kept as raw OS strings so variables that are not
/// valid UTF-8 reach the worker byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnvironment {
    vars: BTreeMap<OsString, OsString>,
}

impl ProcessEnvironment {
    /// Snapshot of the current process environment.
    pub fn inherited() -> Self {
        Self {
            vars: std::env::vars_os().collect(),
        }
    }

    /// Value of `key`, if set and valid UTF-8.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_os(key).and_then(OsStr::to_str)
    }

    pub fn get_os(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    fn set(&mut self, key: &str, value: impl Into<OsString>) {
        self.vars.insert(OsString::from(key), value.into());
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for ProcessEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Build the worker environment for `topology` on top of `inherited`.
///
/// Local runs get a fixed single-rank process group. Distributed runs get
/// the inherited environment untouched because the launcher assigns
/// ranks to each process it spawns.
pub fn compose(
    topology: Topology,
    inherited: &ProcessEnvironment,
    rendezvous: &LocalRendezvous,
) -> ProcessEnvironment {
    let mut env = inherited.clone();
    if topology.is_local() {
        let devices = inherited
            .get_os(ENV_VISIBLE_DEVICES)
            .map(OsStr::to_os_string)
            .unwrap_or_else(|| OsString::from(&rendezvous.default_devices));

        env.set(ENV_RANK, "0");
        env.set(ENV_LOCAL_RANK, "0");
        env.set(ENV_WORLD_SIZE, "1");
        env.set(ENV_NNODES, "1");
        env.set(ENV_VISIBLE_DEVICES, devices);
        env.set(ENV_MASTER_ADDR, rendezvous.master_addr.as_str());
        env.set(ENV_MASTER_PORT, rendezvous.master_port.to_string());
        env.set(ENV_NCCL_DEBUG, rendezvous.nccl_debug.as_str());
    }
    env
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
