use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};

// ── Environment variables ─────────────────────────────────────────────────────

pub const ENV_CLUSTER: &str = "SIDELOG_CLUSTER";
pub const ENV_RESOURCE_UID: &str = "SIDELOG_RESOURCE_UID";
pub const ENV_RESOURCE_NAMESPACE: &str = "SIDELOG_RESOURCE_NAMESPACE";
pub const ENV_RESOURCE_NAME: &str = "SIDELOG_RESOURCE_NAME";
pub const ENV_GENERATION: &str = "SIDELOG_GENERATION";
pub const ENV_ROOT_PATH: &str = "SIDELOG_ROOT_PATH";
pub const ENV_MANAGER_HOST: &str = "SIDELOG_MANAGER_HOST";
pub const ENV_SPEC_PATH: &str = "SIDELOG_SPEC_PATH";
pub const ENV_APPROVAL_INTERVAL_SECS: &str = "SIDELOG_APPROVAL_INTERVAL_SECS";
pub const ENV_DIR_TIMEOUT_SECS: &str = "SIDELOG_DIR_TIMEOUT_SECS";

const DEFAULT_APPROVAL_INTERVAL_SECS: u64 = 15;
const DEFAULT_DIR_TIMEOUT_SECS: u64 = 300;

/// Everything the sidecar needs to run, resolved once at startup and passed
/// by reference into each component.
///
/// The provisioning components (admission webhook + informer) guarantee these
/// variables are present in the container environment before the process
/// starts; a missing value is a deployment bug, so startup fails fast with
/// one error naming every absent variable.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub cluster_name: String,
    pub resource_uid: String,
    pub resource_namespace: String,
    pub resource_name: String,
    /// Generation of the managed resource this sidecar is scoped to.
    /// Kept as a string (the store stores it verbatim) but validated to be a
    /// non-negative base-10 integer, matching the generation directory name.
    pub resource_generation: String,
    pub root_path: PathBuf,
    /// Manager service base URL used for the access handshake.
    pub manager_host: String,
    /// Optional file holding the resource spec snapshot uploaded on
    /// generation changes. Absent or unreadable files degrade to an empty
    /// snapshot.
    pub spec_path: Option<PathBuf>,
    pub approval_interval: Duration,
    pub dir_timeout: Duration,
}

impl SidecarConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key→value source. `from_env` delegates here;
    /// tests supply a map instead of mutating process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing: Vec<&str> = Vec::new();
        let mut require = |key: &'static str| match lookup(key) {
            Some(value) if !value.is_empty() => value,
            _ => {
                missing.push(key);
                String::new()
            }
        };

        let cluster_name = require(ENV_CLUSTER);
        let resource_uid = require(ENV_RESOURCE_UID);
        let resource_namespace = require(ENV_RESOURCE_NAMESPACE);
        let resource_name = require(ENV_RESOURCE_NAME);
        let resource_generation = require(ENV_GENERATION);
        let root_path = require(ENV_ROOT_PATH);
        let manager_host = require(ENV_MANAGER_HOST);

        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        if !resource_generation.bytes().all(|b| b.is_ascii_digit()) {
            bail!("{ENV_GENERATION} must be a non-negative integer, got '{resource_generation}'");
        }

        let approval_interval = Duration::from_secs(parse_secs(
            &lookup,
            ENV_APPROVAL_INTERVAL_SECS,
            DEFAULT_APPROVAL_INTERVAL_SECS,
        )?);
        let dir_timeout = Duration::from_secs(parse_secs(
            &lookup,
            ENV_DIR_TIMEOUT_SECS,
            DEFAULT_DIR_TIMEOUT_SECS,
        )?);

        Ok(Self {
            cluster_name,
            resource_uid,
            resource_namespace,
            resource_name,
            resource_generation,
            root_path: PathBuf::from(root_path),
            manager_host,
            spec_path: lookup(ENV_SPEC_PATH)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            approval_interval,
            dir_timeout,
        })
    }

    /// The directory this sidecar watches:
    /// `<root>/generations/<generation>`.
    pub fn generation_dir(&self) -> PathBuf {
        self.root_path
            .join("generations")
            .join(&self.resource_generation)
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.is_empty() => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| anyhow!("{key} must be an integer number of seconds, got '{raw}'")),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
