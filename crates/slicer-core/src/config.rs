//! Build configuration for the call graph.
//!
//! Defaults are what most callers want; `from_env` lets a host process flip
//! the two policy knobs without code changes, and `from_json_file` reads the
//! same structure from disk (missing keys fall back to the defaults).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{SlicerError, SlicerResult};

pub const ZERO_TARGETS_ENV: &str = "SLICER_ZERO_TARGETS";
pub const FIELD_INIT_ATTRIBUTION_ENV: &str = "SLICER_FIELD_INIT_ATTRIBUTION";

/// What to do when a virtual call resolves but no dispatch target remains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroTargetPolicy {
    /// Drop the call site and report it as `NoTargets`.
    #[default]
    Discard,
    /// Abort the build with `SlicerError::NoDispatchTargets`.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallGraphConfig {
    pub zero_target_policy: ZeroTargetPolicy,
    /// Attribute calls in non-static field initializers to every constructor
    /// of the owning type. When off they are type-level call sites.
    pub field_initializers_to_constructors: bool,
}

impl Default for CallGraphConfig {
    fn default() -> Self {
        Self {
            zero_target_policy: ZeroTargetPolicy::Discard,
            field_initializers_to_constructors: true,
        }
    }
}

impl CallGraphConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(ZERO_TARGETS_ENV) {
            match parse_policy(&raw) {
                Some(policy) => config.zero_target_policy = policy,
                None => warn!("Ignoring {}={:?}: expected discard or strict", ZERO_TARGETS_ENV, raw),
            }
        }
        if let Some(raw) = lookup(FIELD_INIT_ATTRIBUTION_ENV) {
            config.field_initializers_to_constructors = parse_flag(&raw, true);
        }
        config
    }

    pub fn from_json_str(payload: &str) -> SlicerResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn from_json_file(path: &Path) -> SlicerResult<Self> {
        let payload = std::fs::read_to_string(path).map_err(|e| {
            SlicerError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&payload)
    }
}

fn parse_policy(raw: &str) -> Option<ZeroTargetPolicy> {
    match raw.trim().to_lowercase().as_str() {
        "discard" | "drop" => Some(ZeroTargetPolicy::Discard),
        "strict" | "error" => Some(ZeroTargetPolicy::Strict),
        _ => None,
    }
}

/// Falsy words switch a default-on flag off, truthy words switch a
/// default-off flag on; anything else keeps the default.
fn parse_flag(raw: &str, default: bool) -> bool {
    let v = raw.trim().to_lowercase();
    if default {
        !matches!(v.as_str(), "0" | "false" | "no" | "off")
    } else {
        matches!(v.as_str(), "1" | "true" | "yes" | "on")
    }
}
