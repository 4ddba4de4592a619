//! Ambient configuration structs, following the donor's `openclaw_config.rs` shape:
//! serde-`Deserialize` with `#[serde(default)]` fields, loaded from JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Profile;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub pause: PauseConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            profiles: BTreeMap::new(),
            pause: PauseConfig::default(),
        }
    }
}

/// Router timeouts/truncation caps (spec §4.4, §5).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
    /// Smart-mode threshold for `shell`: a partition point between sync and async
    /// reply, not an execution cap (spec §5).
    #[serde(default = "default_shell_smart_mode_threshold_ms")]
    pub shell_smart_mode_threshold_ms: u64,
    #[serde(default = "default_truncation_bytes")]
    pub truncation_bytes: usize,
    #[serde(default = "default_max_spawn_retries")]
    pub max_spawn_retries: u32,
}

fn default_action_timeout_ms() -> u64 {
    30_000
}

fn default_shell_smart_mode_threshold_ms() -> u64 {
    100
}

fn default_truncation_bytes() -> usize {
    16_384
}

fn default_max_spawn_retries() -> u32 {
    3
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: default_action_timeout_ms(),
            shell_smart_mode_threshold_ms: default_shell_smart_mode_threshold_ms(),
            truncation_bytes: default_truncation_bytes(),
            max_spawn_retries: default_max_spawn_retries(),
        }
    }
}

/// Pause grace-window and sweep configuration (spec §4.6 step 4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PauseConfig {
    #[serde(default = "default_pause_grace_ms")]
    pub grace_window_ms: u64,
}

fn default_pause_grace_ms() -> u64 {
    500
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: default_pause_grace_ms(),
        }
    }
}

/// Gateway auth mode (ambient entrypoint concern, spec §1: "does not standardize a
/// CLI" — this lives outside the core, but the Supervisor binary still needs it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    None,
    Token,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_mode")]
    pub mode: AuthMode,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_auth_mode() -> AuthMode {
    AuthMode::None
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { mode: default_auth_mode(), token: None }
    }
}

/// Where the Supervisor binary's HTTP listener binds.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Loopback,
    #[default]
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_port() -> u16 {
    18789
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { port: default_port(), bind: BindMode::default(), auth: AuthConfig::default() }
    }
}
