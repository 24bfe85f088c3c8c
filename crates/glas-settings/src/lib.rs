//! # glas-settings
//!
//! Configuration for the Glas gateway, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults** — [`GatewaySettings::default()`]
//! 2. **User file** — `~/.glas/gateway.json` (deep-merged over defaults)
//! 3. **Environment variables** — `GLAS_*` overrides (highest priority)
//!
//! The binary applies its command-line flags on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
