//! Test environment helpers.
//!
//! Tests against the live signing service only run when a configuration is
//! supplied through the environment. A repository-root `.env` is loaded
//! first so IDE and CI runs pick it up.
//!
//! Values already present in the process environment are **not** overwritten.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Path of the configuration used by live tests.
pub const LIVE_CONFIG_VAR: &str = "SIGNPDF_LIVE_CONFIG";

/// Load `KEY=VALUE` lines from `<repo>/.env` without overriding the process.
pub fn load_dotenv_if_present() {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let Ok(content) = fs::read_to_string(manifest_dir.join(".env")) else {
        return;
    };

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        env::set_var(key, value);
    }
}

/// Live configuration file, if one is configured and exists.
pub fn live_config() -> Option<PathBuf> {
    load_dotenv_if_present();
    let path = PathBuf::from(env::var_os(LIVE_CONFIG_VAR)?);
    path.is_file().then_some(path)
}
