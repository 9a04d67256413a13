//! Path resolution for nimbus
//!
//! # Environment Variables
//!
//! - `NIMBUS_CONFIG_DIR` - Override the config directory
//!
//! # Stack file lookup
//!
//! 1. `--config` flag (or `NIMBUS_CONFIG`)
//! 2. `./nimbus.toml`
//! 3. `<config dir>/config.toml`
//! 4. Built-in defaults

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "NIMBUS_CONFIG_DIR";

/// Stack file looked up in the working directory
pub const LOCAL_STACK_FILE: &str = "nimbus.toml";

/// Get the nimbus config directory path
///
/// Priority:
/// 1. `NIMBUS_CONFIG_DIR` env var
/// 2. `XDG_CONFIG_HOME/nimbus`
/// 3. `~/.config/nimbus`
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let dir = resolve_config_dir(
        std::env::var(ENV_CONFIG_DIR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        &home,
    );
    log::debug!("Using config dir: {}", dir.display());
    Ok(dir)
}

fn resolve_config_dir(overridden: Option<&str>, xdg: Option<&str>, home: &Path) -> PathBuf {
    if let Some(dir) = overridden.filter(|d| !d.is_empty()) {
        return expand(dir);
    }
    if let Some(xdg) = xdg.filter(|d| !d.is_empty()) {
        return PathBuf::from(xdg).join("nimbus");
    }
    home.join(".config").join("nimbus")
}

/// Candidate stack files, in lookup order
pub fn stack_file_candidates(explicit: Option<&str>) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(vec![expand(path)]);
    }
    Ok(vec![
        PathBuf::from(LOCAL_STACK_FILE),
        config_dir()?.join("config.toml"),
    ])
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_priority() {
        let home = PathBuf::from("/home/dev");
        assert_eq!(
            resolve_config_dir(Some("/custom/nimbus"), Some("/xdg"), &home),
            PathBuf::from("/custom/nimbus")
        );
        assert_eq!(
            resolve_config_dir(None, Some("/xdg"), &home),
            PathBuf::from("/xdg/nimbus")
        );
        assert_eq!(
            resolve_config_dir(Some(""), None, &home),
            PathBuf::from("/home/dev/.config/nimbus")
        );
    }

    #[test]
    fn test_explicit_stack_file_wins() {
        let candidates = stack_file_candidates(Some("/stacks/prod.toml")).unwrap();
        assert_eq!(candidates, vec![PathBuf::from("/stacks/prod.toml")]);
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/stacks/nimbus.toml");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("stacks").join("nimbus.toml"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NIMBUS_NONEXISTENT_VAR_12345/file");
        assert_eq!(
            result,
            PathBuf::from("/path/$NIMBUS_NONEXISTENT_VAR_12345/file")
        );
    }
}
