//! Configuration discovery, parsing, and validation for the MCP
//! tool-invocation gateway.
//!
//! The core (`mcpgw-core`) only ever consumes an already-validated
//! [`GatewayConfig`] record; everything file-path and TOML related
//! lives here, mirroring how `astrid_mcp::config::ServersConfig`
//! stays out of `astrid-kernel`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(unreachable_pub)]

mod error;

pub use error::ConfigError;

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use mcpgw_core::model::GatewayConfig;

/// Filename searched for in the current directory and the user config
/// directory.
pub const CONFIG_FILE_NAME: &str = "mcp-gateway.toml";

/// Resolve which config file to load, honoring explicit > cwd > user
/// config dir precedence (spec.md §6 `DaemonSettings.socket`-style
/// precedence, applied here to the config file itself).
#[must_use]
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let cwd_candidate = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_candidate.exists() {
        return Some(cwd_candidate);
    }

    if let Some(dirs) = ProjectDirs::from("", "", "mcp-gateway") {
        let candidate = dirs.config_dir().join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

/// The default config path, whether or not it currently exists — used
/// by `mcpgw-cli`'s `get-config` reporting and scaffolding commands.
///
/// # Errors
///
/// Returns an error if the platform's config directory cannot be
/// determined.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("", "", "mcp-gateway")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Load and validate a [`GatewayConfig`] from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read,
/// [`ConfigError::Parse`] if it is not valid TOML matching the schema,
/// or [`ConfigError::Invalid`] if the parsed settings fail the core's
/// own validation (spec.md §6: command non-empty, batch width ≥ 1,
/// timeouts > 0).
pub fn load(path: &Path) -> Result<GatewayConfig, ConfigError> {
    tracing::debug!(path = %path.display(), "loading gateway config");
    let content = std::fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    for (name, spec) in &mut config.mcp_servers {
        if spec.name.is_empty() {
            spec.name = name.clone();
        }
        if spec.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("server '{name}': command must not be empty")));
        }
    }

    config
        .daemon
        .validate()
        .map_err(ConfigError::Invalid)?;

    config.source_path = Some(path.display().to_string());
    Ok(config)
}

/// Load from `explicit` if given, else discover via [`find_config_file`];
/// an empty, all-defaults [`GatewayConfig`] if nothing is found
/// (spec.md: the daemon can run with zero configured servers).
///
/// # Errors
///
/// Returns [`ConfigError`] if a config file is found but fails to
/// parse or validate.
pub fn load_or_default(explicit: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match find_config_file(explicit) {
        Some(path) => load(&path),
        None => Ok(GatewayConfig::default()),
    }
}

/// Serialize `config` back to TOML and write it to `path`, creating
/// parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if serialization fails, or
/// [`ConfigError::Io`] if the file cannot be written.
pub fn save(config: &GatewayConfig, path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn find_config_file_honors_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(find_config_file(Some(&path)), Some(path));
    }

    #[test]
    fn find_config_file_rejects_missing_explicit_path() {
        let path = PathBuf::from("/tmp/definitely-not-there-mcpgw.toml");
        assert_eq!(find_config_file(Some(&path)), None);
    }

    #[test]
    fn load_rejects_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[mcpServers.broken]\ncommand = \"\"").unwrap();
        drop(file);

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_fills_in_source_path_and_server_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[mcpServers.echo]\ncommand = \"npx\"\nargs = [\"-y\", \"echo-server\"]\n",
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.mcp_servers["echo"].name, "echo");
        assert!(config.source_path.is_some());
    }

    #[test]
    fn load_or_default_returns_defaults_when_nothing_found() {
        let path = PathBuf::from("/tmp/definitely-not-there-mcpgw.toml");
        let config = load_or_default(Some(&path)).unwrap();
        assert!(config.mcp_servers.is_empty());
    }
}
