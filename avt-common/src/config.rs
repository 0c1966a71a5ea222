//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV: &str = "AVT_DATA_FOLDER";

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "avt.db";

/// Optional TOML configuration file contents
///
/// Every key is optional; a missing or unreadable file is never fatal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding `avt.db`
    pub data_folder: Option<PathBuf>,
}

/// Data folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    use_config_file: bool,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if use_config_file {
        let from_file = config_file_path()
            .ok()
            .and_then(|path| load_toml_config(&path).ok())
            .and_then(|config| config.data_folder);
        if let Some(folder) = from_file {
            return folder;
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

/// Locate the configuration file for the platform
///
/// Linux checks `~/.config/avt/config.toml` first, then `/etc/avt/config.toml`.
fn config_file_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("avt").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/avt/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("avt"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/avt"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("avt"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/avt"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("avt"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\avt"))
    } else {
        PathBuf::from("./avt_data")
    }
}

/// Path of the database file inside a data folder
pub fn database_path(data_folder: &Path) -> PathBuf {
    data_folder.join(DATABASE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cli_argument_wins_over_environment() {
        std::env::set_var("AVT_TEST_DATA_FOLDER_A", "/tmp/from-env");
        let folder = resolve_data_folder(
            Some(Path::new("/tmp/from-cli")),
            "AVT_TEST_DATA_FOLDER_A",
            false,
        );
        assert_eq!(folder, PathBuf::from("/tmp/from-cli"));
        std::env::remove_var("AVT_TEST_DATA_FOLDER_A");
    }

    #[test]
    #[serial]
    fn environment_used_when_no_cli_argument() {
        std::env::set_var("AVT_TEST_DATA_FOLDER_B", "/tmp/from-env");
        let folder = resolve_data_folder(None, "AVT_TEST_DATA_FOLDER_B", false);
        assert_eq!(folder, PathBuf::from("/tmp/from-env"));
        std::env::remove_var("AVT_TEST_DATA_FOLDER_B");
    }

    #[test]
    #[serial]
    fn falls_back_to_default() {
        std::env::remove_var("AVT_TEST_DATA_FOLDER_C");
        let folder = resolve_data_folder(None, "AVT_TEST_DATA_FOLDER_C", false);
        assert_eq!(folder, default_data_folder());
    }

    #[test]
    fn toml_config_parses_data_folder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_folder = \"/srv/avt\"\n").unwrap();

        let config = load_toml_config(&path).unwrap();
        assert_eq!(config.data_folder, Some(PathBuf::from("/srv/avt")));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "data_folder = [").unwrap();

        assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
    }

    #[test]
    fn database_path_joins_file_name() {
        let path = database_path(Path::new("/srv/avt"));
        assert_eq!(path, PathBuf::from("/srv/avt/avt.db"));
    }
}
