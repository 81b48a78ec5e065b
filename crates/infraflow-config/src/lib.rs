pub mod credentials;
pub mod error;
pub mod settings;

pub use credentials::{Credential, CredentialStore, CredentialType};
pub use error::*;
pub use settings::{PlanSettings, Settings, TopologySettings};

use std::path::PathBuf;

const SETTINGS_CANDIDATES: [&str; 4] = [
    "infraflow.local.yaml",
    ".infraflow.local.yaml",
    "infraflow.yaml",
    ".infraflow.yaml",
];

/// Get the InfraFlow configuration directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("infraflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the settings file
///
/// Search order:
/// 1. `INFRAFLOW_CONFIG_PATH` (direct path)
/// 2. Current directory: infraflow.local.yaml, .infraflow.local.yaml, infraflow.yaml, .infraflow.yaml
/// 3. The same names under `./.infraflow/`
/// 4. `~/.config/infraflow/infraflow.yaml` (global settings)
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("INFRAFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &SETTINGS_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".infraflow");
    if project_dir.is_dir() {
        for filename in &SETTINGS_CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("infraflow").join("infraflow.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

/// Find and parse the settings file
pub fn load_settings() -> Result<Settings> {
    let path = find_settings_file()?;
    Settings::from_file(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let result = get_config_dir();
        assert!(result.is_ok());

        let config_dir = result.unwrap();
        assert!(config_dir.ends_with("infraflow"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("infraflow.yaml"), "# test").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();
        assert!(result.is_ok());
        assert!(result.unwrap().ends_with("infraflow.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_settings_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("infraflow.yaml"), "# shared").unwrap();
        fs::write(temp_dir.path().join("infraflow.local.yaml"), "# local").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file().unwrap();
        assert!(result.ends_with("infraflow.local.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_settings_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".infraflow");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("infraflow.yaml"), "# in project dir").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file().unwrap();
        assert!(result.ends_with(".infraflow/infraflow.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_settings_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "# custom").unwrap();

        unsafe {
            std::env::set_var("INFRAFLOW_CONFIG_PATH", config_path.to_str().unwrap());
        }

        let result = find_settings_file().unwrap();
        assert_eq!(result, config_path);

        unsafe {
            std::env::remove_var("INFRAFLOW_CONFIG_PATH");
        }
    }
}
