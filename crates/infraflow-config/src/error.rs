use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "Settings file not found. Looked in:\n\
        - INFRAFLOW_CONFIG_PATH\n\
        - current directory: infraflow.local.yaml, .infraflow.local.yaml, infraflow.yaml, .infraflow.yaml\n\
        - ./.infraflow/ directory\n\
        - ~/.config/infraflow/infraflow.yaml"
    )]
    SettingsFileNotFound,

    #[error("No {credential_type} credential configured for environment {environment}")]
    CredentialNotFound {
        environment: String,
        credential_type: String,
    },

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
