//! Credential lookup

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of credential looked up per environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// Cloud provider API access
    Cloud,
    /// Login for the virtual machines that get created
    Vm,
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialType::Cloud => write!(f, "cloud"),
            CredentialType::Vm => write!(f, "vm"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub environment: String,
    pub credential_type: CredentialType,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,

    /// Cloud project the resources are created in
    #[serde(default)]
    pub project: String,

    /// Provider endpoint or CLI profile name
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl Credential {
    /// Named extra parameter (e.g. `affinity_group_id`)
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// Keyed credential lookup
pub trait CredentialStore: Send + Sync {
    fn get_credentials_for(
        &self,
        environment: &str,
        credential_type: CredentialType,
    ) -> Result<Credential>;
}

impl CredentialStore for Vec<Credential> {
    fn get_credentials_for(
        &self,
        environment: &str,
        credential_type: CredentialType,
    ) -> Result<Credential> {
        self.iter()
            .find(|c| c.environment == environment && c.credential_type == credential_type)
            .cloned()
            .ok_or_else(|| ConfigError::CredentialNotFound {
                environment: environment.to_string(),
                credential_type: credential_type.to_string(),
            })
    }
}
