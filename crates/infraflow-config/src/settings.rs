//! Settings file model

use crate::credentials::{Credential, CredentialStore, CredentialType};
use crate::error::{ConfigError, Result};
use infraflow_store::{Bundle, Environment, Plan};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed `infraflow.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub environments: Vec<Environment>,

    #[serde(default)]
    pub plans: Vec<PlanSettings>,

    #[serde(default)]
    pub credentials: Vec<Credential>,

    #[serde(default)]
    pub topology: TopologySettings,
}

/// A plan together with the bundles it may place virtual machines in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSettings {
    #[serde(flatten)]
    pub plan: Plan,

    #[serde(default)]
    pub bundles: Vec<Bundle>,
}

/// Ports used when wiring instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySettings {
    #[serde(default = "default_primary_port")]
    pub primary_port: u16,

    #[serde(default = "default_coordinator_port")]
    pub coordinator_port: u16,
}

fn default_primary_port() -> u16 {
    6379
}

fn default_coordinator_port() -> u16 {
    26379
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            primary_port: default_primary_port(),
            coordinator_port: default_coordinator_port(),
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for plan in &self.plans {
            if plan.plan.offerings.is_empty() {
                return Err(ConfigError::InvalidSettings(format!(
                    "plan {} has no offerings",
                    plan.plan.id
                )));
            }
        }
        Ok(())
    }

    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.environments
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| ConfigError::EnvironmentNotFound(name.to_string()))
    }

    pub fn plan(&self, id: &str) -> Result<&PlanSettings> {
        self.plans
            .iter()
            .find(|p| p.plan.id == id)
            .ok_or_else(|| ConfigError::PlanNotFound(id.to_string()))
    }
}

impl CredentialStore for Settings {
    fn get_credentials_for(
        &self,
        environment: &str,
        credential_type: CredentialType,
    ) -> Result<Credential> {
        self.credentials
            .get_credentials_for(environment, credential_type)
    }
}
