//! cmk (CloudMonkey) CLI wrapper
//!
//! Wraps the cmk commands needed to deploy and destroy virtual machines.

use crate::error::{CloudStackError, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// cmk CLI wrapper bound to one profile
pub struct Cmk {
    profile: String,
}

impl Cmk {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Check if cmk is installed and the profile can reach the API
    pub async fn check_auth(&self) -> Result<Capabilities> {
        let which = Command::new("which").arg("cmk").output().await?;

        if !which.status.success() {
            return Err(CloudStackError::CmkNotFound);
        }

        let output = self.run_command(&["list", "capabilities"]).await?;
        let response: CapabilitiesResponse = serde_json::from_str(&output)?;
        Ok(response.capability)
    }

    /// Run a cmk command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("cmk");
        cmd.arg("-p").arg(&self.profile);
        cmd.arg("-o").arg("json");
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: cmk -p {} -o json {}", self.profile, args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CloudStackError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Deploy a virtual machine and wait for the async job to finish
    pub async fn deploy_virtual_machine(
        &self,
        config: &DeployVirtualMachineConfig,
    ) -> Result<VirtualMachineInfo> {
        let args = config.to_args();
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = self.run_command(&arg_refs).await?;
        parse_deploy_response(&output)
    }

    /// Destroy and expunge a virtual machine
    pub async fn destroy_virtual_machine(&self, id: &str) -> Result<()> {
        let id_arg = format!("id={}", id);
        let output = self
            .run_command(&["destroy", "virtualmachine", id_arg.as_str(), "expunge=true"])
            .await;

        match output {
            Ok(_) => Ok(()),
            Err(CloudStackError::CommandFailed(stderr))
                if stderr.contains("Unable to find") || stderr.contains("does not exist") =>
            {
                Err(CloudStackError::VirtualMachineNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse the output of `deploy virtualmachine`
///
/// cmk prints the finished async job's `virtualmachine` either as an object
/// or, on some API versions, as a one-element list.
pub fn parse_deploy_response(output: &str) -> Result<VirtualMachineInfo> {
    let response: DeployResponse = serde_json::from_str(output)?;

    match response.virtualmachine {
        OneOrMany::One(vm) => Ok(vm),
        OneOrMany::Many(mut vms) => {
            if vms.is_empty() {
                return Err(CloudStackError::UnexpectedResponse(
                    "deploy returned an empty virtualmachine list".to_string(),
                ));
            }
            Ok(vms.swap_remove(0))
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeployResponse {
    virtualmachine: OneOrMany<VirtualMachineInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Debug, Deserialize)]
struct CapabilitiesResponse {
    capability: Capabilities,
}

/// Subset of `list capabilities` used as an auth probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(rename = "cloudstackversion")]
    pub cloudstack_version: Option<String>,
}

/// Virtual machine information from cmk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachineInfo {
    pub id: String,

    pub name: String,

    pub state: Option<String>,

    #[serde(default)]
    pub nic: Vec<NicInfo>,
}

impl VirtualMachineInfo {
    /// Check if the virtual machine is running
    pub fn is_running(&self) -> bool {
        self.state.as_deref() == Some("Running")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicInfo {
    #[serde(rename = "ipaddress")]
    pub ip_address: Option<String>,
}

/// Configuration for deploying a virtual machine
#[derive(Debug, Clone)]
pub struct DeployVirtualMachineConfig {
    pub name: String,
    pub service_offering_id: String,
    pub zone_id: String,
    pub template_id: String,
    pub network_id: String,
    pub project_id: String,
    pub affinity_group_id: Option<String>,
}

impl DeployVirtualMachineConfig {
    fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "deploy".to_string(),
            "virtualmachine".to_string(),
            format!("serviceofferingid={}", self.service_offering_id),
            format!("zoneid={}", self.zone_id),
            format!("templateid={}", self.template_id),
            format!("networkids={}", self.network_id),
            format!("projectid={}", self.project_id),
            format!("name={}", self.name),
            format!("displayname={}", self.name),
        ];

        if let Some(ref group) = self.affinity_group_id {
            args.push(format!("affinitygroupids={}", group));
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deploy_object() {
        let output = r#"{
            "virtualmachine": {
                "id": "5b1b4f1c-0000-4000-8000-000000000001",
                "name": "redis-01",
                "state": "Running",
                "nic": [{"ipaddress": "10.1.2.3"}]
            }
        }"#;

        let vm = parse_deploy_response(output).unwrap();
        assert_eq!(vm.name, "redis-01");
        assert!(vm.is_running());
        assert_eq!(vm.nic[0].ip_address.as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn test_parse_deploy_list() {
        let output = r#"{"virtualmachine": [{"id": "vm-9", "name": "redis-02", "nic": []}]}"#;

        let vm = parse_deploy_response(output).unwrap();
        assert_eq!(vm.id, "vm-9");
        assert!(vm.nic.is_empty());
        assert!(!vm.is_running());
    }

    #[test]
    fn test_parse_deploy_empty_list() {
        let output = r#"{"virtualmachine": []}"#;

        assert!(matches!(
            parse_deploy_response(output),
            Err(CloudStackError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_deploy_args_affinity_group() {
        let config = DeployVirtualMachineConfig {
            name: "redis-01".to_string(),
            service_offering_id: "so-1".to_string(),
            zone_id: "z-1".to_string(),
            template_id: "t-1".to_string(),
            network_id: "n-1".to_string(),
            project_id: "p-1".to_string(),
            affinity_group_id: Some("ag-1".to_string()),
        };

        let args = config.to_args();
        assert_eq!(&args[..2], ["deploy", "virtualmachine"]);
        assert!(args.contains(&"serviceofferingid=so-1".to_string()));
        assert!(args.contains(&"affinitygroupids=ag-1".to_string()));
    }
}
