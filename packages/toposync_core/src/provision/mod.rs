//! Provisioning agent collaborator
//!
//! First-time host setup is delegated to an external agent. The engine
//! only decides what the agent is handed: connection parameters, the node
//! identity, its environment and run list, and the bootstrap attribute
//! JSON (the node's `normal` bucket plus its tags).

use std::process::Command;

use serde_json::Value;
use thiserror::Error;

use crate::attr::AttrMap;
use crate::topology::EffectiveNode;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("failed to invoke provisioning agent: {0}")]
    Io(String),

    #[error("provisioning agent exited with {0}")]
    AgentFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Everything the provisioning agent needs for one host.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionRequest {
    pub ssh_host: String,
    pub ssh_port: Option<u16>,
    pub node_name: String,
    pub environment: Option<String>,
    pub run_list: Vec<String>,
    pub attributes: AttrMap,
}

impl ProvisionRequest {
    /// Build the request for an effective node. None when the node has no
    /// `ssh_host` and is therefore not provisionable.
    pub fn from_node(node: &EffectiveNode) -> Option<Self> {
        let ssh_host = node.ssh_host.clone()?;
        Some(Self {
            ssh_host,
            ssh_port: node.ssh_port,
            node_name: node.name.clone(),
            environment: node.chef_environment.clone(),
            run_list: node.run_list.clone(),
            attributes: bootstrap_attributes(node),
        })
    }

    /// Serialize into the agent's argument list: target host first, then
    /// node-specific options only where values are present. The run list
    /// is comma-joined; attributes travel as one JSON argument.
    pub fn agent_args(&self) -> Result<Vec<String>, ProvisionError> {
        let mut args = vec![self.ssh_host.clone()];
        args.push("-N".to_string());
        args.push(self.node_name.clone());
        if let Some(environment) = &self.environment {
            args.push("-E".to_string());
            args.push(environment.clone());
        }
        if let Some(port) = self.ssh_port {
            args.push("--ssh-port".to_string());
            args.push(port.to_string());
        }
        if !self.run_list.is_empty() {
            args.push("--run-list".to_string());
            args.push(self.run_list.join(","));
        }
        if !self.attributes.is_empty() {
            let json = serde_json::to_string(&self.attributes)
                .map_err(|e| ProvisionError::Serialization(e.to_string()))?;
            args.push("--json-attributes".to_string());
            args.push(json);
        }
        Ok(args)
    }
}

/// For bootstrap, the attribute JSON has to carry the tags as well.
fn bootstrap_attributes(node: &EffectiveNode) -> AttrMap {
    let mut attrs = node.buckets.normal.clone().unwrap_or_default();
    if !node.tags.is_empty() {
        let tags = node.tags.iter().cloned().map(Value::String).collect();
        attrs.insert("tags".to_string(), Value::Array(tags));
    }
    attrs
}

/// Performs first-time setup of one host.
pub trait Provisioner {
    fn provision(&self, req: &ProvisionRequest) -> Result<(), ProvisionError>;
}

/// Invokes an external provisioning agent command.
pub struct CommandProvisioner {
    program: String,
}

impl CommandProvisioner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Provisioner for CommandProvisioner {
    fn provision(&self, req: &ProvisionRequest) -> Result<(), ProvisionError> {
        let status = Command::new(&self.program)
            .args(req.agent_args()?)
            .status()
            .map_err(|e| ProvisionError::Io(e.to_string()))?;
        if !status.success() {
            return Err(ProvisionError::AgentFailed(status.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::NodeSpec;
    use serde_json::json;

    fn make_test_node() -> EffectiveNode {
        serde_json::from_value::<NodeSpec>(json!({
            "name": "node1",
            "ssh_host": "10.0.1.2",
            "ssh_port": 2222,
            "chef_environment": "test",
            "run_list": ["recipe[apt]", "role[web]"],
            "tags": ["topo_tag"],
            "normal": {"topo": {"name": "topo1"}}
        }))
        .unwrap()
    }

    #[test]
    fn test_from_node_requires_ssh_host() {
        let node: NodeSpec = serde_json::from_value(json!({"name": "n"})).unwrap();
        assert!(ProvisionRequest::from_node(&node).is_none());
        assert!(ProvisionRequest::from_node(&make_test_node()).is_some());
    }

    #[test]
    fn test_agent_args_include_node_specific_data() {
        let req = ProvisionRequest::from_node(&make_test_node()).unwrap();
        let args = req.agent_args().unwrap();

        assert_eq!(args[0], "10.0.1.2");
        let joined = args.join(" ");
        assert!(joined.contains("-N node1"));
        assert!(joined.contains("-E test"));
        assert!(joined.contains("--ssh-port 2222"));
        assert!(joined.contains("--run-list recipe[apt],role[web]"));

        // bootstrap attributes include the tags
        let json_arg = &args[args
            .iter()
            .position(|a| a == "--json-attributes")
            .unwrap()
            + 1];
        let attrs: Value = serde_json::from_str(json_arg).unwrap();
        assert_eq!(attrs["topo"]["name"], json!("topo1"));
        assert_eq!(attrs["tags"], json!(["topo_tag"]));
    }

    #[test]
    fn test_agent_args_omit_absent_options() {
        let node: NodeSpec =
            serde_json::from_value(json!({"name": "n", "ssh_host": "10.0.0.1"})).unwrap();
        let req = ProvisionRequest::from_node(&node).unwrap();
        let args = req.agent_args().unwrap();

        assert_eq!(args, vec!["10.0.0.1", "-N", "n"]);
    }

    #[test]
    fn test_command_provisioner_reports_exit_status() {
        let node: NodeSpec =
            serde_json::from_value(json!({"name": "n", "ssh_host": "h"})).unwrap();
        let req = ProvisionRequest::from_node(&node).unwrap();

        assert!(CommandProvisioner::new("true").provision(&req).is_ok());
        assert!(matches!(
            CommandProvisioner::new("false").provision(&req),
            Err(ProvisionError::AgentFailed(_))
        ));
        assert!(matches!(
            CommandProvisioner::new("/nonexistent/agent").provision(&req),
            Err(ProvisionError::Io(_))
        ));
    }
}
