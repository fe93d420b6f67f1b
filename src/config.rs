//! Server configuration
//!
//! Loaded from YAML; every field has a default so a partial file is enough:
//!
//! ```yaml
//! address: "0.0.0.0"
//! port: 5683
//! base_uri: "coap://example.org"
//! accepted_non_rdf: [0, 42]
//! bootstrap:
//!   - name: alice
//!     kind: direct
//!     member_relation: "http://purl.org/dc/terms/hasPart"
//!     member_type: "http://xmlns.com/foaf/0.1/Person"
//! ```

use crate::ldp::{LdpError, MembershipConfig, Resource, ResourceTree};
use crate::manager::ResourceManager;
use crate::rdf::NamedNode;
use crate::vocab::media;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Bootstrap failed: {0}")]
    Bootstrap(#[from] LdpError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub address: String,
    /// Port
    pub port: u16,
    /// Base URI of the root container; derived from address and port when unset
    pub base_uri: Option<String>,
    /// Content formats accepted for non-RDF sources
    pub accepted_non_rdf: Vec<u16>,
    /// Largest datagram accepted, in bytes
    pub max_message_size: usize,
    /// Containers created under the root at start
    pub bootstrap: Vec<BootstrapContainer>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5683,
            base_uri: None,
            accepted_non_rdf: vec![
                media::TEXT_PLAIN,
                media::OCTET_STREAM,
                media::APPLICATION_JSON,
                media::CBOR,
            ],
            max_message_size: 1152,
            bootstrap: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config = Self::from_yaml(&std::fs::read_to_string(path)?)?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_message_size < 64 {
            return Err(ConfigError::Invalid(format!(
                "max_message_size {} is below 64 bytes",
                self.max_message_size
            )));
        }
        if let Some(base) = &self.base_uri {
            NamedNode::new(base)
                .map_err(|e| ConfigError::Invalid(format!("base_uri: {}", e)))?;
        }
        for container in &self.bootstrap {
            if container.name.is_empty() || container.name.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "bootstrap container name {:?} is not a single path segment",
                    container.name
                )));
            }
        }
        Ok(())
    }

    /// `host:port` to bind, with IPv6 hosts bracketed
    pub fn bind_address(&self) -> String {
        format!("{}:{}", host(&self.address), self.port)
    }

    pub fn effective_base_uri(&self) -> String {
        match &self.base_uri {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("coap://{}", self.bind_address()),
        }
    }

    /// Create the configured containers under the root
    pub async fn bootstrap(&self, tree: &ResourceTree) -> ConfigResult<()> {
        for container in &self.bootstrap {
            container.create(tree.manager(), tree.root()).await?;
        }
        Ok(())
    }
}

fn host(address: &str) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{}]", address)
    } else {
        address.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Basic,
    Direct,
    Indirect,
}

/// A container the server creates at start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapContainer {
    pub name: String,
    pub kind: ContainerKind,
    /// Local child name or absolute IRI
    #[serde(default)]
    pub membership_resource: Option<String>,
    /// Relation IRIs, absolute or `prefix:local`
    #[serde(default)]
    pub member_relation: Option<String>,
    #[serde(default)]
    pub is_member_of_relation: Option<String>,
    #[serde(default)]
    pub inserted_content_relation: Option<String>,
    /// `rdf:type` of the local membership resource
    #[serde(default)]
    pub member_type: Option<String>,
}

impl BootstrapContainer {
    pub fn membership(&self, mng: &ResourceManager) -> ConfigResult<MembershipConfig> {
        let relation = |iri: &Option<String>| -> ConfigResult<Option<NamedNode>> {
            iri.as_deref()
                .map(|iri| {
                    let expanded = mng.namespaces().resolve(iri).map_err(|e| {
                        ConfigError::Invalid(format!("{}: {}", self.name, e))
                    })?;
                    mng.create_iri(&expanded)
                        .map_err(|e| ConfigError::Invalid(format!("{}: {}", self.name, e)))
                })
                .transpose()
        };
        Ok(MembershipConfig {
            membership_resource: self.membership_resource.clone(),
            member_relation: relation(&self.member_relation)?,
            is_member_of_relation: relation(&self.is_member_of_relation)?,
            inserted_content_relation: relation(&self.inserted_content_relation)?,
            member_type: relation(&self.member_type)?,
        })
    }

    pub async fn create(
        &self,
        mng: &ResourceManager,
        parent: &Arc<Resource>,
    ) -> ConfigResult<Arc<Resource>> {
        let node = match self.kind {
            ContainerKind::Basic => parent.create_basic_container(mng, &self.name).await?,
            ContainerKind::Direct => {
                let config = self.membership(mng)?;
                parent.create_direct_container(mng, &self.name, config).await?
            }
            ContainerKind::Indirect => {
                let config = self.membership(mng)?;
                parent.create_indirect_container(mng, &self.name, config).await?
            }
        };
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 5683);
        assert_eq!(config.accepted_non_rdf, vec![0, 42, 50, 60]);
        assert_eq!(config.effective_base_uri(), "coap://127.0.0.1:5683");
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let config = ServerConfig {
            address: "::1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.bind_address(), "[::1]:5683");
        assert_eq!(config.effective_base_uri(), "coap://[::1]:5683");
    }

    #[test]
    fn test_load_partial_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port: 5684
base_uri: "coap://example.org/"
bootstrap:
  - name: alice
    kind: direct
    member_relation: "dcterms:hasPart"
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 5684);
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.effective_base_uri(), "coap://example.org");
        assert_eq!(config.bootstrap.len(), 1);
        assert_eq!(config.bootstrap[0].kind, ContainerKind::Direct);
        assert_eq!(config.bootstrap[0].membership_resource, None);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            ServerConfig::from_yaml("port: not-a-number"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            ServerConfig::from_yaml("max_message_size: 10"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_yaml("bootstrap: [{name: a/b, kind: basic}]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_yaml("bootstrap: [{name: a, kind: fancy}]"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(ServerConfig::from_file("/nonexistent/ldp-coap.yaml").is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_creates_containers() {
        let config = ServerConfig::from_yaml(
            r#"
bootstrap:
  - name: things
    kind: basic
  - name: alice
    kind: direct
    member_relation: "http://purl.org/dc/terms/hasPart"
    member_type: "foaf:Person"
  - name: bob
    kind: indirect
    member_relation: "dcterms:hasPart"
    inserted_content_relation: "ldp:MemberSubject"
"#,
        )
        .unwrap();

        let mng = Arc::new(ResourceManager::new(config.effective_base_uri()));
        let tree = ResourceTree::new(mng, config.accepted_non_rdf.clone())
            .await
            .unwrap();
        config.bootstrap(&tree).await.unwrap();

        assert!(tree.lookup("/things").unwrap().is_container());
        assert!(tree.lookup("/alice/resource").is_some());
        let typed = crate::rdf::Triple::iri(
            "coap://127.0.0.1:5683/alice/resource",
            crate::vocab::rdf::TYPE,
            "http://xmlns.com/foaf/0.1/Person",
        )
        .unwrap();
        assert!(tree.manager().read().await.unwrap().contains(&typed));
        let bob = tree.lookup("/bob").unwrap();
        let membership = bob.as_container().unwrap().variant().membership().unwrap();
        assert_eq!(
            membership.inserted_content_relation.as_ref().map(|n| n.as_str()),
            Some("http://www.w3.org/ns/ldp#MemberSubject")
        );
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_incomplete_direct_container() {
        let config = ServerConfig::from_yaml("bootstrap: [{name: d, kind: direct}]").unwrap();
        let mng = Arc::new(ResourceManager::new("coap://h"));
        let tree = ResourceTree::new(mng, Vec::new()).await.unwrap();
        assert!(matches!(
            config.bootstrap(&tree).await,
            Err(ConfigError::Bootstrap(LdpError::BadRequest(_)))
        ));
        assert!(tree.lookup("/d").is_none());
    }
}
