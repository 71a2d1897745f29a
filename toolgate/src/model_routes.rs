//! Routing table mapping model container keys to backends.
//!
//! Callers never address backends directly: requests carry a container key
//! (e.g. "traditional", "reasoning_alt") which resolves here to a concrete
//! model name, service base URL, and protocol. The table is read from the
//! environment once at startup and is immutable afterwards.

use std::collections::BTreeMap;
use std::env;

use crate::routes::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    OpenAi,
    Mcp,
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Model version string, empty when the env var is unset.
    pub model_name: String,
    /// Service root, without the `/v1` suffix.
    pub service_url: String,
    pub protocol: Protocol,
}

/// A resolved route, ready to hand to a backend client.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub model_name: String,
    /// OpenAI-compatible API base, i.e. `{service_url}/v1`.
    pub base_url: String,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: BTreeMap<String, RouteEntry>,
}

impl RoutingTable {
    /// Build the table from environment variables.
    ///
    /// Model versions come from `TRADITIONAL_MODEL`, `TRADITIONAL_MODEL_ALT`,
    /// `REASONING_MODEL`, `REASONING_MODEL_ALT`, `REMOTE_OPENAI_MODEL`,
    /// `CLAUDE_SONNET_MODEL`, `CLAUDE_OPUS_MODEL` and `LOCAL_GPU`. The
    /// `local_gpu` container is registered only when `ENABLE_LOCAL_GPU_MODEL`
    /// is truthy (default on).
    pub fn from_env() -> Self {
        let mut table = Self::default();

        table.insert(
            "traditional",
            env_or_empty("TRADITIONAL_MODEL"),
            "http://traditional_model:11434",
            Protocol::OpenAi,
        );
        table.insert(
            "traditional_alt",
            env_or_empty("TRADITIONAL_MODEL_ALT"),
            "http://traditional_model_alt:11434",
            Protocol::OpenAi,
        );
        table.insert(
            "reasoning",
            env_or_empty("REASONING_MODEL"),
            "http://reasoning_model:11434",
            Protocol::OpenAi,
        );
        table.insert(
            "reasoning_alt",
            env_or_empty("REASONING_MODEL_ALT"),
            "http://reasoning_model_alt:11434",
            Protocol::OpenAi,
        );
        table.insert(
            "remote_openai",
            env_or_empty("REMOTE_OPENAI_MODEL"),
            "https://api.groq.com",
            Protocol::OpenAi,
        );
        table.insert(
            "claude_sonnet",
            env_or_empty("CLAUDE_SONNET_MODEL"),
            "https://api.anthropic.com",
            Protocol::Mcp,
        );
        table.insert(
            "claude_opus",
            env_or_empty("CLAUDE_OPUS_MODEL"),
            "https://api.anthropic.com",
            Protocol::Mcp,
        );

        let enable_local_gpu = env::var("ENABLE_LOCAL_GPU_MODEL")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);
        if enable_local_gpu {
            table.insert(
                "local_gpu",
                env_or_empty("LOCAL_GPU"),
                "http://host.docker.internal:11434",
                Protocol::OpenAi,
            );
        }

        println!(
            "[RoutingTable] {} containers registered: {:?}",
            table.entries.len(),
            table.container_keys()
        );
        table
    }

    fn insert(&mut self, container: &str, model_name: String, service_url: &str, protocol: Protocol) {
        self.entries.insert(
            container.to_string(),
            RouteEntry {
                model_name,
                service_url: service_url.to_string(),
                protocol,
            },
        );
    }

    pub fn container_keys(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    /// Resolve a container key. Unknown keys and keys whose model or service
    /// is not configured are rejected.
    pub fn resolve(&self, container: &str) -> Result<ResolvedRoute, GatewayError> {
        let entry = self.entries.get(container).ok_or_else(|| {
            GatewayError::UnknownModel(format!(
                "Unknown model: {}. Available models: {:?}",
                container,
                self.container_keys()
            ))
        })?;

        if entry.model_name.is_empty() {
            return Err(GatewayError::Unconfigured(format!(
                "Model {} is not configured. Check environment variables.",
                container
            )));
        }
        if entry.service_url.is_empty() {
            return Err(GatewayError::Unconfigured(format!(
                "No service configured for model: {}",
                container
            )));
        }

        Ok(ResolvedRoute {
            model_name: entry.model_name.clone(),
            base_url: format!("{}/v1", entry.service_url),
            protocol: entry.protocol.clone(),
        })
    }
}

fn env_or_empty(name: &str) -> String {
    env::var(name).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(container: &str, model: &str, url: &str, protocol: Protocol) -> RoutingTable {
        let mut table = RoutingTable::default();
        table.insert(container, model.to_string(), url, protocol);
        table
    }

    #[test]
    fn resolve_appends_v1_to_the_service_url() {
        let table = table_with("traditional", "llama3", "http://host:11434", Protocol::OpenAi);
        let route = table.resolve("traditional").unwrap();
        assert_eq!(route.base_url, "http://host:11434/v1");
        assert_eq!(route.model_name, "llama3");
    }

    #[test]
    fn unknown_container_is_rejected() {
        let table = table_with("traditional", "llama3", "http://host:11434", Protocol::OpenAi);
        match table.resolve("nope") {
            Err(GatewayError::UnknownModel(msg)) => assert!(msg.contains("nope")),
            other => panic!("expected UnknownModel, got {:?}", other),
        }
    }

    #[test]
    fn unconfigured_model_is_rejected() {
        let table = table_with("reasoning", "", "http://host:11434", Protocol::OpenAi);
        assert!(matches!(
            table.resolve("reasoning"),
            Err(GatewayError::Unconfigured(_))
        ));
    }
}
