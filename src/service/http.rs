//! HTTP gateway to the dashboard backend.
//!
//! One client for the opaque JSON services the core consumes: the server and
//! group directories, the per-host metrics endpoint, the per-host session
//! endpoint, and the config store. Responses use the backend's
//! `{success, ..., error}` envelope; a `success: false` body surfaces as
//! [`ServiceError::Backend`] with the backend's message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{MetricsSource, ServiceError, SessionSource};
use crate::data::{RawSessionRow, ResourceSample};

/// A server row as the directory service reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryServer {
    pub id: u64,
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Group names this server belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

/// A group row as the directory service reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryGroup {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Member server addresses.
    #[serde(default)]
    pub servers: Vec<String>,
}

/// Threshold and credential settings held by the config service.
///
/// Credentials pass through untouched; the core only consumes the
/// thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub cpu_threshold: Option<u32>,
    #[serde(default)]
    pub memory_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snmp_community: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Deserialize)]
struct ServersBody {
    #[serde(default)]
    servers: Vec<DirectoryServer>,
}

#[derive(Debug, Deserialize)]
struct GroupsBody {
    #[serde(default)]
    groups: Vec<DirectoryGroup>,
}

#[derive(Debug, Deserialize)]
struct ServerBody {
    server: Option<DirectoryServer>,
}

#[derive(Debug, Deserialize)]
struct GroupBody {
    group: Option<DirectoryGroup>,
}

#[derive(Debug, Deserialize)]
struct EmptyBody {}

/// HTTP client for the backend services.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: String,
}

impl HttpBackend {
    /// Create a new builder for configuring the backend client.
    pub fn builder() -> HttpBackendBuilder {
        HttpBackendBuilder::default()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn unwrap_envelope<T>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError>
    where
        T: serde::de::DeserializeOwned,
    {
        // The backend uses 4xx/5xx alongside the envelope; prefer the
        // envelope's message when one is present.
        let status = response.status();
        let text = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&text)
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        if !envelope.success {
            return Err(ServiceError::Backend(
                envelope
                    .error
                    .unwrap_or_else(|| format!("backend returned status {}", status)),
            ));
        }
        Ok(envelope.body)
    }

    /// List all servers known to the directory.
    pub async fn list_servers(&self) -> Result<Vec<DirectoryServer>, ServiceError> {
        let response = self.client.get(self.url("/api/servers")).send().await?;
        let body: ServersBody = Self::unwrap_envelope(response).await?;
        Ok(body.servers)
    }

    /// Create a server in the directory.
    pub async fn create_server(
        &self,
        address: &str,
        description: Option<&str>,
        group_ids: &[u64],
    ) -> Result<DirectoryServer, ServiceError> {
        let payload = serde_json::json!({
            "address": address,
            "description": description.unwrap_or(""),
            "groups": group_ids,
        });
        let response = self
            .client
            .post(self.url("/api/servers"))
            .json(&payload)
            .send()
            .await?;
        let body: ServerBody = Self::unwrap_envelope(response).await?;
        body.server
            .ok_or_else(|| ServiceError::Parse("missing server in response".to_string()))
    }

    /// Delete a server from the directory by id.
    pub async fn delete_server(&self, id: u64) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/servers/{}", id)))
            .send()
            .await?;
        let _: EmptyBody = Self::unwrap_envelope(response).await?;
        Ok(())
    }

    /// List all groups known to the directory.
    pub async fn list_groups(&self) -> Result<Vec<DirectoryGroup>, ServiceError> {
        let response = self.client.get(self.url("/api/server-groups")).send().await?;
        let body: GroupsBody = Self::unwrap_envelope(response).await?;
        Ok(body.groups)
    }

    /// Create a group in the directory.
    pub async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        member_addresses: &[String],
    ) -> Result<DirectoryGroup, ServiceError> {
        let payload = serde_json::json!({
            "name": name,
            "description": description.unwrap_or(""),
            "servers": member_addresses,
        });
        let response = self
            .client
            .post(self.url("/api/server-groups"))
            .json(&payload)
            .send()
            .await?;
        let body: GroupBody = Self::unwrap_envelope(response).await?;
        body.group
            .ok_or_else(|| ServiceError::Parse("missing group in response".to_string()))
    }

    /// Delete a group from the directory by id.
    pub async fn delete_group(&self, id: u64) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/server-groups/{}", id)))
            .send()
            .await?;
        let _: EmptyBody = Self::unwrap_envelope(response).await?;
        Ok(())
    }

    /// Read the config service's settings, used to seed poll thresholds.
    pub async fn get_config(&self) -> Result<ThresholdConfig, ServiceError> {
        let response = self.client.get(self.url("/api/config")).send().await?;
        let config = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Write settings back to the config service.
    pub async fn set_config(&self, config: &ThresholdConfig) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(self.url("/api/config"))
            .json(config)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ServiceError::Http(format!(
                "config save returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsSource for HttpBackend {
    async fn fetch(&self, host: &str) -> Result<ResourceSample, ServiceError> {
        let response = self
            .client
            .get(self.url("/api/resources"))
            .header("X-Monitor-Host", host)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Http(format!(
                "metrics fetch for {} returned status {}",
                host,
                response.status()
            )));
        }

        let mut sample: ResourceSample = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        // Some collectors omit the host on the wire; key the sample by the
        // host we asked for.
        if sample.host.is_empty() {
            sample.host = host.to_string();
        }
        Ok(sample)
    }
}

#[async_trait]
impl SessionSource for HttpBackend {
    async fn fetch(
        &self,
        host: &str,
        search: Option<&str>,
    ) -> Result<Vec<RawSessionRow>, ServiceError> {
        let mut request = self.client.get(self.url(&format!("/api/sessions/{}", host)));
        if let Some(term) = search {
            request = request.query(&[("search", term)]);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(ServiceError::Http(format!(
                "session fetch for {} returned status {}",
                host,
                response.status()
            )));
        }

        let rows = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(rows)
    }
}

/// Builder for [`HttpBackend`].
#[derive(Debug, Default)]
pub struct HttpBackendBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl HttpBackendBuilder {
    /// Set the backend base URL (e.g. `http://localhost:5000`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        self.endpoint = Some(endpoint);
        self
    }

    /// Set the per-request timeout. The core imposes no timeout of its own;
    /// this is the collaborator's, and it surfaces as an ordinary error.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the backend client. Fails only if the underlying HTTP client
    /// cannot be constructed (e.g. TLS backend initialization).
    pub fn build(self) -> Result<HttpBackend, ServiceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpBackend {
            client: builder.build()?,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_trims_trailing_slash() {
        let backend = HttpBackend::builder()
            .endpoint("http://api.local/")
            .build()
            .unwrap();
        assert_eq!(backend.url("/api/servers"), "http://api.local/api/servers");
    }

    #[test]
    fn builder_defaults_to_localhost() {
        let backend = HttpBackend::builder().build().unwrap();
        assert_eq!(backend.url("/api/config"), "http://localhost:5000/api/config");
    }

    #[test]
    fn builder_with_timeout_builds() {
        let backend = HttpBackend::builder()
            .endpoint("http://api.local")
            .timeout(Duration::from_secs(2))
            .build();
        assert!(backend.is_ok());
    }

    #[test]
    fn envelope_failure_carries_backend_message() {
        let json = r#"{"success": false, "error": "이미 존재하는 서버 주소입니다."}"#;
        let envelope: Envelope<EmptyBody> = serde_json::from_str(json).unwrap();
        assert!(!envelope.success);
        assert!(envelope.error.is_some());
    }

    #[test]
    fn directory_rows_deserialize() {
        let json = r#"{
            "success": true,
            "groups": [
                {"id": 1, "name": "edge", "description": "edge proxies",
                 "servers": ["10.0.0.1", "10.0.0.2"]}
            ]
        }"#;
        let envelope: Envelope<GroupsBody> = serde_json::from_str(json).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.body.groups.len(), 1);
        assert_eq!(envelope.body.groups[0].servers.len(), 2);
    }

    #[test]
    fn threshold_config_tolerates_missing_fields() {
        let config: ThresholdConfig = serde_json::from_str(r#"{"cpu_threshold": 85}"#).unwrap();
        assert_eq!(config.cpu_threshold, Some(85));
        assert_eq!(config.memory_threshold, None);
    }
}
