//! Container metadata and credential fetchers.
//!
//! On container compute the host identity and AWS credentials are not passed
//! in; they are resolved from the container agent's local HTTP endpoint
//! advertised through `ECS_CONTAINER_METADATA_URI_V4`.

use serde::Deserialize;
use tracing::debug;

use crate::core::auth::AwsCredentials;
use crate::error::{Error, Result};

pub const ENV_METADATA_URI: &str = "ECS_CONTAINER_METADATA_URI_V4";
pub const ENV_CREDENTIALS_FULL_URI: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
pub const ENV_CREDENTIALS_RELATIVE_URI: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";

/// Fixed address of the container credential agent for relative URIs.
const CREDENTIAL_AGENT_BASE: &str = "http://169.254.170.2";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskMetadata {
    #[serde(default, rename = "TaskARN")]
    task_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    #[serde(default)]
    access_key_id: String,
    #[serde(default)]
    secret_access_key: String,
    #[serde(default)]
    token: String,
}

/// Client for the container agent's local HTTP endpoints.
pub struct ContainerMetadataClient {
    http: reqwest::Client,
    metadata_base: String,
    credentials_uri: String,
}

impl ContainerMetadataClient {
    /// Resolve both endpoints from the environment.
    pub fn from_env() -> Result<Self> {
        let metadata_base = std::env::var(ENV_METADATA_URI).map_err(|_| {
            Error::LocalConnectionFailed(format!("{ENV_METADATA_URI} is not set"))
        })?;
        let credentials_uri = match std::env::var(ENV_CREDENTIALS_FULL_URI) {
            Ok(uri) if !uri.is_empty() => uri,
            _ => {
                let relative =
                    std::env::var(ENV_CREDENTIALS_RELATIVE_URI).map_err(|_| {
                        Error::LocalConnectionFailed(format!(
                            "neither {ENV_CREDENTIALS_FULL_URI} nor {ENV_CREDENTIALS_RELATIVE_URI} is set"
                        ))
                    })?;
                format!("{CREDENTIAL_AGENT_BASE}{relative}")
            }
        };
        Ok(Self::new(metadata_base, credentials_uri))
    }

    pub fn new(metadata_base: impl Into<String>, credentials_uri: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            metadata_base: metadata_base.into(),
            credentials_uri: credentials_uri.into(),
        }
    }

    /// Task id for this container, parsed from the task ARN.
    pub async fn fetch_task_id(&self) -> Result<String> {
        let url = format!("{}/task", self.metadata_base.trim_end_matches('/'));
        debug!(url = %url, "Fetching task metadata");
        let metadata: TaskMetadata = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::LocalConnectionFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::LocalConnectionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::LocalConnectionFailed(e.to_string()))?;

        let task_id = metadata
            .task_arn
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if task_id.is_empty() {
            return Err(Error::LocalConnectionFailed(format!(
                "task metadata carried no usable TaskARN: {:?}",
                metadata.task_arn
            )));
        }
        Ok(task_id)
    }

    /// Credential triple from the container credential agent.
    pub async fn fetch_credentials(&self) -> Result<AwsCredentials> {
        debug!(url = %self.credentials_uri, "Fetching container credentials");
        let creds: ContainerCredentials = self
            .http
            .get(&self.credentials_uri)
            .send()
            .await
            .map_err(|e| Error::LocalConnectionFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::LocalConnectionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::LocalConnectionFailed(e.to_string()))?;

        if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
            return Err(Error::LocalConnectionFailed(
                "credential endpoint returned an incomplete triple".into(),
            ));
        }
        Ok(AwsCredentials::new(
            creds.access_key_id,
            creds.secret_access_key,
            creds.token,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_metadata_parses_arn() {
        let metadata: TaskMetadata = serde_json::from_str(
            r#"{"Cluster":"c1","TaskARN":"arn:aws:ecs:us-west-2:123:task/c1/tk42"}"#,
        )
        .unwrap();
        assert_eq!(metadata.task_arn.rsplit('/').next(), Some("tk42"));
    }

    #[test]
    fn credentials_parse_ecs_shape() {
        let creds: ContainerCredentials = serde_json::from_str(
            r#"{"AccessKeyId":"AKIA","SecretAccessKey":"s3cr3t","Token":"tok","Expiration":"2023-11-14T22:13:20Z"}"#,
        )
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIA");
        assert_eq!(creds.token, "tok");
    }
}
