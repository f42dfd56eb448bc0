//! Typed HTTP client for the store API.
//!
//! Access is a two-step handshake: the manager service trades
//! `GET /api-token-please` for the API host plus a token, and every
//! subsequent request carries that token in a `Token` header. Both hops
//! accept self-signed certificates because the services live behind
//! in-cluster TLS.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::Store;
use crate::error::StoreError;
use crate::models::{
    ApprovalDecision, Cluster, LogLine, ResourceRecord, ResourceSpecRecord, TaskRecord,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Handshake payload returned by the manager service.
#[derive(Debug, Deserialize)]
struct ApiAccess {
    host: String,
    token: String,
}

/// Envelope every store endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    #[serde(default)]
    status_info: StatusInfo,
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusInfo {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct StoreClient {
    client: reqwest::Client,
    host: String,
    token: String,
}

impl StoreClient {
    /// Exchange the manager handshake for the API host and access token.
    pub async fn connect(manager_host: &str) -> Result<Self, StoreError> {
        let client = build_client()?;

        let url = format!("{}/api-token-please", manager_host.trim_end_matches('/'));
        let response = client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                context: "access handshake",
                message: text,
            });
        }
        let access: ApiAccess =
            serde_json::from_str(&text).map_err(|err| StoreError::Malformed {
                context: "access handshake",
                reason: err.to_string(),
            })?;

        info!(host = %access.host, "store access granted");
        Ok(Self {
            client,
            host: access.host.trim_end_matches('/').to_string(),
            token: access.token,
        })
    }

    #[cfg(test)]
    fn with_access(host: &str, token: &str) -> Self {
        Self {
            client: build_client().expect("client builder"),
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Perform one API request and decode the envelope.
    ///
    /// `Ok(None)` means 204 No Content. Non-success statuses become
    /// [`StoreError::Api`], carrying the envelope's message when one can be
    /// extracted; undecodable success bodies become [`StoreError::Malformed`].
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        context: &'static str,
    ) -> Result<Option<ApiResponse<T>>, StoreError> {
        let url = format!("{}{}", self.host, path);
        let mut builder = self
            .client
            .request(method, &url)
            .header("Token", &self.token);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
                .map(|envelope| envelope.status_info.message)
                .unwrap_or(text);
            return Err(StoreError::Api {
                status: status.as_u16(),
                context,
                message,
            });
        }

        let decoded = serde_json::from_str(&text).map_err(|err| StoreError::Malformed {
            context,
            reason: err.to_string(),
        })?;
        Ok(Some(decoded))
    }

    // ── Raw endpoint wrappers ────────────────────────────────────────────────

    async fn find_cluster(&self, name: &str) -> Result<Option<Cluster>, StoreError> {
        let path = format!("/api/v1/cluster-name/{name}");
        match self
            .request::<Cluster>(Method::GET, &path, None, "find cluster")
            .await
        {
            Ok(response) => Ok(first(response)),
            Err(StoreError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_cluster(&self, name: &str) -> Result<Cluster, StoreError> {
        let response = self
            .request::<Cluster>(
                Method::POST,
                "/api/v1/cluster",
                Some(json!({ "cluster_name": name })),
                "create cluster",
            )
            .await?;
        first(response).ok_or(StoreError::Malformed {
            context: "create cluster",
            reason: "response contained no cluster".to_string(),
        })
    }

    async fn find_resource(&self, uid: &str) -> Result<Option<ResourceRecord>, StoreError> {
        let path = format!("/api/v1/resource/{uid}");
        match self
            .request::<ResourceRecord>(Method::GET, &path, None, "find resource")
            .await
        {
            Ok(response) => Ok(first(response)),
            Err(StoreError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_resource(
        &self,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, StoreError> {
        let response = self
            .request::<ResourceRecord>(
                Method::POST,
                "/api/v1/resource",
                Some(json!({ "resource": desired })),
                "create resource",
            )
            .await?;
        first(response).ok_or(StoreError::Malformed {
            context: "create resource",
            reason: "response contained no resource".to_string(),
        })
    }

    async fn update_resource(
        &self,
        resource: &ResourceRecord,
    ) -> Result<ResourceRecord, StoreError> {
        let response = self
            .request::<ResourceRecord>(
                Method::PUT,
                "/api/v1/resource",
                Some(json!({ "resource": resource })),
                "update resource",
            )
            .await?;
        first(response).ok_or(StoreError::Malformed {
            context: "update resource",
            reason: "response contained no resource".to_string(),
        })
    }

    async fn create_resource_spec(&self, spec: &ResourceSpecRecord) -> Result<(), StoreError> {
        self.request::<serde_json::Value>(
            Method::POST,
            "/api/v1/resource-spec",
            Some(json!({ "resource_spec": spec })),
            "create resource spec",
        )
        .await?;
        Ok(())
    }

    async fn find_task(&self, uid: &str) -> Result<Option<TaskRecord>, StoreError> {
        let path = format!("/api/v1/task/{uid}");
        match self
            .request::<TaskRecord>(Method::GET, &path, None, "find task")
            .await
        {
            Ok(response) => Ok(first(response)),
            Err(StoreError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_task(&self, desired: &TaskRecord) -> Result<TaskRecord, StoreError> {
        let response = self
            .request::<TaskRecord>(
                Method::POST,
                "/api/v1/task",
                Some(json!({ "task": desired })),
                "create task",
            )
            .await?;
        first(response).ok_or(StoreError::Malformed {
            context: "create task",
            reason: "response contained no task".to_string(),
        })
    }
}

#[async_trait]
impl Store for StoreClient {
    async fn upsert_cluster(&self, name: &str) -> Result<Cluster, StoreError> {
        if let Some(cluster) = self.find_cluster(name).await? {
            return Ok(cluster);
        }
        let cluster = self.create_cluster(name).await?;
        info!(cluster = %cluster.name, id = cluster.id, "cluster registered");
        Ok(cluster)
    }

    async fn get_or_create_resource(
        &self,
        desired: &ResourceRecord,
        spec_snapshot: &str,
    ) -> Result<(ResourceRecord, bool), StoreError> {
        let Some(existing) = self.find_resource(&desired.uid).await? else {
            let created = self.create_resource(desired).await?;
            self.create_resource_spec(&ResourceSpecRecord {
                resource_uid: desired.uid.clone(),
                generation: desired.current_generation.clone(),
                spec: spec_snapshot.to_string(),
            })
            .await?;
            return Ok((created, false));
        };

        if existing.cluster_id != desired.cluster_id {
            return Err(StoreError::ClusterMismatch {
                uid: existing.uid,
                bound: existing.cluster_id,
                observed: desired.cluster_id,
            });
        }

        if existing.current_generation == desired.current_generation {
            return Ok((existing, false));
        }

        // Generation advanced: exactly one new spec snapshot, then the
        // resource record catches up.
        self.create_resource_spec(&ResourceSpecRecord {
            resource_uid: desired.uid.clone(),
            generation: desired.current_generation.clone(),
            spec: spec_snapshot.to_string(),
        })
        .await?;

        let updated = self
            .update_resource(&ResourceRecord {
                current_generation: desired.current_generation.clone(),
                ..existing
            })
            .await?;
        Ok((updated, true))
    }

    async fn get_or_create_task(&self, desired: &TaskRecord) -> Result<TaskRecord, StoreError> {
        if let Some(task) = self.find_task(&desired.uid).await? {
            return Ok(task);
        }
        let task = self.create_task(desired).await?;
        debug!(task = %task.uid, task_type = %task.task_type, "task registered");
        Ok(task)
    }

    async fn persisted_line_numbers(&self, task_uid: &str) -> Result<HashSet<u64>, StoreError> {
        let path = format!("/api/v1/task/{task_uid}/logs");
        let response = self
            .request::<LogLine>(Method::GET, &path, None, "list persisted lines")
            .await?;
        Ok(response
            .map(|envelope| envelope.data.iter().map(|line| line.line_no).collect())
            .unwrap_or_default())
    }

    async fn bulk_insert_lines(&self, lines: &[LogLine]) -> Result<(), StoreError> {
        if lines.is_empty() {
            return Ok(());
        }
        self.request::<serde_json::Value>(
            Method::POST,
            "/api/v1/logs",
            Some(json!({ "task_logs": lines })),
            "bulk insert lines",
        )
        .await?;
        Ok(())
    }

    async fn approval_decision(
        &self,
        task_uid: &str,
    ) -> Result<Option<ApprovalDecision>, StoreError> {
        let path = format!("/api/v1/task/{task_uid}/approval-status");
        match self
            .request::<ApprovalDecision>(Method::GET, &path, None, "approval status")
            .await
        {
            Ok(response) => Ok(first(response)),
            Err(StoreError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

fn first<T>(response: Option<ApiResponse<T>>) -> Option<T> {
    response.and_then(|envelope| envelope.data.into_iter().next())
}

// ── Tests ────────────────────────────────────────────────────────────────────
