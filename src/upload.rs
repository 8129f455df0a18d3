//! Algolia implementation of the core [`IndexUploader`] contract.
//!
//! [`AlgoliaClient`] pushes normalized records with the batch endpoint
//! (`POST /1/indexes/{index}/batch`, one `updateObject` per record, keyed by
//! `objectID`) and then waits for every returned task
//! (`GET /1/indexes/{index}/task/{taskID}`) to reach `published`.
//!
//! - Records are sent in chunks of [`IndexConfig::batch_size`].
//! - `upload` returns only after all tasks are published, or an error.
//! - No request is retried; a task that is still pending after `max_polls` polls fails the upload.

use async_trait::async_trait;
use issue_sync_core::contract::{IndexUploader, UploadError};
use issue_sync_core::record::NormalizedRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::load_config::IndexConfig;

const APP_ID_HEADER: &str = "X-Algolia-Application-Id";
const API_KEY_HEADER: &str = "X-Algolia-API-Key";

#[derive(Serialize)]
struct BatchOperation<'a> {
    action: &'static str,
    body: &'a NormalizedRecord,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<BatchOperation<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(rename = "taskID")]
    task_id: i64,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
}

pub struct AlgoliaClient {
    client: Client,
    host: String,
    index_name: String,
    app_id: String,
    api_key: String,
    batch_size: usize,
    poll_interval: Duration,
    max_polls: u32,
}

impl AlgoliaClient {
    pub fn new(config: &IndexConfig) -> Result<Self, UploadError> {
        let client = Client::builder().build()?;
        tracing::info!(
            host = %config.host,
            index_name = %config.index_name,
            api_key_set = !config.api_key.is_empty(),
            "Initialized AlgoliaClient"
        );
        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
            app_id: config.app_id.clone(),
            api_key: config.api_key.clone(),
            batch_size: config.batch_size.max(1),
            poll_interval: config.poll_interval,
            max_polls: config.max_polls,
        })
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/1/indexes/{}/{}", self.host, self.index_name, suffix)
    }

    async fn send_batch(&self, chunk: &[NormalizedRecord]) -> Result<i64, UploadError> {
        let body = BatchRequest {
            requests: chunk
                .iter()
                .map(|record| BatchOperation {
                    action: "updateObject",
                    body: record,
                })
                .collect(),
        };
        let url = self.index_url("batch");
        let response = self
            .client
            .post(&url)
            .header(APP_ID_HEADER, &self.app_id)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, url = %url, "Index batch rejected. Response body: {text}");
            return Err(format!("index batch failed with {status}: {text}").into());
        }
        let batch: BatchResponse = response.json().await?;
        tracing::info!(task_id = batch.task_id, count = chunk.len(), "Batch accepted");
        Ok(batch.task_id)
    }

    /// Poll a task until the index reports it as published.
    pub async fn wait_for_task(&self, task_id: i64) -> Result<(), UploadError> {
        let url = self.index_url(&format!("task/{task_id}"));
        for attempt in 1..=self.max_polls {
            let response = self
                .client
                .get(&url)
                .header(APP_ID_HEADER, &self.app_id)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await?
                .error_for_status()?;
            let task: TaskResponse = response.json().await?;
            if task.status == "published" {
                tracing::debug!(task_id, attempt, "Task published");
                return Ok(());
            }
            tracing::debug!(task_id, attempt, status = %task.status, "Task not yet published");
            tokio::time::sleep(self.poll_interval).await;
        }
        tracing::error!(task_id, max_polls = self.max_polls, "Task did not publish in time");
        Err(format!(
            "task {task_id} not published after {} polls",
            self.max_polls
        )
        .into())
    }
}

#[async_trait]
impl IndexUploader for AlgoliaClient {
    async fn upload(&self, batch: &[NormalizedRecord]) -> Result<(), UploadError> {
        tracing::info!(
            index_name = %self.index_name,
            count = batch.len(),
            "Uploading records to index"
        );
        let mut task_ids = Vec::new();
        for chunk in batch.chunks(self.batch_size) {
            task_ids.push(self.send_batch(chunk).await?);
        }
        for task_id in task_ids {
            self.wait_for_task(task_id).await?;
        }
        tracing::info!(count = batch.len(), "Data successfully imported into index");
        Ok(())
    }
}
