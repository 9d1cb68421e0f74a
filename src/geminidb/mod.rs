// This file is part of the terraform-provider-huaweicloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! GeminiDB (GaussDB NoSQL)

mod instance;

pub use instance::{BackupStrategy, Datastore, Flavor, InstanceResource, InstanceState};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::{RequestOpts, ServiceClient};
use crate::error::{ApiError, RemoteError, Result};
use crate::job::{self, FetchErrorPolicy, JobStatus, StatusSource, WaitOptions};
use crate::tags::{self, Tag, Tags};

pub const SERVICE: &str = "geminidb";

/// Returned while another operation is running on the instance
pub const BUSY_CODE: &str = "DBS.200019";

/// Instance statuses that will not recover
const FAILED_STATUSES: &[&str] = &["abnormal", "createfail", "enlargefail"];

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    status: String,
    #[serde(default)]
    fail_reason: Option<String>,
}

/// Jobs of the GeminiDB service
pub struct GeminiDbJobs<'c> {
    client: &'c ServiceClient,
}

impl<'c> GeminiDbJobs<'c> {
    pub fn new(client: &'c ServiceClient) -> Self {
        Self { client }
    }

    pub fn wait_options(timeout: Duration) -> WaitOptions {
        WaitOptions::new(timeout)
            .delay(Duration::from_secs(5))
            .interval(Duration::from_secs(10))
            .error_policy(FetchErrorPolicy::Tolerate { max_consecutive: 3 })
    }
}

#[async_trait]
impl StatusSource for GeminiDbJobs<'_> {
    type Entity = ();

    async fn fetch(&self, id: &str) -> Result<JobStatus<()>> {
        let mut url = self.client.url("v3/{project_id}/jobs", &[])?;
        url.query_pairs_mut().append_pair("id", id);
        let list: JobList = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;

        let job = list
            .jobs
            .into_iter()
            .next()
            .filter(|job| !job.status.is_empty())
            .ok_or_else(|| ApiError::client(format!("job {id} is not found")))?;
        Ok(match job.status.as_str() {
            "Completed" => JobStatus::Succeeded(()),
            "Failed" => JobStatus::Failed(
                job.fail_reason
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| "job status is Failed".to_owned()),
            ),
            _ => JobStatus::Pending,
        })
    }

    fn subject(&self, id: &str) -> String {
        format!("GeminiDB job {id}")
    }
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    instances: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<Tag>,
}

/// API of a single instance
#[derive(Debug, Clone, Copy)]
pub(crate) struct Instance<'c> {
    pub client: &'c ServiceClient,
    pub id: &'c str,
}

impl<'c> Instance<'c> {
    /// Instance as listed by the API, [`ApiError::NotFound`] if the list is empty
    pub async fn get(&self) -> Result<JsonValue> {
        let mut url = self.client.url("v3/{project_id}/instances", &[])?;
        url.query_pairs_mut().append_pair("id", self.id);
        let list: InstanceList = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;
        list.instances.into_iter().next().ok_or_else(|| {
            ApiError::NotFound(RemoteError {
                status: StatusCode::NOT_FOUND,
                code: None,
                message: format!("instance {} does not exist", self.id),
            })
        })
    }

    pub async fn tags(&self) -> Result<Tags> {
        let url = self.client.url(
            "v3/{project_id}/instances/{instance_id}/tags",
            &[("instance_id", self.id)],
        )?;
        let list: TagList = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;
        Ok(tags::flatten(&list.tags))
    }

    async fn tag_action(&self, action: &str, tags: Vec<Tag>) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let url = self.client.url(
            "v3/{project_id}/instances/{instance_id}/tags/action",
            &[("instance_id", self.id)],
        )?;
        let body = json!({ "action": action, "tags": tags });
        self.client.post(url, RequestOpts::new().body(body)).await?;
        Ok(())
    }

    pub async fn update_tags(&self, old: &Tags, new: &Tags) -> Result<()> {
        let (remove, add) = tags::diff(old, new);
        self.tag_action("delete", remove).await?;
        self.tag_action("create", add).await
    }

    /// Send a request, waiting for the instance to be available again while it is busy
    ///
    /// The retries, waits included, share `timeout`.
    pub async fn retry_when_busy<F, Fut, T>(&self, timeout: Duration, mut send: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let retry = async {
            loop {
                match send().await {
                    Err(err) if err.error_code() == Some(BUSY_CODE) => {
                        info!(id = self.id, "instance is busy, waiting for it to be available");
                        self.wait_ready(timeout.saturating_sub(started.elapsed()))
                            .await?;
                    }
                    result => return result,
                }
            }
        };

        tokio::time::timeout(timeout, retry)
            .await
            .map_err(|_| ApiError::Timeout {
                subject: format!("GeminiDB instance {} to accept the request", self.id),
                elapsed: started.elapsed(),
            })?
    }

    /// Wait until the instance status is `normal`
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let opts = WaitOptions::new(timeout)
            .delay(Duration::from_secs(10))
            .interval(Duration::from_secs(10));
        job::wait(self, self.id, &opts).await
    }

    /// Send a modification, then wait for the job it started, if any
    pub async fn modify(
        &self,
        method: Method,
        template: &str,
        params: &[(&str, &str)],
        body: JsonValue,
        timeout: Duration,
    ) -> Result<()> {
        let url = self.client.url(template, params)?;
        let response = self
            .retry_when_busy(timeout, || {
                self.client.request(
                    method.clone(),
                    url.clone(),
                    RequestOpts::new().body(body.clone()),
                )
            })
            .await?;

        if let Some(job_id) = response.get("job_id").and_then(JsonValue::as_str) {
            debug!(id = self.id, job_id, "waiting for the modification");
            let jobs = GeminiDbJobs::new(self.client);
            job::wait(&jobs, job_id, &GeminiDbJobs::wait_options(timeout)).await?;
            self.wait_ready(timeout).await?;
        }
        Ok(())
    }
}

/// Status of the instance itself
#[async_trait]
impl StatusSource for Instance<'_> {
    type Entity = ();

    async fn fetch(&self, _id: &str) -> Result<JobStatus<()>> {
        let instance = self.get().await?;
        let status = instance
            .get("status")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        Ok(match status {
            "normal" => JobStatus::Succeeded(()),
            status if FAILED_STATUSES.contains(&status) => {
                JobStatus::Failed(format!("the instance status is {status}"))
            }
            _ => JobStatus::Pending,
        })
    }

    fn subject(&self, id: &str) -> String {
        format!("GeminiDB instance {id} to be available")
    }
}
