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

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::client::{RequestOpts, ServiceClient};
use crate::error::{ApiError, Result};
use crate::job::{JobStatus, StatusSource};

use super::HEADER_ENVIRONMENT_ID;

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    spec: JobSpec,
}

#[derive(Debug, Default, Deserialize)]
struct JobSpec {
    #[serde(default)]
    status: String,
    #[serde(default)]
    tasks: Vec<JobTask>,
}

#[derive(Debug, Deserialize)]
struct JobTask {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    detail: Option<JsonValue>,
}

/// Jobs of the CAE service, scoped by environment
pub struct CaeJobs<'c> {
    client: &'c ServiceClient,
    environment_id: &'c str,
}

impl<'c> CaeJobs<'c> {
    pub fn new(client: &'c ServiceClient, environment_id: &'c str) -> Self {
        Self {
            client,
            environment_id,
        }
    }
}

/// Describe the failed tasks of a job
fn failure_reason(spec: &JobSpec) -> String {
    let failed = spec
        .tasks
        .iter()
        .filter(|task| task.status == "failed")
        .map(|task| match &task.detail {
            Some(JsonValue::String(detail)) if !detail.is_empty() => {
                format!("{}: {detail}", task.name)
            }
            _ => task.name.clone(),
        })
        .collect::<Vec<_>>();
    if failed.is_empty() {
        format!("job status is {}", spec.status)
    } else {
        format!("failed tasks: {}", failed.join(", "))
    }
}

#[async_trait]
impl StatusSource for CaeJobs<'_> {
    type Entity = ();

    async fn fetch(&self, id: &str) -> Result<JobStatus<()>> {
        let url = self
            .client
            .url("v1/{project_id}/cae/jobs/{job_id}", &[("job_id", id)])?;
        let opts = RequestOpts::new().header(HEADER_ENVIRONMENT_ID, self.environment_id);
        let job: Job = self.client.request_as(Method::GET, url, opts).await?;

        Ok(match job.spec.status.as_str() {
            "success" => JobStatus::Succeeded(()),
            "failed" => JobStatus::Failed(failure_reason(&job.spec)),
            _ => JobStatus::Pending,
        })
    }

    fn subject(&self, id: &str) -> String {
        format!("CAE job {id}")
    }
}

/// Job ID returned by a mutating call, if any
pub(crate) fn job_id(body: &JsonValue) -> Option<&str> {
    body.pointer("/status/job_id")
        .or_else(|| body.get("job_id"))
        .and_then(JsonValue::as_str)
        .filter(|id| !id.is_empty())
}

pub(crate) fn required_job_id(body: &JsonValue) -> Result<&str> {
    job_id(body).ok_or(ApiError::MissingField("job_id"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn job_ids() {
        assert_eq!(job_id(&json!({"status": {"job_id": "j-1"}})), Some("j-1"));
        assert_eq!(job_id(&json!({"job_id": "j-2"})), Some("j-2"));
        assert_eq!(job_id(&json!({"job_id": ""})), None);
        assert!(required_job_id(&json!({})).is_err());
    }

    #[test]
    fn failure_reasons() {
        let job: Job = serde_json::from_value(json!({
            "spec": {
                "status": "failed",
                "tasks": [
                    {"name": "build", "status": "success"},
                    {"name": "deploy", "status": "failed", "detail": "image pull error"},
                ],
            },
        }))
        .unwrap();
        assert_eq!(failure_reason(&job.spec), "failed tasks: deploy: image pull error");

        let job: Job = serde_json::from_value(json!({"spec": {"status": "failed"}})).unwrap();
        assert_eq!(failure_reason(&job.spec), "job status is failed");
    }
}
