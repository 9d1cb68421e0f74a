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

//! Storage Disaster Recovery Service

mod protection_group;

pub use protection_group::{ProtectionGroupResource, ProtectionGroupState};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;
use crate::job::{FetchErrorPolicy, JobStatus, StatusSource, WaitOptions};

pub const SERVICE: &str = "sdrs";

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    status: String,
    #[serde(default)]
    entities: JobEntities,
    #[serde(default)]
    fail_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JobEntities {
    #[serde(default)]
    server_group_id: Option<String>,
}

/// Jobs of the SDRS service, succeeding with the ID of the protection group
pub struct SdrsJobs<'c> {
    client: &'c ServiceClient,
}

impl<'c> SdrsJobs<'c> {
    pub fn new(client: &'c ServiceClient) -> Self {
        Self { client }
    }

    /// The job endpoint flaps while a job is starting
    pub fn wait_options(timeout: Duration) -> WaitOptions {
        WaitOptions::new(timeout)
            .delay(Duration::from_secs(5))
            .interval(Duration::from_secs(10))
            .error_policy(FetchErrorPolicy::Tolerate { max_consecutive: 3 })
    }
}

fn job_status(job: Job) -> JobStatus<String> {
    match job.status.as_str() {
        "SUCCESS" => JobStatus::Succeeded(job.entities.server_group_id.unwrap_or_default()),
        "FAIL" => JobStatus::Failed(
            job.fail_reason
                .filter(|reason| !reason.is_empty())
                .unwrap_or_else(|| "job status is FAIL".to_owned()),
        ),
        _ => JobStatus::Pending,
    }
}

#[async_trait]
impl StatusSource for SdrsJobs<'_> {
    type Entity = String;

    async fn fetch(&self, id: &str) -> Result<JobStatus<String>> {
        let url = self
            .client
            .url("v1/{project_id}/jobs/{job_id}", &[("job_id", id)])?;
        let job: Job = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;
        Ok(job_status(job))
    }

    fn subject(&self, id: &str) -> String {
        format!("SDRS job {id}")
    }
}
