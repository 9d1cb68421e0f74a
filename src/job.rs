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

//! Waiting for asynchronous remote operations
//!
//! Mutating calls often answer with a job ID instead of the final object. [`wait`] polls a
//! [`StatusSource`] at a fixed interval until the job is terminal or the timeout elapses.
//! Each observation goes through [`PollState::next`], so the decision logic stays testable
//! without any clock.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};

/// Status of a remote job, as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus<T> {
    Pending,
    Succeeded(T),
    /// Failure reason reported by the service
    Failed(String),
}

/// Query the status of a job
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Result of a successful job
    type Entity: Send;

    async fn fetch(&self, id: &str) -> Result<JobStatus<Self::Entity>>;

    /// Name of what is waited for, used in error messages
    fn subject(&self, id: &str) -> String {
        format!("job {id}")
    }
}

/// Behavior when a status fetch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchErrorPolicy {
    /// The first fetch error ends the wait
    #[default]
    Abort,
    /// Fetch errors are ignored, unless more than `max_consecutive` of them follow each other
    Tolerate { max_consecutive: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Time before the first fetch
    pub delay: Duration,
    /// Time between two fetches
    pub interval: Duration,
    pub timeout: Duration,
    pub error_policy: FetchErrorPolicy,
}

impl WaitOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            interval: Duration::from_secs(10),
            timeout,
            error_policy: FetchErrorPolicy::Abort,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn error_policy(mut self, error_policy: FetchErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }
}

#[derive(Debug)]
pub enum PollState<T> {
    Pending { consecutive_errors: u32 },
    Succeeded(T),
    Failed(ApiError),
}

impl<T> PollState<T> {
    pub fn start() -> Self {
        Self::Pending {
            consecutive_errors: 0,
        }
    }

    /// Apply one observation
    ///
    /// Terminal states absorb every observation.
    pub fn next(
        self,
        observed: Result<JobStatus<T>>,
        policy: FetchErrorPolicy,
        id: &str,
    ) -> Self {
        let consecutive_errors = match self {
            Self::Pending { consecutive_errors } => consecutive_errors,
            terminal => return terminal,
        };

        match observed {
            Ok(JobStatus::Pending) => Self::Pending {
                consecutive_errors: 0,
            },
            Ok(JobStatus::Succeeded(entity)) => Self::Succeeded(entity),
            Ok(JobStatus::Failed(reason)) => Self::Failed(ApiError::JobFailed {
                job_id: id.to_owned(),
                reason,
            }),
            Err(err) => match policy {
                FetchErrorPolicy::Tolerate { max_consecutive }
                    if consecutive_errors < max_consecutive =>
                {
                    Self::Pending {
                        consecutive_errors: consecutive_errors + 1,
                    }
                }
                _ => Self::Failed(err),
            },
        }
    }
}

/// Wait until the job is terminal
///
/// Returns the entity of a succeeded job, [`ApiError::JobFailed`] for a failed one, and
/// [`ApiError::Timeout`] if the job is still pending after `opts.timeout`.
pub async fn wait<S>(source: &S, id: &str, opts: &WaitOptions) -> Result<S::Entity>
where
    S: StatusSource + ?Sized,
{
    if id.is_empty() {
        return Err(ApiError::client(
            "cannot wait for a job: the job ID is empty",
        ));
    }

    let started = Instant::now();
    let poll = async {
        tokio::time::sleep(opts.delay).await;
        let mut state = PollState::start();
        loop {
            let observed = source.fetch(id).await;
            if let Err(err) = &observed {
                warn!(id, %err, "unable to fetch the job status");
            }
            state = match state.next(observed, opts.error_policy, id) {
                PollState::Succeeded(entity) => {
                    debug!(id, elapsed = ?started.elapsed(), "job succeeded");
                    return Ok(entity);
                }
                PollState::Failed(err) => return Err(err),
                pending => pending,
            };
            tokio::time::sleep(opts.interval).await;
        }
    };

    tokio::time::timeout(opts.timeout, poll)
        .await
        .map_err(|_| ApiError::Timeout {
            subject: source.subject(id),
            elapsed: started.elapsed(),
        })?
}
