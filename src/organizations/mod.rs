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

//! Organizations

mod organization;

pub use organization::{OrganizationResource, OrganizationState};

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::client::{RequestOpts, ServiceClient};
use crate::error::{ApiError, Result};
use crate::job::{JobStatus, StatusSource};
use crate::tags::{self, Tag, Tags};

pub const SERVICE: &str = "organizations";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteOrganization {
    pub id: String,
    #[serde(default)]
    pub urn: Option<String>,
    #[serde(default)]
    pub management_account_id: Option<String>,
    #[serde(default)]
    pub management_account_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct OrganizationResponse {
    organization: RemoteOrganization,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PolicyType {
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Root {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub urn: Option<String>,
    #[serde(default)]
    pub policy_types: Vec<PolicyType>,
}

impl Root {
    pub fn policy_status(&self, policy_type: &str) -> Option<&str> {
        self.policy_types
            .iter()
            .find(|policy| policy.policy_type == policy_type)
            .map(|policy| policy.status.as_str())
    }

    pub fn enabled_policy_types(&self) -> impl Iterator<Item = &str> {
        self.policy_types
            .iter()
            .filter(|policy| policy.status == "enabled")
            .map(|policy| policy.policy_type.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct RootList {
    #[serde(default)]
    roots: Vec<Root>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<Tag>,
}

/// Organization of the account the client is authenticated with
#[derive(Debug, Clone, Copy)]
pub(crate) struct Organizations<'c> {
    pub client: &'c ServiceClient,
}

impl<'c> Organizations<'c> {
    pub async fn create(&self) -> Result<String> {
        let url = self.client.url("v1/organizations", &[])?;
        let response: OrganizationResponse = self
            .client
            .request_as(Method::POST, url, RequestOpts::new().ok_codes(&[201]))
            .await?;
        Ok(response.organization.id)
    }

    pub async fn get(&self) -> Result<RemoteOrganization> {
        let url = self.client.url("v1/organizations", &[])?;
        let response: OrganizationResponse = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;
        Ok(response.organization)
    }

    pub async fn delete(&self) -> Result<()> {
        let url = self.client.url("v1/organizations", &[])?;
        self.client
            .delete(url, RequestOpts::new().ok_codes(&[204]))
            .await?;
        Ok(())
    }

    pub async fn root(&self) -> Result<Root> {
        let url = self.client.url("v1/organizations/roots", &[])?;
        let list: RootList = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;
        list.roots
            .into_iter()
            .next()
            .ok_or(ApiError::MissingField("roots"))
    }

    pub async fn root_tags(&self, root_id: &str) -> Result<Tags> {
        let mut url = self.client.url(
            "v1/organizations/organizations:roots/{root_id}/tags",
            &[("root_id", root_id)],
        )?;
        url.query_pairs_mut().append_pair("limit", "2000");
        let list: TagList = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;
        Ok(tags::flatten(&list.tags))
    }

    async fn post_tags(&self, root_id: &str, action: &str, tags: Vec<Tag>) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let url = self.client.url(
            "v1/organizations/organizations:roots/{root_id}/tags/{action}",
            &[("root_id", root_id), ("action", action)],
        )?;
        self.client
            .post(url, RequestOpts::new().body(json!({ "tags": tags })))
            .await?;
        Ok(())
    }

    /// Apply the tag changes between `old` and `new` to the root
    pub async fn update_root_tags(&self, root_id: &str, old: &Tags, new: &Tags) -> Result<()> {
        let (remove, add) = tags::diff(old, new);
        debug!(root_id, removed = remove.len(), added = add.len(), "updating the root tags");
        self.post_tags(root_id, "delete", remove).await?;
        self.post_tags(root_id, "create", add).await
    }

    pub async fn request_policy(
        &self,
        root_id: &str,
        policy_type: &str,
        enable: bool,
    ) -> Result<()> {
        let action = if enable { "enable" } else { "disable" };
        let url = self
            .client
            .url("v1/organizations/policies/{action}", &[("action", action)])?;
        self.client
            .post(
                url,
                RequestOpts::new().body(json!({
                    "policy_type": policy_type,
                    "root_id": root_id,
                })),
            )
            .await?;
        Ok(())
    }
}

/// Progress of a policy type toward `enabled` or `disabled`
///
/// A policy type missing from the root counts as disabled.
fn policy_progress(status: Option<&str>, enabled: bool) -> JobStatus<()> {
    let (target, pending) = if enabled {
        ("enabled", "pending_enable")
    } else {
        ("disabled", "pending_disable")
    };
    match status {
        Some(status) if status == target => JobStatus::Succeeded(()),
        Some(status) if status == pending => JobStatus::Pending,
        Some(status) => JobStatus::Failed(format!("unexpected policy status {status}")),
        None if enabled => JobStatus::Pending,
        None => JobStatus::Succeeded(()),
    }
}

/// Completes once a policy type of the root reaches the expected status
pub(crate) struct RootPolicy<'c> {
    pub organizations: Organizations<'c>,
    pub enabled: bool,
}

#[async_trait]
impl StatusSource for RootPolicy<'_> {
    type Entity = ();

    async fn fetch(&self, policy_type: &str) -> Result<JobStatus<()>> {
        let root = self.organizations.root().await?;
        Ok(policy_progress(root.policy_status(policy_type), self.enabled))
    }

    fn subject(&self, policy_type: &str) -> String {
        let action = if self.enabled { "enabled" } else { "disabled" };
        format!("policy type {policy_type} to be {action}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_types() {
        let root: Root = serde_json::from_value(json!({
            "id": "r-1",
            "policy_types": [
                {"type": "service_control_policy", "status": "enabled"},
                {"type": "tag_policy", "status": "pending_enable"},
            ],
        }))
        .unwrap();
        assert_eq!(
            root.enabled_policy_types().collect::<Vec<_>>(),
            vec!["service_control_policy"]
        );
        assert_eq!(root.policy_status("tag_policy"), Some("pending_enable"));
        assert_eq!(root.policy_status("backup_policy"), None);
    }

    #[test]
    fn policy_progress_toward_target() {
        assert_eq!(policy_progress(Some("enabled"), true), JobStatus::Succeeded(()));
        assert_eq!(policy_progress(Some("pending_enable"), true), JobStatus::Pending);
        assert_eq!(policy_progress(None, true), JobStatus::Pending);
        assert_eq!(policy_progress(Some("disabled"), false), JobStatus::Succeeded(()));
        assert_eq!(policy_progress(Some("pending_disable"), false), JobStatus::Pending);
        assert_eq!(policy_progress(None, false), JobStatus::Succeeded(()));
    }

    #[test]
    fn unexpected_policy_status_fails() {
        assert_eq!(
            policy_progress(Some("pending_disable"), true),
            JobStatus::Failed("unexpected policy status pending_disable".to_owned())
        );
        assert_eq!(
            policy_progress(Some("enabled"), false),
            JobStatus::Failed("unexpected policy status enabled".to_owned())
        );
        assert_eq!(
            policy_progress(Some("failed"), true),
            JobStatus::Failed("unexpected policy status failed".to_owned())
        );
    }
}
