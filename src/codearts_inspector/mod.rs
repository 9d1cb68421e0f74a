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

//! CodeArts Inspector host groups

mod host_group;
mod host_groups;

pub use host_group::{HostGroupResource, HostGroupState};
pub use host_groups::{HostGroupItem, HostGroupsDataSource, HostGroupsState};

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::client::{RequestOpts, ServiceClient};
use crate::error::{ApiError, RemoteError, Result};

pub const SERVICE: &str = "vss";

const PAGE_SIZE: usize = 200;

/// Host group as listed by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RemoteHostGroup {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host_num: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HostGroupPage {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    data: Vec<RemoteHostGroup>,
}

/// Host groups of the project the client is scoped to
#[derive(Debug, Clone, Copy)]
pub(crate) struct HostGroups<'c> {
    pub client: &'c ServiceClient,
}

impl<'c> HostGroups<'c> {
    /// Create a group and return its ID
    pub async fn create(&self, name: &str) -> Result<String> {
        let url = self.client.url("v3/{project_id}/hostscan/groups", &[])?;
        let response = self
            .client
            .post(url, RequestOpts::new().body(json!({ "name": name })))
            .await?;
        response
            .get("id")
            .and_then(JsonValue::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .ok_or(ApiError::MissingField("id"))
    }

    /// Every group, the API has no lookup by ID
    pub async fn list(&self) -> Result<Vec<RemoteHostGroup>> {
        let mut groups = Vec::new();
        loop {
            let mut url = self.client.url("v3/{project_id}/hostscan/groups", &[])?;
            url.query_pairs_mut()
                .append_pair("offset", &groups.len().to_string())
                .append_pair("limit", &PAGE_SIZE.to_string());
            let page: HostGroupPage = self
                .client
                .request_as(Method::GET, url, RequestOpts::new())
                .await?;

            let count = page.data.len();
            groups.extend(page.data);
            debug!(count, total = ?page.total, "host group page fetched");
            if count < PAGE_SIZE || page.total.is_some_and(|total| groups.len() >= total) {
                return Ok(groups);
            }
        }
    }

    /// Group with the given ID, [`ApiError::NotFound`] if it is not listed
    pub async fn get(&self, id: &str) -> Result<RemoteHostGroup> {
        self.list()
            .await?
            .into_iter()
            .find(|group| group.id == id)
            .ok_or_else(|| {
                ApiError::NotFound(RemoteError {
                    status: StatusCode::NOT_FOUND,
                    code: None,
                    message: format!("host group {id} does not exist"),
                })
            })
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let url = self.client.url(
            "v3/{project_id}/hostscan/groups/{group_id}",
            &[("group_id", id)],
        )?;
        self.client.delete(url, RequestOpts::new()).await?;
        Ok(())
    }
}
