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

//! SoftWare Repository for Container, organizations only

mod organization;
mod organizations;

pub use organization::{SwrOrganizationResource, SwrOrganizationState};
pub use organizations::{SwrOrganizationItem, SwrOrganizationsDataSource, SwrOrganizationsState};

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::client::{RequestOpts, ServiceClient};
use crate::error::Result;

pub const SERVICE: &str = "swr";

/// Organization (namespace) as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Namespace {
    pub name: String,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub auth: Option<i64>,
}

impl Namespace {
    /// Permission of the current user on the organization
    pub fn permission(&self) -> Option<&'static str> {
        match self.auth? {
            7 => Some("Manage"),
            3 => Some("Write"),
            1 => Some("Read"),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NamespaceList {
    #[serde(default)]
    namespaces: Vec<Namespace>,
}

/// Address of the image registry of a region
pub(crate) fn login_server(region: &str, cloud: &str) -> String {
    format!("swr.{region}.{cloud}")
}

/// API of the organizations
#[derive(Debug, Clone, Copy)]
pub(crate) struct Namespaces<'c> {
    pub client: &'c ServiceClient,
}

impl<'c> Namespaces<'c> {
    pub async fn create(&self, name: &str) -> Result<()> {
        let url = self.client.url("v2/manage/namespaces", &[])?;
        let body = json!({ "namespace": name });
        self.client.post(url, RequestOpts::new().body(body)).await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Namespace> {
        let url = self
            .client
            .url("v2/manage/namespaces/{namespace}", &[("namespace", name)])?;
        self.client
            .request_as(Method::GET, url, RequestOpts::new())
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let url = self
            .client
            .url("v2/manage/namespaces/{namespace}", &[("namespace", name)])?;
        self.client.delete(url, RequestOpts::new()).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Namespace>> {
        let url = self.client.url("v2/manage/namespaces", &[])?;
        let list: NamespaceList = self
            .client
            .request_as(Method::GET, url, RequestOpts::new())
            .await?;
        Ok(list.namespaces)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn permissions() {
        let namespace = |auth| Namespace {
            name: "org".into(),
            auth,
            ..Default::default()
        };
        assert_eq!(namespace(Some(7)).permission(), Some("Manage"));
        assert_eq!(namespace(Some(3)).permission(), Some("Write"));
        assert_eq!(namespace(Some(1)).permission(), Some("Read"));
        assert_eq!(namespace(Some(0)).permission(), None);
        assert_eq!(namespace(None).permission(), None);
    }

    #[test]
    fn decode_list() {
        let list: NamespaceList = serde_json::from_value(json!({
            "namespaces": [
                {"id": 1, "name": "org", "creator_name": "alice", "auth": 7},
                {"id": 2, "name": "shared"},
            ]
        }))
        .unwrap();
        assert_eq!(list.namespaces.len(), 2);
        assert_eq!(list.namespaces[0].creator_name.as_deref(), Some("alice"));
        assert_eq!(list.namespaces[1].auth, None);
        assert_eq!(
            login_server("cn-north-4", "myhuaweicloud.com"),
            "swr.cn-north-4.myhuaweicloud.com"
        );
    }
}
