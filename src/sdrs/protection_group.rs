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

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::info;

use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{self, Value, ValueEmpty, ValueString};

use crate::client::{RequestOpts, ServiceClient};
use crate::config::ConfigHandle;
use crate::error::{ApiError, IgnoreNotFound, Result};
use crate::job;
use crate::utils::{
    self, known, non_empty, replace_if_changed, string_value, ExtractDiagnostics, Operation,
    StateTimeouts, WithSchema,
};

use super::{SdrsJobs, SERVICE};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_DR_TYPE: &str = "migration";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProtectionGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub source_availability_zone: ValueString<'a>,
    pub target_availability_zone: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub source_vpc_id: ValueString<'a>,
    pub dr_type: ValueString<'a>,
    pub status: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<StateTimeouts<'a>>,
}

impl<'a> WithSchema for ProtectionGroupState<'a> {
    fn schema() -> Schema {
        let string = |description: &str, constraint| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint,
            ..Default::default()
        };
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => string("ID of the protection group", Computed),
                    "region" => string("Region of the protection group, the provider region by default", OptionalComputed),
                    "name" => string("Name of the protection group", Required),
                    "description" => string("Description of the protection group", Optional),
                    "source_availability_zone" => string("Availability zone of the production site", Required),
                    "target_availability_zone" => string("Availability zone of the disaster recovery site", Required),
                    "domain_id" => string("Active-active domain of the protection group", Required),
                    "source_vpc_id" => string("VPC of the production site", Required),
                    "dr_type" => string("Deployment model, `migration` by default", OptionalComputed),
                    "status" => string("Status of the protection group", Computed),
                },
                blocks: map! {
                    "timeouts" => StateTimeouts::block(),
                },
                description: Description::plain("SDRS protection group"),
                ..Default::default()
            },
        }
    }
}

/// Protection group as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
struct RemoteGroup {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source_availability_zone: Option<String>,
    #[serde(default)]
    target_availability_zone: Option<String>,
    #[serde(default)]
    domain_id: Option<String>,
    #[serde(default)]
    source_vpc_id: Option<String>,
    #[serde(default)]
    dr_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    server_group: RemoteGroup,
}

impl<'a> ProtectionGroupState<'a> {
    fn create_body(&self) -> JsonValue {
        let mut group = json!({
            "name": non_empty(&self.name),
            "source_availability_zone": non_empty(&self.source_availability_zone),
            "target_availability_zone": non_empty(&self.target_availability_zone),
            "domain_id": non_empty(&self.domain_id),
            "source_vpc_id": non_empty(&self.source_vpc_id),
            "dr_type": non_empty(&self.dr_type).unwrap_or(DEFAULT_DR_TYPE),
        });
        if let Some(description) = non_empty(&self.description) {
            group["description"] = description.into();
        }
        json!({ "server_group": group })
    }

    fn apply(&mut self, remote: RemoteGroup) {
        // An empty description is returned for an undeclared one
        let description = remote.description.filter(|description| !description.is_empty());

        self.id = Value::Value(Cow::Owned(remote.id));
        self.name = string_value(remote.name);
        self.description = if description.is_none() && !self.description.is_value() {
            Value::Null
        } else {
            string_value(description)
        };
        self.source_availability_zone = string_value(remote.source_availability_zone);
        self.target_availability_zone = string_value(remote.target_availability_zone);
        self.domain_id = string_value(remote.domain_id);
        self.source_vpc_id = string_value(remote.source_vpc_id);
        self.dr_type = string_value(remote.dr_type);
        self.status = string_value(remote.status);
    }
}

async fn get_group(client: &ServiceClient, id: &str) -> Result<RemoteGroup> {
    let url = client.url(
        "v1/{project_id}/server-groups/{server_group_id}",
        &[("server_group_id", id)],
    )?;
    let response: GroupResponse = client
        .request_as(Method::GET, url, RequestOpts::new())
        .await?;
    Ok(response.server_group)
}

fn job_id(response: &JsonValue) -> Result<&str> {
    response
        .get("job_id")
        .and_then(JsonValue::as_str)
        .filter(|job_id| !job_id.is_empty())
        .ok_or(ApiError::MissingField("job_id"))
}

#[derive(Debug, Clone)]
pub struct ProtectionGroupResource {
    config: ConfigHandle,
}

impl ProtectionGroupResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn create_group<'a>(
        &self,
        mut state: ProtectionGroupState<'a>,
    ) -> Result<ProtectionGroupState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Create, DEFAULT_TIMEOUT)?;

        let url = client.url("v1/{project_id}/server-groups", &[])?;
        let response = client
            .post(url, RequestOpts::new().body(state.create_body()))
            .await?;
        let job_id = job_id(&response)?;
        info!(job_id, "protection group requested");

        let jobs = SdrsJobs::new(&client);
        let id = job::wait(&jobs, job_id, &SdrsJobs::wait_options(timeout)).await?;
        if id.is_empty() {
            return Err(ApiError::MissingField("entities.server_group_id"));
        }
        info!(%id, "protection group created");

        let remote = get_group(&client, &id).await?;
        state.region = region.into();
        state.apply(remote);
        Ok(state)
    }

    async fn refresh<'a>(
        &self,
        mut state: ProtectionGroupState<'a>,
    ) -> Result<Option<ProtectionGroupState<'a>>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the protection group ID is empty"))?;

        let Some(remote) = get_group(&client, id).await.ignore_not_found()? else {
            info!(id, "protection group is gone");
            return Ok(None);
        };
        state.region = region.into();
        state.apply(remote);
        Ok(Some(state))
    }

    async fn rename_group<'a>(
        &self,
        mut state: ProtectionGroupState<'a>,
    ) -> Result<ProtectionGroupState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the protection group ID is empty"))?
            .to_owned();

        let url = client.url(
            "v1/{project_id}/server-groups/{server_group_id}",
            &[("server_group_id", id.as_str())],
        )?;
        let body = json!({ "server_group": { "name": non_empty(&state.name) } });
        client.put(url, RequestOpts::new().body(body)).await?;

        let remote = get_group(&client, &id).await?;
        state.apply(remote);
        Ok(state)
    }

    async fn delete_group(&self, state: &ProtectionGroupState<'_>) -> Result<()> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Delete, DEFAULT_TIMEOUT)?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the protection group ID is empty"))?;

        let url = client.url(
            "v1/{project_id}/server-groups/{server_group_id}",
            &[("server_group_id", id)],
        )?;
        let Some(response) = client
            .delete(url, RequestOpts::new())
            .await
            .ignore_not_found()?
        else {
            info!(id, "protection group already deleted");
            return Ok(());
        };

        let jobs = SdrsJobs::new(&client);
        job::wait(&jobs, job_id(&response)?, &SdrsJobs::wait_options(timeout)).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for ProtectionGroupResource {
    type State<'a> = Value<ProtectionGroupState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProtectionGroupState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            StateTimeouts::validate(&config.timeouts, diags);
            if let Value::Value(name) = &config.name {
                if name.is_empty() {
                    diags.error_short(
                        "The protection group name is empty",
                        AttributePath::new("name"),
                    );
                }
            }
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = known(state, diags)?;
        let state = self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to read the protection group")?;
        Some((Value::from(state), private_state))
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = known(proposed_state, diags)?;
        state.id = Value::Unknown;
        state.status = Value::Unknown;
        if state.region.is_null() {
            state.region = Value::Unknown;
        }
        if state.dr_type.is_null() {
            state.dr_type = Value::Value(Cow::Borrowed(DEFAULT_DR_TYPE));
        }
        Some((Value::Value(state), Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let prior = known(prior_state, diags)?;
        let state = known(proposed_state, diags)?;

        let mut trigger_replace = Vec::new();
        replace_if_changed(&mut trigger_replace, "region", &prior.region, &state.region);
        replace_if_changed(
            &mut trigger_replace,
            "description",
            &prior.description,
            &state.description,
        );
        replace_if_changed(
            &mut trigger_replace,
            "source_availability_zone",
            &prior.source_availability_zone,
            &state.source_availability_zone,
        );
        replace_if_changed(
            &mut trigger_replace,
            "target_availability_zone",
            &prior.target_availability_zone,
            &state.target_availability_zone,
        );
        replace_if_changed(&mut trigger_replace, "domain_id", &prior.domain_id, &state.domain_id);
        replace_if_changed(
            &mut trigger_replace,
            "source_vpc_id",
            &prior.source_vpc_id,
            &state.source_vpc_id,
        );
        replace_if_changed(&mut trigger_replace, "dr_type", &prior.dr_type, &state.dr_type);

        Some((Value::Value(state), prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = known(planned_state, diags)?;
        let state = self
            .create_group(state)
            .await
            .extract_diagnostics(diags, "Unable to create the protection group")?;
        Some((Value::Value(state), planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let prior = known(prior_state, diags)?;
        let state = known(planned_state, diags)?;
        if prior.name == state.name {
            return Some((Value::Value(state), planned_private_state));
        }
        let state = self
            .rename_group(state)
            .await
            .extract_diagnostics(diags, "Unable to update the protection group")?;
        Some((Value::Value(state), planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let state = known(prior_state, diags)?;
        self.delete_group(&state)
            .await
            .extract_diagnostics(diags, "Unable to delete the protection group")
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = ProtectionGroupState {
            id: id.clone().into(),
            ..Default::default()
        };
        match self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to import the protection group")?
        {
            Some(state) => Some((Value::Value(state), Default::default())),
            None => {
                diags.root_error(
                    "Unable to import the protection group",
                    format!("protection group {id} does not exist"),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn declared() -> ProtectionGroupState<'static> {
        ProtectionGroupState {
            name: Value::Value("group".into()),
            source_availability_zone: Value::Value("az-1".into()),
            target_availability_zone: Value::Value("az-2".into()),
            domain_id: Value::Value("domain-1".into()),
            source_vpc_id: Value::Value("vpc-1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_request() {
        assert_eq!(
            declared().create_body(),
            json!({
                "server_group": {
                    "name": "group",
                    "source_availability_zone": "az-1",
                    "target_availability_zone": "az-2",
                    "domain_id": "domain-1",
                    "source_vpc_id": "vpc-1",
                    "dr_type": "migration",
                }
            })
        );
    }

    #[test]
    fn apply_remote() {
        let remote: GroupResponse = serde_json::from_value(json!({
            "server_group": {
                "id": "g-1",
                "name": "group",
                "description": "",
                "source_availability_zone": "az-1",
                "target_availability_zone": "az-2",
                "domain_id": "domain-1",
                "source_vpc_id": "vpc-1",
                "dr_type": "migration",
                "status": "available",
            }
        }))
        .unwrap();

        let mut state = declared();
        state.apply(remote.server_group);
        assert_eq!(state.id.as_str(), "g-1");
        assert_eq!(state.status.as_str(), "available");
        assert_eq!(state.dr_type.as_str(), "migration");
        assert!(state.description.is_null());
    }
}
