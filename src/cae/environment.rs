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
use std::collections::BTreeMap;
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
use tf_provider::value::{self, Value, ValueEmpty, ValueMap, ValueString};

use crate::client::{RequestOpts, ServiceClient};
use crate::config::ConfigHandle;
use crate::error::{ApiError, IgnoreNotFound, Result};
use crate::job::{self, WaitOptions};
use crate::utils::{
    self, known, non_empty, replace_if_changed, rfc3339, string_map, string_map_value,
    string_value, ExtractDiagnostics, Operation, StateTimeouts, WithSchema,
};

use super::job::{job_id, required_job_id, CaeJobs};
use super::{HEADER_ENTERPRISE_PROJECT_ID, NOT_FOUND_CODES, SERVICE};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnvironmentState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub annotations: ValueMap<'a, ValueString<'a>>,
    pub enterprise_project_id: ValueString<'a>,
    pub status: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<StateTimeouts<'a>>,
}

impl<'a> WithSchema for EnvironmentState<'a> {
    fn schema() -> Schema {
        let computed = |description: &str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => computed("ID of the environment"),
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region of the environment, the provider region by default"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the environment"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "annotations" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain(
                            "Annotations of the environment, like the VPC and the subnet it uses",
                        ),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "enterprise_project_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Enterprise project of the environment"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "status" => computed("Status of the environment"),
                    "created_at" => computed("Creation time, in RFC3339 format"),
                    "updated_at" => computed("Last update time, in RFC3339 format"),
                },
                blocks: map! {
                    "timeouts" => StateTimeouts::block(),
                },
                description: Description::plain("CAE environment"),
                ..Default::default()
            },
        }
    }
}

/// Environment as listed by the API
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteEnvironment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<JsonValue>,
    #[serde(default)]
    pub updated_at: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentList {
    #[serde(default)]
    items: Vec<RemoteEnvironment>,
}

pub(crate) async fn list_environments(
    client: &ServiceClient,
    enterprise_project_id: Option<&str>,
) -> Result<Vec<RemoteEnvironment>> {
    let url = client.url("v1/{project_id}/cae/environments", &[])?;
    let mut opts = RequestOpts::new().not_found_codes(NOT_FOUND_CODES);
    if let Some(enterprise_project_id) = enterprise_project_id {
        opts = opts.header(HEADER_ENTERPRISE_PROJECT_ID, enterprise_project_id);
    }
    let list = client
        .request_as::<EnvironmentList>(Method::GET, url, opts)
        .await
        .ignore_not_found()?;
    Ok(list.map(|list| list.items).unwrap_or_default())
}

impl<'a> EnvironmentState<'a> {
    fn apply(&mut self, remote: RemoteEnvironment) {
        // Only the declared annotations are tracked, the service adds its own
        let annotations = match self.annotations.as_ref_option() {
            Some(declared) => remote
                .annotations
                .into_iter()
                .filter(|(key, _)| declared.contains_key(key.as_str()))
                .collect(),
            None => remote.annotations,
        };

        self.id = Value::Value(Cow::Owned(remote.id));
        self.name = Value::Value(Cow::Owned(remote.name));
        self.annotations = if annotations.is_empty() && !self.annotations.is_value() {
            Value::Null
        } else {
            string_map_value(annotations)
        };
        self.status = string_value(remote.status);
        self.created_at = string_value(rfc3339(remote.created_at.as_ref()));
        self.updated_at = string_value(rfc3339(remote.updated_at.as_ref()));
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentResource {
    config: ConfigHandle,
}

impl EnvironmentResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn find(
        client: &ServiceClient,
        state: &EnvironmentState<'_>,
        matches: impl Fn(&RemoteEnvironment) -> bool,
    ) -> Result<Option<RemoteEnvironment>> {
        let environments =
            list_environments(client, non_empty(&state.enterprise_project_id)).await?;
        Ok(environments.into_iter().find(|environment| matches(environment)))
    }

    async fn create_environment<'a>(
        &self,
        mut state: EnvironmentState<'a>,
    ) -> Result<EnvironmentState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let enterprise_project_id =
            config.enterprise_project_id(non_empty(&state.enterprise_project_id));
        let client = config.new_service_client(SERVICE, &region).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Create, DEFAULT_TIMEOUT)?;

        let name = non_empty(&state.name)
            .ok_or_else(|| ApiError::client("the environment name is empty"))?
            .to_owned();
        let mut opts = RequestOpts::new().body(json!({
            "api_version": "v1",
            "kind": "Environment",
            "metadata": {
                "name": name,
                "annotations": string_map(&state.annotations),
            },
        }));
        if let Some(enterprise_project_id) = &enterprise_project_id {
            opts = opts.header(HEADER_ENTERPRISE_PROJECT_ID, enterprise_project_id.as_str());
        }

        let url = client.url("v1/{project_id}/cae/environments", &[])?;
        let response = client.post(url, opts).await?;
        let job_id = required_job_id(&response)?;

        state.region = region.into();
        state.enterprise_project_id = string_value(enterprise_project_id);

        // The ID is not always part of the creation response
        let id = match response
            .pointer("/metadata/id")
            .and_then(JsonValue::as_str)
            .filter(|id| !id.is_empty())
        {
            Some(id) => id.to_owned(),
            None => Self::find(&client, &state, |environment| environment.name == name)
                .await?
                .map(|environment| environment.id)
                .ok_or(ApiError::MissingField("metadata.id"))?,
        };

        let jobs = CaeJobs::new(&client, &id);
        job::wait(&jobs, job_id, &WaitOptions::new(timeout)).await?;

        let remote = Self::find(&client, &state, |environment| environment.id == id)
            .await?
            .ok_or(ApiError::MissingField("metadata.id"))?;

        info!(id = %remote.id, %name, "CAE environment created");
        state.apply(remote);
        Ok(state)
    }

    async fn refresh<'a>(
        &self,
        mut state: EnvironmentState<'a>,
    ) -> Result<Option<EnvironmentState<'a>>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the environment ID is empty"))?
            .to_owned();

        let Some(remote) = Self::find(&client, &state, |environment| environment.id == id).await?
        else {
            info!(%id, "CAE environment is gone");
            return Ok(None);
        };
        state.region = region.into();
        state.apply(remote);
        Ok(Some(state))
    }

    async fn delete_environment(&self, state: &EnvironmentState<'_>) -> Result<()> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Delete, DEFAULT_TIMEOUT)?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the environment ID is empty"))?;

        let url = client.url(
            "v1/{project_id}/cae/environments/{environment_id}",
            &[("environment_id", id)],
        )?;
        let mut opts = RequestOpts::new().not_found_codes(NOT_FOUND_CODES);
        if let Some(enterprise_project_id) = non_empty(&state.enterprise_project_id) {
            opts = opts.header(HEADER_ENTERPRISE_PROJECT_ID, enterprise_project_id);
        }

        let Some(response) = client.delete(url, opts).await.ignore_not_found()? else {
            info!(id, "CAE environment already deleted");
            return Ok(());
        };
        if let Some(job_id) = job_id(&response) {
            let jobs = CaeJobs::new(&client, id);
            job::wait(&jobs, job_id, &WaitOptions::new(timeout)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for EnvironmentResource {
    type State<'a> = Value<EnvironmentState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(EnvironmentState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            StateTimeouts::validate(&config.timeouts, diags);
            if matches!(&config.name, Value::Value(name) if name.is_empty()) {
                diags.error_short("The environment name is empty", AttributePath::new("name"));
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
            .extract_diagnostics(diags, "Unable to read the CAE environment")?;
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
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
        if state.region.is_null() {
            state.region = Value::Unknown;
        }
        if state.enterprise_project_id.is_null() {
            state.enterprise_project_id = Value::Unknown;
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

        // Everything but the timeouts requires a new environment
        let mut trigger_replace = Vec::new();
        replace_if_changed(&mut trigger_replace, "region", &prior.region, &state.region);
        replace_if_changed(&mut trigger_replace, "name", &prior.name, &state.name);
        replace_if_changed(
            &mut trigger_replace,
            "annotations",
            &prior.annotations,
            &state.annotations,
        );
        replace_if_changed(
            &mut trigger_replace,
            "enterprise_project_id",
            &prior.enterprise_project_id,
            &state.enterprise_project_id,
        );

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
            .create_environment(state)
            .await
            .extract_diagnostics(diags, "Unable to create the CAE environment")?;
        Some((Value::Value(state), planned_private_state))
    }

    async fn update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        // Only the timeouts can change in place
        Some((planned_state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let state = known(prior_state, diags)?;
        self.delete_environment(&state)
            .await
            .extract_diagnostics(diags, "Unable to delete the CAE environment")
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = EnvironmentState {
            id: id.clone().into(),
            ..Default::default()
        };
        match self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to import the CAE environment")?
        {
            Some(state) => Some((Value::Value(state), Default::default())),
            None => {
                diags.root_error(
                    "Unable to import the CAE environment",
                    format!("environment {id} does not exist"),
                );
                None
            }
        }
    }
}
