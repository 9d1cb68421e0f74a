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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueNumber, ValueString};

use crate::config::ConfigHandle;
use crate::error::{ApiError, IgnoreNotFound, Result};
use crate::utils::{
    known, non_empty, replace_if_changed, string_value, ExtractDiagnostics, WithSchema,
};

use super::{HostGroups, RemoteHostGroup, SERVICE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HostGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub host_num: ValueNumber,
}

impl<'a> WithSchema for HostGroupState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("ID of the host group"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region of the host group, the provider region by default"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the host group"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "host_num" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("Number of hosts in the group"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Host group scanned by CodeArts Inspector"),
                ..Default::default()
            },
        }
    }
}

impl<'a> HostGroupState<'a> {
    fn apply(&mut self, group: RemoteHostGroup, region: &str) {
        self.id = Value::Value(Cow::Owned(group.id));
        self.name = string_value(group.name);
        self.host_num = group.host_num.into();
        self.region = Value::Value(Cow::Owned(region.to_owned()));
    }
}

#[derive(Debug, Clone)]
pub struct HostGroupResource {
    config: ConfigHandle,
}

impl HostGroupResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn create_group<'a>(&self, mut state: HostGroupState<'a>) -> Result<HostGroupState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let name = non_empty(&state.name)
            .ok_or_else(|| ApiError::client("the host group name is empty"))?
            .to_owned();

        let groups = HostGroups { client: &client };
        let id = groups.create(&name).await?;
        info!(%id, %name, "host group created");

        let group = groups.get(&id).await?;
        state.apply(group, &region);
        Ok(state)
    }

    async fn refresh<'a>(
        &self,
        mut state: HostGroupState<'a>,
    ) -> Result<Option<HostGroupState<'a>>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the host group ID is empty"))?;

        let groups = HostGroups { client: &client };
        let Some(group) = groups.get(id).await.ignore_not_found()? else {
            info!(id, "host group is gone");
            return Ok(None);
        };
        state.apply(group, &region);
        Ok(Some(state))
    }

    async fn delete_group(&self, state: &HostGroupState<'_>) -> Result<()> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the host group ID is empty"))?;

        let groups = HostGroups { client: &client };
        if groups.delete(id).await.ignore_not_found()?.is_none() {
            info!(id, "host group already deleted");
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for HostGroupResource {
    type State<'a> = Value<HostGroupState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(HostGroupState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            if let Value::Value(name) = &config.name {
                if name.is_empty() {
                    diags.error_short("The host group name is empty", AttributePath::new("name"));
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
            .extract_diagnostics(diags, "Unable to read the host group")?;
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
        state.host_num = Value::Unknown;
        if state.region.is_null() {
            state.region = Value::Unknown;
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

        // Groups cannot be renamed
        let mut trigger_replace = Vec::new();
        replace_if_changed(&mut trigger_replace, "region", &prior.region, &state.region);
        replace_if_changed(&mut trigger_replace, "name", &prior.name, &state.name);

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
            .extract_diagnostics(diags, "Unable to create the host group")?;
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
        self.delete_group(&state)
            .await
            .extract_diagnostics(diags, "Unable to delete the host group")
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = HostGroupState {
            id: id.clone().into(),
            ..Default::default()
        };
        match self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to import the host group")?
        {
            Some(state) => Some((Value::Value(state), Default::default())),
            None => {
                diags.root_error(
                    "Unable to import the host group",
                    format!("host group {id} does not exist"),
                );
                None
            }
        }
    }
}
