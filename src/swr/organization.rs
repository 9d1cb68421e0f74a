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
use tf_provider::value::{Value, ValueEmpty, ValueString};

use crate::config::ConfigHandle;
use crate::error::{ApiError, IgnoreNotFound, Result};
use crate::utils::{
    known, non_empty, replace_if_changed, string_value, ExtractDiagnostics, WithSchema,
};

use super::{login_server, Namespace, Namespaces, SERVICE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SwrOrganizationState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub creator: ValueString<'a>,
    pub permission: ValueString<'a>,
    pub login_server: ValueString<'a>,
}

impl<'a> WithSchema for SwrOrganizationState<'a> {
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
                    "id" => computed("ID of the organization, its name"),
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region of the organization, the provider region by default"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the organization"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "creator" => computed("User who created the organization"),
                    "permission" => computed("Permission of the current user: `Manage`, `Write` or `Read`"),
                    "login_server" => computed("Address of the registry hosting the organization"),
                },
                description: Description::plain("SWR organization"),
                ..Default::default()
            },
        }
    }
}

impl<'a> SwrOrganizationState<'a> {
    fn apply(&mut self, namespace: Namespace, region: &str, cloud: &str) {
        self.permission = string_value(namespace.permission().map(str::to_owned));
        self.creator = string_value(namespace.creator_name);
        self.id = Value::Value(Cow::Owned(namespace.name.clone()));
        self.name = Value::Value(Cow::Owned(namespace.name));
        self.login_server = Value::Value(Cow::Owned(login_server(region, cloud)));
        self.region = Value::Value(Cow::Owned(region.to_owned()));
    }
}

#[derive(Debug, Clone)]
pub struct SwrOrganizationResource {
    config: ConfigHandle,
}

impl SwrOrganizationResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn create_organization<'a>(
        &self,
        mut state: SwrOrganizationState<'a>,
    ) -> Result<SwrOrganizationState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let name = non_empty(&state.name)
            .ok_or_else(|| ApiError::client("the organization name is empty"))?
            .to_owned();

        let namespaces = Namespaces { client: &client };
        namespaces.create(&name).await?;
        info!(%name, "SWR organization created");

        let namespace = namespaces.get(&name).await?;
        state.apply(namespace, &region, config.cloud());
        Ok(state)
    }

    async fn refresh<'a>(
        &self,
        mut state: SwrOrganizationState<'a>,
    ) -> Result<Option<SwrOrganizationState<'a>>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let name = non_empty(&state.id)
            .or_else(|| non_empty(&state.name))
            .ok_or_else(|| ApiError::client("the organization name is empty"))?;

        let namespaces = Namespaces { client: &client };
        let Some(namespace) = namespaces.get(name).await.ignore_not_found()? else {
            info!(name, "SWR organization is gone");
            return Ok(None);
        };
        state.apply(namespace, &region, config.cloud());
        Ok(Some(state))
    }

    async fn delete_organization(&self, state: &SwrOrganizationState<'_>) -> Result<()> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let name = non_empty(&state.name)
            .ok_or_else(|| ApiError::client("the organization name is empty"))?;

        let namespaces = Namespaces { client: &client };
        if namespaces.delete(name).await.ignore_not_found()?.is_none() {
            info!(name, "SWR organization already deleted");
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for SwrOrganizationResource {
    type State<'a> = Value<SwrOrganizationState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SwrOrganizationState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            if let Value::Value(name) = &config.name {
                if name.is_empty() {
                    diags.error_short("The organization name is empty", AttributePath::new("name"));
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
            .extract_diagnostics(diags, "Unable to read the SWR organization")?;
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
        state.creator = Value::Unknown;
        state.permission = Value::Unknown;
        state.login_server = Value::Unknown;
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
            .create_organization(state)
            .await
            .extract_diagnostics(diags, "Unable to create the SWR organization")?;
        Some((Value::Value(state), planned_private_state))
    }

    /// Every attribute forces a replacement
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
        self.delete_organization(&state)
            .await
            .extract_diagnostics(diags, "Unable to delete the SWR organization")
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = SwrOrganizationState {
            id: id.clone().into(),
            ..Default::default()
        };
        match self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to import the SWR organization")?
        {
            Some(state) => Some((Value::Value(state), Default::default())),
            None => {
                diags.root_error(
                    "Unable to import the SWR organization",
                    format!("organization {id} does not exist"),
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

    #[test]
    fn apply_remote() {
        let mut state = SwrOrganizationState {
            name: Value::Value("org".into()),
            ..Default::default()
        };
        state.apply(
            Namespace {
                name: "org".into(),
                creator_name: Some("alice".into()),
                auth: Some(7),
            },
            "cn-north-4",
            "myhuaweicloud.com",
        );
        assert_eq!(state.id.as_str(), "org");
        assert_eq!(state.creator.as_str(), "alice");
        assert_eq!(state.permission.as_str(), "Manage");
        assert_eq!(state.login_server.as_str(), "swr.cn-north-4.myhuaweicloud.com");
        assert_eq!(state.region.as_str(), "cn-north-4");
    }
}
