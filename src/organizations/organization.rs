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
use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{self, Value, ValueEmpty, ValueMap, ValueSet, ValueString};

use crate::config::ConfigHandle;
use crate::error::{ApiError, IgnoreNotFound, Result};
use crate::job::{self, WaitOptions};
use crate::tags;
use crate::utils::{
    self, known, non_empty, rfc3339, string_value, ExtractDiagnostics, Operation, StateTimeouts,
    WithSchema,
};

use super::{Organizations, RemoteOrganization, Root, RootPolicy, SERVICE};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrganizationState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub enabled_policy_types: ValueSet<ValueString<'a>>,
    pub root_tags: ValueMap<'a, ValueString<'a>>,
    pub urn: ValueString<'a>,
    pub master_account_id: ValueString<'a>,
    pub master_account_name: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub root_id: ValueString<'a>,
    pub root_name: ValueString<'a>,
    pub root_urn: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<StateTimeouts<'a>>,
}

impl<'a> WithSchema for OrganizationState<'a> {
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
                    "id" => computed("ID of the organization"),
                    "enabled_policy_types" => Attribute {
                        attr_type: AttributeType::Set(AttributeType::String.into()),
                        description: Description::plain("Policy types to enable in the root"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "root_tags" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Tags of the root"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "urn" => computed("Uniform resource name of the organization"),
                    "master_account_id" => computed("ID of the management account"),
                    "master_account_name" => computed("Name of the management account"),
                    "created_at" => computed("Creation time, in RFC3339 format"),
                    "root_id" => computed("ID of the root"),
                    "root_name" => computed("Name of the root"),
                    "root_urn" => computed("Uniform resource name of the root"),
                },
                blocks: map! {
                    "timeouts" => StateTimeouts::block(),
                },
                description: Description::plain("Organization of the current account"),
                ..Default::default()
            },
        }
    }
}

impl<'a> OrganizationState<'a> {
    fn policy_types(&self) -> BTreeSet<String> {
        self.enabled_policy_types
            .iter()
            .flatten()
            .filter_map(|policy_type| Some(policy_type.as_ref_option()?.to_string()))
            .collect()
    }

    fn apply(&mut self, organization: RemoteOrganization, root: Root) {
        let enabled = root
            .enabled_policy_types()
            .map(|policy_type| Value::Value(Cow::Owned(policy_type.to_owned())))
            .collect::<BTreeSet<_>>();

        self.id = Value::Value(Cow::Owned(organization.id));
        self.urn = string_value(organization.urn);
        self.master_account_id = string_value(organization.management_account_id);
        self.master_account_name = string_value(organization.management_account_name);
        self.created_at = string_value(rfc3339(organization.created_at.as_ref()));
        self.enabled_policy_types = if enabled.is_empty() && !self.enabled_policy_types.is_value() {
            Value::Null
        } else {
            Value::Value(enabled)
        };
        self.root_id = Value::Value(Cow::Owned(root.id));
        self.root_name = string_value(root.name);
        self.root_urn = string_value(root.urn);
    }
}

#[derive(Debug, Clone)]
pub struct OrganizationResource {
    config: ConfigHandle,
}

impl OrganizationResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn set_policies<'p>(
        organizations: Organizations<'_>,
        root_id: &str,
        policy_types: impl IntoIterator<Item = &'p String>,
        enabled: bool,
        timeout: Duration,
    ) -> Result<()> {
        let policy = RootPolicy {
            organizations,
            enabled,
        };
        let opts = WaitOptions::new(timeout)
            .delay(Duration::from_secs(1))
            .interval(Duration::from_secs(1));
        for policy_type in policy_types {
            organizations
                .request_policy(root_id, policy_type, enabled)
                .await?;
            job::wait(&policy, policy_type, &opts).await?;
            info!(root_id, %policy_type, enabled, "root policy type updated");
        }
        Ok(())
    }

    async fn create_organization<'a>(
        &self,
        state: OrganizationState<'a>,
    ) -> Result<OrganizationState<'a>> {
        let config = self.config.get()?;
        let client = config
            .new_service_client(SERVICE, config.provider_region())
            .await?;
        let organizations = Organizations { client: &client };
        let timeout = utils::timeout(&state.timeouts, Operation::Create, DEFAULT_TIMEOUT)?;

        let id = organizations.create().await?;
        info!(%id, "organization created");

        let root = organizations.root().await?;
        let declared = tags::from_state(&state.root_tags);
        organizations
            .update_root_tags(&root.id, &tags::Tags::new(), &declared)
            .await?;
        Self::set_policies(organizations, &root.id, &state.policy_types(), true, timeout).await?;

        let mut state = state;
        state.id = id.into();
        self.refresh(state)
            .await?
            .ok_or_else(|| ApiError::client("the organization disappeared after its creation"))
    }

    async fn refresh<'a>(
        &self,
        mut state: OrganizationState<'a>,
    ) -> Result<Option<OrganizationState<'a>>> {
        let config = self.config.get()?;
        let client = config
            .new_service_client(SERVICE, config.provider_region())
            .await?;
        let organizations = Organizations { client: &client };

        let Some((organization, root)) =
            futures::try_join!(organizations.get(), organizations.root()).ignore_not_found()?
        else {
            info!("organization is gone");
            return Ok(None);
        };
        if let Some(id) = non_empty(&state.id) {
            if id != organization.id {
                info!(id, current = %organization.id, "organization was replaced");
                return Ok(None);
            }
        }

        match organizations.root_tags(&root.id).await {
            Ok(remote) if remote.is_empty() && !state.root_tags.is_value() => {}
            Ok(remote) => state.root_tags = tags::to_state(remote),
            Err(err) => warn!(root_id = %root.id, %err, "unable to fetch the root tags"),
        }
        state.apply(organization, root);
        Ok(Some(state))
    }

    async fn update_organization<'a>(
        &self,
        prior: &OrganizationState<'_>,
        state: OrganizationState<'a>,
    ) -> Result<OrganizationState<'a>> {
        let config = self.config.get()?;
        let client = config
            .new_service_client(SERVICE, config.provider_region())
            .await?;
        let organizations = Organizations { client: &client };
        let timeout = utils::timeout(&state.timeouts, Operation::Update, DEFAULT_TIMEOUT)?;
        let root = organizations.root().await?;

        organizations
            .update_root_tags(
                &root.id,
                &tags::from_state(&prior.root_tags),
                &tags::from_state(&state.root_tags),
            )
            .await?;

        let old = prior.policy_types();
        let new = state.policy_types();
        Self::set_policies(organizations, &root.id, new.difference(&old), true, timeout).await?;
        Self::set_policies(organizations, &root.id, old.difference(&new), false, timeout).await?;

        self.refresh(state)
            .await?
            .ok_or_else(|| ApiError::client("the organization disappeared during its update"))
    }

    async fn delete_organization(&self) -> Result<()> {
        let config = self.config.get()?;
        let client = config
            .new_service_client(SERVICE, config.provider_region())
            .await?;
        let organizations = Organizations { client: &client };
        if organizations.delete().await.ignore_not_found()?.is_none() {
            info!("organization already deleted");
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for OrganizationResource {
    type State<'a> = Value<OrganizationState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(OrganizationState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            StateTimeouts::validate(&config.timeouts, diags);
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
            .extract_diagnostics(diags, "Unable to read the organization")?;
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
        state.urn = Value::Unknown;
        state.master_account_id = Value::Unknown;
        state.master_account_name = Value::Unknown;
        state.created_at = Value::Unknown;
        state.root_id = Value::Unknown;
        state.root_name = Value::Unknown;
        state.root_urn = Value::Unknown;
        Some((Value::Value(state), Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let state = known(proposed_state, diags)?;
        Some((Value::Value(state), prior_private_state, Vec::new()))
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
            .extract_diagnostics(diags, "Unable to create the organization")?;
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
        let state = self
            .update_organization(&prior, state)
            .await
            .extract_diagnostics(diags, "Unable to update the organization")?;
        Some((Value::Value(state), planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        self.delete_organization()
            .await
            .extract_diagnostics(diags, "Unable to delete the organization")
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = OrganizationState {
            id: id.clone().into(),
            ..Default::default()
        };
        match self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to import the organization")?
        {
            Some(state) => Some((Value::Value(state), Default::default())),
            None => {
                diags.root_error(
                    "Unable to import the organization",
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
    use serde_json::json;

    use super::*;

    #[test]
    fn apply_remote() {
        let mut state = OrganizationState {
            enabled_policy_types: Value::Value(
                [Value::Value(Cow::from("service_control_policy"))].into(),
            ),
            ..Default::default()
        };
        let organization: RemoteOrganization = serde_json::from_value(json!({
            "id": "o-1",
            "urn": "organizations::1:organization:o-1",
            "management_account_id": "a-1",
            "management_account_name": "admin",
            "created_at": "2024-03-01T10:20:30Z",
        }))
        .unwrap();
        let root: Root = serde_json::from_value(json!({
            "id": "r-1",
            "name": "Root",
            "policy_types": [
                {"type": "service_control_policy", "status": "enabled"},
                {"type": "tag_policy", "status": "disabled"},
            ],
        }))
        .unwrap();

        state.apply(organization, root);
        assert_eq!(state.id.as_str(), "o-1");
        assert_eq!(state.root_id.as_str(), "r-1");
        assert_eq!(state.root_urn, Value::Null);
        assert_eq!(
            state.policy_types(),
            BTreeSet::from(["service_control_policy".to_owned()])
        );
    }
}
