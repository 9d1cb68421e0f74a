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
use tf_provider::{map, DataSource, Diagnostics};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueNumber, ValueString};

use crate::config::ConfigHandle;
use crate::error::Result;
use crate::utils::{non_empty, string_value, ExtractDiagnostics, WithSchema};

use super::{HostGroups, RemoteHostGroup, SERVICE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HostGroupItem<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub host_num: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HostGroupsState<'a> {
    #[serde(borrow = "'a")]
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub groups: ValueList<Value<HostGroupItem<'a>>>,
}

impl<'a> WithSchema for HostGroupsState<'a> {
    fn schema() -> Schema {
        let field = |attr_type, description: &str| Attribute {
            attr_type,
            description: Description::plain(description),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region to query, the provider region by default"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Only keep the groups with this name"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "groups" => Attribute {
                        attr_type: AttributeType::AttributeList(map! {
                            "id" => field(AttributeType::String, "ID of the host group"),
                            "name" => field(AttributeType::String, "Name of the host group"),
                            "host_num" => field(AttributeType::Number, "Number of hosts in the group"),
                        }),
                        description: Description::plain("Matching host groups"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Lists the CodeArts Inspector host groups"),
                ..Default::default()
            },
        }
    }
}

impl<'a> From<RemoteHostGroup> for HostGroupItem<'a> {
    fn from(group: RemoteHostGroup) -> Self {
        Self {
            id: Value::Value(Cow::Owned(group.id)),
            name: string_value(group.name),
            host_num: group.host_num.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostGroupsDataSource {
    config: ConfigHandle,
}

impl HostGroupsDataSource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn list<'a>(&self, mut state: HostGroupsState<'a>) -> Result<HostGroupsState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;

        let remote = HostGroups { client: &client }.list().await?;
        let filter = non_empty(&state.name);
        let groups = remote
            .into_iter()
            .filter(|group| filter.map_or(true, |name| group.name.as_deref() == Some(name)))
            .map(|group| Value::Value(group.into()))
            .collect();

        state.region = region.into();
        state.groups = Value::Value(groups);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for HostGroupsDataSource {
    type State<'a> = HostGroupsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(HostGroupsState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        self.list(config)
            .await
            .extract_diagnostics(diags, "Unable to list the host groups")
    }
}
