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
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};

use crate::config::ConfigHandle;
use crate::error::Result;
use crate::utils::{non_empty, string_value, ExtractDiagnostics, WithSchema};

use super::{login_server, Namespace, Namespaces, SERVICE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SwrOrganizationItem<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub creator: ValueString<'a>,
    pub permission: ValueString<'a>,
    pub login_server: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SwrOrganizationsState<'a> {
    #[serde(borrow = "'a")]
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub organizations: ValueList<Value<SwrOrganizationItem<'a>>>,
}

impl<'a> WithSchema for SwrOrganizationsState<'a> {
    fn schema() -> Schema {
        let field = |description: &str| Attribute {
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
                    "region" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Region to query, the provider region by default"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Only keep the organization with this name"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "organizations" => Attribute {
                        attr_type: AttributeType::AttributeList(map! {
                            "name" => field("Name of the organization"),
                            "creator" => field("User who created the organization"),
                            "permission" => field("Permission of the current user"),
                            "login_server" => field("Address of the registry hosting the organization"),
                        }),
                        description: Description::plain("Matching organizations"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Lists the SWR organizations of a region"),
                ..Default::default()
            },
        }
    }
}

impl<'a> SwrOrganizationItem<'a> {
    fn new(namespace: Namespace, login_server: &str) -> Self {
        Self {
            permission: string_value(namespace.permission().map(str::to_owned)),
            creator: string_value(namespace.creator_name),
            name: Value::Value(Cow::Owned(namespace.name)),
            login_server: Value::Value(Cow::Owned(login_server.to_owned())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwrOrganizationsDataSource {
    config: ConfigHandle,
}

impl SwrOrganizationsDataSource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn list<'a>(
        &self,
        mut state: SwrOrganizationsState<'a>,
    ) -> Result<SwrOrganizationsState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let login_server = login_server(&region, config.cloud());

        let namespaces = Namespaces { client: &client }.list().await?;
        let filter = non_empty(&state.name);
        let organizations = namespaces
            .into_iter()
            .filter(|namespace| filter.map_or(true, |name| namespace.name == name))
            .map(|namespace| Value::Value(SwrOrganizationItem::new(namespace, &login_server)))
            .collect();

        state.region = region.into();
        state.organizations = Value::Value(organizations);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for SwrOrganizationsDataSource {
    type State<'a> = SwrOrganizationsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SwrOrganizationsState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        self.list(config)
            .await
            .extract_diagnostics(diags, "Unable to list the SWR organizations")
    }
}
