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
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueMap, ValueString};

use crate::config::ConfigHandle;
use crate::error::Result;
use crate::utils::{
    non_empty, rfc3339, string_map_value, string_value, ExtractDiagnostics, WithSchema,
};

use super::environment::{list_environments, RemoteEnvironment};
use super::SERVICE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnvironmentItem<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub annotations: ValueMap<'a, ValueString<'a>>,
    pub status: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

impl<'a> From<RemoteEnvironment> for EnvironmentItem<'a> {
    fn from(remote: RemoteEnvironment) -> Self {
        Self {
            id: Value::Value(Cow::Owned(remote.id)),
            name: Value::Value(Cow::Owned(remote.name)),
            annotations: string_map_value(remote.annotations),
            status: string_value(remote.status),
            created_at: string_value(rfc3339(remote.created_at.as_ref())),
            updated_at: string_value(rfc3339(remote.updated_at.as_ref())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnvironmentsState<'a> {
    #[serde(borrow = "'a")]
    pub region: ValueString<'a>,
    pub environment_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub environments: ValueList<Value<EnvironmentItem<'a>>>,
}

impl<'a> WithSchema for EnvironmentsState<'a> {
    fn schema() -> Schema {
        let filter = |description: &str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        };
        let field = |attr_type: AttributeType, description: &str| Attribute {
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
                    "environment_id" => filter("Only keep the environment with this ID"),
                    "name" => filter("Only keep the environments with this name"),
                    "status" => filter("Only keep the environments with this status"),
                    "enterprise_project_id" => filter("Enterprise project to list the environments of"),
                    "environments" => Attribute {
                        attr_type: AttributeType::AttributeList(map! {
                            "id" => field(AttributeType::String, "ID of the environment"),
                            "name" => field(AttributeType::String, "Name of the environment"),
                            "annotations" => field(
                                AttributeType::Map(AttributeType::String.into()),
                                "Annotations of the environment",
                            ),
                            "status" => field(AttributeType::String, "Status of the environment"),
                            "created_at" => field(AttributeType::String, "Creation time, in RFC3339 format"),
                            "updated_at" => field(AttributeType::String, "Last update time, in RFC3339 format"),
                        }),
                        description: Description::plain("Matching environments"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Lists the CAE environments of a region"),
                ..Default::default()
            },
        }
    }
}

impl<'a> EnvironmentsState<'a> {
    fn matches(&self, environment: &RemoteEnvironment) -> bool {
        non_empty(&self.environment_id).map_or(true, |id| environment.id == id)
            && non_empty(&self.name).map_or(true, |name| environment.name == name)
            && non_empty(&self.status)
                .map_or(true, |status| environment.status.as_deref() == Some(status))
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentsDataSource {
    config: ConfigHandle,
}

impl EnvironmentsDataSource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn list<'a>(&self, mut state: EnvironmentsState<'a>) -> Result<EnvironmentsState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let enterprise_project_id =
            config.enterprise_project_id(non_empty(&state.enterprise_project_id));
        let client = config.new_service_client(SERVICE, &region).await?;

        let environments = list_environments(&client, enterprise_project_id.as_deref()).await?;
        let environments = environments
            .into_iter()
            .filter(|environment| state.matches(environment))
            .map(|environment| Value::Value(environment.into()))
            .collect();

        state.region = region.into();
        state.environments = Value::Value(environments);
        Ok(state)
    }
}

#[async_trait]
impl DataSource for EnvironmentsDataSource {
    type State<'a> = EnvironmentsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(EnvironmentsState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        self.list(config)
            .await
            .extract_diagnostics(diags, "Unable to list the CAE environments")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn remote(id: &str, name: &str, status: &str) -> RemoteEnvironment {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "status": status,
            "annotations": {"type": "exclusive"},
            "created_at": "2024-03-01 10:20:30",
        }))
        .unwrap()
    }

    #[test]
    fn filters() {
        let all = EnvironmentsState::default();
        assert!(all.matches(&remote("e-1", "prod", "finish")));

        let by_name = EnvironmentsState {
            name: Value::Value("prod".into()),
            ..Default::default()
        };
        assert!(by_name.matches(&remote("e-1", "prod", "finish")));
        assert!(!by_name.matches(&remote("e-2", "dev", "finish")));

        let by_status = EnvironmentsState {
            environment_id: Value::Value("e-1".into()),
            status: Value::Value("finish".into()),
            ..Default::default()
        };
        assert!(by_status.matches(&remote("e-1", "prod", "finish")));
        assert!(!by_status.matches(&remote("e-1", "prod", "creating")));
    }

    #[test]
    fn items() {
        let item = EnvironmentItem::from(remote("e-1", "prod", "finish"));
        assert_eq!(item.id.as_str(), "e-1");
        assert_eq!(item.created_at.as_str(), "2024-03-01T10:20:30Z");
        assert_eq!(
            item.annotations.as_ref_option().map(|annotations| annotations.len()),
            Some(1)
        );
    }
}
