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

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tf_provider::{map, AttributePath, Diagnostics};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueBool, ValueMap, ValueNumber, ValueSet, ValueString};

use crate::error::{ApiError, Result};
use crate::utils::{
    json_string, non_empty, rfc3339, string_map, string_value, StateTimeouts, WithSchema,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComponentState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub environment_id: ValueString<'a>,
    pub application_id: ValueString<'a>,
    pub metadata: Value<ComponentMetadata<'a>>,
    pub spec: Value<ComponentSpec<'a>>,
    pub deploy_after_create: ValueBool,
    pub configurations: ValueSet<Value<ComponentConfiguration<'a>>>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<StateTimeouts<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComponentMetadata<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub annotations: ValueMap<'a, ValueString<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComponentSpec<'a> {
    pub replica: ValueNumber,
    #[serde(borrow = "'a")]
    pub runtime: ValueString<'a>,
    pub source: Value<ComponentSource<'a>>,
    pub resource_limit: Value<ResourceLimit<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub build: Value<ComponentBuild<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComponentSource<'a> {
    #[serde(borrow = "'a")]
    #[serde(rename = "type")]
    pub source_type: ValueString<'a>,
    pub url: ValueString<'a>,
    pub sub_type: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub code: Value<SourceCode<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourceCode<'a> {
    #[serde(borrow = "'a")]
    pub auth_name: ValueString<'a>,
    pub branch: ValueString<'a>,
    pub namespace: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceLimit<'a> {
    #[serde(borrow = "'a")]
    pub cpu: ValueString<'a>,
    pub memory: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComponentBuild<'a> {
    #[serde(borrow = "'a")]
    pub archive: Value<BuildArchive<'a>>,
    pub parameters: ValueMap<'a, ValueString<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildArchive<'a> {
    #[serde(borrow = "'a")]
    pub artifact_namespace: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ComponentConfiguration<'a> {
    #[serde(borrow = "'a")]
    #[serde(rename = "type")]
    pub config_type: ValueString<'a>,
    pub data: ValueString<'a>,
}

fn string(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

impl<'a> WithSchema for ComponentState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};

        let source = Block {
            attributes: map! {
                "type" => string("Source type, like `code` or `image`", Required),
                "url" => string("URL of the source", Required),
                "sub_type" => string("Sub type of the source, like `GitHub` or `GitLab`", Optional),
            },
            blocks: map! {
                "code" => NestedBlock::Optional(Block {
                    attributes: map! {
                        "auth_name" => string("Authorization name of the repository", Required),
                        "branch" => string("Branch to build", Required),
                        "namespace" => string("Namespace of the repository", Required),
                    },
                    description: Description::plain("Code repository of the source"),
                    ..Default::default()
                }),
            },
            description: Description::plain("Source of the component"),
            ..Default::default()
        };
        let build = Block {
            attributes: map! {
                "parameters" => Attribute {
                    attr_type: AttributeType::Map(AttributeType::String.into()),
                    description: Description::plain("Build parameters"),
                    constraint: Required,
                    ..Default::default()
                },
            },
            blocks: map! {
                "archive" => NestedBlock::Single(Block {
                    attributes: map! {
                        "artifact_namespace" => string("SWR organization receiving the built image", Required),
                    },
                    description: Description::plain("Archive of the build"),
                    ..Default::default()
                }),
            },
            description: Description::plain("Build of the component"),
            ..Default::default()
        };

        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => string("ID of the component", Computed),
                    "region" => string("Region of the component, the provider region by default", OptionalComputed),
                    "environment_id" => string("Environment of the component", Required),
                    "application_id" => string("Application of the component", Required),
                    "deploy_after_create" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Deploy the component once created"),
                        constraint: Optional,
                        ..Default::default()
                    },
                    "created_at" => string("Creation time, in RFC3339 format", Computed),
                    "updated_at" => string("Last update time, in RFC3339 format", Computed),
                },
                blocks: map! {
                    "metadata" => NestedBlock::Single(Block {
                        attributes: map! {
                            "name" => string("Name of the component", Required),
                            "annotations" => Attribute {
                                attr_type: AttributeType::Map(AttributeType::String.into()),
                                description: Description::plain("Annotations of the component"),
                                constraint: Required,
                                ..Default::default()
                            },
                        },
                        description: Description::plain("Metadata of the component"),
                        ..Default::default()
                    }),
                    "spec" => NestedBlock::Single(Block {
                        attributes: map! {
                            "replica" => Attribute {
                                attr_type: AttributeType::Number,
                                description: Description::plain("Number of instances"),
                                constraint: Required,
                                ..Default::default()
                            },
                            "runtime" => string("Runtime of the component, like `Docker` or `Java8`", Required),
                        },
                        blocks: map! {
                            "source" => NestedBlock::Single(source),
                            "resource_limit" => NestedBlock::Single(Block {
                                attributes: map! {
                                    "cpu" => string("CPU limit, like `500m`", Required),
                                    "memory" => string("Memory limit, like `1Gi`", Required),
                                },
                                description: Description::plain("Resources of each instance"),
                                ..Default::default()
                            }),
                            "build" => NestedBlock::Optional(build),
                        },
                        description: Description::plain("Specification of the component"),
                        ..Default::default()
                    }),
                    "configurations" => NestedBlock::Set(Block {
                        attributes: map! {
                            "type" => string("Type of the configuration", Required),
                            "data" => string("Configuration content, in JSON format", Required),
                        },
                        description: Description::plain("Configurations applied when deploying after creation"),
                        ..Default::default()
                    }),
                    "timeouts" => StateTimeouts::block(),
                },
                description: Description::plain("CAE component"),
                ..Default::default()
            },
        }
    }
}

/// JSON object keeping only the set fields
fn object<'k>(fields: impl IntoIterator<Item = (&'k str, Option<JsonValue>)>) -> JsonValue {
    JsonValue::Object(
        fields
            .into_iter()
            .filter_map(|(key, value)| Some((key.to_owned(), value?)))
            .collect(),
    )
}

fn text(value: &ValueString<'_>) -> Option<JsonValue> {
    non_empty(value).map(JsonValue::from)
}

/// Empty strings returned by the API are absent values
fn optional(value: Option<&JsonValue>) -> ValueString<'static> {
    json_string(value.filter(|value| value.as_str() != Some("")))
}

impl<'a> ComponentSpec<'a> {
    fn body(&self) -> JsonValue {
        let source = self.source.as_ref_option().map(|source| {
            object([
                ("type", text(&source.source_type)),
                ("url", text(&source.url)),
                ("sub_type", text(&source.sub_type)),
                (
                    "code",
                    source.code.as_ref_option().map(|code| {
                        object([
                            ("auth_name", text(&code.auth_name)),
                            ("branch", text(&code.branch)),
                            ("namespace", text(&code.namespace)),
                        ])
                    }),
                ),
            ])
        });
        let resource_limit = self.resource_limit.as_ref_option().map(|limit| {
            object([
                ("cpu_limit", text(&limit.cpu)),
                ("memory_limit", text(&limit.memory)),
            ])
        });
        let build = self.build.as_ref_option().map(|build| {
            object([
                (
                    "archive",
                    build.archive.as_ref_option().map(|archive| {
                        object([("artifact_namespace", text(&archive.artifact_namespace))])
                    }),
                ),
                ("parameters", Some(json!(string_map(&build.parameters)))),
            ])
        });

        object([
            ("replica", self.replica.as_ref_option().copied().map(JsonValue::from)),
            ("runtime", text(&self.runtime)),
            ("source", source),
            ("resource_limit", resource_limit),
            ("build", build),
        ])
    }

    /// Rebuild the specification from the API, keeping the write-only build parameters
    fn from_remote(remote: &JsonValue, parameters: ValueMap<'a, ValueString<'a>>) -> Self {
        let at = |pointer: &str| remote.pointer(pointer);

        let source = match at("/source") {
            Some(JsonValue::Object(_)) => {
                let code = SourceCode {
                    auth_name: optional(at("/source/code/auth_name")),
                    branch: optional(at("/source/code/branch")),
                    namespace: optional(at("/source/code/namespace")),
                };
                let has_code = code.auth_name.is_value()
                    || code.branch.is_value()
                    || code.namespace.is_value();
                Value::Value(ComponentSource {
                    source_type: optional(at("/source/type")),
                    url: optional(at("/source/url")),
                    sub_type: optional(at("/source/sub_type")),
                    code: if has_code { Value::Value(code) } else { Value::Null },
                })
            }
            _ => Value::Null,
        };
        let resource_limit = match at("/resource_limit") {
            Some(JsonValue::Object(_)) => Value::Value(ResourceLimit {
                cpu: optional(at("/resource_limit/cpu_limit")),
                memory: optional(at("/resource_limit/memory_limit")),
            }),
            _ => Value::Null,
        };
        let archive = match at("/build/archive") {
            Some(JsonValue::Object(_)) => Value::Value(BuildArchive {
                artifact_namespace: optional(at("/build/archive/artifact_namespace")),
            }),
            _ => Value::Null,
        };
        let build = if archive.is_value() || parameters.is_value() {
            Value::Value(ComponentBuild {
                archive,
                parameters,
            })
        } else {
            Value::Null
        };

        Self {
            replica: at("/replica").and_then(JsonValue::as_i64).into(),
            runtime: optional(at("/runtime")),
            source,
            resource_limit,
            build,
        }
    }
}

impl<'a> ComponentState<'a> {
    pub(super) fn validate(&self, diags: &mut Diagnostics) {
        StateTimeouts::validate(&self.timeouts, diags);

        for configuration in self.configurations.iter().flatten() {
            let Some(configuration) = configuration.as_ref_option() else {
                continue;
            };
            let Some(data) = configuration.data.as_ref_option() else {
                continue;
            };
            if let Err(err) = serde_json::from_str::<JsonValue>(data) {
                diags.error(
                    "Invalid configuration data",
                    format!(
                        "the data of a {} configuration is not valid JSON: {err}",
                        configuration.config_type.as_str()
                    ),
                    AttributePath::new("configurations"),
                );
            }
        }
    }

    /// Body of the create and update requests
    pub(super) fn body(&self) -> Result<JsonValue> {
        let metadata = self
            .metadata
            .as_ref_option()
            .ok_or_else(|| ApiError::client("the metadata block is missing"))?;
        let spec = self
            .spec
            .as_ref_option()
            .ok_or_else(|| ApiError::client("the spec block is missing"))?;

        Ok(json!({
            "api_version": "v1",
            "kind": "Component",
            "metadata": {
                "name": non_empty(&metadata.name),
                "annotations": string_map(&metadata.annotations),
            },
            "spec": spec.body(),
        }))
    }

    /// Configurations sent with a deployment, their data decoded from JSON
    pub(super) fn configurations_body(&self) -> Result<Vec<JsonValue>> {
        self.configurations
            .iter()
            .flatten()
            .filter_map(Value::as_ref_option)
            .map(|configuration| {
                let data = configuration.data.as_str();
                let data = serde_json::from_str::<JsonValue>(data).map_err(|err| {
                    ApiError::client(format!("invalid configuration data {data:?}: {err}"))
                })?;
                Ok(json!({
                    "type": configuration.config_type.as_str(),
                    "data": data,
                }))
            })
            .collect()
    }

    /// Update the state with a component returned by the API
    ///
    /// Annotations and build parameters are not returned by the service, and are kept as
    /// declared.
    pub(super) fn apply(&mut self, remote: &JsonValue) {
        let at = |pointer: &str| remote.pointer(pointer);

        if let Some(environment_id) = at("/spec/env_id").and_then(JsonValue::as_str) {
            self.environment_id = environment_id.to_owned().into();
        }

        let annotations = self
            .metadata
            .as_ref_option()
            .map(|metadata| metadata.annotations.clone())
            .unwrap_or_default();
        self.metadata = Value::Value(ComponentMetadata {
            name: json_string(at("/metadata/name")),
            annotations,
        });

        let parameters = self
            .spec
            .as_ref_option()
            .and_then(|spec| spec.build.as_ref_option())
            .map(|build| build.parameters.clone())
            .unwrap_or_default();
        self.spec = match at("/spec") {
            Some(spec) => Value::Value(ComponentSpec::from_remote(spec, parameters)),
            None => Value::Null,
        };

        self.created_at = string_value(rfc3339(at("/metadata/created_at")));
        self.updated_at = string_value(rfc3339(at("/metadata/updated_at")));
    }
}
