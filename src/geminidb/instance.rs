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
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueEmpty, ValueMap, ValueNumber, ValueString};

use crate::client::RequestOpts;
use crate::config::ConfigHandle;
use crate::error::{ApiError, IgnoreNotFound, Result};
use crate::job;
use crate::tags::{self, Tags};
use crate::utils::{
    self, json_string, known, non_empty, replace_if_changed, rfc3339, string_value,
    ExtractDiagnostics, Operation, StateTimeouts, WithSchema,
};

use super::{GeminiDbJobs, Instance, SERVICE};

const CREATE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(120 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Days of the week the automated backups run on
const BACKUP_PERIOD: &str = "1,2,3,4,5,6,7";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InstanceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub datastore: Value<Datastore<'a>>,
    pub availability_zone: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub subnet_id: ValueString<'a>,
    pub security_group_id: ValueString<'a>,
    pub password: ValueString<'a>,
    pub mode: ValueString<'a>,
    pub flavor: Value<Flavor<'a>>,
    pub configuration_id: ValueString<'a>,
    pub port: ValueNumber,
    pub ssl_option: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub backup_strategy: Value<BackupStrategy<'a>>,
    pub enterprise_project_id: ValueString<'a>,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub status: ValueString<'a>,
    pub db_user_name: ValueString<'a>,
    pub created: ValueString<'a>,
    pub updated: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<StateTimeouts<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Datastore<'a> {
    #[serde(borrow = "'a")]
    #[serde(rename = "type")]
    pub engine: ValueString<'a>,
    pub storage_engine: ValueString<'a>,
    pub version: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Flavor<'a> {
    pub num: ValueNumber,
    pub size: ValueNumber,
    #[serde(borrow = "'a")]
    pub storage: ValueString<'a>,
    pub spec_code: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BackupStrategy<'a> {
    #[serde(borrow = "'a")]
    pub start_time: ValueString<'a>,
    pub keep_days: ValueNumber,
}

impl<'a> WithSchema for InstanceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};

        let attribute = |attr_type: AttributeType, description: &str, constraint| Attribute {
            attr_type,
            description: Description::plain(description),
            constraint,
            ..Default::default()
        };
        let string = |description: &str, constraint| {
            attribute(AttributeType::String, description, constraint)
        };
        let number = |description: &str, constraint| {
            attribute(AttributeType::Number, description, constraint)
        };

        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => string("ID of the instance", Computed),
                    "region" => string("Region of the instance, the provider region by default", OptionalComputed),
                    "name" => string("Name of the instance", Required),
                    "availability_zone" => string("Availability zones of the nodes, comma separated", Required),
                    "vpc_id" => string("VPC of the instance", Required),
                    "subnet_id" => string("Subnet of the instance", Required),
                    "security_group_id" => string("Security group of the instance", Required),
                    "password" => Attribute {
                        sensitive: true,
                        ..string("Password of the administrator", Required)
                    },
                    "mode" => string("Deployment mode, like `Cluster`", Required),
                    "configuration_id" => string("Parameter template applied to the instance", Optional),
                    "port" => number("Database port", OptionalComputed),
                    "ssl_option" => string("SSL, `on` or `off`", Optional),
                    "enterprise_project_id" => string("Enterprise project of the instance", OptionalComputed),
                    "tags" => attribute(
                        AttributeType::Map(AttributeType::String.into()),
                        "Tags of the instance",
                        Optional,
                    ),
                    "status" => string("Status of the instance", Computed),
                    "db_user_name" => string("Name of the administrator", Computed),
                    "created" => string("Creation time, in RFC3339 format", Computed),
                    "updated" => string("Last update time, in RFC3339 format", Computed),
                },
                blocks: map! {
                    "datastore" => NestedBlock::Single(Block {
                        attributes: map! {
                            "type" => string("Database type, like `cassandra` or `redis`", Required),
                            "storage_engine" => string("Storage engine, like `rocksDB`", Required),
                            "version" => string("Database version", OptionalComputed),
                        },
                        description: Description::plain("Database of the instance"),
                        ..Default::default()
                    }),
                    "flavor" => NestedBlock::Single(Block {
                        attributes: map! {
                            "num" => number("Number of nodes", Required),
                            "size" => number("Storage space, in GB", Required),
                            "storage" => string("Storage type, like `ULTRAHIGH`", Required),
                            "spec_code" => string("Resource specification code of the nodes", Required),
                        },
                        description: Description::plain("Nodes of the instance"),
                        ..Default::default()
                    }),
                    "backup_strategy" => NestedBlock::Optional(Block {
                        attributes: map! {
                            "start_time" => string("Backup window, like `08:15-09:15`", Required),
                            "keep_days" => number("Number of days backups are kept", OptionalComputed),
                        },
                        description: Description::plain("Automated backups"),
                        ..Default::default()
                    }),
                    "timeouts" => StateTimeouts::block(),
                },
                description: Description::plain("GeminiDB instance"),
                ..Default::default()
            },
        }
    }
}

/// Number returned either as a JSON number or as a string
fn number(value: Option<&JsonValue>) -> ValueNumber {
    match value {
        Some(JsonValue::Number(n)) => n.as_i64().into(),
        Some(JsonValue::String(s)) => s.parse().ok().into(),
        _ => Value::Null,
    }
}

fn text(value: Option<&JsonValue>) -> ValueString<'static> {
    json_string(value.filter(|value| value.as_str() != Some("")))
}

impl<'a> InstanceState<'a> {
    fn validate(&self, diags: &mut Diagnostics) {
        StateTimeouts::validate(&self.timeouts, diags);

        if let Some(ssl_option) = non_empty(&self.ssl_option) {
            if ssl_option != "on" && ssl_option != "off" {
                diags.error(
                    "Invalid SSL option",
                    format!("expected `on` or `off`, got {ssl_option:?}"),
                    AttributePath::new("ssl_option"),
                );
            }
        }
        if let Some(flavor) = self.flavor.as_ref_option() {
            for (name, value) in [("num", &flavor.num), ("size", &flavor.size)] {
                if matches!(value, Value::Value(n) if *n < 1) {
                    diags.error_short(
                        format!("flavor {name} must be positive"),
                        AttributePath::new("flavor").attribute(name),
                    );
                }
            }
        }
    }

    fn create_body(&self, region: &str, enterprise_project_id: Option<&str>) -> Result<JsonValue> {
        let datastore = self
            .datastore
            .as_ref_option()
            .ok_or_else(|| ApiError::client("the datastore block is missing"))?;
        let flavor = self
            .flavor
            .as_ref_option()
            .ok_or_else(|| ApiError::client("the flavor block is missing"))?;

        let mut datastore_body = json!({
            "type": non_empty(&datastore.engine),
            "storage_engine": non_empty(&datastore.storage_engine),
        });
        if let Some(version) = non_empty(&datastore.version) {
            datastore_body["version"] = version.into();
        }

        let mut body = json!({
            "name": non_empty(&self.name),
            "datastore": datastore_body,
            "region": region,
            "availability_zone": non_empty(&self.availability_zone),
            "vpc_id": non_empty(&self.vpc_id),
            "subnet_id": non_empty(&self.subnet_id),
            "security_group_id": non_empty(&self.security_group_id),
            "password": non_empty(&self.password),
            "mode": non_empty(&self.mode),
            "flavor": [{
                "num": flavor.num.as_ref_option().map(i64::to_string),
                "size": flavor.size.as_ref_option().map(i64::to_string),
                "storage": non_empty(&flavor.storage),
                "spec_code": non_empty(&flavor.spec_code),
            }],
        });
        if let Some(configuration_id) = non_empty(&self.configuration_id) {
            body["configuration_id"] = configuration_id.into();
        }
        if let Some(backup) = self.backup_strategy.as_ref_option() {
            let mut strategy = json!({ "start_time": non_empty(&backup.start_time) });
            if let Some(keep_days) = backup.keep_days.as_ref_option() {
                strategy["keep_days"] = (*keep_days).into();
            }
            body["backup_strategy"] = strategy;
        }
        if let Some(enterprise_project_id) = enterprise_project_id {
            body["enterprise_project_id"] = enterprise_project_id.into();
        }
        match non_empty(&self.ssl_option) {
            Some("on") => body["ssl_option"] = "1".into(),
            Some("off") => body["ssl_option"] = "0".into(),
            _ => (),
        }
        if let Some(port) = self.port.as_ref_option() {
            body["port"] = port.to_string().into();
        }
        Ok(body)
    }

    /// Update the state with an instance returned by the API
    ///
    /// The password, SSL option, configuration and flavor storage type are not returned, and are
    /// kept as declared.
    fn apply(&mut self, remote: &JsonValue) {
        let at = |pointer: &str| remote.pointer(pointer);

        self.name = text(at("/name"));
        let version = text(at("/datastore/version"));
        self.datastore = Value::Value(Datastore {
            engine: text(at("/datastore/type")),
            storage_engine: text(at("/engine")),
            version,
        });
        self.availability_zone = text(at("/availability_zone"));
        self.vpc_id = text(at("/vpc_id"));
        self.subnet_id = text(at("/subnet_id"));
        self.security_group_id = text(at("/security_group_id"));
        self.mode = text(at("/mode"));

        let nodes = at("/groups/0/nodes")
            .and_then(JsonValue::as_array)
            .map_or(0, Vec::len);
        let storage = self
            .flavor
            .as_ref_option()
            .map(|flavor| flavor.storage.clone())
            .unwrap_or_default();
        self.flavor = Value::Value(Flavor {
            num: Value::Value(i64::try_from(nodes).unwrap_or(i64::MAX)),
            size: number(at("/groups/0/volume/size")),
            storage,
            spec_code: text(at("/groups/0/nodes/0/spec_code")),
        });
        self.port = number(at("/port"));

        if self.backup_strategy.is_value() {
            if let Some(JsonValue::Object(_)) = at("/backup_strategy") {
                self.backup_strategy = Value::Value(BackupStrategy {
                    start_time: text(at("/backup_strategy/start_time")),
                    keep_days: number(at("/backup_strategy/keep_days")),
                });
            }
        }

        self.enterprise_project_id = text(at("/enterprise_project_id"));
        self.status = text(at("/status"));
        self.db_user_name = text(at("/db_user_name"));
        self.created = string_value(rfc3339(at("/created")));
        self.updated = string_value(rfc3339(at("/updated")));
    }
}

#[derive(Debug, Clone)]
pub struct InstanceResource {
    config: ConfigHandle,
}

impl InstanceResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    /// Fetch the instance and its tags into the state
    async fn load(instance: &Instance<'_>, state: &mut InstanceState<'_>) -> Result<()> {
        let (remote, remote_tags) = futures::try_join!(instance.get(), instance.tags())?;
        state.apply(&remote);
        state.tags = if remote_tags.is_empty() && !state.tags.is_value() {
            Value::Null
        } else {
            tags::to_state(remote_tags)
        };
        Ok(())
    }

    async fn create_instance<'a>(
        &self,
        mut state: InstanceState<'a>,
    ) -> Result<InstanceState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let enterprise_project_id =
            config.enterprise_project_id(non_empty(&state.enterprise_project_id));
        let client = config.new_service_client(SERVICE, &region).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Create, CREATE_TIMEOUT)?;

        let body = state.create_body(&region, enterprise_project_id.as_deref())?;
        let url = client.url("v3/{project_id}/instances", &[])?;
        let response = client.post(url, RequestOpts::new().body(body)).await?;
        let id = response
            .get("id")
            .and_then(JsonValue::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(ApiError::MissingField("id"))?
            .to_owned();
        let job_id = response
            .get("job_id")
            .and_then(JsonValue::as_str)
            .ok_or(ApiError::MissingField("job_id"))?;
        info!(%id, job_id, "GeminiDB instance requested");

        let jobs = GeminiDbJobs::new(&client);
        job::wait(&jobs, job_id, &GeminiDbJobs::wait_options(timeout)).await?;

        let instance = Instance {
            client: &client,
            id: &id,
        };
        instance
            .update_tags(&Tags::new(), &tags::from_state(&state.tags))
            .await?;

        state.id = Value::Value(Cow::Owned(id.clone()));
        state.region = region.into();
        Self::load(&instance, &mut state).await?;
        Ok(state)
    }

    async fn refresh<'a>(
        &self,
        mut state: InstanceState<'a>,
    ) -> Result<Option<InstanceState<'a>>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the instance ID is empty"))?
            .to_owned();
        let instance = Instance {
            client: &client,
            id: &id,
        };

        match Self::load(&instance, &mut state).await {
            Ok(()) => {
                state.region = region.into();
                Ok(Some(state))
            }
            Err(err) if err.is_not_found() => {
                info!(%id, "GeminiDB instance is gone");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn update_instance<'a>(
        &self,
        prior: &InstanceState<'_>,
        mut state: InstanceState<'a>,
    ) -> Result<InstanceState<'a>> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Update, UPDATE_TIMEOUT)?;
        let id = non_empty(&state.id)
            .ok_or_else(|| ApiError::client("the instance ID is empty"))?
            .to_owned();
        let instance = Instance {
            client: &client,
            id: &id,
        };
        let params = [("instance_id", id.as_str())];

        if prior.name != state.name {
            let body = json!({ "name": non_empty(&state.name) });
            instance
                .modify(
                    Method::PUT,
                    "v3/{project_id}/instances/{instance_id}/name",
                    &params,
                    body,
                    timeout,
                )
                .await?;
        }
        if prior.password != state.password {
            let body = json!({ "password": non_empty(&state.password) });
            instance
                .modify(
                    Method::PUT,
                    "v3/{project_id}/instances/{instance_id}/password",
                    &params,
                    body,
                    timeout,
                )
                .await?;
        }
        if prior.ssl_option != state.ssl_option {
            let body = json!({ "ssl_option": non_empty(&state.ssl_option) });
            instance
                .modify(
                    Method::POST,
                    "v3/{project_id}/instances/{instance_id}/ssl-option",
                    &params,
                    body,
                    timeout,
                )
                .await?;
        }
        if prior.port != state.port {
            if let Some(port) = state.port.as_ref_option() {
                let body = json!({ "port": port });
                instance
                    .modify(
                        Method::PUT,
                        "v3/{project_id}/instances/{instance_id}/port",
                        &params,
                        body,
                        timeout,
                    )
                    .await?;
            }
        }
        if prior.configuration_id != state.configuration_id {
            if let Some(configuration_id) = non_empty(&state.configuration_id) {
                let body = json!({ "instance_ids": [id] });
                instance
                    .modify(
                        Method::PUT,
                        "v3.1/{project_id}/configurations/{config_id}/apply",
                        &[("config_id", configuration_id)],
                        body,
                        timeout,
                    )
                    .await?;
            }
        }

        if let (Some(old), Some(new)) = (prior.flavor.as_ref_option(), state.flavor.as_ref_option())
        {
            let subnet_id = non_empty(&state.subnet_id);
            Self::resize(&instance, &params, old, new, subnet_id, timeout).await?;
        }

        if prior.security_group_id != state.security_group_id {
            let body = json!({ "security_group_id": non_empty(&state.security_group_id) });
            instance
                .modify(
                    Method::PUT,
                    "v3/{project_id}/instances/{instance_id}/security-group",
                    &params,
                    body,
                    timeout,
                )
                .await?;
        }
        if prior.backup_strategy != state.backup_strategy {
            if let Some(backup) = state.backup_strategy.as_ref_option() {
                let mut policy = json!({
                    "start_time": non_empty(&backup.start_time),
                    "period": BACKUP_PERIOD,
                });
                if let Some(keep_days) = backup.keep_days.as_ref_option() {
                    policy["keep_days"] = (*keep_days).into();
                }
                instance
                    .modify(
                        Method::PUT,
                        "v3/{project_id}/instances/{instance_id}/backups/policy",
                        &params,
                        json!({ "backup_policy": policy }),
                        timeout,
                    )
                    .await?;
            }
        }
        if prior.tags != state.tags {
            instance
                .update_tags(&tags::from_state(&prior.tags), &tags::from_state(&state.tags))
                .await?;
        }

        Self::load(&instance, &mut state).await?;
        Ok(state)
    }

    /// Grow the storage, change the node specification, then add or remove nodes
    async fn resize(
        instance: &Instance<'_>,
        params: &[(&str, &str)],
        old: &Flavor<'_>,
        new: &Flavor<'_>,
        subnet_id: Option<&str>,
        timeout: Duration,
    ) -> Result<()> {
        if old.size != new.size {
            if let Some(size) = new.size.as_ref_option() {
                instance
                    .modify(
                        Method::PUT,
                        "v3/{project_id}/instances/{instance_id}/volume",
                        params,
                        json!({ "size": size }),
                        timeout,
                    )
                    .await?;
            }
        }
        if old.spec_code != new.spec_code {
            if let Some(spec_code) = non_empty(&new.spec_code) {
                instance
                    .modify(
                        Method::PUT,
                        "v3/{project_id}/instances/{instance_id}/resize",
                        params,
                        json!({ "resize": { "target_spec_code": spec_code } }),
                        timeout,
                    )
                    .await?;
            }
        }

        let (Value::Value(old_num), Value::Value(new_num)) = (old.num, new.num) else {
            return Ok(());
        };
        if new_num > old_num {
            info!(id = instance.id, added = new_num - old_num, "adding GeminiDB nodes");
            instance
                .modify(
                    Method::POST,
                    "v3/{project_id}/instances/{instance_id}/enlarge-node",
                    params,
                    json!({ "num": new_num - old_num, "subnet_id": subnet_id }),
                    timeout,
                )
                .await?;
        }
        // Nodes are removed one at a time
        for _ in new_num..old_num {
            info!(id = instance.id, "removing a GeminiDB node");
            instance
                .modify(
                    Method::POST,
                    "v3/{project_id}/instances/{instance_id}/reduce-node",
                    params,
                    json!({ "num": 1 }),
                    timeout,
                )
                .await?;
        }
        Ok(())
    }

    async fn delete_instance(&self, state: &InstanceState<'_>) -> Result<()> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region)).to_owned();
        let client = config.new_service_client(SERVICE, &region).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Delete, DELETE_TIMEOUT)?;
        let id = non_empty(&state.id).ok_or_else(|| ApiError::client("the instance ID is empty"))?;
        let instance = Instance {
            client: &client,
            id,
        };

        let url = client.url(
            "v3/{project_id}/instances/{instance_id}",
            &[("instance_id", id)],
        )?;
        let response = instance
            .retry_when_busy(timeout, || client.delete(url.clone(), RequestOpts::new()))
            .await
            .ignore_not_found()?;
        let Some(response) = response else {
            info!(id, "GeminiDB instance already deleted");
            return Ok(());
        };

        let job_id = response
            .get("job_id")
            .and_then(JsonValue::as_str)
            .ok_or(ApiError::MissingField("job_id"))?;
        let jobs = GeminiDbJobs::new(&client);
        job::wait(&jobs, job_id, &GeminiDbJobs::wait_options(timeout)).await
    }
}

#[async_trait]
impl Resource for InstanceResource {
    type State<'a> = Value<InstanceState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InstanceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            config.validate(diags);
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
            .extract_diagnostics(diags, "Unable to read the GeminiDB instance")?;
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
        state.db_user_name = Value::Unknown;
        state.created = Value::Unknown;
        state.updated = Value::Unknown;
        if state.region.is_null() {
            state.region = Value::Unknown;
        }
        if state.enterprise_project_id.is_null() {
            state.enterprise_project_id = Value::Unknown;
        }
        if state.port.is_null() {
            state.port = Value::Unknown;
        }
        if let Value::Value(datastore) = &mut state.datastore {
            if datastore.version.is_null() {
                datastore.version = Value::Unknown;
            }
        }
        if let Value::Value(backup) = &mut state.backup_strategy {
            if backup.keep_days.is_null() {
                backup.keep_days = Value::Unknown;
            }
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
        let mut state = known(proposed_state, diags)?;

        let mut trigger_replace = Vec::new();
        replace_if_changed(&mut trigger_replace, "region", &prior.region, &state.region);
        replace_if_changed(&mut trigger_replace, "datastore", &prior.datastore, &state.datastore);
        replace_if_changed(
            &mut trigger_replace,
            "availability_zone",
            &prior.availability_zone,
            &state.availability_zone,
        );
        replace_if_changed(&mut trigger_replace, "vpc_id", &prior.vpc_id, &state.vpc_id);
        replace_if_changed(&mut trigger_replace, "subnet_id", &prior.subnet_id, &state.subnet_id);
        replace_if_changed(&mut trigger_replace, "mode", &prior.mode, &state.mode);
        replace_if_changed(
            &mut trigger_replace,
            "enterprise_project_id",
            &prior.enterprise_project_id,
            &state.enterprise_project_id,
        );

        // Storage type is the only part of the flavor that cannot change in place
        match (&prior.flavor, &state.flavor) {
            (Value::Value(old), Value::Value(new)) => {
                if old.storage != new.storage {
                    trigger_replace.push(AttributePath::new("flavor").attribute("storage"));
                }
            }
            (old, new) => replace_if_changed(&mut trigger_replace, "flavor", old, new),
        }

        if prior != state {
            state.status = Value::Unknown;
            state.updated = Value::Unknown;
        }
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
            .create_instance(state)
            .await
            .extract_diagnostics(diags, "Unable to create the GeminiDB instance")?;
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
            .update_instance(&prior, state)
            .await
            .extract_diagnostics(diags, "Unable to update the GeminiDB instance")?;
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
        self.delete_instance(&state)
            .await
            .extract_diagnostics(diags, "Unable to delete the GeminiDB instance")
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = InstanceState {
            id: id.clone().into(),
            ..Default::default()
        };
        match self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to import the GeminiDB instance")?
        {
            Some(state) => Some((Value::Value(state), Default::default())),
            None => {
                diags.root_error(
                    "Unable to import the GeminiDB instance",
                    format!("instance {id} does not exist"),
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

    fn declared() -> InstanceState<'static> {
        InstanceState {
            name: Value::Value("nosql".into()),
            datastore: Value::Value(Datastore {
                engine: Value::Value("cassandra".into()),
                storage_engine: Value::Value("rocksDB".into()),
                version: Value::Null,
            }),
            availability_zone: Value::Value("az-1".into()),
            vpc_id: Value::Value("vpc-1".into()),
            subnet_id: Value::Value("subnet-1".into()),
            security_group_id: Value::Value("sg-1".into()),
            password: Value::Value("Secret#123".into()),
            mode: Value::Value("Cluster".into()),
            flavor: Value::Value(Flavor {
                num: Value::Value(3),
                size: Value::Value(500),
                storage: Value::Value("ULTRAHIGH".into()),
                spec_code: Value::Value("geminidb.cassandra.xlarge.4".into()),
            }),
            ssl_option: Value::Value("on".into()),
            port: Value::Value(8635),
            backup_strategy: Value::Value(BackupStrategy {
                start_time: Value::Value("03:00-04:00".into()),
                keep_days: Value::Null,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn create_request() {
        let body = declared().create_body("cn-north-4", Some("eps-1")).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "nosql",
                "datastore": {"type": "cassandra", "storage_engine": "rocksDB"},
                "region": "cn-north-4",
                "availability_zone": "az-1",
                "vpc_id": "vpc-1",
                "subnet_id": "subnet-1",
                "security_group_id": "sg-1",
                "password": "Secret#123",
                "mode": "Cluster",
                "flavor": [{
                    "num": "3",
                    "size": "500",
                    "storage": "ULTRAHIGH",
                    "spec_code": "geminidb.cassandra.xlarge.4",
                }],
                "backup_strategy": {"start_time": "03:00-04:00"},
                "enterprise_project_id": "eps-1",
                "ssl_option": "1",
                "port": "8635",
            })
        );
    }

    #[test]
    fn apply_remote() {
        let mut state = declared();
        state.apply(&json!({
            "id": "i-1",
            "name": "nosql",
            "status": "normal",
            "engine": "rocksDB",
            "datastore": {"type": "cassandra", "version": "3.11"},
            "availability_zone": "az-1",
            "vpc_id": "vpc-1",
            "subnet_id": "subnet-1",
            "security_group_id": "sg-1",
            "mode": "Cluster",
            "port": "8635",
            "db_user_name": "rwuser",
            "enterprise_project_id": "0",
            "backup_strategy": {"start_time": "03:00-04:00", "keep_days": 7},
            "groups": [{
                "volume": {"size": "500", "used": "0.01"},
                "nodes": [
                    {"spec_code": "geminidb.cassandra.xlarge.4"},
                    {"spec_code": "geminidb.cassandra.xlarge.4"},
                    {"spec_code": "geminidb.cassandra.xlarge.4"},
                ],
            }],
            "created": "2024-03-01T10:20:30+0800",
            "updated": "2024-03-01 10:20:30",
        }));

        let expected = declared();
        assert_eq!(state.flavor, expected.flavor);
        assert_eq!(state.port, Value::Value(8635));
        assert_eq!(state.status.as_str(), "normal");
        assert_eq!(state.password, expected.password);
        assert_eq!(
            state.datastore.as_ref_option().map(|datastore| datastore.version.as_str()),
            Some("3.11")
        );
        assert_eq!(
            state.backup_strategy.as_ref_option().map(|backup| backup.keep_days.clone()),
            Some(Value::Value(7))
        );
        assert_eq!(state.created.as_str(), "2024-03-01T02:20:30Z");
        assert_eq!(state.updated.as_str(), "2024-03-01T10:20:30Z");
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        declared().validate(&mut diags);
        assert!(diags.errors.is_empty());

        let mut invalid = declared();
        invalid.ssl_option = Value::Value("maybe".into());
        if let Value::Value(flavor) = &mut invalid.flavor {
            flavor.num = Value::Value(0);
        }
        invalid.validate(&mut diags);
        assert_eq!(diags.errors.len(), 2);
    }

    async fn replaced_paths(
        prior: &InstanceState<'static>,
        proposed: &InstanceState<'static>,
    ) -> Vec<AttributePath> {
        let resource = InstanceResource::new(Default::default());
        let mut diags = Diagnostics::default();
        let (_, _, replace) = resource
            .plan_update(
                &mut diags,
                Value::Value(prior.clone()),
                Value::Value(proposed.clone()),
                Value::Value(proposed.clone()),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        replace
    }

    #[tokio::test]
    async fn flavor_resizes_in_place() {
        let prior = InstanceState {
            id: Value::Value("i-1".into()),
            ..declared()
        };
        let mut proposed = prior.clone();
        if let Value::Value(flavor) = &mut proposed.flavor {
            flavor.num = Value::Value(5);
            flavor.size = Value::Value(600);
            flavor.spec_code = Value::Value("geminidb.cassandra.2xlarge.4".into());
        }
        assert!(replaced_paths(&prior, &proposed).await.is_empty());

        if let Value::Value(flavor) = &mut proposed.flavor {
            flavor.storage = Value::Value("HIGH".into());
        }
        assert_eq!(
            replaced_paths(&prior, &proposed).await,
            vec![AttributePath::new("flavor").attribute("storage")]
        );
    }
}
