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

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use tf_provider::{AttributePath, Diagnostics, Resource};
use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty, ValueString};

use crate::client::{RequestOpts, ServiceClient};
use crate::config::ConfigHandle;
use crate::error::{ApiError, IgnoreNotFound, Result};
use crate::job::{self, JobStatus, StatusSource, WaitOptions};
use crate::utils::{
    self, known, non_empty, parse_import_id, replace_if_changed, ExtractDiagnostics, Operation,
    WithSchema,
};

use super::state::ComponentState;
use crate::cae::job::{required_job_id, CaeJobs};
use crate::cae::{HEADER_ENVIRONMENT_ID, NOT_FOUND_CODES, SERVICE};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const IMPORT_FORMAT: &str = "<environment_id>/<application_id>/<id>";

fn required<'s>(value: &'s ValueString<'_>, name: &str) -> Result<&'s str> {
    non_empty(value).ok_or_else(|| ApiError::client(format!("{name} is not set")))
}

/// Location of a component
struct Component<'c> {
    client: &'c ServiceClient,
    environment_id: &'c str,
    application_id: &'c str,
}

impl<'c> Component<'c> {
    fn opts(&self) -> RequestOpts {
        RequestOpts::new().header(HEADER_ENVIRONMENT_ID, self.environment_id)
    }

    async fn get(&self, id: &str) -> Result<JsonValue> {
        let url = self.client.url(
            "v1/{project_id}/cae/applications/{application_id}/components/{component_id}",
            &[("application_id", self.application_id), ("component_id", id)],
        )?;
        self.client
            .get(url, self.opts().not_found_codes(NOT_FOUND_CODES))
            .await
    }
}

/// Completes once the component is not found anymore
#[async_trait]
impl StatusSource for Component<'_> {
    type Entity = ();

    async fn fetch(&self, id: &str) -> Result<JobStatus<()>> {
        match self.get(id).await {
            Ok(_) => Ok(JobStatus::Pending),
            Err(err) if err.is_not_found() => Ok(JobStatus::Succeeded(())),
            Err(err) => Err(err),
        }
    }

    fn subject(&self, id: &str) -> String {
        format!("the deletion of CAE component {id}")
    }
}

#[derive(Debug, Clone)]
pub struct ComponentResource {
    config: ConfigHandle,
}

impl ComponentResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn client(&self, state: &ComponentState<'_>) -> Result<ServiceClient> {
        let config = self.config.get()?;
        let region = config.region(non_empty(&state.region));
        config.new_service_client(SERVICE, region).await
    }

    async fn create_component<'a>(
        &self,
        mut state: ComponentState<'a>,
    ) -> Result<ComponentState<'a>> {
        let client = self.client(&state).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Create, DEFAULT_TIMEOUT)?;
        let environment_id = required(&state.environment_id, "environment_id")?.to_owned();
        let application_id = required(&state.application_id, "application_id")?.to_owned();
        let component = Component {
            client: &client,
            environment_id: &environment_id,
            application_id: &application_id,
        };

        let deploy = state.deploy_after_create.as_ref_option().copied().unwrap_or(false);
        let mut body = state.body()?;
        let template = if deploy {
            if let JsonValue::Object(fields) = &mut body {
                fields.insert(
                    "configurations".to_owned(),
                    JsonValue::Array(state.configurations_body()?),
                );
            }
            "v1/{project_id}/cae/applications/{application_id}/component-with-configurations"
        } else {
            "v1/{project_id}/cae/applications/{application_id}/components"
        };

        let url = client.url(template, &[("application_id", application_id.as_str())])?;
        let response = client.post(url, component.opts().body(body)).await?;
        let id = response
            .pointer("/metadata/id")
            .and_then(JsonValue::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(ApiError::MissingField("metadata.id"))?
            .to_owned();
        info!(%id, deploy, "CAE component created");

        if deploy {
            let job_id = required_job_id(&response)?;
            let jobs = CaeJobs::new(&client, &environment_id);
            let opts = WaitOptions::new(timeout)
                .delay(Duration::from_secs(20))
                .interval(Duration::from_secs(30));
            job::wait(&jobs, job_id, &opts).await?;
        }

        let remote = component.get(&id).await?;
        state.id = id.into();
        state.region = client.region().to_owned().into();
        state.apply(&remote);
        Ok(state)
    }

    async fn refresh<'a>(
        &self,
        mut state: ComponentState<'a>,
    ) -> Result<Option<ComponentState<'a>>> {
        let client = self.client(&state).await?;
        let component = Component {
            client: &client,
            environment_id: required(&state.environment_id, "environment_id")?,
            application_id: required(&state.application_id, "application_id")?,
        };
        let id = required(&state.id, "id")?;

        let Some(remote) = component.get(id).await.ignore_not_found()? else {
            info!(id, "CAE component is gone");
            return Ok(None);
        };
        state.region = client.region().to_owned().into();
        state.apply(&remote);
        Ok(Some(state))
    }

    async fn update_component<'a>(
        &self,
        mut state: ComponentState<'a>,
    ) -> Result<ComponentState<'a>> {
        let client = self.client(&state).await?;
        let environment_id = required(&state.environment_id, "environment_id")?.to_owned();
        let application_id = required(&state.application_id, "application_id")?.to_owned();
        let id = required(&state.id, "id")?.to_owned();
        let component = Component {
            client: &client,
            environment_id: &environment_id,
            application_id: &application_id,
        };

        let url = client.url(
            "v1/{project_id}/cae/applications/{application_id}/components/{component_id}",
            &[("application_id", application_id.as_str()), ("component_id", id.as_str())],
        )?;
        client.put(url, component.opts().body(state.body()?)).await?;

        let remote = component.get(&id).await?;
        state.apply(&remote);
        Ok(state)
    }

    async fn delete_component(&self, state: &ComponentState<'_>) -> Result<()> {
        let client = self.client(state).await?;
        let timeout = utils::timeout(&state.timeouts, Operation::Delete, DEFAULT_TIMEOUT)?;
        let component = Component {
            client: &client,
            environment_id: required(&state.environment_id, "environment_id")?,
            application_id: required(&state.application_id, "application_id")?,
        };
        let id = required(&state.id, "id")?;

        let url = client.url(
            "v1/{project_id}/cae/applications/{application_id}/components/{component_id}",
            &[("application_id", component.application_id), ("component_id", id)],
        )?;
        let deleted = client
            .delete(url, component.opts().not_found_codes(NOT_FOUND_CODES))
            .await
            .ignore_not_found()?;
        if deleted.is_none() {
            info!(id, "CAE component already deleted");
            return Ok(());
        }

        let opts = WaitOptions::new(timeout)
            .delay(Duration::from_secs(10))
            .interval(Duration::from_secs(20));
        job::wait(&component, id, &opts).await
    }
}

#[async_trait]
impl Resource for ComponentResource {
    type State<'a> = Value<ComponentState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ComponentState::schema())
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
            .extract_diagnostics(diags, "Unable to read the CAE component")?;
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
        state.created_at = Value::Unknown;
        state.updated_at = Value::Unknown;
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
        let mut state = known(proposed_state, diags)?;

        let mut trigger_replace = Vec::new();
        replace_if_changed(&mut trigger_replace, "region", &prior.region, &state.region);
        replace_if_changed(
            &mut trigger_replace,
            "environment_id",
            &prior.environment_id,
            &state.environment_id,
        );
        replace_if_changed(
            &mut trigger_replace,
            "application_id",
            &prior.application_id,
            &state.application_id,
        );
        replace_if_changed(
            &mut trigger_replace,
            "deploy_after_create",
            &prior.deploy_after_create,
            &state.deploy_after_create,
        );
        replace_if_changed(
            &mut trigger_replace,
            "configurations",
            &prior.configurations,
            &state.configurations,
        );

        if trigger_replace.is_empty()
            && (prior.metadata != state.metadata || prior.spec != state.spec)
        {
            state.updated_at = Value::Unknown;
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
            .create_component(state)
            .await
            .extract_diagnostics(diags, "Unable to create the CAE component")?;
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
        let mut state = known(planned_state, diags)?;

        if prior.metadata == state.metadata && prior.spec == state.spec {
            state.updated_at = prior.updated_at;
            return Some((Value::Value(state), planned_private_state));
        }

        let state = self
            .update_component(state)
            .await
            .extract_diagnostics(diags, "Unable to update the CAE component")?;
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
        self.delete_component(&state)
            .await
            .extract_diagnostics(diags, "Unable to delete the CAE component")
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let [environment_id, application_id, component_id] =
            parse_import_id::<3>(&id, IMPORT_FORMAT)
                .extract_diagnostics(diags, "Invalid import ID")?;
        let state = ComponentState {
            id: component_id.to_owned().into(),
            environment_id: environment_id.to_owned().into(),
            application_id: application_id.to_owned().into(),
            ..Default::default()
        };

        match self
            .refresh(state)
            .await
            .extract_diagnostics(diags, "Unable to import the CAE component")?
        {
            Some(state) => Some((Value::Value(state), Default::default())),
            None => {
                diags.root_error(
                    "Unable to import the CAE component",
                    format!("component {id} does not exist"),
                );
                None
            }
        }
    }
}
