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

//! Provider schema, configuration and resource registration

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::{
    map, AttributePath, Diagnostics, DynamicDataSource, DynamicResource, Provider,
};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueMap, ValueNumber, ValueString};
use tracing::debug;

use crate::cae::{ComponentResource, EnvironmentResource, EnvironmentsDataSource};
use crate::codearts_inspector::{HostGroupResource, HostGroupsDataSource};
use crate::config::{self, Config, ConfigHandle, Settings};
use crate::geminidb::InstanceResource;
use crate::organizations::OrganizationResource;
use crate::sdrs::ProtectionGroupResource;
use crate::swr::{SwrOrganizationResource, SwrOrganizationsDataSource};
use crate::utils::{non_empty, ExtractDiagnostics, WithSchema};

/// Content of the `provider "huaweicloud"` block
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub region: ValueString<'a>,
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub security_token: ValueString<'a>,
    pub token: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub cloud: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub insecure: ValueBool,
    pub max_retries: ValueNumber,
    pub endpoints: ValueMap<'a, ValueString<'a>>,
}

impl<'a> WithSchema for ProviderConfig<'a> {
    fn schema() -> Schema {
        let string = |description: &str, sensitive: bool| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Optional,
            sensitive,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "region" => string("Region used by default, falls back to HW_REGION_NAME", false),
                    "access_key" => string("Access key of the AK/SK pair, falls back to HW_ACCESS_KEY", true),
                    "secret_key" => string("Secret key of the AK/SK pair, falls back to HW_SECRET_KEY", true),
                    "security_token" => string("Security token of temporary AK/SK credentials", true),
                    "token" => string("IAM token, used when no AK/SK is configured", true),
                    "project_id" => string("Project of the default region", false),
                    "domain_id" => string("Account (domain) ID, sent to global services", false),
                    "cloud" => string("Domain name of the cloud, myhuaweicloud.com by default", false),
                    "enterprise_project_id" => string("Enterprise project used by default", false),
                    "insecure" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Skip the verification of TLS certificates"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "max_retries" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain(
                            "Number of retries of throttled or unreachable requests",
                        ),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "endpoints" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Custom endpoints, by service"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("HuaweiCloud"),
                ..Default::default()
            },
        }
    }
}

fn owned(value: &ValueString<'_>) -> Option<String> {
    non_empty(value).map(str::to_owned)
}

impl<'a> ProviderConfig<'a> {
    fn validate(&self, diags: &mut Diagnostics) {
        if let Value::Value(max_retries) = self.max_retries {
            if u32::try_from(max_retries).is_err() {
                diags.error(
                    "Invalid max_retries",
                    format!("max_retries must be a positive integer, got {max_retries}"),
                    AttributePath::new("max_retries"),
                );
            }
        }

        let known = |value: &ValueString| !value.is_unknown();
        if known(&self.access_key) && known(&self.secret_key) {
            match (non_empty(&self.access_key), non_empty(&self.secret_key)) {
                (Some(_), None) => diags.error(
                    "Incomplete credentials",
                    "access_key is set without secret_key",
                    AttributePath::new("secret_key"),
                ),
                (None, Some(_)) => diags.error(
                    "Incomplete credentials",
                    "secret_key is set without access_key",
                    AttributePath::new("access_key"),
                ),
                _ => (),
            }
        }

        for (key, endpoint) in self.endpoints.iter().flatten() {
            let attr_path = AttributePath::new("endpoints").key(key.to_string());
            if let Err(err) = config::service(key) {
                diags.error("Unknown service", err.to_string(), attr_path.clone());
            }
            if let Some(endpoint) = endpoint.as_ref_option() {
                if let Err(err) = config::parse_endpoint(endpoint) {
                    diags.error("Invalid endpoint", err.to_string(), attr_path);
                }
            }
        }
    }

    fn settings(&self) -> Settings {
        Settings {
            region: owned(&self.region),
            access_key: owned(&self.access_key),
            secret_key: owned(&self.secret_key),
            security_token: owned(&self.security_token),
            token: owned(&self.token),
            project_id: owned(&self.project_id),
            domain_id: owned(&self.domain_id),
            cloud: owned(&self.cloud),
            enterprise_project_id: owned(&self.enterprise_project_id),
            insecure: self.insecure.as_option(),
            max_retries: self
                .max_retries
                .as_option()
                .and_then(|max_retries| u32::try_from(max_retries).ok()),
            endpoints: self
                .endpoints
                .iter()
                .flatten()
                .filter_map(|(key, endpoint)| Some((key.to_string(), owned(endpoint)?)))
                .collect(),
        }
    }
}

/// The HuaweiCloud provider
///
/// Resources and data sources hold a clone of the [`ConfigHandle`], filled when Terraform
/// configures the provider.
#[derive(Debug, Default, Clone)]
pub struct HuaweiCloudProvider {
    config: ConfigHandle,
}

impl HuaweiCloudProvider {
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }
}

#[async_trait]
impl Provider for HuaweiCloudProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderConfig::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags);

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        debug!(terraform_version, "configuring the provider");
        let config = config
            .settings()
            .with_env_fallbacks()
            .and_then(Config::new)
            .extract_diagnostics(diags, "Unable to configure the provider")?;
        self.config.set(config);
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let config = &self.config;
        Some(map! {
            "huaweicloud_cae_environment" => EnvironmentResource::new(config.clone()),
            "huaweicloud_cae_component" => ComponentResource::new(config.clone()),
            "huaweicloud_organizations_organization" => OrganizationResource::new(config.clone()),
            "huaweicloud_geminidb_instance" => InstanceResource::new(config.clone()),
            "huaweicloud_sdrs_protection_group" => ProtectionGroupResource::new(config.clone()),
            "huaweicloud_swr_organization" => SwrOrganizationResource::new(config.clone()),
            "huaweicloud_codearts_inspector_host_group" => HostGroupResource::new(config.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let config = &self.config;
        Some(map! {
            "huaweicloud_cae_environments" => EnvironmentsDataSource::new(config.clone()),
            "huaweicloud_swr_organizations" => SwrOrganizationsDataSource::new(config.clone()),
            "huaweicloud_codearts_inspector_host_groups" => HostGroupsDataSource::new(config.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    fn endpoints<'a>(pairs: &[(&'a str, &'a str)]) -> ValueMap<'a, ValueString<'a>> {
        Value::Value(
            pairs
                .iter()
                .map(|(key, value)| (Cow::Borrowed(*key), Value::from(*value)))
                .collect(),
        )
    }

    #[tokio::test]
    async fn validation() {
        let provider = HuaweiCloudProvider::default();

        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            access_key: "AK".into(),
            secret_key: "SK".into(),
            max_retries: Value::Value(3),
            endpoints: endpoints(&[("cae", "https://cae.example.com")]),
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_some());

        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            access_key: "AK".into(),
            max_retries: Value::Value(-1),
            endpoints: endpoints(&[("ecs", "https://ecs.example.com"), ("swr", "not a url")]),
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 4);
    }

    #[tokio::test]
    async fn unknown_credentials_are_not_checked() {
        let provider = HuaweiCloudProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            access_key: "AK".into(),
            secret_key: Value::Unknown,
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_some());
    }

    #[tokio::test]
    async fn configure_publishes_the_config() {
        let provider = HuaweiCloudProvider::default();
        assert!(provider.config().get().is_err());

        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            region: "cn-north-4".into(),
            access_key: "AK".into(),
            secret_key: "SK".into(),
            project_id: "p-north-4".into(),
            ..Default::default()
        };
        let configured = temp_env::async_with_vars(
            [
                (config::ENV_CLOUD, Some("example.com")),
                (config::ENV_MAX_RETRIES, None::<&str>),
            ],
            provider.configure(&mut diags, "1.9.0".into(), config),
        )
        .await;
        assert!(configured.is_some(), "{diags:?}");
        assert_eq!(provider.config().get().unwrap().cloud(), "example.com");
    }

    #[tokio::test]
    async fn configure_without_credentials() {
        let provider = HuaweiCloudProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            region: "cn-north-4".into(),
            ..Default::default()
        };
        let configured = temp_env::async_with_vars(
            [
                (config::ENV_ACCESS_KEY, None::<&str>),
                (config::ENV_SECRET_KEY, None),
                (config::ENV_AUTH_TOKEN, None),
            ],
            provider.configure(&mut diags, "1.9.0".into(), config),
        )
        .await;
        assert!(configured.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert!(provider.config().get().is_err());
    }

    #[test]
    fn registered_names() {
        let provider = HuaweiCloudProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        assert_eq!(resources.len(), 7);
        assert!(resources.contains_key("huaweicloud_cae_component"));
        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert!(data_sources.contains_key("huaweicloud_swr_organizations"));
        assert!(data_sources.contains_key("huaweicloud_codearts_inspector_host_groups"));
    }
}
