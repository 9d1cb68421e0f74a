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

//! Provider configuration and service client factory
//!
//! [`Config`] is built once, when Terraform configures the provider, and shared by every
//! resource through a [`ConfigHandle`]. Its only mutable state is the cache of project IDs.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::client::{Credentials, RequestOpts, ServiceClient};
use crate::error::{ApiError, Result};

pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";
pub const DEFAULT_MAX_RETRIES: u32 = 5;

pub const ENV_REGION: &str = "HW_REGION_NAME";
pub const ENV_ACCESS_KEY: &str = "HW_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "HW_SECRET_KEY";
pub const ENV_SECURITY_TOKEN: &str = "HW_SECURITY_TOKEN";
pub const ENV_AUTH_TOKEN: &str = "HW_AUTH_TOKEN";
pub const ENV_PROJECT_ID: &str = "HW_PROJECT_ID";
pub const ENV_DOMAIN_ID: &str = "HW_DOMAIN_ID";
pub const ENV_CLOUD: &str = "HW_CLOUD";
pub const ENV_ENTERPRISE_PROJECT_ID: &str = "HW_ENTERPRISE_PROJECT_ID";
pub const ENV_INSECURE: &str = "HW_INSECURE";
pub const ENV_MAX_RETRIES: &str = "HW_MAX_RETRIES";

/// Entry of the service catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    /// Key used in the `endpoints` provider setting
    pub key: &'static str,
    /// First label of the endpoint host
    pub name: &'static str,
    pub version: &'static str,
    /// Global services are not bound to a region
    pub global: bool,
    /// Requests are not scoped by a project
    pub without_project_id: bool,
}

pub const SERVICES: &[Service] = &[
    Service {
        key: "cae",
        name: "cae",
        version: "v1",
        global: false,
        without_project_id: false,
    },
    Service {
        key: "swr",
        name: "swr-api",
        version: "v2",
        global: false,
        without_project_id: true,
    },
    Service {
        key: "sdrs",
        name: "sdrs",
        version: "v1",
        global: false,
        without_project_id: false,
    },
    Service {
        key: "organizations",
        name: "organizations",
        version: "v1",
        global: true,
        without_project_id: true,
    },
    Service {
        key: "geminidb",
        name: "gaussdb-nosql",
        version: "v3",
        global: false,
        without_project_id: false,
    },
    Service {
        key: "vss",
        name: "vss",
        version: "v3",
        global: false,
        without_project_id: false,
    },
    Service {
        key: "iam",
        name: "iam",
        version: "v3",
        global: true,
        without_project_id: true,
    },
];

pub fn service(key: &str) -> Result<&'static Service> {
    SERVICES
        .iter()
        .find(|service| service.key == key)
        .ok_or_else(|| ApiError::client(format!("unknown service {key:?}")))
}

/// Raw provider settings, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub token: Option<String>,
    pub project_id: Option<String>,
    pub domain_id: Option<String>,
    pub cloud: Option<String>,
    pub enterprise_project_id: Option<String>,
    pub insecure: Option<bool>,
    pub max_retries: Option<u32>,
    pub endpoints: BTreeMap<String, String>,
}

impl Settings {
    /// Fill the unset values from the `HW_*` environment variables
    pub fn with_env_fallbacks(mut self) -> Result<Self> {
        fn lookup(name: &str) -> Option<String> {
            env::var(name).ok().filter(|value| !value.is_empty())
        }
        fn fallback(value: &mut Option<String>, name: &str) {
            if value.is_none() {
                *value = lookup(name);
            }
        }

        fallback(&mut self.region, ENV_REGION);
        fallback(&mut self.access_key, ENV_ACCESS_KEY);
        fallback(&mut self.secret_key, ENV_SECRET_KEY);
        fallback(&mut self.security_token, ENV_SECURITY_TOKEN);
        fallback(&mut self.token, ENV_AUTH_TOKEN);
        fallback(&mut self.project_id, ENV_PROJECT_ID);
        fallback(&mut self.domain_id, ENV_DOMAIN_ID);
        fallback(&mut self.cloud, ENV_CLOUD);
        fallback(&mut self.enterprise_project_id, ENV_ENTERPRISE_PROJECT_ID);

        if self.insecure.is_none() {
            if let Some(value) = lookup(ENV_INSECURE) {
                self.insecure = Some(match value.to_ascii_lowercase().as_str() {
                    "1" | "true" => true,
                    "0" | "false" => false,
                    _ => {
                        return Err(ApiError::client(format!(
                            "{ENV_INSECURE} must be a boolean, got {value:?}"
                        )))
                    }
                });
            }
        }
        if self.max_retries.is_none() {
            if let Some(value) = lookup(ENV_MAX_RETRIES) {
                self.max_retries = Some(value.parse().map_err(|err| {
                    ApiError::client(format!("{ENV_MAX_RETRIES} is invalid ({value:?}): {err}"))
                })?);
            }
        }

        Ok(self)
    }

    fn credentials(&self) -> Result<Credentials> {
        match (&self.access_key, &self.secret_key, &self.token) {
            (Some(access_key), Some(secret_key), _) => Ok(Credentials::AkSk {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                security_token: self.security_token.clone(),
            }),
            (Some(_), None, _) => Err(ApiError::client("access_key is set without secret_key")),
            (None, Some(_), _) => Err(ApiError::client("secret_key is set without access_key")),
            (None, None, Some(token)) => Ok(Credentials::Token(token.clone())),
            (None, None, None) => Err(ApiError::client(
                "no authentication configured: set access_key and secret_key, or token",
            )),
        }
    }
}

/// Parse a custom endpoint, always terminated by a slash
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let mut endpoint = endpoint.trim().to_owned();
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    Url::parse(&endpoint)
        .map_err(|err| ApiError::client(format!("invalid endpoint {endpoint:?}: {err}")))
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
}

/// Shared configuration, and factory of [`ServiceClient`]
#[derive(Debug)]
pub struct Config {
    http: reqwest::Client,
    region: String,
    cloud: String,
    credentials: Credentials,
    domain_id: Option<String>,
    enterprise_project_id: Option<String>,
    max_retries: u32,
    endpoints: HashMap<String, Url>,
    projects: Mutex<HashMap<String, String>>,
}

impl Config {
    pub fn new(settings: Settings) -> Result<Self> {
        let credentials = settings.credentials()?;
        let region = settings
            .region
            .clone()
            .ok_or_else(|| ApiError::client("region is required"))?;

        let endpoints = settings
            .endpoints
            .iter()
            .map(|(key, endpoint)| parse_endpoint(endpoint).map(|url| (key.clone(), url)))
            .collect::<Result<HashMap<_, _>>>()?;

        let insecure = settings.insecure.unwrap_or(false);
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                "terraform-provider-huaweicloud/",
                env!("CARGO_PKG_VERSION")
            ))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|err| ApiError::client(format!("unable to build the HTTP client: {err}")))?;

        let mut projects = HashMap::new();
        if let Some(project_id) = &settings.project_id {
            projects.insert(region.clone(), project_id.clone());
        }

        info!(
            region,
            aksk = credentials.is_aksk(),
            insecure,
            "provider configured"
        );

        Ok(Self {
            http,
            region,
            cloud: settings.cloud.unwrap_or_else(|| DEFAULT_CLOUD.to_owned()),
            credentials,
            domain_id: settings.domain_id,
            enterprise_project_id: settings.enterprise_project_id,
            max_retries: settings.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            endpoints,
            projects: Mutex::new(projects),
        })
    }

    pub fn cloud(&self) -> &str {
        &self.cloud
    }

    pub fn provider_region(&self) -> &str {
        &self.region
    }

    /// Region of a resource, falling back to the provider region
    pub fn region<'a>(&'a self, resource_region: Option<&'a str>) -> &'a str {
        resource_region
            .filter(|region| !region.is_empty())
            .unwrap_or(&self.region)
    }

    /// Enterprise project of a resource, falling back to the provider setting
    pub fn enterprise_project_id(&self, resource_value: Option<&str>) -> Option<String> {
        resource_value
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .or_else(|| self.enterprise_project_id.clone())
    }

    pub fn endpoint(&self, service: &Service, region: &str) -> Result<Url> {
        if let Some(endpoint) = self.endpoints.get(service.key) {
            return Ok(endpoint.clone());
        }
        let endpoint = if service.global {
            format!("https://{}.{}/", service.name, self.cloud)
        } else {
            format!("https://{}.{}.{}/", service.name, region, self.cloud)
        };
        parse_endpoint(&endpoint)
    }

    /// Project ID of a region
    ///
    /// The provider region uses the configured `project_id`; other regions are looked up
    /// through IAM once and cached.
    pub async fn project_id(&self, region: &str) -> Result<String> {
        let mut projects = self.projects.lock().await;
        if let Some(project_id) = projects.get(region) {
            return Ok(project_id.clone());
        }

        let iam = self.client(service("iam")?, region, None)?;
        let mut url = iam.url("v3/projects", &[])?;
        url.query_pairs_mut().append_pair("name", region);

        debug!(region, "looking up the project ID");
        let list: ProjectList = iam
            .request_as(reqwest::Method::GET, url, RequestOpts::new())
            .await?;
        let project_id = list
            .projects
            .into_iter()
            .next()
            .map(|project| project.id)
            .ok_or_else(|| ApiError::client(format!("no project found for region {region}")))?;

        projects.insert(region.to_owned(), project_id.clone());
        Ok(project_id)
    }

    /// Build a client for a service in a region
    pub async fn new_service_client(&self, key: &str, region: &str) -> Result<ServiceClient> {
        let service = service(key)?;
        if region != self.region && !self.credentials.is_aksk() {
            return Err(ApiError::client(format!(
                "region {region} differs from the provider region {}: \
                 this requires access_key and secret_key",
                self.region
            )));
        }

        let project_id = if service.without_project_id {
            None
        } else {
            Some(self.project_id(region).await?)
        };
        self.client(service, region, project_id)
    }

    fn client(
        &self,
        service: &Service,
        region: &str,
        project_id: Option<String>,
    ) -> Result<ServiceClient> {
        Ok(ServiceClient {
            http: self.http.clone(),
            endpoint: self.endpoint(service, region)?,
            region: region.to_owned(),
            project_id,
            domain_id: service.global.then(|| self.domain_id.clone()).flatten(),
            credentials: self.credentials.clone(),
            max_retries: self.max_retries,
        })
    }
}

/// Slot filled with the [`Config`] once the provider is configured
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle(Arc<RwLock<Option<Arc<Config>>>>);

impl ConfigHandle {
    pub fn set(&self, config: Config) {
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(config));
    }

    pub fn get(&self) -> Result<Arc<Config>> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ApiError::client("provider is not configured"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn settings() -> Settings {
        Settings {
            region: Some("cn-north-4".into()),
            access_key: Some("AK".into()),
            secret_key: Some("SK".into()),
            project_id: Some("p-north-4".into()),
            ..Default::default()
        }
    }

    #[test]
    fn catalog() {
        let swr = service("swr").unwrap();
        assert_eq!(swr.name, "swr-api");
        assert!(swr.without_project_id);
        assert!(service("organizations").unwrap().global);
        assert!(!service("vss").unwrap().without_project_id);
        assert!(service("ecs").is_err());
    }

    #[test]
    fn default_endpoints() {
        let config = Config::new(settings()).unwrap();
        assert_eq!(
            config
                .endpoint(service("cae").unwrap(), "cn-north-4")
                .unwrap()
                .as_str(),
            "https://cae.cn-north-4.myhuaweicloud.com/"
        );
        assert_eq!(
            config
                .endpoint(service("geminidb").unwrap(), "ap-southeast-1")
                .unwrap()
                .as_str(),
            "https://gaussdb-nosql.ap-southeast-1.myhuaweicloud.com/"
        );
        assert_eq!(
            config
                .endpoint(service("organizations").unwrap(), "cn-north-4")
                .unwrap()
                .as_str(),
            "https://organizations.myhuaweicloud.com/"
        );
    }

    #[test]
    fn custom_endpoints() {
        let mut settings = settings();
        settings.cloud = Some("example.com".into());
        settings
            .endpoints
            .insert("swr".into(), "https://swr.internal:8443/api".into());
        let config = Config::new(settings).unwrap();

        assert_eq!(
            config
                .endpoint(service("swr").unwrap(), "cn-north-4")
                .unwrap()
                .as_str(),
            "https://swr.internal:8443/api/"
        );
        assert_eq!(
            config
                .endpoint(service("sdrs").unwrap(), "cn-north-4")
                .unwrap()
                .as_str(),
            "https://sdrs.cn-north-4.example.com/"
        );
    }

    #[test]
    fn invalid_endpoint() {
        let mut settings = settings();
        settings.endpoints.insert("cae".into(), "not a url".into());
        assert!(Config::new(settings).is_err());
    }

    #[test]
    fn credentials() {
        let mut missing = settings();
        missing.secret_key = None;
        assert!(Config::new(missing).is_err());

        let none = Settings {
            region: Some("cn-north-4".into()),
            ..Default::default()
        };
        assert!(Config::new(none).is_err());

        let token = Settings {
            region: Some("cn-north-4".into()),
            token: Some("tok".into()),
            ..Default::default()
        };
        assert!(Config::new(token).is_ok());

        let mut no_region = settings();
        no_region.region = None;
        assert!(Config::new(no_region).is_err());
    }

    #[test]
    fn resource_overrides() {
        let mut settings = settings();
        settings.enterprise_project_id = Some("eps-default".into());
        let config = Config::new(settings).unwrap();

        assert_eq!(config.region(None), "cn-north-4");
        assert_eq!(config.region(Some("")), "cn-north-4");
        assert_eq!(config.region(Some("cn-east-3")), "cn-east-3");
        assert_eq!(
            config.enterprise_project_id(None).as_deref(),
            Some("eps-default")
        );
        assert_eq!(
            config.enterprise_project_id(Some("eps-1")).as_deref(),
            Some("eps-1")
        );
    }

    #[test]
    fn env_fallbacks() {
        temp_env::with_vars(
            [
                (ENV_REGION, Some("cn-south-1")),
                (ENV_ACCESS_KEY, Some("env-ak")),
                (ENV_SECRET_KEY, Some("env-sk")),
                (ENV_MAX_RETRIES, Some("2")),
                (ENV_INSECURE, Some("true")),
                (ENV_CLOUD, None),
            ],
            || {
                let settings = Settings {
                    region: Some("cn-north-4".into()),
                    ..Default::default()
                }
                .with_env_fallbacks()
                .unwrap();

                assert_eq!(settings.region.as_deref(), Some("cn-north-4"));
                assert_eq!(settings.access_key.as_deref(), Some("env-ak"));
                assert_eq!(settings.secret_key.as_deref(), Some("env-sk"));
                assert_eq!(settings.max_retries, Some(2));
                assert_eq!(settings.insecure, Some(true));
                assert_eq!(settings.cloud, None);
            },
        );
    }

    #[test]
    fn invalid_env_values() {
        temp_env::with_var(ENV_MAX_RETRIES, Some("many"), || {
            assert!(Settings::default().with_env_fallbacks().is_err());
        });
        temp_env::with_var(ENV_INSECURE, Some("maybe"), || {
            assert!(Settings::default().with_env_fallbacks().is_err());
        });
    }

    #[tokio::test]
    async fn provider_project_is_used() {
        let config = Config::new(settings()).unwrap();
        let client = config
            .new_service_client("cae", "cn-north-4")
            .await
            .unwrap();
        assert_eq!(client.project_id(), Some("p-north-4"));

        let client = config.new_service_client("swr", "cn-north-4").await.unwrap();
        assert_eq!(client.project_id(), None);
    }

    #[tokio::test]
    async fn other_regions_are_looked_up_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects"))
            .and(query_param("name", "cn-east-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "projects": [{"id": "p-east-3", "name": "cn-east-3"}],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = settings();
        settings.endpoints.insert("iam".into(), server.uri());
        let config = Config::new(settings).unwrap();

        let (first, second) = tokio::join!(
            config.new_service_client("sdrs", "cn-east-3"),
            config.new_service_client("cae", "cn-east-3"),
        );
        assert_eq!(first.unwrap().project_id(), Some("p-east-3"));
        assert_eq!(second.unwrap().project_id(), Some("p-east-3"));
    }

    #[tokio::test]
    async fn unknown_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"projects": []})))
            .mount(&server)
            .await;

        let mut settings = settings();
        settings.endpoints.insert("iam".into(), server.uri());
        let config = Config::new(settings).unwrap();

        let err = config
            .new_service_client("cae", "xx-nowhere-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Client(_)), "{err}");
    }

    #[tokio::test]
    async fn token_is_bound_to_the_provider_region() {
        let config = Config::new(Settings {
            region: Some("cn-north-4".into()),
            token: Some("tok".into()),
            project_id: Some("p-north-4".into()),
            ..Default::default()
        })
        .unwrap();

        assert!(config.new_service_client("cae", "cn-north-4").await.is_ok());
        assert!(config.new_service_client("cae", "cn-east-3").await.is_err());
    }

    #[test]
    fn unconfigured_handle() {
        let handle = ConfigHandle::default();
        let err = handle.get().unwrap_err();
        assert_eq!(err.to_string(), "provider is not configured");

        handle.set(Config::new(settings()).unwrap());
        assert_eq!(handle.get().unwrap().provider_region(), "cn-north-4");
    }
}
