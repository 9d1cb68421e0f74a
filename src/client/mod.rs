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

//! Signed HTTP client bound to one service endpoint

pub mod signer;

use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ApiError, NotFoundCodes, Result};

pub use signer::Credentials;

pub const HEADER_PROJECT_ID: &str = "X-Project-Id";
pub const HEADER_DOMAIN_ID: &str = "X-Domain-Id";

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Characters escaped when a value is placed inside a path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Client for a single service in a single region
#[derive(Debug, Clone)]
pub struct ServiceClient {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoint: Url,
    pub(crate) region: String,
    pub(crate) project_id: Option<String>,
    pub(crate) domain_id: Option<String>,
    pub(crate) credentials: Credentials,
    pub(crate) max_retries: u32,
}

/// Per request options
#[derive(Debug, Clone, Default)]
pub struct RequestOpts {
    body: Option<JsonValue>,
    headers: Vec<(&'static str, String)>,
    ok_codes: Vec<u16>,
    not_found_codes: NotFoundCodes,
}

impl RequestOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Accepted status codes, any 2xx when empty
    pub fn ok_codes(mut self, codes: &[u16]) -> Self {
        self.ok_codes = codes.to_vec();
        self
    }

    pub fn not_found_codes(mut self, codes: NotFoundCodes) -> Self {
        self.not_found_codes = codes;
        self
    }

    fn accepts(&self, status: StatusCode) -> bool {
        if self.ok_codes.is_empty() {
            status.is_success()
        } else {
            self.ok_codes.contains(&status.as_u16())
        }
    }
}

impl ServiceClient {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Build the URL of an API path
    ///
    /// `{project_id}` is replaced by the project of the client, the other placeholders are
    /// looked up in `params` and percent-encoded.
    pub fn url(&self, template: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut path = template.to_owned();
        if path.contains("{project_id}") {
            let project_id = self.project_id.as_deref().ok_or_else(|| {
                ApiError::client(format!("{template} requires a project ID"))
            })?;
            path = path.replace("{project_id}", project_id);
        }
        for (name, value) in params {
            let encoded = utf8_percent_encode(value, PATH_SEGMENT).to_string();
            path = path.replace(&format!("{{{name}}}"), &encoded);
        }
        if let Some(start) = path.find('{') {
            return Err(ApiError::client(format!(
                "unresolved placeholder in {}",
                &path[start..]
            )));
        }

        self.endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::client(format!("invalid URL for {template}: {err}")))
    }

    pub async fn get(&self, url: Url, opts: RequestOpts) -> Result<JsonValue> {
        self.request(Method::GET, url, opts).await
    }

    pub async fn post(&self, url: Url, opts: RequestOpts) -> Result<JsonValue> {
        self.request(Method::POST, url, opts).await
    }

    pub async fn put(&self, url: Url, opts: RequestOpts) -> Result<JsonValue> {
        self.request(Method::PUT, url, opts).await
    }

    pub async fn delete(&self, url: Url, opts: RequestOpts) -> Result<JsonValue> {
        self.request(Method::DELETE, url, opts).await
    }

    /// Send a request and decode the body into `T`
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        opts: RequestOpts,
    ) -> Result<T> {
        let target = url.to_string();
        let body = self.request(method, url, opts).await?;
        serde_json::from_value(body).map_err(|source| ApiError::Decode {
            url: target,
            source,
        })
    }

    /// Send a signed request
    ///
    /// Throttled requests and connection failures are sent again, at most `max_retries` times.
    /// The decoded body is returned, `null` if the response has no body.
    #[instrument(skip(self, opts), fields(region = %self.region))]
    pub async fn request(&self, method: Method, url: Url, opts: RequestOpts) -> Result<JsonValue> {
        let body = opts
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| ApiError::client(format!("unable to encode the request body: {err}")))?;

        let mut attempt = 0;
        loop {
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .header(CONTENT_TYPE, "application/json");
            if let Some(project_id) = &self.project_id {
                builder = builder.header(HEADER_PROJECT_ID, project_id);
            } else if let Some(domain_id) = &self.domain_id {
                builder = builder.header(HEADER_DOMAIN_ID, domain_id);
            }
            for (name, value) in &opts.headers {
                builder = builder.header(*name, value);
            }
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            let mut request = builder
                .build()
                .map_err(|source| self.transport(&method, &url, source))?;
            signer::sign(&self.credentials, &mut request, OffsetDateTime::now_utc())?;

            attempt += 1;
            let response = match self.http.execute(request).await {
                Ok(response) => response,
                Err(err)
                    if (err.is_connect() || err.is_timeout()) && attempt <= self.max_retries =>
                {
                    let delay = backoff(attempt);
                    warn!(%err, attempt, ?delay, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(err) => return Err(self.transport(&method, &url, err)),
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt <= self.max_retries {
                let delay = backoff(attempt);
                warn!(attempt, ?delay, "request throttled, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|source| self.transport(&method, &url, source))?;
            debug!(status = status.as_u16(), len = bytes.len(), "response received");

            if !opts.accepts(status) {
                return Err(ApiError::from_response(
                    status,
                    &bytes,
                    opts.not_found_codes,
                ));
            }

            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(JsonValue::Null);
            }
            return serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            });
        }
    }

    fn transport(&self, method: &Method, url: &Url, source: reqwest::Error) -> ApiError {
        ApiError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        }
    }
}

/// Delay before the given retry, 1s doubling up to 30s
fn backoff(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(endpoint: &str, max_retries: u32) -> ServiceClient {
        ServiceClient {
            http: reqwest::Client::new(),
            endpoint: Url::parse(endpoint).unwrap(),
            region: "cn-north-4".into(),
            project_id: Some("0123456789abcdef".into()),
            domain_id: None,
            credentials: Credentials::AkSk {
                access_key: "AK".into(),
                secret_key: "SK".into(),
                security_token: None,
            },
            max_retries,
        }
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(2), Duration::from_secs(2));
        assert_eq!(backoff(5), Duration::from_secs(16));
        assert_eq!(backoff(6), Duration::from_secs(30));
        assert_eq!(backoff(80), Duration::from_secs(30));
    }

    #[test]
    fn url_substitution() {
        let client = client("https://cae.cn-north-4.myhuaweicloud.com/", 0);
        let url = client
            .url("v1/{project_id}/cae/environments/{id}", &[("id", "env 1/2")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cae.cn-north-4.myhuaweicloud.com/v1/0123456789abcdef/cae/environments/env%201%2F2"
        );

        assert!(client.url("v1/{project_id}/jobs/{job_id}", &[]).is_err());
    }

    #[test]
    fn url_without_project() {
        let mut client = client("https://organizations.myhuaweicloud.com/", 0);
        client.project_id = None;
        assert!(client.url("v1/{project_id}/jobs", &[]).is_err());
        assert_eq!(
            client.url("v1/organizations", &[]).unwrap().as_str(),
            "https://organizations.myhuaweicloud.com/v1/organizations"
        );
    }

    #[tokio::test]
    async fn signed_json_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/manage/namespaces"))
            .and(header("X-Project-Id", "0123456789abcdef"))
            .and(header_exists("Authorization"))
            .and(header_exists("X-Sdk-Date"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/", server.uri()), 0);
        let url = client.url("v2/manage/namespaces", &[]).unwrap();
        let body = client
            .post(
                url,
                RequestOpts::new()
                    .body(json!({"namespace": "demo"}))
                    .ok_codes(&[201]),
            )
            .await
            .unwrap();
        assert_eq!(body, JsonValue::Null);
    }

    #[tokio::test]
    async fn remote_errors_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/0123456789abcdef/cae/environments"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "CAE.01500208",
                "error_msg": "environment not found",
            })))
            .mount(&server)
            .await;

        let client = client(&format!("{}/", server.uri()), 0);
        let url = client.url("v1/{project_id}/cae/environments", &[]).unwrap();

        let err = client
            .get(url.clone(), RequestOpts::new())
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(err.error_code(), Some("CAE.01500208"));

        let err = client
            .get(url, RequestOpts::new().not_found_codes(&["CAE.01500208"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn throttled_requests_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/organizations"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/organizations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"organization": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/", server.uri()), 1);
        let url = client.url("v1/organizations", &[]).unwrap();
        let body = client.get(url, RequestOpts::new()).await.unwrap();
        assert_eq!(body, json!({"organization": {}}));
    }

    #[tokio::test]
    async fn throttling_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&format!("{}/", server.uri()), 0);
        let url = client.url("v1/organizations", &[]).unwrap();
        let err = client.get(url, RequestOpts::new()).await.unwrap_err();
        match err {
            ApiError::Remote(remote) => assert_eq!(remote.status, StatusCode::TOO_MANY_REQUESTS),
            err => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn typed_response() {
        #[derive(serde::Deserialize)]
        struct Namespace {
            name: String,
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/manage/namespaces/demo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "demo"})))
            .mount(&server)
            .await;

        let client = client(&format!("{}/", server.uri()), 0);
        let url = client
            .url("v2/manage/namespaces/{name}", &[("name", "demo")])
            .unwrap();
        let namespace: Namespace = client
            .request_as(Method::GET, url, RequestOpts::new())
            .await
            .unwrap();
        assert_eq!(namespace.name, "demo");
    }
}
