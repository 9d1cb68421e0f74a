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

//! Errors raised while talking to HuaweiCloud
//!
//! Remote failures are decoded once, when the response is received, into [`ApiError`].
//! Handlers then match on the variant instead of inspecting error strings.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Service specific error codes meaning "the object does not exist"
///
/// Some services answer a request on a missing object with a 400 or a 500 status carrying one
/// of these codes instead of a plain 404.
pub type NotFoundCodes = &'static [&'static str];

/// Error payload returned by a HuaweiCloud API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub status: StatusCode,
    pub code: Option<String>,
    pub message: String,
}

impl RemoteError {
    /// Decode an error body
    ///
    /// Services do not agree on a single error layout, the known shapes are:
    /// `{"error_code", "error_msg"}`, `{"error": {"code", "message"}}`,
    /// `{"errCode", "errMsg"}` and `{"code", "message"}`.
    pub fn decode(status: StatusCode, body: &[u8]) -> Self {
        let json = serde_json::from_slice::<JsonValue>(body).unwrap_or(JsonValue::Null);

        let lookup = |code: &str, message: &str| -> Option<(Option<String>, String)> {
            let node = if code.contains('.') {
                let (parent, code) = code.split_once('.')?;
                let (_, message) = message.split_once('.')?;
                let parent = json.get(parent)?;
                (parent.get(code), parent.get(message))
            } else {
                (json.get(code), json.get(message))
            };
            match node {
                (None, None) => None,
                (code, message) => Some((
                    code.and_then(JsonValue::as_str).map(str::to_owned),
                    message
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                )),
            }
        };

        let decoded = lookup("error_code", "error_msg")
            .or_else(|| lookup("error.code", "error.message"))
            .or_else(|| lookup("errCode", "errMsg"))
            .or_else(|| lookup("code", "message"));

        match decoded {
            Some((code, message)) => Self {
                status,
                code,
                message,
            },
            None => Self {
                status,
                code: None,
                message: String::from_utf8_lossy(body).trim().to_owned(),
            },
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status.as_u16())?;
        if let Some(code) = &self.code {
            write!(f, ", error code {code}")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Client(String),

    #[error("request {method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("resource not found ({0})")]
    NotFound(RemoteError),

    #[error("{0}")]
    Remote(RemoteError),

    #[error("unable to decode the response of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to find {0} in the API response")]
    MissingField(&'static str),

    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("timeout while waiting for {subject} after {}", humantime::format_duration(.elapsed.to_owned()))]
    Timeout { subject: String, elapsed: Duration },
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

impl ApiError {
    pub(crate) fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Classify a non accepted response
    pub fn from_response(status: StatusCode, body: &[u8], not_found_codes: NotFoundCodes) -> Self {
        let remote = RemoteError::decode(status, body);
        let listed = remote
            .code
            .as_deref()
            .is_some_and(|code| not_found_codes.contains(&code));

        match status {
            StatusCode::NOT_FOUND => Self::NotFound(remote),
            StatusCode::BAD_REQUEST | StatusCode::INTERNAL_SERVER_ERROR if listed => {
                Self::NotFound(remote)
            }
            _ => Self::Remote(remote),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Remote error code, if the failure came from the API
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::NotFound(remote) | Self::Remote(remote) => remote.code.as_deref(),
            _ => None,
        }
    }
}

/// Turn "not found" into an absent value
pub trait IgnoreNotFound<T> {
    fn ignore_not_found(self) -> Result<Option<T>>;
}

impl<T> IgnoreNotFound<T> for Result<T> {
    fn ignore_not_found(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
