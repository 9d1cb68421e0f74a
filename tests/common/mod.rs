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

//! Helpers shared by the integration tests

use std::collections::BTreeMap;

use terraform_provider_huaweicloud::config::{Config, ConfigHandle, Settings};
use tf_provider::Diagnostics;
use wiremock::MockServer;

pub const REGION: &str = "cn-north-4";
pub const PROJECT_ID: &str = "p-1";

/// Configuration sending the requests of `services` to the mock server
pub fn configure(server: &MockServer, services: &[&str]) -> ConfigHandle {
    let endpoints = services
        .iter()
        .map(|service| (service.to_string(), server.uri()))
        .collect::<BTreeMap<_, _>>();
    let settings = Settings {
        region: Some(REGION.into()),
        access_key: Some("AK".into()),
        secret_key: Some("SK".into()),
        project_id: Some(PROJECT_ID.into()),
        max_retries: Some(1),
        endpoints,
        ..Default::default()
    };

    let handle = ConfigHandle::default();
    handle.set(Config::new(settings).unwrap());
    handle
}

/// Details of every error, to match with `contains`
pub fn error_details(diags: &Diagnostics) -> String {
    diags
        .errors
        .iter()
        .map(|diag| format!("{}: {}", diag.summary, diag.detail))
        .collect::<Vec<_>>()
        .join("\n")
}
