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

mod common;

use pretty_assertions::assert_eq;
use serde_json::{json, Value as JsonValue};
use terraform_provider_huaweicloud::sdrs::{ProtectionGroupResource, ProtectionGroupState};
use tf_provider::value::Value;
use tf_provider::{Diagnostics, Resource};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{configure, error_details, PROJECT_ID, REGION};

fn declared() -> ProtectionGroupState<'static> {
    ProtectionGroupState {
        name: Value::Value("group".into()),
        source_availability_zone: Value::Value("az-1".into()),
        target_availability_zone: Value::Value("az-2".into()),
        domain_id: Value::Value("d-1".into()),
        source_vpc_id: Value::Value("vpc-1".into()),
        ..Default::default()
    }
}

fn group() -> JsonValue {
    json!({
        "server_group": {
            "id": "g-1",
            "name": "group",
            "description": "",
            "source_availability_zone": "az-1",
            "target_availability_zone": "az-2",
            "domain_id": "d-1",
            "source_vpc_id": "vpc-1",
            "dr_type": "migration",
            "status": "available",
        },
    })
}

async fn mount_create(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/{PROJECT_ID}/server-groups")))
        .and(body_json(json!({
            "server_group": {
                "name": "group",
                "source_availability_zone": "az-1",
                "target_availability_zone": "az-2",
                "domain_id": "d-1",
                "source_vpc_id": "vpc-1",
                "dr_type": "migration",
            },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "job-1"})))
        .expect(1)
        .mount(server)
        .await;
}

async fn create(
    server: &MockServer,
    diags: &mut Diagnostics,
) -> Option<Value<ProtectionGroupState<'static>>> {
    let resource = ProtectionGroupResource::new(configure(server, &["sdrs"]));
    let planned = Value::Value(declared());
    let (state, _) = resource
        .create(
            diags,
            planned.clone(),
            planned,
            Default::default(),
            Default::default(),
        )
        .await?;
    Some(state)
}

#[tokio::test]
async fn create_reads_the_group_of_the_job() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    // The job endpoint is not ready right after the request
    Mock::given(method("GET"))
        .and(path(format!("/v1/{PROJECT_ID}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error_code": "SDRS.0500",
            "error_msg": "internal error",
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/{PROJECT_ID}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "entities": {"server_group_id": "g-1"},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/{PROJECT_ID}/server-groups/g-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(group()))
        .expect(1)
        .mount(&server)
        .await;

    let mut diags = Diagnostics::default();
    let state = create(&server, &mut diags)
        .await
        .unwrap_or_else(|| panic!("{}", error_details(&diags)));

    let Value::Value(state) = state else {
        panic!("created state is not known");
    };
    assert_eq!(state.id.as_str(), "g-1");
    assert_eq!(state.region.as_str(), REGION);
    assert_eq!(state.dr_type.as_str(), "migration");
    assert_eq!(state.status.as_str(), "available");
    assert!(state.description.is_null());
}

#[tokio::test]
async fn create_reports_the_failed_job() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/{PROJECT_ID}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "FAIL",
            "fail_reason": "no quota",
        })))
        .mount(&server)
        .await;

    let mut diags = Diagnostics::default();
    assert!(create(&server, &mut diags).await.is_none());
    let details = error_details(&diags);
    assert!(details.contains("job job-1 failed: no quota"), "{details}");
}

#[tokio::test]
async fn read_drops_a_deleted_group() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/{PROJECT_ID}/server-groups/g-1")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "SDRS.1002",
            "error_msg": "server group not found",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resource = ProtectionGroupResource::new(configure(&server, &["sdrs"]));
    let state = ProtectionGroupState {
        id: Value::Value("g-1".into()),
        ..declared()
    };
    let mut diags = Diagnostics::default();
    let (state, _) = resource
        .read(&mut diags, Value::Value(state), Default::default(), Default::default())
        .await
        .unwrap_or_else(|| panic!("{}", error_details(&diags)));

    assert!(state.is_null());
}
