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
use terraform_provider_huaweicloud::codearts_inspector::{
    HostGroupResource, HostGroupState, HostGroupsDataSource, HostGroupsState,
};
use tf_provider::value::Value;
use tf_provider::{DataSource, Diagnostics, Resource};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{configure, error_details, PROJECT_ID, REGION};

fn groups_path() -> String {
    format!("/v3/{PROJECT_ID}/hostscan/groups")
}

/// First page full of unrelated groups, the second one with `web` and `db`
async fn mount_groups(server: &MockServer) {
    let bulk = (0..200)
        .map(|index| json!({"id": format!("bulk-{index}"), "name": "bulk", "host_num": 0}))
        .collect::<Vec<_>>();
    let pages: [(&str, JsonValue); 2] = [
        ("0", json!({"total": 202, "data": bulk})),
        (
            "200",
            json!({
                "total": 202,
                "data": [
                    {"id": "g-1", "name": "web", "host_num": 3},
                    {"id": "g-2", "name": "db"},
                ],
            }),
        ),
    ];
    for (offset, body) in pages {
        Mock::given(method("GET"))
            .and(path(groups_path()))
            .and(query_param("offset", offset))
            .and(query_param("limit", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn create_finds_the_group_on_a_later_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(groups_path()))
        .and(body_json(json!({"name": "web"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "g-1"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_groups(&server).await;

    let resource = HostGroupResource::new(configure(&server, &["vss"]));
    let planned = Value::Value(HostGroupState {
        name: Value::Value("web".into()),
        ..Default::default()
    });
    let mut diags = Diagnostics::default();
    let (state, _) = resource
        .create(
            &mut diags,
            planned.clone(),
            planned,
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap_or_else(|| panic!("{}", error_details(&diags)));

    let Value::Value(state) = state else {
        panic!("created state is not known");
    };
    assert_eq!(state.id.as_str(), "g-1");
    assert_eq!(state.region.as_str(), REGION);
    assert_eq!(state.host_num, Value::Value(3));
}

#[tokio::test]
async fn create_without_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(groups_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let resource = HostGroupResource::new(configure(&server, &["vss"]));
    let planned = Value::Value(HostGroupState {
        name: Value::Value("web".into()),
        ..Default::default()
    });
    let mut diags = Diagnostics::default();
    let created = resource
        .create(
            &mut diags,
            planned.clone(),
            planned,
            Default::default(),
            Default::default(),
        )
        .await;

    assert!(created.is_none());
    let details = error_details(&diags);
    assert!(details.contains("unable to find id in the API response"), "{details}");
}

#[tokio::test]
async fn read_drops_a_missing_group() {
    let server = MockServer::start().await;
    mount_groups(&server).await;

    let resource = HostGroupResource::new(configure(&server, &["vss"]));
    let state = HostGroupState {
        id: Value::Value("g-9".into()),
        name: Value::Value("gone".into()),
        ..Default::default()
    };
    let mut diags = Diagnostics::default();
    let (state, _) = resource
        .read(&mut diags, Value::Value(state), Default::default(), Default::default())
        .await
        .unwrap_or_else(|| panic!("{}", error_details(&diags)));

    assert!(state.is_null());
}

#[tokio::test]
async fn delete_missing_group() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/g-1", groups_path())))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "VSS.1001",
            "error_msg": "group not found",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resource = HostGroupResource::new(configure(&server, &["vss"]));
    let state = HostGroupState {
        id: Value::Value("g-1".into()),
        name: Value::Value("web".into()),
        ..Default::default()
    };
    let mut diags = Diagnostics::default();
    let deleted = resource
        .destroy(
            &mut diags,
            Value::Value(state),
            Default::default(),
            Default::default(),
        )
        .await;

    assert_eq!(deleted, Some(()), "{}", error_details(&diags));
}

#[tokio::test]
async fn list_groups_by_name() {
    let server = MockServer::start().await;
    mount_groups(&server).await;

    let data_source = HostGroupsDataSource::new(configure(&server, &["vss"]));
    let config = HostGroupsState {
        name: Value::Value("db".into()),
        ..Default::default()
    };
    let mut diags = Diagnostics::default();
    let state = data_source
        .read(&mut diags, config, Default::default())
        .await
        .unwrap_or_else(|| panic!("{}", error_details(&diags)));

    let groups = state
        .groups
        .iter()
        .flatten()
        .filter_map(|group| group.as_ref_option())
        .map(|group| (group.id.as_str().to_owned(), group.host_num.clone()))
        .collect::<Vec<_>>();
    assert_eq!(groups, vec![("g-2".to_owned(), Value::Null)]);
    assert_eq!(state.region.as_str(), REGION);
}
