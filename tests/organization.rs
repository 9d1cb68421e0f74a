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

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use pretty_assertions::assert_eq;
use serde_json::{json, Value as JsonValue};
use terraform_provider_huaweicloud::organizations::{OrganizationResource, OrganizationState};
use tf_provider::value::{Value, ValueMap, ValueSet, ValueString};
use tf_provider::{Diagnostics, Resource};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{configure, error_details};

const TAGS_PATH: &str = "/v1/organizations/organizations:roots/r-1/tags";

fn root(policy_types: JsonValue) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "roots": [{
            "id": "r-1",
            "name": "Root",
            "urn": "organizations::r-1",
            "policy_types": policy_types,
        }],
    }))
}

fn policy_types(types: &[&'static str]) -> ValueSet<ValueString<'static>> {
    Value::Value(
        types
            .iter()
            .map(|policy_type| Value::Value(Cow::Borrowed(*policy_type)))
            .collect(),
    )
}

fn root_tags(pairs: &[(&'static str, &'static str)]) -> ValueMap<'static, ValueString<'static>> {
    Value::Value(
        pairs
            .iter()
            .map(|(key, value)| (Cow::Borrowed(*key), Value::Value(Cow::Borrowed(*value))))
            .collect(),
    )
}

fn tags(state: &OrganizationState<'_>) -> BTreeMap<String, String> {
    state
        .root_tags
        .iter()
        .flatten()
        .map(|(key, value)| (key.to_string(), value.as_str().to_owned()))
        .collect()
}

async fn mount_organization(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organization": {
                "id": "o-1",
                "urn": "organizations::o-1",
                "management_account_id": "a-1",
                "management_account_name": "admin",
                "created_at": "2024-03-01T10:20:30Z",
            },
        })))
        .mount(server)
        .await;
}

async fn mount_tag_action(server: &MockServer, action: &str, tags: JsonValue) {
    Mock::given(method("POST"))
        .and(path(format!("{TAGS_PATH}/{action}")))
        .and(body_json(json!({ "tags": tags })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_tags_the_root() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/organizations"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"organization": {"id": "o-1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/organizations/roots"))
        .respond_with(root(json!([])))
        .mount(&server)
        .await;
    mount_tag_action(&server, "create", json!([{"key": "env", "value": "dev"}])).await;
    Mock::given(method("GET"))
        .and(path(TAGS_PATH))
        .and(query_param("limit", "2000"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"tags": [{"key": "env", "value": "dev"}]})),
        )
        .mount(&server)
        .await;
    mount_organization(&server).await;

    let planned = Value::Value(OrganizationState {
        root_tags: root_tags(&[("env", "dev")]),
        ..Default::default()
    });
    let resource = OrganizationResource::new(configure(&server, &["organizations"]));
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
    assert_eq!(state.id.as_str(), "o-1");
    assert_eq!(state.root_id.as_str(), "r-1");
    assert_eq!(state.master_account_name.as_str(), "admin");
    assert!(state.enabled_policy_types.is_null());
    assert_eq!(tags(&state), BTreeMap::from([("env".to_owned(), "dev".to_owned())]));
}

#[tokio::test]
async fn update_waits_for_policy_types() {
    let server = MockServer::start().await;
    // The first root fetch is for its ID, the second sees the enablement in progress
    Mock::given(method("GET"))
        .and(path("/v1/organizations/roots"))
        .respond_with(root(json!([
            {"type": "service_control_policy", "status": "enabled"},
            {"type": "tag_policy", "status": "pending_enable"},
        ])))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/organizations/roots"))
        .respond_with(root(json!([{"type": "tag_policy", "status": "enabled"}])))
        .expect(3)
        .mount(&server)
        .await;
    for (action, policy_type) in [("enable", "tag_policy"), ("disable", "service_control_policy")] {
        Mock::given(method("POST"))
            .and(path(format!("/v1/organizations/policies/{action}")))
            .and(body_json(json!({"policy_type": policy_type, "root_id": "r-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
    }
    mount_tag_action(&server, "delete", json!([{"key": "env", "value": "dev"}])).await;
    mount_tag_action(
        &server,
        "create",
        json!([{"key": "env", "value": "prod"}, {"key": "team", "value": "infra"}]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(TAGS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tags": [{"key": "env", "value": "prod"}, {"key": "team", "value": "infra"}],
        })))
        .mount(&server)
        .await;
    mount_organization(&server).await;

    let prior = OrganizationState {
        id: Value::Value("o-1".into()),
        enabled_policy_types: policy_types(&["service_control_policy"]),
        root_tags: root_tags(&[("env", "dev")]),
        root_id: Value::Value("r-1".into()),
        ..Default::default()
    };
    let planned = OrganizationState {
        enabled_policy_types: policy_types(&["tag_policy"]),
        root_tags: root_tags(&[("env", "prod"), ("team", "infra")]),
        ..prior.clone()
    };

    let resource = OrganizationResource::new(configure(&server, &["organizations"]));
    let mut diags = Diagnostics::default();
    let (state, _) = resource
        .update(
            &mut diags,
            Value::Value(prior),
            Value::Value(planned.clone()),
            Value::Value(planned),
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap_or_else(|| panic!("{}", error_details(&diags)));

    let Value::Value(state) = state else {
        panic!("updated state is not known");
    };
    let enabled = state
        .enabled_policy_types
        .iter()
        .flatten()
        .map(|policy_type| policy_type.as_str().to_owned())
        .collect::<BTreeSet<_>>();
    assert_eq!(enabled, BTreeSet::from(["tag_policy".to_owned()]));
    assert_eq!(
        tags(&state),
        BTreeMap::from([
            ("env".to_owned(), "prod".to_owned()),
            ("team".to_owned(), "infra".to_owned()),
        ])
    );
}

#[tokio::test]
async fn unexpected_policy_status_stops_the_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/organizations/roots"))
        .respond_with(root(json!([{"type": "tag_policy", "status": "pending_disable"}])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/organizations/policies/enable"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let prior = OrganizationState {
        id: Value::Value("o-1".into()),
        root_id: Value::Value("r-1".into()),
        ..Default::default()
    };
    let planned = OrganizationState {
        enabled_policy_types: policy_types(&["tag_policy"]),
        ..prior.clone()
    };

    let resource = OrganizationResource::new(configure(&server, &["organizations"]));
    let mut diags = Diagnostics::default();
    let updated = resource
        .update(
            &mut diags,
            Value::Value(prior),
            Value::Value(planned.clone()),
            Value::Value(planned),
            Default::default(),
            Default::default(),
        )
        .await;

    assert!(updated.is_none());
    let details = error_details(&diags);
    assert!(details.contains("unexpected policy status pending_disable"), "{details}");
}
