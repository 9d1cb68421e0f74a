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

//! Resource tags, as sent to and read from the tag APIs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tf_provider::value::{ValueMap, ValueString};

use crate::utils::{string_map, string_map_value};

pub type Tags = BTreeMap<String, String>;

/// Tag as exchanged with the APIs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Changes to apply to go from `old` to `new`, as `(remove, add)`
///
/// A tag whose value changed is both removed and added again.
pub fn diff(old: &Tags, new: &Tags) -> (Vec<Tag>, Vec<Tag>) {
    let remove = old
        .iter()
        .filter(|(key, value)| new.get(*key) != Some(*value))
        .map(|(key, value)| Tag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    let add = new
        .iter()
        .filter(|(key, value)| old.get(*key) != Some(*value))
        .map(|(key, value)| Tag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    (remove, add)
}

pub fn flatten(list: &[Tag]) -> Tags {
    list.iter()
        .map(|tag| (tag.key.clone(), tag.value.clone()))
        .collect()
}

/// Tag list sorted by key
pub fn expand(tags: &Tags) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

/// Tags declared in a Terraform map attribute
pub fn from_state(value: &ValueMap<'_, ValueString<'_>>) -> Tags {
    string_map(value)
}

pub fn to_state<'a>(tags: Tags) -> ValueMap<'a, ValueString<'a>> {
    string_map_value(tags)
}
