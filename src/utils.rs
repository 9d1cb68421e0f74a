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

//! Schema, diagnostics and value helpers shared by resources

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tf_provider::{map, AttributePath, Diagnostics};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueMap, ValueString};
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::debug;

use crate::error::{ApiError, Result};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

/// Report an error into the diagnostics
pub(crate) trait ExtractDiagnostics {
    type Output;
    fn extract_diagnostics(self, diags: &mut Diagnostics, summary: &'static str) -> Self::Output;
}

impl<T> ExtractDiagnostics for Result<T> {
    type Output = Option<T>;
    fn extract_diagnostics(self, diags: &mut Diagnostics, summary: &'static str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                diags.root_error(summary, err.to_string());
                None
            }
        }
    }
}

/// Content of a resource state, which must be known
pub(crate) fn known<T>(state: Value<T>, diags: &mut Diagnostics) -> Option<T> {
    match state {
        Value::Value(state) => Some(state),
        Value::Null => {
            diags.root_error_short("Resource state is null");
            None
        }
        Value::Unknown => {
            diags.root_error_short("Resource state is unknown");
            None
        }
    }
}

/// Record `name` as a replacement trigger if it changed
pub(crate) fn replace_if_changed<T: PartialEq>(
    triggers: &mut Vec<AttributePath>,
    name: &'static str,
    prior: &T,
    proposed: &T,
) {
    if prior != proposed {
        triggers.push(AttributePath::new(name));
    }
}

/// Split an import ID made of `N` slash separated parts
pub(crate) fn parse_import_id<'a, const N: usize>(
    id: &'a str,
    format: &str,
) -> Result<[&'a str; N]> {
    let parts = id.split('/').collect::<Vec<_>>();
    match <[&str; N]>::try_from(parts) {
        Ok(parts) if parts.iter().all(|part| !part.is_empty()) => Ok(parts),
        _ => Err(ApiError::client(format!(
            "invalid import ID {id:?}, expected {format}"
        ))),
    }
}

/// Text of a string attribute, `None` when null, unknown or empty
pub(crate) fn non_empty<'a>(value: &'a ValueString<'_>) -> Option<&'a str> {
    value
        .as_ref_option()
        .map(|value| &**value)
        .filter(|value| !value.is_empty())
}

/// String attribute built from an optional JSON field
pub(crate) fn json_string<'a>(value: Option<&JsonValue>) -> ValueString<'a> {
    match value {
        Some(JsonValue::String(s)) => Value::Value(Cow::Owned(s.clone())),
        Some(JsonValue::Null) | None => Value::Null,
        Some(other) => Value::Value(Cow::Owned(other.to_string())),
    }
}

pub(crate) fn string_value<'a>(value: Option<String>) -> ValueString<'a> {
    value.map(Cow::Owned).into()
}

/// Known entries of a map of strings
pub(crate) fn string_map(value: &ValueMap<'_, ValueString<'_>>) -> BTreeMap<String, String> {
    value
        .iter()
        .flatten()
        .filter_map(|(key, value)| Some((key.to_string(), value.as_ref_option()?.to_string())))
        .collect()
}

pub(crate) fn string_map_value<'a>(map: BTreeMap<String, String>) -> ValueMap<'a, ValueString<'a>> {
    Value::Value(
        map.into_iter()
            .map(|(key, value)| (Cow::Owned(key), Value::Value(Cow::Owned(value))))
            .collect(),
    )
}

const ISO_LOCAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const SPACED_LOCAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
/// `+0800` style offset, without a colon
const COMPACT_OFFSET: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);

/// Normalize a timestamp returned by an API into RFC3339, in UTC
///
/// Epoch values (seconds or milliseconds), offsets without a colon and offset-less date times
/// are accepted. Unknown layouts are kept as is.
pub(crate) fn rfc3339(value: Option<&JsonValue>) -> Option<String> {
    let datetime = match value? {
        JsonValue::String(s) if s.is_empty() => return None,
        JsonValue::String(s) => OffsetDateTime::parse(s, &Rfc3339)
            .or_else(|_| OffsetDateTime::parse(s, COMPACT_OFFSET))
            .ok()
            .or_else(|| {
                PrimitiveDateTime::parse(s, ISO_LOCAL)
                    .or_else(|_| PrimitiveDateTime::parse(s, SPACED_LOCAL))
                    .ok()
                    .map(PrimitiveDateTime::assume_utc)
            }),
        JsonValue::Number(n) => n.as_i64().and_then(|n| {
            if n.abs() > 100_000_000_000 {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(n) * 1_000_000).ok()
            } else {
                OffsetDateTime::from_unix_timestamp(n).ok()
            }
        }),
        _ => None,
    };

    match datetime {
        Some(datetime) => datetime.to_offset(UtcOffset::UTC).format(&Rfc3339).ok(),
        None => {
            let raw = value.and_then(JsonValue::as_str)?;
            debug!(raw, "unknown timestamp layout, kept as is");
            Some(raw.to_owned())
        }
    }
}

/// Operation whose duration is bounded by the `timeouts` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateTimeouts<'a> {
    #[serde(borrow = "'a")]
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

impl<'a> StateTimeouts<'a> {
    /// `timeouts` nested block, to be stored with `value::serde_as_vec`
    pub(crate) fn block() -> NestedBlock {
        let attribute = |what: &str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(format!(
                "Maximum duration of the {what}, like \"10m\" or \"1h30m\""
            )),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        };
        NestedBlock::Optional(Block {
            attributes: map! {
                "create" => attribute("creation"),
                "update" => attribute("update"),
                "delete" => attribute("deletion"),
            },
            description: Description::plain("Timeouts of the operations"),
            ..Default::default()
        })
    }

    fn get(&self, operation: Operation) -> &ValueString<'a> {
        match operation {
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    pub(crate) fn validate(timeouts: &Value<Self>, diags: &mut Diagnostics) {
        let Some(timeouts) = timeouts.as_ref_option() else {
            return;
        };
        for (name, operation) in [
            ("create", Operation::Create),
            ("update", Operation::Update),
            ("delete", Operation::Delete),
        ] {
            if let Some(value) = non_empty(timeouts.get(operation)) {
                if let Err(err) = humantime::parse_duration(value) {
                    diags.error(
                        "Invalid timeout",
                        format!("{value:?} is not a valid duration: {err}"),
                        AttributePath::new("timeouts").index(0).attribute(name),
                    );
                }
            }
        }
    }
}

/// Timeout of an operation, from the `timeouts` block or the given default
pub(crate) fn timeout(
    timeouts: &Value<StateTimeouts<'_>>,
    operation: Operation,
    default: Duration,
) -> Result<Duration> {
    match timeouts.as_ref_option().and_then(|t| non_empty(t.get(operation))) {
        Some(value) => humantime::parse_duration(value)
            .map_err(|err| ApiError::client(format!("invalid timeout {value:?}: {err}"))),
        None => Ok(default),
    }
}
