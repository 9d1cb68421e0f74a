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

//! Cloud Application Engine

mod component;
mod environment;
mod environments;
mod job;

pub use component::{ComponentResource, ComponentState};
pub use environment::{EnvironmentResource, EnvironmentState};
pub use environments::{EnvironmentsDataSource, EnvironmentsState};
pub use job::CaeJobs;

use crate::error::NotFoundCodes;

pub const SERVICE: &str = "cae";

pub const HEADER_ENVIRONMENT_ID: &str = "X-Environment-Id";
pub const HEADER_ENTERPRISE_PROJECT_ID: &str = "X-Enterprise-Project-ID";

/// Codes returned for missing environments and components
pub const NOT_FOUND_CODES: NotFoundCodes = &["CAE.01500208", "CAE.01500404", "CAE.01500000"];
