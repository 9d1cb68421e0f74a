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

//! Terraform provider for HuaweiCloud
//!
//! The provider exposes a handful of HuaweiCloud services (CAE, SWR, Organizations, GeminiDB,
//! CodeArts Inspector and SDRS) as Terraform resources and data sources, on top of the
//! [`tf_provider`] plugin framework.
//!
//! Every resource goes through the same layers: a [`config::Config`] shared by all resources
//! builds signed [`client::ServiceClient`]s, remote failures are decoded into
//! [`error::ApiError`], and long running operations are awaited with [`job::wait`].

pub mod cae;
pub mod client;
pub mod codearts_inspector;
pub mod config;
pub mod error;
pub mod geminidb;
pub mod job;
pub mod organizations;
pub mod sdrs;
pub mod swr;
pub mod tags;

mod provider;
mod utils;

pub use provider::HuaweiCloudProvider;
pub use utils::StateTimeouts;
