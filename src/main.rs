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

use std::str::FromStr;

use anyhow::Result;
use tf_provider::serve;
use tracing::Level;

use terraform_provider_huaweicloud::HuaweiCloudProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Without PLUGIN_LOG_FILE, logs go to stderr where Terraform collects them
    if std::env::var_os("PLUGIN_LOG_FILE").is_none() {
        let level = std::env::var("TF_LOG")
            .ok()
            .and_then(|level| Level::from_str(&level).ok())
            .unwrap_or(Level::INFO);
        _ = tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_max_level(level)
            .try_init();
    }

    serve("huaweicloud", HuaweiCloudProvider::default()).await
}
