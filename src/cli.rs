// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
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

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Suppress log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List Apple GPU models found in the IOKit registry.
    Models,
    /// Sample GPU utilization.
    Usage(UsageArgs),
}

#[derive(Parser, Clone)]
pub struct UsageArgs {
    /// Seconds between samples. Without it a single sample is taken.
    #[arg(short, long)]
    pub interval: Option<u64>,
    /// Number of samples to take when an interval is given.
    #[arg(short, long, default_value_t = 1)]
    pub count: u32,
}
