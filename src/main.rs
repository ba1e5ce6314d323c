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

mod cli;

use clap::Parser;
use cli::{Cli, Commands, UsageArgs};
use gpu_probe::device::GpuSummary;
use gpu_probe::gpu;
use gpu_probe::utils::init_logging;
use serde::Serialize;
use std::error::Error;
use std::thread;
use std::time::Duration;
use tracing::error;

fn main() {
    let cli = Cli::parse();
    init_logging(!cli.quiet);

    if let Err(e) = gpu::initialize() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Some(Commands::Models) => print_models(cli.json),
        Some(Commands::Usage(args)) => print_usage(&args, cli.json),
        None => print_summary(cli.json),
    };

    if let Err(e) = result {
        error!("GPU query failed: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_models(json: bool) -> Result<(), Box<dyn Error>> {
    let models = gpu::device_models()?;
    if json {
        return print_json(&models);
    }
    for model in &models {
        println!("{model}");
    }
    Ok(())
}

fn print_usage(args: &UsageArgs, json: bool) -> Result<(), Box<dyn Error>> {
    let count = if args.interval.is_some() {
        args.count.max(1)
    } else {
        1
    };

    for i in 0..count {
        let samples = gpu::utilization()?;
        if json {
            print_json(&samples)?;
        } else {
            for percent in &samples {
                println!("{percent:.1}%");
            }
        }

        if let Some(interval) = args.interval {
            if i + 1 < count {
                thread::sleep(Duration::from_secs(interval));
            }
        }
    }
    Ok(())
}

fn print_summary(json: bool) -> Result<(), Box<dyn Error>> {
    let models = gpu::device_models()?;
    let (utilization, error) = match gpu::utilization() {
        Ok(samples) => (samples.first().copied(), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let summary = GpuSummary {
        models,
        utilization,
        error,
    };

    if json {
        return print_json(&summary);
    }
    if summary.models.is_empty() {
        println!("No Apple GPU found");
    }
    for model in &summary.models {
        println!("GPU: {model}");
    }
    match (&summary.utilization, &summary.error) {
        (Some(percent), _) => println!("Utilization: {percent:.1}%"),
        (None, Some(e)) => println!("Utilization: unavailable ({e})"),
        (None, None) => println!("Utilization: unavailable"),
    }
    Ok(())
}
