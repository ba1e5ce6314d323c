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

//! Log sink for the gpu-probe binary
//!
//! Lines go to stderr as `GPU-PROBE@<local time>>> <message>`. The library
//! only emits `tracing` events; installing this sink is up to the binary.

use crate::common::config::ProbeConfig;
use chrono::{Local, NaiveDateTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static LOGGING_INIT: Once = Once::new();

/// Timer that renders the fixed line prefix in place of a timestamp
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixedTimer;

impl FormatTime for PrefixedTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", log_prefix(Local::now().naive_local()))
    }
}

/// Line prefix for a given local time.
pub fn log_prefix(now: NaiveDateTime) -> String {
    format!(
        "{}@{}>>",
        ProbeConfig::LOG_PREFIX,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Formatting layer writing prefixed lines to `writer` while `gate` is set.
fn sink_layer<S, W>(writer: W, gate: &'static AtomicBool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_timer(PrefixedTimer)
        .with_target(false)
        .with_filter(filter::filter_fn(move |_| gate.load(Ordering::Relaxed)))
}

/// Install the global subscriber. Only the first call has any effect.
pub fn init_logging(enabled: bool) {
    LOGGING_INIT.call_once(|| {
        LOGGING_ENABLED.store(enabled, Ordering::Relaxed);

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| ProbeConfig::DEFAULT_LOG_FILTER.into());

        // Another subscriber may already be installed (e.g. by an embedding
        // application); keep that one.
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(sink_layer(std::io::stderr, &LOGGING_ENABLED))
            .try_init();
    });
}

pub fn set_enabled(enabled: bool) {
    LOGGING_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    LOGGING_ENABLED.load(Ordering::Relaxed)
}
