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

//! GPU model discovery and utilization sampling.
//!
//! [`GpuQuery`] runs both queries against any [`ServiceRegistry`]. The free
//! functions [`device_models`] and [`utilization`] run them against the live
//! IOKit registry once [`initialize`] has bound the system frameworks.
//!
//! # Example
//!
//! ```rust,no_run
//! use gpu_probe::gpu;
//!
//! if gpu::initialize().is_ok() {
//!     println!("{:?}", gpu::device_models());
//!     println!("{:?}", gpu::utilization());
//! }
//! ```
//!
//! # Known limitation
//!
//! `utilization` reports the first device with a non-zero reading. A device
//! that reads exactly 0% is skipped, so an idle GPU followed by a device
//! whose read fails surfaces as that failure.

use crate::common::config::QueryOptions;
use crate::device::macos_native::{frameworks, IoKitRegistry};
use crate::device::{PropertyValue, ServiceRegistry};
use crate::error::{Error, PropertyError, Result};
use crate::utils::remove_duplicates;
use tracing::debug;

/// Deduplication applied to the model list before it is returned
pub type Dedupe = fn(Vec<String>) -> Vec<String>;

/// Both GPU queries over one registry
pub struct GpuQuery<R> {
    registry: R,
    options: QueryOptions,
    dedupe: Dedupe,
}

impl<R: ServiceRegistry> GpuQuery<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            options: QueryOptions::default(),
            dedupe: remove_duplicates::<String>,
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_dedupe(mut self, dedupe: Dedupe) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Model names of every GPU service carrying the vendor marker.
    ///
    /// Services whose model cannot be read are skipped. Finding no services,
    /// or a registry that cannot match the class at all, yields an empty
    /// list rather than an error.
    pub fn device_models(&self) -> Result<Vec<String>> {
        let services = match self.registry.services(&self.options.service_class) {
            Ok(services) => services,
            Err(e @ Error::ServiceMatch { .. }) => {
                debug!("No GPU services: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut models = Vec::new();
        for service in services {
            match self
                .registry
                .read_property(&service, &self.options.model_key, None)
            {
                Ok(PropertyValue::Text(model)) if model.contains(&self.options.vendor_marker) => {
                    models.push(model);
                }
                Ok(other) => debug!("Ignoring GPU model {other:?}"),
                Err(e) => debug!("Skipping GPU service: {e}"),
            }
        }

        Ok((self.dedupe)(models))
    }

    /// Utilization percentage of the first GPU with a non-zero reading.
    ///
    /// Returns a single-element list. When every device read as zero the
    /// result is `[0.0]`; when reads failed the last failure is returned;
    /// when no device exists at all the result is [`Error::NoSample`].
    pub fn utilization(&self) -> Result<Vec<f64>> {
        let services = self.registry.services(&self.options.service_class)?;
        let statistics_key = self.options.statistics_key.as_str();
        let utilization_key = self.options.utilization_key.as_str();

        let mut last_error: Option<PropertyError> = None;
        let mut idle = false;

        for service in services {
            match self
                .registry
                .read_property(&service, statistics_key, Some(utilization_key))
            {
                Ok(PropertyValue::Integer(0)) => idle = true,
                Ok(PropertyValue::Integer(percent)) => return Ok(vec![percent as f64]),
                Ok(PropertyValue::Text(_)) => {
                    let e = PropertyError::Malformed {
                        key: statistics_key.to_string(),
                        reason: "expected a dictionary",
                    };
                    debug!("Skipping GPU service: {e}");
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!("Skipping GPU service: {e}");
                    last_error = Some(e);
                }
            }
        }

        match (last_error, idle) {
            (Some(e), _) => Err(e.into()),
            (None, true) => Ok(vec![0.0]),
            (None, false) => Err(Error::NoSample),
        }
    }
}

/// Bind the system frameworks. Call once at startup.
pub fn initialize() -> Result<()> {
    frameworks::initialize().map(|_| ())
}

fn native_query() -> Result<GpuQuery<IoKitRegistry<'static>>> {
    let frameworks = frameworks::get().ok_or(Error::Unsupported)?;
    Ok(GpuQuery::new(IoKitRegistry::new(frameworks)))
}

/// Apple GPU model names on this host, deduplicated.
pub fn device_models() -> Result<Vec<String>> {
    native_query()?.device_models()
}

/// Utilization of the first busy GPU on this host.
pub fn utilization() -> Result<Vec<f64>> {
    native_query()?.utilization()
}
