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

use std::ffi::CStr;

/// Compiled-in constants for framework binding and registry queries
pub struct ProbeConfig;

impl ProbeConfig {
    // Framework locations
    pub const CORE_FOUNDATION_PATH: &'static str =
        "/System/Library/Frameworks/CoreFoundation.framework/CoreFoundation";
    pub const IOKIT_PATH: &'static str = "/System/Library/Frameworks/IOKit.framework/IOKit";

    // Registry
    pub const GPU_SERVICE_CLASS: &'static str = "IOAccelerator";
    pub const SERVICE_PLANE: &'static CStr = c"IOService";
    pub const MAIN_PORT_DEFAULT: u32 = 0; // kIOMainPortDefault
    pub const KERN_SUCCESS: i32 = 0;
    pub const ITERATE_RECURSIVELY: u32 = 1; // kIORegistryIterateRecursively

    // Property keys
    pub const MODEL_KEY: &'static str = "model";
    pub const PERFORMANCE_STATISTICS_KEY: &'static str = "PerformanceStatistics";
    pub const DEVICE_UTILIZATION_KEY: &'static str = "Device Utilization %";
    pub const VENDOR_MARKER: &'static str = "Apple";

    // CoreFoundation
    pub const STRING_ENCODING_UTF8: u32 = 0x0800_0100; // kCFStringEncodingUTF8
    pub const NUMBER_SINT64_TYPE: isize = 4; // kCFNumberSInt64Type

    // CLI
    pub const DEFAULT_LOG_FILTER: &'static str = "gpu_probe=info";
    pub const LOG_PREFIX: &'static str = "GPU-PROBE";
}

/// Names used by the GPU queries.
///
/// Defaults come from [`ProbeConfig`]; tests and alternative registries can
/// override individual names with the builder methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub service_class: String,
    pub vendor_marker: String,
    pub model_key: String,
    pub statistics_key: String,
    pub utilization_key: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            service_class: ProbeConfig::GPU_SERVICE_CLASS.to_string(),
            vendor_marker: ProbeConfig::VENDOR_MARKER.to_string(),
            model_key: ProbeConfig::MODEL_KEY.to_string(),
            statistics_key: ProbeConfig::PERFORMANCE_STATISTICS_KEY.to_string(),
            utilization_key: ProbeConfig::DEVICE_UTILIZATION_KEY.to_string(),
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service_class(mut self, class: impl Into<String>) -> Self {
        self.service_class = class.into();
        self
    }

    pub fn vendor_marker(mut self, marker: impl Into<String>) -> Self {
        self.vendor_marker = marker.into();
        self
    }

    pub fn model_key(mut self, key: impl Into<String>) -> Self {
        self.model_key = key.into();
        self
    }

    pub fn utilization_keys(
        mut self,
        statistics_key: impl Into<String>,
        utilization_key: impl Into<String>,
    ) -> Self {
        self.statistics_key = statistics_key.into();
        self.utilization_key = utilization_key.into();
        self
    }
}
