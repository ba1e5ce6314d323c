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

//! Native macOS registry access for Apple Silicon GPUs
//!
//! CoreFoundation and IOKit are opened at runtime rather than linked, so
//! these modules compile on every host. Only macOS on aarch64 binds
//! successfully; elsewhere every query reports `Error::Unsupported`.
//!
//! ## Modules
//! - `frameworks`: library loading and the typed symbol table
//! - `registry`: service iteration with scoped handle release
//! - `property`: typed property reads from a service object

pub mod frameworks;
mod property;
pub mod registry;
#[cfg(test)]
pub(crate) mod test_support;

pub use frameworks::{initialize, is_supported_platform, Frameworks};
pub use property::decode_c_buffer;
pub use registry::{IoKitRegistry, ServiceIterator, ServiceObject};
