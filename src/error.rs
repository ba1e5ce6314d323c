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

//! Error types for the gpu-probe library.
//!
//! Two layers are distinguished:
//! - [`enum@Error`] covers framework binding, registry matching and the
//!   query-level outcomes returned by the public entry points.
//! - [`PropertyError`] covers a single property read on a single service
//!   object. The query loops absorb these and move on to the next object.
//!
//! # Example
//!
//! ```rust,no_run
//! use gpu_probe::{gpu, Result};
//!
//! fn main() -> Result<()> {
//!     gpu::initialize()?;
//!     for model in gpu::device_models()? {
//!         println!("{model}");
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for gpu-probe operations.
#[derive(Debug, Error)]
pub enum Error {
    /// GPU queries cannot run on this host.
    ///
    /// Returned by every entry point when the frameworks were never bound,
    /// or when binding failed earlier in the process.
    #[error("GPU queries are not supported on this host")]
    Unsupported,

    /// A framework could not be opened.
    #[error("Failed to load framework {path}: {source}")]
    LibraryLoad {
        path: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// A framework was opened but lacks a required export.
    #[error("Symbol {symbol} not found in {path}: {source}")]
    SymbolMissing {
        symbol: &'static str,
        path: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// The registry could not produce services for a class name.
    #[error("Error retrieving {class} services from the registry (kern_return {code})")]
    ServiceMatch { class: String, code: i32 },

    /// No device produced a utilization reading.
    #[error("No GPU device produced a utilization sample")]
    NoSample,

    /// A property read failed on the last device tried.
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Failure to read or decode one property of one service object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// The registry search returned no value for the key.
    #[error("Property {key} not found")]
    NotFound { key: String },

    /// The property is a dictionary without the requested entry.
    #[error("Key {key} absent from dictionary property")]
    KeyAbsent { key: String },

    /// The value exists but could not be converted.
    #[error("Malformed value for {key}: {reason}")]
    Malformed { key: String, reason: &'static str },

    /// The value has a runtime type this reader does not decode.
    #[error("Property {key} has unsupported type id {type_id}")]
    TypeMismatch { key: String, type_id: usize },
}

/// A specialized Result type for gpu-probe operations.
pub type Result<T> = std::result::Result<T, Error>;
