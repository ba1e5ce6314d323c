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

//! IOKit registry walker
//!
//! `ServiceIterator` and `ServiceObject` own one kernel reference each and
//! give it back with `IOObjectRelease` exactly once. The iterator releases
//! its handle as soon as `IOIteratorNext` reports exhaustion, or on drop if
//! the caller stops early.

use super::frameworks::{Frameworks, IoIterator, IoObject};
use super::property;
use crate::common::config::ProbeConfig;
use crate::device::traits::ServiceRegistry;
use crate::device::PropertyValue;
use crate::error::{Error, PropertyError, Result};
use std::ffi::CString;
use tracing::debug;

/// Cursor over the services matching one class name
pub struct ServiceIterator<'fw> {
    frameworks: &'fw Frameworks,
    // None once exhausted and released
    handle: Option<IoIterator>,
}

impl<'fw> ServiceIterator<'fw> {
    /// Match every registered service of `class`.
    pub fn open(frameworks: &'fw Frameworks, class: &str) -> Result<Self> {
        let match_error = |code| Error::ServiceMatch {
            class: class.to_string(),
            code,
        };
        let name = CString::new(class).map_err(|_| match_error(-1))?;

        // SAFETY: `name` is a valid C string for the duration of the call.
        let matching = unsafe { (frameworks.io.service_matching)(name.as_ptr()) };
        if matching.is_null() {
            return Err(match_error(-1));
        }

        let mut iterator: IoIterator = 0;
        // SAFETY: IOServiceGetMatchingServices consumes one reference to
        // `matching` whatever the outcome, so it is not released here.
        let kr = unsafe {
            (frameworks.io.service_get_matching_services)(
                ProbeConfig::MAIN_PORT_DEFAULT,
                matching,
                &mut iterator,
            )
        };
        if kr != ProbeConfig::KERN_SUCCESS {
            return Err(match_error(kr));
        }

        debug!("Registry: opened iterator {iterator} for {class}");
        Ok(Self {
            frameworks,
            handle: Some(iterator),
        })
    }

    /// Whether the iterator has run out and given its handle back.
    pub fn is_exhausted(&self) -> bool {
        self.handle.is_none()
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            // SAFETY: `handle` came from IOServiceGetMatchingServices and
            // `take` guarantees it is released only once.
            unsafe {
                (self.frameworks.io.object_release)(handle);
            }
        }
    }
}

impl<'fw> Iterator for ServiceIterator<'fw> {
    type Item = ServiceObject<'fw>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.handle?;

        // SAFETY: `handle` is a live iterator owned by `self`.
        let object = unsafe { (self.frameworks.io.iterator_next)(handle) };
        if object == 0 {
            self.release();
            return None;
        }

        Some(ServiceObject {
            frameworks: self.frameworks,
            handle: object,
        })
    }
}

impl Drop for ServiceIterator<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// One registry service node returned by [`ServiceIterator`]
pub struct ServiceObject<'fw> {
    frameworks: &'fw Frameworks,
    handle: IoObject,
}

impl ServiceObject<'_> {
    /// Read `key` from this service, searching child nodes recursively.
    pub fn read(
        &self,
        key: &str,
        nested_key: Option<&str>,
    ) -> std::result::Result<PropertyValue, PropertyError> {
        property::read(self.frameworks, self.handle, key, nested_key)
    }
}

impl Drop for ServiceObject<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by IOIteratorNext with a +1
        // reference that this guard owns.
        unsafe {
            (self.frameworks.io.object_release)(self.handle);
        }
    }
}

/// [`ServiceRegistry`] backed by the live IOKit registry
#[derive(Debug, Clone, Copy)]
pub struct IoKitRegistry<'fw> {
    frameworks: &'fw Frameworks,
}

impl<'fw> IoKitRegistry<'fw> {
    pub fn new(frameworks: &'fw Frameworks) -> Self {
        Self { frameworks }
    }
}

impl<'fw> ServiceRegistry for IoKitRegistry<'fw> {
    type Service = ServiceObject<'fw>;
    type Services = ServiceIterator<'fw>;

    fn services(&self, class: &str) -> Result<Self::Services> {
        ServiceIterator::open(self.frameworks, class)
    }

    fn read_property(
        &self,
        service: &Self::Service,
        key: &str,
        nested_key: Option<&str>,
    ) -> std::result::Result<PropertyValue, PropertyError> {
        service.read(key, nested_key)
    }
}
