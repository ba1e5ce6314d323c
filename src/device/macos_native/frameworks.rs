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

//! Runtime binding of the CoreFoundation and IOKit frameworks
//!
//! Both frameworks are opened with `libloading` and a fixed list of exports
//! is resolved into typed function pointers. Nothing is linked at build
//! time, so the crate builds on every host and simply reports
//! [`Error::Unsupported`] where the frameworks do not exist.
//!
//! Binding happens once per process through [`initialize`]. Missing
//! libraries or symbols are fatal for the process: there is no partially
//! bound table and no retry.

use crate::common::config::ProbeConfig;
use crate::error::{Error, Result};
use libloading::{Library, Symbol};
use once_cell::sync::OnceCell;
use std::ffi::{c_char, c_void};
use tracing::{debug, warn};

pub type CFTypeRef = *const c_void;
pub type CFStringRef = *const c_void;
pub type CFDictionaryRef = *const c_void;
pub type CFMutableDictionaryRef = *mut c_void;
pub type CFAllocatorRef = *const c_void;
pub type CFIndex = isize;
pub type CFTypeID = usize;
pub type CFStringEncoding = u32;
pub type CFNumberType = CFIndex;
/// CoreFoundation `Boolean` is an unsigned char
pub type Boolean = u8;

pub type MachPort = u32;
pub type IoObject = u32;
pub type IoIterator = u32;
pub type IoRegistryEntry = u32;
pub type IoOptionBits = u32;
pub type KernReturn = i32;

/// Null allocator selects kCFAllocatorDefault
pub const CF_ALLOCATOR_DEFAULT: CFAllocatorRef = std::ptr::null();

// --- CoreFoundation signatures ---

type CFStringCreateWithCStringFn =
    unsafe extern "C" fn(CFAllocatorRef, *const c_char, CFStringEncoding) -> CFStringRef;
type CFGetTypeIDFn = unsafe extern "C" fn(CFTypeRef) -> CFTypeID;
type CFTypeIDFn = unsafe extern "C" fn() -> CFTypeID;
type CFStringGetLengthFn = unsafe extern "C" fn(CFStringRef) -> CFIndex;
type CFStringGetMaximumSizeForEncodingFn =
    unsafe extern "C" fn(CFIndex, CFStringEncoding) -> CFIndex;
type CFStringGetCStringFn =
    unsafe extern "C" fn(CFStringRef, *mut c_char, CFIndex, CFStringEncoding) -> Boolean;
type CFDictionaryGetValueFn = unsafe extern "C" fn(CFDictionaryRef, *const c_void) -> *const c_void;
type CFNumberGetValueFn = unsafe extern "C" fn(CFTypeRef, CFNumberType, *mut c_void) -> Boolean;
type CFReleaseFn = unsafe extern "C" fn(CFTypeRef);

// --- IOKit signatures ---

type IOServiceMatchingFn = unsafe extern "C" fn(*const c_char) -> CFMutableDictionaryRef;
type IOServiceGetMatchingServicesFn =
    unsafe extern "C" fn(MachPort, CFDictionaryRef, *mut IoIterator) -> KernReturn;
type IOIteratorNextFn = unsafe extern "C" fn(IoIterator) -> IoObject;
type IORegistryEntrySearchCFPropertyFn = unsafe extern "C" fn(
    IoRegistryEntry,
    *const c_char, // plane name
    CFStringRef,   // key
    CFAllocatorRef,
    IoOptionBits,
) -> CFTypeRef;
type IOObjectReleaseFn = unsafe extern "C" fn(IoObject) -> KernReturn;

/// CoreFoundation exports used by the property reader
#[derive(Clone, Copy)]
pub struct CoreFoundationFns {
    pub string_create_with_c_string: CFStringCreateWithCStringFn,
    pub get_type_id: CFGetTypeIDFn,
    pub string_get_type_id: CFTypeIDFn,
    pub string_get_length: CFStringGetLengthFn,
    pub string_get_maximum_size_for_encoding: CFStringGetMaximumSizeForEncodingFn,
    pub string_get_c_string: CFStringGetCStringFn,
    pub dictionary_get_type_id: CFTypeIDFn,
    pub dictionary_get_value: CFDictionaryGetValueFn,
    pub number_get_type_id: CFTypeIDFn,
    pub number_get_value: CFNumberGetValueFn,
    pub release: CFReleaseFn,
}

/// IOKit exports used by the registry walker
#[derive(Clone, Copy)]
pub struct IoKitFns {
    pub service_matching: IOServiceMatchingFn,
    pub service_get_matching_services: IOServiceGetMatchingServicesFn,
    pub iterator_next: IOIteratorNextFn,
    pub registry_entry_search_cf_property: IORegistryEntrySearchCFPropertyFn,
    pub object_release: IOObjectReleaseFn,
}

/// Fully bound symbol table.
///
/// The libraries are kept open for as long as the table lives, which for the
/// process-wide instance is the lifetime of the process. A table built from
/// in-process functions has no libraries behind it.
pub struct Frameworks {
    pub cf: CoreFoundationFns,
    pub io: IoKitFns,
    _core_foundation: Option<Library>,
    _iokit: Option<Library>,
}

impl std::fmt::Debug for Frameworks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frameworks").finish_non_exhaustive()
    }
}

static FRAMEWORKS: OnceCell<Option<Frameworks>> = OnceCell::new();

/// Whether this build targets the only platform the registry API exists on.
pub const fn is_supported_platform() -> bool {
    cfg!(all(target_os = "macos", target_arch = "aarch64"))
}

impl Frameworks {
    /// Open both frameworks and resolve every required export.
    pub fn load() -> Result<Self> {
        if !is_supported_platform() {
            return Err(Error::Unsupported);
        }

        let core_foundation = open_library(ProbeConfig::CORE_FOUNDATION_PATH)?;
        let iokit = open_library(ProbeConfig::IOKIT_PATH)?;

        let cf_path = ProbeConfig::CORE_FOUNDATION_PATH;
        let cf = CoreFoundationFns {
            string_create_with_c_string: resolve(
                &core_foundation,
                cf_path,
                "CFStringCreateWithCString",
            )?,
            get_type_id: resolve(&core_foundation, cf_path, "CFGetTypeID")?,
            string_get_type_id: resolve(&core_foundation, cf_path, "CFStringGetTypeID")?,
            string_get_length: resolve(&core_foundation, cf_path, "CFStringGetLength")?,
            string_get_maximum_size_for_encoding: resolve(
                &core_foundation,
                cf_path,
                "CFStringGetMaximumSizeForEncoding",
            )?,
            string_get_c_string: resolve(&core_foundation, cf_path, "CFStringGetCString")?,
            dictionary_get_type_id: resolve(&core_foundation, cf_path, "CFDictionaryGetTypeID")?,
            dictionary_get_value: resolve(&core_foundation, cf_path, "CFDictionaryGetValue")?,
            number_get_type_id: resolve(&core_foundation, cf_path, "CFNumberGetTypeID")?,
            number_get_value: resolve(&core_foundation, cf_path, "CFNumberGetValue")?,
            release: resolve(&core_foundation, cf_path, "CFRelease")?,
        };

        let io_path = ProbeConfig::IOKIT_PATH;
        let io = IoKitFns {
            service_matching: resolve(&iokit, io_path, "IOServiceMatching")?,
            service_get_matching_services: resolve(
                &iokit,
                io_path,
                "IOServiceGetMatchingServices",
            )?,
            iterator_next: resolve(&iokit, io_path, "IOIteratorNext")?,
            registry_entry_search_cf_property: resolve(
                &iokit,
                io_path,
                "IORegistryEntrySearchCFProperty",
            )?,
            object_release: resolve(&iokit, io_path, "IOObjectRelease")?,
        };

        debug!("Frameworks: all symbols resolved");

        Ok(Self {
            cf,
            io,
            _core_foundation: Some(core_foundation),
            _iokit: Some(iokit),
        })
    }

    /// Table over functions that live in this process.
    #[cfg(test)]
    pub(crate) fn from_fns(cf: CoreFoundationFns, io: IoKitFns) -> Self {
        Self {
            cf,
            io,
            _core_foundation: None,
            _iokit: None,
        }
    }
}

fn open_library(path: &'static str) -> Result<Library> {
    debug!("Frameworks: loading {path}");
    // SAFETY: system frameworks have no initializers with preconditions on
    // the caller; loading them is what the dynamic linker would do anyway.
    unsafe { Library::new(path) }.map_err(|source| Error::LibraryLoad { path, source })
}

/// Resolve one export into a function pointer of type `T`.
///
/// The pointer is copied out of the `Symbol`, so it stays valid only while
/// `library` is loaded. `Frameworks` owns both libraries for that reason.
fn resolve<T: Copy>(library: &Library, path: &'static str, symbol: &'static str) -> Result<T> {
    // SAFETY: `T` is one of the signature aliases above, each matching the
    // framework's public C declaration.
    let sym: Symbol<T> = unsafe { library.get(symbol.as_bytes()) }.map_err(|source| {
        Error::SymbolMissing {
            symbol,
            path,
            source,
        }
    })?;
    Ok(*sym)
}

/// Bind the frameworks for this process.
///
/// The first call does the work. A failure is returned to that first caller
/// and logged; every later call, and every query, then sees
/// [`Error::Unsupported`].
pub fn initialize() -> Result<&'static Frameworks> {
    let mut failure = None;
    let slot = FRAMEWORKS.get_or_init(|| match Frameworks::load() {
        Ok(frameworks) => Some(frameworks),
        Err(e) => {
            warn!("GPU framework binding failed: {e}");
            failure = Some(e);
            None
        }
    });

    match (slot, failure) {
        (Some(frameworks), _) => Ok(frameworks),
        (None, Some(e)) => Err(e),
        (None, None) => Err(Error::Unsupported),
    }
}

/// The bound symbol table, if [`initialize`] has succeeded.
pub fn get() -> Option<&'static Frameworks> {
    FRAMEWORKS.get().and_then(Option::as_ref)
}
