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

//! Registry property reads
//!
//! `IORegistryEntrySearchCFProperty` hands back a `CFTypeRef` of unknown
//! type. The reader looks at `CFGetTypeID` once, right after the search, and
//! decodes:
//! - `CFString` into [`PropertyValue::Text`]
//! - `CFDictionary` into [`PropertyValue::Integer`] by looking up a nested
//!   `CFNumber`
//!
//! Every other type is a [`PropertyError::TypeMismatch`].

use super::frameworks::{
    CFIndex, CFStringRef, CFTypeID, CFTypeRef, CoreFoundationFns, Frameworks, IoRegistryEntry,
    CF_ALLOCATOR_DEFAULT,
};
use crate::common::config::ProbeConfig;
use crate::device::PropertyValue;
use crate::error::PropertyError;
use std::ffi::{c_void, CString};

/// Owned CoreFoundation reference (create rule), released on drop
struct CfRef<'fw> {
    cf: &'fw CoreFoundationFns,
    ptr: CFTypeRef,
}

impl<'fw> CfRef<'fw> {
    /// Take ownership of `ptr`, or `None` when it is null.
    fn from_create_rule(cf: &'fw CoreFoundationFns, ptr: CFTypeRef) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(Self { cf, ptr })
        }
    }

    fn as_ptr(&self) -> CFTypeRef {
        self.ptr
    }

    fn type_id(&self) -> CFTypeID {
        // SAFETY: `ptr` is a live, non-null CF object.
        unsafe { (self.cf.get_type_id)(self.ptr) }
    }
}

impl Drop for CfRef<'_> {
    fn drop(&mut self) {
        // SAFETY: we own exactly one reference and never hand it out.
        unsafe { (self.cf.release)(self.ptr) }
    }
}

/// Runtime type of a property reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyKind {
    String,
    Dictionary,
    Other(CFTypeID),
}

fn classify(cf: &CoreFoundationFns, value: &CfRef<'_>) -> PropertyKind {
    let type_id = value.type_id();
    // SAFETY: parameterless type id getters.
    let (string_id, dictionary_id) =
        unsafe { ((cf.string_get_type_id)(), (cf.dictionary_get_type_id)()) };

    if type_id == string_id {
        PropertyKind::String
    } else if type_id == dictionary_id {
        PropertyKind::Dictionary
    } else {
        PropertyKind::Other(type_id)
    }
}

fn create_cf_string<'fw>(
    cf: &'fw CoreFoundationFns,
    text: &str,
) -> Result<CfRef<'fw>, PropertyError> {
    let malformed = |reason| PropertyError::Malformed {
        key: text.to_string(),
        reason,
    };
    let c_text = CString::new(text).map_err(|_| malformed("key contains a NUL byte"))?;

    // SAFETY: `c_text` is NUL-terminated UTF-8 and outlives the call.
    let ptr = unsafe {
        (cf.string_create_with_c_string)(
            CF_ALLOCATOR_DEFAULT,
            c_text.as_ptr(),
            ProbeConfig::STRING_ENCODING_UTF8,
        )
    };
    CfRef::from_create_rule(cf, ptr).ok_or_else(|| malformed("CFStringCreateWithCString failed"))
}

/// Read `key` from `entry`, searching its children in the service plane.
///
/// `nested_key` selects a numeric entry when the property is a dictionary.
pub(crate) fn read(
    frameworks: &Frameworks,
    entry: IoRegistryEntry,
    key: &str,
    nested_key: Option<&str>,
) -> Result<PropertyValue, PropertyError> {
    let cf = &frameworks.cf;
    let cf_key = create_cf_string(cf, key)?;

    // SAFETY: `entry` is a live registry object owned by the caller and all
    // pointer arguments are valid for the duration of the call.
    let raw = unsafe {
        (frameworks.io.registry_entry_search_cf_property)(
            entry,
            ProbeConfig::SERVICE_PLANE.as_ptr(),
            cf_key.as_ptr(),
            CF_ALLOCATOR_DEFAULT,
            ProbeConfig::ITERATE_RECURSIVELY,
        )
    };
    let value = CfRef::from_create_rule(cf, raw).ok_or_else(|| PropertyError::NotFound {
        key: key.to_string(),
    })?;

    match (classify(cf, &value), nested_key) {
        (PropertyKind::String, _) => {
            copy_string(cf, value.as_ptr()).map(PropertyValue::Text).map_err(|reason| {
                PropertyError::Malformed {
                    key: key.to_string(),
                    reason,
                }
            })
        }
        (PropertyKind::Dictionary, Some(nested_key)) => {
            read_nested_number(cf, value.as_ptr(), nested_key).map(PropertyValue::Integer)
        }
        (PropertyKind::Dictionary, None) => Err(PropertyError::TypeMismatch {
            key: key.to_string(),
            type_id: value.type_id(),
        }),
        (PropertyKind::Other(type_id), _) => Err(PropertyError::TypeMismatch {
            key: key.to_string(),
            type_id,
        }),
    }
}

/// Copy a CFString out as UTF-8.
fn copy_string(cf: &CoreFoundationFns, string: CFStringRef) -> Result<String, &'static str> {
    // SAFETY: `string` is a live CFString for the whole function.
    unsafe {
        let length = (cf.string_get_length)(string);
        let max_size =
            (cf.string_get_maximum_size_for_encoding)(length, ProbeConfig::STRING_ENCODING_UTF8);
        if max_size < 0 {
            return Err("string too long to convert");
        }

        // One extra byte for the terminator written by CFStringGetCString
        let capacity = max_size as usize + 1;
        let mut buffer = vec![0u8; capacity];
        let ok = (cf.string_get_c_string)(
            string,
            buffer.as_mut_ptr().cast(),
            capacity as CFIndex,
            ProbeConfig::STRING_ENCODING_UTF8,
        );
        if ok == 0 {
            return Err("UTF-8 conversion failed");
        }

        decode_c_buffer(buffer)
    }
}

/// Turn a NUL-terminated buffer into a `String`, dropping the terminator
/// and any slack after it.
pub fn decode_c_buffer(mut buffer: Vec<u8>) -> Result<String, &'static str> {
    if let Some(end) = buffer.iter().position(|&b| b == 0) {
        buffer.truncate(end);
    }
    String::from_utf8(buffer).map_err(|_| "invalid UTF-8")
}

/// Look up `nested_key` in `dictionary` and decode it as a 64-bit integer.
fn read_nested_number(
    cf: &CoreFoundationFns,
    dictionary: CFTypeRef,
    nested_key: &str,
) -> Result<i64, PropertyError> {
    let cf_nested_key = create_cf_string(cf, nested_key)?;
    let malformed = |reason| PropertyError::Malformed {
        key: nested_key.to_string(),
        reason,
    };

    // SAFETY: `dictionary` is a live CFDictionary owned by the caller. The
    // returned value follows the get rule and is not released here.
    unsafe {
        let value = (cf.dictionary_get_value)(dictionary, cf_nested_key.as_ptr());
        if value.is_null() {
            return Err(PropertyError::KeyAbsent {
                key: nested_key.to_string(),
            });
        }

        if (cf.get_type_id)(value) != (cf.number_get_type_id)() {
            return Err(malformed("not a CFNumber"));
        }

        let mut number: i64 = 0;
        let ok = (cf.number_get_value)(
            value,
            ProbeConfig::NUMBER_SINT64_TYPE,
            &mut number as *mut i64 as *mut c_void,
        );
        if ok == 0 {
            return Err(malformed("CFNumberGetValue failed"));
        }
        Ok(number)
    }
}
