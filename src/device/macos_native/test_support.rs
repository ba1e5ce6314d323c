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

//! In-process stand-ins for the CoreFoundation and IOKit exports
//!
//! Objects live in a thread-local table keyed by fake pointer values, so each
//! test thread sees its own registry. Every owned reference handed out is
//! counted, as is every release. A release of something not owned, or an
//! `IOIteratorNext` on a released iterator, is counted as misuse.

use super::frameworks::{
    CFAllocatorRef, CFDictionaryRef, CFIndex, CFNumberType, CFStringEncoding, CFStringRef,
    CFTypeID, CFTypeRef, CoreFoundationFns, Frameworks, IoIterator, IoKitFns, IoObject,
    IoOptionBits, IoRegistryEntry, KernReturn, MachPort,
};
use crate::common::config::ProbeConfig;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::{c_char, c_void, CStr};

pub const STRING_TYPE_ID: CFTypeID = 7;
pub const DICTIONARY_TYPE_ID: CFTypeID = 18;
pub const NUMBER_TYPE_ID: CFTypeID = 22;
pub const ARRAY_TYPE_ID: CFTypeID = 19;

const ITERATOR_HANDLE: IoIterator = 0x7700;

/// Property value served by the fake registry
#[derive(Debug, Clone)]
pub enum FakeValue {
    Text(String),
    Number(i64),
    Dictionary(Vec<(String, FakeValue)>),
    /// Any CF type the reader does not decode
    Array,
}

impl FakeValue {
    pub fn text(text: &str) -> Self {
        FakeValue::Text(text.to_string())
    }

    pub fn dictionary(entries: &[(&str, FakeValue)]) -> Self {
        FakeValue::Dictionary(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        )
    }
}

enum Object {
    Text(String),
    Number(i64),
    Dictionary(Vec<(String, usize)>),
    Array,
}

/// Reference counts observed by the fakes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub acquired: usize,
    pub released: usize,
    pub misuse: usize,
}

impl Counts {
    pub fn balanced(&self) -> bool {
        self.acquired == self.released && self.misuse == 0
    }
}

#[derive(Default)]
struct State {
    objects: HashMap<usize, Object>,
    next_ptr: usize,
    cf_owned: HashSet<usize>,
    cf: Counts,
    // Properties keyed by name, per registry entry
    properties: HashMap<IoRegistryEntry, HashMap<String, FakeValue>>,
    match_code: KernReturn,
    services: VecDeque<IoObject>,
    io_live: HashSet<u32>,
    io: Counts,
}

impl State {
    fn alloc(&mut self, object: Object) -> usize {
        self.next_ptr += 16;
        let ptr = 0x1000 + self.next_ptr;
        self.objects.insert(ptr, object);
        ptr
    }

    fn build(&mut self, value: &FakeValue) -> usize {
        let object = match value {
            FakeValue::Text(text) => Object::Text(text.clone()),
            FakeValue::Number(number) => Object::Number(*number),
            FakeValue::Array => Object::Array,
            FakeValue::Dictionary(entries) => Object::Dictionary(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), self.build(value)))
                    .collect(),
            ),
        };
        self.alloc(object)
    }

    fn own(&mut self, ptr: usize) {
        self.cf_owned.insert(ptr);
        self.cf.acquired += 1;
    }

    fn text(&self, ptr: usize) -> Option<&str> {
        match self.objects.get(&ptr) {
            Some(Object::Text(text)) => Some(text),
            _ => None,
        }
    }
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Reset this thread's registry and return a symbol table over the fakes.
pub fn install() -> Frameworks {
    with_state(|state| *state = State::default());
    Frameworks::from_fns(core_foundation_fns(), iokit_fns())
}

/// Serve `value` for `key` on registry entry `entry`.
pub fn set_property(entry: IoRegistryEntry, key: &str, value: FakeValue) {
    with_state(|state| {
        state
            .properties
            .entry(entry)
            .or_default()
            .insert(key.to_string(), value);
    });
}

/// Services returned, in order, by the next matching iterator.
pub fn set_services(services: &[IoObject]) {
    with_state(|state| state.services = services.iter().copied().collect());
}

/// Result code for IOServiceGetMatchingServices.
pub fn set_match_code(code: KernReturn) {
    with_state(|state| state.match_code = code);
}

pub fn cf_counts() -> Counts {
    with_state(|state| state.cf)
}

pub fn io_counts() -> Counts {
    with_state(|state| state.io)
}

fn core_foundation_fns() -> CoreFoundationFns {
    CoreFoundationFns {
        string_create_with_c_string,
        get_type_id,
        string_get_type_id,
        string_get_length,
        string_get_maximum_size_for_encoding,
        string_get_c_string,
        dictionary_get_type_id,
        dictionary_get_value,
        number_get_type_id,
        number_get_value,
        release,
    }
}

fn iokit_fns() -> IoKitFns {
    IoKitFns {
        service_matching,
        service_get_matching_services,
        iterator_next,
        registry_entry_search_cf_property,
        object_release,
    }
}

// --- CoreFoundation ---

unsafe extern "C" fn string_create_with_c_string(
    _allocator: CFAllocatorRef,
    text: *const c_char,
    _encoding: CFStringEncoding,
) -> CFStringRef {
    let text = CStr::from_ptr(text).to_string_lossy().into_owned();
    with_state(|state| {
        let ptr = state.alloc(Object::Text(text));
        state.own(ptr);
        ptr as CFStringRef
    })
}

unsafe extern "C" fn get_type_id(object: CFTypeRef) -> CFTypeID {
    with_state(|state| match state.objects.get(&(object as usize)) {
        Some(Object::Text(_)) => STRING_TYPE_ID,
        Some(Object::Number(_)) => NUMBER_TYPE_ID,
        Some(Object::Dictionary(_)) => DICTIONARY_TYPE_ID,
        Some(Object::Array) | None => ARRAY_TYPE_ID,
    })
}

unsafe extern "C" fn string_get_type_id() -> CFTypeID {
    STRING_TYPE_ID
}

unsafe extern "C" fn dictionary_get_type_id() -> CFTypeID {
    DICTIONARY_TYPE_ID
}

unsafe extern "C" fn number_get_type_id() -> CFTypeID {
    NUMBER_TYPE_ID
}

unsafe extern "C" fn string_get_length(string: CFStringRef) -> CFIndex {
    with_state(|state| {
        state
            .text(string as usize)
            .map_or(0, |text| text.encode_utf16().count() as CFIndex)
    })
}

unsafe extern "C" fn string_get_maximum_size_for_encoding(
    length: CFIndex,
    _encoding: CFStringEncoding,
) -> CFIndex {
    // Worst case for UTF-8 is three bytes per UTF-16 unit
    length * 3
}

unsafe extern "C" fn string_get_c_string(
    string: CFStringRef,
    buffer: *mut c_char,
    capacity: CFIndex,
    _encoding: CFStringEncoding,
) -> u8 {
    let bytes = match with_state(|state| state.text(string as usize).map(str::to_owned)) {
        Some(text) => text.into_bytes(),
        None => return 0,
    };
    if bytes.len() + 1 > capacity as usize {
        return 0;
    }
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), bytes.len());
    *buffer.add(bytes.len()) = 0;
    1
}

unsafe extern "C" fn dictionary_get_value(
    dictionary: CFDictionaryRef,
    key: *const c_void,
) -> *const c_void {
    with_state(|state| {
        let Some(key) = state.text(key as usize).map(str::to_owned) else {
            return std::ptr::null();
        };
        match state.objects.get(&(dictionary as usize)) {
            Some(Object::Dictionary(entries)) => entries
                .iter()
                .find(|(name, _)| *name == key)
                .map_or(std::ptr::null(), |(_, ptr)| *ptr as *const c_void),
            _ => std::ptr::null(),
        }
    })
}

unsafe extern "C" fn number_get_value(
    number: CFTypeRef,
    number_type: CFNumberType,
    out: *mut c_void,
) -> u8 {
    if number_type != ProbeConfig::NUMBER_SINT64_TYPE {
        return 0;
    }
    match with_state(|state| match state.objects.get(&(number as usize)) {
        Some(Object::Number(value)) => Some(*value),
        _ => None,
    }) {
        Some(value) => {
            *out.cast::<i64>() = value;
            1
        }
        None => 0,
    }
}

unsafe extern "C" fn release(object: CFTypeRef) {
    with_state(|state| {
        if state.cf_owned.remove(&(object as usize)) {
            state.cf.released += 1;
        } else {
            state.cf.misuse += 1;
        }
    });
}

// --- IOKit ---

unsafe extern "C" fn service_matching(_class: *const c_char) -> *mut c_void {
    // Consumed by IOServiceGetMatchingServices, so never owned by the caller
    with_state(|state| state.alloc(Object::Array) as *mut c_void)
}

unsafe extern "C" fn service_get_matching_services(
    _port: MachPort,
    _matching: CFDictionaryRef,
    iterator: *mut IoIterator,
) -> KernReturn {
    with_state(|state| {
        if state.match_code != ProbeConfig::KERN_SUCCESS {
            return state.match_code;
        }
        state.io_live.insert(ITERATOR_HANDLE);
        state.io.acquired += 1;
        *iterator = ITERATOR_HANDLE;
        ProbeConfig::KERN_SUCCESS
    })
}

unsafe extern "C" fn iterator_next(iterator: IoIterator) -> IoObject {
    with_state(|state| {
        if !state.io_live.contains(&iterator) {
            state.io.misuse += 1;
            return 0;
        }
        match state.services.pop_front() {
            Some(service) => {
                state.io_live.insert(service);
                state.io.acquired += 1;
                service
            }
            None => 0,
        }
    })
}

unsafe extern "C" fn registry_entry_search_cf_property(
    entry: IoRegistryEntry,
    _plane: *const c_char,
    key: CFStringRef,
    _allocator: CFAllocatorRef,
    _options: IoOptionBits,
) -> CFTypeRef {
    with_state(|state| {
        let value = state.text(key as usize).and_then(|key| {
            state
                .properties
                .get(&entry)
                .and_then(|properties| properties.get(key))
                .cloned()
        });
        match value {
            Some(value) => {
                let ptr = state.build(&value);
                state.own(ptr);
                ptr as CFTypeRef
            }
            None => std::ptr::null(),
        }
    })
}

unsafe extern "C" fn object_release(object: IoObject) -> KernReturn {
    with_state(|state| {
        if state.io_live.remove(&object) {
            state.io.released += 1;
        } else {
            state.io.misuse += 1;
        }
    });
    ProbeConfig::KERN_SUCCESS
}
