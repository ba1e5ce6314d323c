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

use crate::device::PropertyValue;
use crate::error::{PropertyError, Result};

/// A hardware registry that can be walked by service class.
///
/// Implementations hand out owned `Service` values; dropping a service or the
/// `Services` iterator releases whatever the registry holds for it.
pub trait ServiceRegistry {
    type Service;
    type Services: Iterator<Item = Self::Service>;

    fn services(&self, class: &str) -> Result<Self::Services>;

    fn read_property(
        &self,
        service: &Self::Service,
        key: &str,
        nested_key: Option<&str>,
    ) -> std::result::Result<PropertyValue, PropertyError>;
}
