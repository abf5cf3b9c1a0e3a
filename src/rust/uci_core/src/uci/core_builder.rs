// Copyright 2022, The Android Open Source Project
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

//! This module defines the UciCoreBuilder, the builder of the UciCore.

use std::rc::Rc;

use log::error;
use uci_packets::MAX_PACKET_LEN;

use crate::buffer::{BlockAllocator, MIN_BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::uci::context::{Role, UciCore};
use crate::uci::uci_logger::{NopUciLogger, UciLogger, UciLoggerMode};
use crate::utils::consuming_builder_field;

/// The builder of UciCore, used to keep the backward compatibility when adding new parameters
/// of creating a UciCore instance.
pub struct UciCoreBuilder {
    allocator: Option<Rc<dyn BlockAllocator>>,
    role: Role,
    expected_packet_size: usize,
    logger: Option<Box<dyn UciLogger>>,
    logger_mode: UciLoggerMode,
}

impl Default for UciCoreBuilder {
    fn default() -> Self {
        Self {
            allocator: None,
            role: Role::Server,
            expected_packet_size: MAX_PACKET_LEN,
            logger: None,
            logger_mode: UciLoggerMode::Disabled,
        }
    }
}

impl UciCoreBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Default::default()
    }

    consuming_builder_field!(allocator, Rc<dyn BlockAllocator>, Some);
    consuming_builder_field!(role, Role);
    consuming_builder_field!(expected_packet_size, usize);
    consuming_builder_field!(logger, Box<dyn UciLogger>, Some);
    consuming_builder_field!(logger_mode, UciLoggerMode);

    /// Build the UciCore. Fails when the allocator is missing or the packet size is out of
    /// [MIN_BLOCK_SIZE, MAX_PACKET_LEN].
    pub fn build(self) -> Result<UciCore> {
        let allocator = self.allocator.ok_or_else(|| {
            error!("The allocator is mandatory");
            Error::BadParameters
        })?;
        if !(MIN_BLOCK_SIZE..=MAX_PACKET_LEN).contains(&self.expected_packet_size) {
            error!("Invalid expected packet size: {}", self.expected_packet_size);
            return Err(Error::BadParameters);
        }
        let logger = self.logger.unwrap_or_else(|| Box::new(NopUciLogger::default()));
        Ok(UciCore::new(allocator, self.role, self.expected_packet_size, logger, self.logger_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::buffer::HeapAllocator;

    fn allocator() -> Rc<dyn BlockAllocator> {
        Rc::new(HeapAllocator::new())
    }

    #[test]
    fn test_build_fail() {
        assert_eq!(UciCoreBuilder::new().build().err(), Some(Error::BadParameters));
        assert_eq!(
            UciCoreBuilder::new().allocator(allocator()).expected_packet_size(19).build().err(),
            Some(Error::BadParameters)
        );
        assert_eq!(
            UciCoreBuilder::new()
                .allocator(allocator())
                .expected_packet_size(MAX_PACKET_LEN + 1)
                .build()
                .err(),
            Some(Error::BadParameters)
        );
    }

    #[test]
    fn test_build() {
        let core = UciCoreBuilder::new()
            .allocator(allocator())
            .role(Role::Client)
            .expected_packet_size(MIN_BLOCK_SIZE)
            .logger(Box::new(NopUciLogger::default()))
            .logger_mode(UciLoggerMode::Filtered)
            .build()
            .unwrap();
        assert_eq!(core.role(), Role::Client);
        assert_eq!(core.message_builder().expected_packet_size(), MIN_BLOCK_SIZE);
        assert!(!core.is_attached());

        let core = UciCoreBuilder::new().allocator(allocator()).build().unwrap();
        assert_eq!(core.role(), Role::Server);
        assert_eq!(core.message_builder().expected_packet_size(), MAX_PACKET_LEN);
    }
}
