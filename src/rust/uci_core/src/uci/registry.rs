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

use std::fmt;

use log::{error, info};
use uci_packets::{RoutingKey, StatusCode};

use crate::error::{Error, Result};
use crate::message::MessageParser;
use crate::uci::context::UciSender;

/// What a handler tells the core after processing a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerStatus {
    /// The message was processed. Any response is up to the handler, now or later.
    Ok,
    /// The message failed, and the handler already answered it.
    Handled,
    /// The message failed. The core answers a command with this status.
    Failed(StatusCode),
}

/// The handler of one routing key. It gets the sending half of the core to answer, the key of
/// the message, and the message payload.
pub type UciHandler = Box<dyn FnMut(&mut UciSender, RoutingKey, MessageParser) -> HandlerStatus>;

/// One routing key with its handler.
pub struct HandlerEntry {
    key: RoutingKey,
    handler: UciHandler,
}

impl HandlerEntry {
    pub fn new<F>(key: RoutingKey, handler: F) -> Self
    where
        F: FnMut(&mut UciSender, RoutingKey, MessageParser) -> HandlerStatus + 'static,
    {
        Self { key, handler: Box::new(handler) }
    }

    pub fn key(&self) -> RoutingKey {
        self.key
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry").field("key", &self.key).finish()
    }
}

struct HandlerGroup {
    gid: u8,
    // Sorted by key.
    entries: Vec<HandlerEntry>,
}

/// The handler groups, one per group id, in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    groups: Vec<HandlerGroup>,
    // Bit n is set when group id n is registered.
    known_gids: u16,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register the handlers of one group id.
    ///
    /// The entries must be non-empty, share a single group id, and be sorted by strictly
    /// ascending key. Nothing is registered when they are not, or when the group id already has
    /// handlers.
    pub fn register(&mut self, entries: Vec<HandlerEntry>) -> Result<()> {
        let gid = match entries.first() {
            Some(entry) => entry.key.gid(),
            None => {
                error!("Cannot register an empty handler group");
                return Err(Error::BadParameters);
            }
        };
        if let Some(entry) = entries.iter().find(|entry| entry.key.gid() != gid) {
            error!("Handler group {:#x} holds {:?} of another group", gid, entry.key);
            return Err(Error::BadParameters);
        }
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].key >= pair[1].key) {
            error!(
                "Handler group {:#x} is not sorted: {:?} >= {:?}",
                gid, pair[0].key, pair[1].key
            );
            return Err(Error::BadParameters);
        }
        if self.is_registered(gid) {
            error!("Handler group {:#x} is already registered", gid);
            return Err(Error::DuplicatedGroupId(gid));
        }

        info!("Registering {} handlers for group {:#x}", entries.len(), gid);
        self.known_gids |= 1 << gid;
        self.groups.push(HandlerGroup { gid, entries });
        Ok(())
    }

    pub fn is_registered(&self, gid: u8) -> bool {
        // Group ids are 4-bit wide.
        gid < 16 && self.known_gids & (1 << gid) != 0
    }

    /// Find the handler of `key`, or the status telling why there is none.
    pub fn find_mut(
        &mut self,
        key: RoutingKey,
    ) -> std::result::Result<&mut UciHandler, StatusCode> {
        if !self.is_registered(key.gid()) {
            return Err(StatusCode::UciStatusUnknownGid);
        }
        let group = self
            .groups
            .iter_mut()
            .find(|group| group.gid == key.gid())
            .ok_or(StatusCode::UciStatusUnknownGid)?;
        let index = group
            .entries
            .binary_search_by_key(&key, |entry| entry.key)
            .map_err(|_| StatusCode::UciStatusUnknownOid)?;
        Ok(&mut group.entries[index].handler)
    }
}
