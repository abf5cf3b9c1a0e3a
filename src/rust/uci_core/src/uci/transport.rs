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

//! This module defines the Transport trait, the channel that carries UCI packets to and from the
//! peer.

use crate::error::Result;

/// The trait for the UCI transport. The client of this library should implement this trait and
/// attach it to the [`UciCore`](crate::uci::UciCore).
///
/// The transport owns the framing to the wire (byte stuffing, characteristic writes, ...). It
/// drives the core through the pull model:
/// - [`UciCore::packet_send_get_ready`](crate::uci::UciCore::packet_send_get_ready) takes the next
///   packet to send, then
///   [`UciCore::packet_send_done`](crate::uci::UciCore::packet_send_done) hands it back.
/// - [`UciCore::packet_recv_alloc`](crate::uci::UciCore::packet_recv_alloc) provides a receive
///   buffer, and [`UciCore::packet_recv`](crate::uci::UciCore::packet_recv) takes the filled
///   packet.
///
/// The methods are called from the core and must not call back into it.
pub trait Transport: 'static {
    /// Set up the channel. The transport is not attached when this fails.
    fn attach(&mut self) -> Result<()>;

    /// Tear down the channel. Every packet lent to the transport should be handed back or
    /// dropped.
    fn detach(&mut self);

    /// Called once when a packet is queued after `packet_send_get_ready()` found the queue empty.
    /// The transport should resume pulling packets.
    fn packet_send_ready(&mut self);
}

/// A placeholder implementation for Transport that does nothing.
#[derive(Default)]
pub struct NopTransport {}

impl Transport for NopTransport {
    fn attach(&mut self) -> Result<()> {
        Ok(())
    }

    fn detach(&mut self) {}

    fn packet_send_ready(&mut self) {}
}
