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

//! The UCI core: a single-threaded protocol engine that builds and parses UCI messages over
//! chains of packet buffer blocks, segments and reassembles them, and routes received messages
//! to registered handlers.
//!
//! Everything here is synchronous and callback driven. The transport layer pulls packets to
//! transmit with [`uci::UciCore::packet_send_get_ready`] and pushes received packets with
//! [`uci::UciCore::packet_recv`].

pub mod buffer;
pub mod error;
pub mod message;
pub mod uci;

mod utils;

pub use uci_packets::{
    DecodeError, GroupId, MessageType, PacketBoundaryFlag, RoutingKey, StatusCode, MAX_PACKET_LEN,
    MAX_PAYLOAD_LEN, UCI_PACKET_HEADER_LEN,
};
