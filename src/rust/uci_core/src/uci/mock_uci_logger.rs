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

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::uci::uci_logger::{PacketDirection, UciLogger};

/// Mock implementation of UciLogger
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) enum UciLogEvent {
    Packet(PacketDirection, Vec<u8>),
    TransportAttach(Result<()>),
    TransportDetach,
}

impl TryFrom<UciLogEvent> for Vec<u8> {
    type Error = Error;
    fn try_from(value: UciLogEvent) -> Result<Self> {
        match value {
            UciLogEvent::Packet(_, packet) => Ok(packet),
            _ => Err(Error::BadParameters),
        }
    }
}

pub(crate) struct MockUciLogger {
    log_sender: mpsc::UnboundedSender<UciLogEvent>,
}

impl MockUciLogger {
    pub(crate) fn new(log_sender: mpsc::UnboundedSender<UciLogEvent>) -> Self {
        Self { log_sender }
    }
}

impl UciLogger for MockUciLogger {
    fn log_uci_packet(&mut self, direction: PacketDirection, packet: &[u8]) {
        let _ = self.log_sender.send(UciLogEvent::Packet(direction, packet.to_vec()));
    }

    fn log_transport_attach(&mut self, result: Result<()>) {
        let _ = self.log_sender.send(UciLogEvent::TransportAttach(result));
    }

    fn log_transport_detach(&mut self) {
        let _ = self.log_sender.send(UciLogEvent::TransportDetach);
    }
}
