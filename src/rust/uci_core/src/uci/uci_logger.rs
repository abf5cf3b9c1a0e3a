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

//! Trait definition for UciLogger.

use uci_packets::UCI_PACKET_HEADER_LEN;

use crate::error::{Error, Result};
use crate::uci::segmentation::UciPacket;

/// UCI Log mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UciLoggerMode {
    /// Log is disabled.
    Disabled,
    /// Logs all uci packets without filtering PII information.
    Unfiltered,
    /// Logs uci packet headers, with the payload zero-filled.
    Filtered,
}

impl TryFrom<String> for UciLoggerMode {
    type Error = Error;
    /// Parse log mode from string.
    fn try_from(log_mode_string: String) -> Result<UciLoggerMode> {
        match log_mode_string.as_str() {
            "disabled" => Ok(UciLoggerMode::Disabled),
            "unfiltered" => Ok(UciLoggerMode::Unfiltered),
            "filtered" => Ok(UciLoggerMode::Filtered),
            _ => Err(Error::BadParameters),
        }
    }
}

/// Whether a packet was sent to or received from the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketDirection {
    Tx,
    Rx,
}

/// Trait definition for the uci logger.
pub trait UciLogger: 'static {
    /// Logs Uci Packet.
    fn log_uci_packet(&mut self, direction: PacketDirection, packet: &[u8]);
    /// Logs transport attach event.
    fn log_transport_attach(&mut self, result: Result<()>);
    /// Logs transport detach event.
    fn log_transport_detach(&mut self);
}

impl<T: UciLogger + ?Sized> UciLogger for Box<T> {
    fn log_uci_packet(&mut self, direction: PacketDirection, packet: &[u8]) {
        (**self).log_uci_packet(direction, packet)
    }

    fn log_transport_attach(&mut self, result: Result<()>) {
        (**self).log_transport_attach(result)
    }

    fn log_transport_detach(&mut self) {
        (**self).log_transport_detach()
    }
}

fn filter_packet(mut packet: Vec<u8>) -> Vec<u8> {
    if packet.len() > UCI_PACKET_HEADER_LEN {
        packet[UCI_PACKET_HEADER_LEN..].fill(0);
    }
    packet
}

/// Wrapper struct that filters messages feeded to UciLogger.
pub(crate) struct UciLoggerWrapper<T: UciLogger> {
    mode: UciLoggerMode,
    logger: T,
}
impl<T: UciLogger> UciLoggerWrapper<T> {
    pub fn new(logger: T, mode: UciLoggerMode) -> Self {
        Self { mode, logger }
    }

    pub fn set_logger_mode(&mut self, mode: UciLoggerMode) {
        self.mode = mode;
    }

    /// Logs transport attach event.
    pub fn log_transport_attach(&mut self, result: &Result<()>) {
        if self.mode != UciLoggerMode::Disabled {
            self.logger.log_transport_attach(result.clone());
        }
    }

    /// Logs transport detach event.
    pub fn log_transport_detach(&mut self) {
        if self.mode != UciLoggerMode::Disabled {
            self.logger.log_transport_detach();
        }
    }

    pub fn log_uci_packet(&mut self, direction: PacketDirection, packet: &UciPacket) {
        match self.mode {
            UciLoggerMode::Disabled => (),
            UciLoggerMode::Unfiltered => self.logger.log_uci_packet(direction, &packet.to_vec()),
            UciLoggerMode::Filtered => {
                self.logger.log_uci_packet(direction, &filter_packet(packet.to_vec()))
            }
        }
    }
}

/// A placeholder UciLogger implementation that does nothing.
#[derive(Default)]
pub struct NopUciLogger {}

impl UciLogger for NopUciLogger {
    fn log_uci_packet(&mut self, _direction: PacketDirection, _packet: &[u8]) {}

    fn log_transport_attach(&mut self, _result: Result<()>) {}

    fn log_transport_detach(&mut self) {}
}
