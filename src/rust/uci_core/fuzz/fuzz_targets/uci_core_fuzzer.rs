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

#![no_main]

use std::rc::Rc;

use libfuzzer_sys::fuzz_target;
use log::error;
use uci_core::buffer::{BlockAllocator, BlockChain, HeapAllocator};
use uci_core::message::MessageParser;
use uci_core::uci::{
    HandlerEntry, HandlerStatus, NopTransport, UciCore, UciCoreBuilder, UciPacket, UciSender,
};
use uci_core::{MessageType, RoutingKey, StatusCode};

// Echo the payload back as the response, two bytes at a time.
fn echo(sender: &mut UciSender, key: RoutingKey, mut parser: MessageParser) -> HandlerStatus {
    let mut builder = sender.message_builder();
    while let Ok(value) = parser.get_u16() {
        if builder.put_u16(value).is_err() {
            break;
        }
    }
    let payload = match builder.finish() {
        Ok(payload) => payload,
        Err(_) => return HandlerStatus::Failed(StatusCode::UciStatusFailed),
    };
    match sender.send_message(key.with_message_type(MessageType::Response), payload) {
        Ok(()) => HandlerStatus::Ok,
        Err(_) => HandlerStatus::Failed(StatusCode::UciStatusRejected),
    }
}

fn create_core() -> Option<UciCore> {
    let allocator: Rc<dyn BlockAllocator> = Rc::new(HeapAllocator::with_max_block_size(64));
    let mut core = UciCoreBuilder::new().allocator(allocator).build().ok()?;
    let entries = (0..4)
        .map(|oid| HandlerEntry::new(RoutingKey::new(MessageType::Command, 0x1, oid), echo))
        .collect();
    core.register_handlers(entries).ok()?;
    core.attach(Box::new(NopTransport::default())).ok()?;
    Some(core)
}

// Copy one packet into blocks taken from the core, like a transport driver would.
fn to_packet(core: &UciCore, mut bytes: &[u8]) -> Option<UciPacket> {
    let mut chain = BlockChain::new();
    while !bytes.is_empty() {
        let mut block = core.packet_recv_alloc(bytes.len())?;
        let written = block.append(bytes);
        if written == 0 {
            return None;
        }
        bytes = &bytes[written..];
        chain.push_back(block);
    }
    Some(chain.into())
}

fuzz_target!(|data: &[u8]| {
    let mut core = match create_core() {
        Some(core) => core,
        None => {
            error!("Failed to create the UciCore");
            return;
        }
    };

    // Each packet is prefixed by its size on the wire, which may not match its header.
    let mut data = data;
    while let Some((&size, rest)) = data.split_first() {
        let size = std::cmp::min(size as usize, rest.len());
        let (bytes, rest) = rest.split_at(size);
        data = rest;
        match to_packet(&core, bytes) {
            Some(packet) => core.packet_recv(packet),
            None => break,
        }
        while let Some(packet) = core.packet_send_get_ready() {
            core.packet_send_done(packet, Ok(()));
        }
    }
    let _ = core.response_expire();
    core.uninit();
});
