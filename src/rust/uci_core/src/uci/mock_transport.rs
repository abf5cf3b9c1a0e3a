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

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::error;

use crate::error::{Error, Result};
use crate::uci::transport::Transport;

/// The mock implementation of Transport.
///
/// The expected calls are queued up front. A call that does not match the head of the queue is
/// recorded, and the transport panics on drop unless every expected call happened.
#[derive(Clone, Default)]
pub struct MockTransport {
    expected_calls: Rc<RefCell<VecDeque<ExpectedCall>>>,
    unexpected_calls: Rc<RefCell<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn expected_attach(&mut self, out: Result<()>) {
        self.expected_calls.borrow_mut().push_back(ExpectedCall::Attach { out });
    }

    pub fn expected_detach(&mut self) {
        self.expected_calls.borrow_mut().push_back(ExpectedCall::Detach);
    }

    pub fn expected_packet_send_ready(&mut self) {
        self.expected_calls.borrow_mut().push_back(ExpectedCall::PacketSendReady);
    }

    /// Whether all the expected calls happened, and no other.
    pub fn is_done(&self) -> bool {
        self.expected_calls.borrow().is_empty() && *self.unexpected_calls.borrow() == 0
    }

    fn unexpected(&self, name: &str) {
        error!(
            "MockTransport: unexpected {}(), next expected: {:?}",
            name,
            self.expected_calls.borrow().front()
        );
        *self.unexpected_calls.borrow_mut() += 1;
    }
}

impl Transport for MockTransport {
    fn attach(&mut self) -> Result<()> {
        let call = self.expected_calls.borrow_mut().pop_front();
        match call {
            Some(ExpectedCall::Attach { out }) => out,
            other => {
                if let Some(call) = other {
                    self.expected_calls.borrow_mut().push_front(call);
                }
                self.unexpected("attach");
                Err(Error::BadParameters)
            }
        }
    }

    fn detach(&mut self) {
        self.expect_simple_call(ExpectedCall::Detach, "detach");
    }

    fn packet_send_ready(&mut self) {
        self.expect_simple_call(ExpectedCall::PacketSendReady, "packet_send_ready");
    }
}

impl MockTransport {
    fn expect_simple_call(&mut self, call: ExpectedCall, name: &str) {
        let matched = {
            let mut expected_calls = self.expected_calls.borrow_mut();
            if expected_calls.front() == Some(&call) {
                expected_calls.pop_front();
                true
            } else {
                false
            }
        };
        if !matched {
            self.unexpected(name);
        }
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        // The clones share the expectations; only the last one checks them.
        if Rc::strong_count(&self.expected_calls) > 1 || std::thread::panicking() {
            return;
        }
        assert!(self.expected_calls.borrow().is_empty(), "Expected calls were not made");
        assert_eq!(*self.unexpected_calls.borrow(), 0, "Unexpected calls were made");
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ExpectedCall {
    Attach { out: Result<()> },
    Detach,
    PacketSendReady,
}
