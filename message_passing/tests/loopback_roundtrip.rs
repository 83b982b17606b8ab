// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use message_passing::cancel::CancellationToken;
use message_passing::channel::loopback::LoopbackChannel;
use message_passing::message::{MSG_NOTIFY_EVENT, MSG_OUTDATED_NODE_ID};
use message_passing::receiver::{Receiver, ReceiverConfig};
use message_passing::sender::{Sender, SenderConfig};

fn wait_for<F: Fn() -> bool>(predicate: F) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("condition never became true");
}

#[test]
fn short_message_reaches_registered_callback() {
    let identifier = "/test-roundtrip-notify";
    let receiver: Receiver<LoopbackChannel> = Receiver::new(identifier, 2, ReceiverConfig::default());

    let received_pid = Arc::new(AtomicI32::new(0));
    let flag = Arc::clone(&received_pid);
    receiver.register_short(MSG_NOTIFY_EVENT, move |_payload, pid| {
        flag.store(pid, Ordering::SeqCst);
    });
    receiver.start_listening().unwrap();

    let sender: Sender<LoopbackChannel> =
        Sender::new(identifier, CancellationToken::new(), SenderConfig::default());
    sender
        .send_short(message_passing::message::ShortMessage {
            id: MSG_NOTIFY_EVENT,
            pid: 4242,
            payload: 99,
        })
        .unwrap();

    wait_for(|| received_pid.load(Ordering::SeqCst) == 4242);
    receiver.request_stop();
}

#[test]
fn unregistered_message_id_is_tolerated() {
    let identifier = "/test-roundtrip-unhandled";
    let receiver: Receiver<LoopbackChannel> = Receiver::new(identifier, 1, ReceiverConfig::default());
    receiver.start_listening().unwrap();

    let sender: Sender<LoopbackChannel> =
        Sender::new(identifier, CancellationToken::new(), SenderConfig::default());
    sender
        .send_short(message_passing::message::ShortMessage {
            id: MSG_OUTDATED_NODE_ID,
            pid: 1,
            payload: 0,
        })
        .unwrap();

    // No callback registered; the worker thread must keep running rather
    // than panicking or getting stuck.
    std::thread::sleep(Duration::from_millis(20));
    receiver.request_stop();
}

#[test]
fn sender_construction_waits_for_receiver() {
    let identifier = "/test-roundtrip-wait";
    let token = CancellationToken::new();

    let handle = std::thread::spawn({
        let token = token.clone();
        move || Sender::<LoopbackChannel>::new(identifier, token, SenderConfig::default())
    });

    std::thread::sleep(Duration::from_millis(20));
    let receiver: Receiver<LoopbackChannel> = Receiver::new(identifier, 1, ReceiverConfig::default());
    receiver.start_listening().unwrap();

    let sender = handle.join().unwrap();
    sender
        .send_short(message_passing::message::ShortMessage {
            id: MSG_NOTIFY_EVENT,
            pid: 1,
            payload: 1,
        })
        .unwrap();
    receiver.request_stop();
}
