// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use message_passing::channel::loopback::LoopbackChannel;
use message_passing::element_fq_id::{ElementFqId, ElementType};
use message_passing::ReceiverConfig;

use lola_messaging::testing::LoopbackControl;
use lola_messaging::{AsilSpecificConfig, FacadeConfig, MessagingFacade, QualityType};

fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn qm_only_config() -> FacadeConfig {
    FacadeConfig {
        asil_b_capability: false,
        qm: AsilSpecificConfig {
            local_dispatch_threads: 2,
            receiver_threads: 2,
        },
        asil_b: AsilSpecificConfig {
            local_dispatch_threads: 1,
            receiver_threads: 1,
        },
        receiver: ReceiverConfig {
            max_queued_messages: 10,
            message_loop_delay: None,
            allowed_user_ids: Vec::new(),
        },
        ..FacadeConfig::default()
    }
}

#[test]
fn local_only_delivery() {
    let control = LoopbackControl::new(4444, "local-only-delivery");
    let facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(control, qm_only_config()).expect("facade construction");

    let event = ElementFqId::new(1, 1, 1, ElementType::Event);
    let call_count = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&call_count);

    let reg = facade.register_event_notification(QualityType::AsilQm, event, Box::new(move || {
        counted.fetch_add(1, Ordering::SeqCst);
    }), 4444);
    assert_eq!(reg, 0);

    facade.notify_event(QualityType::AsilQm, event);

    assert!(wait_for(|| call_count.load(Ordering::SeqCst) == 1, Duration::from_millis(100)));
}

#[test]
fn remote_registration_emits_one_message_per_target() {
    let prefix = "remote-registration-coalescing";
    let consumer = LoopbackControl::new(1, prefix);
    let provider = LoopbackControl::new(763, prefix);
    let provider2 = LoopbackControl::new(764, prefix);

    // Both possible targets must already be listening before the consumer
    // registers against them: a sender blocks in its constructor until its
    // peer's receiver exists.
    let provider_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(provider, qm_only_config()).expect("provider facade");
    let provider2_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(provider2, qm_only_config()).expect("second provider facade");

    let event = ElementFqId::new(2, 1, 1, ElementType::Event);

    let consumer_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(Arc::clone(&consumer), qm_only_config()).expect("consumer facade");

    let received = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let counted = Arc::clone(&received);
        consumer_facade.register_event_notification(
            QualityType::AsilQm,
            event,
            Box::new(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
            763,
        );
    }

    // Exactly one RegisterEventNotifier should have gone out to 763, even
    // though two local subscribers asked for it.
    assert!(wait_for(
        || consumer.short_send_count(QualityType::AsilQm, 763) == 1,
        Duration::from_millis(200)
    ));

    // Both local subscribers fire off the single incoming NotifyEvent, even
    // though only one wire message was ever sent for the pair of them.
    provider_facade.notify_event(QualityType::AsilQm, event);
    assert!(wait_for(|| received.load(Ordering::SeqCst) == 2, Duration::from_millis(200)));

    let second_received = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&second_received);
    consumer_facade.register_event_notification(
        QualityType::AsilQm,
        event,
        Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }),
        764,
    );

    // A different target must get its own outbound message.
    assert!(wait_for(
        || consumer.short_send_count(QualityType::AsilQm, 764) == 1,
        Duration::from_millis(200)
    ));

    provider2_facade.notify_event(QualityType::AsilQm, event);
    assert!(wait_for(
        || second_received.load(Ordering::SeqCst) == 1,
        Duration::from_millis(200)
    ));
}

#[test]
fn unregister_follows_reregistration_to_new_target() {
    let prefix = "reregister-around-restart";
    let consumer = LoopbackControl::new(2, prefix);
    let old_provider = LoopbackControl::new(763, prefix);
    let new_provider = LoopbackControl::new(764, prefix);

    let event = ElementFqId::new(3, 1, 1, ElementType::Event);

    let old_provider_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(old_provider, qm_only_config()).expect("old provider facade");
    let new_provider_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(new_provider, qm_only_config()).expect("new provider facade");

    let consumer_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(Arc::clone(&consumer), qm_only_config()).expect("consumer facade");

    let reg = consumer_facade.register_event_notification(QualityType::AsilQm, event, Box::new(|| {}), 763);
    assert!(wait_for(
        || consumer.short_send_count(QualityType::AsilQm, 763) == 1,
        Duration::from_millis(200)
    ));

    consumer_facade.reregister_event_notification(QualityType::AsilQm, event, 764);
    assert!(wait_for(
        || consumer.short_send_count(QualityType::AsilQm, 764) == 1,
        Duration::from_millis(200)
    ));

    consumer_facade.unregister_event_notification(QualityType::AsilQm, event, reg, 764);
    assert!(wait_for(
        || consumer.short_send_count(QualityType::AsilQm, 764) == 2,
        Duration::from_millis(200)
    ));

    // The unregister must have gone to the new target only; 763 never heard
    // about it at all.
    assert_eq!(consumer.short_send_count(QualityType::AsilQm, 763), 1);
    let _ = (&old_provider_facade, &new_provider_facade);
}

#[test]
fn outdated_node_id_purges_interest_and_removes_sender() {
    let prefix = "outdated-node-id-purge";
    let provider = LoopbackControl::new(999, prefix);
    let consumer = LoopbackControl::new(551, prefix);
    let event = ElementFqId::new(4, 1, 1, ElementType::Event);

    let provider_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(Arc::clone(&provider), qm_only_config()).expect("provider facade");
    let consumer_facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(Arc::clone(&consumer), qm_only_config()).expect("consumer facade");

    let received = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&received);
    consumer_facade.register_event_notification(
        QualityType::AsilQm,
        event,
        Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }),
        999,
    );

    // Confirm the registration reached the provider before declaring it outdated.
    provider_facade.notify_event(QualityType::AsilQm, event);
    assert!(wait_for(|| received.load(Ordering::SeqCst) == 1, Duration::from_millis(200)));

    assert_eq!(provider.remove_sender_call_count(), 0);
    // Some third party (here, the consumer itself standing in for whatever
    // detects the stale pid) tells the provider that node 551 is gone.
    consumer_facade.notify_outdated_node_id(QualityType::AsilQm, 551, 999);

    assert!(wait_for(
        || provider.remove_sender_call_count() == 1,
        Duration::from_millis(200)
    ));

    provider_facade.notify_event(QualityType::AsilQm, event);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(received.load(Ordering::SeqCst), 1, "purged node must receive no further events");
}

#[test]
fn blocked_qm_callback_does_not_starve_asil_b() {
    let control = LoopbackControl::new(5555, "asil-segregation");
    let mut config = qm_only_config();
    config.asil_b_capability = true;
    let facade: MessagingFacade<LoopbackChannel> = MessagingFacade::new(control, config).expect("facade");

    let qm_event = ElementFqId::new(5, 1, 1, ElementType::Event);
    let b_event = ElementFqId::new(5, 2, 1, ElementType::Event);

    facade.register_event_notification(
        QualityType::AsilQm,
        qm_event,
        Box::new(|| std::thread::sleep(Duration::from_secs(2))),
        5555,
    );

    let b_count = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&b_count);
    facade.register_event_notification(
        QualityType::AsilB,
        b_event,
        Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }),
        5555,
    );

    facade.notify_event(QualityType::AsilQm, qm_event);

    let publishes = 40;
    for _ in 0..publishes {
        facade.notify_event(QualityType::AsilB, b_event);
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(wait_for(
        || b_count.load(Ordering::SeqCst) as f64 >= 0.9 * publishes as f64,
        Duration::from_secs(2)
    ));
}

#[test]
fn bogus_unregister_is_a_no_op() {
    let control = LoopbackControl::new(4444, "bogus-unregister");
    let facade: MessagingFacade<LoopbackChannel> =
        MessagingFacade::new(control, qm_only_config()).expect("facade");

    let event = ElementFqId::new(6, 1, 1, ElementType::Event);
    // Never registered; must be tolerated silently.
    facade.unregister_event_notification(QualityType::AsilQm, event, 9_999_999, 4444);
}
