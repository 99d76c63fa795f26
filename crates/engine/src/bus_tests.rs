// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use th_core::{SessionId, SessionState};

fn destroyed(id: &str) -> SessionEvent {
    SessionEvent::Destroyed {
        id: SessionId::new(id),
    }
}

#[tokio::test]
async fn every_subscriber_sees_every_event_in_order() {
    let bus = EventBus::default();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.publish(SessionEvent::StateChanged {
        id: SessionId::new("s1"),
        state: SessionState::Idle,
    });
    bus.publish(destroyed("s1"));

    for sub in [&mut a, &mut b] {
        assert_eq!(sub.recv().await.unwrap().name(), "session:state");
        assert_eq!(sub.recv().await.unwrap().name(), "session:destroyed");
    }
}

#[test]
fn publish_without_subscribers_is_harmless() {
    let bus = EventBus::default();
    bus.publish(destroyed("s1"));
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn late_subscriber_misses_earlier_events() {
    let bus = EventBus::default();
    bus.publish(destroyed("s1"));
    let mut sub = bus.subscribe();
    assert!(sub.try_recv().is_none());
}

#[test]
fn unsubscribe_releases_the_receiver() {
    let bus = EventBus::default();
    let sub = bus.subscribe();
    let _other = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    sub.unsubscribe();
    assert_eq!(bus.subscriber_count(), 1);
}

#[test]
fn lagging_subscriber_skips_oldest() {
    let bus = EventBus::new(2);
    let mut sub = bus.subscribe();
    for id in ["s1", "s2", "s3", "s4"] {
        bus.publish(destroyed(id));
    }

    assert_eq!(sub.try_recv(), Some(destroyed("s3")));
    assert_eq!(sub.try_recv(), Some(destroyed("s4")));
    assert_eq!(sub.try_recv(), None);
}

#[tokio::test]
async fn recv_ends_when_bus_is_dropped() {
    let bus = EventBus::default();
    let mut sub = bus.subscribe();
    drop(bus);
    assert_eq!(sub.recv().await, None);
}
