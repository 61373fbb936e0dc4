//! Outward event tests: RF field notifications, host card-emulation
//! sessions, and authorization-gated transaction events.

mod common;

use common::{fast_config, quiet_prefs, settle, start_service, start_service_with};
use bytes::Bytes;
use nearfield_core::TechMask;
use nearfield_service::ServiceEvent;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn field_events_are_broadcast() {
    let bed = start_service(fast_config());
    let mut events = bed.handle.events();
    settle().await;

    bed.controller.field_activated().await.unwrap();
    bed.controller.field_deactivated().await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, ServiceEvent::FieldActivated));
    let second = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(second, ServiceEvent::FieldDeactivated));
}

#[tokio::test(start_paused = true)]
async fn hce_sessions_are_broadcast() {
    let bed = start_service(fast_config());
    let mut events = bed.handle.events();
    settle().await;

    bed.controller.hce_activated(TechMask::NFC_A).await.unwrap();
    bed.controller
        .hce_data(TechMask::NFC_A, Bytes::from_static(b"\x00\xA4\x04\x00"))
        .await
        .unwrap();
    bed.controller
        .hce_deactivated(TechMask::NFC_A)
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(
        matches!(first, ServiceEvent::HceActivated { technology } if technology == TechMask::NFC_A)
    );
    let second = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(
        matches!(second, ServiceEvent::HceData { ref data, .. } if data.as_ref() == b"\x00\xA4\x04\x00")
    );
    let third = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(third, ServiceEvent::HceDeactivated { .. }));
}

#[tokio::test(start_paused = true)]
async fn transactions_are_dropped_without_authorized_packages() {
    let bed = start_service(fast_config());
    let mut events = bed.handle.events();
    settle().await;

    bed.controller
        .transaction(Bytes::from_static(b"\xA0\x00"), Bytes::new(), "SIM1")
        .await
        .unwrap();
    settle().await;

    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn transactions_carry_the_authorized_package_list() {
    let bed = start_service_with(
        fast_config(),
        quiet_prefs(),
        vec!["com.example.pay".into(), "com.example.wallet".into()],
    );
    let mut events = bed.handle.events();
    settle().await;

    bed.controller
        .transaction(Bytes::from_static(b"\xA0\x00"), Bytes::from_static(b"\x90"), "eSE1")
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        ServiceEvent::Transaction {
            aid,
            origin,
            allowed_packages,
            ..
        } => {
            assert_eq!(aid, Bytes::from_static(b"\xA0\x00"));
            assert_eq!(origin, "eSE1");
            assert_eq!(
                allowed_packages,
                vec!["com.example.pay".to_string(), "com.example.wallet".to_string()]
            );
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
