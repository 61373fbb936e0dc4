//! Discovery policy integration tests: what the controller is actually
//! asked to poll for as screen state, reader mode, provisioning, and
//! unlock handlers change.

mod common;

use common::{fast_config, settle, start_service, tag, wait_for_state};
use nearfield_core::{AdapterState, ReaderModeFlags, ScreenState, TechMask};
use nearfield_hal::mock::HostCall;
use nearfield_service::{ReaderModeOptions, ServiceError};
use std::time::Duration;

fn enable_discovery_count(calls: &[HostCall]) -> usize {
    calls
        .iter()
        .filter(|c| matches!(c, HostCall::EnableDiscovery { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn enable_applies_default_unlocked_parameters() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::DEFAULT_POLL);
    assert!(params.p2p_enabled());
    assert!(params.host_routing_enabled());
    assert!(!params.reader_mode_enabled());
}

#[tokio::test(start_paused = true)]
async fn locking_the_screen_stops_polling_but_keeps_listening() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    bed.handle
        .screen_state_changed(ScreenState::OnLocked)
        .unwrap();
    settle().await;

    let params = bed.controller.current_params().unwrap();
    assert!(params.tech_mask().is_empty());
    assert!(params.host_routing_enabled());
    // Host routing keeps the discovery loop alive for listening.
    assert!(bed.controller.discovery_enabled());
}

#[tokio::test(start_paused = true)]
async fn provisioning_keeps_default_polling_while_locked() {
    let mut config = fast_config();
    config.in_provision_mode = true;
    let bed = start_service(config);
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    bed.handle
        .screen_state_changed(ScreenState::OnLocked)
        .unwrap();
    settle().await;

    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::DEFAULT_POLL);
    assert!(params.p2p_enabled());

    // Once provisioning finishes the lock screen stops polling.
    bed.handle.provisioning_complete().unwrap();
    settle().await;
    let params = bed.controller.current_params().unwrap();
    assert!(params.tech_mask().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reader_mode_takes_over_polling() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    let flags = ReaderModeFlags::polling(TechMask::NFC_A | TechMask::NFC_B).unwrap();
    let session = bed
        .handle
        .set_reader_mode(flags, ReaderModeOptions::default())
        .await
        .unwrap();

    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::NFC_A | TechMask::NFC_B);
    assert!(params.reader_mode_enabled());
    assert!(!params.p2p_enabled());
    assert!(!params.host_routing_enabled());

    // Dropping the session revokes the registration through the liveness
    // monitor.
    drop(session);
    settle().await;
    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::DEFAULT_POLL);
    assert!(!params.reader_mode_enabled());
}

#[tokio::test(start_paused = true)]
async fn reader_mode_requires_enabled_adapter() {
    let bed = start_service(fast_config());
    settle().await;

    let flags = ReaderModeFlags::polling(TechMask::NFC_A).unwrap();
    let result = bed
        .handle
        .set_reader_mode(flags, ReaderModeOptions::default())
        .await;
    assert!(matches!(result, Err(ServiceError::NotEnabled)));
}

#[tokio::test(start_paused = true)]
async fn stale_reader_death_does_not_clobber_newer_registration() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    let first = bed
        .handle
        .set_reader_mode(
            ReaderModeFlags::polling(TechMask::NFC_A).unwrap(),
            ReaderModeOptions::default(),
        )
        .await
        .unwrap();
    let second = bed
        .handle
        .set_reader_mode(
            ReaderModeFlags::polling(TechMask::NFC_B).unwrap(),
            ReaderModeOptions::default(),
        )
        .await
        .unwrap();

    // Replacing the first registration closed its channel; the resulting
    // death notification is stale and must not revoke the second one.
    drop(first);
    settle().await;
    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::NFC_B);
    assert!(params.reader_mode_enabled());

    drop(second);
    settle().await;
    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::DEFAULT_POLL);
}

#[tokio::test(start_paused = true)]
async fn equal_parameters_do_not_touch_hardware() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    let before = enable_discovery_count(&bed.controller.calls());

    // The unlock-handler mask only matters on the lock screen, so while
    // unlocked these evaluations produce identical parameters.
    let id = bed.handle.add_unlock_handler(TechMask::NFC_V).await.unwrap();
    assert!(bed.handle.remove_unlock_handler(id).await.unwrap());
    bed.handle
        .screen_state_changed(ScreenState::OnUnlocked)
        .unwrap();
    settle().await;

    assert_eq!(enable_discovery_count(&bed.controller.calls()), before);
}

#[tokio::test(start_paused = true)]
async fn unlock_handlers_enable_lockscreen_polling() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());
    bed.handle
        .screen_state_changed(ScreenState::OnLocked)
        .unwrap();
    settle().await;
    assert!(bed.controller.current_params().unwrap().tech_mask().is_empty());

    let id = bed.handle.add_unlock_handler(TechMask::NFC_A).await.unwrap();
    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::NFC_A);
    assert!(!params.low_power_discovery_enabled());
    assert!(!params.p2p_enabled());

    assert!(bed.handle.remove_unlock_handler(id).await.unwrap());
    assert!(bed.controller.current_params().unwrap().tech_mask().is_empty());
}

#[tokio::test(start_paused = true)]
async fn live_case_techs_poll_on_the_lock_screen() {
    let mut config = fast_config();
    config = config.with_live_case_types(["TypeA", "TypeF"]).unwrap();
    let bed = start_service(config);
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    bed.handle
        .screen_state_changed(ScreenState::OnLocked)
        .unwrap();
    settle().await;

    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::NFC_A | TechMask::NFC_F);
    assert!(!params.low_power_discovery_enabled());
}

#[tokio::test(start_paused = true)]
async fn pause_polling_stops_discovery_until_timeout() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());
    assert!(bed.controller.discovery_enabled());

    bed.handle
        .pause_polling(Duration::from_secs(1))
        .await
        .unwrap();
    assert!(!bed.controller.discovery_enabled());

    // The pause expires on its own and polling resumes unconditionally.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    settle().await;
    assert!(bed.controller.discovery_enabled());
}

#[tokio::test(start_paused = true)]
async fn resume_polling_cuts_a_pause_short() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    bed.handle
        .pause_polling(Duration::from_secs(30))
        .await
        .unwrap();
    assert!(!bed.controller.discovery_enabled());

    bed.handle.resume_polling().unwrap();
    settle().await;
    assert!(bed.controller.discovery_enabled());
}

#[tokio::test(start_paused = true)]
async fn pause_polling_rejects_out_of_range_timeouts() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    assert!(matches!(
        bed.handle.pause_polling(Duration::ZERO).await,
        Err(ServiceError::PauseTimeoutOutOfRange { .. })
    ));
    assert!(matches!(
        bed.handle.pause_polling(Duration::from_secs(120)).await,
        Err(ServiceError::PauseTimeoutOutOfRange { .. })
    ));
    // A rejected request leaves polling untouched.
    assert!(bed.controller.discovery_enabled());
}

#[tokio::test(start_paused = true)]
async fn routing_deferred_while_tag_connected() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());

    let connected = tag(1, &[0x01, 0x02]);
    bed.controller.present_tag(connected.clone()).await.unwrap();
    settle().await;
    assert_eq!(bed.dispatcher.count(), 1);

    // A reconfiguration request while the tag is still on the antenna is
    // postponed rather than yanking the link.
    let session = bed
        .handle
        .set_reader_mode(
            ReaderModeFlags::polling(TechMask::NFC_F).unwrap(),
            ReaderModeOptions::default(),
        )
        .await
        .unwrap();
    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::DEFAULT_POLL);

    // Once the tag leaves, the presence watcher notices and the deferred
    // reconfiguration goes through.
    connected.set_present(false);
    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    let params = bed.controller.current_params().unwrap();
    assert_eq!(params.tech_mask(), TechMask::NFC_F);
    drop(session);
}

#[tokio::test(start_paused = true)]
async fn disable_resets_applied_parameters() {
    let bed = start_service(fast_config());
    settle().await;
    assert!(bed.handle.enable().await.unwrap());
    assert!(bed.controller.discovery_enabled());

    assert!(bed.handle.disable(false).await.unwrap());
    wait_for_state(&bed.handle, AdapterState::Off).await;
    // Fresh enable starts the polling loop cold again rather than
    // treating it as a restart.
    assert!(bed.handle.enable().await.unwrap());
    let restarts: Vec<bool> = bed
        .controller
        .calls()
        .iter()
        .filter_map(|c| match c {
            HostCall::EnableDiscovery { restart, .. } => Some(*restart),
            _ => None,
        })
        .collect();
    assert_eq!(restarts.first(), Some(&false));
    assert_eq!(restarts.last(), Some(&false));
}
