//! Discovery policy engine.
//!
//! One pure function decides what the controller should be polling for,
//! given everything that influences the decision. The event loop calls it
//! on every routing evaluation (screen changes, reader-mode changes,
//! unlock-handler changes, resume-from-pause) and compares the result
//! against the currently applied parameters, so the hardware is only
//! touched when the answer changed.
//!
//! The screen-state bands are mutually exclusive and evaluated in order:
//! full polling wins when the screen is unlocked, provisioning keeps the
//! default set alive on the lock screen, and lock-screen polling is the
//! narrow union of explicitly requested technologies with low-power mode
//! disabled (low-power discovery cannot wake the unlock path reliably).

use nearfield_core::{DiscoveryParameters, ReaderModeFlags, ScreenState, TechMask};

/// Everything the policy decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInputs<'a> {
    /// Current screen/keyguard state.
    pub screen_state: ScreenState,

    /// Flags of the active reader-mode registration, if any.
    pub reader_mode: Option<&'a ReaderModeFlags>,

    /// Whether the device is still in setup-wizard provisioning.
    pub in_provision_mode: bool,

    /// Union of the technologies requested by lock-screen unlock
    /// handlers.
    pub lockscreen_poll_mask: TechMask,

    /// Technologies polled for live-case accessories, empty when the
    /// feature is off.
    pub live_case_mask: TechMask,

    /// Whether the device supports host card emulation.
    pub hce_capable: bool,
}

/// Compute the discovery parameters for the given inputs.
///
/// Pure and deterministic: equal inputs produce structurally equal
/// parameters.
#[must_use]
pub fn compute_discovery_parameters(inputs: &PolicyInputs<'_>) -> DiscoveryParameters {
    let mut builder = DiscoveryParameters::builder();

    if inputs.screen_state.allows_polling() {
        if let Some(flags) = inputs.reader_mode {
            builder = builder.tech_mask(flags.techs).enable_reader_mode(true);
        } else {
            builder = builder
                .tech_mask(TechMask::DEFAULT_POLL)
                .enable_p2p(true);
        }
    } else if inputs.screen_state == ScreenState::OnLocked && inputs.in_provision_mode {
        // Provisioning handover needs the full default set even though the
        // device is still locked.
        builder = builder
            .tech_mask(TechMask::DEFAULT_POLL)
            .enable_p2p(true);
    } else if inputs.screen_state == ScreenState::OnLocked
        && !(inputs.live_case_mask.is_empty() && inputs.lockscreen_poll_mask.is_empty())
    {
        builder = builder
            .tech_mask(inputs.live_case_mask | inputs.lockscreen_poll_mask)
            .enable_low_power_discovery(false)
            .enable_p2p(false);
    }

    // Host routing stays up from the lock screen onward, provided no
    // reader-mode caller has taken the controller over.
    if inputs.hce_capable && inputs.reader_mode.is_none() {
        builder = builder.enable_host_routing(true);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn inputs(screen_state: ScreenState) -> PolicyInputs<'static> {
        PolicyInputs {
            screen_state,
            reader_mode: None,
            in_provision_mode: false,
            lockscreen_poll_mask: TechMask::NONE,
            live_case_mask: TechMask::NONE,
            hce_capable: true,
        }
    }

    #[test]
    fn unlocked_polls_default_set_with_p2p() {
        let params = compute_discovery_parameters(&inputs(ScreenState::OnUnlocked));
        assert_eq!(params.tech_mask(), TechMask::DEFAULT_POLL);
        assert!(params.p2p_enabled());
        assert!(params.host_routing_enabled());
        assert!(!params.reader_mode_enabled());
    }

    #[test]
    fn locked_provisioning_polls_default_set() {
        let mut i = inputs(ScreenState::OnLocked);
        i.in_provision_mode = true;
        let params = compute_discovery_parameters(&i);
        assert_eq!(params.tech_mask(), TechMask::DEFAULT_POLL);
        assert!(params.p2p_enabled());
    }

    #[test]
    fn reader_mode_polls_exactly_requested_techs() {
        let flags =
            ReaderModeFlags::polling(TechMask::NFC_A | TechMask::NFC_B).unwrap();
        let mut i = inputs(ScreenState::OnUnlocked);
        i.reader_mode = Some(&flags);

        let params = compute_discovery_parameters(&i);
        assert_eq!(params.tech_mask(), TechMask::NFC_A | TechMask::NFC_B);
        assert!(params.reader_mode_enabled());
        assert!(!params.p2p_enabled());
        // Reader mode suppresses host routing even on HCE-capable devices.
        assert!(!params.host_routing_enabled());
    }

    #[test]
    fn locked_unlock_handlers_poll_their_union() {
        let mut i = inputs(ScreenState::OnLocked);
        i.lockscreen_poll_mask = TechMask::NFC_A;
        i.live_case_mask = TechMask::NFC_V;

        let params = compute_discovery_parameters(&i);
        assert_eq!(params.tech_mask(), TechMask::NFC_A | TechMask::NFC_V);
        assert!(!params.low_power_discovery_enabled());
        assert!(!params.p2p_enabled());
    }

    #[rstest]
    #[case(ScreenState::OffLocked)]
    #[case(ScreenState::OffUnlocked)]
    #[case(ScreenState::OnLocked)]
    fn below_threshold_without_requests_polls_nothing(#[case] screen: ScreenState) {
        let params = compute_discovery_parameters(&inputs(screen));
        assert!(params.tech_mask().is_empty());
        // Host routing still runs on capable devices, so discovery stays
        // enabled for listening.
        assert!(params.host_routing_enabled());
        assert!(params.should_enable_discovery());
    }

    #[test]
    fn nothing_to_do_without_hce() {
        let mut i = inputs(ScreenState::OffLocked);
        i.hce_capable = false;
        let params = compute_discovery_parameters(&i);
        assert!(!params.should_enable_discovery());
    }

    #[test]
    fn deterministic_for_equal_inputs() {
        let flags = ReaderModeFlags::polling(TechMask::NFC_F).unwrap();
        let mut i = inputs(ScreenState::OnUnlocked);
        i.reader_mode = Some(&flags);

        let a = compute_discovery_parameters(&i);
        let b = compute_discovery_parameters(&i);
        assert_eq!(a, b);
    }
}
