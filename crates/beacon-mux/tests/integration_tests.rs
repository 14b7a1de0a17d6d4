//! Integration tests for the beacon broadcaster
//!
//! These tests drive the broadcast controller end to end against a
//! recording radio adapter:
//! - Admission control and the steady state
//! - Rotation coverage and ordering
//! - Withdrawal and backfill without gaps
//! - Power loss and sleep/wake handling
//! - Event emission for observers

use beacon_mux::{
    AdapterError, BroadcastConfig, BroadcastController, BroadcastError, BroadcastEvent, BeaconId,
    PowerState, RadioAdapter, RotationPhase,
};
use beacon_protocol::{encode, AdvertisementPayload, AdvertisementRecord, BeaconIdentity, Uuid};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// A radio call as seen by the adapter
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Start(AdvertisementRecord),
        Stop,
    }

    /// Adapter that records every call
    pub struct RecordingRadio {
        pub power: PowerState,
        pub calls: Vec<Call>,
    }

    impl RadioAdapter for RecordingRadio {
        fn power_state(&self) -> PowerState {
            self.power
        }

        fn start_advertising(&mut self, payload: &AdvertisementPayload) -> Result<(), AdapterError> {
            if !self.power.is_ready() {
                return Err(AdapterError::NotReady(self.power));
            }
            self.calls.push(Call::Start(payload.record));
            Ok(())
        }

        fn stop_advertising(&mut self) {
            self.calls.push(Call::Stop);
        }
    }

    pub type Controller = BroadcastController<RecordingRadio>;

    /// Controller with `slots` physical slots admitting up to `max_enabled`
    pub fn controller(slots: usize, max_enabled: usize) -> Controller {
        BroadcastController::with_config(
            BroadcastConfig {
                max_concurrent: slots,
                max_enabled,
                ..Default::default()
            },
            RecordingRadio {
                power: PowerState::On,
                calls: Vec::new(),
            },
        )
    }

    pub fn identity(minor: u16) -> BeaconIdentity {
        BeaconIdentity::new(Uuid::nil(), 7, minor, -59)
    }

    /// Add `n` beacons with distinct minors starting at 1
    pub fn add_beacons(ctl: &mut Controller, n: u16) -> Vec<BeaconId> {
        (1..=n)
            .map(|minor| ctl.add_beacon(format!("Beacon {}", minor), identity(minor)))
            .collect()
    }

    /// Add and enable `n` beacons
    pub fn enabled_beacons(ctl: &mut Controller, n: u16) -> Vec<BeaconId> {
        let ids = add_beacons(ctl, n);
        for id in &ids {
            ctl.set_enabled(*id, true).unwrap();
        }
        ids
    }

    /// Expected start call for a beacon added by `add_beacons`
    pub fn start_of(minor: u16) -> Call {
        Call::Start(encode(&identity(minor)))
    }

    pub fn take_calls(ctl: &mut Controller) -> Vec<Call> {
        std::mem::take(&mut ctl.adapter_mut().calls)
    }

    /// Check if events contain an OnAirChanged with exactly this set
    pub fn has_on_air(events: &[BroadcastEvent], expected: &[BeaconId]) -> bool {
        events
            .iter()
            .any(|e| matches!(e, BroadcastEvent::OnAirChanged { on_air } if on_air == expected))
    }
}

use helpers::*;

// ============================================================================
// Admission
// ============================================================================

mod admission_tests {
    use super::*;

    #[test]
    fn third_enable_rejected_with_two_slots() {
        let mut ctl = controller(2, 2);
        let ids = add_beacons(&mut ctl, 3);
        ctl.set_enabled(ids[0], true).unwrap();
        ctl.set_enabled(ids[1], true).unwrap();
        ctl.drain_events();

        let err = ctl.set_enabled(ids[2], true).unwrap_err();
        assert!(matches!(err, BroadcastError::Admission(_)));

        let enabled: Vec<BeaconId> = ctl.registry().enabled().map(|b| b.id).collect();
        assert_eq!(enabled, vec![ids[0], ids[1]]);
        assert_eq!(ctl.status_message(), "At most 2 beacons can broadcast at once");

        let events = ctl.drain_events();
        assert_eq!(
            events,
            vec![
                BroadcastEvent::AdmissionRejected { id: ids[2], limit: 2 },
                BroadcastEvent::Status {
                    message: "At most 2 beacons can broadcast at once".to_string()
                },
            ]
        );
    }

    #[test]
    fn disabling_frees_a_slot() {
        let mut ctl = controller(2, 2);
        let ids = add_beacons(&mut ctl, 3);
        ctl.set_enabled(ids[0], true).unwrap();
        ctl.set_enabled(ids[1], true).unwrap();

        ctl.set_enabled(ids[0], false).unwrap();
        ctl.set_enabled(ids[2], true).unwrap();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[1], ids[2]]);
    }

    #[test]
    fn unknown_beacon_is_not_found() {
        let mut ctl = controller(2, 2);
        let ghost = BeaconId::new();
        assert!(matches!(
            ctl.set_enabled(ghost, true),
            Err(BroadcastError::BeaconNotFound(id)) if id == ghost
        ));
    }
}

// ============================================================================
// Steady state
// ============================================================================

mod steady_tests {
    use super::*;

    #[test]
    fn on_air_equals_active_set() {
        let mut ctl = controller(2, 2);
        let ids = enabled_beacons(&mut ctl, 2);

        assert_eq!(ctl.scheduler().phase(), RotationPhase::Steady);
        assert_eq!(ctl.scheduler().on_air(), ids);
        assert_eq!(
            take_calls(&mut ctl),
            vec![Call::Stop, start_of(1), Call::Stop, start_of(1), start_of(2)]
        );

        // Ticks do nothing while steady
        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), ids);
        assert!(take_calls(&mut ctl).is_empty());
    }

    #[test]
    fn ack_reports_broadcasting() {
        let mut ctl = controller(2, 2);
        enabled_beacons(&mut ctl, 1);
        ctl.drain_events();

        ctl.handle_advertising_ack(Ok(()));
        assert!(ctl.is_advertising());
        assert_eq!(ctl.status_message(), "Broadcasting iBeacon signal");
        assert!(ctl
            .drain_events()
            .contains(&BroadcastEvent::AdvertisingChanged { advertising: true }));
    }
}

// ============================================================================
// Rotation
// ============================================================================

mod rotation_tests {
    use super::*;

    #[test]
    fn single_slot_covers_all_with_period_n() {
        let mut ctl = controller(1, 4);
        let ids = enabled_beacons(&mut ctl, 4);
        assert!(ctl.ticking_enabled());

        let mut seen = vec![ctl.scheduler().on_air()[0]];
        for _ in 0..8 {
            ctl.tick();
            let on_air = ctl.scheduler().on_air();
            assert_eq!(on_air.len(), 1);
            seen.push(on_air[0]);
        }

        assert_eq!(&seen[..4], &ids[..]);
        assert_eq!(&seen[4..8], &ids[..]);
        assert_eq!(seen[8], ids[0]);
    }

    #[test]
    fn two_slots_slide_window() {
        let mut ctl = controller(2, 3);
        let ids = enabled_beacons(&mut ctl, 3);
        assert_eq!(ctl.scheduler().on_air(), vec![ids[0], ids[1]]);
        take_calls(&mut ctl);

        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[1], ids[2]]);
        assert_eq!(
            take_calls(&mut ctl),
            vec![Call::Stop, start_of(2), start_of(3)]
        );

        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[2], ids[0]]);

        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[0], ids[1]]);
    }

    #[test]
    fn newcomer_waits_its_turn() {
        let mut ctl = controller(1, 3);
        let ids = add_beacons(&mut ctl, 3);
        ctl.set_enabled(ids[0], true).unwrap();
        ctl.set_enabled(ids[1], true).unwrap();
        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[1]]);
        take_calls(&mut ctl);

        ctl.set_enabled(ids[2], true).unwrap();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[1]]);
        assert!(take_calls(&mut ctl).is_empty());

        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[2]]);
    }

    #[test]
    fn favorites_do_not_change_rotation() {
        let mut ctl = controller(1, 3);
        let ids = enabled_beacons(&mut ctl, 3);
        ctl.toggle_favorite(ids[2]).unwrap();

        assert_eq!(ctl.registry().display_order()[0].id, ids[2]);
        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[1]]);
    }

    #[test]
    fn phase_events_on_enter_and_leave() {
        let mut ctl = controller(1, 2);
        let ids = add_beacons(&mut ctl, 2);
        ctl.set_enabled(ids[0], true).unwrap();
        ctl.drain_events();

        ctl.set_enabled(ids[1], true).unwrap();
        assert!(ctl.drain_events().contains(&BroadcastEvent::PhaseChanged {
            from: RotationPhase::Steady,
            to: RotationPhase::Rotating,
        }));

        ctl.set_enabled(ids[1], false).unwrap();
        assert!(ctl.drain_events().contains(&BroadcastEvent::PhaseChanged {
            from: RotationPhase::Rotating,
            to: RotationPhase::Steady,
        }));
        assert!(!ctl.ticking_enabled());
    }
}

// ============================================================================
// Withdrawal
// ============================================================================

mod withdrawal_tests {
    use super::*;

    #[test]
    fn deactivation_backfills_in_same_push() {
        let mut ctl = controller(2, 4);
        let ids = enabled_beacons(&mut ctl, 4);
        assert_eq!(ctl.scheduler().on_air(), vec![ids[0], ids[1]]);
        take_calls(&mut ctl);
        ctl.drain_events();

        ctl.set_enabled(ids[0], false).unwrap();

        assert_eq!(ctl.scheduler().on_air(), vec![ids[1], ids[2]]);
        assert_eq!(
            take_calls(&mut ctl),
            vec![Call::Stop, start_of(2), start_of(3)]
        );

        let events = ctl.drain_events();
        let on_air_events = events
            .iter()
            .filter(|e| matches!(e, BroadcastEvent::OnAirChanged { .. }))
            .count();
        assert_eq!(on_air_events, 1);
        assert!(has_on_air(&events, &[ids[1], ids[2]]));
    }

    #[test]
    fn remove_on_air_beacon_withdraws_first() {
        let mut ctl = controller(2, 2);
        let ids = enabled_beacons(&mut ctl, 2);
        take_calls(&mut ctl);
        ctl.drain_events();

        let removed = ctl.remove_beacon(ids[0]).unwrap();
        assert_eq!(removed.id, ids[0]);
        assert_eq!(ctl.scheduler().on_air(), vec![ids[1]]);
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop, start_of(2)]);

        let events = ctl.drain_events();
        assert!(events.contains(&BroadcastEvent::BeaconRemoved {
            id: ids[0],
            withdrawn: true
        }));
        assert!(ctl.registry().get(ids[0]).is_none());
    }

    #[test]
    fn remove_idle_beacon_leaves_radio_alone() {
        let mut ctl = controller(2, 2);
        let ids = add_beacons(&mut ctl, 2);
        ctl.set_enabled(ids[0], true).unwrap();
        take_calls(&mut ctl);
        ctl.drain_events();

        ctl.remove_beacon(ids[1]).unwrap();
        assert!(take_calls(&mut ctl).is_empty());
        assert_eq!(
            ctl.drain_events(),
            vec![BroadcastEvent::BeaconRemoved {
                id: ids[1],
                withdrawn: false
            }]
        );
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut ctl = controller(2, 2);
        assert!(matches!(
            ctl.remove_beacon(BeaconId::new()),
            Err(BroadcastError::BeaconNotFound(_))
        ));
    }

    #[test]
    fn removing_last_stops_broadcast() {
        let mut ctl = controller(2, 2);
        let ids = enabled_beacons(&mut ctl, 1);
        take_calls(&mut ctl);

        ctl.remove_beacon(ids[0]).unwrap();
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop]);
        assert_eq!(ctl.scheduler().phase(), RotationPhase::Idle);
        assert_eq!(ctl.status_message(), "Broadcasting stopped");
    }
}

// ============================================================================
// Editing
// ============================================================================

mod edit_tests {
    use super::*;

    #[test]
    fn editing_on_air_beacon_rebroadcasts() {
        let mut ctl = controller(2, 2);
        let ids = enabled_beacons(&mut ctl, 1);
        take_calls(&mut ctl);

        ctl.edit_beacon(ids[0], "Renamed", identity(42)).unwrap();
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop, start_of(42)]);
        assert_eq!(ctl.registry().get(ids[0]).unwrap().name, "Renamed");
        assert!(ctl.registry().get(ids[0]).unwrap().enabled);
    }

    #[test]
    fn editing_waiting_beacon_is_silent() {
        let mut ctl = controller(1, 2);
        let ids = enabled_beacons(&mut ctl, 2);
        take_calls(&mut ctl);

        ctl.edit_beacon(ids[1], "Later", identity(9)).unwrap();
        assert!(take_calls(&mut ctl).is_empty());

        ctl.tick();
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop, start_of(9)]);
    }

    #[test]
    fn add_parsed_rejects_bad_uuid() {
        let mut ctl = controller(2, 2);
        let result = ctl.add_beacon_parsed("Bad", Some("not-a-uuid"), None, None, None);
        assert!(matches!(result, Err(BroadcastError::InvalidIdentity(_))));
        assert!(ctl.registry().is_empty());
    }

    #[test]
    fn add_parsed_fills_defaults() {
        let mut ctl = controller(2, 2);
        let id = ctl.add_beacon_parsed("Gen", None, None, None, None).unwrap();
        let beacon = ctl.registry().get(id).unwrap();
        assert_eq!(beacon.identity.major, 1);
        assert_eq!(beacon.identity.minor, 1);
        assert_eq!(beacon.identity.measured_power, -59);
        assert!(!beacon.enabled);
    }
}

// ============================================================================
// Power and sleep
// ============================================================================

mod power_tests {
    use super::*;

    #[test]
    fn power_loss_during_rotation() {
        let mut ctl = controller(1, 3);
        let ids = enabled_beacons(&mut ctl, 3);
        assert_eq!(ctl.scheduler().on_air(), vec![ids[0]]);
        take_calls(&mut ctl);

        ctl.adapter_mut().power = PowerState::Off;
        ctl.handle_power_state(PowerState::Off);
        assert!(!ctl.ticking_enabled());
        assert_eq!(ctl.status_message(), "Bluetooth is powered off");
        assert!(take_calls(&mut ctl).is_empty());

        ctl.adapter_mut().power = PowerState::On;
        ctl.handle_power_state(PowerState::On);
        assert!(ctl.ticking_enabled());
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop, start_of(1)]);

        ctl.tick();
        assert_eq!(ctl.scheduler().on_air(), vec![ids[1]]);
    }

    #[test]
    fn changes_while_off_make_no_radio_calls() {
        let mut ctl = controller(2, 3);
        let ids = add_beacons(&mut ctl, 3);
        ctl.adapter_mut().power = PowerState::Unauthorized;
        ctl.handle_power_state(PowerState::Unauthorized);
        take_calls(&mut ctl);

        ctl.set_enabled(ids[0], true).unwrap();
        ctl.set_enabled(ids[1], true).unwrap();
        ctl.set_enabled(ids[2], true).unwrap();
        ctl.tick();

        assert!(take_calls(&mut ctl).is_empty());
        assert_eq!(ctl.status_message(), "Bluetooth is not ready");

        ctl.adapter_mut().power = PowerState::On;
        ctl.handle_power_state(PowerState::On);
        let on_air = ctl.scheduler().on_air();
        assert_eq!(on_air.len(), 2);
        assert_eq!(take_calls(&mut ctl).len(), 3);
    }

    #[test]
    fn repeated_power_state_is_ignored() {
        let mut ctl = controller(2, 2);
        ctl.drain_events();
        ctl.handle_power_state(PowerState::On);
        assert!(ctl.drain_events().is_empty());
    }

    #[test]
    fn suspend_resume_restores_broadcast() {
        let mut ctl = controller(2, 2);
        let ids = enabled_beacons(&mut ctl, 1);
        take_calls(&mut ctl);

        ctl.suspend();
        assert!(ctl.is_suspended());
        assert!(ctl.restart_pending());
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop]);

        ctl.resume();
        assert!(!ctl.is_suspended());
        assert!(!ctl.restart_pending());
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop, start_of(1)]);
        assert_eq!(ctl.scheduler().on_air(), ids);
    }

    #[test]
    fn suspend_when_idle_does_nothing() {
        let mut ctl = controller(2, 2);
        add_beacons(&mut ctl, 1);
        take_calls(&mut ctl);

        ctl.suspend();
        assert!(!ctl.restart_pending());
        ctl.resume();
        assert!(take_calls(&mut ctl).is_empty());
    }

    #[test]
    fn enable_while_asleep_starts_on_wake() {
        let mut ctl = controller(2, 2);
        let ids = add_beacons(&mut ctl, 1);
        ctl.suspend();

        ctl.set_enabled(ids[0], true).unwrap();
        assert!(take_calls(&mut ctl).is_empty());
        assert!(ctl.restart_pending());

        ctl.resume();
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop, start_of(1)]);
    }

    #[test]
    fn power_recovered_while_asleep_starts_on_wake() {
        let mut ctl = controller(2, 2);
        let ids = add_beacons(&mut ctl, 1);
        ctl.adapter_mut().power = PowerState::Off;
        ctl.handle_power_state(PowerState::Off);
        ctl.set_enabled(ids[0], true).unwrap();

        ctl.suspend();
        assert!(!ctl.restart_pending());

        ctl.adapter_mut().power = PowerState::On;
        ctl.handle_power_state(PowerState::On);
        assert!(take_calls(&mut ctl).is_empty());
        assert!(ctl.restart_pending());

        ctl.resume();
        assert_eq!(take_calls(&mut ctl), vec![Call::Stop, start_of(1)]);
        assert!(!ctl.restart_pending());
        assert_eq!(ctl.status_message(), "Broadcasting started");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Enable(usize),
        Disable(usize),
        Remove(usize),
        Tick,
        PowerOff,
        PowerOn,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..6).prop_map(Op::Enable),
            (0usize..6).prop_map(Op::Disable),
            (0usize..6).prop_map(Op::Remove),
            Just(Op::Tick),
            Just(Op::PowerOff),
            Just(Op::PowerOn),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_under_any_sequence(
            slots in 1usize..4,
            extra in 0usize..3,
            ops in prop::collection::vec(op(), 1..60)
        ) {
            let max_enabled = slots + extra;
            let mut ctl = controller(slots, max_enabled);
            let ids = add_beacons(&mut ctl, 6);

            for op in ops {
                match op {
                    Op::Enable(i) => { let _ = ctl.set_enabled(ids[i], true); }
                    Op::Disable(i) => { let _ = ctl.set_enabled(ids[i], false); }
                    Op::Remove(i) => { let _ = ctl.remove_beacon(ids[i]); }
                    Op::Tick => {
                        if ctl.ticking_enabled() {
                            ctl.tick();
                        }
                    }
                    Op::PowerOff => {
                        ctl.adapter_mut().power = PowerState::Off;
                        ctl.handle_power_state(PowerState::Off);
                    }
                    Op::PowerOn => {
                        ctl.adapter_mut().power = PowerState::On;
                        ctl.handle_power_state(PowerState::On);
                    }
                }

                let mut enabled: Vec<BeaconId> = ctl.registry().enabled().map(|b| b.id).collect();
                let mut active = ctl.scheduler().active_set().to_vec();
                enabled.sort();
                active.sort();
                prop_assert_eq!(&enabled, &active);
                prop_assert!(enabled.len() <= max_enabled);

                let on_air = ctl.scheduler().on_air();
                prop_assert_eq!(on_air.len(), slots.min(active.len()));
                for id in &on_air {
                    prop_assert!(active.contains(id));
                }
            }
        }

        #[test]
        fn coverage_within_n_ticks(n in 2u16..7) {
            let mut ctl = controller(1, n as usize);
            let ids = enabled_beacons(&mut ctl, n);

            let mut seen = std::collections::HashSet::new();
            seen.insert(ctl.scheduler().on_air()[0]);
            for _ in 0..n {
                ctl.tick();
                seen.insert(ctl.scheduler().on_air()[0]);
            }
            prop_assert_eq!(seen.len(), ids.len());
        }
    }
}
