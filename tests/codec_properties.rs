// MIT License - Copyright (c) 2026 Peter Wright
//
// Property tests for the wire codec and the alarm fold: round-trips,
// checksum validity, terminator tolerance, determinism, and no-panic on
// arbitrary input.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use ness_client::constants::KEYPAD_KEYS;
use ness_client::{
    Alarm, AlarmChange, ArmingState, Event, Packet, PanelVersion, StatusPayload, StatusUpdate,
    SystemStatusEvent, ZoneState,
};
use ness_client::event::{
    ArmingFlags, AuxOutputFlags, MiscAlarmFlags, OutputFlags, PanelModel, ViewState, ZoneForm,
};

fn arb_timestamp() -> impl Strategy<Value = NaiveDateTime> {
    (0i32..100, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, mo, d, h, mi, s)| {
            NaiveDate::from_ymd_opt(2000 + y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap()
        },
    )
}

/// Address/timestamp combinations an event packet can carry. An address
/// without a timestamp would produce start byte 0x83, which is the
/// keystring dialect on the wire.
fn arb_event_envelope() -> impl Strategy<Value = (Option<u8>, Option<NaiveDateTime>)> {
    prop_oneof![
        Just((None::<u8>, None::<NaiveDateTime>)),
        arb_timestamp().prop_map(|ts| (None, Some(ts))),
        (0u8..16, arb_timestamp()).prop_map(|(addr, ts)| (Some(addr), Some(ts))),
    ]
}

/// Address/timestamp combinations a status-update response can carry.
/// Responses never set the address bit, so an address is only
/// recognisable through the fixed 16-character line form, which a
/// timestamp would break.
fn arb_status_envelope() -> impl Strategy<Value = (Option<u8>, Option<NaiveDateTime>)> {
    prop_oneof![
        Just((None::<u8>, None::<NaiveDateTime>)),
        arb_timestamp().prop_map(|ts| (None, Some(ts))),
        (0u8..16).prop_map(|addr| (Some(addr), None)),
    ]
}

fn arb_keystring() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(KEYPAD_KEYS), 1..=30)
        .prop_map(|keys| keys.into_iter().collect())
}

fn arb_zone_form() -> impl Strategy<Value = ZoneForm> {
    prop::sample::select(vec![
        ZoneForm::InputUnsealed,
        ZoneForm::RadioUnsealed,
        ZoneForm::CbusUnsealed,
        ZoneForm::InDelay,
        ZoneForm::InDoubleTrigger,
        ZoneForm::InAlarm,
        ZoneForm::Excluded,
        ZoneForm::AutoExcluded,
        ZoneForm::SupervisionFailPending,
        ZoneForm::SupervisionFail,
        ZoneForm::DoorsOpen,
        ZoneForm::DetectorLowBattery,
        ZoneForm::DetectorTamper,
    ])
}

fn arb_status_payload() -> impl Strategy<Value = StatusPayload> {
    prop_oneof![
        (
            arb_zone_form(),
            prop::bool::ANY,
            prop::collection::btree_set(0u8..16, 0..=16)
        )
            .prop_map(|(form, expanded, offsets)| {
                let base = if expanded { 17 } else { 1 };
                StatusPayload::Zones {
                    form,
                    base,
                    zones: offsets.into_iter().map(|k| base + k).collect(),
                }
            }),
        any::<u16>().prop_map(|bits| StatusPayload::MiscAlarms(MiscAlarmFlags::from_bits_retain(
            bits
        ))),
        any::<u16>()
            .prop_map(|bits| StatusPayload::Arming(ArmingFlags::from_bits_retain(bits))),
        any::<u16>()
            .prop_map(|bits| StatusPayload::Outputs(OutputFlags::from_bits_retain(bits))),
        any::<u16>().prop_map(|word| StatusPayload::ViewState(ViewState::from_word(word))),
        (any::<u8>(), 0u8..16, 0u8..16).prop_map(|(model, major, minor)| {
            StatusPayload::Version(PanelVersion {
                model: PanelModel::from_u8(model),
                major,
                minor,
            })
        }),
        any::<u16>().prop_map(|bits| StatusPayload::AuxOutputs(AuxOutputFlags::from_bits_retain(
            bits
        ))),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        ((any::<u8>(), any::<u8>(), any::<u8>()), arb_event_envelope()).prop_map(
            |((event_type, id, area), (address, timestamp))| {
                Event::SystemStatus(SystemStatusEvent::from_triple(
                    event_type, id, area, address, timestamp,
                ))
            }
        ),
        (arb_status_payload(), arb_status_envelope()).prop_map(|(payload, (address, timestamp))| {
            Event::StatusUpdate(StatusUpdate {
                payload,
                address,
                timestamp,
            })
        }),
    ]
}

proptest! {
    /// decode(encode(p)) == p for keystring request packets.
    #[test]
    fn ui_request_roundtrip(address in 0u8..16, keys in arb_keystring()) {
        let packet = Packet::user_interface_request(address, keys);
        let line = packet.encode();
        prop_assert_eq!(Packet::decode(&line).unwrap(), packet);
    }

    /// decode(encode(e)) == e for every event and status update, at both
    /// the frame and payload layer; the encoded frame always verifies.
    #[test]
    fn event_roundtrip(event in arb_event()) {
        let packet = event.encode();
        let line = packet.encode();
        let decoded_packet = Packet::decode(&line).unwrap();
        prop_assert_eq!(&decoded_packet, &packet);
        prop_assert_eq!(Event::decode(&decoded_packet).unwrap(), event);
    }

    /// Terminator arrangement never changes what a line decodes to.
    #[test]
    fn terminators_are_transparent(event in arb_event()) {
        let line = event.encode().encode();
        let bare = Packet::decode(&line).unwrap();
        prop_assert_eq!(&Packet::decode(&format!("{line}\r\n")).unwrap(), &bare);
        prop_assert_eq!(&Packet::decode(&format!("{line}\n")).unwrap(), &bare);
        prop_assert_eq!(&Packet::decode(&format!("{line}?\r\n")).unwrap(), &bare);
    }

    /// Arbitrary input never panics the decoder; it either decodes or
    /// reports a typed error.
    #[test]
    fn decode_never_panics(line in ".*") {
        let _ = Packet::decode(&line);
    }

    /// Arbitrary hex-ish input never panics either.
    #[test]
    fn decode_never_panics_hexish(line in "[0-9a-fA-F]{0,64}") {
        let _ = Packet::decode(&line);
    }

    /// Corrupting a single character of a valid packet never panics the
    /// decoder; an unchanged line still decodes identically.
    #[test]
    fn corruption_never_panics(event in arb_event(), pos in 0usize..64, replacement in b'0'..=b'9') {
        let line = event.encode().encode();
        let mut bytes = line.clone().into_bytes();
        let pos = pos % bytes.len();
        let original = bytes[pos];
        bytes[pos] = replacement;
        let corrupted = String::from_utf8(bytes).unwrap();
        if original != replacement {
            // Whatever happens, it must be a typed result.
            let _ = Packet::decode(&corrupted);
        } else {
            prop_assert_eq!(Packet::decode(&corrupted).unwrap(), Packet::decode(&line).unwrap());
        }
    }

    /// Replaying the same messages from the initial state always yields
    /// the same final state and the same notifications.
    #[test]
    fn alarm_fold_is_deterministic(events in prop::collection::vec(arb_event(), 0..60)) {
        let run = || {
            let mut alarm = Alarm::new(false);
            let changes: Vec<AlarmChange> = events
                .iter()
                .flat_map(|event| alarm.handle_event(event))
                .collect();
            (alarm.arming_state(), alarm.zone_states().to_vec(), changes)
        };
        prop_assert_eq!(run(), run());
    }

    /// The fold never notifies without a real transition, and zone state
    /// never escapes the three-value domain.
    #[test]
    fn alarm_fold_notifies_only_transitions(events in prop::collection::vec(arb_event(), 0..60)) {
        let mut alarm = Alarm::new(false);
        let mut arming = ArmingState::Unknown;
        let mut zones = [ZoneState::Unknown; 32];
        for event in &events {
            for change in alarm.handle_event(event) {
                match change {
                    AlarmChange::State { state, .. } => {
                        prop_assert_ne!(state, arming);
                        arming = state;
                    }
                    AlarmChange::Zone { zone, state } => {
                        prop_assert!((1..=32).contains(&zone));
                        prop_assert_ne!(state, zones[zone as usize - 1]);
                        prop_assert_ne!(state, ZoneState::Unknown);
                        zones[zone as usize - 1] = state;
                    }
                }
            }
        }
        prop_assert_eq!(alarm.arming_state(), arming);
    }
}
