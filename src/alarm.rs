// MIT License - Copyright (c) 2026 Peter Wright

//! In-memory model of the panel the client is connected to.
//!
//! [`Alarm`] is a deterministic fold: feeding it the same sequence of
//! decoded messages from the initial state always yields the same final
//! state and the same notifications. It never performs I/O; the client
//! applies messages and delivers the returned [`AlarmChange`]s to
//! observers, so state mutation always happens before notification.

use crate::constants::{BASE_ZONES, MAX_ZONES};
use crate::event::{
    ArmingFlags, Event, EventKind, EventSource, PanelModel, StatusPayload, StatusUpdate,
    SystemStatusEvent, ZoneForm,
};

/// The overall arming state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmingState {
    Unknown,
    Disarmed,
    Arming,
    ExitDelay,
    EntryDelay,
    Armed,
    Triggered,
}

impl ArmingState {
    /// States in which a zone alarm escalates to `Triggered`.
    fn is_armed_ish(self) -> bool {
        matches!(
            self,
            Self::Arming | Self::ExitDelay | Self::EntryDelay | Self::Armed | Self::Triggered
        )
    }
}

/// Which arming mode the last arm event selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmingMode {
    Away,
    Home,
    Day,
    Night,
    Vacation,
    Highest,
}

/// A zone's instantaneous sensor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneState {
    Unknown,
    Sealed,
    Unsealed,
}

/// Model and firmware version learned from an `S17` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelInfo {
    pub model: PanelModel,
    pub version: String,
}

/// A notification produced by folding one message into the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmChange {
    State {
        state: ArmingState,
        mode: Option<ArmingMode>,
    },
    Zone {
        zone: u8,
        state: ZoneState,
    },
}

/// Authoritative zone and arming state for one panel.
#[derive(Debug, Clone)]
pub struct Alarm {
    infer_arming_state: bool,
    notify_first_zone_change: bool,
    arming_state: ArmingState,
    arming_mode: Option<ArmingMode>,
    /// Arming state recorded when `Triggered` was entered, restored by
    /// an alarm-restore event.
    pre_trigger_state: Option<ArmingState>,
    zones: [ZoneState; MAX_ZONES as usize],
    /// Whether the panel has been observed to have more than 16 zones.
    expanded: bool,
    panel_info: Option<PanelInfo>,
}

impl Alarm {
    pub fn new(infer_arming_state: bool) -> Self {
        Self {
            infer_arming_state,
            notify_first_zone_change: true,
            arming_state: ArmingState::Unknown,
            arming_mode: None,
            pre_trigger_state: None,
            zones: [ZoneState::Unknown; MAX_ZONES as usize],
            expanded: false,
            panel_info: None,
        }
    }

    /// Whether the first transition out of `Unknown` notifies zone-change
    /// observers. On by default.
    pub fn set_notify_first_zone_change(&mut self, notify: bool) {
        self.notify_first_zone_change = notify;
    }

    pub fn arming_state(&self) -> ArmingState {
        self.arming_state
    }

    pub fn arming_mode(&self) -> Option<ArmingMode> {
        self.arming_mode
    }

    /// State of a zone (1-based). Out-of-range ids are `Unknown`.
    pub fn zone_state(&self, zone: u8) -> ZoneState {
        match zone {
            1..=MAX_ZONES => self.zones[zone as usize - 1],
            _ => ZoneState::Unknown,
        }
    }

    /// States for every addressable zone, in zone order.
    pub fn zone_states(&self) -> &[ZoneState] {
        &self.zones[..self.zone_count() as usize]
    }

    /// How many zones the panel is believed to have: 16 until a FORM 5
    /// reply, a D32X version reply, or an event naming a higher zone
    /// proves otherwise.
    pub fn zone_count(&self) -> u8 {
        if self.expanded {
            MAX_ZONES
        } else {
            BASE_ZONES
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn panel_info(&self) -> Option<&PanelInfo> {
        self.panel_info.as_ref()
    }

    /// Fold one decoded message into the model, returning the
    /// notifications to deliver.
    pub fn handle_event(&mut self, event: &Event) -> Vec<AlarmChange> {
        let mut changes = Vec::new();
        match event {
            Event::SystemStatus(event) => self.handle_system_status(event, &mut changes),
            Event::StatusUpdate(update) => self.handle_status_update(update, &mut changes),
            // Keypad input flowing toward the panel carries no state.
            Event::UserInterface(_) => {}
        }
        changes
    }

    /// Drop back to `Unknown` after a transport loss. Learned facts about
    /// the panel (model, zone count) are retained.
    pub fn mark_unknown(&mut self) -> Vec<AlarmChange> {
        let mut changes = Vec::new();
        self.arming_mode = None;
        self.pre_trigger_state = None;
        self.update_arming_state(ArmingState::Unknown, &mut changes);
        self.zones = [ZoneState::Unknown; MAX_ZONES as usize];
        changes
    }

    fn handle_system_status(&mut self, event: &SystemStatusEvent, changes: &mut Vec<AlarmChange>) {
        if let EventSource::Zone(zone) = event.source {
            if zone > BASE_ZONES {
                self.expanded = true;
            }
        }

        match event.kind {
            EventKind::Unsealed => {
                if let Some(zone) = event.zone() {
                    self.update_zone(zone, ZoneState::Unsealed, changes);
                }
            }
            EventKind::Sealed => {
                if let Some(zone) = event.zone() {
                    self.update_zone(zone, ZoneState::Sealed, changes);
                }
            }
            EventKind::Alarm => {
                // Duress/panic/medical alarms are user-raised and do not
                // reflect the arming machine; zone alarms only escalate
                // when the panel could actually be triggered.
                if event.zone().is_some() && self.arming_state.is_armed_ish() {
                    if self.arming_state != ArmingState::Triggered {
                        self.pre_trigger_state = Some(self.arming_state);
                    }
                    self.update_arming_state(ArmingState::Triggered, changes);
                }
            }
            EventKind::AlarmRestore => {
                if self.arming_state == ArmingState::Triggered {
                    let restored = self.pre_trigger_state.take().unwrap_or(ArmingState::Unknown);
                    self.update_arming_state(restored, changes);
                }
            }
            EventKind::EntryDelayStart => {
                self.update_arming_state(ArmingState::EntryDelay, changes);
            }
            EventKind::EntryDelayEnd => {
                self.update_arming_state(ArmingState::Armed, changes);
            }
            EventKind::ExitDelayStart => {
                self.update_arming_state(ArmingState::ExitDelay, changes);
            }
            EventKind::ExitDelayEnd => {
                // Only meaningful while the exit delay is running; a
                // disarm during the delay still emits this event.
                if self.arming_state == ArmingState::ExitDelay {
                    self.update_arming_state(ArmingState::Armed, changes);
                }
            }
            EventKind::ArmedAway => self.armed(ArmingMode::Away, changes),
            EventKind::ArmedHome => self.armed(ArmingMode::Home, changes),
            EventKind::ArmedDay => self.armed(ArmingMode::Day, changes),
            EventKind::ArmedNight => self.armed(ArmingMode::Night, changes),
            EventKind::ArmedVacation => self.armed(ArmingMode::Vacation, changes),
            EventKind::ArmedHighest => self.armed(ArmingMode::Highest, changes),
            EventKind::Disarmed => {
                self.arming_mode = None;
                self.pre_trigger_state = None;
                self.update_arming_state(ArmingState::Disarmed, changes);
            }
            EventKind::ArmingDelayed => {
                self.update_arming_state(ArmingState::Arming, changes);
            }
            _ => {}
        }
    }

    fn armed(&mut self, mode: ArmingMode, changes: &mut Vec<AlarmChange>) {
        self.arming_mode = Some(mode);
        self.update_arming_state(ArmingState::Armed, changes);
    }

    fn handle_status_update(&mut self, update: &StatusUpdate, changes: &mut Vec<AlarmChange>) {
        match &update.payload {
            StatusPayload::Zones { form, base, zones } => {
                if *base > 1 {
                    self.expanded = true;
                }
                // Only the input-unsealed forms are authoritative for
                // sealed/unsealed state; the other forms describe
                // orthogonal conditions.
                if *form == ZoneForm::InputUnsealed {
                    for k in 0..BASE_ZONES {
                        let zone = base + k;
                        let state = if zones.contains(&zone) {
                            ZoneState::Unsealed
                        } else {
                            ZoneState::Sealed
                        };
                        self.update_zone(zone, state, changes);
                    }
                }
            }
            StatusPayload::Arming(flags) => self.handle_arming_snapshot(*flags, changes),
            StatusPayload::Version(version) => {
                if version.model.has_expanded_zones() {
                    self.expanded = true;
                }
                self.panel_info = Some(PanelInfo {
                    model: version.model,
                    version: version.version(),
                });
            }
            _ => {}
        }
    }

    fn handle_arming_snapshot(&mut self, flags: ArmingFlags, changes: &mut Vec<AlarmChange>) {
        let fully_armed =
            flags.intersects(ArmingFlags::AREA_1_FULLY_ARMED | ArmingFlags::AREA_2_FULLY_ARMED);
        let entry_delay =
            flags.intersects(ArmingFlags::ENTRY_DELAY_1_ON | ArmingFlags::ENTRY_DELAY_2_ON);
        let armed = flags.intersects(ArmingFlags::AREA_1_ARMED | ArmingFlags::AREA_2_ARMED);

        if fully_armed {
            self.update_arming_state(ArmingState::Armed, changes);
        } else if entry_delay {
            self.update_arming_state(ArmingState::EntryDelay, changes);
        } else if armed {
            self.update_arming_state(ArmingState::ExitDelay, changes);
        } else if self.infer_arming_state {
            // Some panels (< v5.8) report an empty snapshot while armed;
            // with inference on, only system status events may demote a
            // known state back to disarmed.
            if self.arming_state == ArmingState::Unknown {
                self.update_arming_state(ArmingState::Disarmed, changes);
            }
        } else {
            self.update_arming_state(ArmingState::Disarmed, changes);
        }
    }

    fn update_arming_state(&mut self, state: ArmingState, changes: &mut Vec<AlarmChange>) {
        if self.arming_state != state {
            self.arming_state = state;
            changes.push(AlarmChange::State {
                state,
                mode: self.arming_mode,
            });
        }
    }

    fn update_zone(&mut self, zone: u8, state: ZoneState, changes: &mut Vec<AlarmChange>) {
        if !(1..=MAX_ZONES).contains(&zone) {
            return;
        }
        if zone > BASE_ZONES {
            self.expanded = true;
        }
        let slot = &mut self.zones[zone as usize - 1];
        if *slot != state {
            let was_unknown = *slot == ZoneState::Unknown;
            *slot = state;
            if !was_unknown || self.notify_first_zone_change {
                changes.push(AlarmChange::Zone { zone, state });
            }
        }
    }
}
