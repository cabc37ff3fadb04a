// MIT License - Copyright (c) 2026 Peter Wright

//! Payload decoders for the two packet families.
//!
//! Command `0x61` carries asynchronous [`SystemStatusEvent`]s as a fixed
//! `(event_type, identifier, area)` triple. Command `0x60` carries either
//! raw keypad input ([`UserInterfaceRequest`]) or a synchronous
//! [`StatusUpdate`] reply to an `Sxx` request. The panel reuses the same
//! envelopes for dozens of meanings, disambiguated by value ranges; all of
//! that demultiplexing happens here so the rest of the crate works with
//! typed values.

use bitflags::bitflags;
use chrono::NaiveDateTime;

use crate::error::PacketError;
use crate::packet::{CommandType, Packet};

/// A decoded message from the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SystemStatus(SystemStatusEvent),
    StatusUpdate(StatusUpdate),
    UserInterface(UserInterfaceRequest),
}

impl Event {
    /// Decode the payload of a framed packet.
    pub fn decode(packet: &Packet) -> Result<Event, PacketError> {
        match packet.command {
            CommandType::SystemStatus => {
                SystemStatusEvent::decode(packet).map(Event::SystemStatus)
            }
            CommandType::UserInterface if packet.is_user_interface_req => {
                Ok(Event::UserInterface(UserInterfaceRequest::parse(packet)))
            }
            CommandType::UserInterface => StatusUpdate::decode(packet).map(Event::StatusUpdate),
        }
    }

    /// Encode back into a packet. `decode(encode(e)) == e` for every value
    /// this module produces.
    pub fn encode(&self) -> Packet {
        match self {
            Event::SystemStatus(event) => event.encode(),
            Event::StatusUpdate(update) => update.encode(),
            Event::UserInterface(request) => request.encode(),
        }
    }
}

/// Keypad-equivalent input sent toward the panel (or echoed by a
/// simulator): either a plain keystring or an `Sxx` status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInterfaceRequest {
    /// `S` plus a two-digit decimal category id; not a keypress.
    StatusRequest { id: u8, address: Option<u8> },
    /// An ordered keypad character sequence.
    Keys { keys: String, address: Option<u8> },
}

impl UserInterfaceRequest {
    fn parse(packet: &Packet) -> Self {
        let data = packet.data.as_str();
        if data.len() == 3 && data.starts_with('S') && data[1..].bytes().all(|b| b.is_ascii_digit())
        {
            if let Ok(id) = data[1..].parse::<u8>() {
                return UserInterfaceRequest::StatusRequest {
                    id,
                    address: packet.address,
                };
            }
        }
        UserInterfaceRequest::Keys {
            keys: data.to_string(),
            address: packet.address,
        }
    }

    pub fn encode(&self) -> Packet {
        let (data, address) = match self {
            UserInterfaceRequest::StatusRequest { id, address } => {
                (format!("S{:02}", id), *address)
            }
            UserInterfaceRequest::Keys { keys, address } => (keys.clone(), *address),
        };
        Packet::user_interface_request(address.unwrap_or(0), data)
    }
}

/// System status event types, part 1 of the protocol documentation.
///
/// Reserved values decode to [`EventKind::Unknown`] rather than failing;
/// the documentation reserves future codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // Zone/user events
    Unsealed,
    Sealed,
    Alarm,
    AlarmRestore,
    ManualExclude,
    ManualInclude,
    AutoExclude,
    AutoInclude,
    TamperUnsealed,
    TamperNormal,
    // System events
    PowerFailure,
    PowerNormal,
    BatteryFailure,
    BatteryNormal,
    ReportFailure,
    ReportNormal,
    SupervisionFailure,
    SupervisionNormal,
    RealTimeClock,
    // Area events
    EntryDelayStart,
    EntryDelayEnd,
    ExitDelayStart,
    ExitDelayEnd,
    ArmedAway,
    ArmedHome,
    ArmedDay,
    ArmedNight,
    ArmedVacation,
    ArmedHighest,
    Disarmed,
    ArmingDelayed,
    // Result events
    OutputOn,
    OutputOff,
    /// Reserved event type; the raw byte is available via `raw_triple()`.
    Unknown,
}

impl EventKind {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Unsealed,
            0x01 => Self::Sealed,
            0x02 => Self::Alarm,
            0x03 => Self::AlarmRestore,
            0x04 => Self::ManualExclude,
            0x05 => Self::ManualInclude,
            0x06 => Self::AutoExclude,
            0x07 => Self::AutoInclude,
            0x08 => Self::TamperUnsealed,
            0x09 => Self::TamperNormal,
            0x10 => Self::PowerFailure,
            0x11 => Self::PowerNormal,
            0x12 => Self::BatteryFailure,
            0x13 => Self::BatteryNormal,
            0x14 => Self::ReportFailure,
            0x15 => Self::ReportNormal,
            0x16 => Self::SupervisionFailure,
            0x17 => Self::SupervisionNormal,
            0x19 => Self::RealTimeClock,
            0x20 => Self::EntryDelayStart,
            0x21 => Self::EntryDelayEnd,
            0x22 => Self::ExitDelayStart,
            0x23 => Self::ExitDelayEnd,
            0x24 => Self::ArmedAway,
            0x25 => Self::ArmedHome,
            0x26 => Self::ArmedDay,
            0x27 => Self::ArmedNight,
            0x28 => Self::ArmedVacation,
            0x2e => Self::ArmedHighest,
            0x2f => Self::Disarmed,
            0x30 => Self::ArmingDelayed,
            0x31 => Self::OutputOn,
            0x32 => Self::OutputOff,
            _ => Self::Unknown,
        }
    }

    /// Whether the identifier byte of this event names a zone.
    fn names_zone(self) -> bool {
        matches!(
            self,
            Self::Unsealed
                | Self::Sealed
                | Self::ManualExclude
                | Self::ManualInclude
                | Self::AutoExclude
                | Self::AutoInclude
                | Self::TamperUnsealed
                | Self::TamperNormal
        )
    }
}

/// What the identifier byte of a system status event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Zone 1-32.
    Zone(u8),
    /// User code 1-56.
    User(u8),
    /// Identifier 57.
    Keyswitch,
    /// Identifier 58.
    ShortArm,
    /// Identifier 0xF0.
    Keypad,
    /// Identifier 0: the main unit itself.
    MainUnit,
    /// An identifier outside every documented range.
    Other(u8),
}

impl EventSource {
    fn classify(kind: EventKind, id: u8, area: AreaTag) -> Self {
        match id {
            0x00 => Self::MainUnit,
            0xf0 => Self::Keypad,
            _ if kind.names_zone() => Self::zone_or_other(id),
            _ if matches!(kind, EventKind::Alarm | EventKind::AlarmRestore) => {
                // Duress/panic/medical alarms are raised by a user at a
                // keypad; every other alarm names the tripped zone.
                if matches!(area, AreaTag::Duress | AreaTag::Panic | AreaTag::Medical) {
                    Self::user_or_other(id)
                } else {
                    Self::zone_or_other(id)
                }
            }
            _ => Self::user_or_other(id),
        }
    }

    fn zone_or_other(id: u8) -> Self {
        if (1..=32).contains(&id) {
            Self::Zone(id)
        } else {
            Self::Other(id)
        }
    }

    fn user_or_other(id: u8) -> Self {
        match id {
            57 => Self::Keyswitch,
            58 => Self::ShortArm,
            1..=56 => Self::User(id),
            other => Self::Other(other),
        }
    }
}

/// The area byte: an arming area for area events, a semantic tag for
/// everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaTag {
    /// Arming area 1-4 (0 for events with no area).
    Area(u8),
    /// 0x80 - 24 hour zone.
    TwentyFourHour,
    /// 0x81
    Fire,
    /// 0x82
    Panic,
    /// 0x83
    Medical,
    /// 0x84
    Duress,
    /// 0x85 - door bell, also flags a door open too long.
    DoorBell,
    /// 0x91
    RadioDetector,
    /// 0x92
    RadioKey,
    /// A reserved tag value.
    Other(u8),
}

impl AreaTag {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00..=0x0f => Self::Area(value),
            0x80 => Self::TwentyFourHour,
            0x81 => Self::Fire,
            0x82 => Self::Panic,
            0x83 => Self::Medical,
            0x84 => Self::Duress,
            0x85 => Self::DoorBell,
            0x91 => Self::RadioDetector,
            0x92 => Self::RadioKey,
            other => Self::Other(other),
        }
    }
}

/// An asynchronous event pushed by the panel over command `0x61`.
///
/// The raw `(event_type, identifier, area)` triple is retained alongside
/// the demultiplexed view so encoding is lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatusEvent {
    pub kind: EventKind,
    pub source: EventSource,
    pub area: AreaTag,
    raw: [u8; 3],
    pub address: Option<u8>,
    pub timestamp: Option<NaiveDateTime>,
}

impl SystemStatusEvent {
    /// Demultiplex a raw event triple. Total: reserved tuples become
    /// `EventKind::Unknown`, never an error.
    pub fn from_triple(
        event_type: u8,
        id: u8,
        area: u8,
        address: Option<u8>,
        timestamp: Option<NaiveDateTime>,
    ) -> Self {
        let kind = EventKind::from_u8(event_type);
        let area_tag = AreaTag::from_u8(area);
        Self {
            kind,
            source: EventSource::classify(kind, id, area_tag),
            area: area_tag,
            raw: [event_type, id, area],
            address,
            timestamp,
        }
    }

    pub fn decode(packet: &Packet) -> Result<Self, PacketError> {
        let bytes = take_hex_bytes::<3>(&packet.data)?;
        Ok(Self::from_triple(
            bytes[0],
            bytes[1],
            bytes[2],
            packet.address,
            packet.timestamp,
        ))
    }

    pub fn encode(&self) -> Packet {
        Packet {
            address: self.address,
            seq: 0,
            command: CommandType::SystemStatus,
            data: format!("{:02X}{:02X}{:02X}", self.raw[0], self.raw[1], self.raw[2]),
            timestamp: self.timestamp,
            is_user_interface_req: false,
        }
    }

    /// The raw `(event_type, identifier, area)` bytes.
    pub fn raw_triple(&self) -> (u8, u8, u8) {
        (self.raw[0], self.raw[1], self.raw[2])
    }

    /// The zone this event names, if its identifier is a zone.
    pub fn zone(&self) -> Option<u8> {
        match self.source {
            EventSource::Zone(zone) => Some(zone),
            _ => None,
        }
    }
}

/// The thirteen per-zone bit-vector forms (FORM 4 for zones 1-16, FORM 5
/// for zones 17-32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneForm {
    InputUnsealed,
    RadioUnsealed,
    CbusUnsealed,
    InDelay,
    InDoubleTrigger,
    InAlarm,
    Excluded,
    AutoExcluded,
    SupervisionFailPending,
    SupervisionFail,
    DoorsOpen,
    DetectorLowBattery,
    DetectorTamper,
}

impl ZoneForm {
    fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::InputUnsealed),
            1 => Some(Self::RadioUnsealed),
            2 => Some(Self::CbusUnsealed),
            3 => Some(Self::InDelay),
            4 => Some(Self::InDoubleTrigger),
            5 => Some(Self::InAlarm),
            6 => Some(Self::Excluded),
            7 => Some(Self::AutoExcluded),
            8 => Some(Self::SupervisionFailPending),
            9 => Some(Self::SupervisionFail),
            10 => Some(Self::DoorsOpen),
            11 => Some(Self::DetectorLowBattery),
            12 => Some(Self::DetectorTamper),
            _ => None,
        }
    }

    fn index(self) -> u8 {
        match self {
            Self::InputUnsealed => 0,
            Self::RadioUnsealed => 1,
            Self::CbusUnsealed => 2,
            Self::InDelay => 3,
            Self::InDoubleTrigger => 4,
            Self::InAlarm => 5,
            Self::Excluded => 6,
            Self::AutoExcluded => 7,
            Self::SupervisionFailPending => 8,
            Self::SupervisionFail => 9,
            Self::DoorsOpen => 10,
            Self::DetectorLowBattery => 11,
            Self::DetectorTamper => 12,
        }
    }
}

bitflags! {
    /// FORM 20 miscellaneous alarm bits.
    ///
    /// The vendor documentation has the byte endianness of this form
    /// reversed; these values follow the bytes panels actually send.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MiscAlarmFlags: u16 {
        const DURESS             = 0x0100;
        const PANIC              = 0x0200;
        const MEDICAL            = 0x0400;
        const FIRE               = 0x0800;
        const INSTALL_END        = 0x1000;
        const EXT_TAMPER         = 0x2000;
        const PANEL_TAMPER       = 0x4000;
        const KEYPAD_TAMPER      = 0x8000;
        const PENDANT_PANIC      = 0x0001;
        const PANEL_BATTERY_LOW  = 0x0002;
        const PANEL_BATTERY_LOW2 = 0x0004;
        const MAINS_FAIL         = 0x0008;
        const CBUS_FAIL          = 0x0010;
    }
}

bitflags! {
    /// FORM 21 arming status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ArmingFlags: u16 {
        const AREA_1_ARMED        = 0x0100;
        const AREA_2_ARMED        = 0x0200;
        const AREA_1_FULLY_ARMED  = 0x0400;
        const AREA_2_FULLY_ARMED  = 0x0800;
        const MONITOR_ARMED       = 0x1000;
        const DAY_MODE_ARMED      = 0x2000;
        const ENTRY_DELAY_1_ON    = 0x4000;
        const ENTRY_DELAY_2_ON    = 0x8000;
        const MANUAL_EXCLUDE_MODE = 0x0001;
        const MEMORY_MODE         = 0x0002;
        const DAY_ZONE_SELECT     = 0x0004;
    }
}

bitflags! {
    /// FORM 22 output state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputFlags: u16 {
        const SIREN_LOUD            = 0x0100;
        const SIREN_SOFT            = 0x0200;
        const SIREN_SOFT_MONITOR    = 0x0400;
        const SIREN_SOFT_FIRE       = 0x0800;
        const STROBE                = 0x1000;
        const RESET                 = 0x2000;
        const SONALART              = 0x4000;
        const KEYPAD_DISPLAY_ENABLE = 0x8000;
        const AUX1                  = 0x0001;
        const AUX2                  = 0x0002;
        const AUX3                  = 0x0004;
        const AUX4                  = 0x0008;
        const MONITOR_OUT           = 0x0010;
        const POWER_FAIL            = 0x0020;
        const PANEL_BATT_FAIL       = 0x0040;
        const TAMPER_XPAND          = 0x0080;
    }
}

bitflags! {
    /// FORM 24 auxiliary output bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuxOutputFlags: u16 {
        const AUX_1 = 0x0001;
        const AUX_2 = 0x0002;
        const AUX_3 = 0x0004;
        const AUX_4 = 0x0008;
        const AUX_5 = 0x0010;
        const AUX_6 = 0x0020;
        const AUX_7 = 0x0040;
        const AUX_8 = 0x0080;
    }
}

/// FORM 23 display view state. Not a bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    Normal,
    BriefDayChime,
    Home,
    Memory,
    BriefDayZoneSelect,
    ExcludeSelect,
    UserProgram,
    InstallerProgram,
    /// A reserved view state word.
    Unknown(u16),
}

impl ViewState {
    pub fn from_word(word: u16) -> Self {
        match word {
            0xf000 => Self::Normal,
            0xe000 => Self::BriefDayChime,
            0xd000 => Self::Home,
            0xc000 => Self::Memory,
            0xb000 => Self::BriefDayZoneSelect,
            0xa000 => Self::ExcludeSelect,
            0x9000 => Self::UserProgram,
            0x8000 => Self::InstallerProgram,
            other => Self::Unknown(other),
        }
    }

    pub fn to_word(self) -> u16 {
        match self {
            Self::Normal => 0xf000,
            Self::BriefDayChime => 0xe000,
            Self::Home => 0xd000,
            Self::Memory => 0xc000,
            Self::BriefDayZoneSelect => 0xb000,
            Self::ExcludeSelect => 0xa000,
            Self::UserProgram => 0x9000,
            Self::InstallerProgram => 0x8000,
            Self::Unknown(word) => word,
        }
    }
}

/// Panel models reported by an `S17` version reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelModel {
    D8x,
    D8xCel3G,
    D8xCel4G,
    D16x,
    D16xCel3G,
    D16xCel4G,
    D32x,
    /// A model byte outside the documented table.
    Unknown(u8),
}

impl PanelModel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::D8x,
            0x04 => Self::D8xCel3G,
            0x05 => Self::D8xCel4G,
            0x10 => Self::D16x,
            0x14 => Self::D16xCel3G,
            0x15 => Self::D16xCel4G,
            0x06 => Self::D32x,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::D8x => 0x00,
            Self::D8xCel3G => 0x04,
            Self::D8xCel4G => 0x05,
            Self::D16x => 0x10,
            Self::D16xCel3G => 0x14,
            Self::D16xCel4G => 0x15,
            Self::D32x => 0x06,
            Self::Unknown(value) => value,
        }
    }

    /// Whether this model exposes zones 17-32.
    pub fn has_expanded_zones(self) -> bool {
        matches!(self, Self::D32x)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::D8x => "D8X",
            Self::D8xCel3G => "D8XCEL-3G",
            Self::D8xCel4G => "D8XCEL-4G",
            Self::D16x => "D16X",
            Self::D16xCel3G => "D16XCEL-3G",
            Self::D16xCel4G => "D16XCEL-4G",
            Self::D32x => "D32X",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for PanelModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(value) => write!(f, "unknown ({value:#04x})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Model and firmware version from an `S17` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelVersion {
    pub model: PanelModel,
    pub major: u8,
    pub minor: u8,
}

impl PanelVersion {
    /// Firmware version string; the version byte's nibbles are decimal
    /// digits, so `0x87` is "8.7" and `0xa8` is "10.8".
    pub fn version(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

/// The decoded payload of a status-update reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPayload {
    /// FORM 4/5 zone bit-vectors. `zones` holds absolute 1-based ids.
    Zones {
        form: ZoneForm,
        /// 1 for zones 1-16 (request ids 0-12), 17 for zones 17-32
        /// (request ids 20-32).
        base: u8,
        zones: Vec<u8>,
    },
    /// Request id 13 (FORM 20).
    MiscAlarms(MiscAlarmFlags),
    /// Request id 14 (FORM 21).
    Arming(ArmingFlags),
    /// Request id 15 (FORM 22).
    Outputs(OutputFlags),
    /// Request id 16 (FORM 23).
    ViewState(ViewState),
    /// Request id 17.
    Version(PanelVersion),
    /// Request id 18 (FORM 24).
    AuxOutputs(AuxOutputFlags),
}

impl StatusPayload {
    /// The two-digit request id this payload answers.
    pub fn request_id(&self) -> u8 {
        match self {
            Self::Zones { form, base, .. } => form.index() + if *base == 17 { 20 } else { 0 },
            Self::MiscAlarms(_) => 13,
            Self::Arming(_) => 14,
            Self::Outputs(_) => 15,
            Self::ViewState(_) => 16,
            Self::Version(_) => 17,
            Self::AuxOutputs(_) => 18,
        }
    }
}

/// A synchronous reply to an `Sxx` status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub payload: StatusPayload,
    pub address: Option<u8>,
    pub timestamp: Option<NaiveDateTime>,
}

impl StatusUpdate {
    pub fn decode(packet: &Packet) -> Result<Self, PacketError> {
        let data = packet.data.as_str();
        if data.len() < 6 {
            return Err(PacketError::TruncatedPacket {
                line: data.to_string(),
            });
        }
        // The request id prints as two decimal digits, unlike the payload.
        let id: u8 = data[..2].parse().map_err(|_| PacketError::MalformedHeader {
            line: data.to_string(),
            span: data[..2].to_string(),
        })?;
        let bytes = take_hex_bytes::<2>(&data[2..])?;
        let word = u16::from_be_bytes(bytes);

        let payload = match id {
            0..=12 => StatusPayload::Zones {
                form: ZoneForm::from_index(id).expect("ids 0-12 are zone forms"),
                base: 1,
                zones: unpack_zone_word(word, 1),
            },
            13 => StatusPayload::MiscAlarms(MiscAlarmFlags::from_bits_retain(word)),
            14 => StatusPayload::Arming(ArmingFlags::from_bits_retain(word)),
            15 => StatusPayload::Outputs(OutputFlags::from_bits_retain(word)),
            16 => StatusPayload::ViewState(ViewState::from_word(word)),
            17 => StatusPayload::Version(PanelVersion {
                model: PanelModel::from_u8(bytes[0]),
                major: bytes[1] >> 4,
                minor: bytes[1] & 0x0f,
            }),
            18 => StatusPayload::AuxOutputs(AuxOutputFlags::from_bits_retain(word)),
            20..=32 => StatusPayload::Zones {
                form: ZoneForm::from_index(id - 20).expect("ids 20-32 are zone forms"),
                base: 17,
                zones: unpack_zone_word(word, 17),
            },
            _ => {
                return Err(PacketError::UnknownStatusId {
                    line: data.to_string(),
                    id,
                })
            }
        };

        Ok(Self {
            payload,
            address: packet.address,
            timestamp: packet.timestamp,
        })
    }

    pub fn encode(&self) -> Packet {
        let word = match &self.payload {
            StatusPayload::Zones { base, zones, .. } => pack_zone_word(zones, *base),
            StatusPayload::MiscAlarms(flags) => flags.bits(),
            StatusPayload::Arming(flags) => flags.bits(),
            StatusPayload::Outputs(flags) => flags.bits(),
            StatusPayload::ViewState(state) => state.to_word(),
            StatusPayload::Version(version) => {
                u16::from_be_bytes([version.model.to_u8(), version.major << 4 | version.minor])
            }
            StatusPayload::AuxOutputs(flags) => flags.bits(),
        };
        Packet {
            address: self.address,
            seq: 0,
            command: CommandType::UserInterface,
            data: format!("{:02}{:04X}", self.payload.request_id(), word),
            timestamp: self.timestamp,
            is_user_interface_req: false,
        }
    }
}

/// Decode a FORM 4/5 word into absolute zone ids.
///
/// The word is big-endian but the bit order within it is the panel's own:
/// zone `k` (1-16 relative to `base`) is present iff bit `(k-1) XOR 8` is
/// set, which puts zone 1 at 0x0100 and zone 9 at 0x0001.
fn unpack_zone_word(word: u16, base: u8) -> Vec<u8> {
    (0..16u8)
        .filter(|k| word & (1 << (k ^ 8)) != 0)
        .map(|k| base + k)
        .collect()
}

fn pack_zone_word(zones: &[u8], base: u8) -> u16 {
    zones
        .iter()
        .filter_map(|zone| zone.checked_sub(base))
        .filter(|k| *k < 16)
        .fold(0u16, |word, k| word | 1 << (k ^ 8))
}

/// Parse `N` hex pairs out of a data string.
fn take_hex_bytes<const N: usize>(data: &str) -> Result<[u8; N], PacketError> {
    if data.len() < N * 2 {
        return Err(PacketError::TruncatedPacket {
            line: data.to_string(),
        });
    }
    let mut bytes = [0u8; N];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let span = &data[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(span, 16).map_err(|_| PacketError::MalformedHeader {
            line: data.to_string(),
            span: span.to_string(),
        })?;
    }
    Ok(bytes)
}
