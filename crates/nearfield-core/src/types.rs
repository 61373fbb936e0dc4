use crate::{Result, error::Error};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Logical on/off state of the NFC adapter.
///
/// The adapter rests in `Off` or `On`; the `Turning*` states exist only
/// while a serialized enable or disable sequence is executing. Every
/// sequence that starts from a resting state ends in a resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    /// Controller is powered down.
    Off,

    /// An enable sequence is in flight.
    TurningOn,

    /// Controller is initialized and the polling loop is configured.
    On,

    /// A disable sequence is in flight.
    TurningOff,
}

impl AdapterState {
    /// Returns `true` for the two resting states.
    #[must_use]
    pub fn is_resting(self) -> bool {
        matches!(self, Self::Off | Self::On)
    }

    /// Returns `true` while the adapter is usable for tag traffic.
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Off => "off",
            Self::TurningOn => "turning on",
            Self::On => "on",
            Self::TurningOff => "turning off",
        };
        write!(f, "{s}")
    }
}

/// Screen/keyguard state as reported by the platform.
///
/// The variants are ordered: anything at or above [`ScreenState::OnUnlocked`]
/// permits full tag polling. The discriminants are stable codes usable in
/// logs and external reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScreenState {
    /// Screen off, keyguard engaged.
    OffLocked = 1,

    /// Screen off, keyguard not engaged.
    OffUnlocked = 2,

    /// Screen on, keyguard engaged.
    OnLocked = 3,

    /// Screen on and unlocked.
    OnUnlocked = 4,
}

impl ScreenState {
    /// Create a screen state from its stable code.
    ///
    /// # Errors
    /// Returns `Error::InvalidScreenState` for codes outside 1-4.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::OffLocked),
            2 => Ok(Self::OffUnlocked),
            3 => Ok(Self::OnLocked),
            4 => Ok(Self::OnUnlocked),
            _ => Err(Error::InvalidScreenState { code }),
        }
    }

    /// Stable code for this state.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether this state is at or above the full-polling threshold.
    #[must_use]
    pub fn allows_polling(self) -> bool {
        self >= Self::OnUnlocked
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OffLocked => "off-locked",
            Self::OffUnlocked => "off-unlocked",
            Self::OnLocked => "on-locked",
            Self::OnUnlocked => "on-unlocked",
        };
        write!(f, "{s}")
    }
}

/// Bitset of NFC polling technologies.
///
/// # Examples
///
/// ```
/// use nearfield_core::TechMask;
///
/// let mask = TechMask::NFC_A | TechMask::NFC_B;
/// assert!(mask.contains(TechMask::NFC_A));
/// assert!(!mask.contains(TechMask::NFC_V));
/// assert_eq!(mask.to_string(), "A|B");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TechMask(u32);

impl TechMask {
    /// NFC-A (ISO 14443-3A).
    pub const NFC_A: TechMask = TechMask(0x01);
    /// NFC-B (ISO 14443-3B).
    pub const NFC_B: TechMask = TechMask(0x02);
    /// NFC-F (FeliCa).
    pub const NFC_F: TechMask = TechMask(0x04);
    /// NFC-V (ISO 15693).
    pub const NFC_V: TechMask = TechMask(0x08);
    /// NFC-B' (proprietary ISO 14443-3B variant).
    pub const NFC_B_PRIME: TechMask = TechMask(0x10);
    /// Kovio one-shot barcode tags.
    pub const KOVIO: TechMask = TechMask(0x20);

    /// The empty mask.
    pub const NONE: TechMask = TechMask(0);

    /// Default technology set polled when the screen is unlocked.
    pub const DEFAULT_POLL: TechMask =
        TechMask(0x01 | 0x02 | 0x04 | 0x08 | 0x20);

    /// All defined technology bits.
    pub const ALL: TechMask = TechMask(0x3F);

    /// Create a mask from raw bits.
    ///
    /// # Errors
    /// Returns `Error::InvalidTechMask` if bits outside the defined set are
    /// present.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL.0 != 0 {
            return Err(Error::InvalidTechMask { mask: bits });
        }
        Ok(TechMask(bits))
    }

    /// Raw bit representation.
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub fn contains(self, other: TechMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no technology is selected.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Union of the two masks.
    #[must_use]
    pub fn union(self, other: TechMask) -> TechMask {
        TechMask(self.0 | other.0)
    }
}

impl BitOr for TechMask {
    type Output = TechMask;

    fn bitor(self, rhs: TechMask) -> TechMask {
        self.union(rhs)
    }
}

impl BitOrAssign for TechMask {
    fn bitor_assign(&mut self, rhs: TechMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TechMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names = [
            (Self::NFC_A, "A"),
            (Self::NFC_B, "B"),
            (Self::NFC_F, "F"),
            (Self::NFC_V, "V"),
            (Self::NFC_B_PRIME, "B'"),
            (Self::KOVIO, "Kovio"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for TechMask {
    type Err = Error;

    /// Parse a configuration technology name ("TypeA", "TypeB", "TypeF",
    /// "TypeV", "Kovio") into its single-bit mask.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TypeA" => Ok(Self::NFC_A),
            "TypeB" => Ok(Self::NFC_B),
            "TypeF" => Ok(Self::NFC_F),
            "TypeV" => Ok(Self::NFC_V),
            "Kovio" => Ok(Self::KOVIO),
            other => Err(Error::UnknownTechnology(other.to_string())),
        }
    }
}

/// Hardware-assigned handle identifying a discovered tag or peer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TagHandle(u32);

impl TagHandle {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        TagHandle(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TagHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tag UID as reported by the controller.
///
/// UIDs are 4 to 10 bytes depending on technology and cascade level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagUid(Vec<u8>);

impl TagUid {
    /// Create a UID with length validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUidLength` if the UID is empty or longer than
    /// ten bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() || bytes.len() > 10 {
            return Err(Error::InvalidUidLength { len: bytes.len() });
        }
        Ok(TagUid(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hex rendering, e.g. `04ABCDEF`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// An NDEF message payload.
///
/// The service treats the message as opaque bytes; record-level parsing
/// belongs to dispatch consumers. Equality is structural, which is what
/// debounce suppression needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefMessage(Bytes);

impl NdefMessage {
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        NdefMessage(payload.into())
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reader-mode registration flags.
///
/// A reader-mode caller takes exclusive control of polling: only the
/// requested technologies are polled and the default dispatch path is
/// bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderModeFlags {
    /// Technologies to poll for.
    pub techs: TechMask,

    /// Skip the NDEF probe on discovered tags.
    pub skip_ndef_check: bool,

    /// Suppress platform feedback cues on discovery.
    pub suppress_feedback: bool,
}

impl ReaderModeFlags {
    /// Flags polling the given technologies with default probe and
    /// feedback behavior.
    ///
    /// # Errors
    /// Returns `Error::EmptyReaderModeTechs` if `techs` is empty, since a
    /// reader-mode registration that polls nothing is a caller bug.
    pub fn polling(techs: TechMask) -> Result<Self> {
        if techs.is_empty() {
            return Err(Error::EmptyReaderModeTechs);
        }
        Ok(ReaderModeFlags {
            techs,
            skip_ndef_check: false,
            suppress_feedback: false,
        })
    }

    /// Same flags with the NDEF probe skipped.
    #[must_use]
    pub fn skip_ndef(mut self) -> Self {
        self.skip_ndef_check = true;
        self
    }

    /// Same flags with feedback cues suppressed.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.suppress_feedback = true;
        self
    }
}
