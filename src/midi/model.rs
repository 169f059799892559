use crate::extensions::option::OptionExt;

use serde::{Deserialize, Serialize};

const U8_MSB_EXTRACTOR: u8 = 0x80;
const KIND_EXTRACTOR: u8 = 0xF0;
const CHANNEL_EXTRACTOR: u8 = 0x0F;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    NoteOff,
    NoteOn,
    ControlChange,
    Other(u8),
}

/// MIDI channel, 0-based (`Channel(0)` is what users call "channel 1").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    pub const FIRST: Channel = Channel(0);
    pub const MAX: u8 = 0x0F;

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(channel: u8) -> Option<Channel> {
        Option::when(channel <= Self::MAX, || Channel(channel))
    }

    /// Channel numbered the way users see it, 1..=16.
    pub fn from_one_based(channel: u8) -> Option<Channel> {
        channel.checked_sub(1).and_then(Channel::from_u8)
    }
}

/// Rejected raw byte when reading a [`Status`] or [`DataByte`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ByteRangeError {
    #[error("Expecting status to be between 0x80 and 0xFF. Got: {0}.")]
    Status(u8),
    #[error("Expecting data byte to be between 0x00 and 0x7F. Got: {0}.")]
    DataByte(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Status(u8);

impl Status {
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(status: u8) -> Option<Status> {
        Option::when(status & U8_MSB_EXTRACTOR == U8_MSB_EXTRACTOR, || {
            Status(status)
        })
    }

    pub fn note_on(channel: Channel) -> Status {
        Status(NOTE_ON | channel.as_u8())
    }

    pub fn note_off(channel: Channel) -> Status {
        Status(NOTE_OFF | channel.as_u8())
    }

    pub fn control_change(channel: Channel) -> Status {
        Status(CONTROL_CHANGE | channel.as_u8())
    }

    pub fn kind(&self) -> StatusKind {
        match self.0 & KIND_EXTRACTOR {
            NOTE_OFF => StatusKind::NoteOff,
            NOTE_ON => StatusKind::NoteOn,
            CONTROL_CHANGE => StatusKind::ControlChange,
            other => StatusKind::Other(other),
        }
    }

    /// Only meaningful for channel voice messages, which is all this crate produces.
    pub fn channel(&self) -> Channel {
        Channel(self.0 & CHANNEL_EXTRACTOR)
    }
}

impl TryFrom<u8> for Status {
    type Error = ByteRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Status::from_u8(value).ok_or(ByteRangeError::Status(value))
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(transparent)]
pub struct DataByte(u8);

impl DataByte {
    pub const MIN: DataByte = DataByte(0);
    pub const MAX: DataByte = DataByte(0x7F);

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(db: u8) -> Option<DataByte> {
        Option::when(db & U8_MSB_EXTRACTOR == 0, || DataByte(db))
    }

    /// `floor(127 * v)` with `v` clamped to [0, 1]. NaN maps to 0.
    pub fn from_unit(v: f64) -> DataByte {
        let scaled = (127.0 * v.clamp(0.0, 1.0)).floor();
        // `as` saturates and sends NaN to 0
        DataByte(scaled as u8)
    }
}

impl TryFrom<u8> for DataByte {
    type Error = ByteRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DataByte::from_u8(value).ok_or(ByteRangeError::DataByte(value))
    }
}

impl From<DataByte> for u8 {
    fn from(db: DataByte) -> Self {
        db.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiMessage {
    pub status: Status,
    pub fst_data_byte: DataByte,
    pub snd_data_byte: DataByte,
}

impl From<MidiMessage> for [u8; 3] {
    fn from(msg: MidiMessage) -> Self {
        [
            msg.status.as_u8(),
            msg.fst_data_byte.as_u8(),
            msg.snd_data_byte.as_u8(),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Sending MIDI message failed. Reason: {0}")]
pub struct MidiSendFailed(#[source] pub anyhow::Error);

pub trait MidiSender {
    fn send(&self, msg: MidiMessage) -> Result<(), MidiSendFailed>;

    fn send_and_forget(&self, msg: MidiMessage) {
        if let Err(e) = self.send(msg) {
            tracing::warn!("Dropping MIDI message {msg:?}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_carries_kind_and_channel() {
        let ch = Channel::from_one_based(3).unwrap();
        let status = Status::note_on(ch);
        assert_eq!(status.as_u8(), 0x92);
        assert_eq!(status.kind(), StatusKind::NoteOn);
        assert_eq!(status.channel(), ch);
        assert_eq!(Status::note_off(ch).as_u8(), 0x82);
        assert_eq!(Status::control_change(ch).kind(), StatusKind::ControlChange);
    }

    #[test]
    fn ranges_are_enforced() {
        assert!(Status::from_u8(0x7F).is_none());
        assert!(DataByte::from_u8(0x80).is_none());
        assert!(Channel::from_u8(16).is_none());
        assert!(Channel::from_one_based(0).is_none());
        assert_eq!(Channel::from_one_based(16).map(|c| c.as_u8()), Some(15));
    }

    #[test]
    fn unit_values_scale_down() {
        assert_eq!(DataByte::from_unit(0.5).as_u8(), 63);
        assert_eq!(DataByte::from_unit(1.0).as_u8(), 127);
        assert_eq!(DataByte::from_unit(7.0).as_u8(), 127);
        assert_eq!(DataByte::from_unit(-1.0).as_u8(), 0);
        assert_eq!(DataByte::from_unit(f64::NAN).as_u8(), 0);
    }

    #[test]
    fn deserializing_rejects_out_of_range() {
        assert!(serde_json::from_str::<DataByte>("128").is_err());
        assert!(serde_json::from_str::<Status>("16").is_err());
        assert!(serde_json::from_str::<DataByte>("-1").is_err());
        assert_eq!(serde_json::from_str::<Status>("176").unwrap().as_u8(), 0xB0);
        assert_eq!(Status::try_from(0x10), Err(ByteRangeError::Status(0x10)));
        assert_eq!(serde_json::to_string(&DataByte::MAX).unwrap(), "127");
    }
}
