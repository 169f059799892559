//! Controller layer of an on-screen MIDI control surface: maps knobs,
//! buttons and faders to MIDI, keeps persisted configuration and control
//! state in sync between views, and drives layouts and dialogs.

pub mod configuration;
pub mod dialog;
pub mod extensions;
pub mod host;
pub mod layout;
pub mod midi;
pub mod render;
pub mod router;
pub mod surface;
pub mod sync;
