use std::sync::Mutex;

use crate::midi::model::{MidiMessage, MidiSendFailed, MidiSender};

/// Logs every message instead of sending it anywhere.
pub struct JustPrint;

impl MidiSender for JustPrint {
    fn send(&self, msg: MidiMessage) -> Result<(), MidiSendFailed> {
        let bytes: [u8; 3] = msg.into();
        tracing::info!("MIDI out: {:02X} {:02X} {:02X}", bytes[0], bytes[1], bytes[2]);
        Ok(())
    }
}

/// Keeps everything it was asked to send.
#[derive(Default)]
pub struct Recording {
    sent: Mutex<Vec<MidiMessage>>,
}

impl Recording {
    pub fn sent(&self) -> Vec<MidiMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl MidiSender for Recording {
    fn send(&self, msg: MidiMessage) -> Result<(), MidiSendFailed> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(msg);
        }
        Ok(())
    }
}
