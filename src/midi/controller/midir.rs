use crossbeam_channel as cch;
use std::thread;
use std::thread::JoinHandle;

use crate::midi::model::{MidiMessage, MidiSendFailed, MidiSender};

/// Sends to a hardware or virtual MIDI output port. Writes happen on a
/// dedicated thread so callers never block on the port.
pub struct MidirBased {
    sender: cch::Sender<MidiMessage>,
    _sending_loop: JoinHandle<()>,
}

impl MidirBased {
    pub fn new(port: &str) -> anyhow::Result<MidirBased> {
        let mut midi_out = Self::prepare_midi_out_connection(port)?;
        let (sender, receiver) = cch::unbounded();
        let _sending_loop = thread::spawn(move || {
            while let Ok(midi_msg) = receiver.recv() {
                let bytes: [u8; 3] = midi_msg.into();
                if let Err(e) = midi_out.send(bytes.as_slice()) {
                    tracing::warn!("MIDI port write failed: {e}");
                }
            }
        });

        Ok(MidirBased {
            sender,
            _sending_loop,
        })
    }

    fn prepare_midi_out_connection(port: &str) -> anyhow::Result<midir::MidiOutputConnection> {
        let midi_out = midir::MidiOutput::new(&format!("{port}-surface"))?;
        let found = midi_out.ports().into_iter().find(|p| {
            midi_out
                .port_name(p)
                .map(|name| name.contains(port))
                .unwrap_or(false)
        });
        let Some(found) = found else {
            anyhow::bail!("No MIDI output port matching `{port}`.");
        };
        tracing::info!("Connecting to MIDI output `{port}`");
        midi_out
            .connect(&found, port)
            .map_err(|e| anyhow::anyhow!("Couldn't connect to {port}: {e}"))
    }
}

impl MidiSender for MidirBased {
    fn send(&self, msg: MidiMessage) -> Result<(), MidiSendFailed> {
        self.sender.send(msg).map_err(|e| MidiSendFailed(e.into()))
    }
}
