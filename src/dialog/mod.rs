//! Modal overlays. Every dialog runs the same state machine; the variants
//! differ only in their content, buttons and what accepting produces.

use std::time::Duration;

use crate::configuration::DialogTimings;
use crate::host::{NetworkDetails, SharedHost};
use crate::layout::LayoutId;
use crate::midi::control::ControlId;
use crate::midi::mapping::{MappingEdit, StatusType};
use crate::render::{SharedRenderer, Transition};

pub mod editor;

use editor::{EditorError, MappingEditor};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogState {
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutPicker {
    pub layouts: Vec<LayoutId>,
    pub opened_with: LayoutId,
    pub selected: LayoutId,
}

impl LayoutPicker {
    pub fn new(layouts: Vec<LayoutId>, current: LayoutId) -> LayoutPicker {
        LayoutPicker {
            layouts,
            opened_with: current.clone(),
            selected: current,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogContent {
    About {
        version: String,
        homepage: Option<String>,
    },
    Network(NetworkDetails),
    MidiMapping(MappingEditor),
    LayoutPicker(LayoutPicker),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptBehavior {
    /// Informational; accepting just closes.
    DismissOnly,
    Commit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Buttons {
    pub ok: bool,
    pub cancel: bool,
}

impl DialogContent {
    pub fn title(&self) -> &'static str {
        match self {
            DialogContent::About { .. } => "About",
            DialogContent::Network(_) => "Network",
            DialogContent::MidiMapping(_) => "MIDI",
            DialogContent::LayoutPicker(_) => "Layout",
        }
    }

    pub fn accept_behavior(&self) -> AcceptBehavior {
        match self {
            DialogContent::About { .. } | DialogContent::Network(_) => AcceptBehavior::DismissOnly,
            DialogContent::MidiMapping(_) | DialogContent::LayoutPicker(_) => {
                AcceptBehavior::Commit
            }
        }
    }

    pub fn buttons(&self) -> Buttons {
        match self {
            DialogContent::About { .. } | DialogContent::Network(_) => Buttons {
                ok: true,
                cancel: false,
            },
            DialogContent::MidiMapping(_) => Buttons {
                ok: true,
                cancel: true,
            },
            // Picking an entry is the accept action.
            DialogContent::LayoutPicker(_) => Buttons {
                ok: false,
                cancel: true,
            },
        }
    }

    fn outcome(&self) -> Option<DialogOutcome> {
        match self {
            DialogContent::MidiMapping(editor) => Some(DialogOutcome::Mapping(editor.edits())),
            DialogContent::LayoutPicker(picker) if picker.selected != picker.opened_with => {
                Some(DialogOutcome::Layout(picker.selected.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogInput {
    Ok,
    Cancel,
    ClickOutside,
    Key {
        key: Key,
        /// A focused sub-control already handled the key.
        intercepted: bool,
    },
    SelectLayout(LayoutId),
    EditMapping {
        id: ControlId,
        status_type: StatusType,
        channel: u8,
        index: u8,
    },
}

/// What an accepted dialog asks to commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogOutcome {
    Mapping(Vec<MappingEdit>),
    Layout(LayoutId),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DialogError {
    #[error("Dialog is {0:?}, cannot {1}.")]
    InvalidState(DialogState, &'static str),
    #[error("Another dialog is already showing.")]
    Busy,
    #[error("No dialog is showing.")]
    NoDialog,
    #[error("{0} dialog does not take that input.")]
    NotApplicable(&'static str),
    #[error(transparent)]
    Editor(#[from] EditorError),
}

pub struct Dialog {
    content: DialogContent,
    state: DialogState,
    accepted: bool,
    settled: bool,
}

impl Dialog {
    pub fn new(content: DialogContent) -> Dialog {
        Dialog {
            content,
            state: DialogState::Closed,
            accepted: false,
            settled: false,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn content(&self) -> &DialogContent {
        &self.content
    }

    fn require(&self, state: DialogState, action: &'static str) -> Result<(), DialogError> {
        if self.state == state {
            Ok(())
        } else {
            Err(DialogError::InvalidState(self.state, action))
        }
    }

    pub fn show(&mut self) -> Result<(), DialogError> {
        self.require(DialogState::Closed, "show")?;
        self.state = DialogState::Opening;
        Ok(())
    }

    pub fn opened(&mut self) -> Result<(), DialogError> {
        self.require(DialogState::Opening, "finish opening")?;
        self.state = DialogState::Open;
        Ok(())
    }

    pub fn hide(&mut self, accepted: bool) -> Result<(), DialogError> {
        self.require(DialogState::Open, "hide")?;
        self.accepted = accepted;
        self.state = DialogState::Closing;
        Ok(())
    }

    /// Completes the exit transition. The outcome is produced at most once
    /// per dialog, and only when it was accepted and commits something.
    pub fn closed(&mut self) -> Result<Option<DialogOutcome>, DialogError> {
        self.require(DialogState::Closing, "finish closing")?;
        self.state = DialogState::Closed;
        if self.settled || !self.accepted {
            return Ok(None);
        }
        self.settled = true;
        Ok(match self.content.accept_behavior() {
            AcceptBehavior::Commit => self.content.outcome(),
            AcceptBehavior::DismissOnly => None,
        })
    }
}

/// Transition to schedule; report back with `serial` once `after` has elapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    pub after: Duration,
    pub serial: u64,
}

/// Hosts at most one dialog and drives its transitions.
pub struct DialogController {
    renderer: SharedRenderer,
    host: SharedHost,
    timings: DialogTimings,
    current: Option<Dialog>,
    serial: u64,
}

impl DialogController {
    pub fn new(renderer: SharedRenderer, host: SharedHost, timings: DialogTimings) -> DialogController {
        DialogController {
            renderer,
            host,
            timings,
            current: None,
            serial: 0,
        }
    }

    pub fn current(&self) -> Option<&Dialog> {
        self.current.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn open(&mut self, content: DialogContent) -> Result<TransitionRequest, DialogError> {
        if self.current.is_some() {
            return Err(DialogError::Busy);
        }
        let mut dialog = Dialog::new(content);
        dialog.show()?;
        tracing::debug!("Opening {} dialog", dialog.content().title());

        self.renderer.mount_dialog(dialog.content());
        self.renderer
            .begin_transition(Transition::Enter, self.timings.enter());
        self.current = Some(dialog);
        Ok(self.next_transition(self.timings.enter()))
    }

    pub fn input(&mut self, input: DialogInput) -> Result<Option<TransitionRequest>, DialogError> {
        let dialog = self.current.as_mut().ok_or(DialogError::NoDialog)?;
        if dialog.state() != DialogState::Open {
            return Err(DialogError::InvalidState(dialog.state(), "take input"));
        }
        let title = dialog.content().title();

        let accepted = match input {
            DialogInput::Ok if dialog.content().buttons().ok => true,
            DialogInput::Ok => return Err(DialogError::NotApplicable(title)),
            DialogInput::Cancel | DialogInput::ClickOutside => false,
            DialogInput::Key {
                intercepted: true, ..
            } => return Ok(None),
            DialogInput::Key { .. } => false,
            DialogInput::SelectLayout(layout) => match &mut dialog.content {
                DialogContent::LayoutPicker(picker) => {
                    picker.selected = layout;
                    true
                }
                _ => return Err(DialogError::NotApplicable(title)),
            },
            DialogInput::EditMapping {
                id,
                status_type,
                channel,
                index,
            } => match &mut dialog.content {
                DialogContent::MidiMapping(editor) => {
                    editor.edit(&id, status_type, channel, index)?;
                    return Ok(None);
                }
                _ => return Err(DialogError::NotApplicable(title)),
            },
        };

        dialog.hide(accepted)?;
        self.host.set_keyboard_focus(false);
        self.renderer
            .begin_transition(Transition::Exit, self.timings.exit());
        Ok(Some(self.next_transition(self.timings.exit())))
    }

    /// Called when the transition numbered `serial` has run its course.
    /// Returns what to commit when a dialog closes accepted.
    pub fn transition_ended(&mut self, serial: u64) -> Result<Option<DialogOutcome>, DialogError> {
        if serial != self.serial {
            tracing::trace!("Ignoring stale dialog transition {serial}");
            return Ok(None);
        }
        let dialog = self.current.as_mut().ok_or(DialogError::NoDialog)?;
        match dialog.state() {
            DialogState::Opening => {
                dialog.opened()?;
                self.host.set_keyboard_focus(true);
                Ok(None)
            }
            DialogState::Closing => {
                let outcome = dialog.closed()?;
                self.renderer.unmount_dialog();
                self.current = None;
                Ok(outcome)
            }
            state => Err(DialogError::InvalidState(state, "end a transition")),
        }
    }

    fn next_transition(&mut self, after: Duration) -> TransitionRequest {
        self.serial += 1;
        TransitionRequest {
            after,
            serial: self.serial,
        }
    }
}
