//! Transient status line. Shows only the latest of a burst of changes and
//! hides itself after a while.

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::configuration::StatusTimings;
use crate::render::{SharedRenderer, StatusLine};

/// Timer events carry the generation they were armed for; anything older
/// than the current generation is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusTimer {
    Show(u64),
    Hide(u64),
}

pub struct StatusDisplay {
    renderer: SharedRenderer,
    timings: StatusTimings,
    generation: u64,
    pending: Option<StatusLine>,
    timer: Option<JoinHandle<()>>,
}

impl StatusDisplay {
    pub fn new(renderer: SharedRenderer, timings: StatusTimings) -> StatusDisplay {
        StatusDisplay {
            renderer,
            timings,
            generation: 0,
            pending: None,
            timer: None,
        }
    }

    /// Queues `line` behind the debounce delay. The caller schedules the
    /// returned timer and hands its handle to [`StatusDisplay::arm`].
    pub fn show(&mut self, line: StatusLine) -> (Duration, StatusTimer) {
        self.restart();
        self.pending = Some(line);
        (self.timings.debounce(), StatusTimer::Show(self.generation))
    }

    /// Errors skip the debounce.
    pub fn show_error(&mut self, text: impl Into<String>) -> (Duration, StatusTimer) {
        self.restart();
        self.pending = None;
        self.renderer.show_status(&StatusLine::error(text));
        (self.timings.hide_after(), StatusTimer::Hide(self.generation))
    }

    pub fn arm(&mut self, timer: JoinHandle<()>) {
        if let Some(previous) = self.timer.replace(timer) {
            previous.abort();
        }
    }

    pub fn on_timer(&mut self, timer: StatusTimer) -> Option<(Duration, StatusTimer)> {
        match timer {
            StatusTimer::Show(generation) if generation == self.generation => {
                let line = self.pending.take()?;
                self.renderer.show_status(&line);
                Some((self.timings.hide_after(), StatusTimer::Hide(generation)))
            }
            StatusTimer::Hide(generation) if generation == self.generation => {
                self.timer = None;
                self.renderer.hide_status();
                None
            }
            stale => {
                tracing::trace!("Ignoring stale status timer {stale:?}");
                None
            }
        }
    }

    fn restart(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
