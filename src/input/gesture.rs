use crate::messages::{Gesture, TouchEvent};
use std::time::Duration;
use tokio::time::Instant;

/// Resolves touch releases into single and double taps with one pending slot.
///
/// The first release arms a deadline one window away. A second release before the
/// deadline fires `DoubleTap` at once and disarms the slot; otherwise the slot
/// fires `SingleTap` on the first `poll_expired` at or past the deadline.
pub struct GestureRecognizer {
    window: Duration,
    pending: Option<Instant>,
    touch_down: Option<Instant>,
}

impl GestureRecognizer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            touch_down: None,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Feed one touch record; a release can resolve a gesture immediately
    pub fn on_event(&mut self, event: TouchEvent) -> Option<Gesture> {
        match event {
            TouchEvent::Press(at) => {
                // Recorded only; hold duration never gates a gesture.
                self.touch_down = Some(at);
                None
            }
            TouchEvent::Release(at) => {
                if let Some(down) = self.touch_down.take() {
                    tracing::debug!("Tap held for {:?}", at.saturating_duration_since(down));
                }
                self.on_release(at)
            }
        }
    }

    fn on_release(&mut self, at: Instant) -> Option<Gesture> {
        match self.pending.take() {
            Some(deadline) if at <= deadline => Some(Gesture::DoubleTap),
            // The window ran out before this release was seen: the old tap
            // stands alone and this release opens a new window.
            Some(_) => {
                self.pending = Some(at + self.window);
                Some(Gesture::SingleTap)
            }
            None => {
                self.pending = Some(at + self.window);
                None
            }
        }
    }

    /// Fire the pending single tap once its window has elapsed
    pub fn poll_expired(&mut self, now: Instant) -> Option<Gesture> {
        match self.pending {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                Some(Gesture::SingleTap)
            }
            _ => None,
        }
    }

    /// Drop any pending tap and half-finished touch
    pub fn disarm(&mut self) {
        self.pending = None;
        self.touch_down = None;
    }
}
