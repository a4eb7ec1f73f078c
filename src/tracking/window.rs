//! Sliding-window target streaming policy.
//!
//! A long target list is streamed through a fixed ring of `window` slots. Slot `s` is
//! bound to instruction row `base_row + s`, and the routine loops over the slots, so
//! target `i` lives in slot `i % window` and is executed at unwrapped position `i`.
//!
//! Pointer rows only cover one lap of the ring. Each pointer kind is unwrapped into a
//! monotonically increasing position by counting a lap whenever its row jumps
//! backwards.
//!
//! Two triggers drive the ring:
//! - **Retire**: once the program pointer is `retire_margin` positions past target `i`,
//!   the planner has consumed it and its slot value is no longer needed.
//! - **Feed**: once the motion pointer is `feed_margin` positions past a retired target
//!   `i`, the robot has physically passed it and the slot takes target `i + window`.
//!
//! The policy is pure: it only turns pointer observations into [`StreamAction`]s.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::controller::transport::PointerKind;
use crate::error::{AppResult, ToroError};

/// Ring size and trigger margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Number of slots in the ring.
    pub window: usize,
    /// Motion-pointer lead required before a retired slot is refilled.
    pub feed_margin: usize,
    /// Program-pointer lead required before a slot is retired.
    pub retire_margin: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window: 8,
            feed_margin: 2,
            retire_margin: 1,
        }
    }
}

impl WindowConfig {
    /// Checks `window > 0` and `retire_margin <= feed_margin < window`.
    pub fn validate(&self) -> AppResult<()> {
        if self.window == 0 {
            return Err(ToroError::Configuration(
                "streaming window must have at least one slot".to_string(),
            ));
        }
        if self.feed_margin >= self.window {
            return Err(ToroError::Configuration(format!(
                "feed_margin ({}) must be smaller than the window ({})",
                self.feed_margin, self.window
            )));
        }
        if self.retire_margin > self.feed_margin {
            return Err(ToroError::Configuration(format!(
                "retire_margin ({}) must not exceed feed_margin ({})",
                self.retire_margin, self.feed_margin
            )));
        }
        Ok(())
    }
}

/// What the caller should do to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamAction {
    /// Write target `target` into slot `slot`.
    Feed {
        /// Ring slot.
        slot: usize,
        /// Index into the caller's target list.
        target: usize,
    },
    /// Target `target` in slot `slot` has been consumed.
    Retire {
        /// Ring slot.
        slot: usize,
        /// Index into the caller's target list.
        target: usize,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct Unwrapper {
    last_offset: Option<usize>,
    laps: usize,
}

impl Unwrapper {
    fn position(&mut self, offset: usize, window: usize) -> usize {
        if matches!(self.last_offset, Some(last) if offset < last) {
            self.laps += 1;
        }
        self.last_offset = Some(offset);
        self.laps * window + offset
    }
}

/// Streaming state for one target list.
#[derive(Debug, Clone)]
pub struct StreamingWindow {
    config: WindowConfig,
    base_row: usize,
    total: usize,
    next_feed: usize,
    retired: usize,
    program: Unwrapper,
    motion: Unwrapper,
}

impl StreamingWindow {
    /// Window over `total` targets whose first slot is at `base_row`.
    pub fn new(config: WindowConfig, base_row: usize, total: usize) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            base_row,
            total,
            next_feed: 0,
            retired: 0,
            program: Unwrapper::default(),
            motion: Unwrapper::default(),
        })
    }

    /// Initial loads filling the ring.
    pub fn prime(&mut self) -> Vec<StreamAction> {
        let mut actions = Vec::new();
        while self.next_feed < self.total.min(self.config.window) {
            actions.push(self.feed());
        }
        actions
    }

    fn feed(&mut self) -> StreamAction {
        let target = self.next_feed;
        self.next_feed += 1;
        StreamAction::Feed {
            slot: target % self.config.window,
            target,
        }
    }

    /// Applies one pointer observation.
    ///
    /// Rows outside the ring are ignored.
    pub fn observe(&mut self, kind: PointerKind, row: usize) -> Vec<StreamAction> {
        let window = self.config.window;
        let Some(offset) = row.checked_sub(self.base_row).filter(|o| *o < window) else {
            trace!(row, "Pointer outside streaming window");
            return Vec::new();
        };
        let mut actions = Vec::new();
        match kind {
            PointerKind::Program => {
                let position = self.program.position(offset, window);
                while self.retired < self.next_feed
                    && position >= self.retired + self.config.retire_margin
                {
                    let target = self.retired;
                    self.retired += 1;
                    actions.push(StreamAction::Retire {
                        slot: target % window,
                        target,
                    });
                }
            }
            PointerKind::Motion => {
                let position = self.motion.position(offset, window);
                // The slot for `next_feed` was last held by `next_feed - window`.
                while self.next_feed < self.total
                    && self.next_feed >= window
                    && self.next_feed - window < self.retired
                    && position >= self.next_feed - window + self.config.feed_margin
                {
                    actions.push(self.feed());
                }
            }
        }
        actions
    }

    /// Targets handed out so far.
    pub fn fed(&self) -> usize {
        self.next_feed
    }

    /// Targets retired so far.
    pub fn retired(&self) -> usize {
        self.retired
    }

    /// Whether every target has been fed and retired.
    pub fn is_complete(&self) -> bool {
        self.retired == self.total
    }
}
