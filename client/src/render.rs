//! Render collaborator interface

use log::debug;
use shared::{ConnectionId, RenderTransform};
use std::collections::HashMap;

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    /// Our own entity, from prediction.
    pub local: Option<RenderTransform>,
    /// Every other entity, from interpolation.
    pub remotes: HashMap<ConnectionId, RenderTransform>,
}

impl RenderFrame {
    pub fn entity_count(&self) -> usize {
        self.remotes.len() + usize::from(self.local.is_some())
    }
}

pub trait RenderSink {
    fn render(&mut self, frame: &RenderFrame);
}

/// Headless renderer that logs a frame summary every `every` frames.
#[derive(Debug)]
pub struct LogRenderer {
    every: u64,
    frames: u64,
}

impl LogRenderer {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new(60)
    }
}

impl RenderSink for LogRenderer {
    fn render(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        if self.frames % self.every != 0 {
            return;
        }

        match frame.local {
            Some(local) => debug!(
                "Frame {}: self at ({:.2}, {:.2}, {:.2}), {} remote entities",
                self.frames,
                local.position.x,
                local.position.y,
                local.position.z,
                frame.remotes.len()
            ),
            None => debug!(
                "Frame {}: not joined, {} remote entities",
                self.frames,
                frame.remotes.len()
            ),
        }
    }
}
