//! Lookahead scheduler.
//!
//! Combines keyframe placement ([`GopStructure`]) with B-frame reordering
//! ([`FrameReorderBuffer`]) and keeps the units whose encode order is final
//! until the pipeline pulls them.

use std::collections::VecDeque;

use tracing::debug;

use super::frame::Frame;
use super::gop::{GopPosition, GopStructure};
use super::reorder::{FrameReorderBuffer, ScheduledUnit};
use super::ResolvedConfig;
use crate::error::{FrameForgeError, Result};

/// Scheduler lifecycle.
///
/// ```text
/// Empty --push--> Accumulating --mini-GOP complete--> Ready --drained--> Empty
///   |                  |                                |
///   +------flush-------+-------------flush--------------+--> Draining --drained--> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing buffered.
    Empty,
    /// Frames buffered but none has a final encode position yet.
    Accumulating,
    /// At least one unit can be handed to the bitstream core.
    Ready,
    /// End of input signalled; remaining units are being released.
    Draining,
    /// End of input signalled and every unit released. Terminal.
    Closed,
}

pub struct GopScheduler {
    gop: GopStructure,
    reorder: FrameReorderBuffer,
    ready: VecDeque<ScheduledUnit>,
    lookahead_depth: u32,
    flushing: bool,
}

impl GopScheduler {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            gop: GopStructure::new(config.keyframe_interval, config.gop_size, config.b_frame_count),
            reorder: FrameReorderBuffer::new(config.b_frame_count),
            ready: VecDeque::with_capacity(config.lookahead_depth as usize + 1),
            lookahead_depth: config.lookahead_depth,
            flushing: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        match (self.flushing, self.ready.is_empty(), self.reorder.is_empty()) {
            (true, true, _) => SchedulerState::Closed,
            (true, false, _) => SchedulerState::Draining,
            (false, false, _) => SchedulerState::Ready,
            (false, true, false) => SchedulerState::Accumulating,
            (false, true, true) => SchedulerState::Empty,
        }
    }

    /// Whether new frames are still accepted.
    pub fn accepts_input(&self) -> bool {
        !self.flushing
    }

    /// Input index the next pushed frame must carry.
    pub fn next_input_index(&self) -> u64 {
        self.gop.total_frames()
    }

    /// Queue an ingested frame in input order.
    pub fn push(&mut self, frame: Frame) -> Result<GopPosition> {
        if self.flushing {
            return Err(FrameForgeError::EncoderClosed);
        }
        debug_assert_eq!(frame.input_index(), self.next_input_index());

        let position = self.gop.get_next_frame();
        debug!(
            "Scheduled input frame {}: type={:?}, gop_frame_num={}",
            position.frame_index, position.frame_type, position.gop_frame_num
        );

        let units = self.reorder.submit_frame(frame, position.frame_type);
        debug_assert!(self.reorder.len() <= self.lookahead_depth as usize);
        self.ready.extend(units);
        Ok(position)
    }

    /// Force the next pushed frame to be a keyframe.
    pub fn request_keyframe(&mut self) {
        if !self.flushing {
            self.gop.request_key();
        }
    }

    /// Signal end of input. Idempotent.
    pub fn flush(&mut self) {
        if self.flushing {
            return;
        }
        self.flushing = true;
        let units = self.reorder.flush();
        debug!("Scheduler flush released {} units", units.len());
        self.ready.extend(units);
    }

    /// Take the next unit in encode order.
    pub fn next_unit(&mut self) -> Option<ScheduledUnit> {
        self.ready.pop_front()
    }

    /// Drop everything still buffered and stop accepting input.
    pub fn close(&mut self) -> usize {
        self.flushing = true;
        let dropped = self.buffered();
        self.ready.clear();
        self.reorder.clear();
        dropped
    }

    /// Frames held by the scheduler, finalized or not.
    pub fn buffered(&self) -> usize {
        self.ready.len() + self.reorder.len()
    }
}
