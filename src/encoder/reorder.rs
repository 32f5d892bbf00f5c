//! Frame reordering buffer for B-frame support.
//!
//! Frames arrive in input (display) order but B-frames must be encoded after
//! the anchor that follows them, because they reference both sides.
//!
//! For example, with 1 B-frame between anchors:
//! - Input order:  K(0), B(1), P(2), B(3), P(4), ...
//! - Encode order: K(0), P(2), B(1), P(4), B(3), ...
//!
//! Reordering never crosses a keyframe: B-frames waiting when a keyframe
//! arrives are released ahead of it, referencing only the past.

use super::frame::Frame;
use super::gop::GopFrameType;

/// A frame waiting for its mini-GOP to complete.
struct BufferedFrame {
    frame: Frame,
    frame_type: GopFrameType,
}

/// A frame with its final encode position, ready for the bitstream core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUnit {
    /// The source picture.
    pub frame: Frame,
    /// Picture type.
    pub frame_type: GopFrameType,
    /// Position in encode order; equals the output frame number.
    pub encode_order: u64,
    /// Input index of the past reference, if any.
    pub forward_ref: Option<u64>,
    /// Input index of the future reference (B-frames only).
    pub backward_ref: Option<u64>,
}

impl ScheduledUnit {
    /// Input sequence number of the source frame.
    pub fn input_index(&self) -> u64 {
        self.frame.input_index()
    }

    /// Whether this unit is a keyframe.
    pub fn is_key(&self) -> bool {
        self.frame_type.is_key()
    }
}

/// Frame reorder buffer for B-frame encoding.
pub struct FrameReorderBuffer {
    /// Number of consecutive B-frames between anchor frames.
    b_frame_count: u32,
    /// Buffer holding frames waiting to be encoded.
    buffer: Vec<BufferedFrame>,
    /// Next encode order to assign.
    next_encode_order: u64,
    /// Input index of the last anchor frame (Key or P).
    last_anchor: Option<u64>,
    /// Whether we're flushing (no more input frames).
    flushing: bool,
}

impl FrameReorderBuffer {
    /// Create a new frame reorder buffer.
    pub fn new(b_frame_count: u32) -> Self {
        Self {
            b_frame_count,
            buffer: Vec::with_capacity((b_frame_count + 2) as usize),
            next_encode_order: 0,
            last_anchor: None,
            flushing: false,
        }
    }

    /// Submit a frame in input order.
    ///
    /// Returns the units whose encode order became final (may be 0 or more).
    pub fn submit_frame(&mut self, frame: Frame, frame_type: GopFrameType) -> Vec<ScheduledUnit> {
        self.buffer.push(BufferedFrame { frame, frame_type });
        self.get_frames_to_encode()
    }

    /// Release every buffered frame. Trailing B-frames with no anchor after
    /// them get their last frame promoted to an anchor.
    pub fn flush(&mut self) -> Vec<ScheduledUnit> {
        self.flushing = true;
        self.get_frames_to_encode()
    }

    fn get_frames_to_encode(&mut self) -> Vec<ScheduledUnit> {
        let mut result = Vec::new();

        if self.b_frame_count == 0 {
            let frames: Vec<BufferedFrame> = self.buffer.drain(..).collect();
            for buffered in frames {
                let unit = self.emit_anchor(buffered);
                result.push(unit);
            }
            return result;
        }

        loop {
            let anchor_pos = self
                .buffer
                .iter()
                .position(|f| f.frame_type.is_reference());

            match anchor_pos {
                Some(0) => {
                    let anchor = self.buffer.remove(0);
                    let unit = self.emit_anchor(anchor);
                    result.push(unit);
                }
                Some(pos) if self.buffer[pos].frame_type.is_key() => {
                    // B-frames ahead of a keyframe go out first, past reference only.
                    let forward_ref = self.last_anchor;
                    for b_frame in self.buffer.drain(..pos).collect::<Vec<_>>() {
                        let unit = self.emit(b_frame, forward_ref, None);
                        result.push(unit);
                    }
                }
                Some(pos) => {
                    // The anchor is encoded before the B-frames that precede it.
                    let anchor = self.buffer.remove(pos);
                    let forward_ref = self.last_anchor;
                    let backward_ref = Some(anchor.frame.input_index());
                    let unit = self.emit_anchor(anchor);
                    result.push(unit);

                    for b_frame in self.buffer.drain(..pos).collect::<Vec<_>>() {
                        let unit = self.emit(b_frame, forward_ref, backward_ref);
                        result.push(unit);
                    }
                }
                None if self.flushing && !self.buffer.is_empty() => {
                    if let Some(last) = self.buffer.last_mut() {
                        last.frame_type = GopFrameType::P;
                    }
                }
                _ => break, // No complete group ready
            }
        }

        result
    }

    fn emit_anchor(&mut self, anchor: BufferedFrame) -> ScheduledUnit {
        let forward_ref = match anchor.frame_type {
            GopFrameType::Key => None,
            _ => self.last_anchor,
        };
        let input_index = anchor.frame.input_index();
        let is_reference = anchor.frame_type.is_reference();
        let unit = self.emit(anchor, forward_ref, None);
        if is_reference {
            self.last_anchor = Some(input_index);
        }
        unit
    }

    fn emit(
        &mut self,
        buffered: BufferedFrame,
        forward_ref: Option<u64>,
        backward_ref: Option<u64>,
    ) -> ScheduledUnit {
        let encode_order = self.next_encode_order;
        self.next_encode_order += 1;
        ScheduledUnit {
            frame: buffered.frame,
            frame_type: buffered.frame_type,
            encode_order,
            forward_ref,
            backward_ref,
        }
    }

    /// Discard every buffered frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Check if buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get number of buffered frames.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::encoder::frame::{ingest, RawFrame};
    use crate::encoder::EncodeConfig;

    pub(crate) fn test_frame(index: u64) -> Frame {
        let config = EncodeConfig::default().normalize(2, 2).unwrap();
        let y = [index as u8; 4];
        let uv = [128u8; 1];
        ingest(&RawFrame::from_u8(&y, &uv, &uv, 2, 1), &config, index).unwrap()
    }

    fn order(units: &[ScheduledUnit]) -> Vec<(u64, u64)> {
        units
            .iter()
            .map(|u| (u.input_index(), u.encode_order))
            .collect()
    }

    #[test]
    fn test_no_b_frames() {
        let mut buffer = FrameReorderBuffer::new(0);

        let units = buffer.submit_frame(test_frame(0), GopFrameType::Key);
        assert_eq!(order(&units), vec![(0, 0)]);
        assert_eq!(units[0].forward_ref, None);

        let units = buffer.submit_frame(test_frame(1), GopFrameType::P);
        assert_eq!(order(&units), vec![(1, 1)]);
        assert_eq!(units[0].forward_ref, Some(0));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_one_b_frame() {
        let mut buffer = FrameReorderBuffer::new(1);

        let units = buffer.submit_frame(test_frame(0), GopFrameType::Key);
        assert_eq!(units.len(), 1);
        assert!(units[0].is_key());

        // B is buffered until its anchor arrives.
        let units = buffer.submit_frame(test_frame(1), GopFrameType::B);
        assert!(units.is_empty());
        assert_eq!(buffer.len(), 1);

        // P then B.
        let units = buffer.submit_frame(test_frame(2), GopFrameType::P);
        assert_eq!(order(&units), vec![(2, 1), (1, 2)]);
        assert_eq!(units[0].forward_ref, Some(0));
        assert_eq!(units[1].forward_ref, Some(0)); // References K
        assert_eq!(units[1].backward_ref, Some(2)); // References P
    }

    #[test]
    fn test_keyframe_releases_waiting_b_frames_first() {
        let mut buffer = FrameReorderBuffer::new(2);
        buffer.submit_frame(test_frame(0), GopFrameType::Key);
        assert!(buffer.submit_frame(test_frame(1), GopFrameType::B).is_empty());

        let units = buffer.submit_frame(test_frame(2), GopFrameType::Key);
        assert_eq!(order(&units), vec![(1, 1), (2, 2)]);
        assert_eq!(units[0].backward_ref, None);
        assert_eq!(units[1].forward_ref, None);
    }

    #[test]
    fn test_flush_promotes_trailing_frame() {
        let mut buffer = FrameReorderBuffer::new(2);
        buffer.submit_frame(test_frame(0), GopFrameType::Key);
        buffer.submit_frame(test_frame(1), GopFrameType::B);
        buffer.submit_frame(test_frame(2), GopFrameType::B);

        let units = buffer.flush();
        assert_eq!(order(&units), vec![(2, 1), (1, 2)]);
        assert_eq!(units[0].frame_type, GopFrameType::P);
        assert_eq!(units[1].backward_ref, Some(2));
        assert!(buffer.is_empty());
        assert!(buffer.flush().is_empty());
    }
}
