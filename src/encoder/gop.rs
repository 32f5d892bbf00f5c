//! GOP (Group of Pictures) structure.
//!
//! Decides the picture type of every frame in input order. Keyframes are
//! placed on the first frame, on every multiple of the keyframe interval, on
//! every GOP-size boundary and whenever one is requested; a keyframe always
//! wins over the inter type the B-frame pattern would have given that slot.

/// Frame type in GOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GopFrameType {
    /// Keyframe, starts a new GOP.
    Key,
    /// Forward-predicted anchor.
    P,
    /// Bidirectional frame between two anchors; never referenced.
    B,
}

impl GopFrameType {
    /// Whether later frames may reference this one.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Key | Self::P)
    }

    /// Whether this is a keyframe.
    pub fn is_key(&self) -> bool {
        matches!(self, Self::Key)
    }
}

/// Position in the GOP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GopPosition {
    /// Frames since the most recent keyframe (0 for the keyframe itself).
    pub gop_frame_num: u32,
    /// Input sequence number.
    pub frame_index: u64,
    /// Frame type.
    pub frame_type: GopFrameType,
}

/// GOP structure manager.
pub struct GopStructure {
    /// Distance between periodic keyframes.
    keyframe_interval: u32,
    /// GOP length; also forces a keyframe on its boundaries.
    gop_size: u32,
    /// Number of B-frames between anchors.
    b_frame_count: u32,
    /// Index of the next frame.
    frame_index: u64,
    /// Index of the most recent keyframe.
    last_key_index: u64,
    /// Flag to force the next frame to be a keyframe.
    force_key: bool,
}

impl GopStructure {
    /// Create a new GOP structure. Intervals of 0 are treated as 1.
    pub fn new(keyframe_interval: u32, gop_size: u32, b_frame_count: u32) -> Self {
        Self {
            keyframe_interval: keyframe_interval.max(1),
            gop_size: gop_size.max(1),
            b_frame_count,
            frame_index: 0,
            last_key_index: 0,
            force_key: false,
        }
    }

    /// Whether `index` falls on a periodic keyframe or GOP boundary.
    pub fn is_scheduled_key(&self, index: u64) -> bool {
        index == 0
            || index.is_multiple_of(self.keyframe_interval as u64)
            || index.is_multiple_of(self.gop_size as u64)
    }

    /// Get the next frame position in the GOP.
    pub fn get_next_frame(&mut self) -> GopPosition {
        let index = self.frame_index;
        let is_key = self.is_scheduled_key(index) || self.force_key;
        self.force_key = false;

        if is_key {
            self.last_key_index = index;
        }
        let gop_frame_num = (index - self.last_key_index) as u32;

        let frame_type = if is_key {
            GopFrameType::Key
        } else if self.b_frame_count == 0 {
            GopFrameType::P
        } else if self.is_scheduled_key(index + 1)
            || gop_frame_num.is_multiple_of(self.b_frame_count + 1)
        {
            // The last frame before a known keyframe becomes an anchor so the
            // B-frames ahead of it never need a reference past the boundary.
            GopFrameType::P
        } else {
            GopFrameType::B
        };

        self.frame_index += 1;

        GopPosition {
            gop_frame_num,
            frame_index: index,
            frame_type,
        }
    }

    /// Get total frames assigned so far.
    pub fn total_frames(&self) -> u64 {
        self.frame_index
    }

    /// Request that the next frame be a keyframe.
    pub fn request_key(&mut self) {
        self.force_key = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(gop: &mut GopStructure, n: usize) -> Vec<GopFrameType> {
        (0..n).map(|_| gop.get_next_frame().frame_type).collect()
    }

    #[test]
    fn test_p_only_gop() {
        let mut gop = GopStructure::new(25, 25, 0);

        let pos = gop.get_next_frame();
        assert_eq!(pos.frame_type, GopFrameType::Key);
        assert_eq!(pos.frame_index, 0);

        for i in 1..25 {
            let pos = gop.get_next_frame();
            assert_eq!(pos.frame_type, GopFrameType::P, "Frame {i} should be P");
            assert_eq!(pos.gop_frame_num, i as u32);
        }

        // Frame 25 starts a new GOP.
        let pos = gop.get_next_frame();
        assert_eq!(pos.frame_type, GopFrameType::Key);
        assert_eq!(pos.gop_frame_num, 0);
        assert_eq!(gop.total_frames(), 26);
    }

    #[test]
    fn test_b_frame_pattern() {
        use GopFrameType::*;
        let mut gop = GopStructure::new(10, 10, 2);
        assert_eq!(
            types(&mut gop, 11),
            vec![Key, B, B, P, B, B, P, B, B, P, Key]
        );
    }

    #[test]
    fn test_anchor_before_keyframe() {
        use GopFrameType::*;
        // 8 is not on the 3-frame anchor grid, so frame 7 is promoted.
        let mut gop = GopStructure::new(8, 8, 2);
        assert_eq!(types(&mut gop, 9), vec![Key, B, B, P, B, B, P, P, Key]);
    }

    #[test]
    fn test_gop_boundary_forces_key() {
        let mut gop = GopStructure::new(4, 6, 0);
        let keys: Vec<u64> = (0..13)
            .map(|_| gop.get_next_frame())
            .filter(|p| p.frame_type.is_key())
            .map(|p| p.frame_index)
            .collect();
        assert_eq!(keys, vec![0, 4, 6, 8, 12]);
    }

    #[test]
    fn test_requested_key_resets_pattern() {
        use GopFrameType::*;
        let mut gop = GopStructure::new(100, 100, 1);
        assert_eq!(types(&mut gop, 3), vec![Key, B, P]);
        gop.request_key();
        assert_eq!(types(&mut gop, 4), vec![Key, B, P, B]);
    }

    #[test]
    fn test_reference_flags() {
        assert!(GopFrameType::Key.is_reference());
        assert!(GopFrameType::P.is_reference());
        assert!(!GopFrameType::B.is_reference());
        assert!(!GopFrameType::P.is_key());
    }
}
