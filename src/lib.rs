//! # FrameForge
//!
//! Orchestration core of a planar-video AV1 encoder.
//!
//! FrameForge accepts raw 4:2:0 frames, decides keyframe placement and B-frame
//! encode order, runs a rate-control feedback loop, hands each scheduled frame
//! to a [`BitstreamCore`] and queues the resulting packets in output order.
//! Packets can be written to an IVF file with [`IvfWriter`].
//!
//! ## Example
//!
//! ```
//! use frameforge::{AV1Encoder, EncodeConfig, IvfHeader, IvfWriter, RawFrame};
//!
//! let config = EncodeConfig::default().with_keyframe_interval(25);
//! let mut encoder = AV1Encoder::new(64, 64, &config)?;
//!
//! let y = vec![16u8; 64 * 64];
//! let uv = vec![128u8; 32 * 32];
//! for _ in 0..3 {
//!     encoder.submit(&RawFrame::from_u8(&y, &uv, &uv, 64, 32))?;
//! }
//! encoder.flush();
//!
//! let header = IvfHeader::for_stream(encoder.config(), 3)?;
//! let mut ivf = IvfWriter::new(Vec::new(), header)?;
//! for packet in encoder.packets() {
//!     ivf.write_packet(&packet?)?;
//! }
//! assert_eq!(ivf.frames_written(), 3);
//! # Ok::<(), frameforge::FrameForgeError>(())
//! ```

pub mod encoder;
pub mod error;
pub mod ivf;

pub use encoder::av1::{AV1Encoder, Packets};
pub use encoder::bitstream::{BitstreamCore, ReferenceCore};
pub use encoder::color::{
    ColorDescription, ColorPrimaries, ColorRange, ContentLightLevel, MasteringDisplay,
    MatrixCoefficients, TransferCharacteristics,
};
pub use encoder::frame::{Frame, PlaneSamples, RawFrame};
pub use encoder::gop::GopFrameType;
pub use encoder::queue::PacketPoll;
pub use encoder::rate_control::RateControlStats;
pub use encoder::reorder::ScheduledUnit;
pub use encoder::scheduler::SchedulerState;
pub use encoder::{
    BitDepth, Dimensions, EncodeConfig, EncodedPacket, Fps, FrameType, RateControlMode,
    ResolvedConfig,
};
pub use error::{FrameForgeError, Result};
pub use ivf::{IvfFrame, IvfHeader, IvfReader, IvfWriter};
