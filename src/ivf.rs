//! IVF container.
//!
//! A 32-byte file header followed by one 12-byte frame header plus payload per
//! packet. Every integer is little-endian.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use crate::encoder::{EncodedPacket, Fps, ResolvedConfig};
use crate::error::{FrameForgeError, Result};

/// File signature.
pub const IVF_SIGNATURE: [u8; 4] = *b"DKIF";

/// FourCC of AV1 streams.
pub const AV1_FOURCC: [u8; 4] = *b"AV01";

/// Size of the file header in bytes.
pub const IVF_HEADER_LEN: u16 = 32;

/// Size of each frame header in bytes.
pub const IVF_FRAME_HEADER_LEN: usize = 12;

const IVF_VERSION: u16 = 0;

/// The IVF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfHeader {
    pub fourcc: [u8; 4],
    pub width: u16,
    pub height: u16,
    pub frame_rate: Fps,
    /// Number of frames the file was planned to hold.
    pub frame_count: u32,
}

impl IvfHeader {
    /// Header for an AV1 stream produced with `config`.
    pub fn for_stream(config: &ResolvedConfig, frame_count: u32) -> Result<Self> {
        let to_u16 = |v: u32, what: &str| {
            u16::try_from(v).map_err(|_| {
                FrameForgeError::InvalidContainer(format!("{what} {v} does not fit in 16 bits"))
            })
        };
        Ok(Self {
            fourcc: AV1_FOURCC,
            width: to_u16(config.dimensions.width, "width")?,
            height: to_u16(config.dimensions.height, "height")?,
            frame_rate: config.frame_rate,
            frame_count,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&IVF_SIGNATURE)?;
        w.write_u16::<LittleEndian>(IVF_VERSION)?;
        w.write_u16::<LittleEndian>(IVF_HEADER_LEN)?;
        w.write_all(&self.fourcc)?;
        w.write_u16::<LittleEndian>(self.width)?;
        w.write_u16::<LittleEndian>(self.height)?;
        w.write_u32::<LittleEndian>(self.frame_rate.num)?;
        w.write_u32::<LittleEndian>(self.frame_rate.den)?;
        w.write_u32::<LittleEndian>(self.frame_count)?;
        w.write_u32::<LittleEndian>(0)?; // reserved
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; IVF_HEADER_LEN as usize];
        r.read_exact(&mut buf).map_err(truncated("file header"))?;

        if buf[0..4] != IVF_SIGNATURE {
            return Err(FrameForgeError::InvalidContainer(format!(
                "bad signature {:02X?}",
                &buf[0..4]
            )));
        }
        let version = LittleEndian::read_u16(&buf[4..6]);
        if version != IVF_VERSION {
            return Err(FrameForgeError::InvalidContainer(format!(
                "unsupported version {version}"
            )));
        }
        let header_len = LittleEndian::read_u16(&buf[6..8]);
        if header_len != IVF_HEADER_LEN {
            return Err(FrameForgeError::InvalidContainer(format!(
                "header length {header_len}, expected {IVF_HEADER_LEN}"
            )));
        }

        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&buf[8..12]);
        let num = LittleEndian::read_u32(&buf[16..20]);
        let den = LittleEndian::read_u32(&buf[20..24]);
        let frame_rate = Fps::new(num, den)
            .map_err(|_| FrameForgeError::InvalidContainer(format!("frame rate {num}/{den}")))?;

        Ok(Self {
            fourcc,
            width: LittleEndian::read_u16(&buf[12..14]),
            height: LittleEndian::read_u16(&buf[14..16]),
            frame_rate,
            frame_count: LittleEndian::read_u32(&buf[24..28]),
        })
    }
}

fn truncated(what: &'static str) -> impl Fn(io::Error) -> FrameForgeError {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            FrameForgeError::InvalidContainer(format!("truncated {what}"))
        }
        _ => FrameForgeError::Io(e),
    }
}

/// One frame read back from an IVF stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfFrame {
    pub timestamp: u64,
    pub data: Vec<u8>,
}

/// Writes packets into an IVF stream.
pub struct IvfWriter<W: Write> {
    inner: W,
    header: IvfHeader,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write> IvfWriter<W> {
    /// Write the file header and return a writer positioned at the first frame.
    pub fn new(mut inner: W, header: IvfHeader) -> Result<Self> {
        header.write_to(&mut inner)?;
        debug!(
            "IVF header: {}x{}, {}/{} fps, {} frames",
            header.width,
            header.height,
            header.frame_rate.num,
            header.frame_rate.den,
            header.frame_count
        );
        Ok(Self {
            inner,
            header,
            frames_written: 0,
            bytes_written: IVF_HEADER_LEN as u64,
        })
    }

    /// Write one frame.
    pub fn write_frame(&mut self, timestamp: u64, data: &[u8]) -> Result<()> {
        let size = u32::try_from(data.len()).map_err(|_| {
            FrameForgeError::InvalidContainer(format!("frame of {} bytes is too large", data.len()))
        })?;
        self.inner.write_u32::<LittleEndian>(size)?;
        self.inner.write_u64::<LittleEndian>(timestamp)?;
        self.inner.write_all(data)?;
        self.frames_written += 1;
        self.bytes_written += (IVF_FRAME_HEADER_LEN + data.len()) as u64;
        Ok(())
    }

    /// Write a packet at its container timestamp.
    pub fn write_packet(&mut self, packet: &EncodedPacket) -> Result<()> {
        self.write_frame(packet.container_timestamp(), &packet.data)
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Total bytes written, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        if self.frames_written != u64::from(self.header.frame_count) {
            warn!(
                "IVF header announces {} frames but {} were written",
                self.header.frame_count, self.frames_written
            );
        }
        Ok(self.inner)
    }
}

/// Reads an IVF stream frame by frame.
pub struct IvfReader<R: Read> {
    inner: R,
    header: IvfHeader,
}

impl<R: Read> IvfReader<R> {
    /// Parse and validate the file header.
    pub fn new(mut inner: R) -> Result<Self> {
        let header = IvfHeader::read_from(&mut inner)?;
        Ok(Self { inner, header })
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    /// Read the next frame; `Ok(None)` at a clean end of stream.
    pub fn read_frame(&mut self) -> Result<Option<IvfFrame>> {
        let mut frame_header = [0u8; IVF_FRAME_HEADER_LEN];
        let filled = read_up_to(&mut self.inner, &mut frame_header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < IVF_FRAME_HEADER_LEN {
            return Err(FrameForgeError::InvalidContainer(format!(
                "truncated frame header ({filled} of {IVF_FRAME_HEADER_LEN} bytes)"
            )));
        }

        let mut fields = &frame_header[..];
        let size = fields.read_u32::<LittleEndian>()?;
        let timestamp = fields.read_u64::<LittleEndian>()?;

        // The size field is untrusted; only buffer what the stream delivers.
        let mut data = Vec::new();
        (&mut self.inner)
            .take(u64::from(size))
            .read_to_end(&mut data)?;
        if data.len() != size as usize {
            return Err(FrameForgeError::InvalidContainer(format!(
                "truncated frame payload ({} of {size} bytes)",
                data.len()
            )));
        }
        Ok(Some(IvfFrame { timestamp, data }))
    }

    /// Read every remaining frame.
    pub fn read_all(&mut self) -> Result<Vec<IvfFrame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.read_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Fill as much of `buf` as the reader provides before end of stream.
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
