//! Example: IVF encoding
//!
//! Encodes a generated moving-gradient test pattern with the reference
//! bitstream core and writes `output.ivf`.

use frameforge::{AV1Encoder, EncodeConfig, IvfHeader, IvfWriter, RawFrame};
use std::fs::File;
use std::io::BufWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

const OUTPUT_PATH: &str = "output.ivf";
const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const NUM_FRAMES: u32 = 60;

/// Diagonal luma ramp that scrolls one step per frame; flat chroma.
fn test_pattern(index: u32) -> (Vec<u8>, Vec<u8>) {
    let (w, h) = (WIDTH as usize, HEIGHT as usize);
    let mut y = vec![0u8; w * h];
    for row in 0..h {
        for col in 0..w {
            y[row * w + col] = ((row + col + index as usize * 4) % 220 + 16) as u8;
        }
    }
    let uv = vec![128u8; w.div_ceil(2) * h.div_ceil(2)];
    (y, uv)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_filter(tracing_subscriber::filter::LevelFilter::INFO),
        )
        .init();

    println!("FrameForge IVF Encode Example\n");

    // Configure encoder.
    let config = EncodeConfig::default()
        .with_frame_rate(30, 1)
        .with_keyframe_interval(30)
        .with_b_frames(2)
        .with_target_bitrate(400_000);

    let mut encoder = AV1Encoder::new(WIDTH, HEIGHT, &config)?;
    println!(
        "Config: {:?}, keyint={}, B-frames={}, lookahead={}\n",
        encoder.config().rate_control_mode,
        encoder.config().keyframe_interval,
        encoder.config().b_frame_count,
        encoder.config().lookahead_depth
    );

    let header = IvfHeader::for_stream(encoder.config(), NUM_FRAMES)?;
    let mut output = IvfWriter::new(BufWriter::new(File::create(OUTPUT_PATH)?), header)?;

    let uv_stride = WIDTH.div_ceil(2) as usize;
    for i in 0..NUM_FRAMES {
        let (y, uv) = test_pattern(i);
        encoder.submit(&RawFrame::from_u8(&y, &uv, &uv, WIDTH as usize, uv_stride))?;

        for packet in encoder.packets() {
            let packet = packet?;
            output.write_packet(&packet)?;
            println!(
                "  out={:<2} in={:<2}: {:>5} bytes, q_idx={:<3}{}",
                packet.frame_number,
                packet.input_index,
                packet.size(),
                packet.q_idx,
                if packet.is_key_frame { " [KEY]" } else { "" }
            );
        }
    }

    // Flush remaining frames.
    encoder.flush();
    for packet in encoder.packets() {
        let packet = packet?;
        output.write_packet(&packet)?;
        println!(
            "  out={:<2} in={:<2}: {:>5} bytes, q_idx={:<3} (flushed)",
            packet.frame_number,
            packet.input_index,
            packet.size(),
            packet.q_idx
        );
    }

    let total_bytes = output.bytes_written();
    output.finish()?;

    let stats = encoder.rate_control_stats()?;
    println!(
        "\nEncoded {} frames, {total_bytes} bytes, buffer {:.1}%, avg q_idx {:.1}",
        stats.frames_encoded, stats.buffer_fullness_pct, stats.avg_qp
    );
    println!("Output: {OUTPUT_PATH}");

    Ok(())
}
