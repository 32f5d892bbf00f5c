//! Ordered queue of finished packets.

use std::collections::VecDeque;

use super::EncodedPacket;
use crate::error::{FrameForgeError, Result};

/// Result of polling for a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketPoll {
    /// The oldest finished packet.
    Ready(EncodedPacket),
    /// Nothing available yet; submit more frames or flush.
    Pending,
    /// End of stream: flushed and fully drained.
    Drained,
}

impl PacketPoll {
    /// The packet, if one was ready.
    pub fn into_packet(self) -> Option<EncodedPacket> {
        match self {
            Self::Ready(packet) => Some(packet),
            Self::Pending | Self::Drained => None,
        }
    }

    pub fn is_drained(&self) -> bool {
        matches!(self, Self::Drained)
    }
}

/// FIFO of packets in output order.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<EncodedPacket>,
    last_frame_number: Option<u64>,
    end_of_stream: bool,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet. Output frame numbers must be strictly increasing.
    pub fn enqueue(&mut self, packet: EncodedPacket) -> Result<()> {
        if let Some(last) = self.last_frame_number {
            if packet.frame_number <= last {
                return Err(FrameForgeError::EncodeFailed(format!(
                    "packet {} enqueued after packet {last}",
                    packet.frame_number
                )));
            }
        }
        self.last_frame_number = Some(packet.frame_number);
        self.packets.push_back(packet);
        Ok(())
    }

    /// Take the oldest packet.
    pub fn dequeue(&mut self) -> PacketPoll {
        match self.packets.pop_front() {
            Some(packet) => PacketPoll::Ready(packet),
            None if self.end_of_stream => PacketPoll::Drained,
            None => PacketPoll::Pending,
        }
    }

    /// Mark that no further packets will be enqueued.
    pub fn mark_end_of_stream(&mut self) {
        self.end_of_stream = true;
    }

    /// Drop undelivered packets and mark end of stream. Returns how many were dropped.
    pub fn close(&mut self) -> usize {
        let dropped = self.packets.len();
        self.packets.clear();
        self.end_of_stream = true;
        dropped
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FrameType;

    fn packet(frame_number: u64) -> EncodedPacket {
        EncodedPacket {
            data: vec![0x12, 0x00],
            frame_number,
            input_index: frame_number,
            frame_type: FrameType::Inter,
            is_key_frame: false,
            pts: None,
            q_idx: 128,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PacketQueue::new();
        queue.enqueue(packet(0)).unwrap();
        queue.enqueue(packet(1)).unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue().into_packet().map(|p| p.frame_number), Some(0));
        assert_eq!(queue.dequeue().into_packet().map(|p| p.frame_number), Some(1));
        assert_eq!(queue.dequeue(), PacketPoll::Pending);
    }

    #[test]
    fn test_rejects_non_increasing_numbers() {
        let mut queue = PacketQueue::new();
        queue.enqueue(packet(3)).unwrap();
        assert!(queue.enqueue(packet(3)).is_err());
        assert!(queue.enqueue(packet(2)).is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drained_only_after_end_of_stream_and_empty() {
        let mut queue = PacketQueue::new();
        queue.enqueue(packet(0)).unwrap();
        queue.mark_end_of_stream();

        assert!(matches!(queue.dequeue(), PacketPoll::Ready(_)));
        assert!(queue.dequeue().is_drained());
        assert!(queue.dequeue().is_drained());
    }

    #[test]
    fn test_close_drops_undelivered() {
        let mut queue = PacketQueue::new();
        queue.enqueue(packet(0)).unwrap();
        queue.enqueue(packet(1)).unwrap();
        assert_eq!(queue.close(), 2);
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_drained());
    }
}
