/*!
DAC output packet and bus abstractions.

The projector DAC is an 8-channel serial device; every per-point update is
one fixed block of addressed register writes. The live bus hands encoded
packets to a writer thread over a bounded channel so the tick path never
blocks on transmission, which is the DMA-offload analogue: a full queue
drops the packet and counts it instead of stalling the scan.
*/

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use std::io::Write;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// DAC channel assignments
pub mod channel {
    pub const X: u8 = 0;
    pub const Y: u8 = 1;
    pub const RED: u8 = 2;
    pub const GREEN: u8 = 3;
    pub const BLUE: u8 = 4;
    pub const BLANK: u8 = 5;
    pub const AUX0: u8 = 6;
    pub const AUX1: u8 = 7;
}

/// Size of one encoded output packet in bytes (8 registers, 2 bytes each)
pub const PACKET_SIZE_BYTES: usize = 16;

/// One per-tick DAC update. Positions are already rebiased to the unsigned
/// output range; colors are post-intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputPacket {
    pub x: u16,
    pub y: u16,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub blank: bool,
}

impl OutputPacket {
    /// Encode as 8 big-endian addressed register writes, 12-bit values:
    /// `(channel << 12) | value`
    pub fn encode(&self) -> [u8; PACKET_SIZE_BYTES] {
        let registers: [(u8, u16); 8] = [
            (channel::X, self.x >> 4),
            (channel::Y, self.y >> 4),
            (channel::RED, u16::from(self.red) << 4),
            (channel::GREEN, u16::from(self.green) << 4),
            (channel::BLUE, u16::from(self.blue) << 4),
            (channel::BLANK, if self.blank { 0 } else { 0x0FFF }),
            (channel::AUX0, 0),
            (channel::AUX1, 0),
        ];

        let mut bytes = [0u8; PACKET_SIZE_BYTES];
        for (i, (ch, value)) in registers.iter().enumerate() {
            let word = (u16::from(*ch) << 12) | (value & 0x0FFF);
            bytes[i * 2..i * 2 + 2].copy_from_slice(&word.to_be_bytes());
        }
        bytes
    }
}

/// Output-side interface the scan engine writes through
pub trait DacBus: Send {
    /// One-time peripheral bring-up; called at most once per engine lifetime
    fn power_on(&mut self);

    /// Open or close the output shutter
    fn set_shutter(&mut self, open: bool);

    /// Queue one packet for transmission; must not block the tick path
    fn submit(&mut self, packet: &OutputPacket);
}

/// Wire encoding used by the bus writer thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketEncoding {
    /// Raw register blocks, as sent to the DAC
    Raw,
    /// One JSON record per packet (live diagnostics mode)
    Json,
}

/// Serial DAC bus with a DMA-style transmit queue. Packets are handed to a
/// writer thread over a bounded channel; a full queue drops and counts.
pub struct DmaSerialBus {
    tx: Sender<OutputPacket>,
    submitted: u64,
    dropped: u64,
    shutter_open: bool,
}

impl DmaSerialBus {
    /// Create the bus and spawn its writer thread draining to `sink`
    pub fn spawn(
        sink: Box<dyn Write + Send>,
        queue_depth: usize,
        encoding: PacketEncoding,
    ) -> (Self, JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>) {
        let (tx, rx) = bounded::<OutputPacket>(queue_depth.max(1));

        let handle = thread::spawn(move || Self::writer_thread(rx, sink, encoding));

        (
            Self {
                tx,
                submitted: 0,
                dropped: 0,
                shutter_open: false,
            },
            handle,
        )
    }

    /// Get statistics: (packets submitted, packets dropped on a full queue)
    pub fn stats(&self) -> (u64, u64) {
        (self.submitted, self.dropped)
    }

    /// Writer thread: drains the transmit queue into the sink until every
    /// sender is gone, then flushes
    fn writer_thread(
        rx: Receiver<OutputPacket>,
        mut sink: Box<dyn Write + Send>,
        encoding: PacketEncoding,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut written = 0u64;
        let mut write_errors = 0u64;

        for packet in rx.iter() {
            let result = match encoding {
                PacketEncoding::Raw => sink.write_all(&packet.encode()),
                PacketEncoding::Json => serde_json::to_string(&packet)
                    .map_err(std::io::Error::other)
                    .and_then(|line| writeln!(sink, "{}", line)),
            };

            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    write_errors += 1;
                    if write_errors == 1 {
                        warn!("❌ bus write failed: {}", e);
                    }
                }
            }
        }

        sink.flush()?;
        info!(
            "📊 bus writer final stats: {} packets written, {} write errors",
            written, write_errors
        );
        Ok(())
    }
}

impl DacBus for DmaSerialBus {
    fn power_on(&mut self) {
        // On hardware this walks the DAC's wake-up register sequence
        info!("⚡ DAC powered up");
    }

    fn set_shutter(&mut self, open: bool) {
        if self.shutter_open != open {
            info!("shutter {}", if open { "open" } else { "closed" });
        }
        self.shutter_open = open;
    }

    fn submit(&mut self, packet: &OutputPacket) {
        match self.tx.try_send(*packet) {
            Ok(()) => self.submitted += 1,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped == 1 || self.dropped % 10_000 == 0 {
                    warn!(
                        "transmit queue full, {} packets dropped! This indicates the sink can't keep up.",
                        self.dropped
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                debug!("transmit queue disconnected");
            }
        }
    }
}

/// Test double that records everything the engine emits
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CaptureBus {
    pub packets: Vec<OutputPacket>,
    pub power_on_calls: u32,
    pub shutter_events: Vec<bool>,
}

#[cfg(test)]
impl DacBus for CaptureBus {
    fn power_on(&mut self) {
        self.power_on_calls += 1;
    }

    fn set_shutter(&mut self, open: bool) {
        self.shutter_events.push(open);
    }

    fn submit(&mut self, packet: &OutputPacket) {
        self.packets.push(*packet);
    }
}
