//! Inbound IMU frame scanning.
//!
//! Frame layout, 14 bytes:
//!
//! ```text
//! 0xFF | ax: f32 LE | ay: f32 LE | az: f32 LE | 0xFE
//! ```
//!
//! Serial reads split the stream at arbitrary points, so the scanner
//! keeps the unconsumed tail of each chunk and resumes from it.

use serde::{Deserialize, Serialize};

pub const IMU_START: u8 = 0xFF;
pub const IMU_END: u8 = 0xFE;
pub const IMU_FRAME_LEN: usize = 14;

/// One accelerometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuReading {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

impl ImuReading {
    pub fn new(ax: f32, ay: f32, az: f32) -> Self {
        Self { ax, ay, az }
    }

    /// Encode as a wire frame.
    pub fn to_frame(&self) -> [u8; IMU_FRAME_LEN] {
        let mut frame = [0u8; IMU_FRAME_LEN];
        frame[0] = IMU_START;
        frame[1..5].copy_from_slice(&self.ax.to_le_bytes());
        frame[5..9].copy_from_slice(&self.ay.to_le_bytes());
        frame[9..13].copy_from_slice(&self.az.to_le_bytes());
        frame[13] = IMU_END;
        frame
    }

    fn from_payload(payload: &[u8]) -> Self {
        let f = |i: usize| f32::from_le_bytes([payload[i], payload[i + 1], payload[i + 2], payload[i + 3]]);
        Self {
            ax: f(0),
            ay: f(4),
            az: f(8),
        }
    }

    pub fn as_tuple(&self) -> (f32, f32, f32) {
        (self.ax, self.ay, self.az)
    }
}

/// Resumable scanner over an arbitrarily chunked byte stream.
#[derive(Debug, Clone, Default)]
pub struct ImuScanner {
    tail: Vec<u8>,
    frames: u64,
}

impl ImuScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `chunk` together with the retained tail.
    ///
    /// Returns the last complete frame found, if any. Earlier frames in
    /// the same chunk are superseded.
    pub fn push(&mut self, chunk: &[u8]) -> Option<ImuReading> {
        self.tail.extend_from_slice(chunk);
        let buf = &self.tail;

        let mut i = 0;
        let mut latest = None;
        while i < buf.len() {
            if buf[i] != IMU_START {
                i += 1;
                continue;
            }
            if i + IMU_FRAME_LEN > buf.len() {
                break;
            }
            if buf[i + IMU_FRAME_LEN - 1] == IMU_END {
                latest = Some(ImuReading::from_payload(&buf[i + 1..i + IMU_FRAME_LEN - 1]));
                self.frames += 1;
                i += IMU_FRAME_LEN;
            } else {
                i += 1;
            }
        }

        self.tail.drain(..i);
        latest
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.tail.len()
    }

    /// Complete frames decoded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Drop any partial frame and restart the frame count.
    pub fn reset(&mut self) {
        self.tail.clear();
        self.frames = 0;
    }
}
