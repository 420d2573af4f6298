//! HandGuide Serial Transport
//!
//! Byte-stream link to the haptic wearable:
//!
//! - **IMU:** Resumable scanner for `0xFF | ax | ay | az | 0xFE` frames
//! - **Lines:** Delimited UTF-8 text lines from the same stream
//! - **Command:** 6-byte directional intensity frames
//! - **Link:** Port lifecycle, reader thread, serialized writer

pub mod command;
pub mod imu;
pub mod lines;
pub mod link;

pub use command::DirectionCommand;
pub use imu::{ImuReading, ImuScanner};
pub use lines::LineDecoder;
pub use link::{available_ports, LinkState, PortInfo, SerialLink};
