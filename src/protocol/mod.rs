//! Command protocol - wire codes, packet ids and the packet encoder
//!
//! Outbound only: inbound payloads are handed to the log sink as opaque text.

pub mod codes;
pub mod encoder;
pub mod packet_id;

pub use codes::{Component, Index, Operation, ParseCodeError, Receiver, Transmitter};
pub use encoder::{Command, MOTOR_SLOTS, MotorSpeeds, PacketEncoder};
pub use packet_id::{FIRST_PACKET_ID, LAST_PACKET_ID, PacketIds, format_packet_id};
