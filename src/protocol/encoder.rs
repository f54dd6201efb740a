//! Packet encoder
//!
//! Renders commands into the robot's text wire format:
//!
//! ```text
//! <id:3><transmitter><receiver><operation><component><index>[<int>(:<int>)*]
//! ```
//!
//! For example `012XA!AA[50:-50:50:-50:50:-50]` is packet 12 from the operator
//! to every board, writing six drive motor speeds.

use std::fmt::Write;

use crate::protocol::codes::{Component, Index, Operation, Receiver, Transmitter};
use crate::protocol::packet_id::{PacketIds, format_packet_id};

/// Number of drive motors in a motor speed command
pub const MOTOR_SLOTS: usize = 6;

/// One protocol command, built per call and not retained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub transmitter: Transmitter,
    pub receiver: Receiver,
    pub operation: Operation,
    pub component: Component,
    pub index: Index,
    pub payload: Vec<i32>,
}

impl Command {
    /// Create a command with an explicit payload
    pub fn new(
        transmitter: Transmitter,
        receiver: Receiver,
        operation: Operation,
        component: Component,
        index: Index,
        payload: Vec<i32>,
    ) -> Self {
        Self {
            transmitter,
            receiver,
            operation,
            component,
            index,
            payload,
        }
    }
}

/// Speeds for the six drive motors, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorSpeeds {
    pub front_left: i32,
    pub front_right: i32,
    pub rear_left: i32,
    pub rear_right: i32,
    pub mid_left: i32,
    pub mid_right: i32,
}

impl MotorSpeeds {
    /// Payload order: FL, FR, RL, RR, ML, MR
    pub fn to_payload(self) -> [i32; MOTOR_SLOTS] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
            self.mid_left,
            self.mid_right,
        ]
    }
}

impl From<[i32; MOTOR_SLOTS]> for MotorSpeeds {
    fn from(s: [i32; MOTOR_SLOTS]) -> Self {
        Self {
            front_left: s[0],
            front_right: s[1],
            rear_left: s[2],
            rear_right: s[3],
            mid_left: s[4],
            mid_right: s[5],
        }
    }
}

/// Stateless apart from its packet id counter.
///
/// Performs no validation of payload arity or range; callers clamp values.
#[derive(Debug, Default)]
pub struct PacketEncoder {
    ids: PacketIds,
}

impl PacketEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder using an injected counter
    pub fn with_ids(ids: PacketIds) -> Self {
        Self { ids }
    }

    /// Id the next packet will carry
    pub fn next_packet_id(&self) -> u16 {
        self.ids.peek()
    }

    /// Render one packet and advance the id counter
    pub fn encode(
        &self,
        transmitter: Transmitter,
        receiver: Receiver,
        operation: Operation,
        component: Component,
        index: Index,
        payload: &[i32],
    ) -> String {
        let id = self.ids.next_id();
        let mut packet = String::with_capacity(10 + payload.len() * 5);
        packet.push_str(&format_packet_id(id));
        packet.push(transmitter.code());
        packet.push(receiver.code());
        packet.push(operation.code());
        packet.push(component.code());
        packet.push(index.code());
        packet.push('[');
        for (i, value) in payload.iter().enumerate() {
            if i > 0 {
                packet.push(':');
            }
            let _ = write!(packet, "{}", value);
        }
        packet.push(']');
        packet
    }

    /// Render a prebuilt command
    pub fn render(&self, command: &Command) -> String {
        self.encode(
            command.transmitter,
            command.receiver,
            command.operation,
            command.component,
            command.index,
            &command.payload,
        )
    }

    /// WRITE of all six motor speeds to index ALL
    pub fn motor_speed_command(
        &self,
        transmitter: Transmitter,
        receiver: Receiver,
        component: Component,
        speeds: impl Into<MotorSpeeds>,
    ) -> String {
        let payload = speeds.into().to_payload();
        self.encode(transmitter, receiver, Operation::Write, component, Index::All, &payload)
    }

    /// WRITE `[parameter, value]`
    pub fn write_command(
        &self,
        transmitter: Transmitter,
        receiver: Receiver,
        component: Component,
        index: Index,
        parameter: i32,
        value: i32,
    ) -> String {
        self.encode(transmitter, receiver, Operation::Write, component, index, &[parameter, value])
    }

    /// READ `[parameter]`
    pub fn read_command(
        &self,
        transmitter: Transmitter,
        receiver: Receiver,
        component: Component,
        index: Index,
        parameter: i32,
    ) -> String {
        self.encode(transmitter, receiver, Operation::Read, component, index, &[parameter])
    }

    /// ACK `[parameter, error_code]`
    pub fn ack_command(
        &self,
        transmitter: Transmitter,
        receiver: Receiver,
        component: Component,
        index: Index,
        parameter: i32,
        error_code: i32,
    ) -> String {
        self.encode(transmitter, receiver, Operation::Ack, component, index, &[parameter, error_code])
    }

    /// ANSWER `[parameter, value]`
    pub fn answer_command(
        &self,
        transmitter: Transmitter,
        receiver: Receiver,
        component: Component,
        index: Index,
        parameter: i32,
        value: i32,
    ) -> String {
        self.encode(transmitter, receiver, Operation::Answer, component, index, &[parameter, value])
    }

    /// MESSAGE `[parameter]`; message text has no wire encoding yet
    pub fn message_command(
        &self,
        transmitter: Transmitter,
        receiver: Receiver,
        component: Component,
        index: Index,
        parameter: i32,
    ) -> String {
        self.encode(transmitter, receiver, Operation::Message, component, index, &[parameter])
    }
}
