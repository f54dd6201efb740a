//! Field codes of the robot command protocol.
//!
//! Each enum value maps to exactly one ASCII character on the wire. These tables
//! are shared with the robot firmware: never renumber or reuse a code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A field name that does not match any known code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseCodeError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! wire_code {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal, $label:literal; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every value, in wire-table order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// The single character sent on the wire
            pub fn code(self) -> char {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// The snake_case name used in config files and on the command line
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = ParseCodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == wanted)
                    .ok_or_else(|| ParseCodeError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

wire_code! {
    /// Board that emits a packet
    Transmitter("transmitter") {
        /// Motor controller board
        ControllerBoard => 'C', "controller_board";
        MainBoard => 'M', "main_board";
        /// Operator station (this client)
        Master => 'X', "master";
    }
}

wire_code! {
    /// Board a packet is addressed to
    Receiver("receiver") {
        /// Broadcast to every board
        All => 'A', "all";
        ControllerBoard => 'C', "controller_board";
        MainBoard => 'M', "main_board";
        Master => 'X', "master";
    }
}

wire_code! {
    /// What the receiver should do with the payload
    Operation("operation") {
        Write => '!', "write";
        Ack => '*', "ack";
        Read => '?', "read";
        Answer => '^', "answer";
        Message => '#', "message";
    }
}

wire_code! {
    /// Addressable subsystem on the robot
    Component("component") {
        /// Traction motors
        Drive => 'A', "drive";
        Pal => 'B', "pal";
        Arm => 'C', "arm";
        Clamp => 'D', "clamp";
        PanTilt => 'E', "pan_tilt";
        /// Auxiliary motors
        Aux => 'F', "aux";
        Headlight => 'G', "headlight";
        Lamp => 'H', "lamp";
        Brake => 'I', "brake";
        Power => 'J', "power";
    }
}

wire_code! {
    /// Slot selector within a component
    Index("index") {
        Slot1 => '1', "slot1";
        Slot2 => '2', "slot2";
        Slot3 => '3', "slot3";
        Slot4 => '4', "slot4";
        Slot5 => '5', "slot5";
        Slot6 => '6', "slot6";
        All => 'A', "all";
    }
}

impl Index {
    /// Numbered slot 1..=6
    pub fn slot(n: u8) -> Option<Self> {
        match n {
            1 => Some(Index::Slot1),
            2 => Some(Index::Slot2),
            3 => Some(Index::Slot3),
            4 => Some(Index::Slot4),
            5 => Some(Index::Slot5),
            6 => Some(Index::Slot6),
            _ => None,
        }
    }
}
