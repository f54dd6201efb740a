//! Stick-to-drive mixing
//!
//! Turns a normalized `(x, y)` stick position into left/right track speeds
//! using arcade mixing: `left = y + x`, `right = y - x`, both clamped.

use crate::protocol::MotorSpeeds;

/// Default magnitude bound for stick axes and motor speeds
pub const DEFAULT_BOUND: i32 = 100;

/// Left and right side speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveMix {
    pub left: i32,
    pub right: i32,
}

impl DriveMix {
    /// Mix a stick position, clamping both sides to `[-bound, bound]`
    pub fn from_stick(x: i32, y: i32, bound: i32) -> Self {
        let bound = bound.saturating_abs();
        Self {
            left: y.saturating_add(x).clamp(-bound, bound),
            right: y.saturating_sub(x).clamp(-bound, bound),
        }
    }

    /// Spread the side speeds over the six drive motors.
    ///
    /// The robot firmware reads the first three payload slots as the left
    /// side and the last three as the right side.
    pub fn motor_speeds(self) -> MotorSpeeds {
        MotorSpeeds::from([self.left, self.left, self.left, self.right, self.right, self.right])
    }
}

/// Parse a `"x y"` line from an input source; commas are accepted as separators
pub fn parse_stick_line(line: &str) -> Option<(i32, i32)> {
    let mut parts = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|p| !p.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y))
}
