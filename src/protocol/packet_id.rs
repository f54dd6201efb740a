//! Packet sequence numbers
//!
//! Every packet starts with a three digit sequence number in `001..=999`.
//! The counter wraps back to 1 after 999 and is never reset otherwise.

use std::sync::atomic::{AtomicU16, Ordering};

/// First sequence number handed out
pub const FIRST_PACKET_ID: u16 = 1;

/// Last sequence number before wrapping
pub const LAST_PACKET_ID: u16 = 999;

/// Monotonic, wrapping packet id counter.
///
/// Lock-free so a single encoder can be shared by `&` across tasks.
#[derive(Debug)]
pub struct PacketIds {
    next: AtomicU16,
}

impl Default for PacketIds {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketIds {
    /// Counter whose first id is 001
    pub fn new() -> Self {
        Self::starting_at(FIRST_PACKET_ID)
    }

    /// Counter whose first id is `first`; out-of-range values start at 001
    pub fn starting_at(first: u16) -> Self {
        let first = if (FIRST_PACKET_ID..=LAST_PACKET_ID).contains(&first) {
            first
        } else {
            FIRST_PACKET_ID
        };
        Self {
            next: AtomicU16::new(first),
        }
    }

    /// Id the next call to `next_id` will return
    pub fn peek(&self) -> u16 {
        self.next.load(Ordering::SeqCst)
    }

    /// Take the current id and advance the counter
    pub fn next_id(&self) -> u16 {
        let prev = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| {
                Some(if id >= LAST_PACKET_ID { FIRST_PACKET_ID } else { id + 1 })
            });
        // fetch_update only fails when the closure returns None
        match prev {
            Ok(id) | Err(id) => id,
        }
    }
}

/// Render an id as the fixed-width wire field
///
/// Format: `{id:03}`
/// Example: `7` renders as `007`
pub fn format_packet_id(id: u16) -> String {
    format!("{:03}", id)
}
