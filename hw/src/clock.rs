//! Blocking delay capability.
//!
//! The LCD protocol is paced entirely by fixed minimum delays; the chip offers
//! no handshake the driver could wait on instead. Routing every wait through
//! [Clock] lets tests replay the full protocol against a virtual timeline.

use std::fmt::Debug;
use std::time::Duration;

/// A blocking time source for protocol delays.
pub trait Clock: Debug {
    /// Blocks the calling execution context for at least `duration`.
    fn sleep(&self, duration: Duration);
}

/// [Clock] backed by [std::thread::sleep].
#[derive(Debug, Default)]
pub struct ThreadClock;

impl Clock for ThreadClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
