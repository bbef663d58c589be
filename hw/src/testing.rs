//! Test doubles for the expander bus and the protocol clock.
//!
//! Both record into one shared [Timeline], so a test can assert on the exact
//! interleaving of register writes and protocol delays instead of wall-clock
//! time.

use crate::clock::Clock;
use crate::i2c::ExpanderBus;
use crate::{HwError, HwResult};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Event {
    Write(u8),
    Sleep(Duration),
}

pub type Timeline = Rc<RefCell<Vec<Event>>>;

pub fn timeline() -> Timeline {
    Rc::new(RefCell::new(Vec::new()))
}

/// [ExpanderBus] that records every write, optionally rejecting one of them
/// with a transport error.
#[derive(Debug)]
pub struct MockBus {
    timeline: Timeline,
    fail_at: Option<usize>,
    attempts: usize,
}

impl MockBus {
    pub fn new(timeline: Timeline) -> Self {
        MockBus {
            timeline,
            fail_at: None,
            attempts: 0,
        }
    }

    /// A bus whose `nth` write attempt (zero-based) fails once; every other
    /// attempt succeeds.
    pub fn failing_at(timeline: Timeline, nth: usize) -> Self {
        MockBus {
            timeline,
            fail_at: Some(nth),
            attempts: 0,
        }
    }
}

impl ExpanderBus for MockBus {
    fn write(&mut self, byte: u8) -> HwResult<()> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.fail_at == Some(attempt) {
            return Err(HwError::Transport("injected fault".to_string()));
        }
        self.timeline.borrow_mut().push(Event::Write(byte));
        Ok(())
    }
}

/// [Clock] that records requested delays instead of sleeping.
#[derive(Debug)]
pub struct VirtualClock {
    timeline: Timeline,
}

impl VirtualClock {
    pub fn new(timeline: Timeline) -> Self {
        VirtualClock { timeline }
    }
}

impl Clock for VirtualClock {
    fn sleep(&self, duration: Duration) {
        self.timeline.borrow_mut().push(Event::Sleep(duration));
    }
}
