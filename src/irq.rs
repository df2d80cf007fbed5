// src/irq.rs
//! Interrupt subscription surface.
//!
//! Interrupt routing, controller programming and handler registration are
//! platform glue outside this crate; a queue only needs to say which line
//! it listens on and to answer "was this interrupt mine?" when the line
//! fires. Lines may be shared, so a handler that harvested nothing must
//! report that, letting the platform try the other devices on the line.

use core::fmt;

/// A hardware interrupt line identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterruptLine(pub u8);

impl fmt::Display for InterruptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IRQ {}", self.0)
    }
}

/// A device-side handler for one interrupt line.
pub trait IrqHandler: Send + Sync {
    /// The line this handler is subscribed to.
    fn line(&self) -> InterruptLine;

    /// Called when the line fires. Returns whether this handler owned the
    /// interrupt, i.e. found work to do.
    fn handle_irq(&self) -> bool;
}
