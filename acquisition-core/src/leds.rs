//! LED toggle register shared between the acquisition loop and the interrupt context.
//!
//! The acquisition loop only ever writes the boolean flags in [`LedFlags`]; the
//! periodic interrupt owns the pins through an [`LedBank`] and mirrors those flags
//! onto the outputs. The flags are the only state the two contexts share.

use embedded_hal::digital::OutputPin;
use portable_atomic::{AtomicBool, Ordering};

use crate::channels::{LED_COUNT, LedId};

/// Register of desired LED levels, one flag per LED.
pub struct LedFlags {
    flags: [AtomicBool; LED_COUNT],
}

impl LedFlags {
    /// Creates a register with every LED dark.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flags: [const { AtomicBool::new(false) }; LED_COUNT],
        }
    }

    /// Publishes the desired level for `led`.
    pub fn set(&self, led: LedId, lit: bool) {
        self.flags[led.as_index()].store(lit, Ordering::Release);
    }

    /// Returns the desired level for `led`.
    pub fn is_lit(&self, led: LedId) -> bool {
        self.flags[led.as_index()].load(Ordering::Acquire)
    }

    /// Darkens every LED, including the status indicator.
    pub fn clear_all(&self) {
        for flag in &self.flags {
            flag.store(false, Ordering::Release);
        }
    }

    /// Returns a copy of every flag, indexed by [`LedId::as_index`].
    pub fn snapshot(&self) -> [bool; LED_COUNT] {
        core::array::from_fn(|index| self.flags[index].load(Ordering::Acquire))
    }
}

impl Default for LedFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Output pins driven from [`LedFlags`], with the last level applied to each.
pub struct LedBank<P> {
    pins: [P; LED_COUNT],
    applied: [Option<bool>; LED_COUNT],
}

impl<P> LedBank<P>
where
    P: OutputPin,
{
    /// Wraps the pins; no level is assumed until the first write.
    pub const fn new(pins: [P; LED_COUNT]) -> Self {
        Self {
            pins,
            applied: [None; LED_COUNT],
        }
    }

    /// Drives every output low.
    pub fn begin(&mut self) -> Result<(), P::Error> {
        for (pin, applied) in self.pins.iter_mut().zip(self.applied.iter_mut()) {
            pin.set_low()?;
            *applied = Some(false);
        }
        Ok(())
    }

    /// Mirrors the flag for `led` onto its pin. Returns `true` when the pin was written.
    ///
    /// Calling this repeatedly with an unchanged flag performs no further writes.
    pub fn reconcile(&mut self, led: LedId, flags: &LedFlags) -> Result<bool, P::Error> {
        let index = led.as_index();
        let lit = flags.is_lit(led);
        if self.applied[index] == Some(lit) {
            return Ok(false);
        }

        let pin = &mut self.pins[index];
        if lit {
            pin.set_high()?;
        } else {
            pin.set_low()?;
        }
        self.applied[index] = Some(lit);
        Ok(true)
    }

    /// Reconciles every LED; returns how many pins changed level.
    pub fn reconcile_all(&mut self, flags: &LedFlags) -> Result<usize, P::Error> {
        let mut written = 0;
        for index in 0..LED_COUNT {
            if let Some(led) = LedId::from_index(index)
                && self.reconcile(led, flags)?
            {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Level most recently driven onto `led`, if any.
    pub fn applied(&self, led: LedId) -> Option<bool> {
        self.applied[led.as_index()]
    }

    pub fn pins(&self) -> &[P; LED_COUNT] {
        &self.pins
    }
}
