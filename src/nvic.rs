//! NVIC: enable, disable and prioritize peripheral interrupt lines.

use core::convert::TryFrom;

use cortex_m::interrupt::InterruptNumber;

use crate::config::{IRQ_MAX, PRIORITY_BITS, PRIORITY_MAX};
use crate::error::Error;
use crate::registers::{dis, en, pri, RegisterAccess};

/// Peripheral interrupt number, as found in the vector table after the 16
/// system exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Irq(pub u16);

unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0
    }
}

impl Irq {
    fn checked(number: u16) -> Result<Self, Error> {
        if number > IRQ_MAX {
            warn!("IRQ {} rejected", number);
            Err(Error::IrqOutOfRange(number))
        } else {
            Ok(Irq(number))
        }
    }

    /// enable/disable bank and the bit inside it
    fn bank_bit(self) -> (usize, u32) {
        ((self.0 / 32) as usize, 1 << (self.0 % 32))
    }

    /// PRIn index and the offset of the priority field in it
    fn priority_field(self) -> (usize, u32) {
        let lane = (self.0 % 4) as u32;
        ((self.0 / 4) as usize, 8 - PRIORITY_BITS + lane * 8)
    }
}

/// Interrupt priority, 0 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const LOWEST: Priority = Priority(PRIORITY_MAX);

    pub fn value(self) -> u8 {
        self.0
    }

    pub(crate) const fn field_mask() -> u32 {
        (1 << PRIORITY_BITS) - 1
    }

    /// low bits of `field` hold the priority
    pub(crate) fn from_field(field: u32) -> Self {
        Priority((field & Self::field_mask()) as u8)
    }
}

impl TryFrom<u8> for Priority {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > PRIORITY_MAX {
            warn!("priority {} rejected", value);
            Err(Error::PriorityOutOfRange(value))
        } else {
            Ok(Priority(value))
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

//-----------------------------------------------------------------------------

/// Interrupt line and system handler configuration.
///
/// Every request is validated before any register is touched: a rejected
/// call leaves the hardware exactly as it was. Exception handling lives in
/// [`crate::exception`].
pub struct InterruptController<R> {
    pub(crate) regs: R,
}

impl<R> InterruptController<R> {
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn free(self) -> R {
        self.regs
    }
}

impl<R: RegisterAccess> InterruptController<R> {
    pub fn enable_irq<I: InterruptNumber>(&self, interrupt: I) -> Result<(), Error> {
        let (bank, bit) = Irq::checked(interrupt.number())?.bank_bit();

        // ENn is write-one-to-set, other lines in the bank are unaffected
        self.regs.write(en(bank), bit);
        self.regs.barrier();

        trace!("IRQ {} enabled", interrupt.number());
        Ok(())
    }

    pub fn disable_irq<I: InterruptNumber>(&self, interrupt: I) -> Result<(), Error> {
        let (bank, bit) = Irq::checked(interrupt.number())?.bank_bit();

        // DISn is write-one-to-clear, never read-modify-write it
        self.regs.write(dis(bank), bit);
        self.regs.barrier();

        trace!("IRQ {} disabled", interrupt.number());
        Ok(())
    }

    pub fn is_irq_enabled<I: InterruptNumber>(&self, interrupt: I) -> Result<bool, Error> {
        let (bank, bit) = Irq::checked(interrupt.number())?.bank_bit();
        Ok(self.regs.read(en(bank)) & bit != 0)
    }

    pub fn set_priority_irq<I: InterruptNumber>(
        &self,
        interrupt: I,
        priority: u8,
    ) -> Result<(), Error> {
        let irq = Irq::checked(interrupt.number())?;
        let priority = Priority::try_from(priority)?;
        let (index, offset) = irq.priority_field();
        let mask = Priority::field_mask() << offset;

        self.regs.modify(pri(index), |v| {
            (v & !mask) | ((u32::from(priority.value()) << offset) & mask)
        });

        trace!("IRQ {} priority {}", irq.0, priority.value());
        Ok(())
    }

    pub fn irq_priority<I: InterruptNumber>(&self, interrupt: I) -> Result<Priority, Error> {
        let (index, offset) = Irq::checked(interrupt.number())?.priority_field();
        Ok(Priority::from_field(self.regs.read(pri(index)) >> offset))
    }
}
