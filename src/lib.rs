//! NVIC and SysTick configuration for the TM4C123 (Cortex-M4F).
//!
//! * [`InterruptController`] enables, disables and prioritizes peripheral
//!   interrupts and the configurable system exceptions;
//! * [`PeriodicTimer`] drives SysTick either as a periodic interrupt source
//!   with a single registered callback or as a blocking one-period delay.
//!
//! Both go through [`RegisterAccess`]: [`Mmio`] on the target,
//! `FakeRegisters` in host tests. The latter is public only with the `fake`
//! feature, for host tests of code built on this crate.

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod logging;

pub mod config;
pub mod error;
pub mod exception;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod nvic;
pub mod registers;
pub mod systick;

pub use error::Error;
pub use exception::Exception;
#[cfg(any(test, feature = "fake"))]
pub use fake::FakeRegisters;
pub use nvic::{InterruptController, Irq, Priority};
pub use registers::{Mmio, RegisterAccess};
pub use systick::{CallbackSlot, Period, PeriodicTimer, TimerMode, TimerState};
