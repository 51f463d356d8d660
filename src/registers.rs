//! Memory-mapped registers of the System Control Space touched by this crate.
//!
//! Addresses follow the TM4C123GH6PM datasheet, section 3.5 "System Control
//! Space registers", which matches the generic ARMv7-M layout.

use vcell::VolatileCell;

/// Address of a 32-bit register.
///
/// Only the addresses defined in this module can be named outside the crate:
///
/// ```compile_fail
/// let _ = tm4c_nvic_systick::registers::Register(0x2000_0000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register(pub(crate) u32);

impl Register {
    pub const fn address(self) -> u32 {
        self.0
    }

    const fn offset(self, words: usize) -> Register {
        Register(self.0 + (words as u32) * 4)
    }
}

//-----------------------------------------------------------------------------

/// SysTick Control and Status
pub const STCTRL: Register = Register(0xE000_E010);
/// SysTick Reload Value
pub const STRELOAD: Register = Register(0xE000_E014);
/// SysTick Current Value
pub const STCURRENT: Register = Register(0xE000_E018);

const EN0: Register = Register(0xE000_E100);
const DIS0: Register = Register(0xE000_E180);
const PRI0: Register = Register(0xE000_E400);

/// System Handler Priority 1: MemManage, BusFault, UsageFault
pub const SYSPRI1: Register = Register(0xE000_ED18);
/// System Handler Priority 2: SVCall
pub const SYSPRI2: Register = Register(0xE000_ED1C);
/// System Handler Priority 3: DebugMonitor, PendSV, SysTick
pub const SYSPRI3: Register = Register(0xE000_ED20);
/// System Handler Control and State
pub const SYSHNDCTRL: Register = Register(0xE000_ED24);

/// Interrupt 0-31 Set Enable, and the following banks
pub(crate) const fn en(bank: usize) -> Register {
    EN0.offset(bank)
}

/// Interrupt 0-31 Clear Enable, and the following banks
pub(crate) const fn dis(bank: usize) -> Register {
    DIS0.offset(bank)
}

/// Interrupt 0-3 Priority, and the following registers
pub(crate) const fn pri(index: usize) -> Register {
    PRI0.offset(index)
}

//-----------------------------------------------------------------------------

pub mod stctrl {
    /// counter enable
    pub const ENABLE: u32 = 1 << 0;
    /// SysTick exception request on count to 0
    pub const INTEN: u32 = 1 << 1;
    /// 1 - system clock, 0 - PIOSC/4
    pub const CLK_SRC: u32 = 1 << 2;
    /// counted to 0 since last read, cleared by the read
    pub const COUNT: u32 = 1 << 16;
}

pub mod syshndctrl {
    pub const MEM: u32 = 1 << 16;
    pub const BUS: u32 = 1 << 17;
    pub const USAGE: u32 = 1 << 18;
}

//-----------------------------------------------------------------------------

/// Raw 32-bit register access.
///
/// Implementors model the hardware: writes to `ENn`/`DISn` are
/// write-one-to-set/clear, reading `STCTRL` clears `COUNT`.
pub trait RegisterAccess {
    fn read(&self, reg: Register) -> u32;
    fn write(&self, reg: Register, value: u32);

    /// Read-modify-write. Not atomic against interrupts.
    fn modify<F>(&self, reg: Register, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let v = self.read(reg);
        self.write(reg, f(v));
    }

    /// Make previous writes take effect before the next instruction.
    fn barrier(&self) {}
}

impl<T: RegisterAccess> RegisterAccess for &T {
    fn read(&self, reg: Register) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: Register, value: u32) {
        (**self).write(reg, value)
    }

    fn barrier(&self) {
        (**self).barrier()
    }
}

/// Real hardware.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Several handles may exist, e.g. one in an [`InterruptController`]
    /// and one in a [`PeriodicTimer`].
    ///
    /// # Safety
    /// Must run on the target core. Read-modify-write sequences are not
    /// atomic: no two handles may reconfigure the same register (including
    /// `STCTRL` through `disable_exception(SysTick)` and the timer)
    /// concurrently, e.g. from thread code and an interrupt handler.
    ///
    /// [`InterruptController`]: crate::InterruptController
    /// [`PeriodicTimer`]: crate::PeriodicTimer
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn cell(reg: Register) -> &'static VolatileCell<u32> {
        unsafe { &*(reg.address() as usize as *const VolatileCell<u32>) }
    }
}

impl RegisterAccess for Mmio {
    #[inline]
    fn read(&self, reg: Register) -> u32 {
        Self::cell(reg).get()
    }

    #[inline]
    fn write(&self, reg: Register, value: u32) {
        Self::cell(reg).set(value)
    }

    #[inline]
    fn barrier(&self) {
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }
}
