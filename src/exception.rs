//! Processor exceptions: fault handler enables and system handler priorities.

use core::convert::TryFrom;

use crate::error::Error;
use crate::nvic::{InterruptController, Priority};
use crate::registers::{
    stctrl, syshndctrl, Register, RegisterAccess, STCTRL, SYSHNDCTRL, SYSPRI1, SYSPRI2, SYSPRI3,
};

/// System exceptions, numbered as in the vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Exception {
    Reset = 1,
    Nmi = 2,
    HardFault = 3,
    MemManage = 4,
    BusFault = 5,
    UsageFault = 6,
    SvCall = 11,
    DebugMonitor = 12,
    PendSv = 14,
    SysTick = 15,
}

impl Exception {
    pub const ALL: [Exception; 10] = [
        Exception::Reset,
        Exception::Nmi,
        Exception::HardFault,
        Exception::MemManage,
        Exception::BusFault,
        Exception::UsageFault,
        Exception::SvCall,
        Exception::DebugMonitor,
        Exception::PendSv,
        Exception::SysTick,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Whether software can enable or disable this exception at all.
    pub fn is_switchable(self) -> bool {
        !matches!(self.info().control, Control::AlwaysOn)
    }

    /// Whether the priority is fixed by the architecture.
    pub fn has_fixed_priority(self) -> bool {
        self.info().priority.is_none()
    }

    fn info(self) -> &'static Info {
        match self {
            Exception::Reset => &EXCEPTIONS[0],
            Exception::Nmi => &EXCEPTIONS[1],
            Exception::HardFault => &EXCEPTIONS[2],
            Exception::MemManage => &EXCEPTIONS[3],
            Exception::BusFault => &EXCEPTIONS[4],
            Exception::UsageFault => &EXCEPTIONS[5],
            Exception::SvCall => &EXCEPTIONS[6],
            Exception::DebugMonitor => &EXCEPTIONS[7],
            Exception::PendSv => &EXCEPTIONS[8],
            Exception::SysTick => &EXCEPTIONS[9],
        }
    }
}

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Exception::ALL
            .iter()
            .copied()
            .find(|e| e.number() == number)
            .ok_or(Error::UnknownException(number))
    }
}

//-----------------------------------------------------------------------------

enum Control {
    /// no enable bit in hardware
    AlwaysOn,
    /// bit in SYSHNDCTRL
    HandlerEnable(u32),
    /// STCTRL.INTEN, set by the timer itself on init
    SysTickInterrupt,
}

struct PriorityField {
    reg: Register,
    offset: u32,
}

impl PriorityField {
    fn mask(&self) -> u32 {
        Priority::field_mask() << self.offset
    }
}

struct Info {
    control: Control,
    priority: Option<PriorityField>,
}

// Same order as `Exception::ALL`
static EXCEPTIONS: [Info; 10] = [
    // Reset
    Info {
        control: Control::AlwaysOn,
        priority: None,
    },
    // NMI
    Info {
        control: Control::AlwaysOn,
        priority: None,
    },
    // HardFault
    Info {
        control: Control::AlwaysOn,
        priority: None,
    },
    // MemManage: SYSPRI1[7:5]
    Info {
        control: Control::HandlerEnable(syshndctrl::MEM),
        priority: Some(PriorityField {
            reg: SYSPRI1,
            offset: 5,
        }),
    },
    // BusFault: SYSPRI1[15:13]
    Info {
        control: Control::HandlerEnable(syshndctrl::BUS),
        priority: Some(PriorityField {
            reg: SYSPRI1,
            offset: 13,
        }),
    },
    // UsageFault: SYSPRI1[23:21]
    Info {
        control: Control::HandlerEnable(syshndctrl::USAGE),
        priority: Some(PriorityField {
            reg: SYSPRI1,
            offset: 21,
        }),
    },
    // SVCall: SYSPRI2[31:29]
    Info {
        control: Control::AlwaysOn,
        priority: Some(PriorityField {
            reg: SYSPRI2,
            offset: 29,
        }),
    },
    // DebugMonitor: SYSPRI3[7:5]
    Info {
        control: Control::AlwaysOn,
        priority: Some(PriorityField {
            reg: SYSPRI3,
            offset: 5,
        }),
    },
    // PendSV: SYSPRI3[23:21]
    Info {
        control: Control::AlwaysOn,
        priority: Some(PriorityField {
            reg: SYSPRI3,
            offset: 21,
        }),
    },
    // SysTick: SYSPRI3[31:29]
    Info {
        control: Control::SysTickInterrupt,
        priority: Some(PriorityField {
            reg: SYSPRI3,
            offset: 29,
        }),
    },
];

//-----------------------------------------------------------------------------

impl<R: RegisterAccess> InterruptController<R> {
    /// Exceptions without an enable bit are left as they are.
    pub fn enable_exception(&self, exception: Exception) {
        match exception.info().control {
            Control::HandlerEnable(bit) => {
                self.regs.modify(SYSHNDCTRL, |v| v | bit);
                self.regs.barrier();
                trace!("exception {} enabled", exception);
            }
            // STCTRL.INTEN is owned by the timer
            Control::SysTickInterrupt | Control::AlwaysOn => {
                trace!("exception {} has no enable control", exception);
            }
        }
    }

    /// Exceptions without an enable bit are left as they are.
    pub fn disable_exception(&self, exception: Exception) {
        match exception.info().control {
            Control::HandlerEnable(bit) => {
                self.regs.modify(SYSHNDCTRL, |v| v & !bit);
                self.regs.barrier();
                trace!("exception {} disabled", exception);
            }
            Control::SysTickInterrupt => {
                // COUNT is read-only
                self.regs
                    .modify(STCTRL, |v| v & !(stctrl::INTEN | stctrl::COUNT));
                trace!("exception {} disabled", exception);
            }
            Control::AlwaysOn => {
                trace!("exception {} has no enable control", exception);
            }
        }
    }

    /// `None` for exceptions without an enable bit. Querying SysTick reads
    /// `STCTRL` and so clears its `COUNT` flag.
    pub fn is_exception_enabled(&self, exception: Exception) -> Option<bool> {
        match exception.info().control {
            Control::HandlerEnable(bit) => Some(self.regs.read(SYSHNDCTRL) & bit != 0),
            Control::SysTickInterrupt => Some(self.regs.read(STCTRL) & stctrl::INTEN != 0),
            Control::AlwaysOn => None,
        }
    }

    /// Exceptions with an architecturally fixed priority are left as they
    /// are, whatever `priority` is.
    pub fn set_priority_exception(&self, exception: Exception, priority: u8) -> Result<(), Error> {
        let field = match &exception.info().priority {
            Some(field) => field,
            None => {
                trace!("exception {} has a fixed priority", exception);
                return Ok(());
            }
        };

        let priority = Priority::try_from(priority)?;
        let mask = field.mask();
        self.regs.modify(field.reg, |v| {
            (v & !mask) | ((u32::from(priority.value()) << field.offset) & mask)
        });
        trace!("exception {} priority {}", exception, priority.value());
        Ok(())
    }

    /// `None` for exceptions with a fixed priority.
    pub fn exception_priority(&self, exception: Exception) -> Option<Priority> {
        exception
            .info()
            .priority
            .as_ref()
            .map(|field| Priority::from_field(self.regs.read(field.reg) >> field.offset))
    }

    /// Raw exception number variants, for callers that carry vector numbers.
    pub fn enable_exception_raw(&self, number: u8) -> Result<(), Error> {
        Exception::try_from(number).map(|e| self.enable_exception(e))
    }

    pub fn disable_exception_raw(&self, number: u8) -> Result<(), Error> {
        Exception::try_from(number).map(|e| self.disable_exception(e))
    }

    pub fn set_priority_exception_raw(&self, number: u8, priority: u8) -> Result<(), Error> {
        self.set_priority_exception(Exception::try_from(number)?, priority)
    }
}
