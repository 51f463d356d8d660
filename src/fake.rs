//! In-memory register file for host tests.

use core::cell::{Cell, RefCell};

use heapless::{FnvIndexMap, Vec};

use crate::config::{IRQ_BANKS, PRI_REGISTERS, SYSTICK_MAX_RELOAD};
use crate::registers::{
    dis, en, pri, stctrl, Register, RegisterAccess, STCTRL, STCURRENT, STRELOAD,
    SYSHNDCTRL, SYSPRI1, SYSPRI2, SYSPRI3,
};

const CAPACITY: usize = 64;

static SYSTEM_REGISTERS: [Register; 7] = [
    SYSPRI1, SYSPRI2, SYSPRI3, SYSHNDCTRL, STCTRL, STRELOAD, STCURRENT,
];

/// Register file that behaves like the parts of the SCS this crate drives:
///
/// * `ENn` and `DISn` share one enable state per bank, writing 1 to `ENn`
///   sets a bit, writing 1 to `DISn` clears it, zeros are ignored;
/// * `STRELOAD` keeps 24 bits, any write to `STCURRENT` clears it;
/// * while `STCTRL.ENABLE` is set every `polls_per_period`-th read of
///   `STCTRL` returns `COUNT`, which the read clears.
///
/// Unwritten registers read as 0.
pub struct FakeRegisters {
    values: RefCell<FnvIndexMap<u32, u32, CAPACITY>>,
    polls_per_period: Cell<u32>,
    polls: Cell<u32>,
    count_flag: Cell<bool>,
    ctrl_reads: Cell<u32>,
}

impl Default for FakeRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self {
            values: RefCell::new(FnvIndexMap::new()),
            polls_per_period: Cell::new(1),
            polls: Cell::new(0),
            count_flag: Cell::new(false),
            ctrl_reads: Cell::new(0),
        }
    }

    /// How many polls of a running counter it takes to reach 0.
    pub fn set_polls_per_period(&self, polls: u32) {
        self.polls_per_period.set(polls.max(1));
    }

    /// Raise `COUNT` as if the counter wrapped right now.
    pub fn expire(&self) {
        self.count_flag.set(true);
    }

    /// Number of `STCTRL` reads so far.
    pub fn ctrl_reads(&self) -> u32 {
        self.ctrl_reads.get()
    }

    /// Stored value, without any read side effects.
    pub fn peek(&self, reg: Register) -> u32 {
        self.values
            .borrow()
            .get(&Self::backing(reg).address())
            .copied()
            .unwrap_or(0)
    }

    /// Store a value bypassing the hardware write semantics.
    pub fn poke(&self, reg: Register, value: u32) {
        self.store(Self::backing(reg), value);
    }

    /// Every register the crate may touch, one entry per backing cell.
    pub fn registers() -> impl Iterator<Item = Register> {
        (0..IRQ_BANKS)
            .map(en)
            .chain((0..PRI_REGISTERS).map(pri))
            .chain(SYSTEM_REGISTERS.iter().copied())
    }

    /// Sorted `(address, value)` pairs of everything stored.
    pub fn snapshot(&self) -> Vec<(u32, u32), CAPACITY> {
        let mut res: Vec<(u32, u32), CAPACITY> = self
            .values
            .borrow()
            .iter()
            .map(|(addr, value)| (*addr, *value))
            .collect();
        res.sort_unstable();
        res
    }

    fn backing(reg: Register) -> Register {
        (0..IRQ_BANKS)
            .find(|bank| dis(*bank) == reg)
            .map(en)
            .unwrap_or(reg)
    }

    fn store(&self, reg: Register, value: u32) {
        // capacity covers every register listed by `registers()`
        let _ = self.values.borrow_mut().insert(reg.address(), value);
    }

    fn poll_ctrl(&self, value: u32) -> u32 {
        self.ctrl_reads.set(self.ctrl_reads.get() + 1);

        if value & stctrl::ENABLE != 0 {
            let polls = self.polls.get() + 1;
            if polls >= self.polls_per_period.get() {
                self.polls.set(0);
                self.count_flag.set(true);
            } else {
                self.polls.set(polls);
            }
        }

        if self.count_flag.replace(false) {
            value | stctrl::COUNT
        } else {
            value
        }
    }
}

impl RegisterAccess for FakeRegisters {
    fn read(&self, reg: Register) -> u32 {
        let value = self.peek(reg);
        if reg == STCTRL {
            self.poll_ctrl(value)
        } else {
            value
        }
    }

    fn write(&self, reg: Register, value: u32) {
        if let Some(bank) = (0..IRQ_BANKS).find(|bank| en(*bank) == reg) {
            self.store(en(bank), self.peek(reg) | value);
        } else if let Some(bank) = (0..IRQ_BANKS).find(|bank| dis(*bank) == reg) {
            self.store(en(bank), self.peek(reg) & !value);
        } else if reg == STCTRL {
            let was = self.peek(STCTRL);
            if was & stctrl::ENABLE == 0 && value & stctrl::ENABLE != 0 {
                self.polls.set(0);
            }
            self.store(STCTRL, value & !stctrl::COUNT);
        } else if reg == STRELOAD {
            self.store(STRELOAD, value & SYSTICK_MAX_RELOAD);
        } else if reg == STCURRENT {
            self.count_flag.set(false);
            self.store(STCURRENT, 0);
        } else {
            self.store(reg, value);
        }
    }
}
