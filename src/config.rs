// see: TM4C123GH6PM datasheet, table 2-9 "Interrupts"
pub const IRQ_COUNT: u16 = 139;

/// highest valid IRQ number
pub const IRQ_MAX: u16 = IRQ_COUNT - 1;

/// number of implemented EN/DIS register banks
pub const IRQ_BANKS: usize = ((IRQ_COUNT as usize) + 31) / 32;

/// number of implemented PRIn registers
pub const PRI_REGISTERS: usize = ((IRQ_COUNT as usize) + 3) / 4;

//-----------------------------------------------------------------------------

/// implemented priority bits, the top ones of every byte lane
pub const PRIORITY_BITS: u32 = 3;

/// lowest urgency priority
pub const PRIORITY_MAX: u8 = (1 << PRIORITY_BITS) - 1;

//-----------------------------------------------------------------------------

/// width of STRELOAD / STCURRENT
pub const SYSTICK_COUNTER_BITS: u32 = 24;

/// largest value STRELOAD can hold
pub const SYSTICK_MAX_RELOAD: u32 = (1 << SYSTICK_COUNTER_BITS) - 1;

/// PIOSC, the clock the core runs from out of reset
pub const DEFAULT_SYSCLK_HZ: u32 = 16_000_000;
