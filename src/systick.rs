//! SysTick as a periodic timer: interrupt driven with a callback, or a
//! blocking single-period busy-wait.

use core::sync::atomic::{AtomicUsize, Ordering};

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::config::{DEFAULT_SYSCLK_HZ, SYSTICK_MAX_RELOAD};
use crate::error::Error;
use crate::registers::{stctrl, RegisterAccess, STCTRL, STCURRENT, STRELOAD};

/// Requested timer period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Period {
    micros: u64,
}

impl Period {
    pub const fn from_millis(ms: u32) -> Self {
        Self {
            micros: ms as u64 * 1_000,
        }
    }

    pub const fn from_micros(us: u32) -> Self {
        Self { micros: us as u64 }
    }

    pub fn as_micros(&self) -> u64 {
        self.micros
    }

    /// Timer ticks in one period, rounded down.
    pub fn ticks(&self, clock_hz: u32) -> u64 {
        let hz = u64::from(clock_hz);
        // split to stay within u64 for any u32 inputs
        self.micros / 1_000_000 * hz + self.micros % 1_000_000 * hz / 1_000_000
    }

    /// STRELOAD value for this period.
    pub fn reload(&self, clock_hz: u32) -> Result<u32, Error> {
        let ticks = self.ticks(clock_hz);
        if ticks < 2 {
            warn!("period {} us is too short", self.micros);
            return Err(Error::PeriodTooShort);
        }

        let reload = ticks - 1;
        if reload > u64::from(SYSTICK_MAX_RELOAD) {
            warn!("reload {} does not fit STRELOAD", reload);
            return Err(Error::ReloadOverflow(reload));
        }
        Ok(reload as u32)
    }
}

//-----------------------------------------------------------------------------

/// Single callback slot shared between thread mode (writer) and the SysTick
/// handler (reader). One word, so loads and stores never tear.
pub struct CallbackSlot(AtomicUsize);

impl CallbackSlot {
    const EMPTY: usize = 0;

    pub const fn new() -> Self {
        CallbackSlot(AtomicUsize::new(Self::EMPTY))
    }

    pub fn set(&self, callback: Option<fn()>) {
        let raw = callback.map_or(Self::EMPTY, |f| f as usize);
        self.0.store(raw, Ordering::Release);
    }

    pub fn get(&self) -> Option<fn()> {
        match self.0.load(Ordering::Acquire) {
            Self::EMPTY => None,
            // SAFETY: every non-zero value was stored by `set` from a `fn()`
            raw => Some(unsafe { core::mem::transmute::<usize, fn()>(raw) }),
        }
    }
}

impl Default for CallbackSlot {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerMode {
    /// SysTick exception on every period
    Interrupt,
    /// no exception, `COUNT` is polled
    BusyWait,
}

/// SysTick driver.
///
/// All methods take `&self`, so the timer can live in a `static` that both
/// the application and the `SysTick` exception handler reach:
///
/// ```ignore
/// static TIMER: PeriodicTimer<Mmio> =
///     PeriodicTimer::new(unsafe { Mmio::new() }, 80_000_000);
///
/// #[exception]
/// fn SysTick() {
///     TIMER.handler();
/// }
/// ```
pub struct PeriodicTimer<R> {
    regs: R,
    clock_hz: u32,
    callback: CallbackSlot,
}

impl<R> PeriodicTimer<R> {
    /// `clock_hz` - frequency of the system clock feeding the counter.
    pub const fn new(regs: R, clock_hz: u32) -> Self {
        Self {
            regs,
            clock_hz,
            callback: CallbackSlot::new(),
        }
    }

    pub const fn with_default_clock(regs: R) -> Self {
        Self::new(regs, DEFAULT_SYSCLK_HZ)
    }

    pub fn with_callback(regs: R, clock_hz: u32, callback: fn()) -> Self {
        let res = Self::new(regs, clock_hz);
        res.callback.set(Some(callback));
        res
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Replace the callback run by [`PeriodicTimer::handler`]; `None` clears
    /// it. Takes effect at the next SysTick exception.
    pub fn set_callback(&self, callback: Option<fn()>) {
        self.callback.set(callback);
    }

    /// Body of the `SysTick` exception handler.
    pub fn handler(&self) {
        if let Some(callback) = self.callback.get() {
            callback();
        }
    }

    pub fn free(self) -> R {
        self.regs
    }
}

impl<R: RegisterAccess> PeriodicTimer<R> {
    /// Fire the SysTick exception every `period` until stopped.
    pub fn init(&self, period: Period) -> Result<(), Error> {
        let reload = period.reload(self.clock_hz)?;

        self.program(reload);
        self.regs
            .write(STCTRL, stctrl::ENABLE | stctrl::INTEN | stctrl::CLK_SRC);

        debug!("SysTick: every {} us, reload {}", period.as_micros(), reload);
        Ok(())
    }

    /// Block for one `period`, then leave the timer stopped.
    pub fn start_busy_wait(&self, period: Period) -> Result<(), Error> {
        let reload = period.reload(self.clock_hz)?;

        trace!("SysTick: busy-wait {} us", period.as_micros());
        self.wait_ticks(reload);
        Ok(())
    }

    /// Resume the counter with the current configuration.
    pub fn start(&self) {
        self.regs
            .modify(STCTRL, |v| (v | stctrl::ENABLE) & !stctrl::COUNT);
        trace!("SysTick: started");
    }

    /// Pause the counter, configuration is kept.
    pub fn stop(&self) {
        self.regs
            .modify(STCTRL, |v| v & !(stctrl::ENABLE | stctrl::COUNT));
        trace!("SysTick: stopped");
    }

    /// Stop and forget the period. The callback stays registered.
    pub fn deinit(&self) {
        self.stop();
        self.regs.write(STRELOAD, 0);
        self.regs.write(STCURRENT, 0);
        debug!("SysTick: deinit");
    }

    /// Reading the state clears a pending `COUNT` flag.
    pub fn state(&self) -> TimerState {
        if self.regs.read(STCTRL) & stctrl::ENABLE != 0 {
            TimerState::Running
        } else {
            TimerState::Stopped
        }
    }

    /// Reading the mode clears a pending `COUNT` flag.
    pub fn mode(&self) -> TimerMode {
        if self.regs.read(STCTRL) & stctrl::INTEN != 0 {
            TimerMode::Interrupt
        } else {
            TimerMode::BusyWait
        }
    }

    pub fn reload(&self) -> u32 {
        self.regs.read(STRELOAD)
    }

    /// Stopped, reload set, counter cleared. Next start loads `reload`.
    fn program(&self, reload: u32) {
        self.regs.write(STCTRL, 0);
        self.regs.write(STRELOAD, reload);
        self.regs.write(STCURRENT, 0);
    }

    fn wait_ticks(&self, reload: u32) {
        self.program(reload);
        self.regs.write(STCTRL, stctrl::ENABLE | stctrl::CLK_SRC);

        // COUNT is cleared by the read that observes it
        while self.regs.read(STCTRL) & stctrl::COUNT == 0 {}

        self.regs.write(STCTRL, stctrl::CLK_SRC);
    }

    /// Busy-wait `ticks` in chunks the 24-bit counter can hold.
    fn delay_ticks(&self, mut ticks: u64) {
        let chunk = u64::from(SYSTICK_MAX_RELOAD) + 1;

        while ticks >= 2 {
            let now = ticks.min(chunk);
            self.wait_ticks((now - 1) as u32);
            ticks -= now;
        }
    }
}

impl<R: RegisterAccess> DelayUs<u32> for PeriodicTimer<R> {
    fn delay_us(&mut self, us: u32) {
        self.delay_ticks(Period::from_micros(us).ticks(self.clock_hz));
    }
}

impl<R: RegisterAccess> DelayMs<u32> for PeriodicTimer<R> {
    fn delay_ms(&mut self, ms: u32) {
        self.delay_ticks(Period::from_millis(ms).ticks(self.clock_hz));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRegisters;
    use core::sync::atomic::AtomicU32;

    const CLOCK: u32 = 16_000_000;

    fn timer() -> PeriodicTimer<FakeRegisters> {
        PeriodicTimer::new(FakeRegisters::new(), CLOCK)
    }

    #[test]
    fn reload_values() {
        assert_eq!(Period::from_micros(1000).reload(CLOCK), Ok(15_999));
        assert_eq!(Period::from_micros(500).reload(CLOCK), Ok(7_999));
        assert_eq!(Period::from_millis(1).reload(CLOCK), Ok(15_999));
        assert_eq!(Period::from_millis(1000).reload(CLOCK), Ok(15_999_999));
        assert_eq!(Period::from_millis(250).reload(CLOCK), Ok(3_999_999));
    }

    #[test]
    fn unrepresentable_periods() {
        assert_eq!(Period::from_millis(1048).reload(CLOCK), Ok(16_767_999));
        assert_eq!(
            Period::from_millis(1049).reload(CLOCK),
            Err(Error::ReloadOverflow(16_783_999))
        );
        assert_eq!(Period::from_micros(0).reload(CLOCK), Err(Error::PeriodTooShort));
        assert_eq!(Period::from_micros(1).reload(1_000_000), Err(Error::PeriodTooShort));
        assert_eq!(Period::from_micros(2).reload(1_000_000), Ok(1));
    }

    #[test]
    fn init_programs_interrupt_mode() {
        let t = timer();
        t.regs.poke(STCURRENT, 777);

        t.init(Period::from_micros(1000)).unwrap();

        assert_eq!(t.regs.peek(STRELOAD), 15_999);
        assert_eq!(t.regs.peek(STCURRENT), 0);
        assert_eq!(
            t.regs.peek(STCTRL),
            stctrl::ENABLE | stctrl::INTEN | stctrl::CLK_SRC
        );
        assert_eq!(t.state(), TimerState::Running);
        assert_eq!(t.mode(), TimerMode::Interrupt);

        t.init(Period::from_micros(500)).unwrap();
        assert_eq!(t.reload(), 7_999);
    }

    #[test]
    fn rejected_period_keeps_running_timer() {
        let t = timer();
        t.init(Period::from_millis(10)).unwrap();
        let before = t.regs.snapshot();

        assert_eq!(
            t.init(Period::from_millis(5000)),
            Err(Error::ReloadOverflow(79_999_999))
        );
        assert_eq!(
            t.start_busy_wait(Period::from_micros(0)),
            Err(Error::PeriodTooShort)
        );

        assert_eq!(t.regs.snapshot(), before);
    }

    #[test]
    fn busy_wait_returns_after_expiry_and_stops() {
        let t = timer();
        t.regs.set_polls_per_period(25);

        t.start_busy_wait(Period::from_millis(100)).unwrap();

        assert_eq!(t.regs.ctrl_reads(), 25);
        assert_eq!(t.regs.peek(STRELOAD), 1_599_999);
        assert_eq!(t.regs.peek(STCTRL) & stctrl::ENABLE, 0);
        assert_eq!(t.regs.peek(STCTRL) & stctrl::INTEN, 0);
        assert_eq!(t.state(), TimerState::Stopped);
    }

    #[test]
    fn busy_wait_after_init_drops_interrupt_mode() {
        let t = timer();
        t.init(Period::from_millis(1)).unwrap();

        t.start_busy_wait(Period::from_millis(2)).unwrap();

        assert_eq!(t.mode(), TimerMode::BusyWait);
        assert_eq!(t.state(), TimerState::Stopped);
    }

    #[test]
    fn start_stop_keep_configuration() {
        let t = timer();
        t.init(Period::from_millis(2)).unwrap();

        t.stop();
        assert_eq!(t.state(), TimerState::Stopped);
        assert_eq!(t.regs.peek(STCTRL), stctrl::INTEN | stctrl::CLK_SRC);
        assert_eq!(t.reload(), 31_999);

        t.start();
        assert_eq!(
            t.regs.peek(STCTRL),
            stctrl::ENABLE | stctrl::INTEN | stctrl::CLK_SRC
        );
        assert_eq!(t.reload(), 31_999);
    }

    #[test]
    fn deinit_from_any_state() {
        let t = timer();
        t.deinit();
        assert_eq!(t.regs.peek(STRELOAD), 0);
        assert_eq!(t.regs.peek(STCURRENT), 0);
        assert_eq!(t.state(), TimerState::Stopped);

        t.init(Period::from_millis(1)).unwrap();
        t.regs.poke(STCURRENT, 1234);
        t.deinit();
        assert_eq!(t.regs.peek(STRELOAD), 0);
        assert_eq!(t.regs.peek(STCURRENT), 0);
        assert_eq!(t.regs.peek(STCTRL) & stctrl::ENABLE, 0);
    }

    static FIRED: AtomicU32 = AtomicU32::new(0);

    fn on_tick() {
        FIRED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn handler_runs_callback_once_per_interrupt() {
        let t = timer();
        t.handler();
        assert_eq!(FIRED.load(Ordering::SeqCst), 0);

        t.set_callback(Some(on_tick));
        t.init(Period::from_millis(1)).unwrap();
        t.handler();
        assert_eq!(FIRED.load(Ordering::SeqCst), 1);
        t.handler();
        assert_eq!(FIRED.load(Ordering::SeqCst), 2);

        // survives deinit, cleared only explicitly
        t.deinit();
        t.handler();
        assert_eq!(FIRED.load(Ordering::SeqCst), 3);

        t.set_callback(None);
        t.handler();
        assert_eq!(FIRED.load(Ordering::SeqCst), 3);
    }

    static REPLACED_A: AtomicU32 = AtomicU32::new(0);
    static REPLACED_B: AtomicU32 = AtomicU32::new(0);

    #[test]
    fn callback_is_replaced() {
        fn a() {
            REPLACED_A.fetch_add(1, Ordering::SeqCst);
        }
        fn b() {
            REPLACED_B.fetch_add(1, Ordering::SeqCst);
        }

        let t = PeriodicTimer::with_callback(FakeRegisters::new(), CLOCK, a);
        t.handler();
        t.set_callback(Some(b));
        t.set_callback(Some(b));
        t.handler();

        assert_eq!(REPLACED_A.load(Ordering::SeqCst), 1);
        assert_eq!(REPLACED_B.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_handler_touches_nothing() {
        let t = timer();
        t.init(Period::from_millis(1)).unwrap();
        let before = t.regs.snapshot();

        t.handler();

        assert_eq!(t.regs.snapshot(), before);
        assert_eq!(t.regs.ctrl_reads(), 0);
    }

    #[test]
    fn long_delay_is_split() {
        let mut t = PeriodicTimer::new(FakeRegisters::new(), 1_000_000);

        // 20 s at 1 MHz: one full 2^24 chunk and the rest
        t.delay_ms(20_000);
        assert_eq!(t.regs.ctrl_reads(), 2);
        assert_eq!(t.reload(), 20_000_000 - (1 << 24) - 1);
        assert_eq!(t.state(), TimerState::Stopped);
    }

    #[test]
    fn tiny_delay_is_skipped() {
        let mut t = PeriodicTimer::new(FakeRegisters::new(), 1_000_000);
        t.delay_us(1);
        assert_eq!(t.regs.ctrl_reads(), 0);

        t.delay_us(10);
        assert_eq!(t.regs.ctrl_reads(), 1);
        assert_eq!(t.reload(), 9);
    }

    #[test]
    fn huge_periods_do_not_overflow() {
        let p = Period::from_millis(u32::MAX);
        assert_eq!(p.ticks(u32::MAX), 18_446_744_065_119_617);
        assert_eq!(Period::from_micros(1_500_000).ticks(CLOCK), 24_000_000);
    }

    #[test]
    fn free_returns_the_registers() {
        let t = timer();
        t.init(Period::from_millis(1)).unwrap();

        let regs = t.free();
        assert_eq!(regs.peek(STRELOAD), 15_999);
        assert_eq!(regs.peek(STCTRL) & stctrl::INTEN, stctrl::INTEN);
        assert_eq!(regs.ctrl_reads(), 0);
    }

    #[test]
    fn default_clock() {
        let t = PeriodicTimer::with_default_clock(FakeRegisters::new());
        assert_eq!(t.clock_hz(), DEFAULT_SYSCLK_HZ);
    }
}
