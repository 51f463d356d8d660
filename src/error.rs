use core::fmt;

/// Rejected configuration request. The hardware is left untouched whenever
/// one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// IRQ number above [`crate::config::IRQ_MAX`]
    IrqOutOfRange(u16),
    /// priority above [`crate::config::PRIORITY_MAX`]
    PriorityOutOfRange(u8),
    /// raw exception number that names no configurable exception
    UnknownException(u8),
    /// period shorter than two timer ticks
    PeriodTooShort,
    /// reload value does not fit the 24-bit STRELOAD register
    ReloadOverflow(u64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IrqOutOfRange(irq) => write!(f, "IRQ {} is out of range", irq),
            Error::PriorityOutOfRange(prio) => write!(f, "priority {} is out of range", prio),
            Error::UnknownException(n) => write!(f, "unknown exception number {}", n),
            Error::PeriodTooShort => f.write_str("period is shorter than two timer ticks"),
            Error::ReloadOverflow(reload) => {
                write!(f, "reload value {} does not fit the timer", reload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::string::ToString;

    #[test]
    fn display() {
        assert_eq!(
            Error::IrqOutOfRange(139).to_string(),
            "IRQ 139 is out of range"
        );
        assert_eq!(
            Error::ReloadOverflow(16_777_216).to_string(),
            "reload value 16777216 does not fit the timer"
        );
    }
}
