//! Process-wide verbosity gate in front of the `log` facade.
//!
//! The loader distinguishes three levels: `silent` drops everything,
//! `warn` forwards warnings to [`log::warn!`], and `verbose` additionally
//! forwards progress messages to [`log::debug!`]. Whatever passes the gate is
//! still subject to the installed logger's own filter.

use core::fmt::{Display, Formatter, Result as FmtResult};
use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};
use log::warn;
use serde::{Deserialize, Serialize};

/// Loader diagnostic verbosity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No diagnostics.
    Silent,
    /// Warnings only.
    #[default]
    Warn,
    /// Warnings and progress messages.
    Verbose,
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

impl LogLevel {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Silent,
            2 => Self::Verbose,
            _ => Self::Warn,
        }
    }

    /// Lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Warn => "warn",
            Self::Verbose => "verbose",
        }
    }

    /// Parse a level name, falling back to `warn` (with a warning) when the
    /// name is not recognized.
    #[must_use]
    pub fn parse_or_warn(name: &str) -> Self {
        name.parse().unwrap_or_else(|()| {
            warn!("Invalid logging level: {name}. Falling back to 'warn'.");
            Self::Warn
        })
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "warn" => Ok(Self::Warn),
            "verbose" => Ok(Self::Verbose),
            _ => Err(()),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// Set the process-wide loader verbosity.
#[inline]
pub fn set_logging_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Current process-wide loader verbosity.
#[inline]
#[must_use]
pub fn logging_level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

/// Progress message, emitted only at `verbose`.
macro_rules! verbose {
    ($($arg:tt)+) => {
        if $crate::logging::logging_level() == $crate::logging::LogLevel::Verbose {
            ::log::debug!($($arg)+);
        }
    };
}

/// Warning, emitted unless the loader is `silent`.
macro_rules! warning {
    ($($arg:tt)+) => {
        if $crate::logging::logging_level() != $crate::logging::LogLevel::Silent {
            ::log::warn!($($arg)+);
        }
    };
}

pub(crate) use {verbose, warning};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("VERBOSE".parse::<LogLevel>(), Ok(LogLevel::Verbose));
        assert_eq!(" silent ".parse::<LogLevel>(), Ok(LogLevel::Silent));
        assert_eq!("loud".parse::<LogLevel>(), Err(()));
    }

    #[test]
    fn unknown_names_fall_back_to_warn() {
        assert_eq!(LogLevel::parse_or_warn("chatty"), LogLevel::Warn);
        assert_eq!(LogLevel::parse_or_warn("verbose"), LogLevel::Verbose);
    }

    #[test]
    fn levels_round_trip_through_the_atomic() {
        for level in [LogLevel::Silent, LogLevel::Warn, LogLevel::Verbose] {
            assert_eq!(LogLevel::from_u8(level as u8), level);
        }
    }
}
