//! Business-hours gate: may this invocation send at all?
//!
//! [`evaluate`] is a pure function of the instant and the configuration. The
//! wall clock only enters through a [`Clock`], so tests pin time with
//! [`FixedClock`].

use std::fmt;

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset, Weekday};

/// Sending window in UTC hours, `[start_hour, end_hour)`.
///
/// A window with `start_hour >= end_hour` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusinessHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl BusinessHours {
    pub fn contains(&self, hour: u8) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl fmt::Display for BusinessHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:00 - {}:00 UTC", self.start_hour, self.end_hour)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateFlags {
    pub test_mode: bool,
    pub production_mode: bool,
    pub ignore_business_hours: bool,
}

/// Why sending was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// Production mode with the business-hours override.
    ProductionOverride,
    TestMode,
    BusinessHours,
    /// Operator-triggered send; the gate is not consulted.
    Manual,
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductionOverride => write!(f, "production mode, ignoring business hours"),
            Self::TestMode => write!(f, "test mode, ignoring business hours"),
            Self::BusinessHours => write!(f, "business hours"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    #[serde(rename = "weekend")]
    Weekend,
    #[serde(rename = "outside business hours")]
    OutsideBusinessHours,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekend => write!(f, "weekend"),
            Self::OutsideBusinessHours => write!(f, "outside business hours"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Send(SendMode),
    Skip(SkipReason),
}

impl GateDecision {
    pub fn should_send(&self) -> bool {
        matches!(self, Self::Send(_))
    }
}

pub fn is_weekday(weekday: Weekday) -> bool {
    !matches!(weekday, Weekday::Saturday | Weekday::Sunday)
}

/// Decide whether to send at `now`.
///
/// Overrides win in order: production with ignore-hours, then test mode.
/// Otherwise only weekdays inside the window pass. The weekend reason takes
/// precedence over the hour reason.
pub fn evaluate(now: OffsetDateTime, hours: BusinessHours, flags: GateFlags) -> GateDecision {
    if flags.production_mode && flags.ignore_business_hours {
        return GateDecision::Send(SendMode::ProductionOverride);
    }
    if flags.test_mode {
        return GateDecision::Send(SendMode::TestMode);
    }

    let now = now.to_offset(UtcOffset::UTC);
    let weekday = is_weekday(now.weekday());
    match (weekday, hours.contains(now.hour())) {
        (true, true) => GateDecision::Send(SendMode::BusinessHours),
        (false, _) => GateDecision::Skip(SkipReason::Weekend),
        (true, false) => GateDecision::Skip(SkipReason::OutsideBusinessHours),
    }
}

/// Source of the current instant.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
