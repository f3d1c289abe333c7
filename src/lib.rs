//! A time zone rules engine.
//!
//! Zone rules describe how a zone's offset from UTC varies over time.
//! The model has two halves: a list of historic [`Transition`]s for the
//! past, and up to sixteen recurring [`TransitionRule`]s describing the
//! cycle the zone repeats forever, such as the EU summer time pattern.
//!
//! [`ZoneRules`] is the immutable query surface. It resolves instants
//! to offsets and local date-times to offsets, gaps, or overlaps, and
//! can walk the transition sequence in either direction.
//!
//! [`ZoneRulesBuilder`] constructs rules from a window/rule description
//! of a zone's history, and [`ZoneRulesProvider`] abstracts lookup by
//! zone identifier.
//!
//! ```
//! use zonerules_rs::{
//!     LocalTime, Month, TimeDefinition, UtcOffset, Weekday, ZoneRulesBuilder, YEAR_MAX,
//! };
//!
//! let mut builder = ZoneRulesBuilder::new();
//! builder.add_window_forever(UtcOffset::from_hours(1))?;
//! builder.add_rule_to_window(
//!     1996, YEAR_MAX, Month::Mar, -1, Some(Weekday::Sun),
//!     LocalTime::of(1, 0, 0), false, TimeDefinition::Utc, 3600,
//! )?;
//! builder.add_rule_to_window(
//!     1996, YEAR_MAX, Month::Oct, -1, Some(Weekday::Sun),
//!     LocalTime::of(1, 0, 0), false, TimeDefinition::Utc, 0,
//! )?;
//! let rules = builder.to_rules("Europe/Paris")?;
//! assert_eq!(rules.transition_rules().len(), 2);
//! # Ok::<(), zonerules_rs::ZoneRulesError>(())
//! ```

use core::fmt;

mod builder;
mod provider;
mod rules;
mod transition;
mod types;
pub(crate) mod utils;

pub use builder::ZoneRulesBuilder;
pub use provider::{InMemoryProvider, ZoneRulesProvider};
pub use rules::{OffsetResolution, ZoneRules};
pub use transition::{Transition, TransitionRule};
pub use types::{
    Duration, Instant, LocalDate, LocalDateTime, LocalTime, Month, TimeDefinition, UtcOffset,
    Weekday, YEAR_MAX, YEAR_MIN,
};

/// The error type for building and querying zone rules.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ZoneRulesError {
    /// A builder was compiled without any windows.
    NoWindows,
    /// A rule or fixed savings was added before any window.
    NoActiveWindow,
    /// A window was added ending before the previous window.
    WindowOrder {
        end: LocalDateTime,
        previous_end: LocalDateTime,
    },
    /// Fixed savings were set on a window that already carries rules.
    WindowHasRules,
    /// A rule was added to a window with fixed savings.
    WindowHasFixedSavings,
    /// A window exceeded its expanded rule capacity.
    WindowRuleCapExceeded,
    /// A window carried exactly one forever-recurring rule.
    OneRuleForever,
    /// More recurring rules than a zone may hold.
    TooManyTransitionRules,
    /// A day-of-month indicator outside `-28..=31` or zero.
    InvalidDayOfMonthIndicator(i8),
    /// A year outside the supported range.
    InvalidYear(i32),
    /// An end-of-day rule with a time other than midnight.
    InvalidEndOfDayTime,
    /// A zone identifier unknown to the provider.
    UnknownZoneId(String),
    /// A zone identifier registered twice with different rules.
    DuplicateZoneId(String),
}

impl fmt::Display for ZoneRulesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWindows => write!(f, "no windows have been added to the builder"),
            Self::NoActiveWindow => write!(f, "a window must be added before adding a rule"),
            Self::WindowOrder { end, previous_end } => write!(
                f,
                "windows must be added in date-time order: {end} < {previous_end}"
            ),
            Self::WindowHasRules => {
                write!(f, "window has DST rules, so cannot have fixed savings")
            }
            Self::WindowHasFixedSavings => {
                write!(f, "window has fixed savings, so cannot have DST rules")
            }
            Self::WindowRuleCapExceeded => {
                write!(f, "window has reached the maximum number of allowed rules")
            }
            Self::OneRuleForever => {
                write!(f, "cannot have only one rule defined as being forever")
            }
            Self::TooManyTransitionRules => write!(f, "too many transition rules"),
            Self::InvalidDayOfMonthIndicator(dom) => write!(
                f,
                "day-of-month indicator must be between -28 and 31 inclusive excluding zero, was {dom}"
            ),
            Self::InvalidYear(year) => write!(f, "year {year} is out of range"),
            Self::InvalidEndOfDayTime => {
                write!(f, "time must be midnight when the end-of-day flag is set")
            }
            Self::UnknownZoneId(id) => write!(f, "unknown zone identifier: {id}"),
            Self::DuplicateZoneId(id) => {
                write!(f, "zone identifier registered twice with different rules: {id}")
            }
        }
    }
}

impl std::error::Error for ZoneRulesError {}
