//! Discontinuities in the local time-line.
//!
//! A [`Transition`] records a single historic change of wall offset. A
//! [`TransitionRule`] describes an annually recurring change, such as
//! "the last Sunday of March at 01:00 UTC", and can be expanded into
//! the concrete [`Transition`] for any year.

use core::cmp::Ordering;
use core::fmt;

use crate::types::{
    Duration, LocalDate, LocalDateTime, LocalTime, Month, TimeDefinition, UtcOffset, Weekday,
};
use crate::ZoneRulesError;

/// A change of wall offset at one instant.
///
/// When the offset increases, local clocks jump forward and a span of
/// local date-times never occurs (a gap). When it decreases, clocks
/// fall back and a span occurs twice (an overlap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    epoch_second: i64,
    offset_before: UtcOffset,
    offset_after: UtcOffset,
}

impl Transition {
    pub fn new(epoch_second: i64, offset_before: UtcOffset, offset_after: UtcOffset) -> Self {
        Self {
            epoch_second,
            offset_before,
            offset_after,
        }
    }

    /// The instant of the transition, equal to the first instant at
    /// which the new offset applies.
    pub const fn epoch_second(self) -> i64 {
        self.epoch_second
    }

    pub const fn offset_before(self) -> UtcOffset {
        self.offset_before
    }

    pub const fn offset_after(self) -> UtcOffset {
        self.offset_after
    }

    /// The local date-time immediately before the transition, expressed
    /// in the old offset.
    pub fn date_time_before(self) -> LocalDateTime {
        LocalDateTime::from_epoch_second(self.epoch_second, self.offset_before)
    }

    /// The local date-time the clock shows once the transition has
    /// happened, expressed in the new offset. Represents the same
    /// instant as [`Self::date_time_before`].
    pub fn date_time_after(self) -> LocalDateTime {
        LocalDateTime::from_epoch_second(self.epoch_second, self.offset_after)
    }

    /// The size of the discontinuity, positive for gaps and negative
    /// for overlaps.
    pub fn duration(self) -> Duration {
        Duration::from_seconds(
            (self.offset_after.seconds() - self.offset_before.seconds()) as i64,
        )
    }

    pub fn is_gap(self) -> bool {
        self.offset_after.seconds() > self.offset_before.seconds()
    }

    pub fn is_overlap(self) -> bool {
        self.offset_after.seconds() < self.offset_before.seconds()
    }

    /// The offsets a local date-time inside this transition can
    /// validly resolve to: empty for a gap, both offsets for an
    /// overlap.
    pub fn valid_offsets(self) -> Vec<UtcOffset> {
        if self.is_gap() {
            Vec::new()
        } else {
            vec![self.offset_before, self.offset_after]
        }
    }

    pub fn is_valid_offset(self, offset: UtcOffset) -> bool {
        !self.is_gap() && (self.offset_before == offset || self.offset_after == offset)
    }
}

impl PartialOrd for Transition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Transition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch_second.cmp(&other.epoch_second)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transition[{} at {} {} to {}]",
            if self.is_gap() { "gap" } else { "overlap" },
            self.date_time_before(),
            self.offset_before,
            self.offset_after,
        )
    }
}

/// Resolves a rule's day-of-month and day-of-week pattern to a
/// concrete date.
///
/// A positive `dom` names a day of month, adjusted forwards to `dow`
/// when one is given. A negative `dom` counts back from the end of the
/// month, `-1` being the last day, adjusted backwards to `dow`.
pub(crate) fn resolve_rule_date(year: i32, month: Month, dom: i8, dow: Option<Weekday>) -> LocalDate {
    if dom < 0 {
        let leap = crate::utils::in_leap_year(year);
        let day = month.length(leap) as i16 + 1 + dom as i16;
        let date = LocalDate::new(year, month, day as u8);
        match dow {
            Some(dow) => date.previous_or_same(dow),
            None => date,
        }
    } else {
        let date = LocalDate::new(year, month, dom as u8);
        match dow {
            Some(dow) => date.next_or_same(dow),
            None => date,
        }
    }
}

/// An annually recurring offset change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionRule {
    month: Month,
    day_of_month_indicator: i8,
    day_of_week: Option<Weekday>,
    time: LocalTime,
    adjust_days: i32,
    time_definition: TimeDefinition,
    standard_offset: UtcOffset,
    offset_before: UtcOffset,
    offset_after: UtcOffset,
}

impl TransitionRule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        month: Month,
        day_of_month_indicator: i8,
        day_of_week: Option<Weekday>,
        time: LocalTime,
        adjust_days: i32,
        time_definition: TimeDefinition,
        standard_offset: UtcOffset,
        offset_before: UtcOffset,
        offset_after: UtcOffset,
    ) -> Result<Self, ZoneRulesError> {
        if day_of_month_indicator == 0
            || !(-28..=31).contains(&day_of_month_indicator)
        {
            return Err(ZoneRulesError::InvalidDayOfMonthIndicator(
                day_of_month_indicator,
            ));
        }
        if adjust_days != 0 && time != LocalTime::MIDNIGHT {
            return Err(ZoneRulesError::InvalidEndOfDayTime);
        }
        Ok(Self {
            month,
            day_of_month_indicator,
            day_of_week,
            time,
            adjust_days,
            time_definition,
            standard_offset,
            offset_before,
            offset_after,
        })
    }

    pub const fn month(self) -> Month {
        self.month
    }

    pub const fn day_of_month_indicator(self) -> i8 {
        self.day_of_month_indicator
    }

    pub const fn day_of_week(self) -> Option<Weekday> {
        self.day_of_week
    }

    pub const fn time(self) -> LocalTime {
        self.time
    }

    /// Whether the rule fires at 24:00, the midnight ending the named
    /// day rather than starting it.
    pub const fn is_midnight_end_of_day(self) -> bool {
        self.adjust_days == 1
    }

    pub const fn time_definition(self) -> TimeDefinition {
        self.time_definition
    }

    pub const fn standard_offset(self) -> UtcOffset {
        self.standard_offset
    }

    pub const fn offset_before(self) -> UtcOffset {
        self.offset_before
    }

    pub const fn offset_after(self) -> UtcOffset {
        self.offset_after
    }

    /// Expands this rule into the concrete transition for `year`.
    pub fn create_transition(self, year: i32) -> Transition {
        let date = resolve_rule_date(year, self.month, self.day_of_month_indicator, self.day_of_week);
        let local = LocalDateTime::new(date, self.time).plus_seconds(
            self.adjust_days as i64 * crate::utils::SECS_PER_DAY,
        );
        let wall = self
            .time_definition
            .create_date_time(local, self.standard_offset, self.offset_before);
        Transition::new(
            wall.to_epoch_second(self.offset_before),
            self.offset_before,
            self.offset_after,
        )
    }
}

impl fmt::Display for TransitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransitionRule[{} to {}, ", self.offset_before, self.offset_after)?;
        match (self.day_of_month_indicator, self.day_of_week) {
            (dom, Some(dow)) if dom < 0 => {
                write!(f, "{dow:?} on or before day {dom} of {:?}", self.month)?
            }
            (dom, Some(dow)) => {
                write!(f, "{dow:?} on or after day {dom} of {:?}", self.month)?
            }
            (dom, None) => write!(f, "day {dom} of {:?}", self.month)?,
        }
        if self.is_midnight_end_of_day() {
            write!(f, " at 24:00")?;
        } else {
            write!(f, " at {}", self.time)?;
        }
        write!(f, " {:?}]", self.time_definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_sunday_march_rule() -> TransitionRule {
        TransitionRule::new(
            Month::Mar,
            -1,
            Some(Weekday::Sun),
            LocalTime::of(1, 0, 0),
            0,
            TimeDefinition::Utc,
            UtcOffset::from_hours(1),
            UtcOffset::from_hours(1),
            UtcOffset::from_hours(2),
        )
        .unwrap()
    }

    #[test]
    fn gap_and_overlap_classification() {
        let gap = Transition::new(
            1_206_835_200,
            UtcOffset::from_hours(1),
            UtcOffset::from_hours(2),
        );
        assert!(gap.is_gap());
        assert!(!gap.is_overlap());
        assert!(gap.valid_offsets().is_empty());
        assert!(!gap.is_valid_offset(UtcOffset::from_hours(1)));
        assert_eq!(gap.duration(), Duration::from_seconds(3600));
        assert_eq!(
            gap.date_time_before(),
            LocalDateTime::of(2008, Month::Mar, 30, 1, 0, 0)
        );
        assert_eq!(
            gap.date_time_after(),
            LocalDateTime::of(2008, Month::Mar, 30, 2, 0, 0)
        );

        let overlap = Transition::new(
            1_224_975_600,
            UtcOffset::from_hours(2),
            UtcOffset::from_hours(1),
        );
        assert!(overlap.is_overlap());
        assert_eq!(
            overlap.valid_offsets(),
            vec![UtcOffset::from_hours(2), UtcOffset::from_hours(1)]
        );
        assert!(overlap.is_valid_offset(UtcOffset::from_hours(1)));
        assert!(!overlap.is_valid_offset(UtcOffset::from_hours(3)));
        assert_eq!(overlap.duration(), Duration::from_seconds(-3600));
    }

    #[test]
    fn rule_date_resolution() {
        // last Sunday of March 2008 is the 30th
        assert_eq!(
            resolve_rule_date(2008, Month::Mar, -1, Some(Weekday::Sun)),
            LocalDate::new(2008, Month::Mar, 30)
        );
        // first Sunday on or after March 25th
        assert_eq!(
            resolve_rule_date(2008, Month::Mar, 25, Some(Weekday::Sun)),
            LocalDate::new(2008, Month::Mar, 30)
        );
        // plain day of month
        assert_eq!(
            resolve_rule_date(2008, Month::Feb, -1, None),
            LocalDate::new(2008, Month::Feb, 29)
        );
    }

    #[test]
    fn rule_expansion() {
        let rule = last_sunday_march_rule();
        let transition = rule.create_transition(2008);
        // 2008-03-30T01:00Z
        assert_eq!(transition.epoch_second(), 1_206_838_800);
        assert_eq!(transition.offset_before(), UtcOffset::from_hours(1));
        assert_eq!(transition.offset_after(), UtcOffset::from_hours(2));
        assert!(transition.is_gap());

        // 2009-03-29T01:00Z
        let next = rule.create_transition(2009);
        assert_eq!(
            next.date_time_before(),
            LocalDateTime::of(2009, Month::Mar, 29, 2, 0, 0)
        );
    }

    #[test]
    fn rule_validation() {
        let bad_dom = TransitionRule::new(
            Month::Mar,
            0,
            None,
            LocalTime::MIDNIGHT,
            0,
            TimeDefinition::Wall,
            UtcOffset::UTC,
            UtcOffset::UTC,
            UtcOffset::from_hours(1),
        );
        assert!(matches!(
            bad_dom,
            Err(ZoneRulesError::InvalidDayOfMonthIndicator(0))
        ));

        let bad_end_of_day = TransitionRule::new(
            Month::Mar,
            1,
            None,
            LocalTime::of(1, 0, 0),
            1,
            TimeDefinition::Wall,
            UtcOffset::UTC,
            UtcOffset::UTC,
            UtcOffset::from_hours(1),
        );
        assert!(matches!(
            bad_end_of_day,
            Err(ZoneRulesError::InvalidEndOfDayTime)
        ));
    }
}
