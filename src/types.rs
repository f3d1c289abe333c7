//! Value types consumed by the zone rules engine.
//!
//! These are deliberately small: an offset is a second count, a local
//! date-time is a civil date plus a second-of-day, and an instant is an
//! epoch second with a nanosecond adjustment. The engine only needs
//! comparison, second arithmetic, and epoch conversion under an offset.

use core::fmt;

use crate::utils;

/// The minimum supported year.
pub const YEAR_MIN: i32 = -999_999_999;
/// The maximum supported year, also used as the "forever" marker for
/// open-ended recurring rules.
pub const YEAR_MAX: i32 = 999_999_999;

/// An offset from UTC in seconds, positive east of Greenwich.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcOffset(i32);

impl UtcOffset {
    pub const UTC: UtcOffset = UtcOffset(0);

    pub const fn from_seconds(seconds: i32) -> Self {
        Self(seconds)
    }

    pub const fn from_hours(hours: i32) -> Self {
        Self(hours * 3600)
    }

    /// Builds an offset from hour/minute/second components, which must
    /// share a sign.
    pub const fn from_hms(hours: i32, minutes: i32, seconds: i32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    pub const fn seconds(self) -> i32 {
        self.0
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "Z");
        }
        let sign = if self.0 < 0 { '-' } else { '+' };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{:02}:{:02}", abs / 3600, abs % 3600 / 60)?;
        if abs % 60 != 0 {
            write!(f, ":{:02}", abs % 60)?;
        }
        Ok(())
    }
}

/// A signed span of time in whole seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    seconds: i64,
}

impl Duration {
    pub const ZERO: Duration = Duration { seconds: 0 };

    pub const fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    pub const fn seconds(self) -> i64 {
        self.seconds
    }

    pub const fn is_zero(self) -> bool {
        self.seconds == 0
    }
}

/// A point on the UTC timeline: an epoch second plus a nanosecond
/// adjustment within that second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    epoch_second: i64,
    nano: u32,
}

impl Instant {
    pub const fn from_epoch_second(epoch_second: i64) -> Self {
        Self {
            epoch_second,
            nano: 0,
        }
    }

    pub const fn new(epoch_second: i64, nano: u32) -> Self {
        Self { epoch_second, nano }
    }

    pub const fn epoch_second(self) -> i64 {
        self.epoch_second
    }

    pub const fn nano(self) -> u32 {
        self.nano
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Month {
    Jan = 1,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub fn from_number(n: u8) -> Option<Month> {
        use Month::*;
        Some(match n {
            1 => Jan,
            2 => Feb,
            3 => Mar,
            4 => Apr,
            5 => May,
            6 => Jun,
            7 => Jul,
            8 => Aug,
            9 => Sep,
            10 => Oct,
            11 => Nov,
            12 => Dec,
            _ => return None,
        })
    }

    pub const fn number(self) -> u8 {
        self as u8
    }

    /// The length of the month in days for a (non-)leap year.
    pub const fn length(self, leap_year: bool) -> u8 {
        match self {
            Month::Feb => {
                if leap_year {
                    29
                } else {
                    28
                }
            }
            Month::Apr | Month::Jun | Month::Sep | Month::Nov => 30,
            _ => 31,
        }
    }

    /// The longest possible length of the month.
    pub const fn max_length(self) -> u8 {
        self.length(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Weekday {
    Mon = 1,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// A wall clock time as a second-of-day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalTime {
    second_of_day: u32,
}

impl LocalTime {
    pub const MIDNIGHT: LocalTime = LocalTime { second_of_day: 0 };

    pub const fn of(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            second_of_day: hour as u32 * 3600 + minute as u32 * 60 + second as u32,
        }
    }

    pub const fn second_of_day(self) -> u32 {
        self.second_of_day
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.second_of_day;
        write!(f, "{:02}:{:02}", s / 3600, s % 3600 / 60)?;
        if s % 60 != 0 {
            write!(f, ":{:02}", s % 60)?;
        }
        Ok(())
    }
}

/// A civil calendar date in the proleptic Gregorian calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDate {
    year: i32,
    month: Month,
    day: u8,
}

impl LocalDate {
    pub const fn new(year: i32, month: Month, day: u8) -> Self {
        Self { year, month, day }
    }

    pub const fn year(self) -> i32 {
        self.year
    }

    pub const fn month(self) -> Month {
        self.month
    }

    pub const fn day(self) -> u8 {
        self.day
    }

    pub fn epoch_day(self) -> i64 {
        utils::epoch_days_for_ymd(self.year, self.month.number(), self.day)
    }

    pub fn from_epoch_day(days: i64) -> Self {
        let (year, month, day) = utils::ymd_for_epoch_days(days);
        Self {
            year,
            // months out of ymd_for_epoch_days are always in 1..=12
            month: Month::from_number(month).unwrap_or(Month::Jan),
            day,
        }
    }

    pub fn weekday(self) -> Weekday {
        match utils::epoch_days_to_week_day(self.epoch_day()) {
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            _ => Weekday::Sun,
        }
    }

    pub fn plus_days(self, days: i64) -> Self {
        if days == 0 {
            return self;
        }
        Self::from_epoch_day(self.epoch_day() + days)
    }

    /// The next date falling on `weekday`, or this date if it already
    /// does.
    pub fn next_or_same(self, weekday: Weekday) -> Self {
        let delta =
            (weekday.number() as i64 - self.weekday().number() as i64).rem_euclid(7);
        self.plus_days(delta)
    }

    /// The previous date falling on `weekday`, or this date if it
    /// already does.
    pub fn previous_or_same(self, weekday: Weekday) -> Self {
        let delta =
            (self.weekday().number() as i64 - weekday.number() as i64).rem_euclid(7);
        self.plus_days(-delta)
    }
}

impl fmt::Display for LocalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month.number(), self.day)
    }
}

/// A civil date and wall time, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDateTime {
    date: LocalDate,
    time: LocalTime,
}

impl LocalDateTime {
    /// The far past, used as the start of the first window.
    pub const MIN: LocalDateTime = LocalDateTime {
        date: LocalDate::new(YEAR_MIN, Month::Jan, 1),
        time: LocalTime::MIDNIGHT,
    };
    /// The far future, used as the "forever" window end.
    pub const MAX: LocalDateTime = LocalDateTime {
        date: LocalDate::new(YEAR_MAX, Month::Dec, 31),
        time: LocalTime::of(23, 59, 59),
    };

    pub const fn new(date: LocalDate, time: LocalTime) -> Self {
        Self { date, time }
    }

    pub const fn of(year: i32, month: Month, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            date: LocalDate::new(year, month, day),
            time: LocalTime::of(hour, minute, second),
        }
    }

    pub const fn date(self) -> LocalDate {
        self.date
    }

    pub const fn time(self) -> LocalTime {
        self.time
    }

    pub const fn year(self) -> i32 {
        self.date.year()
    }

    /// Seconds since the epoch of the local midnight plus the
    /// second-of-day, without any offset applied.
    fn local_second(self) -> i64 {
        self.date.epoch_day() * utils::SECS_PER_DAY + self.time.second_of_day() as i64
    }

    fn from_local_second(local_second: i64) -> Self {
        let days = utils::floor_div(local_second, utils::SECS_PER_DAY);
        let second_of_day = local_second.rem_euclid(utils::SECS_PER_DAY) as u32;
        Self {
            date: LocalDate::from_epoch_day(days),
            time: LocalTime {
                second_of_day,
            },
        }
    }

    pub fn plus_seconds(self, seconds: i64) -> Self {
        if seconds == 0 {
            return self;
        }
        Self::from_local_second(self.local_second() + seconds)
    }

    pub fn to_epoch_second(self, offset: UtcOffset) -> i64 {
        self.local_second() - offset.seconds() as i64
    }

    pub fn from_epoch_second(epoch_second: i64, offset: UtcOffset) -> Self {
        Self::from_local_second(epoch_second + offset.seconds() as i64)
    }
}

impl fmt::Display for LocalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)
    }
}

/// How a rule's local time is anchored when converting it to the wall
/// clock frame of the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeDefinition {
    /// The time is expressed in UTC.
    Utc,
    /// The time is expressed on the wall clock, savings included.
    Wall,
    /// The time is expressed in local standard time, savings excluded.
    Standard,
}

impl TimeDefinition {
    /// Translates `dt` into the wall clock seen just before the
    /// transition, given the standard and wall offsets in force.
    pub fn create_date_time(
        self,
        dt: LocalDateTime,
        standard_offset: UtcOffset,
        wall_offset: UtcOffset,
    ) -> LocalDateTime {
        match self {
            TimeDefinition::Utc => dt.plus_seconds(wall_offset.seconds() as i64),
            TimeDefinition::Wall => dt,
            TimeDefinition::Standard => {
                dt.plus_seconds((wall_offset.seconds() - standard_offset.seconds()) as i64)
            }
        }
    }
}
