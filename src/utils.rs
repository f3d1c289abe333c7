//! Proleptic Gregorian calendar math.
//!
//! All conversions run over epoch days (days since 1970-01-01) so that
//! rule date resolution and year lookups share one set of equations.

pub(crate) const SECS_PER_DAY: i64 = 86_400;

pub(crate) const fn floor_div(dividend: i64, divisor: i64) -> i64 {
    dividend.div_euclid(divisor)
}

pub(crate) const fn in_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Days since the epoch for a year/month/day, valid across the full
/// supported year range.
pub(crate) fn epoch_days_for_ymd(year: i32, month: u8, day: u8) -> i64 {
    let year = year as i64 - (month <= 2) as i64;
    let era = floor_div(year, 400);
    let year_of_era = year - era * 400;
    let month = month as i64;
    let day_of_year = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day as i64 - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

/// Inverse of [`epoch_days_for_ymd`], returning `(year, month, day)`.
pub(crate) fn ymd_for_epoch_days(days: i64) -> (i32, u8, u8) {
    let days = days + 719_468;
    let era = floor_div(days, 146_097);
    let day_of_era = days - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let year = year_of_era + era * 400;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * mp + 2) / 5 + 1) as u8;
    let month = (mp + if mp < 10 { 3 } else { -9 }) as u8;
    ((year + (month <= 2) as i64) as i32, month, day)
}

/// The civil year a given instant falls in when viewed at `offset`.
pub(crate) fn find_year(epoch_second: i64, offset: crate::types::UtcOffset) -> i32 {
    let local_second = epoch_second + offset.seconds() as i64;
    ymd_for_epoch_days(floor_div(local_second, SECS_PER_DAY)).0
}

/// Week day for an epoch day count, `1` = Monday through `7` = Sunday.
pub(crate) fn epoch_days_to_week_day(days: i64) -> u8 {
    // 1970-01-01 was a Thursday
    ((days + 3).rem_euclid(7) + 1) as u8
}
