//! Incremental construction of [`ZoneRules`].
//!
//! A builder is a sequence of windows, each fixing a standard offset up
//! to an end date-time. Within a window the savings amount is either
//! fixed or driven by rules, and rules whose end year is [`YEAR_MAX`]
//! become the recurring rules of the finished zone.

use crate::rules::ZoneRules;
use crate::transition::{resolve_rule_date, Transition, TransitionRule};
use crate::types::{
    LocalDateTime, LocalTime, Month, TimeDefinition, UtcOffset, Weekday, YEAR_MAX, YEAR_MIN,
};
use crate::utils;
use crate::ZoneRulesError;

/// The most rules a single window may hold once year ranges are
/// expanded.
const MAX_WINDOW_RULES: usize = 2000;

/// A mutable builder assembling the transition history of a zone.
#[derive(Debug, Default)]
pub struct ZoneRulesBuilder {
    windows: Vec<Window>,
}

impl ZoneRulesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a window with the given standard offset, running from
    /// the end of the previous window until `until` as interpreted by
    /// `until_definition`.
    pub fn add_window(
        &mut self,
        standard_offset: UtcOffset,
        until: LocalDateTime,
        until_definition: TimeDefinition,
    ) -> Result<&mut Self, ZoneRulesError> {
        if let Some(previous) = self.windows.last() {
            if until < previous.end {
                return Err(ZoneRulesError::WindowOrder {
                    end: until,
                    previous_end: previous.end,
                });
            }
        }
        self.windows.push(Window::new(standard_offset, until, until_definition));
        Ok(self)
    }

    /// Appends the final window, running forever with the given
    /// standard offset.
    pub fn add_window_forever(
        &mut self,
        standard_offset: UtcOffset,
    ) -> Result<&mut Self, ZoneRulesError> {
        self.add_window(standard_offset, LocalDateTime::MAX, TimeDefinition::Wall)
    }

    /// Fixes the savings amount of the current window, which must not
    /// carry rules.
    pub fn set_fixed_savings_to_window(
        &mut self,
        fixed_saving_secs: i32,
    ) -> Result<&mut Self, ZoneRulesError> {
        let window = self
            .windows
            .last_mut()
            .ok_or(ZoneRulesError::NoActiveWindow)?;
        window.set_fixed_savings(fixed_saving_secs)?;
        Ok(self)
    }

    /// Adds a single fixed-date rule to the current window.
    pub fn add_single_rule_to_window(
        &mut self,
        transition: LocalDateTime,
        time_definition: TimeDefinition,
        saving_secs: i32,
    ) -> Result<&mut Self, ZoneRulesError> {
        self.add_rule_to_window(
            transition.year(),
            transition.year(),
            transition.date().month(),
            transition.date().day() as i8,
            None,
            transition.time(),
            false,
            time_definition,
            saving_secs,
        )
    }

    /// Adds a rule to the current window for each year of
    /// `start_year..=end_year`. An `end_year` of [`YEAR_MAX`] marks the
    /// rule as recurring forever.
    #[allow(clippy::too_many_arguments)]
    pub fn add_rule_to_window(
        &mut self,
        start_year: i32,
        end_year: i32,
        month: Month,
        day_of_month_indicator: i8,
        day_of_week: Option<Weekday>,
        time: LocalTime,
        time_end_of_day: bool,
        time_definition: TimeDefinition,
        saving_secs: i32,
    ) -> Result<&mut Self, ZoneRulesError> {
        if !(YEAR_MIN..=YEAR_MAX).contains(&start_year) {
            return Err(ZoneRulesError::InvalidYear(start_year));
        }
        if !(YEAR_MIN..=YEAR_MAX).contains(&end_year) {
            return Err(ZoneRulesError::InvalidYear(end_year));
        }
        if day_of_month_indicator == 0 || !(-28..=31).contains(&day_of_month_indicator) {
            return Err(ZoneRulesError::InvalidDayOfMonthIndicator(
                day_of_month_indicator,
            ));
        }
        if time_end_of_day && time != LocalTime::MIDNIGHT {
            return Err(ZoneRulesError::InvalidEndOfDayTime);
        }
        let window = self
            .windows
            .last_mut()
            .ok_or(ZoneRulesError::NoActiveWindow)?;
        window.add_rule(
            start_year,
            end_year,
            month,
            day_of_month_indicator,
            day_of_week,
            time,
            if time_end_of_day { 1 } else { 0 },
            time_definition,
            saving_secs,
        )?;
        Ok(self)
    }

    /// Compiles the accumulated windows into immutable [`ZoneRules`].
    #[cfg_attr(not(feature = "log"), allow(unused_variables))]
    pub fn to_rules(self, zone_id: &str) -> Result<ZoneRules, ZoneRulesError> {
        let mut windows = self.windows;
        let first_window = windows.first().ok_or(ZoneRulesError::NoWindows)?;

        let mut standard_transitions: Vec<Transition> = Vec::new();
        let mut transitions: Vec<Transition> = Vec::new();
        let mut last_transition_rules: Vec<TransitionRule> = Vec::new();

        let mut loop_standard_offset = first_window.standard_offset;
        let mut loop_savings = first_window.fixed_savings.unwrap_or(0);
        let first_wall_offset =
            UtcOffset::from_seconds(loop_standard_offset.seconds() + loop_savings);
        let first_standard_offset = first_window.standard_offset;
        let mut loop_window_start = LocalDateTime::MIN;
        let mut loop_window_offset = first_wall_offset;

        for window in &mut windows {
            window.tidy(loop_window_start.year())?;

            // savings in force when this window opens
            let window_start_epoch = loop_window_start.to_epoch_second(loop_window_offset);
            let effective_savings = match window.fixed_savings {
                Some(fixed) => fixed,
                None => {
                    let mut savings = 0;
                    for rule in &window.rules {
                        let trans = rule.to_transition(loop_standard_offset, loop_savings);
                        if trans.epoch_second() > window_start_epoch {
                            break;
                        }
                        savings = rule.saving_secs;
                    }
                    savings
                }
            };

            if loop_standard_offset != window.standard_offset {
                standard_transitions.push(Transition::new(
                    window_start_epoch,
                    loop_standard_offset,
                    window.standard_offset,
                ));
                loop_standard_offset = window.standard_offset;
            }

            // the window boundary itself may shift the wall clock
            let effective_wall_offset =
                UtcOffset::from_seconds(loop_standard_offset.seconds() + effective_savings);
            if loop_window_offset != effective_wall_offset {
                transitions.push(Transition::new(
                    window_start_epoch,
                    loop_window_offset,
                    effective_wall_offset,
                ));
            }
            loop_savings = effective_savings;

            for rule in &window.rules {
                let trans = rule.to_transition(loop_standard_offset, loop_savings);
                if trans.epoch_second() >= window_start_epoch
                    && trans.epoch_second() < window.end_epoch_second(loop_savings)
                    && trans.offset_before() != trans.offset_after()
                {
                    transitions.push(trans);
                    loop_savings = rule.saving_secs;
                }
            }

            for last_rule in &window.last_rules {
                last_transition_rules
                    .push(last_rule.to_transition_rule(loop_standard_offset, loop_savings)?);
                loop_savings = last_rule.saving_secs;
            }

            loop_window_offset = window.wall_offset(loop_savings);
            loop_window_start = LocalDateTime::from_epoch_second(
                window.end_epoch_second(loop_savings),
                loop_window_offset,
            );
        }

        #[cfg(feature = "log")]
        log::debug!(
            "compiled {zone_id}: {} transitions, {} recurring rules",
            transitions.len(),
            last_transition_rules.len(),
        );

        ZoneRules::new(
            first_standard_offset,
            first_wall_offset,
            standard_transitions,
            transitions,
            last_transition_rules,
        )
    }
}

/// A span of the time-line over which one standard offset applies.
#[derive(Debug)]
struct Window {
    standard_offset: UtcOffset,
    end: LocalDateTime,
    time_definition: TimeDefinition,
    fixed_savings: Option<i32>,
    rules: Vec<Rule>,
    max_last_rule_start_year: i32,
    last_rules: Vec<Rule>,
}

impl Window {
    fn new(standard_offset: UtcOffset, end: LocalDateTime, time_definition: TimeDefinition) -> Self {
        Self {
            standard_offset,
            end,
            time_definition,
            fixed_savings: None,
            rules: Vec::new(),
            max_last_rule_start_year: YEAR_MIN,
            last_rules: Vec::new(),
        }
    }

    fn set_fixed_savings(&mut self, fixed_saving_secs: i32) -> Result<(), ZoneRulesError> {
        if !self.rules.is_empty() || !self.last_rules.is_empty() {
            return Err(ZoneRulesError::WindowHasRules);
        }
        self.fixed_savings = Some(fixed_saving_secs);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_rule(
        &mut self,
        start_year: i32,
        end_year: i32,
        month: Month,
        day_of_month_indicator: i8,
        day_of_week: Option<Weekday>,
        time: LocalTime,
        adjust_days: i32,
        time_definition: TimeDefinition,
        saving_secs: i32,
    ) -> Result<(), ZoneRulesError> {
        if self.fixed_savings.is_some() {
            return Err(ZoneRulesError::WindowHasFixedSavings);
        }
        if self.rules.len() >= MAX_WINDOW_RULES {
            return Err(ZoneRulesError::WindowRuleCapExceeded);
        }
        let last_rule = end_year == YEAR_MAX;
        let end_year = if last_rule { start_year } else { end_year };
        for year in start_year..=end_year {
            let rule = Rule {
                year,
                month,
                day_of_month_indicator,
                day_of_week,
                time,
                adjust_days,
                time_definition,
                saving_secs,
            };
            if last_rule {
                self.last_rules.push(rule);
                self.max_last_rule_start_year = self.max_last_rule_start_year.max(start_year);
            } else {
                self.rules.push(rule);
            }
        }
        Ok(())
    }

    /// Normalizes the window before compilation: expands recurring
    /// rules into concrete years where the window is bounded, sorts the
    /// rule lists, and defaults the savings of a rule-less window.
    fn tidy(&mut self, window_start_year: i32) -> Result<(), ZoneRulesError> {
        if self.last_rules.len() == 1 {
            return Err(ZoneRulesError::OneRuleForever);
        }

        if self.end == LocalDateTime::MAX {
            // expand at least one concrete year so earlier windows
            // close off against real transitions
            self.max_last_rule_start_year = self.max_last_rule_start_year.max(window_start_year) + 1;
            let mut last_rules = std::mem::take(&mut self.last_rules);
            for last_rule in &mut last_rules {
                self.add_rule(
                    last_rule.year,
                    self.max_last_rule_start_year,
                    last_rule.month,
                    last_rule.day_of_month_indicator,
                    last_rule.day_of_week,
                    last_rule.time,
                    last_rule.adjust_days,
                    last_rule.time_definition,
                    last_rule.saving_secs,
                )?;
                last_rule.year = self.max_last_rule_start_year + 1;
            }
            self.last_rules = last_rules;
            if self.max_last_rule_start_year == YEAR_MAX {
                self.last_rules.clear();
            } else {
                self.max_last_rule_start_year += 1;
            }
        } else {
            let end_year = self.end.year();
            let last_rules = std::mem::take(&mut self.last_rules);
            for last_rule in &last_rules {
                self.add_rule(
                    last_rule.year,
                    end_year + 1,
                    last_rule.month,
                    last_rule.day_of_month_indicator,
                    last_rule.day_of_week,
                    last_rule.time,
                    last_rule.adjust_days,
                    last_rule.time_definition,
                    last_rule.saving_secs,
                )?;
            }
            self.max_last_rule_start_year = YEAR_MAX;
        }

        self.rules.sort_by_key(Rule::sort_key);
        self.last_rules.sort_by_key(Rule::sort_key);

        if self.rules.is_empty() && self.fixed_savings.is_none() {
            self.fixed_savings = Some(0);
        }
        Ok(())
    }

    fn wall_offset(&self, savings_secs: i32) -> UtcOffset {
        UtcOffset::from_seconds(self.standard_offset.seconds() + savings_secs)
    }

    /// The instant at which the window ends, given the savings in
    /// force.
    fn end_epoch_second(&self, savings_secs: i32) -> i64 {
        let wall_offset = self.wall_offset(savings_secs);
        self.time_definition
            .create_date_time(self.end, self.standard_offset, wall_offset)
            .to_epoch_second(wall_offset)
    }
}

/// A rule for a single year within a window.
#[derive(Debug, Clone, Copy)]
struct Rule {
    year: i32,
    month: Month,
    day_of_month_indicator: i8,
    day_of_week: Option<Weekday>,
    time: LocalTime,
    adjust_days: i32,
    time_definition: TimeDefinition,
    saving_secs: i32,
}

impl Rule {
    fn date(&self) -> crate::types::LocalDate {
        resolve_rule_date(self.year, self.month, self.day_of_month_indicator, self.day_of_week)
    }

    /// Orders rules by year, month, resolved date, then time adjusted
    /// for end-of-day.
    fn sort_key(&self) -> (i32, u8, i64, i64) {
        (
            self.year,
            self.month.number(),
            self.date().epoch_day(),
            self.time.second_of_day() as i64 + self.adjust_days as i64 * utils::SECS_PER_DAY,
        )
    }

    fn to_transition(&self, standard_offset: UtcOffset, savings_before_secs: i32) -> Transition {
        let local = LocalDateTime::new(self.date(), self.time)
            .plus_seconds(self.adjust_days as i64 * utils::SECS_PER_DAY);
        let wall_offset = UtcOffset::from_seconds(standard_offset.seconds() + savings_before_secs);
        let dt = self
            .time_definition
            .create_date_time(local, standard_offset, wall_offset);
        Transition::new(
            dt.to_epoch_second(wall_offset),
            wall_offset,
            UtcOffset::from_seconds(standard_offset.seconds() + self.saving_secs),
        )
    }

    fn to_transition_rule(
        &self,
        standard_offset: UtcOffset,
        savings_before_secs: i32,
    ) -> Result<TransitionRule, ZoneRulesError> {
        // negative indicators outside February store as a fixed late
        // day, which resolves identically under the day-of-week
        // adjuster
        let mut day_of_month_indicator = self.day_of_month_indicator;
        if day_of_month_indicator < 0 && self.month != Month::Feb {
            day_of_month_indicator = self.month.max_length() as i8 - 6;
        }
        let trans = self.to_transition(standard_offset, savings_before_secs);
        TransitionRule::new(
            self.month,
            day_of_month_indicator,
            self.day_of_week,
            self.time,
            self.adjust_days,
            self.time_definition,
            standard_offset,
            trans.offset_before(),
            trans.offset_after(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSET_1: UtcOffset = UtcOffset::from_hours(1);
    const OFFSET_2: UtcOffset = UtcOffset::from_hours(2);

    #[test]
    fn empty_builder_is_rejected() {
        let builder = ZoneRulesBuilder::new();
        assert!(matches!(
            builder.to_rules("Test/Empty"),
            Err(ZoneRulesError::NoWindows)
        ));
    }

    #[test]
    fn rules_require_a_window() {
        let mut builder = ZoneRulesBuilder::new();
        let result = builder.add_rule_to_window(
            2000,
            YEAR_MAX,
            Month::Mar,
            -1,
            Some(Weekday::Sun),
            LocalTime::of(1, 0, 0),
            false,
            TimeDefinition::Utc,
            3600,
        );
        assert!(matches!(result, Err(ZoneRulesError::NoActiveWindow)));
        assert!(matches!(
            builder.set_fixed_savings_to_window(3600),
            Err(ZoneRulesError::NoActiveWindow)
        ));
    }

    #[test]
    fn windows_must_be_ordered() {
        let mut builder = ZoneRulesBuilder::new();
        builder
            .add_window(
                OFFSET_1,
                LocalDateTime::of(2000, Month::Jan, 1, 0, 0, 0),
                TimeDefinition::Wall,
            )
            .unwrap();
        let result = builder.add_window(
            OFFSET_2,
            LocalDateTime::of(1990, Month::Jan, 1, 0, 0, 0),
            TimeDefinition::Wall,
        );
        assert!(matches!(result, Err(ZoneRulesError::WindowOrder { .. })));
    }

    #[test]
    fn rule_validation() {
        let mut builder = ZoneRulesBuilder::new();
        builder.add_window_forever(OFFSET_1).unwrap();
        for dom in [0i8, -29] {
            let result = builder.add_rule_to_window(
                2000,
                2000,
                Month::Mar,
                dom,
                None,
                LocalTime::MIDNIGHT,
                false,
                TimeDefinition::Wall,
                3600,
            );
            assert!(matches!(
                result,
                Err(ZoneRulesError::InvalidDayOfMonthIndicator(_))
            ));
        }
        let result = builder.add_rule_to_window(
            YEAR_MIN - 1,
            2000,
            Month::Mar,
            1,
            None,
            LocalTime::MIDNIGHT,
            false,
            TimeDefinition::Wall,
            3600,
        );
        assert!(matches!(result, Err(ZoneRulesError::InvalidYear(_))));
        let result = builder.add_rule_to_window(
            2000,
            2000,
            Month::Mar,
            1,
            None,
            LocalTime::of(1, 0, 0),
            true,
            TimeDefinition::Wall,
            3600,
        );
        assert!(matches!(result, Err(ZoneRulesError::InvalidEndOfDayTime)));
    }

    #[test]
    fn fixed_savings_and_rules_are_exclusive() {
        let mut builder = ZoneRulesBuilder::new();
        builder.add_window_forever(OFFSET_1).unwrap();
        builder
            .add_rule_to_window(
                2000,
                2001,
                Month::Mar,
                1,
                None,
                LocalTime::MIDNIGHT,
                false,
                TimeDefinition::Wall,
                3600,
            )
            .unwrap();
        assert!(matches!(
            builder.set_fixed_savings_to_window(3600),
            Err(ZoneRulesError::WindowHasRules)
        ));

        let mut builder = ZoneRulesBuilder::new();
        builder.add_window_forever(OFFSET_1).unwrap();
        builder.set_fixed_savings_to_window(3600).unwrap();
        let result = builder.add_rule_to_window(
            2000,
            2001,
            Month::Mar,
            1,
            None,
            LocalTime::MIDNIGHT,
            false,
            TimeDefinition::Wall,
            3600,
        );
        assert!(matches!(result, Err(ZoneRulesError::WindowHasFixedSavings)));
    }

    #[test]
    fn one_forever_rule_is_rejected() {
        let mut builder = ZoneRulesBuilder::new();
        builder.add_window_forever(OFFSET_1).unwrap();
        builder
            .add_rule_to_window(
                2000,
                YEAR_MAX,
                Month::Mar,
                -1,
                Some(Weekday::Sun),
                LocalTime::of(1, 0, 0),
                false,
                TimeDefinition::Utc,
                3600,
            )
            .unwrap();
        assert!(matches!(
            builder.to_rules("Test/OneRule"),
            Err(ZoneRulesError::OneRuleForever)
        ));
    }

    #[test]
    fn single_window_compiles_to_fixed_rules() {
        let mut builder = ZoneRulesBuilder::new();
        builder.add_window_forever(OFFSET_1).unwrap();
        let rules = builder.to_rules("Test/Fixed").unwrap();
        assert!(rules.is_fixed_offset());
        assert_eq!(rules, ZoneRules::fixed(OFFSET_1));
    }

    #[test]
    fn rule_sort_key_handles_end_of_day() {
        let base = Rule {
            year: 2000,
            month: Month::Mar,
            day_of_month_indicator: 15,
            day_of_week: None,
            time: LocalTime::of(23, 0, 0),
            adjust_days: 0,
            time_definition: TimeDefinition::Wall,
            saving_secs: 0,
        };
        let end_of_day = Rule {
            time: LocalTime::MIDNIGHT,
            adjust_days: 1,
            ..base
        };
        assert!(base.sort_key() < end_of_day.sort_key());
    }
}
