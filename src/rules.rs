//! The immutable zone rules model and its queries.

use core::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use hashbrown::HashMap;

use crate::transition::{Transition, TransitionRule};
use crate::types::{Duration, Instant, LocalDateTime, UtcOffset, YEAR_MAX};
use crate::utils;
use crate::ZoneRulesError;

/// The last year for which expanded recurring-rule transitions are
/// memoized. Beyond this the expansion is recomputed on every query.
const LAST_CACHED_YEAR: i32 = 2100;

/// The maximum number of recurring rules a zone may carry.
pub(crate) const MAX_LAST_RULES: usize = 16;

/// The outcome of resolving a local date-time against a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetResolution {
    /// The local date-time occurs exactly once, at this offset.
    Stable(UtcOffset),
    /// The local date-time falls inside a gap or an overlap.
    InTransition(Transition),
}

/// The complete set of offset rules for a time zone.
///
/// Historic transitions are held as sorted parallel arrays searched by
/// binary search; dates after the last historic transition are covered
/// by expanding the recurring [`TransitionRule`]s for the queried year.
#[derive(Debug)]
pub struct ZoneRules {
    /// Instants at which the standard offset changed.
    standard_transitions: Vec<i64>,
    /// Standard offsets, one more entry than `standard_transitions`.
    standard_offsets: Vec<UtcOffset>,
    /// Instants at which the wall offset changed.
    savings_instant_transitions: Vec<i64>,
    /// Wall offsets, one more entry than `savings_instant_transitions`.
    wall_offsets: Vec<UtcOffset>,
    /// Local date-time pairs bracketing each wall transition, always in
    /// ascending local order.
    savings_local_transitions: Vec<LocalDateTime>,
    /// Recurring rules applying after the last historic transition.
    last_rules: Vec<TransitionRule>,
    /// Memoized per-year expansion of `last_rules`.
    cache: RwLock<HashMap<i32, Arc<[Transition]>>>,
}

impl ZoneRules {
    /// Rules for a zone whose offset never changes.
    pub fn fixed(offset: UtcOffset) -> Self {
        Self {
            standard_transitions: Vec::new(),
            standard_offsets: vec![offset],
            savings_instant_transitions: Vec::new(),
            wall_offsets: vec![offset],
            savings_local_transitions: Vec::new(),
            last_rules: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Assembles rules from transition lists, which must already be
    /// sorted by instant.
    pub fn new(
        base_standard_offset: UtcOffset,
        base_wall_offset: UtcOffset,
        standard_offset_transitions: Vec<Transition>,
        transitions: Vec<Transition>,
        last_rules: Vec<TransitionRule>,
    ) -> Result<Self, ZoneRulesError> {
        if last_rules.len() > MAX_LAST_RULES {
            return Err(ZoneRulesError::TooManyTransitionRules);
        }

        let mut standard_transitions = Vec::with_capacity(standard_offset_transitions.len());
        let mut standard_offsets = Vec::with_capacity(standard_offset_transitions.len() + 1);
        standard_offsets.push(base_standard_offset);
        for trans in &standard_offset_transitions {
            standard_transitions.push(trans.epoch_second());
            standard_offsets.push(trans.offset_after());
        }

        let mut savings_instant_transitions = Vec::with_capacity(transitions.len());
        let mut savings_local_transitions = Vec::with_capacity(transitions.len() * 2);
        let mut wall_offsets = Vec::with_capacity(transitions.len() + 1);
        wall_offsets.push(base_wall_offset);
        for trans in &transitions {
            if trans.is_gap() {
                savings_local_transitions.push(trans.date_time_before());
                savings_local_transitions.push(trans.date_time_after());
            } else {
                savings_local_transitions.push(trans.date_time_after());
                savings_local_transitions.push(trans.date_time_before());
            }
            savings_instant_transitions.push(trans.epoch_second());
            wall_offsets.push(trans.offset_after());
        }

        Ok(Self {
            standard_transitions,
            standard_offsets,
            savings_instant_transitions,
            wall_offsets,
            savings_local_transitions,
            last_rules,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Whether the offset never changes.
    pub fn is_fixed_offset(&self) -> bool {
        self.savings_instant_transitions.is_empty()
    }

    /// The wall offset in force at `instant`.
    pub fn offset_at(&self, instant: Instant) -> UtcOffset {
        let epoch_second = instant.epoch_second();
        let last = match self.savings_instant_transitions.last() {
            Some(last) => *last,
            None => return self.wall_offsets[0],
        };

        // after the last historic transition the recurring rules apply
        if !self.last_rules.is_empty() && epoch_second > last {
            let year = utils::find_year(epoch_second, self.wall_offsets[self.wall_offsets.len() - 1]);
            let trans_array = self.transition_array(year);
            for trans in trans_array.iter() {
                if epoch_second < trans.epoch_second() {
                    return trans.offset_before();
                }
            }
            match trans_array.last() {
                Some(trans) => return trans.offset_after(),
                None => return self.wall_offsets[self.wall_offsets.len() - 1],
            }
        }

        match self.savings_instant_transitions.binary_search(&epoch_second) {
            Ok(index) => self.wall_offsets[index + 1],
            Err(index) => self.wall_offsets[index],
        }
    }

    /// The single offset to use for `dt`, taking the offset before the
    /// transition when `dt` falls inside a gap or overlap.
    pub fn offset_at_local(&self, dt: LocalDateTime) -> UtcOffset {
        match self.offset_info_at(dt) {
            OffsetResolution::Stable(offset) => offset,
            OffsetResolution::InTransition(trans) => trans.offset_before(),
        }
    }

    /// Resolves `dt` to either a unique offset or the transition it
    /// falls inside.
    pub fn offset_info_at(&self, dt: LocalDateTime) -> OffsetResolution {
        let last = match self.savings_local_transitions.last() {
            Some(last) => *last,
            None => return OffsetResolution::Stable(self.wall_offsets[0]),
        };

        if !self.last_rules.is_empty() && dt > last {
            let trans_array = self.transition_array(dt.year());
            let mut info = OffsetResolution::Stable(self.wall_offsets[self.wall_offsets.len() - 1]);
            for trans in trans_array.iter() {
                info = find_offset_info(dt, *trans);
                match info {
                    OffsetResolution::InTransition(_) => return info,
                    OffsetResolution::Stable(offset) if offset == trans.offset_before() => {
                        return info;
                    }
                    OffsetResolution::Stable(_) => {}
                }
            }
            return info;
        }

        let index = match self.savings_local_transitions.binary_search(&dt) {
            // before the first recorded local transition
            Err(0) => return OffsetResolution::Stable(self.wall_offsets[0]),
            Err(insertion) => insertion - 1,
            Ok(index) => {
                // land on the later of two equal local anchors
                if index < self.savings_local_transitions.len() - 1
                    && self.savings_local_transitions[index]
                        == self.savings_local_transitions[index + 1]
                {
                    index + 1
                } else {
                    index
                }
            }
        };

        if index % 2 == 1 {
            // between a pair and the next pair, offset is settled
            return OffsetResolution::Stable(self.wall_offsets[index / 2 + 1]);
        }
        // within a pair, reconstruct the transition from its anchors
        let dt_before = self.savings_local_transitions[index];
        let dt_after = self.savings_local_transitions[index + 1];
        let offset_before = self.wall_offsets[index / 2];
        let offset_after = self.wall_offsets[index / 2 + 1];
        let anchor = if offset_after.seconds() > offset_before.seconds() {
            dt_before
        } else {
            dt_after
        };
        OffsetResolution::InTransition(Transition::new(
            anchor.to_epoch_second(offset_before),
            offset_before,
            offset_after,
        ))
    }

    /// The offsets `dt` can validly resolve to: one for a stable local
    /// date-time, two inside an overlap, none inside a gap.
    pub fn valid_offsets_at(&self, dt: LocalDateTime) -> Vec<UtcOffset> {
        match self.offset_info_at(dt) {
            OffsetResolution::Stable(offset) => vec![offset],
            OffsetResolution::InTransition(trans) => trans.valid_offsets(),
        }
    }

    pub fn is_valid_offset(&self, dt: LocalDateTime, offset: UtcOffset) -> bool {
        match self.offset_info_at(dt) {
            OffsetResolution::Stable(stable) => stable == offset,
            OffsetResolution::InTransition(trans) => trans.is_valid_offset(offset),
        }
    }

    /// The transition `dt` falls inside, if any.
    pub fn transition_at(&self, dt: LocalDateTime) -> Option<Transition> {
        match self.offset_info_at(dt) {
            OffsetResolution::InTransition(trans) => Some(trans),
            OffsetResolution::Stable(_) => None,
        }
    }

    /// The standard offset in force at `instant`, ignoring savings.
    pub fn standard_offset_at(&self, instant: Instant) -> UtcOffset {
        match self
            .standard_transitions
            .binary_search(&instant.epoch_second())
        {
            Ok(index) => self.standard_offsets[index + 1],
            Err(index) => self.standard_offsets[index],
        }
    }

    /// The amount of daylight savings in force at `instant`, zero when
    /// on standard time.
    pub fn daylight_savings_at(&self, instant: Instant) -> Duration {
        let standard = self.standard_offset_at(instant);
        let actual = self.offset_at(instant);
        Duration::from_seconds((actual.seconds() - standard.seconds()) as i64)
    }

    pub fn is_daylight_savings_at(&self, instant: Instant) -> bool {
        self.standard_offset_at(instant) != self.offset_at(instant)
    }

    /// The first transition strictly after `instant`, if any.
    pub fn next_transition(&self, instant: Instant) -> Option<Transition> {
        let last = *self.savings_instant_transitions.last()?;
        let epoch_second = instant.epoch_second();

        if epoch_second >= last {
            if self.last_rules.is_empty() {
                return None;
            }
            let year = utils::find_year(epoch_second, self.wall_offsets[self.wall_offsets.len() - 1]);
            let trans_array = self.transition_array(year);
            for trans in trans_array.iter() {
                if epoch_second < trans.epoch_second() {
                    return Some(*trans);
                }
            }
            if year < YEAR_MAX {
                return self.transition_array(year + 1).first().copied();
            }
            return None;
        }

        let index = match self.savings_instant_transitions.binary_search(&epoch_second) {
            Ok(index) => index + 1,
            Err(insertion) => insertion,
        };
        Some(Transition::new(
            self.savings_instant_transitions[index],
            self.wall_offsets[index],
            self.wall_offsets[index + 1],
        ))
    }

    /// The last transition at or before `instant`, if any. An instant
    /// with a nanosecond adjustment counts as after its whole second.
    pub fn previous_transition(&self, instant: Instant) -> Option<Transition> {
        let last_historic = *self.savings_instant_transitions.last()?;
        let mut epoch_second = instant.epoch_second();
        if instant.nano() > 0 && epoch_second < i64::MAX {
            // nanos push the probe past the whole second
            epoch_second += 1;
        }

        if !self.last_rules.is_empty() && epoch_second > last_historic {
            let last_historic_offset = self.wall_offsets[self.wall_offsets.len() - 1];
            let mut year = utils::find_year(epoch_second, last_historic_offset);
            let trans_array = self.transition_array(year);
            for trans in trans_array.iter().rev() {
                if epoch_second > trans.epoch_second() {
                    return Some(*trans);
                }
            }
            let last_historic_year = utils::find_year(last_historic, last_historic_offset);
            year -= 1;
            if year > last_historic_year {
                return self.transition_array(year).last().copied();
            }
            // fall through to the historic search
        }

        let index = match self.savings_instant_transitions.binary_search(&epoch_second) {
            Ok(index) => index,
            Err(insertion) => insertion,
        };
        if index == 0 {
            return None;
        }
        Some(Transition::new(
            self.savings_instant_transitions[index - 1],
            self.wall_offsets[index - 1],
            self.wall_offsets[index],
        ))
    }

    /// The full historic transition list, earliest first.
    pub fn transitions(&self) -> Vec<Transition> {
        self.savings_instant_transitions
            .iter()
            .enumerate()
            .map(|(i, &epoch_second)| {
                Transition::new(epoch_second, self.wall_offsets[i], self.wall_offsets[i + 1])
            })
            .collect()
    }

    /// The recurring rules applying after the historic transitions.
    pub fn transition_rules(&self) -> &[TransitionRule] {
        &self.last_rules
    }

    /// Expands the recurring rules for `year`, memoizing the result for
    /// years the cache covers.
    fn transition_array(&self, year: i32) -> Arc<[Transition]> {
        if year < LAST_CACHED_YEAR {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(&year) {
                return Arc::clone(cached);
            }
        }
        let trans_array: Arc<[Transition]> = self
            .last_rules
            .iter()
            .map(|rule| rule.create_transition(year))
            .collect();
        if year < LAST_CACHED_YEAR {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache
                .entry(year)
                .or_insert_with(|| Arc::clone(&trans_array));
        }
        trans_array
    }
}

/// Resolves `dt` against a single transition of the recurring-rule
/// expansion.
fn find_offset_info(dt: LocalDateTime, trans: Transition) -> OffsetResolution {
    let local_before = trans.date_time_before();
    if trans.is_gap() {
        if dt < local_before {
            OffsetResolution::Stable(trans.offset_before())
        } else if dt < trans.date_time_after() {
            OffsetResolution::InTransition(trans)
        } else {
            OffsetResolution::Stable(trans.offset_after())
        }
    } else {
        // overlap, date_time_after is the earlier local time
        if dt >= local_before {
            OffsetResolution::Stable(trans.offset_after())
        } else if dt < trans.date_time_after() {
            OffsetResolution::Stable(trans.offset_before())
        } else {
            OffsetResolution::InTransition(trans)
        }
    }
}

impl Clone for ZoneRules {
    fn clone(&self) -> Self {
        Self {
            standard_transitions: self.standard_transitions.clone(),
            standard_offsets: self.standard_offsets.clone(),
            savings_instant_transitions: self.savings_instant_transitions.clone(),
            wall_offsets: self.wall_offsets.clone(),
            savings_local_transitions: self.savings_local_transitions.clone(),
            last_rules: self.last_rules.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }
}

impl PartialEq for ZoneRules {
    fn eq(&self, other: &Self) -> bool {
        self.standard_transitions == other.standard_transitions
            && self.standard_offsets == other.standard_offsets
            && self.savings_instant_transitions == other.savings_instant_transitions
            && self.wall_offsets == other.wall_offsets
            && self.last_rules == other.last_rules
    }
}

impl Eq for ZoneRules {}

impl Hash for ZoneRules {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.standard_transitions.hash(state);
        self.standard_offsets.hash(state);
        self.savings_instant_transitions.hash(state);
        self.wall_offsets.hash(state);
        self.last_rules.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocalTime, Month, TimeDefinition, Weekday};

    fn dt(year: i32, month: Month, day: u8, hour: u8, minute: u8) -> LocalDateTime {
        LocalDateTime::of(year, month, day, hour, minute, 0)
    }

    fn europe_style_rules() -> ZoneRules {
        let plus_one = UtcOffset::from_hours(1);
        let plus_two = UtcOffset::from_hours(2);
        let spring = TransitionRule::new(
            Month::Mar,
            -1,
            Some(Weekday::Sun),
            LocalTime::of(1, 0, 0),
            0,
            TimeDefinition::Utc,
            plus_one,
            plus_one,
            plus_two,
        )
        .unwrap();
        let autumn = TransitionRule::new(
            Month::Oct,
            -1,
            Some(Weekday::Sun),
            LocalTime::of(1, 0, 0),
            0,
            TimeDefinition::Utc,
            plus_one,
            plus_two,
            plus_one,
        )
        .unwrap();
        // one historic transition in 1996, rules thereafter
        let historic = Transition::new(828_234_000, plus_one, plus_two);
        ZoneRules::new(
            plus_one,
            plus_one,
            Vec::new(),
            vec![historic],
            vec![spring, autumn],
        )
        .unwrap()
    }

    #[test]
    fn fixed_zone_degenerates() {
        let rules = ZoneRules::fixed(UtcOffset::from_hms(2, 30, 0));
        let instant = Instant::from_epoch_second(1_000_000_000);
        assert!(rules.is_fixed_offset());
        assert_eq!(rules.offset_at(instant), UtcOffset::from_hms(2, 30, 0));
        assert_eq!(rules.standard_offset_at(instant), UtcOffset::from_hms(2, 30, 0));
        assert_eq!(
            rules.offset_info_at(dt(2008, Month::Jun, 1, 12, 0)),
            OffsetResolution::Stable(UtcOffset::from_hms(2, 30, 0))
        );
        assert!(rules.daylight_savings_at(instant).is_zero());
        assert!(!rules.is_daylight_savings_at(instant));
        assert_eq!(rules.next_transition(instant), None);
        assert_eq!(rules.previous_transition(instant), None);
        assert!(rules.transitions().is_empty());
        assert!(rules.transition_rules().is_empty());
    }

    #[test]
    fn fixed_zone_representations_equal() {
        let offset = UtcOffset::from_hours(3);
        let built =
            ZoneRules::new(offset, offset, Vec::new(), Vec::new(), Vec::new()).unwrap();
        assert_eq!(built, ZoneRules::fixed(offset));
    }

    #[test]
    fn instant_queries_follow_recurring_rules() {
        let rules = europe_style_rules();
        // mid-winter 2008, standard time
        let winter = Instant::from_epoch_second(1_199_145_600);
        assert_eq!(rules.offset_at(winter), UtcOffset::from_hours(1));
        assert!(!rules.is_daylight_savings_at(winter));
        // mid-summer 2008, savings in force
        let summer = Instant::from_epoch_second(1_214_870_400);
        assert_eq!(rules.offset_at(summer), UtcOffset::from_hours(2));
        assert_eq!(
            rules.daylight_savings_at(summer),
            Duration::from_seconds(3600)
        );
        assert!(rules.is_daylight_savings_at(summer));
        // standard offset never moves
        assert_eq!(rules.standard_offset_at(summer), UtcOffset::from_hours(1));
    }

    #[test]
    fn local_queries_classify_gap_and_overlap() {
        let rules = europe_style_rules();
        // inside the 2008 spring gap, 02:00-03:00 local never happens
        let in_gap = dt(2008, Month::Mar, 30, 2, 30);
        match rules.offset_info_at(in_gap) {
            OffsetResolution::InTransition(trans) => {
                assert!(trans.is_gap());
                assert_eq!(trans.epoch_second(), 1_206_838_800);
            }
            other => panic!("expected gap, got {other:?}"),
        }
        assert!(rules.valid_offsets_at(in_gap).is_empty());
        assert_eq!(rules.offset_at_local(in_gap), UtcOffset::from_hours(1));

        // inside the 2008 autumn overlap, 02:00-03:00 local happens twice
        let in_overlap = dt(2008, Month::Oct, 26, 2, 30);
        match rules.offset_info_at(in_overlap) {
            OffsetResolution::InTransition(trans) => {
                assert!(trans.is_overlap());
                assert_eq!(trans.epoch_second(), 1_224_982_800);
            }
            other => panic!("expected overlap, got {other:?}"),
        }
        assert_eq!(
            rules.valid_offsets_at(in_overlap),
            vec![UtcOffset::from_hours(2), UtcOffset::from_hours(1)]
        );
        assert!(rules.is_valid_offset(in_overlap, UtcOffset::from_hours(1)));
        assert!(!rules.is_valid_offset(in_overlap, UtcOffset::UTC));

        // a plain local time resolves uniquely
        assert_eq!(
            rules.offset_info_at(dt(2008, Month::Jun, 1, 12, 0)),
            OffsetResolution::Stable(UtcOffset::from_hours(2))
        );
        assert_eq!(rules.transition_at(dt(2008, Month::Jun, 1, 12, 0)), None);
    }

    #[test]
    fn next_and_previous_step_through_transitions() {
        let rules = europe_style_rules();
        let winter = Instant::from_epoch_second(1_199_145_600);
        let spring = rules.next_transition(winter).unwrap();
        assert_eq!(spring.epoch_second(), 1_206_838_800);
        assert!(spring.is_gap());
        let autumn = rules
            .next_transition(Instant::from_epoch_second(spring.epoch_second()))
            .unwrap();
        assert_eq!(autumn.epoch_second(), 1_224_982_800);
        assert!(autumn.is_overlap());

        // previous from mid-summer finds the spring gap
        let back = rules
            .previous_transition(Instant::from_epoch_second(1_214_870_400))
            .unwrap();
        assert_eq!(back.epoch_second(), 1_206_838_800);
        // at the transition instant itself the answer is the one before
        let at = rules
            .previous_transition(Instant::from_epoch_second(1_206_838_800))
            .unwrap();
        assert!(at.epoch_second() < 1_206_838_800);
        // a nanosecond adjustment makes the probe land after the instant
        let nano = rules
            .previous_transition(Instant::new(1_206_838_800, 1))
            .unwrap();
        assert_eq!(nano.epoch_second(), 1_206_838_800);
    }

    #[test]
    fn recurring_expansion_is_deterministic_beyond_cache() {
        let rules = europe_style_rules();
        // 2150 is past the memoized range and recomputed per query
        let far = dt(2150, Month::Jun, 15, 12, 0);
        let first = rules.offset_info_at(far);
        let second = rules.offset_info_at(far);
        assert_eq!(first, second);
        assert_eq!(first, OffsetResolution::Stable(UtcOffset::from_hours(2)));
    }

    #[test]
    fn historic_transitions_are_reported() {
        let rules = europe_style_rules();
        let historic = rules.transitions();
        assert_eq!(historic.len(), 1);
        assert_eq!(historic[0].epoch_second(), 828_234_000);
        assert_eq!(rules.transition_rules().len(), 2);
    }

    #[test]
    fn rejects_too_many_rules() {
        let offset = UtcOffset::UTC;
        let rule = TransitionRule::new(
            Month::Mar,
            1,
            None,
            LocalTime::MIDNIGHT,
            0,
            TimeDefinition::Wall,
            offset,
            offset,
            UtcOffset::from_hours(1),
        )
        .unwrap();
        let result = ZoneRules::new(
            offset,
            offset,
            Vec::new(),
            Vec::new(),
            vec![rule; MAX_LAST_RULES + 1],
        );
        assert!(matches!(result, Err(ZoneRulesError::TooManyTransitionRules)));
    }
}
