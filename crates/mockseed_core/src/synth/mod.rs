//! Attribute synthesis.
//!
//! # Responsibility
//! - Draw plausible field values from vocabularies and numeric/time ranges.
//! - Produce item timelines that honor `created <= modified`.
//!
//! # Invariants
//! - All randomness flows from one seedable RNG; equal seeds, reference
//!   times, and vocabularies give equal values.
//! - Empty inputs never panic; they yield empty or default values.

pub mod time;

use crate::config::{CountRange, TimeWindow};
use crate::model::seed::SeedTime;
use crate::report::{Recovery, RunReport};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use time::{parse_seed_time, ParsedTime};

const QUARTER_HOURS: &[i64] = &[0, 15, 30, 45];
const MIN_MODIFICATION_OFFSET_SECS: i64 = 60;

/// How a missing modification timestamp is derived from creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetRule {
    /// One of the listed durations, in minutes (event lengths).
    Minutes(&'static [i64]),
    /// Uniform in `min..=max` seconds.
    Seconds { min: i64, max: i64 },
}

/// Seeded value source shared by every stage of a run.
pub struct Synthesizer {
    rng: StdRng,
    now: DateTime<Utc>,
}

impl Synthesizer {
    pub fn new(rng: StdRng, now: DateTime<Utc>) -> Self {
        Self { rng, now }
    }

    /// `None` draws from OS entropy.
    pub fn seeded(seed: Option<u64>, now: DateTime<Utc>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(rng, now)
    }

    /// The run's reference time.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Uniform pick from a vocabulary list; `""` when empty.
    pub fn pick<'a>(&mut self, entries: &'a [String]) -> &'a str {
        entries
            .choose(&mut self.rng)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Uniform pick from any slice.
    pub fn choose<'a, T>(&mut self, entries: &'a [T]) -> Option<&'a T> {
        entries.choose(&mut self.rng)
    }

    /// Up to `amount` distinct entries, in random order.
    pub fn sample<'a>(&mut self, entries: &'a [String], amount: usize) -> Vec<&'a str> {
        entries
            .choose_multiple(&mut self.rng, amount)
            .map(String::as_str)
            .collect()
    }

    /// True with probability `probability`, clamped to `0.0..=1.0`.
    pub fn chance(&mut self, probability: f64) -> bool {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self.rng.gen_bool(probability)
    }

    /// Uniform integer in `min..=max`; bounds may be given in either order.
    pub fn int(&mut self, min: i64, max: i64) -> i64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        self.rng.gen_range(low..=high)
    }

    /// Uniform float in `min..max`, rounded to `decimals`.
    pub fn float(&mut self, min: f64, max: f64, decimals: i32) -> f64 {
        let value = if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        };
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    }

    /// Count drawn from a validated range.
    pub fn count(&mut self, range: CountRange) -> usize {
        self.int(i64::from(range.min), i64::from(range.max)) as usize
    }

    /// Index chosen by relative weights; `0` when all weights are zero.
    pub fn weighted(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return 0;
        }
        let mut roll = self.rng.gen_range(0.0..total);
        for (index, weight) in weights.iter().enumerate() {
            let weight = weight.max(0.0);
            if roll < weight {
                return index;
            }
            roll -= weight;
        }
        weights.len().saturating_sub(1)
    }

    /// `length` characters drawn from `alphabet`.
    pub fn code(&mut self, alphabet: &str, length: usize) -> String {
        let chars: Vec<char> = alphabet.chars().collect();
        (0..length)
            .filter_map(|_| chars.choose(&mut self.rng).copied())
            .collect()
    }

    /// Creation timestamp inside `window`.
    ///
    /// Forward-looking values fall on a later day, between 07:00 and 18:45
    /// UTC on a quarter hour; past values land anywhere in the day.
    pub fn creation(&mut self, window: &TimeWindow) -> DateTime<Utc> {
        if window.forward_share > 0.0 && self.chance(window.forward_share) {
            let days = self.int(1, i64::from(window.future_days.max(1)));
            let hours = self.int(7, 18);
            let minutes = self.choose(QUARTER_HOURS).copied().unwrap_or(0);
            let offset = Duration::days(days) + Duration::hours(hours) + Duration::minutes(minutes);
            return self.shift(self.midnight(), offset);
        }
        let low = window.min_days_ago.min(window.max_days_ago);
        let mut high = window.min_days_ago.max(window.max_days_ago);
        if low == 0 && high == 0 {
            high = 1;
        }
        self.days_ago(i64::from(low), i64::from(high))
    }

    /// Uniform instant `min_days..=max_days` before the reference time, with
    /// a random time of day.
    pub fn days_ago(&mut self, min_days: i64, max_days: i64) -> DateTime<Utc> {
        let days = self.int(min_days, max_days);
        let seconds = self.int(0, 86_399);
        self.shift(self.now, -(Duration::days(days) + Duration::seconds(seconds)))
    }

    /// Uniform instant `min_minutes..=max_minutes` before the reference time.
    pub fn minutes_ago(&mut self, min_minutes: i64, max_minutes: i64) -> DateTime<Utc> {
        let minutes = self.int(min_minutes, max_minutes);
        self.shift(self.now, -Duration::minutes(minutes))
    }

    /// Uniform instant `min_days..=max_days` after the reference time.
    pub fn days_ahead(&mut self, min_days: i64, max_days: i64) -> DateTime<Utc> {
        let days = self.int(min_days, max_days);
        self.shift(self.now, Duration::days(days))
    }

    /// Start of the reference time's UTC day.
    fn midnight(&self) -> DateTime<Utc> {
        self.now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(self.now)
    }

    /// `at + offset`, clamped to chrono's representable range.
    fn shift(&self, at: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
        at.checked_add_signed(offset).unwrap_or(if offset < Duration::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }

    /// `created` plus an offset from `rule`, at least one minute later.
    pub fn modification(&mut self, created: DateTime<Utc>, rule: OffsetRule) -> DateTime<Utc> {
        let seconds = match rule {
            OffsetRule::Minutes(choices) => {
                self.choose(choices).copied().unwrap_or(1).saturating_mul(60)
            }
            OffsetRule::Seconds { min, max } => self.int(min, max),
        };
        self.shift(
            created,
            Duration::seconds(seconds.max(MIN_MODIFICATION_OFFSET_SECS)),
        )
    }

    /// Builds an item's `(created, modified)` pair from seed values.
    ///
    /// Missing values are synthesized silently; malformed values and
    /// inverted pairs are resynthesized and recorded in `report`.
    pub fn timeline(
        &mut self,
        created: &SeedTime,
        modified: &SeedTime,
        window: &TimeWindow,
        rule: OffsetRule,
        report: &mut RunReport,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let created_at = match read_seed_time(created) {
            ParsedTime::Valid(at) => at,
            ParsedTime::Missing => self.creation(window),
            ParsedTime::Malformed => {
                report.record(Recovery::MalformedSeedTimestamp {
                    field: "created".to_string(),
                    value: raw_text(created),
                });
                self.creation(window)
            }
        };

        let modified_at = match read_seed_time(modified) {
            ParsedTime::Valid(at) if at >= created_at => at,
            ParsedTime::Valid(_) => {
                report.record(Recovery::TimestampOrderRepaired {
                    field: "modified".to_string(),
                });
                self.modification(created_at, rule)
            }
            ParsedTime::Missing => self.modification(created_at, rule),
            ParsedTime::Malformed => {
                report.record(Recovery::MalformedSeedTimestamp {
                    field: "modified".to_string(),
                    value: raw_text(modified),
                });
                self.modification(created_at, rule)
            }
        };

        (created_at, modified_at)
    }
}

fn read_seed_time(value: &SeedTime) -> ParsedTime {
    match value {
        SeedTime::Missing => ParsedTime::Missing,
        SeedTime::Raw(raw) => parse_seed_time(raw),
        SeedTime::At(at) => ParsedTime::Valid(*at),
    }
}

fn raw_text(value: &SeedTime) -> String {
    match value {
        SeedTime::Raw(raw) => raw.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{OffsetRule, Synthesizer};
    use crate::config::{CountRange, TimeWindow, MAX_WINDOW_DAYS};
    use crate::model::seed::SeedTime;
    use crate::report::RunReport;
    use chrono::{DateTime, Duration, Timelike, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn pick_from_empty_list_is_blank() {
        let mut synth = Synthesizer::seeded(Some(1), now());
        assert_eq!(synth.pick(&[]), "");
        assert!(synth.choose::<u8>(&[]).is_none());
    }

    #[test]
    fn count_stays_in_range() {
        let mut synth = Synthesizer::seeded(Some(2), now());
        for _ in 0..200 {
            let n = synth.count(CountRange::new(3, 25));
            assert!((3..=25).contains(&n));
        }
        assert_eq!(synth.count(CountRange::exactly(4)), 4);
    }

    #[test]
    fn past_window_stays_in_bounds() {
        let mut synth = Synthesizer::seeded(Some(3), now());
        let window = TimeWindow::past(7, 30);
        for _ in 0..200 {
            let at = synth.creation(&window);
            assert!(at <= now() - Duration::days(7));
            assert!(at > now() - Duration::days(31));
        }
    }

    #[test]
    fn zero_width_window_still_looks_back() {
        let mut synth = Synthesizer::seeded(Some(4), now());
        let at = synth.creation(&TimeWindow::past(0, 0));
        assert!(at <= now());
        assert!(at > now() - Duration::days(2));
    }

    #[test]
    fn forward_window_uses_quarter_hours() {
        let mut synth = Synthesizer::seeded(Some(5), now());
        let window = TimeWindow {
            min_days_ago: 1,
            max_days_ago: 10,
            future_days: 30,
            forward_share: 1.0,
        };
        for _ in 0..50 {
            let at = synth.creation(&window);
            assert!(at > now());
            assert_eq!(at.minute() % 15, 0);
        }
    }

    #[test]
    fn forward_values_ignore_the_reference_minute() {
        let now = DateTime::parse_from_rfc3339("2025-01-15T09:37:12Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut synth = Synthesizer::seeded(Some(10), now);
        let window = TimeWindow {
            min_days_ago: 1,
            max_days_ago: 10,
            future_days: 0,
            forward_share: 1.0,
        };
        for _ in 0..50 {
            let at = synth.creation(&window);
            assert!(at > now);
            assert!((7..=18).contains(&at.hour()));
            assert_eq!(at.minute() % 15, 0);
            assert_eq!(at.second(), 0);
        }
    }

    #[test]
    fn widest_window_stays_representable() {
        let mut synth = Synthesizer::seeded(Some(11), now());
        let days = i64::from(MAX_WINDOW_DAYS);
        let at = synth.days_ago(days, days);
        assert!(at < now() - Duration::days(days - 1));
        let ahead = synth.days_ahead(days, days);
        assert_eq!(ahead, now() + Duration::days(days));
    }

    #[test]
    fn forward_share_is_roughly_honored() {
        let mut synth = Synthesizer::seeded(Some(6), now());
        let window = TimeWindow {
            min_days_ago: 1,
            max_days_ago: 730,
            future_days: 365,
            forward_share: 0.7,
        };
        let forward = (0..2000)
            .filter(|_| synth.creation(&window) > now())
            .count();
        assert!((1200..=1600).contains(&forward), "forward={forward}");
    }

    #[test]
    fn modification_never_precedes_creation() {
        let mut synth = Synthesizer::seeded(Some(7), now());
        let created = now();
        assert!(synth.modification(created, OffsetRule::Seconds { min: 0, max: 0 }) > created);
        let end = synth.modification(created, OffsetRule::Minutes(&[30, 60]));
        let minutes = (end - created).num_minutes();
        assert!(minutes == 30 || minutes == 60);
    }

    #[test]
    fn timeline_repairs_inverted_and_malformed_values() {
        let mut synth = Synthesizer::seeded(Some(8), now());
        let mut report = RunReport::new("test");
        let window = TimeWindow::past(1, 30);
        let rule = OffsetRule::Seconds { min: 60, max: 3600 };

        let (created, modified) = synth.timeline(
            &SeedTime::raw("2024-06-01T10:00:00Z"),
            &SeedTime::raw("2024-05-01T10:00:00Z"),
            &window,
            rule,
            &mut report,
        );
        assert_eq!(created.to_rfc3339(), "2024-06-01T10:00:00+00:00");
        assert!(modified > created);
        assert_eq!(report.count("timestamp_order_repaired"), 1);

        let (created, modified) = synth.timeline(
            &SeedTime::raw("not a date"),
            &SeedTime::raw(""),
            &window,
            rule,
            &mut report,
        );
        assert!(created <= modified);
        assert_eq!(report.count("malformed_seed_timestamp"), 1);
    }

    #[test]
    fn equal_seeds_give_equal_values() {
        let mut left = Synthesizer::seeded(Some(9), now());
        let mut right = Synthesizer::seeded(Some(9), now());
        for _ in 0..20 {
            assert_eq!(left.int(0, 1_000_000), right.int(0, 1_000_000));
        }
    }
}
