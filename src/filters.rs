use chrono::{DateTime, NaiveDate, Utc};
use std::iter::FusedIterator;

use crate::error::{MergeError, MergeResult};
use crate::platform::SafeStderr;
use crate::record::Record;
use crate::stats::stats_add_record_filtered;

/// Per-record keep/drop decision applied by [`Filtered`]
pub trait RecordFilter<P> {
    fn accept(&mut self, record: &Record<P>) -> bool;
}

/// Keep records whose UTC calendar date is `date`
#[derive(Debug, Clone, Copy)]
pub struct DateFilter {
    date: NaiveDate,
}

impl DateFilter {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl<P> RecordFilter<P> for DateFilter {
    fn accept(&mut self, record: &Record<P>) -> bool {
        record.date() == self.date
    }
}

/// Keep records with `start <= timestamp < end`; either bound may be open
#[derive(Debug, Clone, Copy)]
pub struct DateRangeFilter {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl DateRangeFilter {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> MergeResult<Self> {
        if start.is_none() && end.is_none() {
            return Err(MergeError::config("date range needs a start or an end date"));
        }
        Ok(Self { start, end })
    }

    /// Range over whole UTC days, `start` midnight up to `end` midnight
    pub fn from_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> MergeResult<Self> {
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        Self::new(start.and_then(midnight), end.and_then(midnight))
    }
}

impl<P> RecordFilter<P> for DateRangeFilter {
    fn accept(&mut self, record: &Record<P>) -> bool {
        let ts = record.timestamp();
        self.start.map_or(true, |start| start <= ts) && self.end.map_or(true, |end| ts < end)
    }
}

/// Random subset: keeps one record, then skips a random 0 to 15 before the
/// next one is kept.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    rng: fastrand::Rng,
    skip: u32,
}

impl SampleFilter {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Reproducible sampling for tests
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self { rng, skip: 0 }
    }
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> RecordFilter<P> for SampleFilter {
    fn accept(&mut self, _record: &Record<P>) -> bool {
        if self.skip == 0 {
            self.skip = self.rng.u32(0..=15);
            true
        } else {
            self.skip -= 1;
            false
        }
    }
}

/// Iterator adapter applying a [`RecordFilter`]; errors pass through untouched
#[derive(Debug)]
pub struct Filtered<I, F> {
    inner: I,
    filter: F,
}

impl<I, F, P> Iterator for Filtered<I, F>
where
    I: Iterator<Item = MergeResult<Record<P>>>,
    F: RecordFilter<P>,
{
    type Item = MergeResult<Record<P>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(record) if self.filter.accept(&record) => return Some(Ok(record)),
                Ok(_) => stats_add_record_filtered(),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

impl<I, F, P> FusedIterator for Filtered<I, F>
where
    I: FusedIterator<Item = MergeResult<Record<P>>>,
    F: RecordFilter<P>,
{
}

/// Yields [`MergeError::Empty`] at the end if no record came through
#[derive(Debug)]
pub struct NonEmpty<I> {
    inner: I,
    seen: bool,
    done: bool,
}

impl<I, T> Iterator for NonEmpty<I>
where
    I: Iterator<Item = MergeResult<T>>,
{
    type Item = MergeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(item)) => {
                self.seen = true;
                Some(Ok(item))
            }
            Some(Err(e)) => Some(Err(e)),
            None => {
                self.done = true;
                (!self.seen).then_some(Err(MergeError::Empty))
            }
        }
    }
}

impl<I, T> FusedIterator for NonEmpty<I> where I: Iterator<Item = MergeResult<T>> {}

/// Counts records flowing through and shows `N lines` on stderr every
/// 1000 records, with a final total once the input ends.
#[derive(Debug)]
pub struct Progress<I> {
    inner: I,
    count: u64,
    enabled: bool,
    reported: bool,
}

const PROGRESS_EVERY: u64 = 1000;

impl<I> Progress<I> {
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<I, T> Iterator for Progress<I>
where
    I: Iterator<Item = MergeResult<T>>,
{
    type Item = MergeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(Ok(item)) => {
                self.count += 1;
                if self.enabled && self.count % PROGRESS_EVERY == 0 {
                    SafeStderr::new().write_progress(&format!("{} lines", self.count));
                }
                Some(Ok(item))
            }
            Some(Err(e)) => Some(Err(e)),
            None => {
                if self.enabled && !self.reported {
                    self.reported = true;
                    SafeStderr::new().writeln(&format!("{} lines", self.count));
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Adapters for record streams
pub trait RecordStreamExt<P>: Iterator<Item = MergeResult<Record<P>>> + Sized {
    fn filter_records<F: RecordFilter<P>>(self, filter: F) -> Filtered<Self, F> {
        Filtered { inner: self, filter }
    }

    fn non_empty(self) -> NonEmpty<Self> {
        NonEmpty {
            inner: self,
            seen: false,
            done: false,
        }
    }

    fn progress(self, enabled: bool) -> Progress<Self> {
        Progress {
            inner: self,
            count: 0,
            enabled,
            reported: false,
        }
    }
}

impl<I, P> RecordStreamExt<P> for I where I: Iterator<Item = MergeResult<Record<P>>> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::epoch_seconds;

    // 2010-04-24T23:59:59Z
    const LAST_SECOND_OF_DAY: i64 = 1_272_153_599;

    fn records(secs: &[i64]) -> Vec<MergeResult<Record<String>>> {
        secs.iter()
            .enumerate()
            .map(|(i, s)| Ok(Record::new(epoch_seconds(*s), i as u64 + 1, s.to_string())))
            .collect()
    }

    fn kept<I: Iterator<Item = MergeResult<Record<String>>>>(iter: I) -> Vec<i64> {
        iter.map(|r| r.unwrap().timestamp().timestamp()).collect()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_filter_uses_utc_day() {
        let input = records(&[LAST_SECOND_OF_DAY - 1, LAST_SECOND_OF_DAY, LAST_SECOND_OF_DAY + 1]);
        let out = kept(input.into_iter().filter_records(DateFilter::new(ymd(2010, 4, 24))));
        assert_eq!(out, vec![LAST_SECOND_OF_DAY - 1, LAST_SECOND_OF_DAY]);
    }

    #[test]
    fn test_range_start_inclusive_end_exclusive() {
        let filter = DateRangeFilter::from_dates(Some(ymd(2010, 4, 24)), Some(ymd(2010, 4, 25))).unwrap();
        let day_start = LAST_SECOND_OF_DAY - 86_399;
        let input = records(&[day_start - 1, day_start, LAST_SECOND_OF_DAY, LAST_SECOND_OF_DAY + 1]);
        let out = kept(input.into_iter().filter_records(filter));
        assert_eq!(out, vec![day_start, LAST_SECOND_OF_DAY]);
    }

    #[test]
    fn test_range_open_ends() {
        let from = DateRangeFilter::new(Some(epoch_seconds(10)), None).unwrap();
        assert_eq!(kept(records(&[5, 10, 15]).into_iter().filter_records(from)), vec![10, 15]);

        let until = DateRangeFilter::new(None, Some(epoch_seconds(10))).unwrap();
        assert_eq!(kept(records(&[5, 10, 15]).into_iter().filter_records(until)), vec![5]);
    }

    #[test]
    fn test_range_without_bounds_is_rejected() {
        assert!(matches!(
            DateRangeFilter::new(None, None),
            Err(MergeError::Configuration(_))
        ));
    }

    #[test]
    fn test_sample_keeps_first_and_gaps_at_most_fifteen() {
        let secs: Vec<i64> = (0..2000).collect();
        let out = kept(records(&secs).into_iter().filter_records(SampleFilter::with_seed(7)));
        assert_eq!(out[0], 0);
        assert!(out.len() < secs.len());
        for pair in out.windows(2) {
            assert!(pair[1] - pair[0] <= 16, "gap too large: {:?}", pair);
        }
    }

    #[test]
    fn test_sample_is_reproducible_with_seed() {
        let secs: Vec<i64> = (0..500).collect();
        let a = kept(records(&secs).into_iter().filter_records(SampleFilter::with_seed(42)));
        let b = kept(records(&secs).into_iter().filter_records(SampleFilter::with_seed(42)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_errors_pass_through_filters() {
        let mut input = records(&[1, 2]);
        input.insert(1, Err(MergeError::config("boom")));
        let filter = DateRangeFilter::new(Some(epoch_seconds(100)), None).unwrap();
        let out: Vec<_> = input.into_iter().filter_records(filter).collect();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[test]
    fn test_non_empty_reports_empty_input() {
        let mut empty = Vec::<MergeResult<Record<String>>>::new().into_iter().non_empty();
        assert!(matches!(empty.next(), Some(Err(MergeError::Empty))));
        assert!(empty.next().is_none());

        let out: Vec<_> = records(&[1]).into_iter().non_empty().collect();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn test_progress_counts_records() {
        let mut progress = records(&[1, 2, 3]).into_iter().progress(false);
        while progress.next().is_some() {}
        assert_eq!(progress.count(), 3);
    }
}
