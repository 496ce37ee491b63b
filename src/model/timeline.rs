//! Append-only rating history

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Rating vectors for one entity, one entry per game, ordered by time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingTimeline {
    times: Vec<NaiveDateTime>,
    ratings: Vec<Vec<f64>>,
}

impl RatingTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Entries must arrive in non-decreasing time order.
    pub fn push(&mut self, time: NaiveDateTime, ratings: Vec<f64>) {
        debug_assert!(self.times.last().map_or(true, |last| *last <= time));
        self.times.push(time);
        self.ratings.push(ratings);
    }

    /// Latest entry strictly before `time`
    pub fn before(&self, time: NaiveDateTime) -> Option<(NaiveDateTime, &[f64])> {
        let idx = self.times.partition_point(|t| *t < time);
        self.entry(idx.checked_sub(1)?)
    }

    /// Latest entry at or before `time`
    pub fn at_or_before(&self, time: NaiveDateTime) -> Option<(NaiveDateTime, &[f64])> {
        let idx = self.times.partition_point(|t| *t <= time);
        self.entry(idx.checked_sub(1)?)
    }

    fn entry(&self, idx: usize) -> Option<(NaiveDateTime, &[f64])> {
        Some((*self.times.get(idx)?, self.ratings.get(idx)?.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, &[f64])> {
        self.times
            .iter()
            .copied()
            .zip(self.ratings.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 11, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_lookup() {
        let mut timeline = RatingTimeline::new();
        timeline.push(day(1), vec![0.1]);
        timeline.push(day(8), vec![0.2]);

        assert!(timeline.before(day(1)).is_none());
        assert_eq!(timeline.at_or_before(day(1)).unwrap().1, &[0.1]);
        assert_eq!(timeline.before(day(8)).unwrap(), (day(1), &[0.1][..]));
        assert_eq!(timeline.at_or_before(day(8)).unwrap().1, &[0.2]);
        assert_eq!(timeline.before(day(30)).unwrap().0, day(8));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_history_preserved() {
        let mut timeline = RatingTimeline::new();
        for d in 1..=5 {
            timeline.push(day(d), vec![f64::from(d)]);
        }
        let values: Vec<f64> = timeline.iter().map(|(_, r)| r[0]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
