use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::types::{Nav, NavPoint};
use crate::AnalyticsResult;

/// Simple return between two consecutive observations, dated at the later one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// A validated, date-ascending NAV series for one fund.
///
/// Holds a borrowed slice only, so every iterator it hands out starts from
/// the first observation and can be recreated at will.
#[derive(Debug, Clone, Copy)]
pub struct NavSeries<'a> {
    points: &'a [NavPoint],
}

impl<'a> NavSeries<'a> {
    pub fn new(points: &'a [NavPoint]) -> AnalyticsResult<Self> {
        if points.len() < 2 {
            return Err(AnalyticsError::InsufficientData(format!(
                "{} NAV observation(s); at least 2 required",
                points.len()
            )));
        }
        validate_points(points)?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &'a [NavPoint] {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &'a NavPoint {
        &self.points[0]
    }

    pub fn latest(&self) -> &'a NavPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn navs(&self) -> impl Iterator<Item = Nav> + 'a {
        self.points.iter().map(|p| p.nav)
    }

    /// `r_t = nav_t / nav_{t-1} - 1` over consecutive observations
    pub fn returns(&self) -> impl Iterator<Item = DailyReturn> + 'a {
        self.points.windows(2).map(|w| DailyReturn {
            date: w[1].date,
            value: w[1].nav / w[0].nav - Decimal::ONE,
        })
    }

    pub fn nav_on_or_before(&self, date: NaiveDate) -> Option<&'a NavPoint> {
        let idx = self.points.partition_point(|p| p.date <= date);
        idx.checked_sub(1).map(|i| &self.points[i])
    }

    /// Observation nearest to `date`; ties go to the earlier observation.
    pub fn closest_to(&self, date: NaiveDate) -> &'a NavPoint {
        let idx = self.points.partition_point(|p| p.date < date);
        if idx == 0 {
            return &self.points[0];
        }
        if idx == self.points.len() {
            return self.latest();
        }
        let before = &self.points[idx - 1];
        let after = &self.points[idx];
        if (after.date - date).num_days() < (date - before.date).num_days() {
            after
        } else {
            before
        }
    }
}

/// Checks NAV > 0 and strictly ascending dates (at most one NAV per date).
pub fn validate_points(points: &[NavPoint]) -> AnalyticsResult<()> {
    if let Some(bad) = points.iter().find(|p| p.nav <= Decimal::ZERO) {
        return Err(AnalyticsError::InvalidInput {
            field: "nav".into(),
            reason: format!("NAV for {} on {} must be positive", bad.fund_id, bad.date),
        });
    }
    if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
        return Err(AnalyticsError::InvalidInput {
            field: "nav_series".into(),
            reason: format!(
                "NAV series for {} not strictly ascending at {} -> {}",
                w[1].fund_id, w[0].date, w[1].date
            ),
        });
    }
    Ok(())
}

/// Daily simple returns of a NAV series. Fails with `InsufficientData`
/// for fewer than two observations.
pub fn daily_returns(points: &[NavPoint]) -> AnalyticsResult<impl Iterator<Item = DailyReturn> + '_> {
    Ok(NavSeries::new(points)?.returns())
}

/// Prefix of a date-ascending series up to and including `as_of`
pub fn up_to(points: &[NavPoint], as_of: NaiveDate) -> &[NavPoint] {
    let idx = points.partition_point(|p| p.date <= as_of);
    &points[..idx]
}

/// NAV for each calendar date, carrying the last observation forward over
/// gaps. Dates before the first observation get `None`. `calendar` must be
/// ascending.
pub fn carry_forward(points: &[NavPoint], calendar: &[NaiveDate]) -> Vec<Option<Nav>> {
    let mut out = Vec::with_capacity(calendar.len());
    let mut cursor = 0;
    let mut last: Option<Nav> = None;

    for date in calendar {
        while cursor < points.len() && points[cursor].date <= *date {
            last = Some(points[cursor].nav);
            cursor += 1;
        }
        out.push(last);
    }
    out
}

/// NAV pairs on the dates both series observed, ascending.
pub fn inner_join(a: &[NavPoint], b: &[NavPoint]) -> Vec<(NaiveDate, Nav, Nav)> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].date.cmp(&b[j].date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((a[i].date, a[i].nav, b[j].nav));
                i += 1;
                j += 1;
            }
        }
    }
    out
}
