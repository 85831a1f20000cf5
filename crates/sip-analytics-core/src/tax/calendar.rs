use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::str::FromStr;

use crate::error::AnalyticsError;
use crate::types::FundCategory;

/// April-March fiscal year, identified by the calendar year it starts in.
/// Rendered as `FY2024-25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FinancialYear {
    pub start_year: i32,
}

impl FinancialYear {
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    /// The fiscal year a date falls in
    pub fn for_date(date: NaiveDate) -> Self {
        if date.month() >= 4 {
            Self::new(date.year())
        } else {
            Self::new(date.year() - 1)
        }
    }

    /// 1 April of the start year
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year, 4, 1)
    }

    /// 31 March of the following year
    pub fn last_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year + 1, 3, 31)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::for_date(date) == *self
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{}-{:02}", self.start_year, (self.start_year + 1).rem_euclid(100))
    }
}

impl FromStr for FinancialYear {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalyticsError::InvalidInput {
            field: "financial_year".into(),
            reason: format!("'{s}' is not of the form FY2024-25"),
        };
        let body = s.trim().strip_prefix("FY").ok_or_else(invalid)?;
        let (start, end) = body.split_once('-').ok_or_else(invalid)?;
        let start_year: i32 = start.parse().map_err(|_| invalid())?;
        let end_suffix: i32 = end.parse().map_err(|_| invalid())?;
        if (start_year + 1).rem_euclid(100) != end_suffix {
            return Err(invalid());
        }
        Ok(Self::new(start_year))
    }
}

impl From<FinancialYear> for String {
    fn from(fy: FinancialYear) -> Self {
        fy.to_string()
    }
}

impl TryFrom<String> for FinancialYear {
    type Error = AnalyticsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Source of each fund's category. Unknown funds return `None`.
pub trait CategoryLookup {
    fn category_of(&self, fund_id: &str) -> Option<FundCategory>;
}

impl CategoryLookup for BTreeMap<String, FundCategory> {
    fn category_of(&self, fund_id: &str) -> Option<FundCategory> {
        self.get(fund_id).copied()
    }
}

impl<S: BuildHasher> CategoryLookup for HashMap<String, FundCategory, S> {
    fn category_of(&self, fund_id: &str) -> Option<FundCategory> {
        self.get(fund_id).copied()
    }
}

impl<L: CategoryLookup + ?Sized> CategoryLookup for &L {
    fn category_of(&self, fund_id: &str) -> Option<FundCategory> {
        (**self).category_of(fund_id)
    }
}
