//! CloudTrail log layout: day partitions of a trail's bucket.

use chrono::NaiveDate;

use crate::{Error, Result};

/// Date format of the day partitions, and of user provided dates.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// An inclusive range of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if to < from {
            return Err(Error::InvertedRange { from, to });
        }

        Ok(Self { from, to })
    }

    /// Parse a range from two `YYYY/MM/DD` dates.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        let parse = |input: &str| {
            NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|source| Error::InvalidDate {
                input: input.to_owned(),
                source,
            })
        };

        Self::new(parse(from)?, parse(to)?)
    }

    /// Iterate over every day of the range, both ends included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |day| *day <= to)
    }

    #[inline]
    pub fn from(&self) -> NaiveDate {
        self.from
    }

    #[inline]
    pub fn to(&self) -> NaiveDate {
        self.to
    }
}

/// Where a trail delivers the logs of a region into its bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailLocation {
    /// Optional key prefix configured on the trail.
    pub key_prefix: String,
    pub account_id: String,
    pub region: String,
}

impl TrailLocation {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            key_prefix: String::new(),
            account_id: account_id.into(),
            region: region.into(),
        }
    }

    #[inline]
    pub fn with_key_prefix(self, key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            ..self
        }
    }

    /// Key prefix of the logs delivered on `day`.
    pub fn day_prefix(&self, day: NaiveDate) -> String {
        let prefix = self.key_prefix.trim_matches('/');
        let path = format!(
            "AWSLogs/{}/CloudTrail/{}/{}",
            self.account_id,
            self.region,
            day.format(DATE_FORMAT)
        );

        if prefix.is_empty() {
            path
        } else {
            format!("{prefix}/{path}")
        }
    }

    /// Key prefixes of the logs delivered over `range`, one partition per day.
    pub fn partitions(&self, range: &DateRange) -> Vec<String> {
        range.days().map(|day| self.day_prefix(day)).collect()
    }
}
