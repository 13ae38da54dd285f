use std::collections::BTreeSet;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Answers "is this date a holiday". Owned outside the layout; the window
/// builder only calls it once per visible day.
pub trait HolidayPredicate {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

impl<F> HolidayPredicate for F
where
    F: Fn(NaiveDate) -> bool,
{
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self(date)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayPredicate for NoHolidays {
    fn is_holiday(&self, _date: NaiveDate) -> bool {
        false
    }
}

/// Fixed set of dates, usually read from the `holidays` config key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet {
    dates: BTreeSet<NaiveDate>,
}

impl HolidaySet {
    pub fn new<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Parses a comma or whitespace separated list of `YYYY-MM-DD` dates.
    #[tracing::instrument]
    pub fn parse_list(raw: &str) -> anyhow::Result<Self> {
        let mut dates = BTreeSet::new();
        for token in raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            let date = NaiveDate::parse_from_str(token, "%Y-%m-%d")
                .with_context(|| format!("invalid holiday date: {token}"))?;
            if !dates.insert(date) {
                warn!(%date, "duplicate holiday date");
            }
        }
        debug!(count = dates.len(), "parsed holiday list");
        Ok(Self { dates })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl HolidayPredicate for HolidaySet {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

impl std::str::FromStr for HolidaySet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(anyhow!("holiday list cannot be empty"));
        }
        Self::parse_list(s)
    }
}
