use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a dues obligation comes due for a scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Daily => "Daily",
            Granularity::Monthly => "Monthly",
        }
    }
}

/// Canonical key for one dues period: `YYYY-MM-DD` for daily schemes,
/// `YYYY-MM` for monthly schemes. Ordering on the canonical form is
/// chronological, so keys sort and compare without parsing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

const DAILY_KEY_LEN: usize = 10;
const MONTHLY_KEY_LEN: usize = 7;

impl PeriodKey {
    /// Maps a calendar date to its period key at the requested granularity.
    pub fn of(date: NaiveDate, granularity: Granularity) -> Self {
        let key = match granularity {
            Granularity::Daily => date.format("%Y-%m-%d").to_string(),
            Granularity::Monthly => date.format("%Y-%m").to_string(),
        };
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Granularity implied by the key shape, if the shape is recognizable.
    pub fn granularity(&self) -> Option<Granularity> {
        match self.0.len() {
            DAILY_KEY_LEN => Some(Granularity::Daily),
            MONTHLY_KEY_LEN => Some(Granularity::Monthly),
            _ => None,
        }
    }

    /// First calendar day covered by this period, when the key parses.
    pub fn first_day(&self) -> Option<NaiveDate> {
        match self.granularity()? {
            Granularity::Daily => NaiveDate::parse_from_str(&self.0, "%Y-%m-%d").ok(),
            Granularity::Monthly => {
                NaiveDate::parse_from_str(&format!("{}-01", self.0), "%Y-%m-%d").ok()
            }
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.0.get(0..4)?.parse().ok()
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Enumerates every period key of `year` in ascending order: 12 entries for
/// monthly schemes, 365 or 366 for daily schemes.
pub fn periods_of_year(year: i32, granularity: Granularity) -> Vec<PeriodKey> {
    match granularity {
        Granularity::Monthly => (1..=12)
            .map(|month| PeriodKey(format!("{year:04}-{month:02}")))
            .collect(),
        Granularity::Daily => {
            let mut keys = Vec::with_capacity(366);
            let mut date = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
            while date.year() == year {
                keys.push(PeriodKey::of(date, Granularity::Daily));
                date += Duration::days(1);
            }
            keys
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_and_monthly_key_shapes() {
        let day = PeriodKey::of(date(2024, 3, 7), Granularity::Daily);
        assert_eq!(day.as_str(), "2024-03-07");
        assert_eq!(day.granularity(), Some(Granularity::Daily));

        let month = PeriodKey::of(date(2024, 3, 7), Granularity::Monthly);
        assert_eq!(month.as_str(), "2024-03");
        assert_eq!(month.granularity(), Some(Granularity::Monthly));
    }

    #[test]
    fn keys_order_chronologically() {
        let feb = PeriodKey::of(date(2024, 2, 1), Granularity::Monthly);
        let oct = PeriodKey::of(date(2024, 10, 1), Granularity::Monthly);
        assert!(feb < oct);

        let early = PeriodKey::of(date(2024, 1, 9), Granularity::Daily);
        let late = PeriodKey::of(date(2024, 1, 10), Granularity::Daily);
        assert!(early < late);
    }

    #[test]
    fn first_day_round_trips() {
        let key = PeriodKey::of(date(2024, 6, 15), Granularity::Daily);
        assert_eq!(key.first_day(), Some(date(2024, 6, 15)));

        let key = PeriodKey::of(date(2024, 6, 15), Granularity::Monthly);
        assert_eq!(key.first_day(), Some(date(2024, 6, 1)));
        assert_eq!(key.year(), Some(2024));
    }

    #[test]
    fn periods_of_year_counts() {
        assert_eq!(periods_of_year(2024, Granularity::Monthly).len(), 12);
        assert_eq!(periods_of_year(2024, Granularity::Daily).len(), 366);
        assert_eq!(periods_of_year(2023, Granularity::Daily).len(), 365);

        let months = periods_of_year(2024, Granularity::Monthly);
        assert_eq!(months.first().unwrap().as_str(), "2024-01");
        assert_eq!(months.last().unwrap().as_str(), "2024-12");
    }
}
