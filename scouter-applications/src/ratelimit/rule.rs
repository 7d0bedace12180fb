//! Rate-limit rule parsing

use crate::{ApplicationError, ApplicationResult};
use std::time::Duration;

/// Time unit of a rate-limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl Granularity {
    /// Length of one unit in seconds (a month is 30 days, a year 12 months)
    pub fn seconds(&self) -> u64 {
        match self {
            Granularity::Second => 1,
            Granularity::Minute => 60,
            Granularity::Hour => 60 * 60,
            Granularity::Day => 60 * 60 * 24,
            Granularity::Month => 60 * 60 * 24 * 30,
            Granularity::Year => 60 * 60 * 24 * 30 * 12,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    fn parse(unit: &str) -> Option<Self> {
        match unit.trim_end_matches('s') {
            "second" => Some(Granularity::Second),
            "minute" => Some(Granularity::Minute),
            "hour" => Some(Granularity::Hour),
            "day" => Some(Granularity::Day),
            "month" => Some(Granularity::Month),
            "year" => Some(Granularity::Year),
            _ => None,
        }
    }
}

/// `amount` hits per `multiples` x `granularity`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitItem {
    pub amount: u64,
    pub multiples: u64,
    pub granularity: Granularity,
}

impl RateLimitItem {
    pub fn new(amount: u64, multiples: u64, granularity: Granularity) -> Self {
        Self {
            amount,
            multiples,
            granularity,
        }
    }

    pub fn per_minute(amount: u64) -> Self {
        Self::new(amount, 1, Granularity::Minute)
    }

    pub fn per_hour(amount: u64) -> Self {
        Self::new(amount, 1, Granularity::Hour)
    }

    /// Window length
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.granularity.seconds() * self.multiples)
    }

    /// Storage key for this rule's counter
    pub fn key_for(&self, scope: &str, identity: &str) -> String {
        format!(
            "LIMITER/{}:{}/{}/{}/{}",
            scope,
            identity,
            self.amount,
            self.multiples,
            self.granularity.name()
        )
    }

    /// Parse a single rule such as `5/minute`, `10 per hour` or `100/2 hours`
    pub fn parse(rule: &str) -> ApplicationResult<Self> {
        let rule = rule.trim().to_ascii_lowercase();
        let invalid = || ApplicationError::validation(format!("Invalid rate limit rule: '{}'", rule));

        let (amount, period) = rule
            .split_once('/')
            .or_else(|| rule.split_once(" per "))
            .ok_or_else(invalid)?;

        let amount: u64 = amount.trim().parse().map_err(|_| invalid())?;
        let mut parts = period.split_whitespace();
        let (multiples, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(multiples), Some(unit), None) => {
                (multiples.parse::<u64>().map_err(|_| invalid())?, unit)
            }
            _ => return Err(invalid()),
        };

        let granularity = Granularity::parse(unit).ok_or_else(invalid)?;
        if amount == 0 || multiples == 0 {
            return Err(invalid());
        }

        Ok(Self::new(amount, multiples, granularity))
    }
}

impl std::fmt::Display for RateLimitItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} per {} {}",
            self.amount,
            self.multiples,
            self.granularity.name()
        )
    }
}

/// Parse `;`, `,` or `|` separated rules
pub fn parse_many(rules: &str) -> ApplicationResult<Vec<RateLimitItem>> {
    let items = rules
        .split([';', ',', '|'])
        .filter(|rule| !rule.trim().is_empty())
        .map(RateLimitItem::parse)
        .collect::<ApplicationResult<Vec<_>>>()?;

    if items.is_empty() {
        return Err(ApplicationError::validation("No rate limit rules given"));
    }

    Ok(items)
}
