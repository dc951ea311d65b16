use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};
use time::Duration;

/// Granularity of the bars requested for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarResolution {
    Minutes(u32),
    Hours(u32),
    Day,
    Week,
    Month,
}

impl BarResolution {
    /// Fixed width of one bar. Months have no fixed width.
    pub fn step(self) -> Option<Duration> {
        match self {
            Self::Minutes(n) => Some(Duration::minutes(i64::from(n.max(1)))),
            Self::Hours(n) => Some(Duration::hours(i64::from(n.max(1)))),
            Self::Day => Some(Duration::days(1)),
            Self::Week => Some(Duration::weeks(1)),
            Self::Month => None,
        }
    }

    pub const fn is_intraday(self) -> bool {
        matches!(self, Self::Minutes(_) | Self::Hours(_))
    }
}

impl Display for BarResolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minutes(n) => write!(f, "{n}m"),
            Self::Hours(n) => write!(f, "{n}h"),
            Self::Day => f.write_str("1d"),
            Self::Week => f.write_str("1w"),
            Self::Month => f.write_str("1mo"),
        }
    }
}

impl Serialize for BarResolution {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
