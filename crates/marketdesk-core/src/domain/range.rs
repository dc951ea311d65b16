use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{BarResolution, UtcDateTime, ValidationError};

/// Time window selectable from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymbolicRange {
    OneDay,
    OneWeek,
    #[default]
    OneMonth,
    ThreeMonths,
    OneYear,
    Max,
}

impl SymbolicRange {
    pub const ALL: [Self; 6] = [
        Self::OneDay,
        Self::OneWeek,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::OneYear,
        Self::Max,
    ];

    /// Parse a range label. Unknown labels fall back to `1M`.
    pub fn parse_lenient(input: &str) -> Self {
        match input.trim().to_ascii_uppercase().as_str() {
            "1D" => Self::OneDay,
            "1W" => Self::OneWeek,
            "1M" => Self::OneMonth,
            "3M" => Self::ThreeMonths,
            "1Y" => Self::OneYear,
            "MAX" => Self::Max,
            _ => Self::default(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::OneYear => "1Y",
            Self::Max => "MAX",
        }
    }

    /// Views that refresh on the fast polling cadence.
    pub const fn is_intraday(self) -> bool {
        matches!(self, Self::OneDay)
    }
}

impl Display for SymbolicRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolicRange {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(value))
    }
}

impl Serialize for SymbolicRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SymbolicRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&value))
    }
}

/// Concrete query window produced by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeSpec {
    pub resolution: BarResolution,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl RangeSpec {
    pub fn new(
        resolution: BarResolution,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidWindow);
        }

        Ok(Self {
            resolution,
            start,
            end,
        })
    }

    pub fn contains(&self, instant: UtcDateTime) -> bool {
        instant >= self.start && instant <= self.end
    }
}
