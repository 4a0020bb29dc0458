use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a retest setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    pub fn side(self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }
}

/// Order side of a trade intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Base-timeframe structure trend. `Unknown` only before the first bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    #[default]
    Unknown,
    Bull,
    Bear,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Unknown => write!(f, "unknown"),
            Trend::Bull => write!(f, "bull"),
            Trend::Bear => write!(f, "bear"),
        }
    }
}

/// Higher-timeframe directional consensus fed into the engine each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bearish,
    #[default]
    Neutral,
    Bullish,
}

impl Bias {
    pub fn vote(self) -> i8 {
        match self {
            Bias::Bearish => -1,
            Bias::Neutral => 0,
            Bias::Bullish => 1,
        }
    }

    /// Two-of-three rule: a directional bias needs a net sum of at least two.
    pub fn from_vote_sum(sum: i32) -> Self {
        if sum >= 2 {
            Bias::Bullish
        } else if sum <= -2 {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }

    /// The setup direction this bias allows, if any.
    pub fn to_direction(self) -> Option<Direction> {
        match self {
            Bias::Bullish => Some(Direction::Long),
            Bias::Bearish => Some(Direction::Short),
            Bias::Neutral => None,
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.vote())
    }
}
