// =============================================================================
// Shared types used across the SMC scanner
// =============================================================================

use serde::{Deserialize, Serialize};

/// Side of the market an order block, signal, or structure test refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    /// Both directions, in the order the evaluator walks them.
    pub const ALL: [Direction; 2] = [Direction::Bullish, Direction::Bearish];
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Prevailing trend read from the fast/slow moving-average pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    /// `true` when the trend points the same way as `direction`.
    pub fn matches(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Trend::Bullish, Direction::Bullish) | (Trend::Bearish, Direction::Bearish)
        )
    }
}

impl Default for Trend {
    fn default() -> Self {
        Self::Sideways
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
            Self::Sideways => write!(f, "Sideways"),
        }
    }
}

/// Moving-average flavour used by the trend detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaKind {
    Simple,
    Exponential,
}

impl Default for MaKind {
    fn default() -> Self {
        Self::Simple
    }
}

impl std::fmt::Display for MaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "SMA"),
            Self::Exponential => write!(f, "EMA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_matches_only_same_side() {
        assert!(Trend::Bullish.matches(Direction::Bullish));
        assert!(Trend::Bearish.matches(Direction::Bearish));
        assert!(!Trend::Bullish.matches(Direction::Bearish));
        assert!(!Trend::Sideways.matches(Direction::Bullish));
        assert!(!Trend::Sideways.matches(Direction::Bearish));
    }

    #[test]
    fn ma_kind_deserialises_from_variant_name() {
        let kind: MaKind = serde_json::from_str("\"Exponential\"").unwrap();
        assert_eq!(kind, MaKind::Exponential);
    }
}
