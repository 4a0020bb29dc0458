use serde::{Deserialize, Serialize};

use crate::config::{BiasConfig, ConfigError};
use crate::core::{AggregationError, RollingMean, TimeframeAggregator};
use crate::models::{Bar, Bias, Timeframe};

/// Supplies the HTF bias for each base bar.
pub trait BiasService: Send {
    /// Update internal HTF state with the new base bar and return the latest bias.
    fn on_base_bar(&mut self, bar: &Bar) -> Result<Bias, AggregationError>;
}

/// Constant bias; handy for hosts that compute bias elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct FixedBias(pub Bias);

impl BiasService for FixedBias {
    fn on_base_bar(&mut self, _bar: &Bar) -> Result<Bias, AggregationError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneVote {
    pub timeframe: Timeframe,
    pub vote: Bias,
}

/// One timeframe of the vote: aggregator + SMA of the aggregated closes.
#[derive(Debug, Clone)]
struct Lane {
    timeframe: Timeframe,
    aggregator: TimeframeAggregator,
    sma: RollingMean,
    vote: Bias,
}

impl Lane {
    fn new(timeframe: Timeframe, sma_len: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            timeframe,
            aggregator: TimeframeAggregator::for_timeframe(timeframe)?,
            sma: RollingMean::new(sma_len)?,
            vote: Bias::Neutral,
        })
    }

    /// Re-vote only when a candle completes; otherwise hold the last vote.
    fn update(&mut self, bar: &Bar) -> Result<(), AggregationError> {
        let Some(candle) = self.aggregator.on_base_bar(bar)? else {
            return Ok(());
        };

        self.vote = match self.sma.push(candle.close) {
            Some(mean) if candle.close > mean => Bias::Bullish,
            Some(mean) if candle.close < mean => Bias::Bearish,
            _ => Bias::Neutral,
        };
        Ok(())
    }
}

/// Close-vs-SMA vote across three higher timeframes, two of three must agree.
#[derive(Debug, Clone)]
pub struct BiasVoter {
    lanes: [Lane; 3],
}

impl BiasVoter {
    pub fn new(cfg: &BiasConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let [short, medium, long] = cfg.timeframes;
        Ok(Self {
            lanes: [
                Lane::new(short, cfg.sma_len)?,
                Lane::new(medium, cfg.sma_len)?,
                Lane::new(long, cfg.sma_len)?,
            ],
        })
    }

    /// Combine three lane votes into the consensus bias.
    pub fn consensus(votes: [Bias; 3]) -> Bias {
        let sum: i32 = votes.iter().map(|v| i32::from(v.vote())).sum();
        Bias::from_vote_sum(sum)
    }

    pub fn votes(&self) -> [LaneVote; 3] {
        self.lanes.each_ref().map(|lane| LaneVote {
            timeframe: lane.timeframe,
            vote: lane.vote,
        })
    }

    pub fn current(&self) -> Bias {
        Self::consensus(self.lanes.each_ref().map(|lane| lane.vote))
    }
}

impl BiasService for BiasVoter {
    fn on_base_bar(&mut self, bar: &Bar) -> Result<Bias, AggregationError> {
        for lane in &mut self.lanes {
            lane.update(bar)?;
        }
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{bar_at, base_time};
    use chrono::Duration;

    fn rising_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let p = 100.0 + i as f64;
                bar_at(
                    base_time() + Duration::minutes(5 * i as i64),
                    (p, p + 0.5, p - 0.5, p + 0.25),
                )
            })
            .collect()
    }

    fn votes_of(voter: &BiasVoter) -> Vec<Bias> {
        voter.votes().iter().map(|v| v.vote).collect()
    }

    #[test]
    fn consensus_needs_two_of_three() {
        use Bias::*;
        assert_eq!(BiasVoter::consensus([Bullish, Bullish, Neutral]), Bullish);
        assert_eq!(BiasVoter::consensus([Bullish, Bearish, Neutral]), Neutral);
        assert_eq!(BiasVoter::consensus([Bearish, Bearish, Bearish]), Bearish);
        assert_eq!(BiasVoter::consensus([Bullish, Bullish, Bearish]), Neutral);
        assert_eq!(BiasVoter::consensus([Bearish, Bearish, Neutral]), Bearish);
        assert_eq!(BiasVoter::consensus([Neutral, Neutral, Bullish]), Neutral);
    }

    #[test]
    fn rejects_bad_config() {
        let dup = BiasConfig {
            timeframes: [Timeframe::H1, Timeframe::M15, Timeframe::H1],
            sma_len: 10,
        };
        assert!(matches!(
            BiasVoter::new(&dup),
            Err(ConfigError::DuplicateTimeframe(Timeframe::H1))
        ));
        let zero = BiasConfig {
            sma_len: 0,
            ..BiasConfig::default()
        };
        assert!(BiasVoter::new(&zero).is_err());
    }

    #[test]
    fn rising_market_turns_bullish_once_two_lanes_vote() {
        let cfg = BiasConfig {
            timeframes: [Timeframe::M15, Timeframe::H1, Timeframe::H4],
            sma_len: 2,
        };
        let mut voter = BiasVoter::new(&cfg).unwrap();
        let bars = rising_bars(30);

        let biases: Vec<Bias> = bars
            .iter()
            .map(|b| voter.on_base_bar(b).unwrap())
            .collect();

        // 09:30 closes the second quarter-hour: the 15m lane turns bullish alone.
        assert_eq!(biases[6], Bias::Neutral);
        // 10:55: the 1h lane has only one completed candle.
        assert_eq!(biases[23], Bias::Neutral);
        // 11:00 completes the second hour.
        assert_eq!(biases[24], Bias::Bullish);
        assert_eq!(
            votes_of(&voter),
            vec![Bias::Bullish, Bias::Bullish, Bias::Neutral]
        );
    }

    #[test]
    fn votes_hold_between_completed_candles() {
        let cfg = BiasConfig {
            timeframes: [Timeframe::M15, Timeframe::H1, Timeframe::H4],
            sma_len: 2,
        };
        let mut voter = BiasVoter::new(&cfg).unwrap();
        let bars = rising_bars(7);
        for b in &bars {
            voter.on_base_bar(b).unwrap();
        }
        assert_eq!(votes_of(&voter)[0], Bias::Bullish);

        // A sharp drop inside the same quarter does not re-vote yet.
        let drop = bar_at(
            base_time() + Duration::minutes(35),
            (50.0, 50.5, 49.0, 49.5),
        );
        voter.on_base_bar(&drop).unwrap();
        assert_eq!(votes_of(&voter)[0], Bias::Bullish);
    }

    #[test]
    fn fixed_bias_ignores_bars() {
        let mut fixed = FixedBias(Bias::Bearish);
        let b = bar_at(base_time(), (1.0, 2.0, 0.5, 1.5));
        assert_eq!(fixed.on_base_bar(&b).unwrap(), Bias::Bearish);
    }
}
