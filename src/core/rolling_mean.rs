use rust_decimal::Decimal;
use std::collections::VecDeque;

use crate::config::ConfigError;

/// Simple moving average over the last `len` values.
#[derive(Debug, Clone)]
pub struct RollingMean {
    len: usize,
    window: VecDeque<Decimal>,
    sum: Decimal,
    current: Option<Decimal>,
}

impl RollingMean {
    pub fn new(len: usize) -> Result<Self, ConfigError> {
        if len == 0 {
            return Err(ConfigError::NonPositiveWindow(len));
        }
        Ok(Self {
            len,
            window: VecDeque::with_capacity(len + 1),
            sum: Decimal::ZERO,
            current: None,
        })
    }

    /// Push a value; returns the mean once the window is full.
    pub fn push(&mut self, value: Decimal) -> Option<Decimal> {
        self.window.push_back(value);
        self.sum += value;

        if self.window.len() > self.len {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }

        if self.window.len() == self.len {
            self.current = Some(self.sum / Decimal::from(self.len));
        }
        self.current
    }

    pub fn current(&self) -> Option<Decimal> {
        self.current
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reference_mean(values: &[Decimal], n: usize, upto: usize) -> Option<Decimal> {
        if upto < n {
            return None;
        }
        let slice = &values[upto - n..upto];
        Some(slice.iter().copied().sum::<Decimal>() / Decimal::from(n))
    }

    #[test]
    fn rejects_zero_window() {
        assert_eq!(
            RollingMean::new(0).unwrap_err(),
            ConfigError::NonPositiveWindow(0)
        );
    }

    #[test]
    fn undefined_until_window_full() {
        let mut sma = RollingMean::new(3).unwrap();
        assert_eq!(sma.push(dec!(1)), None);
        assert_eq!(sma.push(dec!(2)), None);
        assert_eq!(sma.push(dec!(3)), Some(dec!(2)));
        assert_eq!(sma.push(dec!(7)), Some(dec!(4)));
        assert_eq!(sma.len(), 3);
        assert_eq!(sma.current(), Some(dec!(4)));
    }

    #[test]
    fn window_of_one_tracks_last_value() {
        let mut sma = RollingMean::new(1).unwrap();
        assert_eq!(sma.push(dec!(10.5)), Some(dec!(10.5)));
        assert_eq!(sma.push(dec!(-2)), Some(dec!(-2)));
    }

    #[test]
    fn matches_reference_windowed_average() {
        let values: Vec<Decimal> = [
            dec!(100.25),
            dec!(101.5),
            dec!(99.75),
            dec!(102),
            dec!(98.5),
            dec!(103.25),
            dec!(104),
            dec!(97.5),
            dec!(100),
            dec!(101.75),
        ]
        .to_vec();

        for n in 1..=5 {
            let mut sma = RollingMean::new(n).unwrap();
            for (i, v) in values.iter().enumerate() {
                let got = sma.push(*v);
                assert_eq!(got, reference_mean(&values, n, i + 1), "n={} i={}", n, i);
            }
        }
    }
}
