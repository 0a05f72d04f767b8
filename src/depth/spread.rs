use crate::models::{CrossedBookWarning, OrderBookLevel};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Spread {
    /// `None` when either side is empty.
    pub spread: Option<f64>,
    pub spread_percentage: Option<f64>,
    pub crossed: Option<CrossedBookWarning>,
}

/// Spread between the best ask and best bid of two aggregated sides, each
/// ordered best first.
pub fn compute(asks: &[OrderBookLevel], bids: &[OrderBookLevel]) -> Spread {
    let (Some(best_ask), Some(best_bid)) = (asks.first(), bids.first()) else {
        return Spread::default();
    };

    let spread = best_ask.price - best_bid.price;
    let spread_percentage = if best_bid.price == 0.0 {
        0.0
    } else {
        spread / best_bid.price * 100.0
    };

    let crossed = (spread < 0.0).then_some(CrossedBookWarning {
        best_bid: best_bid.price,
        best_ask: best_ask.price,
    });

    Spread {
        spread: Some(spread),
        spread_percentage: Some(spread_percentage),
        crossed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64) -> OrderBookLevel {
        OrderBookLevel {
            price,
            quantity: 1.0,
            cumulative_total: 1.0,
            percentage_of_max: 100.0,
        }
    }

    #[test]
    fn spread_from_the_touch() {
        let result = compute(&[level(100.1), level(100.5)], &[level(99.9), level(99.0)]);
        assert!((result.spread.unwrap() - 0.2).abs() < 1e-9);
        assert!((result.spread_percentage.unwrap() - 0.2002).abs() < 1e-4);
        assert!(result.crossed.is_none());
    }

    #[test]
    fn empty_side_leaves_spread_undefined() {
        let result = compute(&[], &[level(99.9)]);
        assert_eq!(result.spread, None);
        assert_eq!(result.spread_percentage, None);
        assert!(result.crossed.is_none());

        assert_eq!(compute(&[level(100.0)], &[]).spread, None);
    }

    #[test]
    fn crossed_book_is_flagged_not_clamped() {
        let result = compute(&[level(99.0)], &[level(100.0)]);
        assert_eq!(result.spread, Some(-1.0));
        assert_eq!(result.spread_percentage, Some(-1.0));
        assert_eq!(
            result.crossed,
            Some(CrossedBookWarning {
                best_bid: 100.0,
                best_ask: 99.0,
            })
        );
    }

    #[test]
    fn zero_bid_price_gives_zero_percentage() {
        let result = compute(&[level(1.0)], &[level(0.0)]);
        assert_eq!(result.spread, Some(1.0));
        assert_eq!(result.spread_percentage, Some(0.0));
    }
}
