use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::errors::EngineError;
use crate::models::{OrderBookLevel, RawLevel, Side};

/// Quotients this close (relative) to an integer are treated as that integer,
/// so a price that already sits on a bucket boundary maps to itself.
const SNAP_EPSILON: f64 = 1e-9;

/// Groups one side's raw levels into `bucket_size` buckets and returns the
/// `depth` buckets nearest the touch, best first.
///
/// Asks round up and bids round down, i.e. both away from the touch. Each
/// returned level carries the running total from the touch outward and its
/// size relative to the largest bucket in the returned set.
pub fn aggregate(
    raw: &[RawLevel],
    bucket_size: f64,
    depth: usize,
    side: Side,
) -> Result<Vec<OrderBookLevel>, EngineError> {
    if !bucket_size.is_finite() || bucket_size <= 0.0 {
        return Err(EngineError::InvalidGrouping(format!(
            "bucket size must be a positive number, got {bucket_size}"
        )));
    }
    if depth == 0 {
        return Err(EngineError::InvalidGrouping(
            "depth must be at least 1".to_string(),
        ));
    }

    // bucket index → summed quantity; BTreeMap keeps indices ascending.
    // Indices stay f64 so tiny bucket sizes never saturate an integer cast.
    let mut buckets: BTreeMap<OrderedFloat<f64>, f64> = BTreeMap::new();
    for level in raw {
        if !level.price.is_finite() || !level.quantity.is_finite() || level.quantity <= 0.0 {
            continue;
        }
        let index = bucket_index(level.price, bucket_size, side);
        *buckets.entry(index).or_insert(0.0) += level.quantity;
    }

    let nearest: Vec<(OrderedFloat<f64>, f64)> = match side {
        Side::Ask => buckets.into_iter().take(depth).collect(),
        Side::Bid => buckets.into_iter().rev().take(depth).collect(),
    };

    let max = nearest.iter().map(|&(_, q)| q).fold(0.0_f64, f64::max);

    let mut cumulative = 0.0;
    let levels = nearest
        .into_iter()
        .map(|(index, quantity)| {
            cumulative += quantity;
            let percentage_of_max = if max > 0.0 {
                (quantity / max * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            };
            OrderBookLevel {
                price: index.0 * bucket_size,
                quantity,
                cumulative_total: cumulative,
                percentage_of_max,
            }
        })
        .collect();

    Ok(levels)
}

fn bucket_index(price: f64, bucket_size: f64, side: Side) -> OrderedFloat<f64> {
    let quotient = price / bucket_size;
    let nearest = quotient.round();
    if (quotient - nearest).abs() <= SNAP_EPSILON * quotient.abs().max(1.0) {
        return OrderedFloat(nearest);
    }
    OrderedFloat(match side {
        Side::Ask => quotient.ceil(),
        Side::Bid => quotient.floor(),
    })
}
