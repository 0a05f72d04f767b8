/// Multipliers applied to the base step of a price's order of magnitude.
const MULTIPLIERS: [f64; 7] = [1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0];

/// The base step sits this many orders of magnitude below the price, so a
/// 65 000 price starts at 1 and a 0.15 price starts at 0.00001.
const STEP_OFFSET: i32 = 4;

/// Order of magnitude of a price, or `None` for prices that have none.
pub fn magnitude(price: f64) -> Option<i32> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    Some(price.log10().floor() as i32)
}

/// Candidate bucket sizes for a given top-of-book price, finest first.
pub fn bucket_sizes(price: f64) -> Vec<f64> {
    magnitude(price)
        .map(sizes_for_magnitude)
        .unwrap_or_default()
}

fn sizes_for_magnitude(magnitude: i32) -> Vec<f64> {
    let exponent = magnitude - STEP_OFFSET;
    MULTIPLIERS
        .iter()
        .map(|m| {
            // dividing by an exact power of ten keeps 0.1-style steps as clean
            // as f64 allows; multiplying by 10^-n would not
            if exponent >= 0 {
                m * 10f64.powi(exponent)
            } else {
                m / 10f64.powi(-exponent)
            }
        })
        .collect()
}

/// Tracks the price magnitude and only recomputes the candidate set when it
/// changes, so a picker built on top keeps stable choices.
#[derive(Debug, Default, Clone)]
pub struct BucketSelector {
    magnitude: Option<i32>,
    sizes: Vec<f64>,
}

impl BucketSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a new top-of-book price. Returns the new candidate set when the
    /// magnitude moved, `None` otherwise.
    pub fn observe(&mut self, price: f64) -> Option<&[f64]> {
        let magnitude = magnitude(price)?;
        if self.magnitude == Some(magnitude) {
            return None;
        }
        self.magnitude = Some(magnitude);
        self.sizes = sizes_for_magnitude(magnitude);
        Some(&self.sizes)
    }

    pub fn sizes(&self) -> &[f64] {
        &self.sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_prices_get_coarse_buckets() {
        assert_eq!(
            bucket_sizes(65_000.0),
            vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
        );
        assert_eq!(
            bucket_sizes(3_200.0),
            vec![0.1, 0.2, 0.5, 1.0, 2.5, 5.0, 10.0]
        );
    }

    #[test]
    fn sub_unit_prices_get_fractional_buckets() {
        assert_eq!(
            bucket_sizes(0.15),
            vec![0.00001, 0.00002, 0.00005, 0.0001, 0.00025, 0.0005, 0.001]
        );
    }

    #[test]
    fn unusable_prices_have_no_candidates() {
        assert!(bucket_sizes(0.0).is_empty());
        assert!(bucket_sizes(-3.0).is_empty());
        assert!(bucket_sizes(f64::NAN).is_empty());
    }

    #[test]
    fn selector_only_recomputes_on_magnitude_change() {
        let mut selector = BucketSelector::new();
        assert!(selector.observe(65_000.0).is_some());
        assert!(selector.observe(64_100.0).is_none());
        assert!(selector.observe(99_999.0).is_none());
        assert_eq!(selector.sizes()[0], 1.0);

        let sizes = selector.observe(100_250.0).unwrap().to_vec();
        assert_eq!(sizes[0], 10.0);
        assert!(selector.observe(0.0).is_none());
        assert_eq!(selector.sizes()[0], 10.0);
    }
}
