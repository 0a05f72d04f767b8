const DEFAULT_PRECISION: usize = 2;
const MAX_PRECISION: usize = 8;

/// Number of decimals to render a price with. Smaller prices get more.
pub fn price_precision(price: f64) -> usize {
    if !price.is_finite() || price <= 0.0 {
        return DEFAULT_PRECISION;
    }
    match price {
        p if p >= 10_000.0 => 1,
        p if p >= 1_000.0 => 2,
        p if p >= 1.0 => 4,
        p if p >= 0.01 => 6,
        _ => MAX_PRECISION,
    }
}

/// Decimals needed to write a bucket size without losing digits, e.g. 0.25 → 2.
pub fn bucket_precision(bucket_size: f64) -> usize {
    if !bucket_size.is_finite() || bucket_size <= 0.0 {
        return 0;
    }
    (0..=MAX_PRECISION)
        .find(|&decimals| {
            let scaled = bucket_size * 10f64.powi(decimals as i32);
            (scaled - scaled.round()).abs() < 1e-6
        })
        .unwrap_or(MAX_PRECISION)
}

/// Precision for a bucketed price: never coarser than the bucket itself.
pub fn display_precision(price: f64, bucket_size: f64) -> usize {
    price_precision(price).max(bucket_precision(bucket_size))
}

pub fn format_price(price: f64) -> String {
    format!("{:.*}", price_precision(price), price)
}
