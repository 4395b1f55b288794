//! Common constants and traits for pallet accounting.
//!
//! This module defines the shared limits and the small trait abstractions
//! used by order lines, placed items and pallets alike.

/// Global numerical tolerance for floating-point weight comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Maximum gross weight of one pallet in kg.
pub const DEFAULT_MAX_WEIGHT: f64 = 1000.0;

/// Maximum number of case layers on one pallet.
pub const DEFAULT_MAX_LAYERS: u32 = 7;

/// Fragile goods may only join pallets lighter than this (kg).
pub const DEFAULT_FRAGILE_WEIGHT_CEILING: f64 = 500.0;

/// Units per case when the order line does not say otherwise.
pub const DEFAULT_UNITS_PER_CASE: u32 = 12;

/// Cases per layer when the order line does not say otherwise.
pub const DEFAULT_CASES_PER_LAYER: u32 = 6;

/// Trait for anything that contributes weight to a pallet.
pub trait Weighted {
    /// Returns the total weight in kg.
    fn weight(&self) -> f64;
}

/// Trait for anything that occupies layers on a pallet.
pub trait Layered {
    /// Returns the number of case layers.
    fn layers(&self) -> u32;
}

/// Sums the weights of a slice of weighted values.
pub fn total_weight<T: Weighted>(values: &[T]) -> f64 {
    values.iter().map(Weighted::weight).sum()
}

/// Weight as a percentage of the given maximum.
///
/// Returns `0.0` for a non-positive maximum instead of dividing by zero.
#[inline]
pub fn utilization_percent(weight: f64, max_weight: f64) -> f64 {
    if max_weight <= 0.0 {
        return 0.0;
    }
    (weight * 100.0) / max_weight
}

/// Integer ceiling division for positive divisors.
#[inline]
pub const fn div_ceil(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Crate(f64);

    impl Weighted for Crate {
        fn weight(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn utilization_is_relative_to_max_weight() {
        assert_eq!(utilization_percent(600.0, 1000.0), 60.0);
        assert_eq!(utilization_percent(1000.0, 1000.0), 100.0);
    }

    #[test]
    fn utilization_guards_zero_capacity() {
        assert_eq!(utilization_percent(50.0, 0.0), 0.0);
    }

    #[test]
    fn total_weight_sums_all_values() {
        let crates = [Crate(1.5), Crate(2.5), Crate(6.0)];
        assert_eq!(total_weight(&crates), 10.0);
        assert_eq!(total_weight::<Crate>(&[]), 0.0);
    }

    #[test]
    fn div_ceil_rounds_up() {
        assert_eq!(div_ceil(24, 12), 2);
        assert_eq!(div_ceil(25, 12), 3);
        assert_eq!(div_ceil(1, 6), 1);
        assert_eq!(div_ceil(0, 6), 0);
    }
}
