//! Largest-remainder proportional allocation
//!
//! Distributes an integer total across weighted recipients so that the
//! allocated parts always sum to exactly the requested total: floor every
//! exact share, then hand the leftover units to the recipients with the
//! largest fractional remainders, ties broken by position.

/// Allocate `total` units proportionally to `weights`.
///
/// Returns one share per weight; the shares sum to `total` whenever the
/// weights are non-negative with a positive sum. A zero weight sum yields
/// all-zero shares.
pub fn largest_remainder(total: i64, weights: &[i64]) -> Vec<i64> {
    let weight_sum: i128 = weights.iter().map(|w| *w as i128).sum();
    if weight_sum <= 0 || total <= 0 {
        return vec![0; weights.len()];
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    let mut allocated: i64 = 0;

    for (idx, weight) in weights.iter().enumerate() {
        let exact = total as i128 * *weight as i128;
        let floor = (exact / weight_sum) as i64;
        shares.push(floor);
        remainders.push((idx, exact % weight_sum));
        allocated += floor;
    }

    // Hand out the residual units in descending remainder order; the sort is
    // stable, so equal remainders keep their input order
    remainders.sort_by(|a, b| b.1.cmp(&a.1));
    let mut residual = total - allocated;
    for (idx, _) in remainders {
        if residual == 0 {
            break;
        }
        shares[idx] += 1;
        residual -= 1;
    }

    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_split_needs_no_residual() {
        assert_eq!(largest_remainder(10, &[60, 40]), vec![6, 4]);
    }

    #[test]
    fn residual_goes_to_largest_remainder() {
        // Exact shares: 3.5 / 3.5; the tie is broken by position
        assert_eq!(largest_remainder(7, &[50, 50]), vec![4, 3]);
        // Exact shares: 0.999.., 0.999.., 1.0005.. -> floors 0,0,1 then two
        // residual units to the largest remainders
        assert_eq!(largest_remainder(3, &[333, 333, 334]), vec![1, 1, 1]);
    }

    #[test]
    fn zero_weights_allocate_nothing() {
        assert_eq!(largest_remainder(5, &[0, 0]), vec![0, 0]);
        assert_eq!(largest_remainder(0, &[3, 7]), vec![0, 0]);
    }

    #[test]
    fn single_recipient_takes_all() {
        assert_eq!(largest_remainder(9, &[123]), vec![9]);
    }

    proptest! {
        /// Conservation: the shares always sum to the requested total
        #[test]
        fn shares_sum_to_total(
            total in 0i64..10_000,
            weights in proptest::collection::vec(0i64..5_000, 1..12),
        ) {
            prop_assume!(weights.iter().sum::<i64>() > 0);
            let shares = largest_remainder(total, &weights);
            prop_assert_eq!(shares.iter().sum::<i64>(), total);
        }

        /// No share exceeds its exact proportion by more than one unit
        #[test]
        fn shares_stay_near_exact_proportion(
            total in 1i64..10_000,
            weights in proptest::collection::vec(1i64..5_000, 1..12),
        ) {
            let weight_sum: i64 = weights.iter().sum();
            let shares = largest_remainder(total, &weights);
            for (share, weight) in shares.iter().zip(&weights) {
                let exact = total as f64 * *weight as f64 / weight_sum as f64;
                prop_assert!((*share as f64 - exact).abs() < 1.0 + 1e-9);
            }
        }
    }
}
