//! Combinatorial indexing ("CWRS") for pulse vectors.
//!
//! A PVQ codeword is an integer vector `y` of length `n` whose absolute values sum to
//! `k` (the number of pulses). The number of such vectors is given by the recurrence
//!
//! ```text
//! V(n, 0) = 1
//! V(0, k) = 0          for k > 0
//! V(n, k) = V(n-1, k) + V(n, k-1) + V(n-1, k-1)
//! ```
//!
//! [`encode_pulses`] and [`decode_pulses`] map between a pulse vector and a unique index
//! in `0..V(n, k)`, processing positions left to right: at each position the remaining
//! budget of combinations is partitioned first by magnitude (0, 1, 2, ...) and then, for
//! nonzero magnitudes, by sign (positive block before negative block). This keeps the two
//! directions trivially consistent with each other without needing a closed-form inverse.

/// Builds the `V(n, k)` table for `n` in `0..=n_max` and `k` in `0..=k_max`.
fn build_table(n_max: usize, k_max: usize) -> Vec<Vec<u64>> {
    let mut table = vec![vec![0u64; k_max + 1]; n_max + 1];
    for row in &mut table {
        row[0] = 1;
    }
    for n in 1..=n_max {
        for k in 1..=k_max {
            table[n][k] = table[n - 1][k] + table[n][k - 1] + table[n - 1][k - 1];
        }
    }
    table
}

/// Returns `V(n, k)`, the number of length-`n` pulse vectors with `k` total pulses.
pub(crate) fn count_combinations(n: usize, k: usize) -> u64 {
    build_table(n, k)[n][k]
}

/// Encodes a pulse vector into its combinatorial index.
///
/// `y.len()` gives `n`; the number of pulses `k` is the sum of `y`'s absolute values.
pub(crate) fn encode_pulses(y: &[i32]) -> u64 {
    let n = y.len();
    let k: u32 = y.iter().map(|&v| v.unsigned_abs()).sum();
    let table = build_table(n, k as usize);

    let mut index: u64 = 0;
    let mut k_left = k as usize;
    for (i, &yi) in y.iter().enumerate() {
        let remaining = n - i - 1;
        let mag = yi.unsigned_abs() as usize;

        for m in 0..mag {
            index += if m == 0 {
                table[remaining][k_left]
            } else {
                2 * table[remaining][k_left - m]
            };
        }
        if mag > 0 && yi < 0 {
            index += table[remaining][k_left - mag];
        }
        k_left -= mag;
    }
    index
}

/// Decodes a combinatorial index back into its pulse vector.
///
/// `n` is the vector length and `k` the pulse count, both of which the caller must
/// already know (they come from the band's allocation, not the bitstream directly).
pub(crate) fn decode_pulses(n: usize, k: u32, mut index: u64) -> Vec<i32> {
    let table = build_table(n, k as usize);

    let mut y = vec![0i32; n];
    let mut k_left = k as usize;
    for (i, slot) in y.iter_mut().enumerate() {
        let remaining = n - i - 1;
        let mut mag = 0usize;
        loop {
            let bucket = if mag == 0 {
                table[remaining][k_left]
            } else {
                2 * table[remaining][k_left - mag]
            };
            if index < bucket {
                if mag == 0 {
                    *slot = 0;
                } else {
                    let half = table[remaining][k_left - mag];
                    if index < half {
                        *slot = mag as i32;
                    } else {
                        index -= half;
                        *slot = -(mag as i32);
                    }
                }
                break;
            }
            index -= bucket;
            mag += 1;
        }
        k_left -= mag;
    }
    y
}

/// Number of bits needed to distinguish all `V(n, k)` codewords, rounded up.
pub(crate) fn required_bits(n: usize, k: usize) -> u32 {
    let combinations = count_combinations(n, k);
    if combinations <= 1 {
        0
    } else {
        64 - (combinations - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_combination_counts() {
        assert_eq!(count_combinations(2, 1), 4);
        assert_eq!(count_combinations(3, 2), 18);
        assert_eq!(count_combinations(4, 4), 192);
        assert_eq!(count_combinations(8, 4), 2816);
        assert_eq!(count_combinations(9, 9), 864_146);
    }

    #[test]
    fn round_trips_every_codeword_for_a_small_case() {
        let n = 4;
        let k = 3;
        let total = count_combinations(n, k);
        for index in 0..total {
            let y = decode_pulses(n, k as u32, index);
            assert_eq!(y.iter().map(|v| v.unsigned_abs()).sum::<u32>(), k as u32);
            assert_eq!(encode_pulses(&y), index);
        }
    }

    #[test]
    fn round_trips_a_specific_vector() {
        let y = vec![2, -1, 0, 3, -1];
        let k: u32 = y.iter().map(|v| v.unsigned_abs()).sum();
        let index = encode_pulses(&y);
        assert_eq!(decode_pulses(y.len(), k, index), y);
    }

    #[test]
    fn zero_pulses_is_the_only_codeword() {
        assert_eq!(count_combinations(5, 0), 1);
        assert_eq!(decode_pulses(5, 0, 0), vec![0, 0, 0, 0, 0]);
        assert_eq!(encode_pulses(&[0, 0, 0, 0, 0]), 0);
    }
}
