//! LSD radix sort for `u64` keys with a paired values array.
//! 8-bit passes, only over the bytes the largest key occupies. Stable via
//! counting + prefix sums.

/// Sort `keys` in ascending order and permute `vals` accordingly.
/// Temporary buffers are allocated once and reused across passes.
pub fn radix_sort_pairs_u64<V: Copy + Default>(keys: &mut [u64], vals: &mut [V]) {
    debug_assert_eq!(keys.len(), vals.len());
    let n = keys.len();
    if n <= 1 {
        return;
    }

    let max = keys.iter().copied().max().unwrap_or(0);
    let passes = (64 - max.leading_zeros() as usize).div_ceil(8);

    let mut tmp_keys = vec![0u64; n];
    let mut tmp_vals = vec![V::default(); n];

    for pass in 0..passes {
        let shift = pass * 8;
        let mut counts = [0usize; 256];
        for &k in keys.iter() {
            counts[((k >> shift) & 0xFF) as usize] += 1;
        }

        // all keys share this byte
        if counts.iter().any(|&c| c == n) {
            continue;
        }

        let mut sum = 0usize;
        for c in counts.iter_mut() {
            let tmp = *c;
            *c = sum;
            sum += tmp;
        }

        for i in 0..n {
            let k = keys[i];
            let b = ((k >> shift) & 0xFF) as usize;
            let pos = counts[b];
            tmp_keys[pos] = k;
            tmp_vals[pos] = vals[i];
            counts[b] = pos + 1;
        }

        keys.copy_from_slice(&tmp_keys);
        vals.copy_from_slice(&tmp_vals);
    }
}
