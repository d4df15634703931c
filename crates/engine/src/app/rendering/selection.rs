/// Moves the `k` items with the smallest `key` to the front of `items`, in
/// ascending order, and truncates the rest.
///
/// Runs `k` rounds of "find the minimum of the remaining tail", which is
/// O(n·k) and cheaper than a full sort when `k` is small relative to `n`.
/// Equal keys keep their original relative order.
pub fn select_closest<T>(items: &mut Vec<T>, k: usize, key: impl Fn(&T) -> f32) {
    if items.len() <= k {
        return;
    }
    for round in 0..k {
        let mut best = round;
        let mut best_key = key(&items[round]);
        for candidate in (round + 1)..items.len() {
            let candidate_key = key(&items[candidate]);
            if candidate_key < best_key {
                best = candidate;
                best_key = candidate_key;
            }
        }
        if best != round {
            // rotate keeps the unselected tail in its original order
            items[round..=best].rotate_right(1);
        }
    }
    items.truncate(k);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_k_smallest_in_ascending_order() {
        let mut items = vec![9.0, 1.0, 7.0, 3.0, 5.0, 2.0];
        select_closest(&mut items, 3, |v| *v);
        assert_eq!(items, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn short_input_is_left_untouched() {
        let mut items = vec![4.0, 2.0];
        select_closest(&mut items, 5, |v| *v);
        assert_eq!(items, vec![4.0, 2.0]);
    }

    #[test]
    fn ties_keep_original_order() {
        let mut items = vec![(1, 2.0), (2, 1.0), (3, 1.0), (4, 0.5)];
        select_closest(&mut items, 3, |(_, d)| *d);
        assert_eq!(items, vec![(4, 0.5), (2, 1.0), (3, 1.0)]);
    }

    #[test]
    fn zero_k_empties_list() {
        let mut items = vec![1.0, 2.0];
        select_closest(&mut items, 0, |v| *v);
        assert!(items.is_empty());
    }
}
