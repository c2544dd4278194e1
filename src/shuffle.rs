use rand::Rng;

/// Uniform Fisher–Yates permutation of `items`.
pub fn shuffle<T, R: Rng + ?Sized>(mut items: Vec<T>, rng: &mut R) -> Vec<T> {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sorted<T: Ord + Clone>(v: &[T]) -> Vec<T> {
        let mut v = v.to_vec();
        v.sort();
        v
    }

    #[test]
    fn empty_and_single() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(shuffle(Vec::<u8>::new(), &mut rng).is_empty());
        assert_eq!(shuffle(vec!["only"], &mut rng), vec!["only"]);
    }

    #[test]
    fn is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let input: Vec<u32> = (0..16).chain([3, 3, 9]).collect();
        for _ in 0..50 {
            let out = shuffle(input.clone(), &mut rng);
            assert_eq!(sorted(&out), sorted(&input));
        }
    }

    #[test]
    fn seeded_shuffles_repeat() {
        let input: Vec<u32> = (0..16).collect();
        let a = shuffle(input.clone(), &mut StdRng::seed_from_u64(42));
        let b = shuffle(input, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn every_position_is_reachable() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = [[false; 4]; 4];
        for _ in 0..500 {
            let out = shuffle(vec![0usize, 1, 2, 3], &mut rng);
            for (pos, &v) in out.iter().enumerate() {
                seen[v][pos] = true;
            }
        }
        assert!(seen.iter().flatten().all(|&s| s));
    }
}
