use rand::SeedableRng;
use rand_pcg::Pcg32;

pub fn format_vec_separated_by<T: ToString>(
    vals: impl Iterator<Item = T>,
    separator: &str,
) -> String {
    vals.map(|v| v.to_string())
        .collect::<Vec<String>>()
        .join(separator)
}

pub fn format_vec<T: ToString>(vals: impl Iterator<Item = T>) -> String {
    format_vec_separated_by(vals, " ")
}

/// The random source of solver shuffles and sampling. Equal seeds give equal probing orders.
#[inline]
pub fn seeded_rng(seed: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng;

    #[test]
    fn formatting() {
        assert_eq!(format_vec([1, -2, 3].iter()), "1 -2 3");
        assert_eq!(format_vec_separated_by(["a", "b"].iter(), ","), "a,b");
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut first = seeded_rng(112358);
        let mut second = seeded_rng(112358);

        for _ in 0..4 {
            assert_eq!(first.gen::<u32>(), second.gen::<u32>());
        }
    }
}
