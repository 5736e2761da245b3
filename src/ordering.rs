use crate::interval::SelectionUnit;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Highest summed quality first; ties keep encounter order. Seed independent.
    QualityDescending,
    /// Uniform permutation, reproducible when seeded.
    Random { seed: Option<u64> },
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self::Random { seed: None }
    }
}

/// Creates a random number generator, seeded when a seed is given and
/// drawn from OS entropy otherwise.
#[must_use]
pub fn create_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Indices into `units` in the order they should be considered.
pub fn selection_order(units: &[SelectionUnit], policy: OrderPolicy) -> Vec<usize> {
    let mut order = (0..units.len()).collect::<Vec<_>>();
    match policy {
        OrderPolicy::QualityDescending => {
            let keys = units.iter().map(SelectionUnit::quality).collect::<Vec<_>>();
            order.sort_by(|lhs, rhs| keys[*rhs].total_cmp(&keys[*lhs]));
        }
        OrderPolicy::Random { seed } => {
            let mut rng = create_rng(seed);
            order.shuffle(&mut rng);
        }
    }
    order
}
