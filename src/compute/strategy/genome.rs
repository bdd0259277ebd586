//! Variation and repair operators for the evolutionary strategy.
//!
//! A genome is a homogeneous [`Candidate`]: `k` radii, `k` class labels and
//! `k` counts. Every operator ends with [`GenomeOps::repair`], a fixed-order
//! pipeline of invariant fixers:
//!
//! 1. sort radii ascending
//! 2. push each radius at least one spacing past its predecessor
//! 3. clamp each sorted slot into the band that leaves room for its neighbours
//! 4. make sure every stocked class labels at least one ring
//! 5. recompute ring capacities
//! 6. spread each class's exact inventory over its rings
//!
//! Steps 1-3 repeat until the radii stop changing.

use super::sequential::sampler_caps;
use super::SearchRng;
use crate::compute::{FeasibilityMode, Validator};
use crate::schema::{Candidate, ClassAssignment, Envelope, GeneticConfig, Inventory, ObjectClass, RadiusDomain};

const MAX_RADIUS_PASSES: usize = 16;

/// Crossover, mutation and repair for ring genomes.
#[derive(Debug, Clone)]
pub struct GenomeOps {
    validator: Validator,
    domain: RadiusDomain,
    params: GeneticConfig,
}

impl GenomeOps {
    pub fn new(
        inventory: Inventory,
        envelope: Envelope,
        domain: RadiusDomain,
        params: GeneticConfig,
    ) -> Self {
        Self {
            validator: Validator::new(inventory, envelope),
            domain,
            params,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn domain(&self) -> &RadiusDomain {
        &self.domain
    }

    pub fn params(&self) -> &GeneticConfig {
        &self.params
    }

    fn inventory(&self) -> &Inventory {
        self.validator.inventory()
    }

    /// Whether a genome passes the exact-use rules.
    pub fn is_feasible(&self, genome: &Candidate) -> bool {
        self.validator.is_feasible(genome, FeasibilityMode::Exact)
    }

    /// Exchange genes between two parents in place, then repair both.
    ///
    /// A child that was feasible before and is infeasible after repair gets
    /// its previous genes back. Returns whether each child changed.
    pub fn crossover(&self, rng: &mut SearchRng, a: &mut Candidate, b: &mut Candidate) -> (bool, bool) {
        let before = (a.clone(), b.clone());

        if rng.chance(self.params.radius_exchange_rate) {
            for i in 0..a.radii.len().min(b.radii.len()) {
                if rng.chance(0.5) {
                    std::mem::swap(&mut a.radii[i], &mut b.radii[i]);
                }
            }
            a.radii.sort_by(f64::total_cmp);
            b.radii.sort_by(f64::total_cmp);
        }

        if rng.chance(self.params.label_exchange_rate) {
            std::mem::swap(&mut a.classes, &mut b.classes);
        }

        self.repair(a);
        self.repair(b);
        (
            self.keep_or_restore(a, before.0),
            self.keep_or_restore(b, before.1),
        )
    }

    /// Perturb radii and possibly swap two labels, then repair.
    ///
    /// Restores the previous genes if the result is infeasible and the input was not.
    pub fn mutate(&self, rng: &mut SearchRng, genome: &mut Candidate) -> bool {
        let before = genome.clone();
        let (min, max) = (self.domain.min_radius, self.domain.max_radius);

        for r in genome.radii.iter_mut() {
            if rng.chance(self.params.gene_mutation_rate) {
                *r = rng.gaussian(*r, self.params.radius_sigma).clamp(min, max);
            }
        }
        genome.radii.sort_by(f64::total_cmp);

        if let Some(labels) = genome.labels_mut()
            && labels.len() >= 2
            && rng.chance(self.params.label_swap_rate)
        {
            let (i, j) = rng.distinct_pair(labels.len());
            labels.swap(i, j);
        }

        self.repair(genome);
        self.keep_or_restore(genome, before)
    }

    fn keep_or_restore(&self, genome: &mut Candidate, before: Candidate) -> bool {
        if !self.is_feasible(genome) && self.is_feasible(&before) {
            *genome = before;
            return false;
        }
        *genome != before
    }

    /// Restore packing invariants. Idempotent.
    pub fn repair(&self, genome: &mut Candidate) {
        let k = genome.radii.len();
        if k == 0 {
            return;
        }
        genome.counts.resize(k, 0);
        if let ClassAssignment::PerRing(labels) = &mut genome.classes {
            labels.resize(k, ObjectClass::Long);
        }

        self.repair_radii(&mut genome.radii);

        let Some(labels) = genome.labels_mut() else {
            return;
        };
        let inventory = self.validator.inventory();
        if inventory.count(ObjectClass::Short) > 0 && !labels.contains(&ObjectClass::Short) {
            labels[0] = ObjectClass::Short;
        }
        if inventory.count(ObjectClass::Long) > 0 && !labels.contains(&ObjectClass::Long) {
            labels[k - 1] = ObjectClass::Long;
        }
        let labels = labels.clone();

        let caps = sampler_caps(self.validator.envelope(), &genome.radii);
        for class in ObjectClass::ALL {
            let rings: Vec<usize> = (0..k).filter(|&i| labels[i] == class).collect();
            redistribute(&rings, &caps, self.inventory().count(class), &mut genome.counts);
        }
    }

    fn repair_radii(&self, radii: &mut [f64]) {
        let k = radii.len();
        let s = self.domain.min_spacing;
        for r in radii.iter_mut() {
            if !r.is_finite() {
                *r = self.domain.min_radius;
            }
        }

        let mut lows = vec![self.domain.min_radius; k];
        for i in 1..k {
            lows[i] = lows[i - 1] + s;
        }
        let mut highs = vec![self.domain.max_radius; k];
        for i in (0..k.saturating_sub(1)).rev() {
            highs[i] = highs[i + 1] - s;
        }

        for _ in 0..MAX_RADIUS_PASSES {
            let previous = radii.to_vec();
            radii.sort_by(f64::total_cmp);
            for i in 1..k {
                if radii[i] - radii[i - 1] < s {
                    radii[i] = radii[i - 1] + s;
                }
            }
            for i in 0..k {
                radii[i] = radii[i].max(lows[i]).min(highs[i]);
            }
            if radii == previous.as_slice() {
                break;
            }
        }
    }
}

/// Spread `total` evenly over `rings`, at least 1 each, remainder on the
/// last ring. Each share is clamped so the later rings can still hold the rest.
///
/// When the rings cannot hold the total (or there are more rings than
/// objects) every ring is filled to capacity and the validator rejects the result.
fn redistribute(rings: &[usize], caps: &[u32], total: u32, counts: &mut [u32]) {
    if rings.is_empty() {
        return;
    }
    if total == 0 {
        for &i in rings {
            counts[i] = 0;
        }
        return;
    }
    let capacity: u32 = rings.iter().map(|&i| caps[i]).sum();
    if total > capacity || (total as usize) < rings.len() {
        for &i in rings {
            counts[i] = caps[i];
        }
        return;
    }

    let mut remaining = total;
    for (pos, &ring) in rings.iter().enumerate() {
        let later = &rings[pos + 1..];
        if later.is_empty() {
            counts[ring] = remaining;
            break;
        }
        let cap = caps[ring];
        let later_cap: u32 = later.iter().map(|&j| caps[j]).sum();
        let low = remaining.saturating_sub(later_cap).max(1);
        let high = cap.min(remaining - later.len() as u32);
        let share = remaining / (later.len() as u32 + 1);
        let n = share.clamp(low, high);
        counts[ring] = n;
        remaining -= n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ObjectClass::{Long, Short};
    use proptest::prelude::*;

    fn ops() -> GenomeOps {
        GenomeOps::new(
            Inventory::default(),
            Envelope::default(),
            RadiusDomain::default(),
            GeneticConfig::default(),
        )
    }

    fn reference() -> Candidate {
        Candidate::homogeneous(
            vec![50.0, 100.0, 150.0, 200.0],
            vec![Short, Long, Short, Long],
            vec![7, 20, 21, 20],
        )
    }

    fn arb_genome() -> impl Strategy<Value = Candidate> {
        (
            prop::collection::vec(-100.0f64..700.0, 4),
            prop::collection::vec(prop::bool::ANY, 4),
            prop::collection::vec(0u32..60, 4),
        )
            .prop_map(|(radii, labels, counts)| {
                let labels = labels
                    .into_iter()
                    .map(|s| if s { Short } else { Long })
                    .collect();
                Candidate::homogeneous(radii, labels, counts)
            })
    }

    #[test]
    fn test_repair_fixes_spacing_and_counts() {
        let ops = ops();
        let mut g = Candidate::homogeneous(
            vec![300.0, 280.0, 350.0, 500.0],
            vec![Long, Long, Long, Long],
            vec![0, 0, 0, 0],
        );
        ops.repair(&mut g);
        assert_eq!(g.radii, vec![280.0, 311.0, 350.0, 487.0]);
        assert_eq!(g.counts, vec![28, 13, 13, 14]);
        assert_eq!(g.labels().unwrap()[0], Short);
        let totals = g.class_totals();
        assert_eq!(totals.short, 28);
        assert_eq!(totals.long, 40);
        assert!(ops.is_feasible(&g));
    }

    #[test]
    fn test_repair_keeps_feasible_reference_radii() {
        let ops = ops();
        let mut g = reference();
        ops.repair(&mut g);
        assert_eq!(g.radii, vec![50.0, 100.0, 150.0, 200.0]);
        assert!(ops.is_feasible(&g));
    }

    #[test]
    fn test_redistribute_equal_share() {
        let caps = vec![10, 20, 31, 41];
        let mut counts = vec![0; 4];
        redistribute(&[1, 3], &caps, 40, &mut counts);
        assert_eq!(counts, vec![0, 20, 0, 20]);

        let mut counts = vec![0; 4];
        redistribute(&[0, 1, 2], &caps, 28, &mut counts);
        assert_eq!(counts, vec![9, 9, 10, 0]);
    }

    #[test]
    fn test_redistribute_share_leaves_room_for_later_rings() {
        // An even split would put 20 on a ring that holds 6.
        let caps = vec![6, 40];
        let mut counts = vec![0; 2];
        redistribute(&[0, 1], &caps, 40, &mut counts);
        assert_eq!(counts, vec![6, 34]);

        // The first ring takes more so the small last ring is not overfilled.
        let caps = vec![40, 6];
        let mut counts = vec![0; 2];
        redistribute(&[0, 1], &caps, 40, &mut counts);
        assert_eq!(counts, vec![34, 6]);
    }

    #[test]
    fn test_redistribute_overflow_fills_capacity() {
        let caps = vec![10, 12];
        let mut counts = vec![0; 2];
        redistribute(&[0, 1], &caps, 40, &mut counts);
        assert_eq!(counts, vec![10, 12]);
    }

    #[test]
    fn test_mutation_is_reproducible() {
        let ops = ops();
        let mut a = reference();
        let mut b = reference();
        ops.mutate(&mut SearchRng::new(5), &mut a);
        ops.mutate(&mut SearchRng::new(5), &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_mutate_then_repair_stays_feasible() {
        let ops = ops();
        let mut rng = SearchRng::new(99);
        let mut g = reference();
        assert!(ops.is_feasible(&g));
        for _ in 0..500 {
            ops.mutate(&mut rng, &mut g);
            assert!(ops.is_feasible(&g), "infeasible after mutation: {}", g.describe());
        }
    }

    #[test]
    fn test_crossover_preserves_feasibility() {
        let ops = ops();
        let mut rng = SearchRng::new(123);
        let mut a = reference();
        let mut b = Candidate::homogeneous(
            vec![80.0, 160.0, 260.0, 400.0],
            vec![Long, Short, Long, Short],
            vec![15, 10, 25, 18],
        );
        ops.repair(&mut b);
        assert!(ops.is_feasible(&b));
        for _ in 0..200 {
            ops.crossover(&mut rng, &mut a, &mut b);
            assert!(ops.is_feasible(&a));
            assert!(ops.is_feasible(&b));
        }
    }

    proptest! {
        #[test]
        fn prop_repair_idempotent(genome in arb_genome()) {
            let ops = ops();
            let mut once = genome;
            ops.repair(&mut once);
            let mut twice = once.clone();
            ops.repair(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_repair_spacing_and_domain(genome in arb_genome()) {
            let ops = ops();
            let mut g = genome;
            ops.repair(&mut g);
            prop_assert!(g.radii[0] >= 35.0);
            prop_assert!(g.radii[3] <= 487.0);
            for pair in g.radii.windows(2) {
                prop_assert!(pair[1] - pair[0] >= 31.0 - 1e-9);
            }
            let labels = g.labels().unwrap();
            prop_assert!(labels.contains(&Short));
            prop_assert!(labels.contains(&Long));
        }

        #[test]
        fn prop_mutation_keeps_feasible(seed in any::<u64>(), rounds in 1usize..40) {
            let ops = ops();
            let mut rng = SearchRng::new(seed);
            let mut g = reference();
            for _ in 0..rounds {
                ops.mutate(&mut rng, &mut g);
                prop_assert!(ops.is_feasible(&g));
            }
        }
    }
}
