//! Sequential interval-constrained sampling with exact inventory use.

use super::{Proposal, RoundClose, SearchRng, SearchStrategy, Suggest};
use crate::compute::{FeasibilityMode, Rejection};
use crate::schema::{
    Candidate, Envelope, Inventory, ObjectClass, ParameterSpace, TrialRecord,
};

/// Distribute `total` objects of one class over its rings.
///
/// `rings` lists the class's ring indices in allocation order and `caps` holds
/// the per-ring capacity for every ring of the candidate. For every ring but
/// the last the count is drawn from
///
/// ```text
/// low  = max(1, remaining - sum(caps of later rings))
/// high = min(cap, remaining - number of later rings)
/// ```
///
/// and the last ring receives the remainder. `draw(ring, low, high)` picks a
/// value in `[low, high]`.
pub(crate) fn allocate_class(
    class: ObjectClass,
    rings: &[usize],
    caps: &[u32],
    total: u32,
    counts: &mut [u32],
    mut draw: impl FnMut(usize, u32, u32) -> u32,
) -> Result<(), Rejection> {
    let Some((&last, head)) = rings.split_last() else {
        return Ok(());
    };

    let mut remaining = total;
    for (pos, &ring) in head.iter().enumerate() {
        let later = &rings[pos + 1..];
        let later_cap: u32 = later.iter().map(|&j| caps[j]).sum();
        let low = remaining.saturating_sub(later_cap).max(1);
        let high = caps[ring].min(remaining.saturating_sub(later.len() as u32));
        if low > high {
            return Err(Rejection::AllocationExhausted {
                class,
                ring,
                low,
                high,
            });
        }
        let n = draw(ring, low, high).clamp(low, high);
        counts[ring] = n;
        remaining -= n;
    }

    if remaining < 1 || remaining > caps[last] {
        return Err(Rejection::RemainderOutOfRange {
            class,
            ring: last,
            remainder: remaining,
            capacity: caps[last],
        });
    }
    counts[last] = remaining;
    Ok(())
}

/// Per-ring sampler capacity: the validator's capacity, at least 1.
pub(crate) fn sampler_caps(envelope: &Envelope, radii: &[f64]) -> Vec<u32> {
    radii.iter().map(|&r| envelope.capacity(r).max(1)).collect()
}

/// Draws class labels, then spaced radii, then counts that use every unit of
/// both classes.
pub struct SequentialStrategy {
    inventory: Inventory,
    envelope: Envelope,
    space: ParameterSpace,
    suggest: Box<dyn Suggest>,
}

impl SequentialStrategy {
    pub fn new(
        inventory: Inventory,
        envelope: Envelope,
        space: ParameterSpace,
        suggest: Box<dyn Suggest>,
    ) -> Self {
        Self {
            inventory,
            envelope,
            space,
            suggest,
        }
    }

    fn draw_radii(&mut self, rng: &mut SearchRng) -> Vec<f64> {
        let mut radii = Vec::with_capacity(self.space.rings.len());
        for i in 0..self.space.rings.len() {
            let (low, high) = self.space.radius_bounds(i, radii.last().copied());
            let name = format!("r{}", i + 1);
            radii.push(self.suggest.suggest_float(rng, &name, low, high));
        }
        radii
    }
}

impl SearchStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn mode(&self) -> FeasibilityMode {
        FeasibilityMode::Exact
    }

    fn propose(&mut self, rng: &mut SearchRng) -> Proposal {
        let k = self.space.rings.len();
        let labels: Vec<ObjectClass> = (0..k)
            .map(|i| self.suggest.suggest_class(rng, &format!("type_{i}")))
            .collect();
        let radii = self.draw_radii(rng);
        let mut counts = vec![0; k];

        let missing = ObjectClass::ALL
            .into_iter()
            .find(|&class| self.inventory.count(class) > 0 && !labels.contains(&class));
        if let Some(class) = missing {
            let candidate = Candidate::homogeneous(radii, labels, counts);
            return Proposal::rejected(candidate, Rejection::MissingClass { class });
        }

        let caps = sampler_caps(&self.envelope, &radii);
        let mut outcome = Ok(());
        for class in ObjectClass::ALL {
            let rings: Vec<usize> = (0..k).filter(|&i| labels[i] == class).collect();
            let suggest = &mut self.suggest;
            outcome = allocate_class(
                class,
                &rings,
                &caps,
                self.inventory.count(class),
                &mut counts,
                |ring, low, high| suggest.suggest_int(rng, &format!("n{}", ring + 1), low, high),
            );
            if outcome.is_err() {
                break;
            }
        }

        let candidate = Candidate::homogeneous(radii, labels, counts);
        match outcome {
            Ok(()) => Proposal::new(candidate),
            Err(rejection) => Proposal::rejected(candidate, rejection),
        }
    }

    fn observe(&mut self, record: &TrialRecord) -> Option<RoundClose> {
        self.suggest.tell(record.score);
        Some(RoundClose::Iteration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::strategy::UniformSuggest;
    use crate::compute::Validator;
    use crate::schema::RadiusDomain;
    use proptest::prelude::*;

    fn strategy() -> SequentialStrategy {
        SequentialStrategy::new(
            Inventory::default(),
            Envelope::default(),
            ParameterSpace::sequential(4, &RadiusDomain::default()),
            Box::new(UniformSuggest),
        )
    }

    #[test]
    fn test_allocation_exact_totals() {
        let caps = vec![10, 20, 31, 41];
        let mut counts = vec![0; 4];
        allocate_class(ObjectClass::Short, &[0, 2], &caps, 28, &mut counts, |_, low, _| low)
            .unwrap();
        assert_eq!(counts[0] + counts[2], 28);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[2], 27);
    }

    #[test]
    fn test_allocation_lower_bound_from_later_caps() {
        let caps = vec![10, 20, 31, 41];
        let mut counts = vec![0; 4];
        allocate_class(ObjectClass::Long, &[1, 2], &caps, 45, &mut counts, |_, low, _| low)
            .unwrap();
        assert_eq!(counts[1], 14);
        assert_eq!(counts[2], 31);
    }

    #[test]
    fn test_allocation_remainder_too_large() {
        let caps = vec![10, 20];
        let mut counts = vec![0; 2];
        let err = allocate_class(ObjectClass::Short, &[0], &caps, 28, &mut counts, |_, l, _| l)
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::RemainderOutOfRange {
                class: ObjectClass::Short,
                ring: 0,
                remainder: 28,
                capacity: 10
            }
        );
    }

    #[test]
    fn test_allocation_exhausted() {
        let caps = vec![10, 20, 31];
        let mut counts = vec![0; 3];
        let err = allocate_class(ObjectClass::Long, &[0, 1, 2], &caps, 2, &mut counts, |_, l, _| l)
            .unwrap_err();
        assert!(matches!(err, Rejection::AllocationExhausted { ring: 0, .. }));
    }

    #[test]
    fn test_allocation_zero_stock_with_ring() {
        let caps = vec![10];
        let mut counts = vec![0];
        let err = allocate_class(ObjectClass::Short, &[0], &caps, 0, &mut counts, |_, l, _| l)
            .unwrap_err();
        assert!(matches!(err, Rejection::RemainderOutOfRange { remainder: 0, .. }));
    }

    #[test]
    fn test_proposals_are_exact_or_rejected() {
        let mut s = strategy();
        let validator = Validator::new(Inventory::default(), Envelope::default());
        let mut rng = SearchRng::new(7);
        let mut feasible = 0;
        for _ in 0..300 {
            let proposal = s.propose(&mut rng);
            if proposal.rejection.is_some() {
                continue;
            }
            let totals = proposal.candidate.class_totals();
            assert_eq!(totals.short, 28);
            assert_eq!(totals.long, 40);
            if validator.is_feasible(&proposal.candidate, FeasibilityMode::Exact) {
                feasible += 1;
            }
        }
        assert!(feasible > 0);
    }

    #[test]
    fn test_missing_class_rejected() {
        let mut s = SequentialStrategy::new(
            Inventory::default(),
            Envelope::default(),
            ParameterSpace::sequential(2, &RadiusDomain::default()),
            Box::new(UniformSuggest),
        );
        let mut rng = SearchRng::new(1);
        let mut saw_missing = false;
        for _ in 0..50 {
            let p = s.propose(&mut rng);
            let labels = p.candidate.labels().unwrap();
            if labels[0] == labels[1] {
                assert!(matches!(p.rejection, Some(Rejection::MissingClass { .. })));
                saw_missing = true;
            }
        }
        assert!(saw_missing);
    }

    #[test]
    fn test_radii_respect_spacing() {
        let mut s = strategy();
        let mut rng = SearchRng::new(21);
        for _ in 0..100 {
            let p = s.propose(&mut rng);
            for pair in p.candidate.radii.windows(2) {
                assert!(pair[1] - pair[0] >= 31.0 - 1e-9);
            }
            assert!(p.candidate.radii[0] >= 35.0);
            assert!(p.candidate.radii[3] <= 487.0);
        }
    }

    proptest! {
        #[test]
        fn prop_allocation_within_capacity(
            caps in prop::collection::vec(1u32..45, 1..6),
            total in 0u32..120,
            seed in any::<u64>(),
        ) {
            let rings: Vec<usize> = (0..caps.len()).collect();
            let mut counts = vec![0; caps.len()];
            let mut rng = SearchRng::new(seed);
            let result = allocate_class(
                ObjectClass::Long, &rings, &caps, total, &mut counts,
                |_, low, high| rng.int(low, high),
            );
            if result.is_ok() {
                for (&n, &cap) in counts.iter().zip(&caps) {
                    prop_assert!(n >= 1 && n <= cap);
                }
                prop_assert_eq!(counts.iter().sum::<u32>(), total);
            }
        }
    }
}
