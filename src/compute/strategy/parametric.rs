//! Independent parametric sampling.
//!
//! Every value is drawn from its own interval; nothing is repaired. The
//! inventory is only an upper bound, and infeasible draws are scored 0 by the
//! search loop.

use super::{Proposal, RoundClose, SearchRng, SearchStrategy, Suggest};
use crate::compute::FeasibilityMode;
use crate::schema::{Candidate, ClassMode, Inventory, ObjectClass, ParameterSpace, TrialRecord};

pub struct ParametricStrategy {
    inventory: Inventory,
    space: ParameterSpace,
    class_mode: ClassMode,
    suggest: Box<dyn Suggest>,
}

impl ParametricStrategy {
    pub fn new(
        inventory: Inventory,
        space: ParameterSpace,
        class_mode: ClassMode,
        suggest: Box<dyn Suggest>,
    ) -> Self {
        Self {
            inventory,
            space,
            class_mode,
            suggest,
        }
    }

    fn draw_rings(&mut self, rng: &mut SearchRng) -> (Vec<f64>, Vec<u32>) {
        let k = self.space.rings.len();
        let mut radii: Vec<f64> = Vec::with_capacity(k);
        for i in 0..k {
            let (low, high) = self.space.radius_bounds(i, radii.last().copied());
            radii.push(self.suggest.suggest_float(rng, &format!("r{}", i + 1), low, high));
        }
        let counts = self
            .space
            .rings
            .iter()
            .enumerate()
            .map(|(i, prior)| {
                let (low, high) = prior.count;
                self.suggest.suggest_int(rng, &format!("n{}", i + 1), low, high)
            })
            .collect();
        (radii, counts)
    }
}

impl SearchStrategy for ParametricStrategy {
    fn name(&self) -> &'static str {
        "parametric"
    }

    fn mode(&self) -> FeasibilityMode {
        FeasibilityMode::Loose
    }

    fn propose(&mut self, rng: &mut SearchRng) -> Proposal {
        match self.class_mode {
            ClassMode::Mixed => {
                let (radii, counts) = self.draw_rings(rng);
                let stock = self.inventory.count(ObjectClass::Short);
                let shorts = counts
                    .iter()
                    .enumerate()
                    .map(|(i, &n)| {
                        self.suggest
                            .suggest_int(rng, &format!("s{}", i + 1), 0, n.min(stock))
                    })
                    .collect();
                Proposal::new(Candidate::mixed(radii, counts, shorts))
            }
            ClassMode::Homogeneous => {
                let labels = (0..self.space.rings.len())
                    .map(|i| self.suggest.suggest_class(rng, &format!("type_{i}")))
                    .collect();
                let (radii, counts) = self.draw_rings(rng);
                Proposal::new(Candidate::homogeneous(radii, labels, counts))
            }
        }
    }

    fn observe(&mut self, record: &TrialRecord) -> Option<RoundClose> {
        self.suggest.tell(record.score);
        Some(RoundClose::Iteration)
    }
}
