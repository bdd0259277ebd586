//! Feasibility validator for ring layouts.
//!
//! The validator is a pure predicate over a [`Candidate`]. Structural defects
//! in the candidate are reported as [`LayoutError`] before any geometric rule
//! runs; geometric and inventory violations are ordinary [`Rejection`]s.
//!
//! Rules run in a fixed order and stop at the first failure:
//!
//! 1. inner clearance of the innermost ring
//! 2. outer boundary of the outermost ring
//! 3. spacing between consecutive rings
//! 4. angular capacity of every occupied ring
//! 5. per-class totals against the inventory
//! 6. class presence (homogeneous layouts only)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{Candidate, ClassAssignment, Configuration, Envelope, Inventory, ObjectClass};

/// How per-class totals are compared with the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeasibilityMode {
    /// Totals may not exceed the inventory.
    Loose,
    /// Totals must equal the inventory.
    Exact,
}

/// Reason a candidate is infeasible. Ring indices are 0-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    /// Innermost ring intrudes on the central keep-out region.
    InnerClearance {
        radius: f64,
        edge: f64,
        clearance: f64,
    },
    /// Outermost ring leaves the container.
    OuterBoundary {
        radius: f64,
        edge: f64,
        boundary: f64,
    },
    /// Ring `ring` sits less than one pitch outside ring `ring - 1`.
    RingsTooClose { ring: usize, gap: f64, required: f64 },
    /// Ring holds more occupants than its circumference allows.
    RingOverCapacity {
        ring: usize,
        count: u32,
        capacity: u32,
        spacing: f64,
        required: f64,
    },
    /// Exact mode: a class total differs from the inventory.
    InventoryMismatch {
        class: ObjectClass,
        placed: u32,
        available: u32,
    },
    /// Loose mode: a class total exceeds the inventory.
    InventoryExceeded {
        class: ObjectClass,
        placed: u32,
        available: u32,
    },
    /// No ring carries a class that has stock.
    MissingClass { class: ObjectClass },
    /// Sequential allocation found an empty count interval.
    AllocationExhausted {
        class: ObjectClass,
        ring: usize,
        low: u32,
        high: u32,
    },
    /// Sequential allocation left a remainder the last ring cannot take.
    RemainderOutOfRange {
        class: ObjectClass,
        ring: usize,
        remainder: u32,
        capacity: u32,
    },
}

impl Rejection {
    /// Stable identifier for grouping and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InnerClearance { .. } => "inner_clearance",
            Self::OuterBoundary { .. } => "outer_boundary",
            Self::RingsTooClose { .. } => "rings_too_close",
            Self::RingOverCapacity { .. } => "ring_over_capacity",
            Self::InventoryMismatch { .. } => "inventory_mismatch",
            Self::InventoryExceeded { .. } => "inventory_exceeded",
            Self::MissingClass { .. } => "missing_class",
            Self::AllocationExhausted { .. } => "allocation_exhausted",
            Self::RemainderOutOfRange { .. } => "remainder_out_of_range",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InnerClearance {
                radius,
                edge,
                clearance,
            } => write!(
                f,
                "inner clearance: ring at {radius:.2} mm reaches {edge:.2} mm, inside the {clearance:.2} mm beam pipe"
            ),
            Self::OuterBoundary {
                radius,
                edge,
                boundary,
            } => write!(
                f,
                "outer boundary: ring at {radius:.2} mm reaches {edge:.2} mm, beyond {boundary:.2} mm"
            ),
            Self::RingsTooClose {
                ring,
                gap,
                required,
            } => write!(
                f,
                "rings too close: rings {} and {} are {gap:.2} mm apart, need {required:.2} mm",
                ring,
                ring + 1
            ),
            Self::RingOverCapacity {
                ring,
                count,
                capacity,
                spacing,
                required,
            } => write!(
                f,
                "spacing: ring {} holds {count} objects {spacing:.2} mm apart, need {required:.2} mm (capacity {capacity})",
                ring + 1
            ),
            Self::InventoryMismatch {
                class,
                placed,
                available,
            } => write!(f, "inventory: {placed} {class:?} placed, exactly {available} required"),
            Self::InventoryExceeded {
                class,
                placed,
                available,
            } => write!(f, "inventory: {placed} {class:?} placed, only {available} available"),
            Self::MissingClass { class } => write!(f, "no ring carries the {class:?} class"),
            Self::AllocationExhausted {
                class,
                ring,
                low,
                high,
            } => write!(
                f,
                "allocation: {class:?} ring {} has empty count interval [{low}, {high}]",
                ring + 1
            ),
            Self::RemainderOutOfRange {
                class,
                ring,
                remainder,
                capacity,
            } => write!(
                f,
                "allocation: {class:?} remainder {remainder} does not fit ring {} (capacity {capacity})",
                ring + 1
            ),
        }
    }
}

/// Structural defect in a candidate. Always a caller error, never a rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("Candidate has no rings")]
    Empty,
    #[error("Vector lengths differ: {radii} radii, {counts} counts, {classes} class entries")]
    LengthMismatch {
        radii: usize,
        counts: usize,
        classes: usize,
    },
    #[error("Ring {ring} radius is not finite: {value}")]
    NonFiniteRadius { ring: usize, value: f64 },
    #[error("Ring {ring} assigns {short} short objects but only holds {count}")]
    SplitExceedsCount { ring: usize, short: u32, count: u32 },
}

/// Outcome of a feasibility check.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Feasible(Configuration),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Self::Feasible(_))
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Feasible(_) => None,
            Self::Rejected(r) => Some(r),
        }
    }
}

/// Checks candidates against the envelope and inventory of one search run.
#[derive(Debug, Clone)]
pub struct Validator {
    inventory: Inventory,
    envelope: Envelope,
}

impl Validator {
    pub fn new(inventory: Inventory, envelope: Envelope) -> Self {
        Self {
            inventory,
            envelope,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Check a candidate.
    pub fn check(&self, candidate: &Candidate, mode: FeasibilityMode) -> Result<Verdict, LayoutError> {
        check_structure(candidate)?;
        Ok(match self.first_violation(candidate, mode) {
            Some(rejection) => Verdict::Rejected(rejection),
            None => Verdict::Feasible(Configuration::from_candidate(candidate)),
        })
    }

    /// Whether a candidate passes every rule. Structural defects count as infeasible.
    pub fn is_feasible(&self, candidate: &Candidate, mode: FeasibilityMode) -> bool {
        check_structure(candidate).is_ok() && self.first_violation(candidate, mode).is_none()
    }

    fn first_violation(&self, candidate: &Candidate, mode: FeasibilityMode) -> Option<Rejection> {
        let env = &self.envelope;
        let half = env.half_diameter();
        let pitch = env.pitch();
        let radii = &candidate.radii;

        let inner = radii[0];
        if inner - half < env.inner_clearance {
            return Some(Rejection::InnerClearance {
                radius: inner,
                edge: inner - half,
                clearance: env.inner_clearance,
            });
        }

        let outer = radii[radii.len() - 1];
        if outer + half > env.outer_boundary {
            return Some(Rejection::OuterBoundary {
                radius: outer,
                edge: outer + half,
                boundary: env.outer_boundary,
            });
        }

        for (i, pair) in radii.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            if gap < pitch {
                return Some(Rejection::RingsTooClose {
                    ring: i + 1,
                    gap,
                    required: pitch,
                });
            }
        }

        for (i, (&radius, &count)) in radii.iter().zip(&candidate.counts).enumerate() {
            if count == 0 {
                continue;
            }
            let spacing = env.arc_spacing(radius, count);
            if spacing < pitch {
                return Some(Rejection::RingOverCapacity {
                    ring: i,
                    count,
                    capacity: env.capacity(radius),
                    spacing,
                    required: pitch,
                });
            }
        }

        let totals = candidate.class_totals();
        for class in ObjectClass::ALL {
            let placed = totals.get(class);
            let available = self.inventory.count(class);
            match mode {
                FeasibilityMode::Exact if placed != available => {
                    return Some(Rejection::InventoryMismatch {
                        class,
                        placed,
                        available,
                    });
                }
                FeasibilityMode::Loose if placed > available => {
                    return Some(Rejection::InventoryExceeded {
                        class,
                        placed,
                        available,
                    });
                }
                _ => {}
            }
        }

        if let ClassAssignment::PerRing(labels) = &candidate.classes {
            for class in ObjectClass::ALL {
                if self.inventory.count(class) > 0 && !labels.contains(&class) {
                    return Some(Rejection::MissingClass { class });
                }
            }
        }

        None
    }
}

fn check_structure(candidate: &Candidate) -> Result<(), LayoutError> {
    let radii = candidate.radii.len();
    let counts = candidate.counts.len();
    let classes = candidate.classes.len();
    if radii == 0 && counts == 0 && classes == 0 {
        return Err(LayoutError::Empty);
    }
    if radii != counts || radii != classes {
        return Err(LayoutError::LengthMismatch {
            radii,
            counts,
            classes,
        });
    }
    if let Some((ring, &value)) = candidate.radii.iter().enumerate().find(|(_, r)| !r.is_finite()) {
        return Err(LayoutError::NonFiniteRadius { ring, value });
    }
    if let ClassAssignment::Split(shorts) = &candidate.classes
        && let Some((ring, (&short, &count))) = shorts
            .iter()
            .zip(&candidate.counts)
            .enumerate()
            .find(|(_, (s, n))| s > n)
    {
        return Err(LayoutError::SplitExceedsCount { ring, short, count });
    }
    Ok(())
}
