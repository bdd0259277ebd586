//! Ring layout types: the search variable and its validated form.

use serde::{Deserialize, Serialize};

use super::ObjectClass;

/// How occupants are assigned to classes across the rings of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ClassAssignment {
    /// Every ring holds a single class.
    PerRing(Vec<ObjectClass>),
    /// Rings may mix classes; value is the short-class occupant count per ring,
    /// the rest of the ring is long.
    Split(Vec<u32>),
}

impl ClassAssignment {
    /// Number of entries (one per ring).
    pub fn len(&self) -> usize {
        match self {
            Self::PerRing(labels) => labels.len(),
            Self::Split(shorts) => shorts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether rings are class-homogeneous.
    pub fn is_homogeneous(&self) -> bool {
        matches!(self, Self::PerRing(_))
    }
}

/// One proposed layout: `k` radii, their class assignment, and `k` counts.
///
/// This is the optimization variable shared by every strategy. It is not
/// guaranteed to be feasible; see [`Configuration`] for the validated form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Ring radii in millimeters.
    pub radii: Vec<f64>,
    /// Class assignment per ring.
    pub classes: ClassAssignment,
    /// Total occupant count per ring.
    pub counts: Vec<u32>,
}

impl Candidate {
    /// Homogeneous-ring candidate.
    pub fn homogeneous(radii: Vec<f64>, labels: Vec<ObjectClass>, counts: Vec<u32>) -> Self {
        Self {
            radii,
            classes: ClassAssignment::PerRing(labels),
            counts,
        }
    }

    /// Mixed-ring candidate with a short-class split per ring.
    pub fn mixed(radii: Vec<f64>, counts: Vec<u32>, short_counts: Vec<u32>) -> Self {
        Self {
            radii,
            classes: ClassAssignment::Split(short_counts),
            counts,
        }
    }

    /// Number of rings (length of the radius vector).
    #[inline]
    pub fn ring_count(&self) -> usize {
        self.radii.len()
    }

    /// Class labels, if rings are homogeneous.
    pub fn labels(&self) -> Option<&[ObjectClass]> {
        match &self.classes {
            ClassAssignment::PerRing(labels) => Some(labels),
            ClassAssignment::Split(_) => None,
        }
    }

    /// Mutable class labels, if rings are homogeneous.
    pub fn labels_mut(&mut self) -> Option<&mut Vec<ObjectClass>> {
        match &mut self.classes {
            ClassAssignment::PerRing(labels) => Some(labels),
            ClassAssignment::Split(_) => None,
        }
    }

    /// Indices of the rings labelled with `class`, ascending.
    ///
    /// Empty for mixed candidates.
    pub fn rings_of(&self, class: ObjectClass) -> Vec<usize> {
        self.labels()
            .map(|labels| {
                labels
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| **c == class)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Short and long occupants on ring `i`.
    ///
    /// A split larger than the ring count saturates the long count at zero;
    /// the validator reports that case as a layout error.
    pub fn ring_split(&self, i: usize) -> (u32, u32) {
        let count = self.counts.get(i).copied().unwrap_or(0);
        match &self.classes {
            ClassAssignment::PerRing(labels) => match labels.get(i) {
                Some(ObjectClass::Short) => (count, 0),
                Some(ObjectClass::Long) => (0, count),
                None => (0, 0),
            },
            ClassAssignment::Split(shorts) => {
                let short = shorts.get(i).copied().unwrap_or(0);
                (short, count.saturating_sub(short))
            }
        }
    }

    /// Per-class totals across all rings.
    pub fn class_totals(&self) -> ClassTotals {
        (0..self.counts.len()).fold(ClassTotals::default(), |acc, i| {
            let (short, long) = self.ring_split(i);
            ClassTotals {
                short: acc.short + short,
                long: acc.long + long,
            }
        })
    }

    /// Compact one-line description for logs.
    pub fn describe(&self) -> String {
        let radii: Vec<String> = self.radii.iter().map(|r| format!("{r:.1}")).collect();
        let classes = match &self.classes {
            ClassAssignment::PerRing(labels) => {
                let tags: String = labels.iter().map(|c| c.tag()).collect();
                format!("types={tags}")
            }
            ClassAssignment::Split(shorts) => format!("short={shorts:?}"),
        };
        let totals = self.class_totals();
        format!(
            "r=[{}], {}, n={:?}, total={} ({}S+{}L)",
            radii.join(", "),
            classes,
            self.counts,
            totals.total(),
            totals.short,
            totals.long
        )
    }
}

/// Per-class occupant totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTotals {
    pub short: u32,
    pub long: u32,
}

impl ClassTotals {
    /// Total for one class.
    pub fn get(&self, class: ObjectClass) -> u32 {
        match class {
            ObjectClass::Short => self.short,
            ObjectClass::Long => self.long,
        }
    }

    pub fn total(&self) -> u32 {
        self.short + self.long
    }
}

/// Class content of one ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RingFill {
    /// All occupants share one class.
    Uniform { class: ObjectClass },
    /// The first `short` occupants are short, the rest long.
    Split { short: u32 },
}

/// One ring of a validated configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingSpec {
    /// Radius in millimeters.
    pub radius: f64,
    /// Occupant count.
    pub count: u32,
    /// Class content.
    pub fill: RingFill,
}

impl RingSpec {
    /// Number of short-class occupants.
    pub fn short_count(&self) -> u32 {
        match self.fill {
            RingFill::Uniform {
                class: ObjectClass::Short,
            } => self.count,
            RingFill::Uniform {
                class: ObjectClass::Long,
            } => 0,
            RingFill::Split { short } => short.min(self.count),
        }
    }

    /// Number of long-class occupants.
    pub fn long_count(&self) -> u32 {
        self.count - self.short_count()
    }
}

/// A layout that passed the feasibility validator.
///
/// Only the validator constructs this type, so anything holding a
/// `Configuration` may assume every packing invariant holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    rings: Vec<RingSpec>,
}

impl Configuration {
    pub(crate) fn from_candidate(candidate: &Candidate) -> Self {
        let rings = candidate
            .radii
            .iter()
            .zip(&candidate.counts)
            .enumerate()
            .map(|(i, (&radius, &count))| {
                let fill = match &candidate.classes {
                    ClassAssignment::PerRing(labels) => RingFill::Uniform { class: labels[i] },
                    ClassAssignment::Split(shorts) => RingFill::Split { short: shorts[i] },
                };
                RingSpec {
                    radius,
                    count,
                    fill,
                }
            })
            .collect();
        Self { rings }
    }

    /// Rings in input order (strictly increasing radius).
    pub fn rings(&self) -> &[RingSpec] {
        &self.rings
    }

    /// Total number of placed objects.
    pub fn total_count(&self) -> u32 {
        self.rings.iter().map(|r| r.count).sum()
    }
}

/// One concrete object instance, regenerated from a configuration on each build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    /// Ring label plus 1-based occupant index (`A1`, `A2`, `B1`, ...).
    pub name: String,
    /// Object class.
    #[serde(skip)]
    pub class: ObjectClass,
    /// Type name from the inventory.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Radius, rounded to two decimals.
    #[serde(rename = "R")]
    pub radius: f64,
    /// Angle in degrees, rounded to two decimals.
    #[serde(rename = "Phi")]
    pub angle: f64,
}
