//! Inventory and packing-envelope types.
//!
//! The inventory fixes how many objects of each class a search run must
//! place; the envelope fixes the geometry every layout has to respect.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// The two object classes a layout is built from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Short,
    Long,
}

impl ObjectClass {
    /// Both classes, short first.
    pub const ALL: [ObjectClass; 2] = [ObjectClass::Short, ObjectClass::Long];

    /// One-letter tag used in log lines.
    pub fn tag(self) -> char {
        match self {
            Self::Short => 'S',
            Self::Long => 'L',
        }
    }
}

/// Name and available count for one object class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassStock {
    /// Type name handed to the simulation (e.g. `He3_ELIGANT`).
    pub name: String,
    /// Exact number of units available.
    pub count: u32,
}

/// Available objects per class. Immutable for a search run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inventory {
    pub short: ClassStock,
    pub long: ClassStock,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            short: ClassStock {
                name: "He3_ELIGANT".to_string(),
                count: 28,
            },
            long: ClassStock {
                name: "He3_ELIGANT_Long".to_string(),
                count: 40,
            },
        }
    }
}

impl Inventory {
    /// Create an inventory from names and counts.
    pub fn new(short_name: &str, short_count: u32, long_name: &str, long_count: u32) -> Self {
        Self {
            short: ClassStock {
                name: short_name.to_string(),
                count: short_count,
            },
            long: ClassStock {
                name: long_name.to_string(),
                count: long_count,
            },
        }
    }

    /// Stock entry for a class.
    pub fn stock(&self, class: ObjectClass) -> &ClassStock {
        match class {
            ObjectClass::Short => &self.short,
            ObjectClass::Long => &self.long,
        }
    }

    /// Available count for a class.
    #[inline]
    pub fn count(&self, class: ObjectClass) -> u32 {
        self.stock(class).count
    }

    /// Type name for a class.
    #[inline]
    pub fn name(&self, class: ObjectClass) -> &str {
        &self.stock(class).name
    }

    /// Total units across both classes.
    pub fn total(&self) -> u32 {
        self.short.count + self.long.count
    }
}

/// Fixed geometry of the container and the objects placed in it (millimeters).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Diameter of one object.
    #[serde(default = "default_object_diameter")]
    pub object_diameter: f64,
    /// Minimum surface-to-surface gap between objects.
    #[serde(default = "default_min_gap")]
    pub min_gap: f64,
    /// Radius of the central keep-out region (beam pipe).
    #[serde(default = "default_inner_clearance")]
    pub inner_clearance: f64,
    /// Half-width of the container.
    #[serde(default = "default_outer_boundary")]
    pub outer_boundary: f64,
    /// Full container size written to the geometry document.
    #[serde(default = "default_box_size")]
    pub box_size: (f64, f64, f64),
    /// Beam-pipe diameter written to the geometry document.
    #[serde(default = "default_beam_pipe_diameter")]
    pub beam_pipe_diameter: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            object_diameter: default_object_diameter(),
            min_gap: default_min_gap(),
            inner_clearance: default_inner_clearance(),
            outer_boundary: default_outer_boundary(),
            box_size: default_box_size(),
            beam_pipe_diameter: default_beam_pipe_diameter(),
        }
    }
}

fn default_object_diameter() -> f64 {
    25.4
}
fn default_min_gap() -> f64 {
    5.0
}
fn default_inner_clearance() -> f64 {
    22.0
}
fn default_outer_boundary() -> f64 {
    500.0
}
fn default_box_size() -> (f64, f64, f64) {
    (1000.0, 1000.0, 1000.0)
}
fn default_beam_pipe_diameter() -> f64 {
    44.0
}

impl Envelope {
    /// Required center-to-center distance between neighbours (diameter + gap).
    #[inline]
    pub fn pitch(&self) -> f64 {
        self.object_diameter + self.min_gap
    }

    /// Half the object diameter.
    #[inline]
    pub fn half_diameter(&self) -> f64 {
        self.object_diameter / 2.0
    }

    /// Arc length between neighbours when `count` objects sit on a ring.
    #[inline]
    pub fn arc_spacing(&self, radius: f64, count: u32) -> f64 {
        2.0 * PI * radius / count as f64
    }

    /// Largest occupant count whose arc spacing still meets the pitch.
    ///
    /// Agrees exactly with the validator's angular-spacing rule.
    pub fn capacity(&self, radius: f64) -> u32 {
        if !(radius > 0.0) {
            return 0;
        }
        let mut n = (2.0 * PI * radius / self.pitch()).floor().max(0.0) as u32;
        while n > 0 && self.arc_spacing(radius, n) < self.pitch() {
            n -= 1;
        }
        n
    }

    /// Smallest ring radius that clears the inner keep-out region.
    pub fn min_ring_radius(&self) -> f64 {
        self.inner_clearance + self.half_diameter()
    }

    /// Largest ring radius that stays inside the container.
    pub fn max_ring_radius(&self) -> f64 {
        self.outer_boundary - self.half_diameter()
    }
}

/// Radius domain used by the constrained and evolutionary samplers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RadiusDomain {
    /// Smallest radius a sampler may propose.
    #[serde(default = "default_min_radius")]
    pub min_radius: f64,
    /// Largest radius a sampler may propose.
    #[serde(default = "default_max_radius")]
    pub max_radius: f64,
    /// Center-to-center spacing samplers keep between consecutive rings.
    #[serde(default = "default_min_spacing")]
    pub min_spacing: f64,
}

impl Default for RadiusDomain {
    fn default() -> Self {
        Self {
            min_radius: default_min_radius(),
            max_radius: default_max_radius(),
            min_spacing: default_min_spacing(),
        }
    }
}

fn default_min_radius() -> f64 {
    35.0
}
fn default_max_radius() -> f64 {
    487.0
}
fn default_min_spacing() -> f64 {
    31.0
}

impl RadiusDomain {
    /// Width of the domain.
    pub fn span(&self) -> f64 {
        self.max_radius - self.min_radius
    }

    /// Whether `rings` rings fit with full spacing.
    pub fn fits(&self, rings: usize) -> bool {
        rings == 0 || self.span() >= self.min_spacing * (rings - 1) as f64
    }
}
