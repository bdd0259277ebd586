//! Geometry builder: validated configuration to placed objects.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::schema::{Configuration, Envelope, Inventory, ObjectClass, Placement};

/// Letter identifier for a 0-based ring index: A..Z, then AA, AB, ...
pub fn ring_label(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Place every object of a configuration.
///
/// Rings are processed in order; within a ring of `n` objects the `i`-th sits
/// at `i * 360 / n` degrees, short objects first. Deterministic.
pub fn build(config: &Configuration, inventory: &Inventory) -> Vec<Placement> {
    let mut placements = Vec::with_capacity(config.total_count() as usize);

    for (ring_idx, ring) in config.rings().iter().enumerate() {
        if ring.count == 0 {
            continue;
        }
        let label = ring_label(ring_idx);
        let step = 360.0 / ring.count as f64;
        let shorts = ring.short_count();
        let radius = round2(ring.radius);

        for i in 0..ring.count {
            let class = if i < shorts {
                ObjectClass::Short
            } else {
                ObjectClass::Long
            };
            placements.push(Placement {
                name: format!("{label}{}", i + 1),
                class,
                type_name: inventory.name(class).to_string(),
                radius,
                angle: round2(i as f64 * step),
            });
        }
    }

    placements
}

/// Container description in the geometry document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSpec {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(rename = "BeamPipe")]
    pub beam_pipe: f64,
}

/// Geometry file handed to the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryDocument {
    #[serde(rename = "Box")]
    pub container: BoxSpec,
    #[serde(rename = "Placements")]
    pub placements: Vec<Placement>,
}

impl GeometryDocument {
    pub fn new(envelope: &Envelope, placements: Vec<Placement>) -> Self {
        let (x, y, z) = envelope.box_size;
        Self {
            container: BoxSpec {
                kind: "Box",
                x,
                y,
                z,
                beam_pipe: envelope.beam_pipe_diameter,
            },
            placements,
        }
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}
