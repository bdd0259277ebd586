//! Value suggesters: how a sampler chooses inside the intervals it is given.
//!
//! A sampler names each parameter it draws (`r1`, `n3`, `type_0`, ...). The
//! suggester only sees the name and the interval; the interval itself is
//! always decided by the sampler.

use std::collections::BTreeMap;

use super::SearchRng;
use crate::schema::{ObjectClass, SuggestConfig};

/// One suggested value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(u32),
    Class(ObjectClass),
}

/// Chooses parameter values within caller-supplied bounds.
pub trait Suggest {
    /// Float in `[low, high]`.
    fn suggest_float(&mut self, rng: &mut SearchRng, name: &str, low: f64, high: f64) -> f64;

    /// Integer in `[low, high]`.
    fn suggest_int(&mut self, rng: &mut SearchRng, name: &str, low: u32, high: u32) -> u32;

    /// One of the two object classes.
    fn suggest_class(&mut self, rng: &mut SearchRng, name: &str) -> ObjectClass;

    /// Report the score of the trial whose values were suggested since the last call.
    fn tell(&mut self, score: f64);
}

/// Build the suggester a configuration selects.
pub fn suggester(config: &SuggestConfig) -> Box<dyn Suggest> {
    match config {
        SuggestConfig::Uniform => Box::new(UniformSuggest),
        SuggestConfig::Adaptive {
            startup_trials,
            exploit_probability,
            spread,
        } => Box::new(AdaptiveSuggest::new(
            *startup_trials,
            *exploit_probability,
            *spread,
        )),
    }
}

/// Pure random search.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSuggest;

impl Suggest for UniformSuggest {
    fn suggest_float(&mut self, rng: &mut SearchRng, _name: &str, low: f64, high: f64) -> f64 {
        rng.uniform(low, high)
    }

    fn suggest_int(&mut self, rng: &mut SearchRng, _name: &str, low: u32, high: u32) -> u32 {
        rng.int(low, high)
    }

    fn suggest_class(&mut self, rng: &mut SearchRng, _name: &str) -> ObjectClass {
        rng.class()
    }

    fn tell(&mut self, _score: f64) {}
}

/// Random warm-up followed by Gaussian draws around the best trial so far.
///
/// After `startup_trials` reported trials, each named value is drawn near the
/// best trial's value with probability `exploit_probability`, using a standard
/// deviation of `spread` times the interval width. Everything else is uniform.
#[derive(Debug, Clone)]
pub struct AdaptiveSuggest {
    startup_trials: usize,
    exploit_probability: f64,
    spread: f64,
    told: usize,
    pending: BTreeMap<String, ParamValue>,
    best: Option<(f64, BTreeMap<String, ParamValue>)>,
}

impl AdaptiveSuggest {
    pub fn new(startup_trials: usize, exploit_probability: f64, spread: f64) -> Self {
        Self {
            startup_trials,
            exploit_probability,
            spread,
            told: 0,
            pending: BTreeMap::new(),
            best: None,
        }
    }

    /// Best reported score, if any.
    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|(score, _)| *score)
    }

    fn anchor(&mut self, rng: &mut SearchRng, name: &str) -> Option<ParamValue> {
        if self.told < self.startup_trials {
            return None;
        }
        let value = self.best.as_ref()?.1.get(name).copied()?;
        rng.chance(self.exploit_probability).then_some(value)
    }
}

impl Suggest for AdaptiveSuggest {
    fn suggest_float(&mut self, rng: &mut SearchRng, name: &str, low: f64, high: f64) -> f64 {
        let value = match self.anchor(rng, name) {
            Some(ParamValue::Float(center)) if high > low => rng
                .gaussian(center, self.spread * (high - low))
                .clamp(low, high),
            _ => rng.uniform(low, high),
        };
        self.pending.insert(name.to_string(), ParamValue::Float(value));
        value
    }

    fn suggest_int(&mut self, rng: &mut SearchRng, name: &str, low: u32, high: u32) -> u32 {
        let value = match self.anchor(rng, name) {
            Some(ParamValue::Int(center)) if high > low => {
                let sigma = (self.spread * (high - low) as f64).max(0.5);
                rng.gaussian(center as f64, sigma)
                    .round()
                    .clamp(low as f64, high as f64) as u32
            }
            _ => rng.int(low, high),
        };
        self.pending.insert(name.to_string(), ParamValue::Int(value));
        value
    }

    fn suggest_class(&mut self, rng: &mut SearchRng, name: &str) -> ObjectClass {
        let value = match self.anchor(rng, name) {
            Some(ParamValue::Class(class)) => class,
            _ => rng.class(),
        };
        self.pending.insert(name.to_string(), ParamValue::Class(value));
        value
    }

    fn tell(&mut self, score: f64) {
        let params = std::mem::take(&mut self.pending);
        self.told += 1;
        let improved = match &self.best {
            Some((best, _)) => score > *best,
            None => true,
        };
        if improved {
            self.best = Some((score, params));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_within_bounds() {
        let mut rng = SearchRng::new(5);
        let mut s = UniformSuggest;
        for _ in 0..200 {
            let x = s.suggest_float(&mut rng, "r1", 35.0, 150.0);
            assert!((35.0..=150.0).contains(&x));
            let n = s.suggest_int(&mut rng, "n1", 4, 12);
            assert!((4..=12).contains(&n));
        }
    }

    #[test]
    fn test_adaptive_stays_in_bounds_after_warmup() {
        let mut rng = SearchRng::new(9);
        let mut s = AdaptiveSuggest::new(2, 1.0, 0.5);
        for trial in 0..50 {
            let r = s.suggest_float(&mut rng, "r1", 35.0, 150.0);
            let n = s.suggest_int(&mut rng, "n1", 4, 12);
            assert!((35.0..=150.0).contains(&r));
            assert!((4..=12).contains(&n));
            s.tell(trial as f64 % 7.0);
        }
    }

    #[test]
    fn test_adaptive_ties_keep_first() {
        let mut rng = SearchRng::new(11);
        let mut s = AdaptiveSuggest::new(0, 1.0, 0.1);
        let first = s.suggest_float(&mut rng, "r1", 0.0, 100.0);
        s.tell(5.0);
        s.suggest_float(&mut rng, "r1", 0.0, 100.0);
        s.tell(5.0);
        assert_eq!(s.best_score(), Some(5.0));
        assert_eq!(
            s.best.as_ref().unwrap().1.get("r1"),
            Some(&ParamValue::Float(first))
        );
    }

    #[test]
    fn test_adaptive_exploits_class() {
        let mut rng = SearchRng::new(2);
        let mut s = AdaptiveSuggest::new(1, 1.0, 0.1);
        let class = s.suggest_class(&mut rng, "type_0");
        s.tell(1.0);
        for _ in 0..20 {
            assert_eq!(s.suggest_class(&mut rng, "type_0"), class);
            s.tell(0.0);
        }
    }

    #[test]
    fn test_adaptive_concentrates_near_best() {
        let mut rng = SearchRng::new(17);
        let mut s = AdaptiveSuggest::new(0, 1.0, 0.02);
        s.pending.insert("r1".to_string(), ParamValue::Float(100.0));
        s.tell(10.0);
        for _ in 0..100 {
            let r = s.suggest_float(&mut rng, "r1", 0.0, 200.0);
            assert!((r - 100.0).abs() < 40.0);
            s.tell(0.0);
        }
    }
}
