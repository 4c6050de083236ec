//! Parameter space: the declared domain of every tunable parameter.

use std::collections::BTreeMap;

use backforge_core::{ParamSet, ParamValue};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Guard against unbounded grids from tiny float steps.
pub const MAX_GRID_VALUES: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpaceError {
    #[error("parameter space is empty")]
    Empty,

    #[error("parameter '{name}': min {min} > max {max}")]
    InvertedBounds { name: String, min: f64, max: f64 },

    #[error("parameter '{name}': empty choice list")]
    EmptyChoices { name: String },

    #[error("parameter '{name}': step must be positive, got {step}")]
    NonPositiveStep { name: String, step: f64 },

    #[error("parameter '{name}': bounds must be finite")]
    NonFinite { name: String },

    #[error("parameter '{name}': continuous range needs a step for grid search")]
    MissingStep { name: String },

    #[error("parameter '{name}': grid would exceed {MAX_GRID_VALUES} values")]
    TooManyValues { name: String },
}

/// Domain of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamDomain {
    /// Explicit value list. Grid search enumerates it in order.
    Discrete { values: Vec<ParamValue> },
    /// Inclusive integer range.
    IntRange {
        min: i64,
        max: i64,
        #[serde(default = "default_int_step")]
        step: i64,
    },
    /// Inclusive continuous range. `step` is only used by grid search.
    FloatRange {
        min: f64,
        max: f64,
        #[serde(default)]
        step: Option<f64>,
    },
}

fn default_int_step() -> i64 {
    1
}

/// Steps from `min` to the last reachable value. Widened so that ranges
/// spanning most of `i64` do not overflow.
fn int_slots(min: i64, max: i64, step: i64) -> i128 {
    (max as i128 - min as i128) / step as i128
}

/// Value at `slot`; callers keep `slot` within `0..=int_slots(..)`, so the
/// result lies in `[min, max]`.
fn int_at(min: i64, step: i64, slot: i128) -> i64 {
    (min as i128 + slot * step as i128) as i64
}

impl ParamDomain {
    pub fn discrete<V: Into<ParamValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Discrete {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn int_range(min: i64, max: i64) -> Self {
        Self::IntRange { min, max, step: 1 }
    }

    pub fn float_range(min: f64, max: f64) -> Self {
        Self::FloatRange {
            min,
            max,
            step: None,
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), SpaceError> {
        match self {
            Self::Discrete { values } if values.is_empty() => Err(SpaceError::EmptyChoices {
                name: name.to_string(),
            }),
            Self::Discrete { .. } => Ok(()),
            Self::IntRange { min, max, step } => {
                if min > max {
                    return Err(SpaceError::InvertedBounds {
                        name: name.to_string(),
                        min: *min as f64,
                        max: *max as f64,
                    });
                }
                if *step <= 0 {
                    return Err(SpaceError::NonPositiveStep {
                        name: name.to_string(),
                        step: *step as f64,
                    });
                }
                Ok(())
            }
            Self::FloatRange { min, max, step } => {
                if !(min.is_finite() && max.is_finite()) {
                    return Err(SpaceError::NonFinite {
                        name: name.to_string(),
                    });
                }
                if min > max {
                    return Err(SpaceError::InvertedBounds {
                        name: name.to_string(),
                        min: *min,
                        max: *max,
                    });
                }
                match step {
                    Some(s) if s.is_nan() || *s <= 0.0 => Err(SpaceError::NonPositiveStep {
                        name: name.to_string(),
                        step: *s,
                    }),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Every value grid search visits, in enumeration order.
    pub fn grid_values(&self, name: &str) -> Result<Vec<ParamValue>, SpaceError> {
        self.validate(name)?;
        match self {
            Self::Discrete { values } => Ok(values.clone()),
            Self::IntRange { min, max, step } => {
                let slots = int_slots(*min, *max, *step);
                if slots >= MAX_GRID_VALUES as i128 {
                    return Err(SpaceError::TooManyValues {
                        name: name.to_string(),
                    });
                }
                Ok((0..=slots)
                    .map(|i| ParamValue::Int(int_at(*min, *step, i)))
                    .collect())
            }
            Self::FloatRange { min, max, step } => {
                let step = step.ok_or_else(|| SpaceError::MissingStep {
                    name: name.to_string(),
                })?;
                let span = ((max - min) / step + 1e-9).floor();
                if !span.is_finite() || span >= MAX_GRID_VALUES as f64 {
                    return Err(SpaceError::TooManyValues {
                        name: name.to_string(),
                    });
                }
                Ok((0..=span as usize)
                    .map(|i| ParamValue::Float((min + i as f64 * step).min(*max)))
                    .collect())
            }
        }
    }

    /// Uniform draw over the whole domain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            Self::Discrete { values } => values[rng.gen_range(0..values.len())].clone(),
            Self::IntRange { min, max, step } => {
                let slot = rng.gen_range(0..=int_slots(*min, *max, *step));
                ParamValue::Int(int_at(*min, *step, slot))
            }
            Self::FloatRange { min, max, .. } if min == max => ParamValue::Float(*min),
            Self::FloatRange { min, max, .. } => ParamValue::Float(rng.gen_range(*min..=*max)),
        }
    }

    /// Genetic mutation: integer and discrete domains redraw uniformly;
    /// continuous domains add Gaussian noise with `sigma_fraction × range`
    /// and clamp to the bounds.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        current: &ParamValue,
        sigma_fraction: f64,
        rng: &mut R,
    ) -> ParamValue {
        match self {
            Self::FloatRange { min, max, .. } => {
                let base = current.as_f64().unwrap_or(*min);
                let sigma = (max - min) * sigma_fraction;
                match Normal::new(base, sigma) {
                    Ok(normal) if sigma > 0.0 => {
                        ParamValue::Float(normal.sample(rng).clamp(*min, *max))
                    }
                    _ => ParamValue::Float(base.clamp(*min, *max)),
                }
            }
            _ => self.sample(rng),
        }
    }

    /// Numeric bounds, `None` for discrete domains.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Self::Discrete { .. } => None,
            Self::IntRange { min, max, .. } => Some((*min as f64, *max as f64)),
            Self::FloatRange { min, max, .. } => Some((*min, *max)),
        }
    }

    /// Map a continuous proposal back onto the domain.
    pub fn snap(&self, x: f64) -> ParamValue {
        match self {
            Self::IntRange { min, max, step } => {
                let slot = ((x - *min as f64) / *step as f64).round() as i128;
                let slot = slot.clamp(0, int_slots(*min, *max, *step));
                ParamValue::Int(int_at(*min, *step, slot))
            }
            Self::FloatRange { min, max, .. } => ParamValue::Float(x.clamp(*min, *max)),
            Self::Discrete { values } => {
                let idx = (x.round().max(0.0) as usize).min(values.len().saturating_sub(1));
                values[idx].clone()
            }
        }
    }

    /// Whether `value` lies inside the domain.
    pub fn contains(&self, value: &ParamValue) -> bool {
        match self {
            Self::Discrete { values } => values.contains(value),
            Self::IntRange { min, max, step } => value
                .as_i64()
                .is_some_and(|v| {
                    v >= *min && v <= *max && (v as i128 - *min as i128) % *step as i128 == 0
                }),
            Self::FloatRange { min, max, .. } => {
                value.as_f64().is_some_and(|v| v >= *min && v <= *max)
            }
        }
    }
}

/// Named parameter domains, iterated in sorted name order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSpace {
    params: BTreeMap<String, ParamDomain>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, domain: ParamDomain) -> Self {
        self.insert(name, domain);
        self
    }

    pub fn insert(&mut self, name: &str, domain: ParamDomain) {
        self.params.insert(name.to_string(), domain);
    }

    pub fn get(&self, name: &str) -> Option<&ParamDomain> {
        self.params.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamDomain)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn validate(&self) -> Result<(), SpaceError> {
        if self.params.is_empty() {
            return Err(SpaceError::Empty);
        }
        for (name, domain) in &self.params {
            domain.validate(name)?;
        }
        Ok(())
    }

    /// Grid values per parameter, in sorted name order. Fails once the
    /// running product of value counts passes [`MAX_GRID_VALUES`].
    fn grid_dimensions(&self) -> Result<Vec<(&String, Vec<ParamValue>)>, SpaceError> {
        self.validate()?;
        let mut total = 1usize;
        let mut dims = Vec::with_capacity(self.params.len());
        for (name, domain) in &self.params {
            let values = domain.grid_values(name)?;
            total = total
                .checked_mul(values.len())
                .filter(|&t| t <= MAX_GRID_VALUES)
                .ok_or_else(|| SpaceError::TooManyValues { name: name.clone() })?;
            dims.push((name, values));
        }
        Ok(dims)
    }

    /// Cartesian product of every parameter's grid values. Parameters are
    /// taken in sorted name order and the last one varies fastest.
    pub fn grid(&self) -> Result<Vec<ParamSet>, SpaceError> {
        let mut combos: Vec<ParamSet> = vec![ParamSet::new()];
        for (name, values) in self.grid_dimensions()? {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |v| {
                        let mut next = combo.clone();
                        next.insert(name.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(combos)
    }

    /// Number of grid combinations.
    pub fn grid_size(&self) -> Result<usize, SpaceError> {
        Ok(self
            .grid_dimensions()?
            .iter()
            .map(|(_, values)| values.len())
            .product())
    }

    /// One uniform draw per parameter.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamSet {
        self.params
            .iter()
            .map(|(name, domain)| (name.clone(), domain.sample(rng)))
            .collect()
    }
}
