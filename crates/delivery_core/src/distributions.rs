//! Time samplers: parametrized distributions that yield non-negative durations.
//!
//! Agents draw preparation, handover and inter-arrival delays from a
//! [TimeSampler]. Every sampler owns a seeded RNG so a run is reproducible for
//! a fixed scenario seed.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Normal, Triangular, Uniform};
use serde::{Deserialize, Serialize};

use crate::clock::{ONE_HOUR_MS, ONE_MIN_MS, ONE_SEC_MS};
use crate::error::SamplerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub fn ms_per_unit(self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1.0,
            TimeUnit::Seconds => ONE_SEC_MS as f64,
            TimeUnit::Minutes => ONE_MIN_MS as f64,
            TimeUnit::Hours => ONE_HOUR_MS as f64,
        }
    }
}

#[derive(Debug, Clone)]
enum Family {
    Fixed(f64),
    Uniform(Uniform<f64>),
    Exponential(Exp<f64>),
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
    Triangular(Triangular<f64>),
}

impl Family {
    fn name(&self) -> &'static str {
        match self {
            Family::Fixed(_) => "fixed",
            Family::Uniform(_) => "uniform",
            Family::Exponential(_) => "exponential",
            Family::Normal(_) => "normal",
            Family::LogNormal(_) => "lognormal",
            Family::Gamma(_) => "gamma",
            Family::Triangular(_) => "triangular",
        }
    }

    fn draw(&self, rng: &mut StdRng) -> f64 {
        match self {
            Family::Fixed(value) => *value,
            Family::Uniform(dist) => dist.sample(rng),
            Family::Exponential(dist) => dist.sample(rng),
            Family::Normal(dist) => dist.sample(rng),
            Family::LogNormal(dist) => dist.sample(rng),
            Family::Gamma(dist) => dist.sample(rng),
            Family::Triangular(dist) => dist.sample(rng),
        }
    }
}

fn expect_params(family: &'static str, params: &[f64], expected: usize) -> Result<(), SamplerError> {
    if params.len() != expected {
        return Err(SamplerError::ParameterCount {
            family,
            expected,
            got: params.len(),
        });
    }
    if let Some(bad) = params.iter().find(|p| !p.is_finite()) {
        return Err(SamplerError::InvalidParameters {
            family,
            reason: format!("parameter {bad} is not finite"),
        });
    }
    Ok(())
}

fn invalid(family: &'static str, reason: impl ToString) -> SamplerError {
    SamplerError::InvalidParameters {
        family,
        reason: reason.to_string(),
    }
}

/// Duration source backed by one distribution family.
///
/// Families and their parameters (in `unit`s):
///
/// | family        | parameters            |
/// |---------------|-----------------------|
/// | `fixed`       | value                 |
/// | `uniform`     | low, high             |
/// | `exponential` | mean                  |
/// | `normal`      | mean, std_dev         |
/// | `lognormal`   | mu, sigma (log-space) |
/// | `gamma`       | shape, scale          |
/// | `triangular`  | min, max, mode        |
#[derive(Debug, Clone)]
pub struct TimeSampler {
    family: Family,
    unit: TimeUnit,
    rng: StdRng,
}

impl TimeSampler {
    pub fn new(
        family: &str,
        params: &[f64],
        unit: TimeUnit,
        seed: u64,
    ) -> Result<Self, SamplerError> {
        let family = match family.to_ascii_lowercase().as_str() {
            "fixed" | "constant" => {
                expect_params("fixed", params, 1)?;
                if params[0] < 0.0 {
                    return Err(invalid("fixed", "value must be non-negative"));
                }
                Family::Fixed(params[0])
            }
            "uniform" => {
                expect_params("uniform", params, 2)?;
                let (low, high) = (params[0], params[1]);
                if low < 0.0 || low > high {
                    return Err(invalid("uniform", "expected 0 <= low <= high"));
                }
                Family::Uniform(Uniform::new_inclusive(low, high))
            }
            "exponential" => {
                expect_params("exponential", params, 1)?;
                if params[0] <= 0.0 {
                    return Err(invalid("exponential", "mean must be positive"));
                }
                Family::Exponential(Exp::new(1.0 / params[0]).map_err(|e| invalid("exponential", e))?)
            }
            "normal" => {
                expect_params("normal", params, 2)?;
                Family::Normal(Normal::new(params[0], params[1]).map_err(|e| invalid("normal", e))?)
            }
            "lognormal" => {
                expect_params("lognormal", params, 2)?;
                Family::LogNormal(
                    LogNormal::new(params[0], params[1]).map_err(|e| invalid("lognormal", e))?,
                )
            }
            "gamma" => {
                expect_params("gamma", params, 2)?;
                Family::Gamma(Gamma::new(params[0], params[1]).map_err(|e| invalid("gamma", e))?)
            }
            "triangular" => {
                expect_params("triangular", params, 3)?;
                if params[0] < 0.0 {
                    return Err(invalid("triangular", "min must be non-negative"));
                }
                Family::Triangular(
                    Triangular::new(params[0], params[1], params[2])
                        .map_err(|e| invalid("triangular", e))?,
                )
            }
            other => return Err(SamplerError::UnknownFamily(other.to_string())),
        };
        Ok(Self {
            family,
            unit,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// A sampler that always yields `ms` milliseconds.
    pub fn fixed_ms(ms: u64) -> Self {
        Self {
            family: Family::Fixed(ms as f64),
            unit: TimeUnit::Milliseconds,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family.name()
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Draws one duration in the sampler's unit.
    pub fn sample(&mut self) -> f64 {
        self.family.draw(&mut self.rng)
    }

    /// Draws one duration converted to simulation milliseconds.
    ///
    /// Families with support below zero (e.g. `normal`) can draw a negative value;
    /// that is reported as [SamplerError::InvalidSample] rather than clamped.
    pub fn sample_ms(&mut self) -> Result<u64, SamplerError> {
        let value = self.sample();
        let ms = value * self.unit.ms_per_unit();
        if !ms.is_finite() || ms < 0.0 {
            return Err(SamplerError::InvalidSample {
                family: self.family.name(),
                value,
            });
        }
        Ok(ms.round() as u64)
    }
}

/// Draws from an optional sampler; absent samplers mean "no delay".
pub fn sample_or_zero(sampler: Option<&mut TimeSampler>) -> Result<u64, SamplerError> {
    sampler.map_or(Ok(0), TimeSampler::sample_ms)
}

/// Serializable sampler description, e.g. `{"family": "exponential", "params": [5], "unit": "minutes"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerParams {
    pub family: String,
    #[serde(default)]
    pub params: Vec<f64>,
    #[serde(default)]
    pub unit: TimeUnit,
}

impl SamplerParams {
    pub fn new(family: impl Into<String>, params: Vec<f64>, unit: TimeUnit) -> Self {
        Self {
            family: family.into(),
            params,
            unit,
        }
    }

    pub fn fixed(value: f64, unit: TimeUnit) -> Self {
        Self::new("fixed", vec![value], unit)
    }

    pub fn build(&self, seed: u64) -> Result<TimeSampler, SamplerError> {
        TimeSampler::new(&self.family, &self.params, self.unit, seed)
    }
}
