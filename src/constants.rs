//! Process-wide simulation constants.
//!
//! A run is described by a [`Config`] record (deserialized from YAML) that
//! is validated once into a frozen [`Constants`] table. Moves receive a
//! shared borrow of the table; nothing in it changes after startup.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path as FsPath;

use serde::Deserialize;
use thiserror::Error;

use crate::container::Container;
use crate::potential::PotentialChoice;
use crate::{DVec, NDIM};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("temperature must be positive, got {0}")]
    Temperature(f64),
    #[error("lambda must be positive, got {0}")]
    Lambda(f64),
    #[error("number of time slices must be even and at least 4, got {0}")]
    TimeSlices(usize),
    #[error("worm segment length must satisfy 2 <= mbar < num_time_slices, got {0}")]
    Mbar(usize),
    #[error("bisection levels must satisfy 1 <= levels and 2^levels <= mbar, got levels={levels} mbar={mbar}")]
    Levels { levels: usize, mbar: usize },
    #[error("worm constant must be positive, got {0}")]
    WormConstant(f64),
    #[error("box side must be positive on every axis")]
    BoxSide,
    #[error("attempt probability for '{0}' must be non-negative")]
    AttemptProb(String),
}

fn default_periodic() -> [bool; NDIM] {
    [true; NDIM]
}

fn default_max_worm_cost() -> f64 {
    16.0
}

fn default_com_delta() -> f64 {
    0.3
}

/// Raw run parameters as they appear in a YAML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub temperature: f64,
    #[serde(default)]
    pub chemical_potential: f64,
    pub lambda: f64,
    pub num_time_slices: usize,
    pub mbar: usize,
    pub levels: usize,
    pub worm_constant: f64,
    #[serde(default = "default_com_delta")]
    pub com_delta: f64,
    pub side: [f64; NDIM],
    #[serde(default = "default_periodic")]
    pub periodic: [bool; NDIM],
    pub num_particles: usize,
    #[serde(default = "default_max_worm_cost")]
    pub max_worm_cost: f64,
    /// Relative move weights; missing entries fall back to the defaults.
    #[serde(default)]
    pub attempt_prob: HashMap<String, f64>,
    /// Target edge length of the neighbor-grid cells used by swap moves.
    #[serde(default)]
    pub lookup_cell: Option<f64>,
    #[serde(default)]
    pub potential: PotentialChoice,
}

impl Config {
    pub fn load<P: AsRef<FsPath>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Build the simulation cell described by this config.
    pub fn container(&self) -> Container {
        let mut side = DVec::zeros();
        for i in 0..NDIM {
            side[i] = self.side[i];
        }
        Container::new(side, self.periodic)
    }
}

/// Frozen table of run constants, validated from a [`Config`].
#[derive(Debug, Clone)]
pub struct Constants {
    pub temperature: f64,
    /// Inverse temperature 1/T.
    pub beta: f64,
    /// Imaginary-time step beta / num_time_slices.
    pub tau: f64,
    /// Chemical potential.
    pub mu: f64,
    /// hbar^2 / 2m.
    pub lambda: f64,
    pub num_time_slices: usize,
    /// Maximum worm segment length used by the variable-length moves.
    pub mbar: usize,
    /// Number of bisection levels.
    pub levels: usize,
    /// Worm normalization constant C.
    pub worm_constant: f64,
    /// Center-of-mass displacement scale.
    pub com_delta: f64,
    /// Threshold on |dr|^2 / (4 lambda tau gap) above which a worm
    /// reconnection is considered hopeless.
    pub max_worm_cost: f64,
    /// Thermal de Broglie wavelength sqrt(4 pi lambda beta).
    pub db_wavelength: f64,
    pub initial_num_particles: usize,
    /// Target edge length of the swap-move neighbor grid cells.
    pub lookup_cell: f64,
    attempt_prob: HashMap<String, f64>,
}

/// Default relative move weights. Normalization is irrelevant; only the
/// pair ratios enter the acceptance probabilities.
fn default_attempt_prob() -> HashMap<String, f64> {
    [
        ("center of mass", 0.05),
        ("staging", 0.10),
        ("bisection", 0.05),
        ("open", 0.10),
        ("close", 0.10),
        ("insert", 0.10),
        ("remove", 0.10),
        ("advance head", 0.075),
        ("recede head", 0.075),
        ("advance tail", 0.075),
        ("recede tail", 0.075),
        ("swap head", 0.05),
        ("swap tail", 0.05),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Constants {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        if config.temperature <= 0.0 {
            return Err(ConfigError::Temperature(config.temperature));
        }
        if config.lambda <= 0.0 {
            return Err(ConfigError::Lambda(config.lambda));
        }
        let m = config.num_time_slices;
        if m < 4 || m % 2 != 0 {
            return Err(ConfigError::TimeSlices(m));
        }
        if config.mbar < 2 || config.mbar >= m {
            return Err(ConfigError::Mbar(config.mbar));
        }
        if config.levels == 0 || 1usize << config.levels > config.mbar {
            return Err(ConfigError::Levels { levels: config.levels, mbar: config.mbar });
        }
        if config.worm_constant <= 0.0 {
            return Err(ConfigError::WormConstant(config.worm_constant));
        }
        if config.side.iter().any(|&s| s <= 0.0) {
            return Err(ConfigError::BoxSide);
        }

        let mut attempt_prob = default_attempt_prob();
        for (name, &w) in &config.attempt_prob {
            if w < 0.0 {
                return Err(ConfigError::AttemptProb(name.clone()));
            }
            attempt_prob.insert(name.clone(), w);
        }

        let beta = 1.0 / config.temperature;
        let tau = beta / m as f64;
        let db_wavelength = (4.0 * std::f64::consts::PI * config.lambda * beta).sqrt();
        // The swap neighborhood must cover the free-particle spread over
        // mbar slices; a few standard deviations is plenty.
        let lookup_cell = config
            .lookup_cell
            .unwrap_or_else(|| 4.0 * (2.0 * config.lambda * tau * config.mbar as f64).sqrt());

        Ok(Self {
            temperature: config.temperature,
            beta,
            tau,
            mu: config.chemical_potential,
            lambda: config.lambda,
            num_time_slices: m,
            mbar: config.mbar,
            levels: config.levels,
            worm_constant: config.worm_constant,
            com_delta: config.com_delta,
            max_worm_cost: config.max_worm_cost,
            db_wavelength,
            initial_num_particles: config.num_particles,
            lookup_cell,
            attempt_prob,
        })
    }

    /// Relative attempt weight for the named move (0 when unknown).
    pub fn attempt_prob(&self, name: &str) -> f64 {
        self.attempt_prob.get(name).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
pub(crate) fn test_config(num_particles: usize, side: f64) -> Config {
    Config {
        temperature: 1.0,
        chemical_potential: 0.0,
        lambda: 0.5,
        num_time_slices: 8,
        mbar: 4,
        levels: 2,
        worm_constant: 1.0,
        com_delta: 0.3,
        side: [side; NDIM],
        periodic: [true; NDIM],
        num_particles,
        max_worm_cost: 16.0,
        attempt_prob: HashMap::new(),
        lookup_cell: None,
        potential: PotentialChoice::Free,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_derived_constants() {
        let config = test_config(4, 4.0);
        let constants = Constants::new(&config).unwrap();
        assert_relative_eq!(constants.beta, 1.0, epsilon = 1e-12);
        assert_relative_eq!(constants.tau, 0.125, epsilon = 1e-12);
        assert_relative_eq!(
            constants.db_wavelength,
            (4.0 * std::f64::consts::PI * 0.5).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_validation_rejects_bad_mbar() {
        let mut config = test_config(4, 4.0);
        config.mbar = 8;
        assert!(matches!(Constants::new(&config), Err(ConfigError::Mbar(8))));
        config.mbar = 1;
        assert!(matches!(Constants::new(&config), Err(ConfigError::Mbar(1))));
    }

    #[test]
    fn test_validation_rejects_bad_levels() {
        let mut config = test_config(4, 4.0);
        config.levels = 3;
        assert!(matches!(Constants::new(&config), Err(ConfigError::Levels { .. })));
    }

    #[test]
    fn test_validation_rejects_odd_slices() {
        let mut config = test_config(4, 4.0);
        config.num_time_slices = 7;
        assert!(matches!(Constants::new(&config), Err(ConfigError::TimeSlices(7))));
    }

    #[test]
    fn test_attempt_prob_override() {
        let mut config = test_config(4, 4.0);
        config.attempt_prob.insert("open".to_string(), 0.4);
        let constants = Constants::new(&config).unwrap();
        assert_relative_eq!(constants.attempt_prob("open"), 0.4);
        assert_relative_eq!(constants.attempt_prob("close"), 0.10);
        assert_relative_eq!(constants.attempt_prob("no such move"), 0.0);
    }
}
