//! Scalar potential interface.
//!
//! The sampler only consumes the scalar values of an external field and a
//! pair interaction; the physics of particular potentials lives behind
//! this trait. A few simple forms are provided for tests and demos.

use serde::Deserialize;

use crate::DVec;

/// External plus pair potential seen by the action.
pub trait Potential {
    /// Name of the potential for display.
    fn name(&self) -> &'static str;

    /// External field V(r) at a position.
    fn external(&self, r: &DVec) -> f64 {
        let _ = r;
        0.0
    }

    /// Pair interaction v(r_ij) for a minimum-image separation.
    fn pair(&self, sep: &DVec) -> f64 {
        let _ = sep;
        0.0
    }
}

/// No interactions at all: the ideal Bose gas.
#[derive(Debug, Clone, Default)]
pub struct FreePotential;

impl Potential for FreePotential {
    fn name(&self) -> &'static str {
        "free"
    }
}

/// Harmonic external trap V(r) = (1/2) omega^2 |r|^2.
#[derive(Debug, Clone)]
pub struct HarmonicPotential {
    pub omega: f64,
}

impl Potential for HarmonicPotential {
    fn name(&self) -> &'static str {
        "harmonic"
    }

    fn external(&self, r: &DVec) -> f64 {
        0.5 * self.omega * self.omega * r.norm_squared()
    }
}

/// Soft Gaussian pair repulsion v(r) = amplitude * exp(-r^2 / (2 width^2)).
#[derive(Debug, Clone)]
pub struct GaussianPotential {
    pub amplitude: f64,
    pub width: f64,
}

impl Potential for GaussianPotential {
    fn name(&self) -> &'static str {
        "gaussian pair"
    }

    fn pair(&self, sep: &DVec) -> f64 {
        self.amplitude * (-sep.norm_squared() / (2.0 * self.width * self.width)).exp()
    }
}

/// Config-level selection of a potential.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PotentialChoice {
    #[default]
    Free,
    Harmonic {
        omega: f64,
    },
    GaussianPair {
        amplitude: f64,
        width: f64,
    },
}

impl PotentialChoice {
    pub fn build(&self) -> Box<dyn Potential> {
        match *self {
            PotentialChoice::Free => Box::new(FreePotential),
            PotentialChoice::Harmonic { omega } => Box::new(HarmonicPotential { omega }),
            PotentialChoice::GaussianPair { amplitude, width } => {
                Box::new(GaussianPotential { amplitude, width })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_free_is_zero() {
        let v = FreePotential;
        assert_relative_eq!(v.external(&DVec::repeat(1.3)), 0.0);
        assert_relative_eq!(v.pair(&DVec::repeat(0.2)), 0.0);
    }

    #[test]
    fn test_harmonic_external() {
        let v = HarmonicPotential { omega: 2.0 };
        let r = DVec::repeat(1.0);
        assert_relative_eq!(v.external(&r), 2.0 * r.norm_squared(), epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_pair_decays() {
        let v = GaussianPotential { amplitude: 1.5, width: 0.5 };
        assert_relative_eq!(v.pair(&DVec::zeros()), 1.5, epsilon = 1e-12);
        assert!(v.pair(&DVec::repeat(2.0)) < 1e-6);
    }
}
