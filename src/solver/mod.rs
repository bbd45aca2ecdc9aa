//! Nash equilibrium computation by the Global Newton Method.
//!
//! [`GnmSolver`] follows one homotopy path per perturbation vector and
//! reports every equilibrium on it. Several perturbations can be run in
//! turn with [`GnmSolver::solve_many`], typically from
//! [`random_perturbations`].

mod gnm;
pub mod linalg;
pub mod renderer;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::core::{MixedProfile, TableGame};
use crate::util::config::GnmConfig;
use crate::util::errors::{GambitError, Result};

use gnm::{Tracer, DUPLICATE_TOL};
use linalg::norm;

pub use renderer::{CsvRenderer, NullRenderer, ProfileRenderer};

/// Paths tried per perturbation when support changes keep coinciding.
const MAX_ATTEMPTS: usize = 3;

/// Global Newton Method solver for strategic-form games.
#[derive(Debug, Clone)]
pub struct GnmSolver {
    config: GnmConfig,
}

impl Default for GnmSolver {
    fn default() -> Self {
        GnmSolver {
            config: GnmConfig::default(),
        }
    }
}

impl GnmSolver {
    pub fn new(config: GnmConfig) -> Result<Self> {
        config.validate()?;
        Ok(GnmSolver { config })
    }

    pub fn config(&self) -> &GnmConfig {
        &self.config
    }

    /// Equilibria on the path started from `perturbation`.
    pub fn solve<'g>(
        &self,
        game: &'g TableGame,
        perturbation: &[f64],
    ) -> Result<Vec<MixedProfile<'g>>> {
        self.solve_with(game, perturbation, &mut NullRenderer)
    }

    /// Like [`solve`](Self::solve), passing each equilibrium to `renderer`
    /// as soon as it is found.
    ///
    /// `perturbation` is a vector over all strategies in player order. Only
    /// its direction matters.
    pub fn solve_with<'g>(
        &self,
        game: &'g TableGame,
        perturbation: &[f64],
        renderer: &mut dyn ProfileRenderer,
    ) -> Result<Vec<MixedProfile<'g>>> {
        if perturbation.len() != game.total_strategies() {
            return Err(GambitError::PerturbationLength {
                expected: game.total_strategies(),
                actual: perturbation.len(),
            });
        }

        let Some(normalized) = game.normalized() else {
            // Every profile is an equilibrium of a constant game.
            let tracer = Tracer::new(game, &self.config, perturbation)?;
            let profile = MixedProfile::from_vec(game, tracer.best_response_to_perturbation()?)?;
            renderer.render(&profile)?;
            return Ok(vec![profile]);
        };

        let mut found: Vec<MixedProfile<'g>> = Vec::new();
        let mut g = perturbation.to_vec();
        let mut wobbled = false;

        for attempt in 0..MAX_ATTEMPTS {
            let tracer = Tracer::new(&normalized, &self.config, &g)?;
            let mut emit = |sigma: &[f64]| -> Result<()> {
                let duplicate = found.iter().any(|p| {
                    p.as_slice()
                        .iter()
                        .zip(sigma)
                        .all(|(a, b)| (a - b).abs() <= DUPLICATE_TOL)
                });
                if duplicate {
                    return Ok(());
                }
                let profile = MixedProfile::from_vec(game, sigma.to_vec())?;
                info!("equilibrium found: {}", profile);
                renderer.render(&profile)?;
                found.push(profile);
                Ok(())
            };
            let report = tracer.run(&mut emit)?;
            debug!(
                "path ended at lambda = {:.6} after {} steps",
                report.final_lambda, report.iterations
            );

            let Some(failure) = report.failure else {
                break;
            };
            let degenerate = matches!(failure, GambitError::DegenerateBoundary { .. });
            let retry = attempt + 1 < MAX_ATTEMPTS
                && (degenerate || (self.config.wobble && !wobbled));
            if retry {
                wobbled |= !degenerate;
                warn!("path failed ({}), retrying from a nudged perturbation", failure);
                g = nudge(perturbation, attempt);
            } else if found.is_empty() {
                return Err(failure);
            } else {
                warn!("path ended early: {}", failure);
                break;
            }
        }

        Ok(found)
    }

    /// Run every perturbation in turn and concatenate the results.
    ///
    /// Equilibria reached from more than one perturbation are reported once
    /// per perturbation.
    pub fn solve_many<'g>(
        &self,
        game: &'g TableGame,
        perturbations: &[MixedProfile<'_>],
        renderer: &mut dyn ProfileRenderer,
    ) -> Result<Vec<MixedProfile<'g>>> {
        let mut all = Vec::new();
        for (i, pert) in perturbations.iter().enumerate() {
            tracing::debug!("perturbation {}/{}", i + 1, perturbations.len());
            all.extend(self.solve_with(game, pert.as_slice(), renderer)?);
        }
        Ok(all)
    }
}

/// `count` random profiles to start paths from.
pub fn random_perturbations<'g, R: Rng + ?Sized>(
    game: &'g TableGame,
    count: usize,
    rng: &mut R,
) -> Vec<MixedProfile<'g>> {
    (0..count)
        .map(|_| {
            let mut profile = MixedProfile::centroid(game);
            profile.randomize(rng);
            profile
        })
        .collect()
}

/// A small deterministic shift that breaks a degenerate path. Each attempt
/// shifts the entries in a different pattern.
fn nudge(g: &[f64], attempt: usize) -> Vec<f64> {
    let scale = 1e-4 * norm(g).max(1.0);
    g.iter()
        .enumerate()
        .map(|(k, x)| x + scale * (((k + attempt) % 5) as f64 - 2.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rejects_wrong_perturbation_length() {
        let game = TableGame::new(&[2, 2]).unwrap();
        let err = GnmSolver::default().solve(&game, &[1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            GambitError::PerturbationLength {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_constant_game_returns_best_response() {
        let game = TableGame::from_payoffs(&[2, 2], &[1.0; 8]).unwrap();
        let eqs = GnmSolver::default()
            .solve(&game, &[0.1, 0.9, 0.8, 0.2])
            .unwrap();
        assert_eq!(eqs.len(), 1);
        assert_eq!(eqs[0].as_slice(), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GnmConfig {
            steps: 0,
            ..GnmConfig::default()
        };
        assert!(matches!(
            GnmSolver::new(config),
            Err(GambitError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_random_perturbations_shape() {
        let game = TableGame::new(&[2, 3]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let perts = random_perturbations(&game, 3, &mut rng);
        assert_eq!(perts.len(), 3);
        assert!(perts.iter().all(|p| p.is_on_simplex(1e-12)));
        assert_ne!(perts[0].as_slice(), perts[1].as_slice());
    }

    #[test]
    fn test_nudge_changes_vector() {
        let g = vec![0.5; 5];
        let first = nudge(&g, 0);
        let second = nudge(&g, 1);
        assert_ne!(g, first);
        assert_eq!(first[2], 0.5);
        assert_eq!(second[1], 0.5);
        assert_ne!(first, second);
    }

    #[test]
    fn test_coinciding_support_changes_are_retried() {
        // Equal gaps between each player's perturbation entries make two
        // support changes land on the same point of the path.
        let game = TableGame::from_payoffs(&[2, 2], &[1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0])
            .unwrap();
        let eqs = GnmSolver::default()
            .solve(&game, &[0.3, 0.1, 0.2, 0.4])
            .unwrap();
        assert_eq!(eqs.len(), 1);
        for p in eqs[0].as_slice() {
            assert!((p - 0.5).abs() < 1e-6);
        }
    }
}
