//! Global Newton Method path following.
//!
//! For a perturbation `g` the solver follows the solution set of
//!
//! ```text
//! H(z, λ) = z − r(z) − V(r(z)) − λ·g = 0
//! ```
//!
//! where `r` retracts `z` onto the product of simplices and `V` maps a
//! profile to the expected payoff of every pure strategy. `σ = r(z)` is an
//! equilibrium of the game with payoffs `V + λ·g`, so every point where the
//! path crosses `λ = 0` yields an equilibrium of the game itself.
//!
//! `r` is affine on each region where the set of strategies in use (the
//! support) is fixed. The path is followed region by region: a tangent
//! predictor, Newton correction orthogonal to the tangent, and exact steps
//! onto support boundaries.

use tracing::{debug, warn};

use super::linalg::{dot, max_norm, norm, Lu, Matrix};
use crate::core::profile::strategy_values;
use crate::core::TableGame;
use crate::util::config::GnmConfig;
use crate::util::errors::{GambitError, Result};

/// Residual accepted after an ordinary predictor step.
const LOOSE_TOL: f64 = 1e-9;
/// Slack allowed when checking that a point lies in its support region.
const REGION_TOL: f64 = 1e-8;
/// Smallest predictor step before giving up.
const MIN_STEP: f64 = 1e-12;
/// Minimum cosine between consecutive tangents inside one region.
const MIN_TANGENT_COS: f64 = 0.9;
/// Newton iterations allowed after an ordinary predictor step.
const QUICK_ITERS: usize = 4;
/// Boundaries met within this many units of step of the nearest one
/// coincide with it.
const BOUNDARY_TIE_TOL: f64 = 1e-10;
/// Profiles closer than this (max norm) are the same equilibrium.
pub(crate) const DUPLICATE_TOL: f64 = 1e-6;

/// Shape of the strategy space, derived once from the game.
struct Layout {
    /// Player owning each flat strategy index.
    owner: Vec<usize>,
    offsets: Vec<usize>,
    counts: Vec<usize>,
}

impl Layout {
    fn new(game: &TableGame) -> Self {
        let mut owner = Vec::with_capacity(game.total_strategies());
        for pl in 0..game.num_players() {
            owner.extend(std::iter::repeat(pl).take(game.num_strategies(pl)));
        }
        Layout {
            owner,
            offsets: (0..game.num_players()).map(|pl| game.offset(pl)).collect(),
            counts: game.strategy_counts(),
        }
    }

    fn range(&self, pl: usize) -> std::ops::Range<usize> {
        self.offsets[pl]..self.offsets[pl] + self.counts[pl]
    }
}

/// The strategies currently in use, flat, with per-player sizes.
#[derive(Debug, Clone, PartialEq)]
struct Support {
    active: Vec<bool>,
    sizes: Vec<usize>,
}

impl Support {
    fn toggle(&mut self, idx: usize, owner: usize) {
        if self.active[idx] {
            self.active[idx] = false;
            self.sizes[owner] -= 1;
        } else {
            self.active[idx] = true;
            self.sizes[owner] += 1;
        }
    }
}

/// Outcome of following one path.
pub(crate) struct PathReport {
    /// Equilibria found on the normalised game, flat.
    pub equilibria: Vec<Vec<f64>>,
    /// Why the path stopped early, if it did.
    pub failure: Option<GambitError>,
    /// Predictor steps tried, accepted or not.
    pub iterations: usize,
    /// λ where the path was left.
    pub final_lambda: f64,
}

/// Follows the GNM path for one perturbation on a game with payoffs in [0, 1].
pub(crate) struct Tracer<'a> {
    game: &'a TableGame,
    config: &'a GnmConfig,
    layout: Layout,
    g: Vec<f64>,
    /// Number of strategies; the path lives in `n + 1` dimensions.
    n: usize,
    max_iterations: usize,
}

impl<'a> Tracer<'a> {
    /// `g` must already have the game's dimension.
    pub fn new(game: &'a TableGame, config: &'a GnmConfig, g: &[f64]) -> Result<Self> {
        let length = norm(g);
        if !(length > 0.0) {
            return Err(GambitError::ZeroPerturbation);
        }
        Ok(Tracer {
            game,
            config,
            layout: Layout::new(game),
            g: g.iter().map(|x| x / length).collect(),
            n: game.total_strategies(),
            max_iterations: config.steps.saturating_mul(1000),
        })
    }

    /// The pure profile where each player plays their best strategy under `g`.
    pub fn best_response_to_perturbation(&self) -> Result<Vec<f64>> {
        let mut sigma = vec![0.0; self.n];
        for pl in 0..self.layout.counts.len() {
            let best = self.best_index(pl)?;
            sigma[best] = 1.0;
        }
        Ok(sigma)
    }

    fn best_index(&self, pl: usize) -> Result<usize> {
        let range = self.layout.range(pl);
        let mut best = range.start;
        for idx in range.clone() {
            if self.g[idx] > self.g[best] {
                best = idx;
            }
        }
        let tied = range
            .filter(|&idx| idx != best)
            .any(|idx| (self.g[best] - self.g[idx]).abs() <= 1e-12);
        if tied {
            return Err(GambitError::TiedPerturbation { player: pl + 1 });
        }
        Ok(best)
    }

    /// Follow the path from large λ down to `lambda_end`, reporting every
    /// equilibrium through `on_equilibrium` as it is found.
    pub fn run(&self, on_equilibrium: &mut dyn FnMut(&[f64]) -> Result<()>) -> Result<PathReport> {
        let (mut y, mut support) = self.start()?;
        let lambda_start = y[self.n];
        let mut report = PathReport {
            equilibria: Vec::new(),
            failure: None,
            iterations: 0,
            final_lambda: lambda_start,
        };

        let up = {
            let mut e = vec![0.0; self.n + 1];
            e[self.n] = -1.0;
            e
        };
        let (mut t, orientation) = match self.tangent(&y, &support, &up, None) {
            Ok(pair) => pair,
            Err(e) => {
                report.failure = Some(e);
                return Ok(report);
            }
        };

        let mut h = 1.0 / self.config.steps as f64;
        let mut accepted = 0usize;

        debug!(
            "starting path at lambda = {:.6} with {} strategies",
            lambda_start, self.n
        );

        for iteration in 0.. {
            report.iterations = iteration;
            report.final_lambda = y[self.n];
            if iteration >= self.max_iterations {
                warn!(
                    "path stopped after {} steps at lambda = {:.6}",
                    iteration, y[self.n]
                );
                break;
            }
            let lambda = y[self.n];
            if lambda < self.config.lambda_end {
                break;
            }
            if lambda > lambda_start + 1.0 {
                report.failure = Some(GambitError::PathReversed { lambda });
                break;
            }
            if h < MIN_STEP {
                report.failure = Some(GambitError::StepCollapse { lambda });
                break;
            }
            let h_max = 1.0_f64.max(0.5 * lambda.abs());
            h = h.min(h_max);

            if let Some((hits, tau)) = self.first_boundary(&y, &t, &support, h) {
                let &[idx] = hits.as_slice() else {
                    // Two strategies change status at once; the caller
                    // retries from a nudged perturbation.
                    let lambda = y[self.n] + tau * t[self.n];
                    debug!("coinciding support changes at strategies {:?}", hits);
                    report.failure = Some(GambitError::DegenerateBoundary { lambda });
                    break;
                };
                let pred = axpy(&y, tau, &t);
                let corrected = self
                    .correct_to_boundary(&pred, &support, idx)
                    .filter(|c| self.in_region(c, &support))
                    .filter(|c| distance(c, &pred) <= h.max(1e-6));
                let Some(next) = corrected else {
                    h = 0.5 * tau;
                    continue;
                };

                self.check_crossing(&y, &next, &support, &mut report, on_equilibrium)?;
                support.toggle(idx, self.layout.owner[idx]);
                y = next;
                debug!(
                    "support change at strategy {} (lambda = {:.6})",
                    idx, y[self.n]
                );
                match self.tangent(&y, &support, &t, Some(orientation)) {
                    Ok((next_t, _)) => t = next_t,
                    Err(e) => {
                        report.failure = Some(e);
                        break;
                    }
                }
                continue;
            }

            let pred = axpy(&y, h, &t);
            let full = accepted % self.config.lnm_frequency == 0;
            let Some((next, iters)) = self.correct(&pred, &support, &t, full) else {
                h *= 0.5;
                continue;
            };
            if !self.in_region(&next, &support) || distance(&next, &pred) > h {
                h *= 0.5;
                continue;
            }
            let next_t = match self.tangent(&next, &support, &t, Some(orientation)) {
                Ok((next_t, _)) => next_t,
                Err(_) => {
                    h *= 0.5;
                    continue;
                }
            };
            if dot(&t, &next_t) < MIN_TANGENT_COS {
                h *= 0.5;
                continue;
            }

            self.check_crossing(&y, &next, &support, &mut report, on_equilibrium)?;
            y = next;
            t = next_t;
            accepted += 1;
            if iters <= 1 {
                h *= 2.0;
            } else if iters >= QUICK_ITERS {
                h *= 0.5;
            }
            debug!("lambda = {:.6}, step = {:.3e}", y[self.n], h);
        }

        Ok(report)
    }

    /// Starting point: every player plays their best pure response to `g`,
    /// at a λ large enough that no other strategy is competitive.
    fn start(&self) -> Result<(Vec<f64>, Support)> {
        let sigma = self.best_response_to_perturbation()?;
        let values = strategy_values(self.game, &sigma);

        let mut lambda: f64 = 0.0;
        for pl in 0..self.layout.counts.len() {
            let best = self.best_index(pl)?;
            for idx in self.layout.range(pl).filter(|&idx| idx != best) {
                let entry = (1.0 + values[idx] - values[best]) / (self.g[best] - self.g[idx]);
                lambda = lambda.max(entry);
            }
        }
        lambda += 1.0;

        let mut y = Vec::with_capacity(self.n + 1);
        for idx in 0..self.n {
            y.push(sigma[idx] + values[idx] + lambda * self.g[idx]);
        }
        y.push(lambda);

        let support = Support {
            active: sigma.iter().map(|&p| p > 0.0).collect(),
            sizes: vec![1; self.layout.counts.len()],
        };
        Ok((y, support))
    }

    /// Per-player thresholds `v` of the retraction on a fixed support.
    fn thresholds(&self, z: &[f64], support: &Support) -> Vec<f64> {
        (0..self.layout.counts.len())
            .map(|pl| {
                let sum: f64 = self
                    .layout
                    .range(pl)
                    .filter(|&idx| support.active[idx])
                    .map(|idx| z[idx])
                    .sum();
                (sum - 1.0) / support.sizes[pl] as f64
            })
            .collect()
    }

    /// `z − v` for every strategy: the profile on the support, and the
    /// distance below the threshold elsewhere.
    fn boundary_values(&self, z: &[f64], support: &Support) -> Vec<f64> {
        let v = self.thresholds(z, support);
        (0..self.n)
            .map(|idx| z[idx] - v[self.layout.owner[idx]])
            .collect()
    }

    fn retract(&self, z: &[f64], support: &Support) -> Vec<f64> {
        self.boundary_values(z, support)
            .into_iter()
            .enumerate()
            .map(|(idx, w)| if support.active[idx] { w } else { 0.0 })
            .collect()
    }

    fn residual(&self, y: &[f64], support: &Support) -> Vec<f64> {
        let lambda = y[self.n];
        let sigma = self.retract(&y[..self.n], support);
        let values = strategy_values(self.game, &sigma);
        (0..self.n)
            .map(|idx| y[idx] - sigma[idx] - values[idx] - lambda * self.g[idx])
            .collect()
    }

    /// Derivative of the strategy values with respect to the profile.
    fn value_jacobian(&self, sigma: &[f64]) -> Matrix {
        let game = self.game;
        let players = game.num_players();
        let mut dv = Matrix::zeros(self.n, self.n);
        for cont in game.contingencies() {
            let payoffs = game.contingency_payoffs(cont.index);
            for i in 0..players {
                let row = game.offset(i) + cont.profile[i];
                for j in (0..players).filter(|&j| j != i) {
                    let mut weight = payoffs[i];
                    for (k, &s) in cont.profile.iter().enumerate() {
                        if k != i && k != j {
                            weight *= sigma[game.offset(k) + s];
                        }
                    }
                    dv[(row, game.offset(j) + cont.profile[j])] += weight;
                }
            }
        }
        dv
    }

    /// `n × (n + 1)` Jacobian of `H` on a fixed support.
    fn jacobian(&self, y: &[f64], support: &Support) -> Matrix {
        let sigma = self.retract(&y[..self.n], support);
        let mut a = self.value_jacobian(&sigma);
        for i in 0..self.n {
            a[(i, i)] += 1.0;
        }

        let mut j = Matrix::zeros(self.n, self.n + 1);
        for row in 0..self.n {
            for pl in 0..self.layout.counts.len() {
                let range = self.layout.range(pl);
                let mean: f64 = range
                    .clone()
                    .filter(|&c| support.active[c])
                    .map(|c| a[(row, c)])
                    .sum::<f64>()
                    / support.sizes[pl] as f64;
                for col in range.filter(|&c| support.active[c]) {
                    j[(row, col)] = -(a[(row, col)] - mean);
                }
            }
            j[(row, row)] += 1.0;
            j[(row, self.n)] = -self.g[row];
        }
        j
    }

    /// Gradient of the boundary value of strategy `idx` with respect to `y`.
    fn boundary_gradient(&self, idx: usize, support: &Support) -> Vec<f64> {
        let pl = self.layout.owner[idx];
        let share = 1.0 / support.sizes[pl] as f64;
        let mut grad = vec![0.0; self.n + 1];
        for c in self.layout.range(pl).filter(|&c| support.active[c]) {
            grad[c] -= share;
        }
        grad[idx] += 1.0;
        grad
    }

    /// Unit tangent at `y`, oriented consistently with the path.
    ///
    /// Solves `[J; prev] x = e` so that `x` is a kernel vector of `J`. The
    /// sign of `det [J; x]` is invariant along the path, so `x` is flipped
    /// whenever it disagrees with `orientation`. Returns the tangent and the
    /// determinant sign it was computed with.
    fn tangent(
        &self,
        y: &[f64],
        support: &Support,
        prev: &[f64],
        orientation: Option<f64>,
    ) -> Result<(Vec<f64>, f64)> {
        let j = self.jacobian(y, support);
        let lu = Lu::factor(&augment(&j, prev)).ok_or(GambitError::Singular)?;
        let mut e = vec![0.0; self.n + 1];
        e[self.n] = 1.0;
        let mut x = lu.solve(&e);
        let length = norm(&x);
        if !(length > 0.0) || !length.is_finite() {
            return Err(GambitError::Singular);
        }
        let mut sign = lu.det_sign();
        if let Some(orientation) = orientation {
            if sign != orientation {
                sign = orientation;
                for v in &mut x {
                    *v = -*v;
                }
            }
        }
        for v in &mut x {
            *v /= length;
        }
        Ok((x, sign))
    }

    /// Newton correction of a predicted point within the hyperplane
    /// orthogonal to `t`.
    fn correct(
        &self,
        pred: &[f64],
        support: &Support,
        t: &[f64],
        full: bool,
    ) -> Option<(Vec<f64>, usize)> {
        let (tol, max_iters) = if full {
            (self.tight_tol(), self.config.lnm_max)
        } else {
            (LOOSE_TOL, QUICK_ITERS)
        };

        let mut y = pred.to_vec();
        let mut loose_hit = None;
        for iter in 0..=max_iters {
            let h = self.residual(&y, support);
            let err = max_norm(&h);
            if !err.is_finite() {
                return None;
            }
            if err <= tol {
                return Some((y, iter));
            }
            if err <= LOOSE_TOL && loose_hit.is_none() {
                loose_hit = Some((y.clone(), iter));
            }
            if iter == max_iters {
                break;
            }
            let j = self.jacobian(&y, support);
            let lu = Lu::factor(&augment(&j, t))?;
            let mut rhs: Vec<f64> = h.iter().map(|v| -v).collect();
            rhs.push(0.0);
            let delta = lu.solve(&rhs);
            for (yi, di) in y.iter_mut().zip(&delta) {
                *yi += di;
            }
        }
        // A full correction that cannot reach the tight tolerance still
        // counts if it met the ordinary one.
        loose_hit
    }

    /// Newton correction onto the boundary where strategy `idx` enters or
    /// leaves the support.
    fn correct_to_boundary(&self, pred: &[f64], support: &Support, idx: usize) -> Option<Vec<f64>> {
        let grad = self.boundary_gradient(idx, support);
        let mut y = pred.to_vec();
        for _ in 0..self.config.lnm_max {
            let mut h = self.residual(&y, support);
            h.push(self.boundary_values(&y[..self.n], support)[idx]);
            let err = max_norm(&h);
            if !err.is_finite() {
                return None;
            }
            if err <= LOOSE_TOL {
                return Some(y);
            }
            let j = self.jacobian(&y, support);
            let lu = Lu::factor(&augment(&j, &grad))?;
            let rhs: Vec<f64> = h.iter().map(|v| -v).collect();
            let delta = lu.solve(&rhs);
            for (yi, di) in y.iter_mut().zip(&delta) {
                *yi += di;
            }
        }
        let mut h = self.residual(&y, support);
        h.push(self.boundary_values(&y[..self.n], support)[idx]);
        (max_norm(&h) <= LOOSE_TOL).then_some(y)
    }

    fn tight_tol(&self) -> f64 {
        self.config.fuzz.max(1e-14)
    }

    /// Whether `y` lies in the closure of the region for `support`.
    fn in_region(&self, y: &[f64], support: &Support) -> bool {
        self.boundary_values(&y[..self.n], support)
            .iter()
            .enumerate()
            .all(|(idx, &w)| {
                if support.active[idx] {
                    w >= -REGION_TOL
                } else {
                    w <= REGION_TOL
                }
            })
    }

    /// First support boundary met along `y + τ·t` for `τ ∈ [0, max_step]`,
    /// with every strategy whose boundary falls at the same step.
    fn first_boundary(
        &self,
        y: &[f64],
        t: &[f64],
        support: &Support,
        max_step: f64,
    ) -> Option<(Vec<usize>, f64)> {
        let w = self.boundary_values(&y[..self.n], support);
        // Boundary values are affine in z on a fixed support, so their rate
        // along the tangent is the same map applied to the tangent, minus
        // the constant term.
        let dv: Vec<f64> = (0..self.layout.counts.len())
            .map(|pl| {
                self.layout
                    .range(pl)
                    .filter(|&idx| support.active[idx])
                    .map(|idx| t[idx])
                    .sum::<f64>()
                    / support.sizes[pl] as f64
            })
            .collect();

        let mut hits: Vec<(usize, f64)> = Vec::new();
        for idx in 0..self.n {
            let pl = self.layout.owner[idx];
            let dw = t[idx] - dv[pl];
            let leaving = support.active[idx] && dw < 0.0 && support.sizes[pl] > 1;
            let entering = !support.active[idx] && dw > 0.0;
            if !(leaving || entering) {
                continue;
            }
            let tau = (-w[idx] / dw).max(0.0);
            if tau <= max_step {
                hits.push((idx, tau));
            }
        }

        let nearest = hits.iter().map(|&(_, tau)| tau).reduce(f64::min)?;
        let tied = hits
            .into_iter()
            .filter(|&(_, tau)| tau - nearest <= BOUNDARY_TIE_TOL)
            .map(|(idx, _)| idx)
            .collect();
        Some((tied, nearest))
    }

    /// If the segment from `from` to `to` crosses λ = 0, locate the crossing,
    /// polish it and record it when it is an equilibrium.
    fn check_crossing(
        &self,
        from: &[f64],
        to: &[f64],
        support: &Support,
        report: &mut PathReport,
        on_equilibrium: &mut dyn FnMut(&[f64]) -> Result<()>,
    ) -> Result<()> {
        let (a, b) = (from[self.n], to[self.n]);
        let crosses = (a > 0.0 && b <= 0.0) || (a < 0.0 && b >= 0.0);
        if !crosses {
            return Ok(());
        }

        let frac = a / (a - b);
        let mut y: Vec<f64> = from
            .iter()
            .zip(to)
            .map(|(p, q)| p + frac * (q - p))
            .collect();
        y[self.n] = 0.0;
        if let Some(polished) = self.local_newton(&y, support) {
            y = polished;
        }

        let sigma = self.clean(self.retract(&y[..self.n], support));
        let regret = self.max_regret(&sigma);
        if regret > self.config.threshold {
            debug!(
                "discarding crossing with regret {:.3e} (threshold {:.3e})",
                regret, self.config.threshold
            );
            return Ok(());
        }
        let duplicate = report
            .equilibria
            .iter()
            .any(|found| distance(found, &sigma) <= DUPLICATE_TOL);
        if duplicate {
            return Ok(());
        }

        on_equilibrium(&sigma)?;
        report.equilibria.push(sigma);
        Ok(())
    }

    /// Newton's method on `H(·, 0) = 0` with the support held fixed.
    fn local_newton(&self, y0: &[f64], support: &Support) -> Option<Vec<f64>> {
        let mut y = y0.to_vec();
        for _ in 0..self.config.lnm_max {
            let h = self.residual(&y, support);
            if max_norm(&h) <= self.tight_tol() {
                return Some(y);
            }
            let j = self.jacobian(&y, support);
            let mut jz = Matrix::zeros(self.n, self.n);
            for row in 0..self.n {
                jz.row_mut(row).copy_from_slice(&j.row(row)[..self.n]);
            }
            let lu = Lu::factor(&jz)?;
            let rhs: Vec<f64> = h.iter().map(|v| -v).collect();
            let delta = lu.solve(&rhs);
            for (yi, di) in y.iter_mut().zip(&delta) {
                *yi += di;
            }
        }
        let h = self.residual(&y, support);
        (max_norm(&h) <= LOOSE_TOL).then_some(y)
    }

    /// Zero out probabilities below `fuzz` and renormalise each player.
    fn clean(&self, mut sigma: Vec<f64>) -> Vec<f64> {
        for p in &mut sigma {
            if *p < self.config.fuzz {
                *p = 0.0;
            }
        }
        for pl in 0..self.layout.counts.len() {
            let range = self.layout.range(pl);
            let sum: f64 = sigma[range.clone()].iter().sum();
            if sum > 0.0 {
                for p in &mut sigma[range] {
                    *p /= sum;
                }
            }
        }
        sigma
    }

    fn max_regret(&self, sigma: &[f64]) -> f64 {
        let values = strategy_values(self.game, sigma);
        let mut regret: f64 = 0.0;
        for pl in 0..self.layout.counts.len() {
            let range = self.layout.range(pl);
            let payoff: f64 = range.clone().map(|idx| sigma[idx] * values[idx]).sum();
            for idx in range {
                regret = regret.max(values[idx] - payoff);
            }
        }
        regret
    }
}

/// Stack `row` under `m`.
fn augment(m: &Matrix, row: &[f64]) -> Matrix {
    let mut a = Matrix::zeros(m.rows() + 1, m.cols());
    for i in 0..m.rows() {
        a.row_mut(i).copy_from_slice(m.row(i));
    }
    a.row_mut(m.rows()).copy_from_slice(row);
    a
}

fn axpy(y: &[f64], alpha: f64, x: &[f64]) -> Vec<f64> {
    y.iter().zip(x).map(|(yi, xi)| yi + alpha * xi).collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f64, f64::max)
}
