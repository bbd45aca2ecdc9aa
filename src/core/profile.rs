//! Mixed strategy profiles on a [`TableGame`].

use std::fmt;

use rand::Rng;

use super::game::TableGame;
use crate::util::errors::{GambitError, Result};

/// One probability distribution per player, stored flat.
///
/// Player `pl`'s strategies occupy `game.offset(pl)..game.offset(pl) + game.num_strategies(pl)`.
#[derive(Debug, Clone)]
pub struct MixedProfile<'g> {
    game: &'g TableGame,
    probs: Vec<f64>,
}

impl PartialEq for MixedProfile<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.game, other.game) && self.probs == other.probs
    }
}

impl<'g> MixedProfile<'g> {
    /// The uniform profile.
    pub fn centroid(game: &'g TableGame) -> Self {
        let mut probs = Vec::with_capacity(game.total_strategies());
        for pl in 0..game.num_players() {
            let n = game.num_strategies(pl);
            probs.extend(std::iter::repeat(1.0 / n as f64).take(n));
        }
        MixedProfile { game, probs }
    }

    /// Build a profile from a flat vector in player/strategy order.
    ///
    /// Values are taken as given; call [`normalize`](Self::normalize) to
    /// project them back onto the simplex.
    pub fn from_vec(game: &'g TableGame, probs: Vec<f64>) -> Result<Self> {
        if probs.len() != game.total_strategies() {
            return Err(GambitError::ProfileLength {
                expected: game.total_strategies(),
                actual: probs.len(),
            });
        }
        Ok(MixedProfile { game, probs })
    }

    /// Build a profile from one list per player.
    pub fn from_lists(game: &'g TableGame, lists: &[Vec<f64>]) -> Result<Self> {
        if lists.len() != game.num_players() {
            return Err(GambitError::PlayerCount {
                expected: game.num_players(),
                actual: lists.len(),
            });
        }
        let mut probs = Vec::with_capacity(game.total_strategies());
        for (pl, list) in lists.iter().enumerate() {
            if list.len() != game.num_strategies(pl) {
                return Err(GambitError::StrategyCount {
                    player: pl + 1,
                    expected: game.num_strategies(pl),
                    actual: list.len(),
                });
            }
            probs.extend_from_slice(list);
        }
        Ok(MixedProfile { game, probs })
    }

    pub fn game(&self) -> &'g TableGame {
        self.game
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.probs
    }

    fn range(&self, pl: usize) -> std::ops::Range<usize> {
        let start = self.game.offset(pl);
        start..start + self.game.num_strategies(pl)
    }

    /// Probabilities of player `pl`.
    pub fn player(&self, pl: usize) -> &[f64] {
        &self.probs[self.range(pl)]
    }

    pub fn get(&self, pl: usize, s: usize) -> f64 {
        self.probs[self.game.offset(pl) + s]
    }

    pub fn set(&mut self, pl: usize, s: usize, value: f64) {
        let index = self.game.offset(pl) + s;
        self.probs[index] = value;
    }

    /// Replace player `pl`'s whole distribution.
    pub fn set_component(&mut self, pl: usize, values: &[f64]) -> Result<()> {
        if pl >= self.game.num_players() {
            return Err(GambitError::NoSuchPlayer { player: pl + 1 });
        }
        if values.len() != self.game.num_strategies(pl) {
            return Err(GambitError::StrategyCount {
                player: pl + 1,
                expected: self.game.num_strategies(pl),
                actual: values.len(),
            });
        }
        let range = self.range(pl);
        self.probs[range].copy_from_slice(values);
        Ok(())
    }

    /// The profile as one list per player.
    pub fn as_lists(&self) -> Vec<Vec<f64>> {
        (0..self.game.num_players())
            .map(|pl| self.player(pl).to_vec())
            .collect()
    }

    /// Draw every probability uniformly from [0, 1), then normalize.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for p in &mut self.probs {
            *p = rng.gen::<f64>();
        }
        self.normalize();
    }

    /// Rescale each player's distribution to sum to one.
    ///
    /// A player whose entries sum to zero gets the uniform distribution.
    pub fn normalize(&mut self) {
        for pl in 0..self.game.num_players() {
            let range = self.range(pl);
            let n = range.len() as f64;
            let sum: f64 = self.probs[range.clone()].iter().sum();
            for p in &mut self.probs[range] {
                *p = if sum != 0.0 { *p / sum } else { 1.0 / n };
            }
        }
    }

    /// Expected payoff of every pure strategy against the profile, flat.
    pub fn strategy_values(&self) -> Vec<f64> {
        strategy_values(self.game, &self.probs)
    }

    /// Expected payoff to `pl` of playing pure strategy `s` against the others.
    pub fn strategy_value(&self, pl: usize, s: usize) -> f64 {
        self.strategy_values()[self.game.offset(pl) + s]
    }

    /// Expected payoff to player `pl`.
    pub fn payoff(&self, pl: usize) -> f64 {
        let values = self.strategy_values();
        let range = self.range(pl);
        self.probs[range.clone()]
            .iter()
            .zip(&values[range])
            .map(|(p, v)| p * v)
            .sum()
    }

    /// Gain to `pl` from switching to pure strategy `s`, floored at zero.
    pub fn regret(&self, pl: usize, s: usize) -> f64 {
        (self.strategy_value(pl, s) - self.payoff(pl)).max(0.0)
    }

    /// Regret of every strategy, one list per player.
    pub fn gripe(&self) -> Vec<Vec<f64>> {
        let values = self.strategy_values();
        (0..self.game.num_players())
            .map(|pl| {
                let range = self.range(pl);
                let payoff: f64 = self.probs[range.clone()]
                    .iter()
                    .zip(&values[range.clone()])
                    .map(|(p, v)| p * v)
                    .sum();
                values[range].iter().map(|v| (v - payoff).max(0.0)).collect()
            })
            .collect()
    }

    /// Largest regret over all players and strategies.
    pub fn max_regret(&self) -> f64 {
        self.gripe()
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max)
    }

    /// Liapunov function value: zero exactly at Nash equilibria on the simplex.
    pub fn liap_value(&self) -> f64 {
        let mut value: f64 = self.gripe().iter().flatten().map(|r| r * r).sum();
        for pl in 0..self.game.num_players() {
            let player = self.player(pl);
            let sum: f64 = player.iter().sum();
            value += (sum - 1.0).powi(2);
            value += player.iter().map(|p| p.min(0.0).powi(2)).sum::<f64>();
        }
        value
    }

    /// Whether each player's entries are non-negative and sum to one.
    pub fn is_on_simplex(&self, tolerance: f64) -> bool {
        (0..self.game.num_players()).all(|pl| {
            let player = self.player(pl);
            player.iter().all(|&p| p >= -tolerance)
                && (player.iter().sum::<f64>() - 1.0).abs() <= tolerance
        })
    }

    /// Whether no player can gain more than `tolerance` by deviating.
    pub fn is_nash(&self, tolerance: f64) -> bool {
        self.is_on_simplex(tolerance) && self.max_regret() <= tolerance
    }

    /// Strategies played with probability above `tolerance`, per player.
    pub fn support(&self, tolerance: f64) -> Vec<Vec<usize>> {
        (0..self.game.num_players())
            .map(|pl| {
                self.player(pl)
                    .iter()
                    .enumerate()
                    .filter(|&(_, &p)| p > tolerance)
                    .map(|(s, _)| s)
                    .collect()
            })
            .collect()
    }

    /// Largest absolute difference between two profiles' entries.
    pub fn distance(&self, other: &MixedProfile<'_>) -> f64 {
        self.probs
            .iter()
            .zip(&other.probs)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Comma-separated probabilities with fixed precision.
    pub fn to_csv(&self, decimals: usize) -> String {
        self.probs
            .iter()
            .map(|p| format!("{:.*}", decimals, p))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for MixedProfile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lists = self.as_lists();
        write!(f, "[")?;
        for (i, list) in lists.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", list)?;
        }
        write!(f, "]")
    }
}

/// Expected payoff of each pure strategy against the flat profile `probs`.
pub(crate) fn strategy_values(game: &TableGame, probs: &[f64]) -> Vec<f64> {
    let n = game.num_players();
    let mut values = vec![0.0; game.total_strategies()];
    for cont in game.contingencies() {
        let payoffs = game.contingency_payoffs(cont.index);
        for i in 0..n {
            let mut weight = 1.0;
            for (j, &s) in cont.profile.iter().enumerate() {
                if j != i {
                    weight *= probs[game.offset(j) + s];
                }
            }
            if weight != 0.0 {
                values[game.offset(i) + cont.profile[i]] += payoffs[i] * weight;
            }
        }
    }
    values
}
