//! Strategic-form (table) games.
//!
//! Payoffs are stored one contingency after another, with one value per
//! player in each contingency. Contingencies are ordered with player 1's
//! strategy varying fastest, the same order Gambit's `.nfg` files and the
//! C API use.

use crate::util::errors::{GambitError, Result};

/// A player: label plus strategy labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub label: String,
    pub strategies: Vec<String>,
}

impl Player {
    fn numbered(index: usize, count: usize) -> Self {
        Player {
            label: (index + 1).to_string(),
            strategies: (1..=count).map(|s| s.to_string()).collect(),
        }
    }

    pub fn num_strategies(&self) -> usize {
        self.strategies.len()
    }
}

/// An N-player game in strategic form with `f64` payoffs.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGame {
    title: String,
    comment: String,
    players: Vec<Player>,
    /// Offset of each player's first strategy in a flat strategy vector.
    offsets: Vec<usize>,
    /// Stride of each player's strategy index in the contingency index.
    strides: Vec<usize>,
    num_contingencies: usize,
    payoffs: Vec<f64>,
}

impl TableGame {
    /// Create a game with all payoffs zero.
    pub fn new(strategy_counts: &[usize]) -> Result<Self> {
        let players = strategy_counts
            .iter()
            .enumerate()
            .map(|(pl, &count)| Player::numbered(pl, count))
            .collect();
        Self::with_players(players)
    }

    /// Create a game with the given players and all payoffs zero.
    pub fn with_players(players: Vec<Player>) -> Result<Self> {
        if players.is_empty() {
            return Err(GambitError::NoPlayers);
        }
        if let Some(pl) = players.iter().position(|p| p.strategies.is_empty()) {
            return Err(GambitError::EmptyStrategySet { player: pl + 1 });
        }

        let mut offsets = Vec::with_capacity(players.len());
        let mut strides = Vec::with_capacity(players.len());
        let mut offset = 0;
        let mut stride: usize = 1;
        for player in &players {
            offsets.push(offset);
            strides.push(stride);
            offset += player.num_strategies();
            stride = stride
                .checked_mul(player.num_strategies())
                .ok_or(GambitError::GameTooLarge)?;
        }
        let table_len = stride
            .checked_mul(players.len())
            .filter(|&len| len <= isize::MAX as usize / std::mem::size_of::<f64>())
            .ok_or(GambitError::GameTooLarge)?;

        Ok(TableGame {
            title: String::new(),
            comment: String::new(),
            payoffs: vec![0.0; table_len],
            num_contingencies: stride,
            players,
            offsets,
            strides,
        })
    }

    /// Create a game from a flat payoff list in contingency order.
    pub fn from_payoffs(strategy_counts: &[usize], data: &[f64]) -> Result<Self> {
        let mut game = Self::new(strategy_counts)?;
        game.set_all_payoffs(data)?;
        Ok(game)
    }

    /// Replace every payoff. `data` is in contingency order, one value per player.
    pub fn set_all_payoffs(&mut self, data: &[f64]) -> Result<()> {
        if data.len() != self.payoffs.len() {
            return Err(GambitError::PayoffLength {
                expected: self.payoffs.len(),
                actual: data.len(),
            });
        }
        self.payoffs.copy_from_slice(data);
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    /// Number of strategies of player `pl` (0-based).
    pub fn num_strategies(&self, pl: usize) -> usize {
        self.players[pl].num_strategies()
    }

    pub fn strategy_counts(&self) -> Vec<usize> {
        self.players.iter().map(Player::num_strategies).collect()
    }

    /// Total number of strategies over all players.
    pub fn total_strategies(&self) -> usize {
        self.players.iter().map(Player::num_strategies).sum()
    }

    /// Offset of player `pl`'s first strategy in a flat strategy vector.
    pub fn offset(&self, pl: usize) -> usize {
        self.offsets[pl]
    }

    pub fn num_contingencies(&self) -> usize {
        self.num_contingencies
    }

    pub fn player_label(&self, pl: usize) -> &str {
        &self.players[pl].label
    }

    pub fn strategy_label(&self, pl: usize, s: usize) -> &str {
        &self.players[pl].strategies[s]
    }

    /// Index of a pure strategy profile in the payoff table.
    pub fn contingency_index(&self, profile: &[usize]) -> usize {
        debug_assert_eq!(profile.len(), self.num_players());
        profile
            .iter()
            .zip(&self.strides)
            .map(|(s, stride)| s * stride)
            .sum()
    }

    /// Payoff to `player` at the pure strategy profile `profile`.
    pub fn payoff(&self, profile: &[usize], player: usize) -> f64 {
        self.payoffs[self.contingency_index(profile) * self.num_players() + player]
    }

    pub fn set_payoff(&mut self, profile: &[usize], player: usize, value: f64) {
        let index = self.contingency_index(profile) * self.num_players() + player;
        self.payoffs[index] = value;
    }

    /// Payoffs of every player at contingency `index`.
    pub fn contingency_payoffs(&self, index: usize) -> &[f64] {
        let n = self.num_players();
        &self.payoffs[index * n..(index + 1) * n]
    }

    /// The flat payoff table in contingency order.
    pub fn payoff_data(&self) -> &[f64] {
        &self.payoffs
    }

    /// Iterate over every pure strategy profile in table order.
    pub fn contingencies(&self) -> Contingencies<'_> {
        Contingencies {
            game: self,
            current: vec![0; self.num_players()],
            index: 0,
        }
    }

    pub fn min_payoff(&self) -> f64 {
        self.payoffs.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_payoff(&self) -> f64 {
        self.payoffs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// A copy of the game with payoffs affinely rescaled into [0, 1].
    ///
    /// Returns `None` if every payoff is the same.
    pub fn normalized(&self) -> Option<TableGame> {
        let (min, max) = (self.min_payoff(), self.max_payoff());
        if !(max > min) {
            return None;
        }
        let scale = 1.0 / (max - min);
        let mut game = self.clone();
        for value in &mut game.payoffs {
            *value = (*value - min) * scale;
        }
        Some(game)
    }
}

/// Iterator over pure strategy profiles, player 1 varying fastest.
pub struct Contingencies<'a> {
    game: &'a TableGame,
    current: Vec<usize>,
    index: usize,
}

/// One cell of the payoff table.
#[derive(Debug, Clone, PartialEq)]
pub struct Contingency {
    pub index: usize,
    pub profile: Vec<usize>,
}

impl Iterator for Contingencies<'_> {
    type Item = Contingency;

    fn next(&mut self) -> Option<Contingency> {
        if self.index >= self.game.num_contingencies {
            return None;
        }
        let item = Contingency {
            index: self.index,
            profile: self.current.clone(),
        };
        self.index += 1;
        for (pl, s) in self.current.iter_mut().enumerate() {
            *s += 1;
            if *s < self.game.num_strategies(pl) {
                break;
            }
            *s = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.game.num_contingencies - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Contingencies<'_> {}
