//! Reading and writing games in Gambit's `.nfg` strategic-form format.
//!
//! Two layouts are accepted. The payoff layout lists strategy counts and
//! then every payoff in contingency order:
//!
//! ```text
//! NFG 1 R "Matching pennies" { "Player 1" "Player 2" } { 2 2 }
//!
//! 1 -1 -1 1 -1 1 1 -1
//! ```
//!
//! The outcome layout names the strategies, lists outcomes and then maps
//! each contingency to an outcome, where `0` means the null outcome:
//!
//! ```text
//! NFG 1 R "PD" { "Row" "Col" }
//! { { "C" "D" } { "C" "D" } }
//! ""
//! { { "" 3, 3 } { "" 5, 0 } { "" 0, 5 } { "" 1, 1 } }
//! 1 2 3 4
//! ```

pub mod lexer;

use std::fmt::Write as _;
use std::path::Path;

use crate::core::{Player, TableGame};
use crate::util::errors::{GambitError, Result};

use lexer::{parse_number, tokenize, Spanned, Token};

/// Read a game from a file.
pub fn read_file(path: &Path) -> Result<TableGame> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Parse a game from `.nfg` text.
pub fn parse(input: &str) -> Result<TableGame> {
    Parser::new(tokenize(input)?).parse_game()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    /// Line of the current token, or of the last one at end of input.
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn error(&self, message: impl Into<String>) -> GambitError {
        GambitError::parse(self.line(), message)
    }

    fn expect_word(&mut self, what: &str) -> Result<String> {
        if let Some(Token::Word(w)) = self.peek() {
            let w = w.clone();
            self.pos += 1;
            Ok(w)
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expect_str(&mut self, what: &str) -> Result<String> {
        if let Some(Token::Str(s)) = self.peek() {
            let s = s.clone();
            self.pos += 1;
            Ok(s)
        } else {
            Err(self.error(format!("expected quoted {}", what)))
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn number(&mut self) -> Result<f64> {
        let line = self.line();
        let word = self.expect_word("a number")?;
        parse_number(&word)
            .ok_or_else(|| GambitError::parse(line, format!("invalid number `{}`", word)))
    }

    fn count(&mut self) -> Result<usize> {
        let line = self.line();
        let word = self.expect_word("a count")?;
        word.parse()
            .map_err(|_| GambitError::parse(line, format!("invalid count `{}`", word)))
    }

    /// `{ "a" "b" ... }`
    fn string_list(&mut self, what: &str) -> Result<Vec<String>> {
        self.expect(Token::LBrace, "`{`")?;
        let mut items = Vec::new();
        while self.peek() != Some(&Token::RBrace) {
            items.push(self.expect_str(what)?);
        }
        self.pos += 1;
        Ok(items)
    }

    fn parse_game(mut self) -> Result<TableGame> {
        let magic = self.expect_word("`NFG`")?;
        if magic != "NFG" {
            self.pos -= 1;
            return Err(self.error("file does not start with `NFG`"));
        }
        let version = self.expect_word("a version number")?;
        if version != "1" {
            self.pos -= 1;
            return Err(self.error(format!("unsupported NFG version `{}`", version)));
        }
        let number_type = self.expect_word("`R` or `D`")?;
        if number_type != "R" && number_type != "D" {
            self.pos -= 1;
            return Err(self.error(format!("unknown number type `{}`", number_type)));
        }
        let title = self.expect_str("title")?;
        let player_labels = self.string_list("player name")?;
        if player_labels.is_empty() {
            return Err(self.error("a game needs at least one player"));
        }

        self.expect(Token::LBrace, "strategy counts or strategy lists")?;
        let outcome_layout = self.peek() == Some(&Token::LBrace);
        let players: Vec<Player> = if outcome_layout {
            let mut players = Vec::with_capacity(player_labels.len());
            for label in &player_labels {
                let strategies = self.string_list("strategy name")?;
                players.push(Player {
                    label: label.clone(),
                    strategies,
                });
            }
            self.expect(Token::RBrace, "`}` after strategy lists")?;
            players
        } else {
            let mut players = Vec::with_capacity(player_labels.len());
            for label in &player_labels {
                let count = self.count()?;
                players.push(Player {
                    label: label.clone(),
                    strategies: (1..=count).map(|s| s.to_string()).collect(),
                });
            }
            self.expect(Token::RBrace, "`}` after strategy counts")?;
            players
        };

        let comment = match self.peek() {
            Some(Token::Str(_)) => self.expect_str("comment")?,
            _ => String::new(),
        };

        let line = self.line();
        let mut game = TableGame::with_players(players)
            .map_err(|e| GambitError::parse(line, e.to_string()))?;
        game.set_title(title);
        game.set_comment(comment);

        if outcome_layout {
            self.parse_outcomes(&mut game)?;
        } else {
            self.parse_payoffs(&mut game)?;
        }

        if self.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(game)
    }

    fn parse_payoffs(&mut self, game: &mut TableGame) -> Result<()> {
        let expected = game.num_contingencies() * game.num_players();
        let mut data = Vec::with_capacity(expected);
        while self.peek().is_some() && data.len() < expected {
            data.push(self.number()?);
        }
        if data.len() != expected {
            return Err(self.error(format!(
                "expected {} payoffs, found {}",
                expected,
                data.len()
            )));
        }
        game.set_all_payoffs(&data)
    }

    fn parse_outcomes(&mut self, game: &mut TableGame) -> Result<()> {
        let players = game.num_players();
        self.expect(Token::LBrace, "outcome list")?;
        let mut outcomes: Vec<Vec<f64>> = Vec::new();
        while self.peek() == Some(&Token::LBrace) {
            self.pos += 1;
            self.expect_str("outcome label")?;
            let mut payoffs = Vec::with_capacity(players);
            while matches!(self.peek(), Some(Token::Word(_))) {
                payoffs.push(self.number()?);
            }
            if payoffs.len() != players {
                return Err(self.error(format!(
                    "outcome {} has {} payoffs for {} players",
                    outcomes.len() + 1,
                    payoffs.len(),
                    players
                )));
            }
            self.expect(Token::RBrace, "`}` after outcome")?;
            outcomes.push(payoffs);
        }
        self.expect(Token::RBrace, "`}` after outcome list")?;

        let mut data = Vec::with_capacity(game.num_contingencies() * players);
        for _ in 0..game.num_contingencies() {
            if self.peek().is_none() {
                return Err(self.error(format!(
                    "expected {} outcome indices",
                    game.num_contingencies()
                )));
            }
            let line = self.line();
            let index = self.count()?;
            match index {
                0 => data.extend(std::iter::repeat(0.0).take(players)),
                i if i <= outcomes.len() => data.extend_from_slice(&outcomes[i - 1]),
                i => {
                    return Err(GambitError::parse(
                        line,
                        format!("outcome index {} out of range", i),
                    ))
                }
            }
        }
        game.set_all_payoffs(&data)
    }
}

/// Render a game in the outcome layout, one outcome per contingency.
pub fn write(game: &TableGame) -> String {
    let mut out = String::new();
    let _ = write!(out, "NFG 1 R {} {{", quote(game.title()));
    for player in game.players() {
        let _ = write!(out, " {}", quote(&player.label));
    }
    out.push_str(" }\n\n{ ");
    for (i, player) in game.players().iter().enumerate() {
        if i > 0 {
            out.push_str("\n  ");
        }
        out.push('{');
        for strategy in &player.strategies {
            let _ = write!(out, " {}", quote(strategy));
        }
        out.push_str(" }");
    }
    out.push_str("\n}\n");
    let _ = writeln!(out, "{}", quote(game.comment()));
    out.push_str("\n{\n");
    for index in 0..game.num_contingencies() {
        let payoffs: Vec<String> = game
            .contingency_payoffs(index)
            .iter()
            .map(|p| p.to_string())
            .collect();
        let _ = writeln!(out, "{{ \"\" {} }}", payoffs.join(", "));
    }
    out.push_str("}\n");
    let indices: Vec<String> = (1..=game.num_contingencies()).map(|i| i.to_string()).collect();
    out.push_str(&indices.join(" "));
    out.push('\n');
    out
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENNIES: &str = r#"NFG 1 R "Matching pennies" { "Player 1" "Player 2" } { 2 2 }

1 -1 -1 1 -1 1 1 -1
"#;

    const PD: &str = r#"NFG 1 R "PD" { "Row" "Col" }

{ { "C" "D" }
{ "C" "D" }
}
"a comment"

{
{ "" 3, 3 }
{ "" 5, 0 }
{ "" 0, 5 }
{ "" 1, 1 }
}
1 2 3 4
"#;

    #[test]
    fn test_parse_payoff_layout() {
        let game = parse(PENNIES).unwrap();
        assert_eq!(game.title(), "Matching pennies");
        assert_eq!(game.player_label(1), "Player 2");
        assert_eq!(game.strategy_counts(), vec![2, 2]);
        assert_eq!(game.payoff(&[0, 0], 0), 1.0);
        assert_eq!(game.payoff(&[1, 0], 1), 1.0);
        assert_eq!(game.payoff(&[1, 1], 0), 1.0);
    }

    #[test]
    fn test_parse_outcome_layout() {
        let game = parse(PD).unwrap();
        assert_eq!(game.comment(), "a comment");
        assert_eq!(game.strategy_label(0, 1), "D");
        assert_eq!(game.payoff(&[1, 0], 0), 5.0);
        assert_eq!(game.payoff(&[0, 1], 1), 5.0);
        assert_eq!(game.payoff(&[1, 1], 1), 1.0);
    }

    #[test]
    fn test_null_outcome_and_rationals() {
        let text = r#"NFG 1 R "" { "A" "B" } { { "x" "y" } { "z" } } { { "" 1/2 3/4 } } 0 1"#;
        let game = parse(text).unwrap();
        assert_eq!(game.payoff(&[0, 0], 0), 0.0);
        assert_eq!(game.payoff(&[1, 0], 0), 0.5);
        assert_eq!(game.payoff(&[1, 0], 1), 0.75);
    }

    #[test]
    fn test_write_then_parse_keeps_labels() {
        let game = parse(PD).unwrap();
        let again = parse(&write(&game)).unwrap();
        assert_eq!(again, game);
    }

    #[test]
    fn test_missing_payoffs_reports_line() {
        let text = "NFG 1 R \"t\" { \"a\" \"b\" } { 2 2 }\n\n1 2 3\n";
        let err = parse(text).unwrap_err();
        match err {
            GambitError::Parse { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("expected 8 payoffs"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            parse("EFG 2 R \"t\" { }"),
            Err(GambitError::Parse { line: 1, .. })
        ));
        assert!(parse("NFG 2 R \"t\" { \"a\" } { 2 } 1 2").is_err());
    }

    #[test]
    fn test_outcome_index_out_of_range() {
        let text = "NFG 1 R \"\" { \"a\" } { { \"x\" } } { { \"\" 1 } }\n2";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, GambitError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_invalid_number() {
        let text = "NFG 1 R \"\" { \"a\" } { 2 }\n1 x";
        assert!(matches!(
            parse(text),
            Err(GambitError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_oversized_shape_is_parse_error() {
        let text = "NFG 1 R \"\" { \"a\" \"b\" \"c\" \"d\" } { 65536 65536 65536 65536 }";
        match parse(text).unwrap_err() {
            GambitError::Parse { message, .. } => assert!(message.contains("overflows")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
