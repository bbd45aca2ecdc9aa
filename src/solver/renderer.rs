//! Output sinks for equilibria as the solver finds them.

use std::io::Write;

use crate::core::MixedProfile;
use crate::util::errors::Result;

/// Receives each equilibrium when it is found.
pub trait ProfileRenderer {
    fn render(&mut self, profile: &MixedProfile<'_>) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl ProfileRenderer for NullRenderer {
    fn render(&mut self, _profile: &MixedProfile<'_>) -> Result<()> {
        Ok(())
    }
}

/// Writes `NE,p1,p2,...` lines.
pub struct CsvRenderer<W: Write> {
    out: W,
    decimals: usize,
}

impl<W: Write> CsvRenderer<W> {
    pub fn new(out: W, decimals: usize) -> Self {
        CsvRenderer { out, decimals }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProfileRenderer for CsvRenderer<W> {
    fn render(&mut self, profile: &MixedProfile<'_>) -> Result<()> {
        writeln!(self.out, "NE,{}", profile.to_csv(self.decimals))?;
        self.out.flush()?;
        Ok(())
    }
}
