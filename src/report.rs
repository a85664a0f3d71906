//! Gas reports and their text rendering.

use crate::session::{GasBlock, GasBlockKind};
use alloc::vec::Vec;
use anstyle::{AnsiColor, Style};
use colorchoice::ColorChoice;
use std::io::{self, Write};

const BEGIN_STYLE: Style = AnsiColor::Cyan.on_default();
const GAS_STYLE: Style = AnsiColor::Yellow.on_default();
const YIELD_STYLE: Style = AnsiColor::Green.on_default();
const OPEN_STYLE: Style = AnsiColor::Red.on_default();

/// The gas blocks of one transaction, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct GasReport {
    blocks: Vec<GasBlock>,
}

impl GasReport {
    /// Wraps the given blocks.
    pub const fn new(blocks: Vec<GasBlock>) -> Self {
        Self { blocks }
    }

    /// Returns all blocks.
    pub fn blocks(&self) -> &[GasBlock] {
        &self.blocks
    }

    /// Consumes the report and returns the blocks.
    pub fn into_blocks(self) -> Vec<GasBlock> {
        self.blocks
    }

    /// Returns the number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if no block was recorded.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns an iterator over the closed blocks.
    pub fn closed(&self) -> impl Iterator<Item = &GasBlock> + '_ {
        self.blocks.iter().filter(|block| block.is_closed())
    }

    /// Returns the kinds of all blocks.
    pub fn kinds(&self) -> Vec<GasBlockKind> {
        self.blocks.iter().map(|block| block.kind).collect()
    }

    /// Returns the gas used by all closed blocks, saturating at the bounds of `i64`.
    pub fn total_used(&self) -> i64 {
        self.closed().filter_map(|block| block.used_gas).fold(0, i64::saturating_add)
    }

    /// Returns the gas used by the closed blocks of the given kind.
    pub fn used_by_kind(&self, kind: GasBlockKind) -> i64 {
        self.closed()
            .filter(|block| block.kind == kind)
            .filter_map(|block| block.used_gas)
            .fold(0, i64::saturating_add)
    }

    /// Serializes the report as a JSON array of blocks.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<alloc::string::String> {
        serde_json::to_string(self)
    }
}

impl From<Vec<GasBlock>> for GasReport {
    fn from(blocks: Vec<GasBlock>) -> Self {
        Self::new(blocks)
    }
}

impl IntoIterator for GasReport {
    type Item = GasBlock;
    type IntoIter = alloc::vec::IntoIter<GasBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.into_iter()
    }
}

/// Writes a [`GasReport`] as one checkpoint row per block.
///
/// Will never write invalid UTF-8.
#[derive(Clone, Debug)]
pub struct ReportWriter<W> {
    writer: W,
    use_colors: bool,
}

impl<W: Write> ReportWriter<W> {
    /// Create a new `ReportWriter` with the given writer.
    #[inline]
    pub fn new(writer: W) -> Self {
        Self { writer, use_colors: use_colors(ColorChoice::global()) }
    }

    /// Sets the color choice.
    #[inline]
    pub fn use_colors(mut self, color_choice: ColorChoice) -> Self {
        self.use_colors = use_colors(color_choice);
        self
    }

    /// Returns a reference to the inner writer.
    #[inline]
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Consumes the `ReportWriter` and returns the inner writer.
    #[inline]
    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Writes every block of the report, followed by the total.
    pub fn write_report(&mut self, report: &GasReport) -> io::Result<()> {
        for (index, block) in report.blocks().iter().enumerate() {
            self.write_block(index, block)?;
        }
        writeln!(self.writer, "total used: {}", report.total_used())?;
        self.writer.flush()
    }

    /// Writes a single row.
    pub fn write_block(&mut self, index: usize, block: &GasBlock) -> io::Result<()> {
        let style = self.kind_style(block.kind);
        write!(
            self.writer,
            "#{index:<3} {style}{kind:<5}{style:#} begin={begin}",
            kind = block.kind,
            begin = block.begin_gas,
        )?;

        match (block.yield_gas, block.used_gas) {
            (Some(yield_gas), Some(used_gas)) => {
                writeln!(self.writer, " yield={yield_gas} used={used_gas}")
            }
            _ => {
                let style = self.open_style();
                writeln!(self.writer, " {style}<open>{style:#}")
            }
        }
    }

    fn kind_style(&self, kind: GasBlockKind) -> Style {
        if !self.use_colors {
            return Style::default();
        }
        match kind {
            GasBlockKind::Begin => BEGIN_STYLE,
            GasBlockKind::Gas => GAS_STYLE,
            GasBlockKind::Yield => YIELD_STYLE,
        }
    }

    fn open_style(&self) -> Style {
        if !self.use_colors {
            return Style::default();
        }
        OPEN_STYLE
    }
}

fn use_colors(choice: ColorChoice) -> bool {
    use io::IsTerminal;
    match choice {
        ColorChoice::Auto => io::stdout().is_terminal(),
        ColorChoice::AlwaysAnsi | ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}
