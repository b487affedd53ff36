use std::fmt;

use crate::record::{Label, RecordTable};

/// Label distribution of a finished table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelSummary {
    pub buy: usize,
    pub neutral: usize,
    pub sell: usize,
}

impl LabelSummary {
    pub fn from_table(table: &RecordTable) -> Self {
        table
            .rows()
            .iter()
            .fold(LabelSummary::default(), |mut acc, record| {
                match record.label {
                    Label::Buy => acc.buy += 1,
                    Label::Neutral => acc.neutral += 1,
                    Label::Sell => acc.sell += 1,
                }
                acc
            })
    }

    pub fn total(&self) -> usize {
        self.buy + self.neutral + self.sell
    }
}

impl fmt::Display for LabelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total rows:  {}", self.total())?;
        writeln!(f, "Buy (1):     {}", self.buy)?;
        writeln!(f, "Neutral (0): {}", self.neutral)?;
        write!(f, "Sell (-1):   {}", self.sell)
    }
}
