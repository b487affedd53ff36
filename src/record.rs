//! In-memory model of a labeling run: the [`Label`] written for every row, the kind of board
//! record being labeled, and the ordered [`RecordTable`] the runner mutates in place.

use std::fmt;
use std::str::FromStr;

/// Sentiment outcome of a single post or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Label {
    Buy,
    #[default]
    Neutral,
    Sell,
}

impl Label {
    pub fn as_i8(self) -> i8 {
        match self {
            Label::Buy => 1,
            Label::Neutral => 0,
            Label::Sell => -1,
        }
    }

    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(Label::Buy),
            0 => Some(Label::Neutral),
            -1 => Some(Label::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

impl FromStr for Label {
    type Err = ();

    /// Accepts `1`, `0`, `-1` and the float spellings a spreadsheet round-trip leaves behind.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i8>() {
            return Label::from_i8(n).ok_or(());
        }
        match s.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && (-1.0..=1.0).contains(&f) => {
                Label::from_i8(f as i8).ok_or(())
            }
            _ => Err(()),
        }
    }
}

/// Which board table is being labeled. Decides the text handed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Post,
    Comment,
}

impl RecordKind {
    /// Columns the combined text is built from, in order.
    pub fn text_columns(self) -> &'static [&'static str] {
        match self {
            RecordKind::Post => &["title", "content"],
            RecordKind::Comment => &["reply_content"],
        }
    }

    pub fn input_file(self) -> &'static str {
        match self {
            RecordKind::Post => "contents.csv",
            RecordKind::Comment => "reply.csv",
        }
    }

    pub fn output_file(self) -> &'static str {
        match self {
            RecordKind::Post => "contents_labeled.csv",
            RecordKind::Comment => "reply_labeled.csv",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RecordKind::Post => "posts",
            RecordKind::Comment => "comments",
        }
    }
}

/// One row of a board table.
///
/// `fields` is aligned with [`RecordTable::headers`]; the label lives outside it so the
/// label column always serialises last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelableRecord {
    pub fields: Vec<String>,
    pub label: Label,
}

impl LabelableRecord {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            label: Label::default(),
        }
    }
}

/// Ordered rows of one board table. Row order is processing order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordTable {
    headers: Vec<String>,
    rows: Vec<LabelableRecord>,
}

impl RecordTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[LabelableRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, record: LabelableRecord) {
        self.rows.push(record);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of `column` in row `idx`, empty when the row is short.
    pub fn field(&self, idx: usize, column: usize) -> &str {
        self.rows[idx]
            .fields
            .get(column)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_label(&mut self, idx: usize, label: Label) {
        self.rows[idx].label = label;
    }

    pub fn label(&self, idx: usize) -> Label {
        self.rows[idx].label
    }

    /// Copy of the first `len` rows (all of them when `len` is past the end).
    pub fn prefix(&self, len: usize) -> RecordTable {
        RecordTable {
            headers: self.headers.clone(),
            rows: self.rows[..len.min(self.rows.len())].to_vec(),
        }
    }

    /// Keeps `self` as the prefix and appends the rows of `fresh` that lie beyond it.
    /// Rows are matched by position only.
    pub fn resume_with(mut self, fresh: RecordTable) -> RecordTable {
        let start = self.rows.len();
        self.rows.extend(fresh.rows.into_iter().skip(start));
        self
    }

    /// Text handed to the classifier for row `idx`.
    pub fn combined_text(&self, idx: usize, kind: RecordKind) -> String {
        match kind {
            RecordKind::Post => {
                let title = self.named_field(idx, "title");
                let content = self.named_field(idx, "content");
                format!("Title: {title}\nContent: {content}")
            }
            RecordKind::Comment => self.named_field(idx, "reply_content").to_string(),
        }
    }

    fn named_field(&self, idx: usize, name: &str) -> &str {
        self.column_index(name)
            .map(|c| self.field(idx, c))
            .unwrap_or("")
    }
}
