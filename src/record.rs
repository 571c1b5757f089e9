//! Record Layout Registry: byte layouts of TAQ record lines.
//!
//! Each record kind maps to an ordered list of [`FieldSpec`]s whose widths
//! sum to the record line length. The last field of every layout is the
//! structural line terminator and never reaches a decoded table.
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaqError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Master,
    Quotes,
    Trades,
    Bbo,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [RecordKind::Master, RecordKind::Quotes, RecordKind::Trades, RecordKind::Bbo];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Master => "master",
            RecordKind::Quotes => "quotes",
            RecordKind::Trades => "trades",
            RecordKind::Bbo => "bbo",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    /// Accepts both the long names and the three-letter file codes.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" | "mtr" => Ok(RecordKind::Master),
            "quotes" | "qts" => Ok(RecordKind::Quotes),
            "trades" | "trd" => Ok(RecordKind::Trades),
            "bbo" | "best-bid-offer" => Ok(RecordKind::Bbo),
            other => Err(format!("unknown record kind `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    /// Fixed-width byte string, kept verbatim.
    Categorical,
    /// Fixed-width ASCII digits decoded to an unsigned integer.
    NumericText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub byte_width: usize,
    pub kind: FieldKind,
}

const fn cat(name: &'static str, byte_width: usize) -> FieldSpec {
    FieldSpec { name, byte_width, kind: FieldKind::Categorical }
}

const fn num(name: &'static str, byte_width: usize) -> FieldSpec {
    FieldSpec { name, byte_width, kind: FieldKind::NumericText }
}

static BBO_FIELDS: [FieldSpec; 28] = [
    num("Hour", 2),
    num("Minute", 2),
    num("Second", 2),
    num("Milliseconds", 3),
    cat("Exchange", 1),
    cat("Symbol_Root", 6),
    cat("Symbol_Suffix", 10),
    num("Bid_Price", 11),
    num("Bid_Size", 7),
    num("Ask_Price", 11),
    num("Ask_Size", 7),
    cat("Quote_Condition", 1),
    cat("Market_Maker", 4),
    cat("Bid_Exchange", 1),
    cat("Ask_Exchange", 1),
    num("Sequence_Number", 16),
    cat("National_BBO_Ind", 1),
    num("NASDAQ_BBO_IND", 1),
    cat("Quote_Cancel_Correction", 1),
    cat("Source_of_Quote", 1),
    cat("Retail_Interest_Ind", 1),
    cat("Short_Sale_Restriction_Ind", 1),
    cat("LULD_BBO_Ind_CQS", 1),
    cat("LULD_BBO_Ind_UTP", 1),
    cat("FINRA_ADF_MPID_Ind", 1),
    cat("SIP_Generated_Message_ID", 1),
    cat("National_BBO_LULD_Ind", 1),
    cat("Line_Change", 2),
];

static BBO_CATEGORICAL: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Exchange",
        "Symbol_Root",
        "Symbol_Suffix",
        "Quote_Condition",
        "Market_Maker",
        "Bid_Exchange",
        "Ask_Exchange",
        "National_BBO_Ind",
        "Quote_Cancel_Correction",
        "Source_of_Quote",
        "Retail_Interest_Ind",
        "Short_Sale_Restriction_Ind",
        "LULD_BBO_Ind_CQS",
        "LULD_BBO_Ind_UTP",
        "FINRA_ADF_MPID_Ind",
        "SIP_Generated_Message_ID",
        "National_BBO_LULD_Ind",
    ]
    .into_iter()
    .collect()
});

static BBO_NUMERIC: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Hour",
        "Minute",
        "Second",
        "Milliseconds",
        "Bid_Price",
        "Bid_Size",
        "Ask_Price",
        "Ask_Size",
        "Sequence_Number",
        "NASDAQ_BBO_IND",
    ]
    .into_iter()
    .collect()
});

static BBO_LAYOUT: RecordLayout = RecordLayout { kind: RecordKind::Bbo, fields: &BBO_FIELDS };

/// Ordered field layout of one record kind. The final field is structural.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordLayout {
    kind: RecordKind,
    fields: &'static [FieldSpec],
}

impl RecordLayout {
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Every field, including the trailing line terminator.
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Fields that become table columns.
    pub fn schema(&self) -> &'static [FieldSpec] {
        match self.fields.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    pub fn trailing(&self) -> Option<&'static FieldSpec> {
        self.fields.last()
    }

    /// Total bytes of one record line.
    pub fn width(&self) -> usize {
        self.fields.iter().map(|f| f.byte_width).sum()
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Layout for `kind`. Only BBO has a registered layout.
pub fn layout_for(kind: RecordKind) -> Result<&'static RecordLayout> {
    match kind {
        RecordKind::Bbo => Ok(&BBO_LAYOUT),
        RecordKind::Master | RecordKind::Quotes | RecordKind::Trades => Err(TaqError::UndefinedLayout { kind }),
    }
}

pub fn categorical_fields(kind: RecordKind) -> Result<&'static HashSet<&'static str>> {
    match kind {
        RecordKind::Bbo => Ok(&BBO_CATEGORICAL),
        _ => Err(TaqError::UndefinedLayout { kind }),
    }
}

pub fn numeric_fields(kind: RecordKind) -> Result<&'static HashSet<&'static str>> {
    match kind {
        RecordKind::Bbo => Ok(&BBO_NUMERIC),
        _ => Err(TaqError::UndefinedLayout { kind }),
    }
}
