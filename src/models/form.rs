use serde::{Deserialize, Serialize};

/// Where the register panel currently is.
///
/// `Hidden` is the idle state with the panel closed. A lookup lands on
/// `NotFound` (blank editable form, ready to create) or `FoundView`
/// (loaded row, read-only). `FoundEdit` is reached only through the
/// primary action from `FoundView`; it is the only state besides
/// `NotFound` from which a save is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Hidden,
    NotFound,
    FoundView,
    FoundEdit,
}

impl FormPhase {
    pub fn panel_open(self) -> bool {
        !matches!(self, FormPhase::Hidden)
    }

    /// Lot, qty and product inputs accept typing only while creating or
    /// editing; a freshly loaded row is view-only.
    pub fn fields_editable(self) -> bool {
        matches!(self, FormPhase::NotFound | FormPhase::FoundEdit)
    }

    pub fn primary_label(self) -> Option<&'static str> {
        match self {
            FormPhase::Hidden => None,
            FormPhase::NotFound => Some("Register"),
            FormPhase::FoundView => Some("Edit"),
            FormPhase::FoundEdit => Some("Save"),
        }
    }
}

/// The four operator inputs, echoed back on every round-trip so the page
/// always re-renders exactly what was last on screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormFields {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub lot: String,
    #[serde(default)]
    pub qty: String,
    #[serde(default)]
    pub product: String,
}

/// Status line shown above the form.
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub text: String,
    pub tone: BannerTone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerTone {
    Info,
    Error,
}

impl Banner {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: BannerTone::Info,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: BannerTone::Error,
        }
    }
}

/// A parsed quantity input. Blank and non-numeric are distinct outcomes
/// because validation reports them with different messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QtyField {
    Blank,
    Invalid,
    Whole(i64),
}

/// Normalize a scanned or typed tag id: surrounding whitespace goes,
/// leading zeros stay.
pub fn normalize_tag(raw: &str) -> &str {
    raw.trim()
}

/// Parse a quantity the way the sheet stores it: thousands separators are
/// stripped, fractional entries are truncated toward zero, and anything
/// that does not read as a finite number is invalid.
pub fn parse_qty(raw: &str) -> QtyField {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return QtyField::Blank;
    }
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => QtyField::Whole(n.trunc() as i64),
        _ => QtyField::Invalid,
    }
}
