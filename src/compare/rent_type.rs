use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static UNIT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+units?").expect("valid regex"));
static BEDROOM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"bedrooms?").expect("valid regex"));
static DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*-\s*").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static ONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(1\b|1br|one)").expect("valid regex"));
static TWO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(2\b|2br|two)").expect("valid regex"));
static THREE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(3\b|3br|three)").expect("valid regex"));

/// Rental unit size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum UnitKind {
    #[serde(rename = "0br")]
    Bachelor,
    #[serde(rename = "1br")]
    OneBedroom,
    #[serde(rename = "2br")]
    TwoBedroom,
    #[serde(rename = "3br")]
    ThreeBedroom,
}

impl UnitKind {
    /// Largest first, the stacking order of the comparison chart.
    pub const DISPLAY_ORDER: [UnitKind; 4] = [
        UnitKind::ThreeBedroom,
        UnitKind::TwoBedroom,
        UnitKind::OneBedroom,
        UnitKind::Bachelor,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            UnitKind::Bachelor => "0br",
            UnitKind::OneBedroom => "1br",
            UnitKind::TwoBedroom => "2br",
            UnitKind::ThreeBedroom => "3br",
        }
    }

    /// Classifies a free-form unit label such as `"Two bedroom units"`.
    pub fn classify(label: &str) -> Option<Self> {
        let cleaned = normalize_unit_label(label);
        if cleaned.contains("bachelor") {
            Some(UnitKind::Bachelor)
        } else if ONE.is_match(&cleaned) {
            Some(UnitKind::OneBedroom)
        } else if TWO.is_match(&cleaned) {
            Some(UnitKind::TwoBedroom)
        } else if THREE.is_match(&cleaned) {
            Some(UnitKind::ThreeBedroom)
        } else {
            None
        }
    }
}

/// Lowercases a unit label and folds its spelling variants.
///
/// `"Two-Bedroom Units"` and `"two bedroom"` both become `"two br"`.
pub fn normalize_unit_label(label: &str) -> String {
    let lowered = label.to_lowercase();
    let cleaned = UNIT_WORD.replace_all(lowered.trim(), "");
    let cleaned = BEDROOM.replace_all(&cleaned, "br");
    let cleaned = DASH.replace_all(&cleaned, " ");
    SPACES.replace_all(&cleaned, " ").into_owned()
}
