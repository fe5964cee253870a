use serde::Serialize;

/// Housing cost as a share of income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AffordabilityStatus {
    VeryAffordable,
    Affordable,
    Borderline,
    Unaffordable,
    VeryUnaffordable,
}

impl AffordabilityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AffordabilityStatus::VeryAffordable => "Very Affordable",
            AffordabilityStatus::Affordable => "Affordable",
            AffordabilityStatus::Borderline => "Borderline",
            AffordabilityStatus::Unaffordable => "Unaffordable",
            AffordabilityStatus::VeryUnaffordable => "Very Unaffordable",
        }
    }
}

/// Converts a cost-to-income percentage into an [`AffordabilityStatus`].
///
/// | Range       | Status            |
/// |-------------|-------------------|
/// | < 20        | Very Affordable   |
/// | < 30        | Affordable        |
/// | < 40        | Borderline        |
/// | < 50        | Unaffordable      |
/// | >= 50       | Very Unaffordable |
pub fn status(percent: f64) -> AffordabilityStatus {
    match percent {
        p if p < 20.0 => AffordabilityStatus::VeryAffordable,
        p if p < 30.0 => AffordabilityStatus::Affordable,
        p if p < 40.0 => AffordabilityStatus::Borderline,
        p if p < 50.0 => AffordabilityStatus::Unaffordable,
        _ => AffordabilityStatus::VeryUnaffordable,
    }
}

/// Monthly cost as a percentage of monthly income.
pub fn share_of_monthly_income(monthly_cost: f64, monthly_income: f64) -> Option<f64> {
    if monthly_income <= 0.0 || !monthly_income.is_finite() {
        return None;
    }
    Some(monthly_cost / monthly_income * 100.0)
}

/// Monthly payment as a percentage of an annual income spread over 12 months.
pub fn share_of_annual_income(monthly_payment: f64, annual_income: f64) -> Option<f64> {
    share_of_monthly_income(monthly_payment, annual_income / 12.0)
}

/// A share of income together with its status band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Affordability {
    pub percent: f64,
    pub status: AffordabilityStatus,
}

impl Affordability {
    pub fn monthly(monthly_cost: f64, monthly_income: f64) -> Option<Self> {
        share_of_monthly_income(monthly_cost, monthly_income).map(|percent| Affordability {
            percent,
            status: status(percent),
        })
    }

    /// Rates a monthly payment against an annual income.
    pub fn annual(monthly_payment: f64, annual_income: f64) -> Option<Self> {
        share_of_annual_income(monthly_payment, annual_income).map(|percent| Affordability {
            percent,
            status: status(percent),
        })
    }
}
