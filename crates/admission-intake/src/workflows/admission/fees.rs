use serde::Serialize;

/// Derived fee fields. Never edited directly; always recomputed from the three inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub net_fee: f64,
    pub remaining_fee: f64,
}

impl FeeBreakdown {
    /// True when discount exceeds the total or payments exceed the net fee.
    pub fn is_overdrawn(&self) -> bool {
        self.net_fee < 0.0 || self.remaining_fee < 0.0
    }
}

/// Parse an edited amount. Blank, non-numeric and non-finite input counts as zero.
pub fn parse_amount(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// `net = total - discount`, `remaining = net - paid`. Negative results are kept as-is.
pub fn recompute(total_fee: &str, discount: &str, paid_fee: &str) -> FeeBreakdown {
    let net_fee = parse_amount(total_fee) - parse_amount(discount);
    let remaining_fee = net_fee - parse_amount(paid_fee);
    FeeBreakdown {
        net_fee,
        remaining_fee,
    }
}
