use serde::Serialize;

/// A named bundle of stop-loss/take-profit percentages and
/// signal-acceptance thresholds. Exactly three tiers exist; the table is
/// static data, only ever read at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskTier {
    pub id: u8,
    pub name: &'static str,
    /// Stop-loss distance from entry, percent of price (1.0 = 1%).
    pub stop_loss_pct: f64,
    /// Take-profit distance from entry, percent of price.
    pub take_profit_pct: f64,
    /// Minimum signal strength in [0, 100] to accept.
    pub min_strength: f64,
    /// Minimum number of contributing indicator statements.
    pub min_confirmations: usize,
}

pub const CONSERVATIVE: RiskTier = RiskTier {
    id: 1,
    name: "Conservative",
    stop_loss_pct: 1.0,
    take_profit_pct: 5.0,
    min_strength: 75.0,
    min_confirmations: 2,
};

pub const MODERATE: RiskTier = RiskTier {
    id: 2,
    name: "Moderate",
    stop_loss_pct: 2.0,
    take_profit_pct: 8.0,
    min_strength: 60.0,
    min_confirmations: 2,
};

pub const AGGRESSIVE: RiskTier = RiskTier {
    id: 3,
    name: "Aggressive",
    stop_loss_pct: 3.0,
    take_profit_pct: 12.0,
    min_strength: 45.0,
    min_confirmations: 2,
};

static ALL_TIERS: [RiskTier; 3] = [CONSERVATIVE, MODERATE, AGGRESSIVE];

impl RiskTier {
    pub fn all() -> &'static [RiskTier] {
        &ALL_TIERS
    }

    /// Look a tier up by name, case-insensitively.
    pub fn by_name(name: &str) -> Option<&'static RiskTier> {
        ALL_TIERS
            .iter()
            .find(|tier| tier.name.eq_ignore_ascii_case(name.trim()))
    }
}
