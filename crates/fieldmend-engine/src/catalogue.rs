//! Field type catalogue
//!
//! The closed set of semantic field types the engine knows about. Each known type
//! carries its validator and the canonical field names (exemplars) the classifier
//! compares against. Adding a type means adding a variant here; every `match` on
//! [`SemanticType`] then has to decide what to do with it.

use crate::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Date,
    EntityName,
    Amount,
    Percentage,
    Multiple,
    Unknown,
}

impl SemanticType {
    /// Known types in catalogue order. Classification tie-breaks follow this order.
    pub const CATALOGUE: [SemanticType; 5] = [
        SemanticType::Date,
        SemanticType::EntityName,
        SemanticType::Amount,
        SemanticType::Percentage,
        SemanticType::Multiple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Date => "date",
            SemanticType::EntityName => "entity_name",
            SemanticType::Amount => "amount",
            SemanticType::Percentage => "percentage",
            SemanticType::Multiple => "multiple",
            SemanticType::Unknown => "unknown",
        }
    }

    /// Canonical field names for this type.
    pub fn exemplars(&self) -> &'static [&'static str] {
        match self {
            SemanticType::Date => &[
                "date",
                "transaction_date",
                "settlement_date",
                "trade_date",
                "investment_date",
                "exit_date",
                "start_date",
                "end_date",
                "period_start",
                "period_end",
                "as_of_date",
                "closing_date",
            ],
            SemanticType::EntityName => &[
                "fund",
                "fund_name",
                "investment_name",
                "portfolio_company",
                "company_name",
                "entity_name",
                "general_partner",
                "manager",
            ],
            SemanticType::Amount => &[
                "amount",
                "value",
                "price",
                "nav",
                "aum",
                "investment_amount",
                "exit_value",
                "commitment",
                "assets",
                "liabilities",
                "equity",
                "revenue",
            ],
            SemanticType::Percentage => &[
                "return",
                "irr",
                "allocation",
                "ownership",
                "percentage",
                "rate",
                "net_irr",
                "gross_irr",
            ],
            SemanticType::Multiple => &["multiple", "moic", "tvpi", "dpi"],
            SemanticType::Unknown => &[],
        }
    }

    /// Whether `value` is plausibly of this type. `Unknown` never validates.
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            SemanticType::Date => validate::is_date_like(value),
            SemanticType::EntityName => validate::is_entity_name(value),
            SemanticType::Amount => validate::parse_amount(value).is_ok(),
            SemanticType::Percentage => validate::parse_percentage(value)
                .and_then(|p| validate::within(p, 0.0, 100.0))
                .is_ok(),
            SemanticType::Multiple => validate::parse_multiple(value)
                .and_then(validate::plausible_multiple)
                .is_ok(),
            SemanticType::Unknown => false,
        }
    }

    /// Iterate `(type, exemplar)` pairs in catalogue order.
    pub fn all_exemplars() -> impl Iterator<Item = (SemanticType, &'static str)> {
        Self::CATALOGUE
            .into_iter()
            .flat_map(|ty| ty.exemplars().iter().map(move |e| (ty, *e)))
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
