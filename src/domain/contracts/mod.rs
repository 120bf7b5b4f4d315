// src/domain/contracts/mod.rs

// 🌍 Standard library
use std::cmp::Ordering;
use std::collections::HashMap;

// 📦 External crates
use once_cell::sync::Lazy;

// 🧠 Internal modules
use crate::model::{CombinedContractType, ContractType, SentimentPair};

pub const RISE_FALL: &str = "rise_fall";
pub const HIGHER_LOWER: &str = "higher_lower";

const CALL_PUT: &str = "callput";
const EURO_ATM: &str = "euro_atm";
const EURO_NON_ATM: &str = "euro_non_atm";

static DISPLAY_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([(RISE_FALL, "Rise/Fall"), (HIGHER_LOWER, "Higher/Lower")])
});

/// Normalized category of a raw contract. Call/put contracts are split by
/// barrier: at-the-money is `rise_fall`, not-at-the-money is `higher_lower`.
#[must_use]
pub fn contract_category(contract: &ContractType) -> &str {
    if contract.contract_category.contains(CALL_PUT) {
        match contract.barrier_category.as_str() {
            EURO_ATM => return RISE_FALL,
            EURO_NON_ATM => return HIGHER_LOWER,
            _ => {}
        }
    }
    &contract.contract_category
}

#[must_use]
pub fn display_name(category: &str) -> &str {
    DISPLAY_NAMES.get(category).copied().unwrap_or(category)
}

/// Reverse of [`display_name`] for the categories that have a mapped name.
#[must_use]
pub fn category_for_display(display: &str) -> Option<&'static str> {
    DISPLAY_NAMES
        .iter()
        .find(|(_, name)| **name == display)
        .map(|(category, _)| *category)
}

/// Collapses raw contract offerings into one entry per normalized category.
///
/// Entries are seeded from the first contributing record; later records only
/// add their `(contract_type, sentiment)` pair when an equal pair is not
/// already present. `rise_fall` sorts first, the rest by display name.
#[must_use]
pub fn normalize_contracts(contracts: &[ContractType]) -> Vec<CombinedContractType> {
    let mut combined: Vec<CombinedContractType> = Vec::new();
    let mut index_by_category: HashMap<String, usize> = HashMap::new();

    for contract in contracts {
        let category = contract_category(contract);
        let pair = SentimentPair::of(contract);

        match index_by_category.get(category) {
            Some(&idx) => {
                let entry = &mut combined[idx];
                if !entry.sentiments.contains(&pair) {
                    entry.sentiments.push(pair);
                }
            }
            None => {
                index_by_category.insert(category.to_string(), combined.len());
                combined.push(CombinedContractType {
                    contract_category: category.to_string(),
                    contract_category_display: display_name(category).to_string(),
                    barrier_category: contract.barrier_category.clone(),
                    sentiments: vec![pair],
                    display_name: contract.display_name.clone(),
                    default_stake: contract.default_stake,
                    min_contract_duration: contract.min_contract_duration.clone(),
                    name: contract.name.clone(),
                    title: contract.title.clone(),
                });
            }
        }
    }

    combined.retain(|entry| !entry.sentiments.is_empty());
    // Stable sort: equal display names keep first-seen order.
    combined.sort_by(|a, b| {
        let a_first = a.contract_category == RISE_FALL;
        let b_first = b.contract_category == RISE_FALL;
        b_first
            .cmp(&a_first)
            .then_with(|| collate(&a.contract_category_display, &b.contract_category_display))
    });
    combined
}

/// First raw contract whose normalized category is `category`.
#[must_use]
pub fn find_matching_contract<'a>(
    contracts: &'a [ContractType],
    category: &str,
) -> Option<&'a ContractType> {
    contracts
        .iter()
        .find(|contract| contract_category(contract) == category)
}

// Case-insensitive first; on a case-only difference lowercase sorts first.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}
