//! Latest quote per contract.
//!
//! Streaming updates may carry only part of the chain and may repeat
//! contracts. The book keeps the most recent quote for each
//! (strike, type, expiration date) so every aggregation sees the whole
//! known chain exactly once.

use chrono::NaiveDate;
use gex_core::{OptionContract, OptionType, Strike};
use std::collections::HashMap;

type ContractKey = (Strike, OptionType, NaiveDate);

#[derive(Debug, Default)]
pub struct ChainBook {
    contracts: HashMap<ContractKey, OptionContract>,
}

impl ChainBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(contract: &OptionContract) -> ContractKey {
        (
            contract.strike,
            contract.option_type,
            contract.expiration.date_naive(),
        )
    }

    /// Insert or replace. Returns the number of new contracts.
    pub fn apply(&mut self, contracts: impl IntoIterator<Item = OptionContract>) -> usize {
        let before = self.contracts.len();
        for contract in contracts {
            self.contracts.insert(Self::key(&contract), contract);
        }
        self.contracts.len() - before
    }

    /// Drop contracts that expired before `today`. Returns how many.
    pub fn prune_expired(&mut self, today: NaiveDate) -> usize {
        let before = self.contracts.len();
        self.contracts
            .retain(|(_, _, expiration), _| *expiration >= today);
        before - self.contracts.len()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn contracts(&self) -> Vec<OptionContract> {
        self.contracts.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn contract(strike: f64, option_type: OptionType, day: u32, oi: u64) -> OptionContract {
        let expiration = Utc.with_ymd_and_hms(2026, 10, day, 20, 0, 0).unwrap();
        OptionContract::new("SPY", strike, expiration, 0.05, oi, option_type).unwrap()
    }

    #[test]
    fn test_duplicate_replaces() {
        let mut book = ChainBook::new();
        assert_eq!(book.apply([contract(500.0, OptionType::Call, 16, 1000)]), 1);
        assert_eq!(book.apply([contract(500.0, OptionType::Call, 16, 1200)]), 0);
        assert_eq!(book.len(), 1);
        assert_eq!(book.contracts()[0].open_interest, 1200);
    }

    #[test]
    fn test_partial_updates_accumulate() {
        let mut book = ChainBook::new();
        assert!(book.is_empty());
        book.apply([contract(500.0, OptionType::Call, 16, 1000)]);
        book.apply([contract(500.0, OptionType::Put, 16, 800)]);
        book.apply([contract(505.0, OptionType::Call, 23, 300)]);
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn test_prune_expired() {
        let mut book = ChainBook::new();
        book.apply([
            contract(500.0, OptionType::Call, 15, 1000),
            contract(500.0, OptionType::Call, 16, 1000),
        ]);
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(book.prune_expired(today), 1);
        assert_eq!(book.len(), 1);
        assert_eq!(book.contracts()[0].expiration.date_naive(), today);
    }
}
