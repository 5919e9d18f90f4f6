//! Name-keyed strategy lookup.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::bollinger::BollingerStrategy;
use super::ma_crossover::MaCrossover;
use super::macd::MacdStrategy;
use super::mean_reversion::MeanReversion;
use super::momentum::Momentum;
use super::pairs_trading::PairsTrading;
use super::rsi::RsiStrategy;
use super::{Category, ParamDef, Strategy};
use crate::domain::error::StratsimError;

/// Listing entry for one registered strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub requires_pair: bool,
    pub parameters: Vec<ParamDef>,
}

impl StrategyInfo {
    fn of(strategy: &dyn Strategy) -> Self {
        StrategyInfo {
            name: strategy.name(),
            display_name: strategy.display_name(),
            description: strategy.description(),
            category: strategy.category(),
            requires_pair: strategy.requires_pair(),
            parameters: strategy.parameters(),
        }
    }
}

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<&'static str, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in strategy.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MaCrossover));
        registry.register(Arc::new(RsiStrategy));
        registry.register(Arc::new(MacdStrategy));
        registry.register(Arc::new(BollingerStrategy));
        registry.register(Arc::new(MeanReversion));
        registry.register(Arc::new(Momentum));
        registry.register(Arc::new(PairsTrading));
        registry
    }

    /// Register a strategy under its own name, replacing any previous entry.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.name(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>, StratsimError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| StratsimError::UnknownStrategy {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }

    pub fn describe_all(&self) -> Vec<StrategyInfo> {
        self.strategies
            .values()
            .map(|s| StrategyInfo::of(s.as_ref()))
            .collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}
