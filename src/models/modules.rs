use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{AppError, Result};

/// Optional analysis modules. `Core` is always present; the others are
/// opt-in sections of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Core,
    Vpvr,
    Imbalance,
    Breakout,
    Smc,
}

impl Module {
    pub const ALL: [Module; 5] = [
        Module::Core,
        Module::Vpvr,
        Module::Imbalance,
        Module::Breakout,
        Module::Smc,
    ];
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Module::Core => "core",
            Module::Vpvr => "vpvr",
            Module::Imbalance => "imbalance",
            Module::Breakout => "breakout",
            Module::Smc => "smc",
        };
        f.write_str(name)
    }
}

impl FromStr for Module {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "core" => Ok(Module::Core),
            "vpvr" => Ok(Module::Vpvr),
            "imbalance" => Ok(Module::Imbalance),
            "breakout" => Ok(Module::Breakout),
            "smc" => Ok(Module::Smc),
            other => Err(AppError::InvalidInput(format!("unknown module: {}", other))),
        }
    }
}

/// Closed set of requested modules. `core` is implied even when absent
/// from the request string; `all` expands to every module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSet(BTreeSet<Module>);

impl ModuleSet {
    pub fn core_only() -> Self {
        let mut set = BTreeSet::new();
        set.insert(Module::Core);
        ModuleSet(set)
    }

    pub fn all() -> Self {
        ModuleSet(Module::ALL.into_iter().collect())
    }

    /// Parse a comma-separated token list, e.g. `"core,vpvr,smc"` or `"all"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let tokens: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(Self::core_only());
        }
        if tokens.iter().any(|t| t.eq_ignore_ascii_case("all")) {
            return Ok(Self::all());
        }
        let mut set = BTreeSet::new();
        set.insert(Module::Core);
        for token in tokens {
            set.insert(token.parse()?);
        }
        Ok(ModuleSet(set))
    }

    pub fn contains(&self, module: Module) -> bool {
        self.0.contains(&module)
    }

    /// Module names in stable (enum) order, for the snapshot header.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|m| m.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_core_implied() {
        let set = ModuleSet::parse("vpvr,smc").unwrap();
        assert!(set.contains(Module::Core));
        assert!(set.contains(Module::Vpvr));
        assert!(set.contains(Module::Smc));
        assert!(!set.contains(Module::Imbalance));
    }

    #[test]
    fn test_parse_all() {
        let set = ModuleSet::parse("all").unwrap();
        for m in Module::ALL {
            assert!(set.contains(m));
        }
    }

    #[test]
    fn test_parse_empty_defaults_to_core() {
        let set = ModuleSet::parse("").unwrap();
        assert_eq!(set, ModuleSet::core_only());
    }

    #[test]
    fn test_parse_rejects_unknown_token() {
        assert!(ModuleSet::parse("core,bogus").is_err());
    }

    #[test]
    fn test_names_are_sorted_and_stable() {
        let set = ModuleSet::parse("smc,imbalance").unwrap();
        assert_eq!(set.names(), vec!["core", "imbalance", "smc"]);
    }
}
