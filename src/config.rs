//! Provider configuration.
//!
//! Options are plain `Copy` data handed to
//! [`ServiceCollection::build_with_options`](crate::ServiceCollection::build_with_options).
//! They can also be loaded from the environment or, with the `config` feature,
//! from JSON.

use std::env;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

const ENV_MODE: &str = "FERROUS_RESOLVE_MODE";
const ENV_VALIDATE_SCOPES: &str = "FERROUS_RESOLVE_VALIDATE_SCOPES";
const ENV_VALIDATE_ON_BUILD: &str = "FERROUS_RESOLVE_VALIDATE_ON_BUILD";
const ENV_PROMOTION_THRESHOLD: &str = "FERROUS_RESOLVE_PROMOTION_THRESHOLD";

/// How a service's accessor chooses its execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum ResolverMode {
    /// Always walk the call-site graph
    Interpreted,
    /// Build the fast path when the accessor is created
    Compiled,
    /// Start interpreted, promote after repeated use
    #[default]
    Adaptive,
}

impl FromStr for ResolverMode {
    type Err = DiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "interpreted" => Ok(ResolverMode::Interpreted),
            "compiled" => Ok(ResolverMode::Compiled),
            "adaptive" | "mixed" => Ok(ResolverMode::Adaptive),
            other => Err(DiError::Config(format!("unknown resolver mode '{}'", other))),
        }
    }
}

/// When and where adaptive promotion happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct PromotionPolicy {
    /// Interpreted calls observed before the fast path is built
    pub threshold: u32,
    /// Build on a background thread instead of the calling thread
    pub background: bool,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            threshold: 2,
            background: true,
        }
    }
}

/// Provider-wide options.
///
/// # Examples
///
/// ```
/// use ferrous_resolve::{ProviderOptions, ResolverMode};
///
/// let options = ProviderOptions::default()
///     .with_validate_scopes(true)
///     .with_mode(ResolverMode::Compiled);
///
/// assert!(options.validate_scopes);
/// assert_eq!(options.promotion.threshold, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ProviderOptions {
    /// Reject scope leaks and singletons capturing scoped services
    pub validate_scopes: bool,
    /// Build and validate every registered service when the provider is built
    pub validate_on_build: bool,
    pub mode: ResolverMode,
    pub promotion: PromotionPolicy,
    /// Prefer the flattened specialized resolver over compiled closures
    pub specialize: bool,
    /// Largest program, in instructions, the specialized resolver accepts
    pub specialize_threshold: usize,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            validate_scopes: false,
            validate_on_build: false,
            mode: ResolverMode::Adaptive,
            promotion: PromotionPolicy::default(),
            specialize: true,
            specialize_threshold: 64,
        }
    }
}

impl ProviderOptions {
    pub fn with_validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn with_validate_on_build(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }

    pub fn with_mode(mut self, mode: ResolverMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_promotion(mut self, promotion: PromotionPolicy) -> Self {
        self.promotion = promotion;
        self
    }

    pub fn with_specialization(mut self, enabled: bool, threshold: usize) -> Self {
        self.specialize = enabled;
        self.specialize_threshold = threshold;
        self
    }

    /// Defaults overridden by `FERROUS_RESOLVE_*` environment variables.
    pub fn from_env() -> DiResult<Self> {
        let mut options = Self::default();

        if let Some(mode) = read_env(ENV_MODE) {
            options.mode = mode.parse()?;
        }
        if let Some(value) = read_env(ENV_VALIDATE_SCOPES) {
            options.validate_scopes = parse_flag(ENV_VALIDATE_SCOPES, &value)?;
        }
        if let Some(value) = read_env(ENV_VALIDATE_ON_BUILD) {
            options.validate_on_build = parse_flag(ENV_VALIDATE_ON_BUILD, &value)?;
        }
        if let Some(value) = read_env(ENV_PROMOTION_THRESHOLD) {
            options.promotion.threshold = value
                .trim()
                .parse()
                .map_err(|e| DiError::Config(format!("{}: {}", ENV_PROMOTION_THRESHOLD, e)))?;
        }

        Ok(options)
    }

    /// Parse options from JSON; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Config(e.to_string()))
    }
}

fn read_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_flag(name: &str, value: &str) -> DiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DiError::Config(format!("{}: expected a boolean, got '{}'", name, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_adaptive_without_validation() {
        let options = ProviderOptions::default();
        assert_eq!(options.mode, ResolverMode::Adaptive);
        assert!(!options.validate_scopes);
        assert!(!options.validate_on_build);
        assert!(options.promotion.background);
        assert_eq!(options.specialize_threshold, 64);
    }

    #[test]
    fn parses_modes_case_insensitively() {
        assert_eq!("Compiled".parse::<ResolverMode>().unwrap(), ResolverMode::Compiled);
        assert_eq!(" mixed ".parse::<ResolverMode>().unwrap(), ResolverMode::Adaptive);
        assert!(matches!("jit".parse::<ResolverMode>(), Err(DiError::Config(_))));
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("X", "On").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(parse_flag("X", "maybe").is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let options = ProviderOptions::from_json(r#"{"validate_scopes": true, "mode": "interpreted"}"#).unwrap();
        assert!(options.validate_scopes);
        assert_eq!(options.mode, ResolverMode::Interpreted);
        assert_eq!(options.promotion, PromotionPolicy::default());
    }
}
