//! Engine option state owned by the player.
//!
//! Every option pushed to the engine goes through [`EngineConfiguration`], so
//! it always knows what the engine currently has. Personality switches are
//! diffed against that state: newly wanted personalities are switched on and
//! the ones no longer wanted are switched back off.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use shashin::{options_for, Personality, Range};
use tracing::{debug, info};

use crate::engine::{EngineError, EngineSession};

/// An option temporarily changed around a fallback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOverride {
    pub name: String,
    pub suspended: String,
    pub restored: String,
}

impl OptionOverride {
    pub fn new(name: &str, suspended: &str, restored: &str) -> Self {
        Self {
            name: name.to_string(),
            suspended: suspended.to_string(),
            restored: restored.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct EngineConfiguration {
    values: BTreeMap<String, String>,
    personalities: BTreeSet<Personality>,
    active_range: Option<Range>,
}

impl EngineConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Range whose personalities are currently enabled.
    pub fn active_range(&self) -> Option<Range> {
        self.active_range
    }

    pub fn personalities(&self) -> &BTreeSet<Personality> {
        &self.personalities
    }

    pub async fn set<E: EngineSession>(
        &mut self,
        engine: &mut E,
        name: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        engine.set_option(name, value, timeout).await?;
        debug!(name, value, "Engine option set");
        self.values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub async fn apply_all<E: EngineSession>(
        &mut self,
        engine: &mut E,
        options: &[(String, String)],
        timeout: Duration,
    ) -> Result<(), EngineError> {
        for (name, value) in options {
            self.set(engine, name, value, timeout).await?;
        }
        Ok(())
    }

    /// Switches needed to move to `range`: enables first, then disables.
    pub fn personality_changes(&self, range: Range) -> Vec<(Personality, bool)> {
        let wanted = options_for(range);
        let enable = wanted
            .difference(&self.personalities)
            .map(|p| (*p, true));
        let disable = self
            .personalities
            .difference(&wanted)
            .map(|p| (*p, false));
        enable.chain(disable).collect()
    }

    pub async fn apply_personality<E: EngineSession>(
        &mut self,
        engine: &mut E,
        range: Range,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let changes = self.personality_changes(range);
        for (personality, enabled) in &changes {
            let value = if *enabled { "true" } else { "false" };
            self.set(engine, personality.option_name(), value, timeout).await?;
            if *enabled {
                self.personalities.insert(*personality);
            } else {
                self.personalities.remove(personality);
            }
        }
        if !changes.is_empty() {
            let enabled: Vec<&str> = self.personalities.iter().map(|p| p.option_name()).collect();
            info!(range = %range, ?enabled, "Engine personality switched");
        }
        self.active_range = Some(range);
        Ok(())
    }

    pub async fn suspend<E: EngineSession>(
        &mut self,
        engine: &mut E,
        overrides: &[OptionOverride],
        timeout: Duration,
    ) -> Result<(), EngineError> {
        for o in overrides {
            self.set(engine, &o.name, &o.suspended, timeout).await?;
        }
        Ok(())
    }

    pub async fn restore<E: EngineSession>(
        &mut self,
        engine: &mut E,
        overrides: &[OptionOverride],
        timeout: Duration,
    ) -> Result<(), EngineError> {
        for o in overrides {
            self.set(engine, &o.name, &o.restored, timeout).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_switch_only_enables() {
        let config = EngineConfiguration::new();
        assert_eq!(
            config.personality_changes(Range::HighTal),
            vec![(Personality::HighTal, true)]
        );
    }

    #[test]
    fn test_switch_diffs_against_enabled_set() {
        let mut config = EngineConfiguration::new();
        config.personalities = options_for(Range::MiddleHighTal);
        assert_eq!(
            config.personality_changes(Range::HighTal),
            vec![(Personality::MiddleTal, false)]
        );
        assert_eq!(
            config.personality_changes(Range::Capablanca),
            vec![
                (Personality::Capablanca, true),
                (Personality::MiddleTal, false),
                (Personality::HighTal, false),
            ]
        );
        assert!(config.personality_changes(Range::MiddleHighTal).is_empty());
    }
}
