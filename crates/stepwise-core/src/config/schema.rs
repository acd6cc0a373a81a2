//! Declared shape of every recognised configuration key.

use std::fmt;

/// How the stored string of a key is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Passed through verbatim.
    Text,
    /// JSON list of strings, order preserved.
    TextList,
    /// JSON list of tool ids; order preserved, duplicates dropped.
    IdList,
    /// Base-10 integer.
    Integer,
}

impl ValueKind {
    pub fn is_list(&self) -> bool {
        matches!(self, ValueKind::TextList | ValueKind::IdList)
    }
}

/// A recognised configuration key. Keys outside this set are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Name,
    Description,
    ProjectId,
    Goal,
    Constraints,
    Tools,
    Exit,
    IterationInterval,
    Model,
    PermissionType,
    LtmDb,
    MemoryWindow,
    AgentType,
}

impl ConfigKey {
    /// Get all keys in storage order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::Name,
            ConfigKey::Description,
            ConfigKey::ProjectId,
            ConfigKey::Goal,
            ConfigKey::Constraints,
            ConfigKey::Tools,
            ConfigKey::Exit,
            ConfigKey::IterationInterval,
            ConfigKey::Model,
            ConfigKey::PermissionType,
            ConfigKey::LtmDb,
            ConfigKey::MemoryWindow,
            ConfigKey::AgentType,
        ]
    }

    /// The key as stored in configuration rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Name => "name",
            ConfigKey::Description => "description",
            ConfigKey::ProjectId => "project_id",
            ConfigKey::Goal => "goal",
            ConfigKey::Constraints => "constraints",
            ConfigKey::Tools => "tools",
            ConfigKey::Exit => "exit",
            ConfigKey::IterationInterval => "iteration_interval",
            ConfigKey::Model => "model",
            ConfigKey::PermissionType => "permission_type",
            ConfigKey::LtmDb => "LTM_DB",
            ConfigKey::MemoryWindow => "memory_window",
            ConfigKey::AgentType => "agent_type",
        }
    }

    /// Look up a stored key. Matching is exact: `LTM_DB` keeps its casing.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == key)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigKey::Goal | ConfigKey::Constraints => ValueKind::TextList,
            ConfigKey::Tools => ValueKind::IdList,
            ConfigKey::ProjectId | ConfigKey::IterationInterval | ConfigKey::MemoryWindow => {
                ValueKind::Integer
            }
            ConfigKey::Name
            | ConfigKey::Description
            | ConfigKey::Exit
            | ConfigKey::Model
            | ConfigKey::PermissionType
            | ConfigKey::LtmDb
            | ConfigKey::AgentType => ValueKind::Text,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_round_trips() {
        for key in ConfigKey::all() {
            assert_eq!(ConfigKey::from_key(key.as_str()), Some(*key));
        }
        assert_eq!(ConfigKey::all().len(), 13);
    }

    #[test]
    fn unknown_and_miscased_keys_are_not_recognised() {
        assert_eq!(ConfigKey::from_key("temperature"), None);
        assert_eq!(ConfigKey::from_key("ltm_db"), None);
    }

    #[test]
    fn list_kinds() {
        assert!(ConfigKey::Goal.kind().is_list());
        assert!(ConfigKey::Tools.kind().is_list());
        assert!(!ConfigKey::Model.kind().is_list());
        assert_eq!(ConfigKey::MemoryWindow.kind(), ValueKind::Integer);
    }
}
