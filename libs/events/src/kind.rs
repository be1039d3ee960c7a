//! DataONE event kinds.

use std::fmt;

/// Event types understood by the DataONE event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Create,
    Delete,
    Read,
    Replicate,
    ReplicationFailed,
    SynchronizationFailed,
    Update,
}

impl EventKind {
    /// Every known event kind.
    pub const ALL: [EventKind; 7] = [
        EventKind::Create,
        EventKind::Delete,
        EventKind::Read,
        EventKind::Replicate,
        EventKind::ReplicationFailed,
        EventKind::SynchronizationFailed,
        EventKind::Update,
    ];

    /// Label stored in the `event` column of the event log.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::Delete => "DELETE",
            EventKind::Read => "READ",
            EventKind::Replicate => "REPLICATE",
            EventKind::ReplicationFailed => "REPLICATION_FAILED",
            EventKind::SynchronizationFailed => "SYNCHRONIZATION_FAILED",
            EventKind::Update => "UPDATE",
        }
    }

    /// Name used for this kind in the routing-key configuration map.
    pub const fn config_name(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Delete => "delete",
            EventKind::Read => "read",
            EventKind::Replicate => "replicate",
            EventKind::ReplicationFailed => "replication-failed",
            EventKind::SynchronizationFailed => "synchronization-failed",
            EventKind::Update => "update",
        }
    }

    /// Look up a kind by its configuration name.
    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.config_name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_labels() {
        assert_eq!(EventKind::Read.as_str(), "READ");
        assert_eq!(EventKind::Read.config_name(), "read");
        assert_eq!(EventKind::Read.to_string(), "READ");
    }

    #[test]
    fn test_config_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_config_name(kind.config_name()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_config_name() {
        assert_eq!(EventKind::from_config_name("open"), None);
        assert_eq!(EventKind::from_config_name("READ"), None);
    }
}
