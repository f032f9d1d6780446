//! Store mode and connection reporting types.

use serde::Serialize;

/// Reason reported when no backend is configured.
pub const BACKEND_NOT_CONFIGURED: &str = "backend not configured";

/// Lifecycle of one store instance.
///
/// `Uninitialized -> Probing -> {Backend, Fallback}`; the last two are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Uninitialized,
    Probing,
    Backend,
    Fallback,
}

impl StoreState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Probing => 1,
            Self::Backend => 2,
            Self::Fallback => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Probing,
            2 => Self::Backend,
            3 => Self::Fallback,
            _ => Self::Uninitialized,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Backend | Self::Fallback)
    }
}

/// Storage label reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Database,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Memory => "memory",
        }
    }
}

/// Result of the one-shot startup probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn connected() -> Self {
        Self {
            connected: true,
            error: None,
        }
    }

    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            connected: false,
            error: Some(reason.into()),
        }
    }
}

/// Health snapshot for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    pub state: StoreState,
    pub storage: StorageKind,
    /// Configured backend table, if any.
    pub backend: Option<&'static str>,
    pub connection: ConnectionStatus,
}

