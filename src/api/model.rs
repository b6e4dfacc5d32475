use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq)]
pub(super) struct CacheStatus {
    pub enabled: bool,
    pub entries: usize,
}

#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq)]
pub(super) struct CacheCleared {
    pub evicted: usize,
}

#[derive(Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub(super) struct CloseSessionParams {
    pub reason: Option<String>,
}
