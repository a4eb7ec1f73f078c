//! Controller discovery.
//!
//! Discovery itself is a network concern outside this crate; a [`ControllerScanner`]
//! only has to produce [`ControllerInfo`] records. Sessions are opened against the
//! [`ControllerHandle`] a record yields.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::controller::transport::ControllerHandle;
use crate::error::AppResult;

/// Whether a discovered controller accepts connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    /// Ready for logon.
    Available,
    /// Reachable, but another client blocks access.
    Unavailable,
}

/// One discovered controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerInfo {
    /// Controller name.
    pub name: String,
    /// Controller system id.
    pub system_id: Uuid,
    /// Availability state.
    pub availability: Availability,
    /// Robot-ware version string.
    pub version: String,
    /// Network address.
    pub address: String,
    /// Virtual (simulated) controller rather than physical hardware.
    pub is_virtual: bool,
}

impl ControllerInfo {
    /// Handle used to open a session with this controller.
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            system_id: self.system_id,
            address: self.address.clone(),
            name: self.name.clone(),
        }
    }
}

/// Source of discovered controllers.
#[async_trait]
pub trait ControllerScanner: Send + Sync {
    /// Scans the network and returns every controller found.
    async fn scan(&self) -> AppResult<Vec<ControllerInfo>>;
}

/// Scanner that returns a fixed list, e.g. from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticScanner {
    controllers: Vec<ControllerInfo>,
}

impl StaticScanner {
    /// Scanner reporting `controllers`.
    pub fn new(controllers: Vec<ControllerInfo>) -> Self {
        Self { controllers }
    }
}

#[async_trait]
impl ControllerScanner for StaticScanner {
    async fn scan(&self) -> AppResult<Vec<ControllerInfo>> {
        Ok(self.controllers.clone())
    }
}

/// Splits scan results into `(real, virtual)` controllers, preserving order.
pub fn partition_by_kind(found: Vec<ControllerInfo>) -> (Vec<ControllerInfo>, Vec<ControllerInfo>) {
    found.into_iter().partition(|c| !c.is_virtual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, is_virtual: bool) -> ControllerInfo {
        ControllerInfo {
            name: name.into(),
            system_id: Uuid::new_v4(),
            availability: Availability::Available,
            version: "6.15".into(),
            address: "127.0.0.1".into(),
            is_virtual,
        }
    }

    #[tokio::test]
    async fn scan_results_split_by_kind() {
        let scanner = StaticScanner::new(vec![
            info("cell-a", false),
            info("sim-1", true),
            info("cell-b", false),
        ]);
        let (real, virt) = partition_by_kind(scanner.scan().await.expect("scan"));
        let real: Vec<_> = real.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(real, vec!["cell-a", "cell-b"]);
        assert_eq!(virt.len(), 1);
        assert_eq!(virt[0].handle().name, "sim-1");
    }
}
