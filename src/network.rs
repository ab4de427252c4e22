//! Network link collaborator
//!
//! Reports whether the IP uplink is usable. The bridge only logs link changes;
//! bringing the interface back is left to the host's network manager.

use crate::config::NetworkSection;
use std::path::{Path, PathBuf};

const SYSFS_NET_ROOT: &str = "/sys/class/net";

/// Connectivity of the uplink to the broker network
pub trait NetworkLink: Send {
    fn is_up(&self) -> bool;
}

impl<T: NetworkLink + ?Sized> NetworkLink for Box<T> {
    fn is_up(&self) -> bool {
        (**self).is_up()
    }
}

/// Link used when no interface is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUp;

impl NetworkLink for AlwaysUp {
    fn is_up(&self) -> bool {
        true
    }
}

/// Link state of a named interface, read from sysfs
#[derive(Debug, Clone)]
pub struct InterfaceLink {
    name: String,
    operstate_path: PathBuf,
}

impl InterfaceLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_sysfs_root(name, Path::new(SYSFS_NET_ROOT))
    }

    /// Read interface state below a custom root instead of `/sys/class/net`
    pub fn with_sysfs_root(name: impl Into<String>, root: &Path) -> Self {
        let name = name.into();
        let operstate_path = root.join(&name).join("operstate");
        Self {
            name,
            operstate_path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl NetworkLink for InterfaceLink {
    fn is_up(&self) -> bool {
        std::fs::read_to_string(&self.operstate_path)
            .map(|state| operstate_is_up(&state))
            .unwrap_or(false)
    }
}

/// `unknown` is what many virtual and wireless drivers report while passing traffic
fn operstate_is_up(state: &str) -> bool {
    matches!(state.trim(), "up" | "unknown")
}

/// Build the network link described by the configuration
pub fn link_from_config(config: &NetworkSection) -> Box<dyn NetworkLink> {
    match &config.interface {
        Some(name) => Box::new(InterfaceLink::new(name.clone())),
        None => Box::new(AlwaysUp),
    }
}
