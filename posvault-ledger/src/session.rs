use posvault_types::Identity;
use std::sync::RwLock;
use tracing::info;

use crate::CallerIdentity;

/// Connected-wallet state.
#[derive(Default)]
pub struct WalletSession {
    connected: RwLock<Option<Identity>>,
}

impl WalletSession {
    pub fn new(initial: Option<Identity>) -> Self {
        Self { connected: RwLock::new(initial) }
    }

    pub fn connect(&self, who: Identity) {
        info!("Wallet connected: {}", who);
        *self.connected.write().unwrap_or_else(|p| p.into_inner()) = Some(who);
    }

    pub fn disconnect(&self) {
        info!("Wallet disconnected");
        *self.connected.write().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

impl CallerIdentity for WalletSession {
    fn current(&self) -> Option<Identity> {
        *self.connected.read().unwrap_or_else(|p| p.into_inner())
    }
}
