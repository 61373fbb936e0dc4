//! Lock-screen unlock handler registry.
//!
//! Callers may register technology lists for which the controller should
//! keep polling while the device is locked (an NFC unlock token, for
//! example). The registry aggregates the registered lists into one poll
//! mask that feeds the lock-screen branch of the discovery policy.

use nearfield_core::TechMask;
use std::collections::HashMap;
use uuid::Uuid;

/// Opaque id for an unlock-handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnlockHandlerId(Uuid);

impl UnlockHandlerId {
    fn generate() -> Self {
        UnlockHandlerId(Uuid::new_v4())
    }
}

impl std::fmt::Display for UnlockHandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registered unlock handlers and their aggregated poll mask.
#[derive(Debug, Default)]
pub(crate) struct UnlockHandlerRegistry {
    handlers: HashMap<UnlockHandlerId, TechMask>,
}

impl UnlockHandlerRegistry {
    /// Register a handler polling the given technologies.
    pub(crate) fn register(&mut self, techs: TechMask) -> UnlockHandlerId {
        let id = UnlockHandlerId::generate();
        self.handlers.insert(id, techs);
        id
    }

    /// Remove a registration. Returns whether it existed.
    pub(crate) fn unregister(&mut self, id: UnlockHandlerId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Union of every registered technology list.
    pub(crate) fn poll_mask(&self) -> TechMask {
        self.handlers
            .values()
            .copied()
            .fold(TechMask::NONE, TechMask::union)
    }
}
