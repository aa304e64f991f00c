//! Busy flags coordinating reloads with requests.
//!
//! Each reloadable resource has one flag. A reload holds its flag through a
//! [`BusyGuard`]; requests block in [`ReloadGate::wait_idle`] until every
//! flag is clear and are woken when the last guard drops.

use parking_lot::{Condvar, Mutex};
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Contents,
    Templates,
    Views,
    Locals,
}

impl Resource {
    pub const ALL: [Self; 4] = [Self::Contents, Self::Templates, Self::Views, Self::Locals];

    const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Contents => "contents",
            Self::Templates => "templates",
            Self::Views => "views",
            Self::Locals => "locals",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
pub struct ReloadGate {
    busy: Mutex<[bool; 4]>,
    idle: Condvar,
}

impl ReloadGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `resource` busy, or `None` if a reload of it is already running.
    pub fn try_begin(self: &Arc<Self>, resource: Resource) -> Option<BusyGuard> {
        let mut busy = self.busy.lock();
        if busy[resource.index()] {
            return None;
        }
        busy[resource.index()] = true;
        Some(BusyGuard {
            gate: Arc::clone(self),
            resource,
        })
    }

    pub fn is_busy(&self, resource: Resource) -> bool {
        self.busy.lock()[resource.index()]
    }

    /// Block until no resource is busy.
    pub fn wait_idle(&self) {
        let mut busy = self.busy.lock();
        while busy.iter().any(|&flag| flag) {
            self.idle.wait(&mut busy);
        }
    }
}

/// Clears its flag on drop.
#[derive(Debug)]
pub struct BusyGuard {
    gate: Arc<ReloadGate>,
    resource: Resource,
}

impl BusyGuard {
    pub const fn resource(&self) -> Resource {
        self.resource
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut busy = self.gate.busy.lock();
        busy[self.resource.index()] = false;
        if !busy.iter().any(|&flag| flag) {
            self.gate.idle.notify_all();
        }
    }
}
