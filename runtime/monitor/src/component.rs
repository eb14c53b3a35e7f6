//! Component identity table
//!
//! Fixed at build time: the build tool fills in names and stack bottoms,
//! and every capability a component is reachable through follows from its
//! dense id (`BASE_<KIND> + id` in the monitor's CSpace).

use crate::error::MonitorError;
use crate::{MAX_COMPONENTS, MAX_NAME_LEN};
use core::fmt;
use sel4_platform::caps::monitor;
use sel4_platform::{Badge, CPtr, Word};

/// Component name stored inline, NUL-free, at most `MAX_NAME_LEN - 1` bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ComponentName {
    bytes: [u8; MAX_NAME_LEN],
    len: usize,
}

impl ComponentName {
    pub fn new(name: &str) -> Result<Self, MonitorError> {
        // One byte is kept for the terminator the build tool writes.
        if name.is_empty() || name.len() >= MAX_NAME_LEN {
            return Err(MonitorError::InvalidName { len: name.len() });
        }
        let mut bytes = [0; MAX_NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            bytes,
            len: name.len(),
        })
    }

    pub fn as_str(&self) -> &str {
        // Built from a &str, so always valid UTF-8.
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("<invalid name>")
    }
}

impl fmt::Debug for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the monitor knows about one component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentIdentity {
    pub name: ComponentName,
    pub id: usize,
    /// Lowest address of the stack; the guard page sits right below
    pub stack_bottom: Word,
}

impl ComponentIdentity {
    pub const fn tcb_cap(&self) -> CPtr {
        monitor::BASE_PD_TCB_CAP + self.id as CPtr
    }

    pub const fn sched_context_cap(&self) -> CPtr {
        monitor::BASE_SCHED_CONTEXT_CAP + self.id as CPtr
    }

    pub const fn notification_cap(&self) -> CPtr {
        monitor::BASE_NOTIFICATION_CAP + self.id as CPtr
    }

    /// Badge the component's faults arrive with
    pub const fn badge(&self) -> Badge {
        self.id as Badge + 1
    }
}

/// Build-time description of one component
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentSpec {
    pub name: alloc::string::String,
    pub stack_bottom: Word,
}

/// Dense table of components, plus the names of virtual machines
pub struct ComponentTable {
    components: [Option<ComponentIdentity>; MAX_COMPONENTS],
    vms: [Option<ComponentName>; sel4_platform::caps::MAX_VMS],
}

impl ComponentTable {
    pub const fn new() -> Self {
        Self {
            components: [None; MAX_COMPONENTS],
            vms: [None; sel4_platform::caps::MAX_VMS],
        }
    }

    /// Register component `id`
    pub fn insert(&mut self, id: usize, name: &str, stack_bottom: Word) -> Result<(), MonitorError> {
        let slot = self
            .components
            .get_mut(id)
            .ok_or(MonitorError::TooManyComponents { id })?;
        *slot = Some(ComponentIdentity {
            name: ComponentName::new(name)?,
            id,
            stack_bottom,
        });
        Ok(())
    }

    /// Register virtual machine `id` (named at start, never faults here)
    pub fn insert_vm(&mut self, id: usize, name: &str) -> Result<(), MonitorError> {
        let slot = self
            .vms
            .get_mut(id)
            .ok_or(MonitorError::TooManyComponents { id })?;
        *slot = Some(ComponentName::new(name)?);
        Ok(())
    }

    /// Table with components numbered in order
    pub fn from_specs(specs: &[ComponentSpec]) -> Result<Self, MonitorError> {
        let mut table = Self::new();
        for (id, spec) in specs.iter().enumerate() {
            table.insert(id, &spec.name, spec.stack_bottom)?;
        }
        Ok(table)
    }

    pub fn get(&self, id: usize) -> Option<&ComponentIdentity> {
        self.components.get(id).and_then(Option::as_ref)
    }

    /// Map a fault-endpoint badge to the sender
    pub fn by_badge(&self, badge: Badge) -> Option<&ComponentIdentity> {
        let id = badge.checked_sub(1)?;
        self.get(usize::try_from(id).ok()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentIdentity> {
        self.components.iter().flatten()
    }

    /// `(tcb cap, name)` of every virtual machine
    pub fn vms(&self) -> impl Iterator<Item = (CPtr, &ComponentName)> {
        self.vms
            .iter()
            .enumerate()
            .filter_map(|(id, name)| name.as_ref().map(|n| (monitor::BASE_VM_TCB_CAP + id as CPtr, n)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ComponentTable {
    fn default() -> Self {
        Self::new()
    }
}
