//! Untyped reconciliation
//!
//! The build tool lays out every kernel object at a fixed physical address,
//! assuming the kernel hands out untyped memory in one particular order.
//! Before any invocation runs, the kernel's boot-time report is checked
//! against that assumption region by region.

use crate::error::{BootMismatch, UntypedField};
use alloc::vec::Vec;
use sel4_platform::{CPtr, Word};

/// CSlot region [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotRegion {
    pub start: CPtr,
    pub end: CPtr,
}

impl SlotRegion {
    pub const fn new(start: CPtr, end: CPtr) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// One untyped memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UntypedRegion {
    /// Physical address
    pub paddr: Word,

    /// Size as power of 2 (size = 1 << size_bits)
    pub size_bits: u8,

    /// Is this a device untyped?
    pub is_device: bool,
}

impl UntypedRegion {
    pub const fn new(paddr: Word, size_bits: u8, is_device: bool) -> Self {
        Self {
            paddr,
            size_bits,
            is_device,
        }
    }

    /// First field that differs from `other`, as `(field, ours, theirs)`
    fn first_difference(&self, other: &Self) -> Option<(UntypedField, Word, Word)> {
        if self.paddr != other.paddr {
            Some((UntypedField::Paddr, self.paddr, other.paddr))
        } else if self.size_bits != other.size_bits {
            Some((
                UntypedField::SizeBits,
                self.size_bits as Word,
                other.size_bits as Word,
            ))
        } else if self.is_device != other.is_device {
            Some((
                UntypedField::IsDevice,
                self.is_device as Word,
                other.is_device as Word,
            ))
        } else {
            None
        }
    }
}

/// Untyped layout the build tool assumed, embedded in the image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UntypedInfo {
    /// Slots the kernel was expected to place the untypeds in
    pub slots: SlotRegion,
    pub regions: Vec<UntypedRegion>,
}

/// Untyped memory as the kernel reported it in boot info
#[derive(Debug, Clone, Copy)]
pub struct BootInfoUntypeds<'a> {
    pub slots: SlotRegion,
    pub regions: &'a [UntypedRegion],
}

impl<'a> BootInfoUntypeds<'a> {
    pub const fn new(slots: SlotRegion, regions: &'a [UntypedRegion]) -> Self {
        Self { slots, regions }
    }
}

/// Check the kernel's untyped report against the expected layout.
///
/// Succeeds silently iff both lists are element-wise identical; otherwise
/// the first mismatch is returned.
pub fn reconcile(kernel: &BootInfoUntypeds<'_>, expected: &UntypedInfo) -> Result<(), BootMismatch> {
    if kernel.slots.len() != expected.slots.len() {
        return Err(BootMismatch::SlotRange {
            expected: expected.slots.len(),
            actual: kernel.slots.len(),
        });
    }
    if kernel.regions.len() != expected.regions.len() {
        return Err(BootMismatch::Count {
            expected: expected.regions.len(),
            actual: kernel.regions.len(),
        });
    }

    for (index, (want, have)) in expected.regions.iter().zip(kernel.regions).enumerate() {
        if let Some((field, expected, actual)) = want.first_difference(have) {
            return Err(BootMismatch::Region {
                index,
                field,
                expected,
                actual,
            });
        }
    }

    log::debug!("untyped layout verified ({} regions)", expected.regions.len());
    Ok(())
}
