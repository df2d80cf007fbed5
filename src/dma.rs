// src/dma.rs
//! Pinned DMA memory regions and the per-command staging buffer.
//!
//! The device addresses memory physically, so every region handed to a
//! queue must already be mapped, pinned and physically contiguous. A
//! [`DmaRegion`] records the virtual and physical view of one such
//! mapping; a [`StagingRegion`] partitions the queue's read/write bounce
//! buffer into per-command strides.

use core::ptr::NonNull;

pub use x86_64::PhysAddr;

use crate::errors::DmaError;

/// A contiguous, pinned, physically addressed memory region.
///
/// The region is a raw view; it does not own or unmap the memory. The
/// code that performs device bring-up keeps the backing physical pages
/// alive for the queue's whole lifetime.
#[derive(Debug)]
pub struct DmaRegion {
    base: NonNull<u8>,
    paddr: PhysAddr,
    len: usize,
}

impl DmaRegion {
    /// Wrap an existing mapping.
    ///
    /// # Safety
    ///
    /// - `base..base + len` must be a valid, exclusively owned mapping for
    ///   the lifetime of the region
    /// - the memory must be pinned and physically contiguous, starting at
    ///   `paddr`
    ///
    /// # Errors
    ///
    /// - [`DmaError::NullRegion`] if `base` is null
    /// - [`DmaError::EmptyRegion`] if `len` is zero
    pub unsafe fn from_raw_parts(
        base: *mut u8,
        paddr: PhysAddr,
        len: usize,
    ) -> core::result::Result<Self, DmaError> {
        let Some(base) = NonNull::new(base) else {
            return Err(DmaError::NullRegion);
        };
        if len == 0 {
            return Err(DmaError::EmptyRegion);
        }
        Ok(Self { base, paddr, len })
    }

    /// Length of the region in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// A region is never empty by construction.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Physical base address, as the device sees it.
    #[must_use]
    pub const fn paddr(&self) -> PhysAddr {
        self.paddr
    }

    /// Virtual base pointer.
    #[must_use]
    pub const fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }
}

// SAFETY: the region is an exclusive view of pinned memory; the pointer
// itself carries no thread affinity.
unsafe impl Send for DmaRegion {}
// SAFETY: shared access is coordinated by the queue lock and the slot
// `used` flags, not by this type.
unsafe impl Sync for DmaRegion {}

/// The queue's read/write bounce buffer, partitioned per command.
///
/// The region is split into `depth` equal strides; stride `i` belongs to
/// command identifier `i` for as long as that identifier's slot is in
/// use. Strides never overlap, so staged data for distinct in-flight
/// commands cannot alias.
#[derive(Debug)]
pub struct StagingRegion {
    region: DmaRegion,
    stride: usize,
}

impl StagingRegion {
    /// Partition `region` across `depth` command identifiers.
    ///
    /// # Errors
    ///
    /// [`DmaError::RegionTooSmall`] if the region cannot give every
    /// identifier at least one byte.
    pub fn new(region: DmaRegion, depth: u16) -> core::result::Result<Self, DmaError> {
        if depth == 0 {
            return Err(DmaError::EmptyRegion);
        }
        let stride = region.len() / depth as usize;
        if stride == 0 {
            return Err(DmaError::RegionTooSmall);
        }
        Ok(Self { region, stride })
    }

    /// Bytes available to a single command, i.e. the maximum transfer.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Physical address of `cid`'s stride, for the command's data pointer.
    #[must_use]
    pub fn device_addr(&self, cid: u16) -> PhysAddr {
        self.region.paddr() + (cid as u64 * self.stride as u64)
    }

    /// Shared view of the first `len` bytes of `cid`'s stride.
    ///
    /// # Safety
    ///
    /// The caller must hold `cid` in use (its request-table slot reserved
    /// and not yet released); that is what makes the stride exclusive.
    /// `len` must not exceed [`Self::stride`].
    #[must_use]
    pub unsafe fn stride_slice(&self, cid: u16, len: usize) -> &[u8] {
        debug_assert!(len <= self.stride);
        // SAFETY: the stride lies inside the region and, per the caller's
        // contract, no other command touches it while `cid` is in use.
        unsafe {
            core::slice::from_raw_parts(self.region.as_ptr().add(cid as usize * self.stride), len)
        }
    }

    /// Mutable view of the first `len` bytes of `cid`'s stride.
    ///
    /// # Safety
    ///
    /// Same contract as [`Self::stride_slice`].
    #[must_use]
    pub unsafe fn stride_slice_mut(&self, cid: u16, len: usize) -> &mut [u8] {
        debug_assert!(len <= self.stride);
        // SAFETY: as for `stride_slice`; exclusivity comes from the slot
        // `used` flag.
        unsafe {
            core::slice::from_raw_parts_mut(
                self.region.as_ptr().add(cid as usize * self.stride),
                len,
            )
        }
    }
}
