use super::VectorError;
use getset::CopyGetters;
use log::*;
use std::{
    alloc::{self, Layout},
    fmt,
    marker::PhantomData,
    mem::{self, MaybeUninit},
    ops::{Index, IndexMut},
    ptr::NonNull,
    slice,
};

/// Block of uninitialized memory with room for `capacity` slots of `T`.
///
/// Never constructs nor drops a `T`, that is responsibility of the owner.
/// On drop only the bytes are released, so any element still living in the
/// block at that point is leaked.
///
/// Capacity is fixed for the lifetime of the block. Growing means allocating
/// a new block and transferring ownership with [`RawMemory::swap`].
#[derive(CopyGetters)]
pub struct RawMemory<T> {
    /// Dangling if nothing is allocated.
    buffer: NonNull<T>,
    /// Number of `T` slots in the block.
    #[getset(get_copy = "pub")]
    capacity: usize,
    _data: PhantomData<T>,
}

impl<T> RawMemory<T> {
    pub const fn new() -> Self {
        Self {
            buffer: NonNull::dangling(),
            capacity: 0,
            _data: PhantomData,
        }
    }

    /// Aborts through `handle_alloc_error` if allocator fails.
    /// Panics if capacity overflows.
    #[track_caller]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::try_with_capacity(capacity).unwrap_or_else(|error| error.handle())
    }

    pub fn try_with_capacity(capacity: usize) -> Result<Self, VectorError> {
        Ok(Self {
            buffer: Self::allocate(capacity)?,
            capacity,
            _data: PhantomData,
        })
    }

    /// Base address of the block. None iff capacity is 0.
    pub fn address(&self) -> Option<NonNull<T>> {
        (self.capacity != 0).then_some(self.buffer)
    }

    /// Never null, dangling if capacity is 0.
    pub fn as_ptr(&self) -> *const T {
        self.buffer.as_ptr()
    }

    /// Never null, dangling if capacity is 0.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buffer.as_ptr()
    }

    /// Pointer to slot at `offset`. One past the last slot is allowed.
    /// Dereferencing is up to the caller.
    pub fn offset(&self, offset: usize) -> *const T {
        debug_assert!(
            offset <= self.capacity,
            "Offset {} out of block of capacity {}",
            offset,
            self.capacity
        );
        self.buffer.as_ptr().wrapping_add(offset)
    }

    pub fn offset_mut(&mut self, offset: usize) -> *mut T {
        debug_assert!(
            offset <= self.capacity,
            "Offset {} out of block of capacity {}",
            offset,
            self.capacity
        );
        self.buffer.as_ptr().wrapping_add(offset)
    }

    pub fn slots(&self) -> &[MaybeUninit<T>] {
        // This is safe since the block is allocated for capacity slots
        // and MaybeUninit doesn't require initialization.
        unsafe { slice::from_raw_parts(self.buffer.as_ptr().cast(), self.capacity) }
    }

    pub fn slots_mut(&mut self) -> &mut [MaybeUninit<T>] {
        // This is safe since the block is allocated for capacity slots, we have
        // exclusive access, and MaybeUninit doesn't require initialization.
        unsafe { slice::from_raw_parts_mut(self.buffer.as_ptr().cast(), self.capacity) }
    }

    /// Exchanges blocks in O(1). No element is touched.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Transfers ownership of the block, leaving self empty.
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::new())
    }

    fn layout(capacity: usize) -> Result<Layout, VectorError> {
        Layout::array::<T>(capacity).map_err(|_| VectorError::capacity_overflow::<T>(capacity))
    }

    fn allocate(capacity: usize) -> Result<NonNull<T>, VectorError> {
        if capacity == 0 {
            return Ok(NonNull::dangling());
        }

        let layout = Self::layout(capacity)?;
        if layout.size() == 0 {
            // Zero sized T, nothing to allocate.
            return Ok(NonNull::dangling());
        }

        // This is safe since layout has non zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        let buffer = NonNull::new(ptr.cast::<T>())
            .ok_or_else(|| VectorError::alloc_failed::<T>(capacity, layout))?;
        trace!(
            "Allocated {} slots of {} at {:?}",
            capacity,
            std::any::type_name::<T>(),
            buffer
        );
        Ok(buffer)
    }
}

impl<T> Drop for RawMemory<T> {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        // Layout was valid when the block was allocated.
        let layout = match Self::layout(self.capacity) {
            Ok(layout) => layout,
            Err(_) => unreachable!("Layout of allocated block must be valid"),
        };
        if layout.size() != 0 {
            trace!(
                "Releasing {} slots of {} at {:?}",
                self.capacity,
                std::any::type_name::<T>(),
                self.buffer
            );
            // This is safe since buffer was allocated with this layout by global allocator.
            unsafe { alloc::dealloc(self.buffer.as_ptr().cast(), layout) }
        }
    }
}

// Indexing
impl<T> Index<usize> for RawMemory<T> {
    type Output = MaybeUninit<T>;

    fn index(&self, index: usize) -> &Self::Output {
        debug_assert!(index < self.capacity, "Slot {} out of block", index);
        &self.slots()[index]
    }
}

impl<T> IndexMut<usize> for RawMemory<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        debug_assert!(index < self.capacity, "Slot {} out of block", index);
        &mut self.slots_mut()[index]
    }
}

impl<T> Default for RawMemory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RawMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMemory")
            .field("address", &self.address())
            .field("capacity", &self.capacity)
            .finish()
    }
}

// This are safe since RawMemory has unique ownership of the block.
unsafe impl<T: Send> Send for RawMemory<T> {}
unsafe impl<T: Sync> Sync for RawMemory<T> {}
