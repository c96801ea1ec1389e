use super::guard::{construct_n, relocate};
use crate::core::{RawMemory, VectorError};
use log::*;
use std::{
    fmt,
    hash::{Hash, Hasher},
    mem,
    ops::{Bound, Deref, DerefMut, Index, IndexMut, RangeBounds},
    ptr,
    slice::{self, SliceIndex},
};

/// Capacity is at least multiplied by this on each reallocation caused by appending.
pub const GROWTH_FACTOR: usize = 2;
/// Capacity of the first block allocated by appending to an empty vector.
pub const MIN_NON_ZERO_CAPACITY: usize = 1;

/// Growable array of `T` living in a [`RawMemory`] block it exclusively owns.
///
/// Slots `[0, len)` always hold constructed elements, slots `[len, capacity)`
/// are always uninitialized.
///
/// # Panic safety
/// Constructors of `T` (`Default`, `Clone`, closures given to `emplace*`) may
/// panic. Every operation that reallocates builds new elements in the new
/// block before anything is relocated, so such panic leaves the vector exactly
/// as it was: same len, capacity, and elements. Relocation itself is a bitwise
/// move and can't fail.
///
/// [`Vector::emplace`] without reallocation builds the element before the tail
/// is shifted, so it gives the same guarantee. What is left of the weaker
/// in-place guarantee only covers the shift, which can't fail.
///
/// # Concurrency
/// There is no internal synchronization. Mutation requires `&mut`, so sharing
/// a vector between threads that mutate it is up to the caller to guard.
pub struct Vector<T> {
    data: RawMemory<T>,
    len: usize,
}

impl<T> Vector<T> {
    pub const fn new() -> Self {
        Self {
            data: RawMemory::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: RawMemory::with_capacity(capacity),
            len: 0,
        }
    }

    /// Vector of `len` default values with capacity of exactly `len`.
    ///
    /// If `T::default` panics the values built so far are dropped and the
    /// block is released before the panic continues.
    pub fn with_len(len: usize) -> Self
    where
        T: Default,
    {
        let mut data = RawMemory::<T>::with_capacity(len);
        // This is safe since data has room for len elements.
        unsafe { construct_n(data.as_mut_ptr(), len, |_| T::default()) };
        Self { data, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        // This is safe since first len elements are constructed.
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // This is safe since first len elements are constructed.
        unsafe { slice::from_raw_parts_mut(self.data.as_mut_ptr(), self.len) }
    }

    /// Exchanges contents with `other` in O(1).
    pub fn swap(&mut self, other: &mut Self) {
        self.data.swap(&mut other.data);
        mem::swap(&mut self.len, &mut other.len);
    }

    /// Ensures capacity of at least `new_capacity`.
    ///
    /// No-op if capacity is already sufficient, otherwise a block of exactly
    /// `new_capacity` slots replaces the current one.
    #[track_caller]
    pub fn reserve(&mut self, new_capacity: usize) {
        self.try_reserve(new_capacity)
            .unwrap_or_else(|error| error.handle());
    }

    /// Same as [`Vector::reserve`] but returns allocation errors.
    /// On error the vector is untouched.
    pub fn try_reserve(&mut self, new_capacity: usize) -> Result<(), VectorError> {
        if new_capacity <= self.capacity() {
            return Ok(());
        }

        let mut new_data = RawMemory::<T>::try_with_capacity(new_capacity)?;
        debug!(
            "Reserving {} slots for vector of {}, was {}",
            new_capacity,
            std::any::type_name::<T>(),
            self.capacity()
        );
        // This is safe since new block has room for all elements, and the old
        // block is released without dropping them.
        unsafe { relocate(self.data.as_ptr(), new_data.as_mut_ptr(), self.len) };
        self.data.swap(&mut new_data);
        Ok(())
    }

    pub fn push_back(&mut self, value: T) {
        self.emplace_back(|| value);
    }

    /// Appends element built by `f` and returns it.
    ///
    /// When full, a block of doubled capacity is allocated and `f` builds the
    /// element directly in its final slot there. Only then are existing
    /// elements relocated, so if `f` panics the vector is unchanged.
    #[track_caller]
    pub fn emplace_back(&mut self, f: impl FnOnce() -> T) -> &mut T {
        let len = self.len;
        if len == self.capacity() {
            self.grow_with_gap(len + 1, len, 1, |slot| {
                // This is safe since slot is the uninitialized gap.
                unsafe { slot.write(f()) }
            })
            .unwrap_or_else(|error| error.handle());
        } else {
            // This is safe since len < capacity so the slot is uninitialized.
            unsafe { self.data.offset_mut(len).write(f()) };
            self.len += 1;
        }

        // This is safe since element at len was just constructed.
        unsafe { &mut *self.data.offset_mut(len) }
    }

    /// Drops the last element.
    /// Panics if empty.
    #[track_caller]
    pub fn pop_back(&mut self) {
        assert!(!self.is_empty(), "pop_back on empty vector");
        self.len -= 1;
        // This is safe since the element was constructed and is no longer counted.
        unsafe { ptr::drop_in_place(self.data.offset_mut(self.len)) }
    }

    /// Removes the last element and returns it.
    pub fn pop(&mut self) -> Option<T> {
        let len = self.len.checked_sub(1)?;
        self.len = len;
        // This is safe since it was initialized according to len.
        Some(unsafe { ptr::read(self.data.offset(len)) })
    }

    /// Inserts `value` at `index`, shifting everything after it.
    /// Returns index of inserted element.
    ///
    /// Panics if `index > len`.
    #[track_caller]
    pub fn insert(&mut self, index: usize, value: T) -> usize {
        self.emplace(index, || value)
    }

    /// Inserts element built by `f` at `index`, shifting everything after it.
    /// Returns index of inserted element.
    ///
    /// Panics if `index > len`.
    ///
    /// # Panic safety
    /// If reallocation is needed, `f` builds the element in the new block
    /// before anything is relocated, and a panic leaves the vector unchanged.
    ///
    /// If there is spare capacity, `f` runs first and only then elements
    /// `[index, len)` are shifted one slot to make room. A panic in `f` leaves
    /// the vector unchanged. The shift and the write into the hole are the
    /// in-place steps that offer no rollback, but both are bitwise moves that
    /// can't fail.
    #[track_caller]
    pub fn emplace(&mut self, index: usize, f: impl FnOnce() -> T) -> usize {
        let len = self.len;
        if index > len {
            index_failed("insertion", index, len);
        }

        if len == self.capacity() {
            self.grow_with_gap(len + 1, index, 1, |slot| {
                // This is safe since slot is the uninitialized gap.
                unsafe { slot.write(f()) }
            })
            .unwrap_or_else(|error| error.handle());
            return index;
        }

        let value = f();
        // This is safe since there is spare slot at len, and nothing between
        // the shift and the write can panic.
        unsafe {
            let hole = self.data.offset_mut(index);
            ptr::copy(hole, hole.add(1), len - index);
            hole.write(value);
        }
        self.len = len + 1;
        index
    }

    /// Drops element at `index` and shifts everything after it one slot toward the front.
    /// Returns index of the element that followed the erased one, which is `len` if
    /// the last one was erased.
    ///
    /// Panics if `index >= len`.
    #[track_caller]
    pub fn erase(&mut self, index: usize) -> usize {
        drop(self.remove(index));
        index
    }

    /// Removes element at `index` and returns it.
    /// Everything after it is shifted one slot toward the front.
    ///
    /// Panics if `index >= len`.
    #[track_caller]
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len;
        if index >= len {
            index_failed("removal", index, len);
        }
        unsafe {
            // the place we are taking from.
            let ptr = self.data.offset_mut(index);
            // copy it out, unsafely having a copy of the value on
            // the stack and in the vector at the same time.
            let ret = ptr::read(ptr);

            // Shift everything down to fill in that spot.
            ptr::copy(ptr.add(1), ptr, len - index - 1);
            self.len = len - 1;
            ret
        }
    }

    /// Removes element at `index` and returns it.
    /// Last element is moved to fill the gap.
    ///
    /// Panics if `index >= len`.
    #[track_caller]
    pub fn swap_remove(&mut self, index: usize) -> T {
        let len = self.len;
        if index >= len {
            index_failed("swap removal", index, len);
        }
        unsafe {
            // This is safe since both are initialized according to len.
            let removed = ptr::read(self.data.offset(index));
            let last = self.data.offset(len - 1);
            ptr::copy(last, self.data.offset_mut(index), 1);
            self.len = len - 1;
            removed
        }
    }

    /// Drops elements in `range` and shifts the rest to close the gap.
    ///
    /// Panics if range is out of bounds.
    #[track_caller]
    pub fn remove_range(&mut self, range: impl RangeBounds<usize>) {
        let len = self.len;
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n
                .checked_add(1)
                .unwrap_or_else(|| range_failed("start", n, len)),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n
                .checked_add(1)
                .unwrap_or_else(|| range_failed("end", n, len)),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };
        assert!(start <= end, "Range starts at {} but ends at {}", start, end);
        assert!(end <= len, "Range end {} out of vector of len {}", end, len);

        /// Closes the gap even if a drop panics.
        struct CloseGap<'a, T> {
            vector: &'a mut Vector<T>,
            start: usize,
            end: usize,
            original_len: usize,
        }

        impl<T> Drop for CloseGap<'_, T> {
            fn drop(&mut self) {
                let tail = self.original_len - self.end;
                // This is safe since tail is initialized and the gap was dropped.
                unsafe {
                    let base = self.vector.data.as_mut_ptr();
                    ptr::copy(base.add(self.end), base.add(self.start), tail);
                }
                self.vector.len = self.start + tail;
            }
        }

        self.len = start;
        let gap = CloseGap {
            vector: self,
            start,
            end,
            original_len: len,
        };
        // This is safe since range is initialized and no longer counted by len.
        unsafe {
            let base = gap.vector.data.as_mut_ptr();
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(base.add(start), end - start));
        }
    }

    /// Drops elements past `len`. No-op if `len` is not smaller than current len.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        // This is safe since elements [len, self.len) are constructed and
        // are no longer counted once len is set.
        unsafe {
            let tail = ptr::slice_from_raw_parts_mut(self.data.offset_mut(len), self.len - len);
            self.len = len;
            ptr::drop_in_place(tail);
        }
    }

    /// Drops all elements. Capacity is kept.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Resizes to `new_len`, building new elements with `f`.
    ///
    /// Shrinking drops the surplus. Growing past capacity targets
    /// `max(capacity * 2, new_len)` and builds the new tail in the new block
    /// before relocating. In both cases a panic in `f` leaves the vector as it
    /// was.
    #[track_caller]
    pub fn resize_with(&mut self, new_len: usize, mut f: impl FnMut() -> T) {
        let len = self.len;
        if new_len <= len {
            self.truncate(new_len);
            return;
        }

        let extra = new_len - len;
        if new_len > self.capacity() {
            self.grow_with_gap(new_len, len, extra, |dst| {
                // This is safe since dst is start of an uninitialized gap of extra slots.
                unsafe { construct_n(dst, extra, |_| f()) }
            })
            .unwrap_or_else(|error| error.handle());
        } else {
            // This is safe since [len, new_len) are spare slots.
            unsafe { construct_n(self.data.offset_mut(len), extra, |_| f()) };
            self.len = new_len;
        }
    }

    /// Moves all elements of `other` to the end, leaving it empty.
    #[track_caller]
    pub fn append(&mut self, other: &mut Self) {
        let count = other.len;
        if count == 0 {
            return;
        }
        let total = self
            .len
            .checked_add(count)
            .unwrap_or_else(|| VectorError::capacity_overflow::<T>(usize::MAX).handle());
        if total > self.capacity() {
            let new_capacity = self
                .grown_capacity(total)
                .unwrap_or_else(|error| error.handle());
            self.reserve(new_capacity);
        }

        other.len = 0;
        // This is safe since there is room for count more elements and
        // other no longer counts them.
        unsafe { relocate(other.data.as_ptr(), self.data.offset_mut(self.len), count) };
        self.len = total;
    }

    /// Retains only the elements specified by the predicate, passing a mutable reference to it.
    ///
    /// In other words, remove all elements `e` such that `f(&mut e)` returns `false`.
    /// This method operates in place, visiting each element exactly once in the
    /// original order, and preserves the order of the retained elements.
    pub fn retain_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        let original_len = self.len;
        // Avoid double drop if the predicate or a drop panics.
        self.len = 0;

        // Vector: [Kept, Kept, Hole, Hole, Hole, Hole, Unchecked, Unchecked]
        //         |<-              processed len   ->| ^- next to check
        //                     |<-  deleted cnt     ->|
        //         |<-              original_len                          ->|
        // Kept: Elements which predicate returns true on.
        // Hole: Moved or dropped element slot.
        // Unchecked: Unchecked valid elements.
        struct Track<'a, T> {
            vector: &'a mut Vector<T>,
            processed_len: usize,
            deleted_cnt: usize,
            original_len: usize,
        }

        impl<T> Drop for Track<'_, T> {
            fn drop(&mut self) {
                if self.deleted_cnt > 0 {
                    // SAFETY: Trailing unchecked items must be valid since we never touch them.
                    unsafe {
                        let base = self.vector.data.as_mut_ptr();
                        ptr::copy(
                            base.add(self.processed_len),
                            base.add(self.processed_len - self.deleted_cnt),
                            self.original_len - self.processed_len,
                        );
                    }
                }
                // SAFETY: After filling holes, all items are in contiguous memory.
                self.vector.len = self.original_len - self.deleted_cnt;
            }
        }

        let mut g = Track {
            vector: self,
            processed_len: 0,
            deleted_cnt: 0,
            original_len,
        };

        fn process_loop<F, T, const DELETED: bool>(
            original_len: usize,
            f: &mut F,
            g: &mut Track<'_, T>,
        ) where
            F: FnMut(&mut T) -> bool,
        {
            while g.processed_len != original_len {
                let base = g.vector.data.as_mut_ptr();
                // SAFETY: Unchecked element must be valid.
                let cur = unsafe { &mut *base.add(g.processed_len) };
                if !f(cur) {
                    // Advance early to avoid double drop if `drop_in_place` panicked.
                    g.processed_len += 1;
                    g.deleted_cnt += 1;
                    // SAFETY: We never touch this element again after dropped.
                    unsafe { ptr::drop_in_place(cur) };
                    // We already advanced the counter.
                    if DELETED {
                        continue;
                    } else {
                        break;
                    }
                }
                if DELETED {
                    // SAFETY: `deleted_cnt` > 0, so the hole slot must not overlap with current element.
                    // We use copy for move, and never touch this element again.
                    unsafe {
                        let hole_slot = base.add(g.processed_len - g.deleted_cnt);
                        ptr::copy_nonoverlapping(cur, hole_slot, 1);
                    }
                }
                g.processed_len += 1;
            }
        }

        // Stage 1: Nothing was deleted.
        process_loop::<F, T, false>(original_len, &mut f, &mut g);

        // Stage 2: Some elements were deleted.
        process_loop::<F, T, true>(original_len, &mut f, &mut g);

        drop(g);
    }

    /// Capacity to grow to when `min_capacity` slots are needed.
    fn grown_capacity(&self, min_capacity: usize) -> Result<usize, VectorError> {
        let doubled = self
            .capacity()
            .checked_mul(GROWTH_FACTOR)
            .ok_or_else(|| VectorError::capacity_overflow::<T>(usize::MAX))?;
        Ok(doubled.max(MIN_NON_ZERO_CAPACITY).max(min_capacity))
    }

    /// Moves into a new block with room for at least `min_capacity` with a
    /// gap of `gap` slots opened at `index`.
    ///
    /// `build` must fill the whole gap, it receives pointer to its first slot.
    /// It runs before any element is relocated, so if it panics, after
    /// dropping whatever it built itself, the new block is released and self
    /// is untouched.
    fn grow_with_gap(
        &mut self,
        min_capacity: usize,
        index: usize,
        gap: usize,
        build: impl FnOnce(*mut T),
    ) -> Result<(), VectorError> {
        debug_assert!(index <= self.len);
        let new_capacity = self.grown_capacity(min_capacity)?;
        let mut new_data = RawMemory::<T>::try_with_capacity(new_capacity)?;
        debug!(
            "Growing vector of {} from {} to {} slots",
            std::any::type_name::<T>(),
            self.capacity(),
            new_capacity
        );

        let dst = new_data.as_mut_ptr();
        // This is safe since new block has room for len + gap elements.
        unsafe {
            build(dst.add(index));

            let src = self.data.as_ptr();
            relocate(src, dst, index);
            relocate(src.add(index), dst.add(index + gap), self.len - index);
        }

        self.data.swap(&mut new_data);
        self.len += gap;
        Ok(())
    }
}

impl<T: Default> Vector<T> {
    /// Resizes to `new_len`, filling new slots with `T::default()`.
    /// See [`Vector::resize_with`].
    #[track_caller]
    pub fn resize(&mut self, new_len: usize) {
        self.resize_with(new_len, T::default);
    }
}

impl<T> Drop for Vector<T> {
    fn drop(&mut self) {
        // This is safe since first len elements are constructed.
        // Block is released after by RawMemory.
        unsafe { ptr::drop_in_place(self.as_mut_slice()) }
    }
}

impl<T: Clone> Clone for Vector<T> {
    /// Deep copy with capacity equal to len.
    /// If a clone panics the copies made so far are dropped and the block is released.
    fn clone(&self) -> Self {
        let mut data = RawMemory::<T>::with_capacity(self.len);
        let source = self.as_slice();
        // This is safe since data has room for len elements.
        unsafe { construct_n(data.as_mut_ptr(), source.len(), |i| source[i].clone()) };
        Self {
            data,
            len: self.len,
        }
    }

    /// Reuses existing block when it can hold all of `source`: common prefix is
    /// assigned in place, missing tail is cloned into spare slots, surplus is
    /// dropped. Otherwise clones `source` and swaps with it.
    fn clone_from(&mut self, source: &Self) {
        if source.len > self.capacity() {
            let mut copy = source.clone();
            self.swap(&mut copy);
            return;
        }

        self.truncate(source.len);
        let (prefix, tail) = source.as_slice().split_at(self.len);
        self.as_mut_slice().clone_from_slice(prefix);

        // A panicking clone drops only the new tail, prefix stays assigned.
        // This is safe since [len, source.len) are spare slots.
        unsafe { construct_n(self.data.offset_mut(self.len), tail.len(), |i| tail[i].clone()) };
        self.len = source.len;
    }
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Vector<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for Vector<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T> AsRef<[T]> for Vector<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

// Indexing
impl<T, I: SliceIndex<[T]>> Index<I> for Vector<T> {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        Index::index(self.as_slice(), index)
    }
}

impl<T, I: SliceIndex<[T]>> IndexMut<I> for Vector<T> {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        IndexMut::index_mut(self.as_mut_slice(), index)
    }
}

impl<'a, T> IntoIterator for &'a Vector<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Vector<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T> Extend<T> for Vector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(self.len.saturating_add(lower));
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T> FromIterator<T> for Vector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vector = Self::new();
        vector.extend(iter);
        vector
    }
}

impl<T> From<Vec<T>> for Vector<T> {
    fn from(vec: Vec<T>) -> Self {
        vec.into_iter().collect()
    }
}

impl<T: Eq> Eq for Vector<T> {}

impl<T: PartialEq> PartialEq for Vector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: PartialEq> PartialEq<[T]> for Vector<T> {
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

impl<T: PartialEq, const N: usize> PartialEq<[T; N]> for Vector<T> {
    fn eq(&self, other: &[T; N]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Hash> Hash for Vector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn index_failed(op: &str, index: usize, len: usize) -> ! {
    panic!("{op} index (is {index}) out of bounds for vector of len {len}");
}

#[cold]
#[inline(never)]
#[track_caller]
fn range_failed(bound: &str, index: usize, len: usize) -> ! {
    panic!("Range {bound} {index} out of vector of len {len}");
}
