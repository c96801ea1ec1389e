//! Unwind guards used by [`super::Vector`] to roll back partially built ranges.
//!
//! Element constructors are user code and may panic at any point. Every
//! fallible step builds into slots the vector doesn't consider live yet, with
//! one of these guards counting what was built. On unwind the guard drops
//! exactly that, on success it is disarmed and the vector commits.

use std::{mem, ptr};

/// Owns `len` constructed elements starting at `start` until disarmed.
pub(super) struct Constructed<T> {
    start: *mut T,
    len: usize,
}

impl<T> Constructed<T> {
    /// `start` must point into a block with room for every element that
    /// will be registered with the guard.
    pub(super) unsafe fn new(start: *mut T, len: usize) -> Self {
        Self { start, len }
    }

    /// Hands ownership of the elements back to the caller.
    pub(super) fn disarm(self) -> usize {
        let len = self.len;
        mem::forget(self);
        len
    }
}

impl<T> Drop for Constructed<T> {
    fn drop(&mut self) {
        if self.len != 0 {
            // This is safe since guard owns exactly these constructed elements.
            unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.start, self.len)) }
        }
    }
}

/// Constructs `count` elements at `dst` with `f`, getting index relative to `dst`.
/// On panic the elements built so far are dropped and nothing else is touched.
///
/// # Safety
/// `dst` must be valid for writes of `count` elements.
pub(super) unsafe fn construct_n<T>(dst: *mut T, count: usize, mut f: impl FnMut(usize) -> T) {
    let mut guard = Constructed::new(dst, 0);
    while guard.len < count {
        let value = f(guard.len);
        dst.add(guard.len).write(value);
        guard.len += 1;
    }
    guard.disarm();
}

/// Moves `count` elements from `src` to `dst`. Sources are left logically uninitialized.
/// Never panics.
///
/// # Safety
/// Both ranges must be valid for `count` elements and must not overlap.
pub(super) unsafe fn relocate<T>(src: *const T, dst: *mut T, count: usize) {
    ptr::copy_nonoverlapping(src, dst, count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawMemory;
    use std::{
        cell::Cell,
        panic::{catch_unwind, AssertUnwindSafe},
        rc::Rc,
    };

    struct Counted(Rc<Cell<usize>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn construct_all() {
        let mut memory = RawMemory::<usize>::with_capacity(5);
        unsafe {
            construct_n(memory.as_mut_ptr(), 5, |i| i * i);
            assert_eq!(*memory.offset(4), 16);
        }
    }

    #[test]
    fn construct_panic_drops_built() {
        let drops = Rc::new(Cell::new(0));
        let mut memory = RawMemory::<Counted>::with_capacity(5);
        let dst = memory.as_mut_ptr();

        let result = catch_unwind(AssertUnwindSafe(|| unsafe {
            construct_n(dst, 5, |i| {
                if i == 3 {
                    panic!("third");
                }
                Counted(drops.clone())
            })
        }));

        assert!(result.is_err());
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn disarmed_guard_keeps_elements() {
        let drops = Rc::new(Cell::new(0));
        let mut memory = RawMemory::<Counted>::with_capacity(2);
        unsafe {
            construct_n(memory.as_mut_ptr(), 2, |_| Counted(drops.clone()));
            let guard = Constructed::new(memory.as_mut_ptr(), 2);
            assert_eq!(guard.disarm(), 2);
            assert_eq!(drops.get(), 0);
            // Clean up by hand since block doesn't drop elements.
            drop(Constructed::new(memory.as_mut_ptr(), 2));
        }
        assert_eq!(drops.get(), 2);
    }
}
