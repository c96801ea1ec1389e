use std::{alloc::Layout, fmt::Display};

/// Allocation level errors.
/// Whoever returns one leaves its vector exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    /// Requested capacity can't be expressed as a layout of at most `isize::MAX` bytes.
    CapacityOverflow { ty: TypeInfo, capacity: usize },
    /// Global allocator refused to provide the memory.
    AllocFailed {
        ty: TypeInfo,
        capacity: usize,
        layout: Layout,
    },
}

impl VectorError {
    pub fn capacity_overflow<T>(capacity: usize) -> Self {
        Self::CapacityOverflow {
            ty: TypeInfo::of::<T>(),
            capacity,
        }
    }

    pub fn alloc_failed<T>(capacity: usize, layout: Layout) -> Self {
        Self::AllocFailed {
            ty: TypeInfo::of::<T>(),
            capacity,
            layout,
        }
    }

    /// Number of slots that were requested.
    pub fn requested(&self) -> usize {
        match self {
            Self::CapacityOverflow { capacity, .. } | Self::AllocFailed { capacity, .. } => {
                *capacity
            }
        }
    }

    pub fn is_capacity_overflow(&self) -> bool {
        matches!(self, Self::CapacityOverflow { .. })
    }

    /// Escalates the error the same way `std` collections do.
    /// Allocation failure goes through `handle_alloc_error`, overflow panics.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub(crate) fn handle(self) -> ! {
        match self {
            Self::AllocFailed { layout, .. } => std::alloc::handle_alloc_error(layout),
            error @ Self::CapacityOverflow { .. } => panic!("{}", error),
        }
    }
}

impl Display for VectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityOverflow { ty, capacity } => write!(
                f,
                "Capacity of {} slots for type {} overflows the address space.",
                capacity, ty
            ),
            Self::AllocFailed {
                ty,
                capacity,
                layout,
            } => write!(
                f,
                "Failed to allocate {} slots for type {}, {} bytes aligned to {}.",
                capacity,
                ty,
                layout.size(),
                layout.align()
            ),
        }
    }
}

impl std::error::Error for VectorError {}

/// Describes element type of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub ty_name: &'static str,
    pub size: usize,
    pub align: usize,
}

impl TypeInfo {
    pub fn of<T>() -> Self {
        Self {
            ty_name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        }
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}B", self.ty_name, self.size)
    }
}
