//! Owned argument vector handed to a C entry point.
//!
//! Every element is a separately allocated, NUL-terminated buffer; the pointer
//! table is allocated on its own and carries a trailing null slot that is not
//! counted by [`ArgumentVector::argc`]. Dropping the vector releases all of it,
//! including on the partial-failure paths of [`ArgumentVector::build_with`].

use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LaunchError;

static LIVE_ELEMENTS: AtomicUsize = AtomicUsize::new(0);

/// Number of argument elements currently allocated in this process.
#[must_use]
pub fn live_elements() -> usize {
    LIVE_ELEMENTS.load(Ordering::Acquire)
}

/// Source of element buffers.
pub trait ArgAllocator {
    /// Return an empty buffer with room for `capacity` bytes, or `None` when
    /// memory is exhausted.
    fn allocate(&mut self, index: usize, capacity: usize) -> Option<Vec<u8>>;
}

/// Allocator backed by the global heap with fallible reservation.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl ArgAllocator for HeapAllocator {
    fn allocate(&mut self, _index: usize, capacity: usize) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity).ok()?;
        Some(buf)
    }
}

struct OwnedArg(CString);

impl OwnedArg {
    fn new(value: CString) -> Self {
        LIVE_ELEMENTS.fetch_add(1, Ordering::AcqRel);
        Self(value)
    }
}

impl Drop for OwnedArg {
    fn drop(&mut self) {
        LIVE_ELEMENTS.fetch_sub(1, Ordering::AcqRel);
    }
}

/// `argc`/`argv` pair with scoped ownership.
pub struct ArgumentVector {
    elements: Vec<OwnedArg>,
    pointers: Vec<*mut c_char>,
}

impl ArgumentVector {
    /// Build from `args` using the global heap.
    pub fn build<S: AsRef<[u8]>>(args: &[S]) -> Result<Self, LaunchError> {
        Self::build_with(args, &mut HeapAllocator)
    }

    /// Build from `args`, taking element buffers from `allocator`.
    pub fn build_with<S, A>(args: &[S], allocator: &mut A) -> Result<Self, LaunchError>
    where
        S: AsRef<[u8]>,
        A: ArgAllocator + ?Sized,
    {
        if args.is_empty() {
            return Err(LaunchError::EmptyArguments);
        }
        if c_int::try_from(args.len()).is_err() {
            return Err(LaunchError::TooManyArguments { count: args.len() });
        }

        let mut elements = Vec::new();
        elements
            .try_reserve_exact(args.len())
            .map_err(|_| LaunchError::Allocation { index: 0 })?;

        for (index, arg) in args.iter().enumerate() {
            let bytes = arg.as_ref();
            if bytes.contains(&0) {
                return Err(LaunchError::InvalidArgument { index });
            }
            let mut buf = allocator
                .allocate(index, bytes.len() + 1)
                .ok_or(LaunchError::Allocation { index })?;
            buf.extend_from_slice(bytes);
            buf.push(0);
            let value = CString::from_vec_with_nul(buf)
                .map_err(|_| LaunchError::InvalidArgument { index })?;
            elements.push(OwnedArg::new(value));
        }

        let mut pointers = Vec::new();
        pointers
            .try_reserve_exact(args.len() + 1)
            .map_err(|_| LaunchError::Allocation { index: args.len() })?;
        pointers.extend(elements.iter().map(|e| e.0.as_ptr().cast_mut()));
        pointers.push(ptr::null_mut());

        Ok(Self { elements, pointers })
    }

    /// Number of elements, excluding the null terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Always false for a built vector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element count as a C `int`.
    #[must_use]
    pub fn argc(&self) -> c_int {
        c_int::try_from(self.elements.len()).unwrap_or(c_int::MAX)
    }

    /// Pointer table suitable for a `char **argv` parameter.
    ///
    /// Valid while `self` is alive and not moved out of.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.pointers.as_mut_ptr()
    }

    /// The pointer table, null terminator included.
    #[must_use]
    pub fn pointers(&self) -> &[*mut c_char] {
        &self.pointers
    }

    /// First element, used as program and launcher name.
    #[must_use]
    pub fn program_name(&self) -> &CStr {
        &self.elements[0].0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CStr> {
        self.elements.get(index).map(|e| e.0.as_c_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.elements.iter().map(|e| e.0.as_c_str())
    }
}

impl std::fmt::Debug for ArgumentVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
