//! Dynamic entry resolution over the host `<dlfcn.h>`.
//!
//! Libraries opened here stay mapped for the life of the process: dropping a
//! [`Library`] never unloads it. Callers that really want the handle released
//! (the linker-path updater does) call [`Library::close`].

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr::NonNull;

use jrebridge_core::ResolutionError;
use log::debug;

/// Lazy binding with global symbol visibility, so the runtime's own
/// cross-library lookups succeed.
pub const LAUNCHER_FLAGS: c_int = libc::RTLD_LAZY | libc::RTLD_GLOBAL;

/// Fallback texts when the loader reports nothing.
const ERR_NOT_FOUND: &str = "shared object not found";
const ERR_SYMBOL_NOT_FOUND: &str = "undefined symbol";

const PROCESS_SCOPE: &str = "<process>";

/// An opened shared object, or the process-wide default search scope.
#[derive(Debug)]
pub struct Library {
    handle: *mut c_void,
    name: String,
}

// SAFETY: dlsym/dlclose are thread-safe; the handle is an opaque token.
unsafe impl Send for Library {}
// SAFETY: see above; no interior state is mutated through `&Library`.
unsafe impl Sync for Library {}

impl Library {
    /// Open `name` with explicit `dlopen` flags.
    pub fn open(name: &str, flags: c_int) -> Result<Self, ResolutionError> {
        let c_name = c_name(name)?;
        clear_dlerror();
        // SAFETY: `c_name` is a valid NUL-terminated string for the call.
        let handle = unsafe { libc::dlopen(c_name.as_ptr(), flags) };
        if handle.is_null() {
            return Err(ResolutionError::LibraryNotFound {
                library: name.to_string(),
                diagnostic: take_dlerror().unwrap_or_else(|| ERR_NOT_FOUND.to_string()),
            });
        }
        debug!(target: "jrebridge", "dlopen {name} success");
        Ok(Self {
            handle,
            name: name.to_string(),
        })
    }

    /// Open `name` the way runtime libraries are opened: [`LAUNCHER_FLAGS`].
    pub fn open_launcher(name: &str) -> Result<Self, ResolutionError> {
        Self::open(name, LAUNCHER_FLAGS)
    }

    /// The default search scope (`RTLD_DEFAULT`): every global symbol loaded so far.
    #[must_use]
    pub fn process() -> Self {
        Self {
            handle: libc::RTLD_DEFAULT,
            name: PROCESS_SCOPE.to_string(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_process_scope(&self) -> bool {
        self.handle == libc::RTLD_DEFAULT
    }

    /// Address of `symbol`, validated non-null.
    pub fn symbol(&self, symbol: &str) -> Result<NonNull<c_void>, ResolutionError> {
        let c_symbol = c_name(symbol)?;
        clear_dlerror();
        // SAFETY: handle came from dlopen or is RTLD_DEFAULT; name is NUL-terminated.
        let sym = unsafe { libc::dlsym(self.handle, c_symbol.as_ptr()) };
        NonNull::new(sym).ok_or_else(|| ResolutionError::SymbolNotFound {
            library: self.name.clone(),
            symbol: symbol.to_string(),
            diagnostic: take_dlerror().unwrap_or_else(|| ERR_SYMBOL_NOT_FOUND.to_string()),
        })
    }

    /// Resolve `symbol` as a function pointer of type `F`.
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type matching the symbol's real signature.
    pub unsafe fn function<F: Copy>(&self, symbol: &str) -> Result<F, ResolutionError> {
        const {
            assert!(std::mem::size_of::<F>() == std::mem::size_of::<*mut c_void>());
        }
        let ptr = self.symbol(symbol)?.as_ptr();
        // SAFETY: sizes match (checked above); caller vouches for the signature.
        Ok(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&ptr) })
    }

    /// Drop the loader's reference to this library.
    pub fn close(self) {
        if self.is_process_scope() {
            return;
        }
        // SAFETY: handle came from a successful dlopen and is closed once.
        let rc = unsafe { libc::dlclose(self.handle) };
        if rc != 0 {
            debug!(
                target: "jrebridge",
                "dlclose {} failed: {}",
                self.name,
                take_dlerror().unwrap_or_default()
            );
        }
    }
}

/// A validated entry point together with the library that provides it.
#[derive(Debug)]
pub struct ResolvedEntry<F: Copy> {
    library: Library,
    symbol: String,
    function: F,
}

impl<F: Copy> ResolvedEntry<F> {
    #[must_use]
    pub fn function(&self) -> F {
        self.function
    }

    #[must_use]
    pub fn library(&self) -> &Library {
        &self.library
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Look up `symbol` in an already opened `library`.
///
/// # Safety
///
/// `F` must be a function pointer type matching the symbol's real signature.
pub unsafe fn resolve<F: Copy>(
    library: Library,
    symbol: &str,
) -> Result<ResolvedEntry<F>, ResolutionError> {
    // SAFETY: forwarded caller contract.
    let function = unsafe { library.function::<F>(symbol)? };
    Ok(ResolvedEntry {
        library,
        symbol: symbol.to_string(),
        function,
    })
}

/// Open `library` lazily with global visibility and look up `symbol`.
///
/// # Safety
///
/// `F` must be a function pointer type matching the symbol's real signature.
pub unsafe fn resolve_entry<F: Copy>(
    library: &str,
    symbol: &str,
) -> Result<ResolvedEntry<F>, ResolutionError> {
    let library = Library::open_launcher(library)?;
    // SAFETY: forwarded caller contract.
    unsafe { resolve(library, symbol) }
}

fn c_name(name: &str) -> Result<CString, ResolutionError> {
    CString::new(name).map_err(|_| ResolutionError::InvalidName {
        name: name.to_string(),
    })
}

fn clear_dlerror() {
    // SAFETY: dlerror has no preconditions; the result is discarded.
    unsafe { libc::dlerror() };
}

fn take_dlerror() -> Option<String> {
    // SAFETY: dlerror returns null or a NUL-terminated thread-local message.
    let msg: *const c_char = unsafe { libc::dlerror() };
    if msg.is_null() {
        return None;
    }
    // SAFETY: non-null, NUL-terminated, valid until the next dl* call.
    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned();
    (!text.is_empty()).then_some(text)
}
