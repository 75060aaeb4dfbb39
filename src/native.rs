use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr::NonNull;

use crate::config::{JiebaHandle, JiebaTokenizeMode, JiebaWordRaw, JiebaWordWeightRaw};
use crate::error::{JiebaError, Result};

type FnNewJieba = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
) -> JiebaHandle;
type FnFreeJieba = unsafe extern "C" fn(JiebaHandle);
type FnCut = unsafe extern "C" fn(JiebaHandle, *const c_char, c_int) -> *mut *mut c_char;
type FnCutAll = unsafe extern "C" fn(JiebaHandle, *const c_char) -> *mut *mut c_char;
type FnCutForSearch = unsafe extern "C" fn(JiebaHandle, *const c_char, c_int) -> *mut *mut c_char;
type FnTag = unsafe extern "C" fn(JiebaHandle, *const c_char) -> *mut *mut c_char;
type FnAddWord = unsafe extern "C" fn(JiebaHandle, *const c_char);
type FnAddWordEx = unsafe extern "C" fn(JiebaHandle, *const c_char, c_int, *const c_char);
type FnRemoveWord = unsafe extern "C" fn(JiebaHandle, *const c_char);
type FnTokenize = unsafe extern "C" fn(
    JiebaHandle,
    *const c_char,
    JiebaTokenizeMode,
    c_int,
) -> *mut JiebaWordRaw;
type FnExtract = unsafe extern "C" fn(JiebaHandle, *const c_char, c_int) -> *mut *mut c_char;
type FnExtractWithWeight =
    unsafe extern "C" fn(JiebaHandle, *const c_char, c_int) -> *mut JiebaWordWeightRaw;
pub(crate) type FnFreeWords = unsafe extern "C" fn(*mut *mut c_char);
pub(crate) type FnFreeWordWeights = unsafe extern "C" fn(*mut JiebaWordWeightRaw);
pub(crate) type FnFreeTokens = unsafe extern "C" fn(*mut JiebaWordRaw);

/// Resolved entry points of the cppjieba C wrapper.
#[derive(Clone, Copy)]
pub(crate) struct JiebaApi {
    pub(crate) new_jieba: FnNewJieba,
    pub(crate) free_jieba: FnFreeJieba,
    pub(crate) cut: FnCut,
    pub(crate) cut_all: FnCutAll,
    pub(crate) cut_for_search: FnCutForSearch,
    pub(crate) tag: FnTag,
    pub(crate) add_word: FnAddWord,
    pub(crate) add_word_ex: FnAddWordEx,
    pub(crate) remove_word: FnRemoveWord,
    pub(crate) tokenize: FnTokenize,
    pub(crate) extract: FnExtract,
    pub(crate) extract_with_weight: FnExtractWithWeight,
    pub(crate) free_words: FnFreeWords,
    pub(crate) free_word_weights: FnFreeWordWeights,
    /// `Tokenize` results are plain `malloc` blocks with no dedicated deallocator.
    pub(crate) free_tokens: FnFreeTokens,
}

impl JiebaApi {
    pub(crate) unsafe fn load(library: &DynamicLibrary) -> Result<Self> {
        Ok(Self {
            new_jieba: library.load_symbol("NewJieba")?,
            free_jieba: library.load_symbol("FreeJieba")?,
            cut: library.load_symbol("Cut")?,
            cut_all: library.load_symbol("CutAll")?,
            cut_for_search: library.load_symbol("CutForSearch")?,
            tag: library.load_symbol("Tag")?,
            add_word: library.load_symbol("AddWord")?,
            add_word_ex: library.load_symbol("AddWordEx")?,
            remove_word: library.load_symbol("RemoveWord")?,
            tokenize: library.load_symbol("Tokenize")?,
            extract: library.load_symbol("Extract")?,
            extract_with_weight: library.load_symbol("ExtractWithWeight")?,
            free_words: library.load_symbol("FreeWords")?,
            free_word_weights: library.load_symbol("FreeWordWeights")?,
            free_tokens: c_free_tokens,
        })
    }
}

pub(crate) struct LoadedLibrary {
    /// `None` only for engines wired up in-process by tests.
    pub(crate) _library: Option<DynamicLibrary>,
    pub(crate) api: JiebaApi,
}

/// An open shared library, closed on drop.
#[derive(Debug)]
pub(crate) struct DynamicLibrary {
    handle: NonNull<c_void>,
}

// The module handle is only used for symbol lookup and the final close.
unsafe impl Send for DynamicLibrary {}
unsafe impl Sync for DynamicLibrary {}

impl DynamicLibrary {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self> {
        let display = path.as_ref().to_string_lossy().into_owned();
        let path_c = CString::new(display.as_str())?;
        match NonNull::new(unsafe { sys::open(&path_c) }) {
            Some(handle) => Ok(Self { handle }),
            None => Err(JiebaError::LibraryLoad(format!(
                "{display} ({})",
                sys::last_error()
            ))),
        }
    }

    /// # Safety
    /// `T` must be the function pointer type of the exported symbol.
    pub(crate) unsafe fn load_symbol<T: Copy>(&self, name: &str) -> Result<T> {
        let name_c = CString::new(name)?;
        let symbol = sys::symbol(self.handle.as_ptr(), &name_c);
        if symbol.is_null() {
            return Err(JiebaError::SymbolLoad(format!(
                "{name} ({})",
                sys::last_error()
            )));
        }
        Ok(mem::transmute_copy::<*mut c_void, T>(&symbol))
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        unsafe { sys::close(self.handle.as_ptr()) }
    }
}

pub(crate) fn cstr_to_string(pointer: *const c_char) -> String {
    if pointer.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(pointer) }
        .to_string_lossy()
        .into_owned()
}

extern "C" {
    fn free(pointer: *mut c_void);
}

unsafe extern "C" fn c_free_tokens(words: *mut JiebaWordRaw) {
    free(words.cast());
}

#[cfg(unix)]
mod sys {
    use std::ffi::CStr;
    use std::os::raw::{c_char, c_int, c_void};

    const RTLD_NOW: c_int = 2;

    #[cfg_attr(target_os = "linux", link(name = "dl"))]
    extern "C" {
        fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
        fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
        fn dlclose(handle: *mut c_void) -> c_int;
        fn dlerror() -> *const c_char;
    }

    pub(super) unsafe fn open(path: &CStr) -> *mut c_void {
        dlopen(path.as_ptr(), RTLD_NOW)
    }

    pub(super) unsafe fn symbol(handle: *mut c_void, name: &CStr) -> *mut c_void {
        dlsym(handle, name.as_ptr())
    }

    pub(super) unsafe fn close(handle: *mut c_void) {
        dlclose(handle);
    }

    /// Latest loader message, without the search list macOS appends.
    pub(super) fn last_error() -> String {
        let message = unsafe { dlerror() };
        if message.is_null() {
            return "no loader message".to_string();
        }
        let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
        match message.split_once(": tried:") {
            Some((head, _)) => head.to_string(),
            None => message.into_owned(),
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::ffi::CStr;
    use std::os::raw::{c_char, c_void};

    #[link(name = "kernel32")]
    extern "system" {
        fn LoadLibraryA(file_name: *const c_char) -> *mut c_void;
        fn GetProcAddress(module: *mut c_void, proc_name: *const c_char) -> *mut c_void;
        fn FreeLibrary(module: *mut c_void) -> i32;
        fn GetLastError() -> u32;
    }

    pub(super) unsafe fn open(path: &CStr) -> *mut c_void {
        LoadLibraryA(path.as_ptr())
    }

    pub(super) unsafe fn symbol(handle: *mut c_void, name: &CStr) -> *mut c_void {
        GetProcAddress(handle, name.as_ptr())
    }

    pub(super) unsafe fn close(handle: *mut c_void) {
        FreeLibrary(handle);
    }

    pub(super) fn last_error() -> String {
        format!("win32 error {}", unsafe { GetLastError() })
    }
}
