use std::env;
use std::ffi::CString;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::config::JiebaHandle;
use crate::constants::JIEBA_LIBRARY_PATH_ENV;
use crate::convert::{self, NativeArray};
use crate::discovery::{default_library_candidates, discover_default_library_path};
use crate::error::{JiebaError, Result};
use crate::model::{Tag, Word, WordWeight};
use crate::native::{DynamicLibrary, JiebaApi, LoadedLibrary};
use crate::types::{DictPaths, Hmm, JiebaConfig, TokenizeMode};

static SHARED: SharedSlot = SharedSlot::new();

/// Handle to a loaded jieba dynamic library plus resolved function table.
///
/// Useful when the library location is decided by the application rather
/// than by `JIEBA_LIBRARY_PATH` or the platform search.
#[derive(Clone)]
pub struct JiebaLibrary {
    inner: Arc<LoadedLibrary>,
}

impl JiebaLibrary {
    /// Loads a jieba dynamic library from an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let library = DynamicLibrary::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "loaded jieba library");
        Self::from_library(library)
    }

    /// Loads jieba from common platform-specific locations and caches it.
    pub fn load_default() -> Result<Self> {
        static DEFAULT_LIBRARY: Mutex<Option<Arc<LoadedLibrary>>> = Mutex::new(None);

        let mut guard = DEFAULT_LIBRARY.lock().map_err(|_| {
            JiebaError::LibraryLoad("failed to lock default library cache".to_string())
        })?;

        if let Some(inner) = guard.as_ref() {
            return Ok(Self {
                inner: inner.clone(),
            });
        }

        let inner = Self::load_default_internal()?.inner;
        *guard = Some(inner.clone());
        Ok(Self { inner })
    }

    fn load_default_internal() -> Result<Self> {
        let mut errors = Vec::new();

        if let Some(path) = discover_default_library_path() {
            match Self::load(&path) {
                Ok(loaded) => return Ok(loaded),
                Err(error) => errors.push(format!("{}: {}", path.display(), error)),
            }
        }

        for candidate in default_library_candidates() {
            match Self::load(candidate) {
                Ok(loaded) => return Ok(loaded),
                Err(error) => errors.push(format!("{candidate}: {error}")),
            }
        }

        Err(JiebaError::LibraryLoad(format!(
            "set {JIEBA_LIBRARY_PATH_ENV} to the dynamic library path. tried: {}",
            errors.join(" | ")
        )))
    }

    /// Loads from `JIEBA_LIBRARY_PATH` if set, otherwise falls back to
    /// [`Self::load_default`].
    pub fn load_from_env_or_default() -> Result<Self> {
        if let Some(path) = env::var_os(JIEBA_LIBRARY_PATH_ENV) {
            return Self::load(PathBuf::from(path));
        }
        Self::load_default()
    }

    /// Constructs an engine from five dictionary files.
    ///
    /// Every path is checked before the native initializer runs, so a
    /// missing file never reaches `NewJieba`.
    pub fn jieba(&self, dict_paths: &DictPaths) -> Result<Jieba> {
        dict_paths.validate()?;

        let dict = path_to_cstring(&dict_paths.dict)?;
        let hmm = path_to_cstring(&dict_paths.hmm)?;
        let user_dict = path_to_cstring(&dict_paths.user_dict)?;
        let idf = path_to_cstring(&dict_paths.idf)?;
        let stop_words = path_to_cstring(&dict_paths.stop_words)?;

        let handle = unsafe {
            (self.inner.api.new_jieba)(
                dict.as_ptr(),
                hmm.as_ptr(),
                user_dict.as_ptr(),
                idf.as_ptr(),
                stop_words.as_ptr(),
            )
        };
        if handle.is_null() {
            warn!(dict = %dict_paths.dict.display(), "NewJieba returned a null handle");
            return Err(JiebaError::Construction(format!(
                "NewJieba rejected the dictionaries (main: {})",
                dict_paths.dict.display()
            )));
        }
        debug!(dict = %dict_paths.dict.display(), "constructed jieba engine");

        Ok(Jieba {
            inner: self.inner.clone(),
            handle: RwLock::new(handle),
            freed: AtomicBool::new(false),
            release_on_drop: true,
            dict_paths: dict_paths.clone(),
        })
    }

    fn from_library(library: DynamicLibrary) -> Result<Self> {
        let api = unsafe { JiebaApi::load(&library)? };
        Ok(Self {
            inner: Arc::new(LoadedLibrary {
                _library: Some(library),
                api,
            }),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_api(api: JiebaApi) -> Self {
        Self {
            inner: Arc::new(LoadedLibrary {
                _library: None,
                api,
            }),
        }
    }
}

/// One native segmentation engine.
///
/// The engine is released by [`Jieba::free`] or when the value is dropped,
/// whichever comes first; later calls report [`JiebaError::Freed`].
///
/// Queries may run concurrently from any number of threads. Dictionary
/// mutations and `free` wait for in-flight queries to finish.
pub struct Jieba {
    inner: Arc<LoadedLibrary>,
    /// Null once released.
    handle: RwLock<JiebaHandle>,
    freed: AtomicBool,
    release_on_drop: bool,
    dict_paths: DictPaths,
}

// The engine's query entry points are reentrant, and every access to the
// raw handle goes through the lock.
unsafe impl Send for Jieba {}
unsafe impl Sync for Jieba {}

impl Jieba {
    /// Constructs an engine from the default dictionaries and library.
    pub fn new() -> Result<Self> {
        Self::from_config(JiebaConfig::default())
    }

    /// Constructs an engine from zero or five positional dictionary paths
    /// (main, HMM, user, IDF, stop words).
    pub fn with_dict_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let dict_paths = DictPaths::resolve(paths)?;
        Self::from_config(JiebaConfig::default().with_dict_paths(dict_paths))
    }

    /// Constructs an engine from explicit configuration.
    pub fn from_config(config: JiebaConfig) -> Result<Self> {
        // Bad paths are reported even when no library is installed.
        config.dict_paths.validate()?;

        // `JiebaConfig::default` already consulted `JIEBA_LIBRARY_PATH`.
        let library = match config.library_path {
            Some(path) => JiebaLibrary::load(path)?,
            None => JiebaLibrary::load_default()?,
        };
        library.jieba(&config.dict_paths)
    }

    /// Returns the process-wide shared engine, constructing it on first use.
    pub fn shared() -> Result<SharedJieba> {
        SharedJieba::get()
    }

    /// Dictionaries this engine was built from.
    pub fn dict_paths(&self) -> &DictPaths {
        &self.dict_paths
    }

    /// Whether [`Self::free`] has run.
    pub fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    /// Releases the native engine.
    ///
    /// Only the first call releases; later and concurrent calls return
    /// without touching the engine. A call made while queries are running
    /// waits for them to finish.
    pub fn free(&self) {
        if self
            .freed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let mut handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        if handle.is_null() {
            return;
        }
        unsafe {
            (self.inner.api.free_jieba)(*handle);
        }
        *handle = ptr::null_mut();
        debug!(dict = %self.dict_paths.dict.display(), "released jieba engine");
    }

    /// Segments `text` into non-overlapping words.
    pub fn cut(&self, text: &str, hmm: Hmm) -> Result<Vec<String>> {
        let handle = self.live("cut")?;
        let text_c = CString::new(text)?;
        let array = unsafe {
            NativeArray::new(
                (self.inner.api.cut)(*handle, text_c.as_ptr(), hmm.as_raw()),
                self.inner.api.free_words,
            )
        };
        Ok(convert::strings(array))
    }

    /// Emits every dictionary word found in `text`, overlaps included.
    pub fn cut_all(&self, text: &str) -> Result<Vec<String>> {
        let handle = self.live("cut_all")?;
        let text_c = CString::new(text)?;
        let array = unsafe {
            NativeArray::new(
                (self.inner.api.cut_all)(*handle, text_c.as_ptr()),
                self.inner.api.free_words,
            )
        };
        Ok(convert::strings(array))
    }

    /// Like [`Self::cut`], additionally splitting long words for search indexing.
    pub fn cut_for_search(&self, text: &str, hmm: Hmm) -> Result<Vec<String>> {
        let handle = self.live("cut_for_search")?;
        let text_c = CString::new(text)?;
        let array = unsafe {
            NativeArray::new(
                (self.inner.api.cut_for_search)(*handle, text_c.as_ptr(), hmm.as_raw()),
                self.inner.api.free_words,
            )
        };
        Ok(convert::strings(array))
    }

    /// Segments `text` and tags each word with its part of speech.
    pub fn tag(&self, text: &str) -> Result<Vec<Tag>> {
        let handle = self.live("tag")?;
        let text_c = CString::new(text)?;
        let array = unsafe {
            NativeArray::new(
                (self.inner.api.tag)(*handle, text_c.as_ptr()),
                self.inner.api.free_words,
            )
        };
        Ok(convert::tags(array))
    }

    /// Segments `text` and reports each word's byte span.
    pub fn tokenize(&self, text: &str, mode: TokenizeMode, hmm: Hmm) -> Result<Vec<Word>> {
        let handle = self.live("tokenize")?;
        let text_c = CString::new(text)?;
        let array = unsafe {
            NativeArray::new(
                (self.inner.api.tokenize)(*handle, text_c.as_ptr(), mode.as_raw(), hmm.as_raw()),
                self.inner.api.free_tokens,
            )
        };
        convert::words(text, array)
    }

    /// Returns up to `top_k` keywords ranked by TF-IDF.
    pub fn extract_keywords(&self, text: &str, top_k: usize) -> Result<Vec<String>> {
        let handle = self.live("extract_keywords")?;
        let top_k = to_c_int(top_k, "top_k")?;
        let text_c = CString::new(text)?;
        let array = unsafe {
            NativeArray::new(
                (self.inner.api.extract)(*handle, text_c.as_ptr(), top_k),
                self.inner.api.free_words,
            )
        };
        Ok(convert::strings(array))
    }

    /// Returns up to `top_k` keywords with their weights, heaviest first.
    pub fn extract_keywords_weighted(&self, text: &str, top_k: usize) -> Result<Vec<WordWeight>> {
        let handle = self.live("extract_keywords_weighted")?;
        let top_k = to_c_int(top_k, "top_k")?;
        let text_c = CString::new(text)?;
        let array = unsafe {
            NativeArray::new(
                (self.inner.api.extract_with_weight)(*handle, text_c.as_ptr(), top_k),
                self.inner.api.free_word_weights,
            )
        };
        Ok(convert::word_weights(array))
    }

    /// Adds `word` to the in-memory dictionary. Dictionary files are untouched.
    pub fn add_word(&self, word: &str) -> Result<()> {
        let handle = self.live_mut("add_word")?;
        let word_c = CString::new(word)?;
        unsafe {
            (self.inner.api.add_word)(*handle, word_c.as_ptr());
        }
        Ok(())
    }

    /// Adds `word` with an explicit frequency and part-of-speech tag.
    pub fn add_word_with_frequency(&self, word: &str, frequency: usize, tag: &str) -> Result<()> {
        let handle = self.live_mut("add_word_with_frequency")?;
        let frequency = to_c_int(frequency, "frequency")?;
        let word_c = CString::new(word)?;
        let tag_c = CString::new(tag)?;
        unsafe {
            (self.inner.api.add_word_ex)(*handle, word_c.as_ptr(), frequency, tag_c.as_ptr());
        }
        Ok(())
    }

    /// Removes `word` from the in-memory dictionary.
    pub fn remove_word(&self, word: &str) -> Result<()> {
        let handle = self.live_mut("remove_word")?;
        let word_c = CString::new(word)?;
        unsafe {
            (self.inner.api.remove_word)(*handle, word_c.as_ptr());
        }
        Ok(())
    }

    fn live(&self, operation: &'static str) -> Result<RwLockReadGuard<'_, JiebaHandle>> {
        if self.is_freed() {
            return Err(JiebaError::Freed { operation });
        }
        let handle = self.handle.read().unwrap_or_else(PoisonError::into_inner);
        if handle.is_null() {
            return Err(JiebaError::Freed { operation });
        }
        Ok(handle)
    }

    fn live_mut(&self, operation: &'static str) -> Result<RwLockWriteGuard<'_, JiebaHandle>> {
        if self.is_freed() {
            return Err(JiebaError::Freed { operation });
        }
        let handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        if handle.is_null() {
            return Err(JiebaError::Freed { operation });
        }
        Ok(handle)
    }

    fn into_persistent(mut self) -> Self {
        self.release_on_drop = false;
        self
    }
}

impl Drop for Jieba {
    fn drop(&mut self) {
        if self.release_on_drop {
            self.free();
        }
    }
}

/// The process-wide engine returned by [`Jieba::shared`].
///
/// Cloning is cheap and every clone refers to the same engine. There is no
/// way to free it:
///
/// ```compile_fail
/// let shared = jieba_ffi::Jieba::shared().unwrap();
/// shared.free();
/// ```
#[derive(Clone)]
pub struct SharedJieba {
    inner: Arc<Jieba>,
}

impl SharedJieba {
    /// Returns the shared engine, constructing it from the default
    /// configuration on first use.
    pub fn get() -> Result<Self> {
        SHARED.get_or_init(Jieba::new)
    }

    /// Like [`Self::get`], using `config` if this call performs the
    /// construction. Once the engine exists `config` is ignored.
    pub fn get_with(config: JiebaConfig) -> Result<Self> {
        SHARED.get_or_init(|| Jieba::from_config(config))
    }

    /// Whether both values refer to the same engine.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// See [`Jieba::dict_paths`].
    pub fn dict_paths(&self) -> &DictPaths {
        self.inner.dict_paths()
    }

    /// See [`Jieba::cut`].
    pub fn cut(&self, text: &str, hmm: Hmm) -> Result<Vec<String>> {
        self.with_live(|jieba| jieba.cut(text, hmm))
    }

    /// See [`Jieba::cut_all`].
    pub fn cut_all(&self, text: &str) -> Result<Vec<String>> {
        self.with_live(|jieba| jieba.cut_all(text))
    }

    /// See [`Jieba::cut_for_search`].
    pub fn cut_for_search(&self, text: &str, hmm: Hmm) -> Result<Vec<String>> {
        self.with_live(|jieba| jieba.cut_for_search(text, hmm))
    }

    /// See [`Jieba::tag`].
    pub fn tag(&self, text: &str) -> Result<Vec<Tag>> {
        self.with_live(|jieba| jieba.tag(text))
    }

    /// See [`Jieba::tokenize`].
    pub fn tokenize(&self, text: &str, mode: TokenizeMode, hmm: Hmm) -> Result<Vec<Word>> {
        self.with_live(|jieba| jieba.tokenize(text, mode, hmm))
    }

    /// See [`Jieba::extract_keywords`].
    pub fn extract_keywords(&self, text: &str, top_k: usize) -> Result<Vec<String>> {
        self.with_live(|jieba| jieba.extract_keywords(text, top_k))
    }

    /// See [`Jieba::extract_keywords_weighted`].
    pub fn extract_keywords_weighted(&self, text: &str, top_k: usize) -> Result<Vec<WordWeight>> {
        self.with_live(|jieba| jieba.extract_keywords_weighted(text, top_k))
    }

    /// See [`Jieba::add_word`]. Visible to every holder of the shared engine.
    pub fn add_word(&self, word: &str) -> Result<()> {
        self.with_live(|jieba| jieba.add_word(word))
    }

    /// See [`Jieba::add_word_with_frequency`].
    pub fn add_word_with_frequency(&self, word: &str, frequency: usize, tag: &str) -> Result<()> {
        self.with_live(|jieba| jieba.add_word_with_frequency(word, frequency, tag))
    }

    /// See [`Jieba::remove_word`].
    pub fn remove_word(&self, word: &str) -> Result<()> {
        self.with_live(|jieba| jieba.remove_word(word))
    }

    /// Runs `operation` on the engine, reporting any freed state as
    /// [`JiebaError::SharedFreed`] whichever check observes it.
    fn with_live<T>(&self, operation: impl FnOnce(&Jieba) -> Result<T>) -> Result<T> {
        ensure_shared_live(&self.inner)?;
        operation(&self.inner).map_err(|error| match error {
            JiebaError::Freed { operation } => {
                warn!(operation, "shared jieba engine was freed during the call");
                JiebaError::SharedFreed
            }
            other => other,
        })
    }
}

/// Storage for a lazily constructed, never released engine.
pub(crate) struct SharedSlot {
    instance: OnceLock<Arc<Jieba>>,
    init: Mutex<()>,
}

impl SharedSlot {
    pub(crate) const fn new() -> Self {
        Self {
            instance: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Runs `create` at most once per successful construction. Callers that
    /// race the first construction block until it finishes. A failed
    /// construction leaves the slot empty for the next caller.
    pub(crate) fn get_or_init(
        &self,
        create: impl FnOnce() -> Result<Jieba>,
    ) -> Result<SharedJieba> {
        let instance = match self.instance.get() {
            Some(instance) => instance,
            None => {
                let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
                match self.instance.get() {
                    Some(instance) => instance,
                    None => {
                        let jieba = create()?.into_persistent();
                        debug!(
                            dict = %jieba.dict_paths.dict.display(),
                            "constructed shared jieba engine"
                        );
                        self.instance.get_or_init(|| Arc::new(jieba))
                    }
                }
            }
        };

        ensure_shared_live(instance)?;
        Ok(SharedJieba {
            inner: instance.clone(),
        })
    }
}

fn ensure_shared_live(jieba: &Jieba) -> Result<()> {
    let handle = jieba.handle.read().unwrap_or_else(PoisonError::into_inner);
    if jieba.is_freed() || handle.is_null() {
        warn!("shared jieba engine was used after being freed");
        return Err(JiebaError::SharedFreed);
    }
    Ok(())
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    Ok(CString::new(path.to_string_lossy().to_string())?)
}

fn to_c_int(value: usize, name: &str) -> Result<c_int> {
    c_int::try_from(value).map_err(|_| {
        JiebaError::InvalidArgument(format!("{name} must be <= {}", c_int::MAX))
    })
}
