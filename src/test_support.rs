//! In-process stand-in for the native engine plus test helpers.
//!
//! The fake implements the same C entry points as `libjieba` with a small
//! forward-maximum-matching segmenter, and counts constructions and releases
//! per main-dictionary path so parallel tests never share counters.

use std::collections::{HashMap, HashSet};
use std::env;
use std::ffi::{CStr, CString, OsString};
use std::fs;
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;
use std::sync::{Arc, Barrier, Mutex, OnceLock, PoisonError, RwLock};

use tempfile::TempDir;

use crate::config::{JiebaHandle, JiebaTokenizeMode, JiebaWordRaw, JiebaWordWeightRaw};
use crate::native::JiebaApi;
use crate::runtime::JiebaLibrary;
use crate::types::DictPaths;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn set_env_var(key: &str, value: &str) {
    #[allow(unused_unsafe)]
    unsafe {
        env::set_var(key, value);
    }
}

fn remove_env_var(key: &str) {
    #[allow(unused_unsafe)]
    unsafe {
        env::remove_var(key);
    }
}

/// Runs a closure while holding a global environment lock and applying overrides.
pub(crate) fn with_env_vars<T>(overrides: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    let _guard = env_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let backups: Vec<(&str, Option<OsString>)> = overrides
        .iter()
        .map(|(key, _)| (*key, env::var_os(key)))
        .collect();

    for (key, value) in overrides {
        match value {
            Some(value) => set_env_var(key, value),
            None => remove_env_var(key),
        }
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (key, value) in backups.into_iter().rev() {
        match value {
            Some(value) => {
                #[allow(unused_unsafe)]
                unsafe {
                    env::set_var(key, value);
                }
            }
            None => remove_env_var(key),
        }
    }

    match result {
        Ok(result) => result,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

pub(crate) fn string_array<I, S>(words: I) -> *mut *mut c_char
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pointers: Vec<*mut c_char> = words
        .into_iter()
        .map(|word| {
            CString::new(word.as_ref())
                .expect("test words have no NUL")
                .into_raw()
        })
        .collect();
    pointers.push(ptr::null_mut());
    Box::into_raw(pointers.into_boxed_slice()) as *mut *mut c_char
}

pub(crate) unsafe extern "C" fn free_string_array(words: *mut *mut c_char) {
    if words.is_null() {
        return;
    }
    let mut len = 0usize;
    while !(*words.add(len)).is_null() {
        drop(CString::from_raw(*words.add(len)));
        len += 1;
    }
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(words, len + 1)));
}

pub(crate) fn weight_array<'a>(
    pairs: impl IntoIterator<Item = (&'a str, f64)>,
) -> *mut JiebaWordWeightRaw {
    let mut records: Vec<JiebaWordWeightRaw> = pairs
        .into_iter()
        .map(|(word, weight)| JiebaWordWeightRaw {
            word: CString::new(word)
                .expect("test words have no NUL")
                .into_raw(),
            weight,
        })
        .collect();
    records.push(JiebaWordWeightRaw {
        word: ptr::null_mut(),
        weight: 0.0,
    });
    Box::into_raw(records.into_boxed_slice()) as *mut JiebaWordWeightRaw
}

pub(crate) unsafe extern "C" fn free_weight_array(pairs: *mut JiebaWordWeightRaw) {
    if pairs.is_null() {
        return;
    }
    let mut len = 0usize;
    while !(*pairs.add(len)).word.is_null() {
        drop(CString::from_raw((*pairs.add(len)).word));
        len += 1;
    }
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(pairs, len + 1)));
}

/// Builds a `Tokenize`-style array from `(offset, len)` byte spans.
pub(crate) fn token_array(
    spans: impl IntoIterator<Item = (usize, usize)>,
) -> *mut JiebaWordRaw {
    let mut records: Vec<JiebaWordRaw> = spans
        .into_iter()
        .map(|(offset, len)| JiebaWordRaw { offset, len })
        .collect();
    records.push(JiebaWordRaw::default());
    Box::into_raw(records.into_boxed_slice()) as *mut JiebaWordRaw
}

pub(crate) unsafe extern "C" fn free_token_array(words: *mut JiebaWordRaw) {
    if words.is_null() {
        return;
    }
    let mut len = 0usize;
    while (*words.add(len)).len != 0 {
        len += 1;
    }
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(words, len + 1)));
}

/// Number of `NewJieba` and `FreeJieba` calls seen for one main dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EngineCounts {
    pub(crate) created: usize,
    pub(crate) released: usize,
}

fn registry() -> &'static Mutex<HashMap<String, EngineCounts>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, EngineCounts>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn record(key: &str, update: impl FnOnce(&mut EngineCounts)) {
    let mut counts = registry().lock().unwrap_or_else(PoisonError::into_inner);
    update(counts.entry(key.to_string()).or_default());
}

pub(crate) fn engine_counts(dict: &Path) -> EngineCounts {
    let key = dict.to_string_lossy();
    registry()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key.as_ref())
        .copied()
        .unwrap_or_default()
}

/// Holds the next `Cut` call of one engine inside the native call.
///
/// The call waits on `entered` once it is running and on `resume` before it
/// touches the engine, so a test can act while a query is in flight.
pub(crate) struct CutGate {
    pub(crate) entered: Barrier,
    pub(crate) resume: Barrier,
}

fn gates() -> &'static Mutex<HashMap<String, Arc<CutGate>>> {
    static GATES: OnceLock<Mutex<HashMap<String, Arc<CutGate>>>> = OnceLock::new();
    GATES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn take_gate(key: &str) -> Option<Arc<CutGate>> {
    gates()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(key)
}

const MAX_WORD_CHARS: usize = 8;
const UNKNOWN_IDF: f64 = 12.0;

struct FakeEngine {
    key: String,
    words: RwLock<HashMap<String, String>>,
    idf: HashMap<String, f64>,
    stop_words: HashSet<String>,
}

impl FakeEngine {
    fn load(paths: [String; 5]) -> Option<Self> {
        let [dict, _hmm, user_dict, idf, stop_words] = paths;
        let mut words = HashMap::new();
        for path in [&dict, &user_dict] {
            for line in fs::read_to_string(path).ok()?.lines() {
                let mut fields = line.split_whitespace();
                let Some(word) = fields.next() else {
                    continue;
                };
                if word == "MALFORMED" {
                    return None;
                }
                let tag = fields.nth(1).unwrap_or("x");
                words.insert(word.to_string(), tag.to_string());
            }
        }

        let idf = fs::read_to_string(&idf)
            .ok()?
            .lines()
            .filter_map(|line| {
                let (word, value) = line.split_once(' ')?;
                Some((word.to_string(), value.trim().parse().ok()?))
            })
            .collect();
        let stop_words = fs::read_to_string(&stop_words)
            .ok()?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        Some(Self {
            key: dict,
            words: RwLock::new(words),
            idf,
            stop_words,
        })
    }

    fn contains(&self, word: &str) -> bool {
        self.words
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(word)
    }

    fn tag_of(&self, word: &str) -> String {
        if let Some(tag) = self
            .words
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(word)
        {
            return tag.clone();
        }
        if word.chars().all(|ch| ch.is_ascii_digit()) {
            "m".to_string()
        } else if word.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            "eng".to_string()
        } else {
            "x".to_string()
        }
    }

    /// Forward maximum matching; with HMM on, runs of unknown letters merge.
    fn cut(&self, text: &str, hmm: bool) -> Vec<(usize, usize)> {
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(index, _)| index)
            .chain(std::iter::once(text.len()))
            .collect();
        let chars = bounds.len() - 1;

        let mut spans = Vec::new();
        let mut unknown_run: Option<usize> = None;
        let mut index = 0usize;
        while index < chars {
            let longest = (2..=MAX_WORD_CHARS.min(chars - index))
                .rev()
                .find(|&len| self.contains(&text[bounds[index]..bounds[index + len]]));
            let len = longest.unwrap_or(1);
            let start = bounds[index];
            let end = bounds[index + len];
            let single = &text[start..end];
            let mergeable = hmm
                && len == 1
                && !self.contains(single)
                && single.chars().all(char::is_alphanumeric);

            match (mergeable, unknown_run) {
                (true, None) => unknown_run = Some(start),
                (true, Some(_)) => {}
                (false, run) => {
                    if let Some(run_start) = run {
                        spans.push((run_start, start));
                        unknown_run = None;
                    }
                    spans.push((start, end));
                }
            }
            index += len;
        }
        if let Some(run_start) = unknown_run {
            spans.push((run_start, text.len()));
        }
        spans
    }

    fn cut_all(&self, text: &str) -> Vec<(usize, usize)> {
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(index, _)| index)
            .chain(std::iter::once(text.len()))
            .collect();
        let chars = bounds.len() - 1;

        let mut spans = Vec::new();
        let mut covered_until = 0usize;
        for index in 0..chars {
            let mut found = false;
            for len in 2..=MAX_WORD_CHARS.min(chars - index) {
                let (start, end) = (bounds[index], bounds[index + len]);
                if self.contains(&text[start..end]) {
                    spans.push((start, end));
                    covered_until = covered_until.max(end);
                    found = true;
                }
            }
            if !found && bounds[index] >= covered_until {
                spans.push((bounds[index], bounds[index + 1]));
            }
        }
        spans
    }

    /// Each segment plus the dictionary words of two and three characters inside it.
    fn cut_for_search(&self, text: &str, hmm: bool) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        for (start, end) in self.cut(text, hmm) {
            let segment = &text[start..end];
            let bounds: Vec<usize> = segment
                .char_indices()
                .map(|(index, _)| start + index)
                .chain(std::iter::once(end))
                .collect();
            let chars = bounds.len() - 1;
            let mut group = vec![(start, end)];
            if chars > 2 {
                for len in 2..=3usize.min(chars - 1) {
                    for index in 0..=(chars - len) {
                        let (sub_start, sub_end) = (bounds[index], bounds[index + len]);
                        if self.contains(&text[sub_start..sub_end]) {
                            group.push((sub_start, sub_end));
                        }
                    }
                }
            }
            group.sort_unstable();
            spans.extend(group);
        }
        spans
    }

    fn keywords(&self, text: &str, top_k: usize) -> Vec<(String, f64)> {
        let mut frequency: HashMap<&str, f64> = HashMap::new();
        for (start, end) in self.cut(text, true) {
            let word = &text[start..end];
            if word.chars().count() < 2 || self.stop_words.contains(word) {
                continue;
            }
            *frequency.entry(word).or_default() += 1.0;
        }
        let mut scored: Vec<(String, f64)> = frequency
            .into_iter()
            .map(|(word, count)| {
                let idf = self.idf.get(word).copied().unwrap_or(UNKNOWN_IDF);
                (word.to_string(), count * idf)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k);
        scored
    }
}

unsafe fn engine<'a>(handle: JiebaHandle) -> &'a FakeEngine {
    &*(handle as *const FakeEngine)
}

unsafe fn input<'a>(sentence: *const c_char) -> std::borrow::Cow<'a, str> {
    CStr::from_ptr(sentence).to_string_lossy()
}

fn slices<'a>(text: &'a str, spans: &[(usize, usize)]) -> Vec<&'a str> {
    spans.iter().map(|&(start, end)| &text[start..end]).collect()
}

unsafe extern "C" fn fake_new_jieba(
    dict: *const c_char,
    hmm: *const c_char,
    user_dict: *const c_char,
    idf: *const c_char,
    stop_words: *const c_char,
) -> JiebaHandle {
    let paths = [dict, hmm, user_dict, idf, stop_words].map(|path| input(path).into_owned());
    record(&paths[0], |counts| counts.created += 1);
    match FakeEngine::load(paths) {
        Some(engine) => Box::into_raw(Box::new(engine)).cast::<c_void>(),
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn fake_free_jieba(handle: JiebaHandle) {
    let engine = Box::from_raw(handle.cast::<FakeEngine>());
    record(&engine.key, |counts| counts.released += 1);
}

unsafe extern "C" fn fake_cut(
    handle: JiebaHandle,
    sentence: *const c_char,
    is_hmm_used: c_int,
) -> *mut *mut c_char {
    let text = input(sentence);
    let engine = engine(handle);
    if let Some(gate) = take_gate(&engine.key) {
        gate.entered.wait();
        gate.resume.wait();
    }
    let spans = engine.cut(&text, is_hmm_used != 0);
    string_array(slices(&text, &spans))
}

unsafe extern "C" fn fake_cut_all(handle: JiebaHandle, sentence: *const c_char) -> *mut *mut c_char {
    let text = input(sentence);
    let spans = engine(handle).cut_all(&text);
    string_array(slices(&text, &spans))
}

unsafe extern "C" fn fake_cut_for_search(
    handle: JiebaHandle,
    sentence: *const c_char,
    is_hmm_used: c_int,
) -> *mut *mut c_char {
    let text = input(sentence);
    let spans = engine(handle).cut_for_search(&text, is_hmm_used != 0);
    string_array(slices(&text, &spans))
}

unsafe extern "C" fn fake_tag(handle: JiebaHandle, sentence: *const c_char) -> *mut *mut c_char {
    let text = input(sentence);
    let engine = engine(handle);
    let spans = engine.cut(&text, true);
    string_array(
        slices(&text, &spans)
            .into_iter()
            .map(|word| format!("{word}/{}", engine.tag_of(word))),
    )
}

unsafe extern "C" fn fake_add_word(handle: JiebaHandle, word: *const c_char) {
    engine(handle)
        .words
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(input(word).into_owned(), "x".to_string());
}

unsafe extern "C" fn fake_add_word_ex(
    handle: JiebaHandle,
    word: *const c_char,
    _freq: c_int,
    tag: *const c_char,
) {
    engine(handle)
        .words
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(input(word).into_owned(), input(tag).into_owned());
}

unsafe extern "C" fn fake_remove_word(handle: JiebaHandle, word: *const c_char) {
    engine(handle)
        .words
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(input(word).as_ref());
}

unsafe extern "C" fn fake_tokenize(
    handle: JiebaHandle,
    sentence: *const c_char,
    mode: JiebaTokenizeMode,
    is_hmm_used: c_int,
) -> *mut JiebaWordRaw {
    let text = input(sentence);
    let engine = engine(handle);
    let spans = if mode == crate::config::JIEBA_SEARCH_MODE {
        engine.cut_for_search(&text, is_hmm_used != 0)
    } else {
        engine.cut(&text, is_hmm_used != 0)
    };
    token_array(spans.into_iter().map(|(start, end)| (start, end - start)))
}

unsafe extern "C" fn fake_extract(
    handle: JiebaHandle,
    sentence: *const c_char,
    top_k: c_int,
) -> *mut *mut c_char {
    let text = input(sentence);
    let keywords = engine(handle).keywords(&text, usize::try_from(top_k).unwrap_or(0));
    string_array(keywords.into_iter().map(|(word, _)| word))
}

unsafe extern "C" fn fake_extract_with_weight(
    handle: JiebaHandle,
    sentence: *const c_char,
    top_k: c_int,
) -> *mut JiebaWordWeightRaw {
    let text = input(sentence);
    let keywords = engine(handle).keywords(&text, usize::try_from(top_k).unwrap_or(0));
    weight_array(
        keywords
            .iter()
            .map(|(word, weight)| (word.as_str(), *weight)),
    )
}

pub(crate) fn fake_api() -> JiebaApi {
    JiebaApi {
        new_jieba: fake_new_jieba,
        free_jieba: fake_free_jieba,
        cut: fake_cut,
        cut_all: fake_cut_all,
        cut_for_search: fake_cut_for_search,
        tag: fake_tag,
        add_word: fake_add_word,
        add_word_ex: fake_add_word_ex,
        remove_word: fake_remove_word,
        tokenize: fake_tokenize,
        extract: fake_extract,
        extract_with_weight: fake_extract_with_weight,
        free_words: free_string_array,
        free_word_weights: free_weight_array,
        free_tokens: free_token_array,
    }
}

pub(crate) fn fake_library() -> JiebaLibrary {
    JiebaLibrary::from_api(fake_api())
}

const MAIN_DICT: &str = "\
我 1000 r
来到 500 v
北京 800 ns
清华 300 nr
清华大学 400 nt
华大 10 j
大学 600 n
他 1000 r
了 1000 ul
网易 100 nz
大厦 300 n
小明 100 nr
硕士 100 n
毕业 100 n
于 100 p
中国 900 ns
科学 300 n
科学院 200 nt
中国科学院 100 nt
学院 300 n
计算 200 v
计算所 50 n
后 100 f
在 1000 p
日本 300 ns
京都 100 ns
京都大学 50 nt
深造 50 v
";

const IDF: &str = "\
清华大学 11.7
北京 4.2
来到 3.5
大学 2.1
中国科学院 10.9
计算所 9.8
深造 8.7
京都大学 9.5
";

const STOP_WORDS: &str = "的\n了\n在\n";

/// Five dictionary files in a private temporary directory.
pub(crate) struct DictFixture {
    _dir: TempDir,
    pub(crate) paths: DictPaths,
}

impl DictFixture {
    pub(crate) fn new() -> Self {
        Self::with_main_dict(MAIN_DICT)
    }

    pub(crate) fn with_main_dict(main_dict: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create dictionary dir");
        let paths = DictPaths::from_dir(dir.path());
        fs::write(&paths.dict, main_dict).expect("failed to write main dict");
        fs::write(&paths.hmm, "# fake hmm model\n").expect("failed to write hmm model");
        fs::write(&paths.user_dict, "杭研 nz\n").expect("failed to write user dict");
        fs::write(&paths.idf, IDF).expect("failed to write idf");
        fs::write(&paths.stop_words, STOP_WORDS).expect("failed to write stop words");
        Self { _dir: dir, paths }
    }

    pub(crate) fn counts(&self) -> EngineCounts {
        engine_counts(&self.paths.dict)
    }

    /// Makes the next `Cut` on this fixture's engine block until released.
    pub(crate) fn gate_next_cut(&self) -> Arc<CutGate> {
        let gate = Arc::new(CutGate {
            entered: Barrier::new(2),
            resume: Barrier::new(2),
        });
        gates()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.paths.dict.to_string_lossy().into_owned(), gate.clone());
        gate
    }
}
