use std::env;
use std::fmt;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};

use crate::config::{JiebaTokenizeMode, JIEBA_DEFAULT_MODE, JIEBA_SEARCH_MODE};
use crate::constants::{
    DEFAULT_DICT_FILE, DEFAULT_HMM_FILE, DEFAULT_IDF_FILE, DEFAULT_STOP_WORDS_FILE,
    DEFAULT_USER_DICT_FILE, JIEBA_LIBRARY_PATH_ENV,
};
use crate::discovery::discover_default_dict_dir;
use crate::error::{JiebaError, Result};

/// Granularity used by [`crate::Jieba::tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizeMode {
    /// Non-overlapping dictionary segmentation.
    #[default]
    Default,
    /// Finer segmentation that also emits the shorter words inside long ones.
    Search,
}

impl TokenizeMode {
    pub(crate) fn as_raw(self) -> JiebaTokenizeMode {
        match self {
            TokenizeMode::Default => JIEBA_DEFAULT_MODE,
            TokenizeMode::Search => JIEBA_SEARCH_MODE,
        }
    }
}

/// Whether the HMM step resolves words missing from the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hmm {
    /// Run HMM disambiguation.
    #[default]
    Enabled,
    /// Rely on the dictionary alone.
    Disabled,
}

impl Hmm {
    pub(crate) fn as_raw(self) -> c_int {
        match self {
            Hmm::Enabled => 1,
            Hmm::Disabled => 0,
        }
    }
}

impl From<bool> for Hmm {
    fn from(enabled: bool) -> Self {
        if enabled {
            Hmm::Enabled
        } else {
            Hmm::Disabled
        }
    }
}

/// Identifies one of the five dictionary files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictKind {
    /// Main word/frequency/tag dictionary.
    Main,
    /// HMM model.
    Hmm,
    /// User dictionary.
    User,
    /// IDF weights used by keyword extraction.
    Idf,
    /// Stop words skipped by keyword extraction.
    StopWords,
}

impl fmt::Display for DictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DictKind::Main => "main",
            DictKind::Hmm => "hmm",
            DictKind::User => "user",
            DictKind::Idf => "idf",
            DictKind::StopWords => "stop words",
        };
        f.write_str(name)
    }
}

/// The five files the engine loads at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictPaths {
    /// Main dictionary.
    pub dict: PathBuf,
    /// HMM model.
    pub hmm: PathBuf,
    /// User dictionary.
    pub user_dict: PathBuf,
    /// IDF weights.
    pub idf: PathBuf,
    /// Stop words.
    pub stop_words: PathBuf,
}

impl Default for DictPaths {
    fn default() -> Self {
        Self::from_dir(discover_default_dict_dir())
    }
}

impl DictPaths {
    /// Uses the standard file names inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            dict: dir.join(DEFAULT_DICT_FILE),
            hmm: dir.join(DEFAULT_HMM_FILE),
            user_dict: dir.join(DEFAULT_USER_DICT_FILE),
            idf: dir.join(DEFAULT_IDF_FILE),
            stop_words: dir.join(DEFAULT_STOP_WORDS_FILE),
        }
    }

    /// Resolves positional overrides: none selects the defaults, five are
    /// taken as main, HMM, user, IDF and stop words in that order.
    pub fn resolve<P: AsRef<Path>>(overrides: &[P]) -> Result<Self> {
        match overrides {
            [] => Ok(Self::default()),
            [dict, hmm, user_dict, idf, stop_words] => Ok(Self {
                dict: dict.as_ref().to_path_buf(),
                hmm: hmm.as_ref().to_path_buf(),
                user_dict: user_dict.as_ref().to_path_buf(),
                idf: idf.as_ref().to_path_buf(),
                stop_words: stop_words.as_ref().to_path_buf(),
            }),
            other => Err(JiebaError::DictPathCount(other.len())),
        }
    }

    /// Overrides the main dictionary.
    pub fn with_dict(mut self, path: impl AsRef<Path>) -> Self {
        self.dict = path.as_ref().to_path_buf();
        self
    }

    /// Overrides the HMM model.
    pub fn with_hmm(mut self, path: impl AsRef<Path>) -> Self {
        self.hmm = path.as_ref().to_path_buf();
        self
    }

    /// Overrides the user dictionary.
    pub fn with_user_dict(mut self, path: impl AsRef<Path>) -> Self {
        self.user_dict = path.as_ref().to_path_buf();
        self
    }

    /// Overrides the IDF weights.
    pub fn with_idf(mut self, path: impl AsRef<Path>) -> Self {
        self.idf = path.as_ref().to_path_buf();
        self
    }

    /// Overrides the stop word list.
    pub fn with_stop_words(mut self, path: impl AsRef<Path>) -> Self {
        self.stop_words = path.as_ref().to_path_buf();
        self
    }

    /// Paths in the positional order expected by `NewJieba`.
    pub fn entries(&self) -> [(DictKind, &Path); 5] {
        [
            (DictKind::Main, self.dict.as_path()),
            (DictKind::Hmm, self.hmm.as_path()),
            (DictKind::User, self.user_dict.as_path()),
            (DictKind::Idf, self.idf.as_path()),
            (DictKind::StopWords, self.stop_words.as_path()),
        ]
    }

    /// Fails on the first path that is not an existing file.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in self.entries() {
            if !path.is_file() {
                return Err(JiebaError::MissingDictionary {
                    kind,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

/// Where to find the native library and its dictionaries.
#[derive(Debug, Clone)]
pub struct JiebaConfig {
    /// Explicit library path; `None` searches the usual locations.
    pub library_path: Option<PathBuf>,
    /// Dictionaries handed to the engine.
    pub dict_paths: DictPaths,
}

impl Default for JiebaConfig {
    fn default() -> Self {
        Self {
            library_path: env::var_os(JIEBA_LIBRARY_PATH_ENV).map(PathBuf::from),
            dict_paths: DictPaths::default(),
        }
    }
}

impl JiebaConfig {
    /// Loads the library from an explicit path.
    pub fn with_library_path(mut self, library_path: impl AsRef<Path>) -> Self {
        self.library_path = Some(library_path.as_ref().to_path_buf());
        self
    }

    /// Replaces all five dictionary paths.
    pub fn with_dict_paths(mut self, dict_paths: DictPaths) -> Self {
        self.dict_paths = dict_paths;
        self
    }

    /// Uses the standard file names inside `dir`.
    pub fn with_dict_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dict_paths = DictPaths::from_dir(dir);
        self
    }
}
