//! Environment variables and file names recognised by jieba-ffi.

/// Environment variable holding an explicit path to the jieba dynamic library.
pub const JIEBA_LIBRARY_PATH_ENV: &str = "JIEBA_LIBRARY_PATH";
/// Environment variable holding the directory that contains the five dictionaries.
pub const JIEBA_DICT_DIR_ENV: &str = "JIEBA_DICT_DIR";

/// Main dictionary file name.
pub const DEFAULT_DICT_FILE: &str = "jieba.dict.utf8";
/// HMM model file name.
pub const DEFAULT_HMM_FILE: &str = "hmm_model.utf8";
/// User dictionary file name.
pub const DEFAULT_USER_DICT_FILE: &str = "user.dict.utf8";
/// IDF weight file name.
pub const DEFAULT_IDF_FILE: &str = "idf.utf8";
/// Stop word list file name.
pub const DEFAULT_STOP_WORDS_FILE: &str = "stop_words.utf8";

/// Relative directory used when nothing else is configured or discovered.
pub const DEFAULT_DICT_DIR: &str = "dict";
