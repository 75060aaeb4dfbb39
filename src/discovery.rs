use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_DICT_DIR, JIEBA_DICT_DIR_ENV};

pub(crate) fn default_library_candidates() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["jieba.dll", "libjieba.dll"]
    }
    #[cfg(target_os = "macos")]
    {
        &[
            "libjieba.dylib",
            "jieba.dylib",
            "/usr/local/lib/libjieba.dylib",
            "/opt/homebrew/lib/libjieba.dylib",
            "@rpath/libjieba.dylib",
            "@loader_path/libjieba.dylib",
        ]
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        &[
            "libjieba.so",
            "./libjieba.so",
            "/usr/local/lib/libjieba.so",
            "/usr/lib/libjieba.so",
        ]
    }
}

pub(crate) fn discover_default_library_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let (base, file_name) = (env::var_os("LOCALAPPDATA"), "jieba.dll");
    #[cfg(target_os = "macos")]
    let (base, file_name) = (
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".local")),
        "libjieba.dylib",
    );
    #[cfg(all(unix, not(target_os = "macos")))]
    let (base, file_name) = (
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".local")),
        "libjieba.so",
    );

    let path = PathBuf::from(base?).join("jieba").join("lib").join(file_name);
    path.exists().then_some(path)
}

/// Directory holding the five dictionaries when none is configured.
///
/// `JIEBA_DICT_DIR` wins, then the first existing well-known location,
/// then the relative `dict` directory.
pub(crate) fn discover_default_dict_dir() -> PathBuf {
    if let Some(path) = env::var_os(JIEBA_DICT_DIR_ENV) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    let candidates: &[&str] = &["C:\\jieba\\dict", "C:\\Program Files\\cppjieba\\dict"];

    #[cfg(not(target_os = "windows"))]
    let candidates: &[&str] = &[
        "~/.local/jieba/dict",
        "/usr/local/share/cppjieba/dict",
        "/usr/share/cppjieba/dict",
    ];

    for candidate in candidates {
        let path = if let Some(stripped) = candidate.strip_prefix("~/") {
            match env::var_os("HOME") {
                Some(home) => PathBuf::from(home).join(stripped),
                None => continue,
            }
        } else {
            PathBuf::from(candidate)
        };
        if path.is_dir() {
            return path;
        }
    }

    PathBuf::from(DEFAULT_DICT_DIR)
}
