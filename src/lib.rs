#![deny(missing_docs)]

//! Rust bindings for the cppjieba Chinese word segmentation C API.
//!
//! The native engine lives in a dynamic library (`libjieba`) built from the
//! cppjieba C wrapper and is loaded at runtime. This crate owns the engine's
//! lifecycle: construction from five validated dictionary files, a release
//! that happens exactly once, and a freed-state guard on every call.
//!
//! ## Quick Start
//! ```no_run
//! use jieba_ffi::{Hmm, Jieba};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let jieba = Jieba::new()?;
//!     let words = jieba.cut("我来到北京清华大学", Hmm::Enabled)?;
//!     println!("{}", words.join("/"));
//!     Ok(())
//! }
//! ```
//!
//! ## Owned And Shared Engines
//! 1. [`Jieba`] owns one engine. [`Jieba::free`] releases it early; dropping
//!    the value releases it otherwise. Either way the release runs once.
//! 2. [`Jieba::shared`] returns a [`SharedJieba`], a process-wide engine that
//!    is built on first use and lives until the process exits. It has no
//!    `free`, so it cannot be released by accident.
//!
//! ```no_run
//! use jieba_ffi::{Jieba, JiebaConfig, SharedJieba};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JiebaConfig::default()
//!         .with_library_path("/usr/local/lib/libjieba.so")
//!         .with_dict_dir("/usr/local/share/cppjieba/dict");
//!     let shared = SharedJieba::get_with(config)?;
//!     let again = Jieba::shared()?;
//!     assert!(shared.ptr_eq(&again));
//!     Ok(())
//! }
//! ```
//!
//! ## Offsets
//! [`Word::start`] and [`Word::end`] are byte offsets into the UTF-8 input,
//! so `&text[word.start..word.end] == word.word`.
//!
//! ## Environment Variables
//! - `JIEBA_LIBRARY_PATH`: explicit dynamic library path.
//! - `JIEBA_DICT_DIR`: directory holding the five default dictionary files.

mod config;
mod constants;
mod convert;
mod discovery;
mod error;
mod model;
mod native;
mod runtime;
mod types;

pub use constants::*;
pub use error::{JiebaError, Result};
pub use model::{Tag, Word, WordWeight};
pub use runtime::{Jieba, JiebaLibrary, SharedJieba};
pub use types::{DictKind, DictPaths, Hmm, JiebaConfig, TokenizeMode};

#[cfg(test)]
mod test_support;
