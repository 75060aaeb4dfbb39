//! Copies native result arrays into owned Rust values.
//!
//! Every array returned by the engine is wrapped in a [`NativeArray`] right
//! after the call returns, so it is released exactly once whether conversion
//! succeeds or not.

use std::os::raw::c_char;
use std::slice;

use crate::config::{JiebaWordRaw, JiebaWordWeightRaw};
use crate::error::{JiebaError, Result};
use crate::model::{Tag, Word, WordWeight};
use crate::native::cstr_to_string;

pub(crate) struct NativeArray<T> {
    pointer: *mut T,
    release: unsafe extern "C" fn(*mut T),
}

impl<T> NativeArray<T> {
    /// # Safety
    /// `pointer` must be null or a terminated array that `release` frees.
    pub(crate) unsafe fn new(pointer: *mut T, release: unsafe extern "C" fn(*mut T)) -> Self {
        Self { pointer, release }
    }

    /// Elements before the terminator.
    fn as_slice(&self, is_terminator: impl Fn(&T) -> bool) -> &[T] {
        if self.pointer.is_null() {
            return &[];
        }
        let mut len = 0usize;
        unsafe {
            while !is_terminator(&*self.pointer.add(len)) {
                len += 1;
            }
            slice::from_raw_parts(self.pointer, len)
        }
    }
}

impl<T> Drop for NativeArray<T> {
    fn drop(&mut self) {
        if self.pointer.is_null() {
            return;
        }
        unsafe {
            (self.release)(self.pointer);
        }
    }
}

pub(crate) fn strings(array: NativeArray<*mut c_char>) -> Vec<String> {
    array
        .as_slice(|word| word.is_null())
        .iter()
        .map(|&word| cstr_to_string(word))
        .collect()
}

pub(crate) fn tags(array: NativeArray<*mut c_char>) -> Vec<Tag> {
    array
        .as_slice(|word| word.is_null())
        .iter()
        .map(|&word| Tag::parse(&cstr_to_string(word)))
        .collect()
}

pub(crate) fn word_weights(array: NativeArray<JiebaWordWeightRaw>) -> Vec<WordWeight> {
    array
        .as_slice(|pair| pair.word.is_null())
        .iter()
        .map(|pair| WordWeight {
            word: cstr_to_string(pair.word),
            weight: pair.weight,
        })
        .collect()
}

/// Resolves byte spans reported by `Tokenize` against the original input.
pub(crate) fn words(text: &str, array: NativeArray<JiebaWordRaw>) -> Result<Vec<Word>> {
    array
        .as_slice(|word| word.len == 0)
        .iter()
        .map(|raw| {
            let start = raw.offset;
            let end = start.checked_add(raw.len).ok_or_else(|| {
                JiebaError::Api(format!("token span overflows: {start}+{}", raw.len))
            })?;
            let word = text.get(start..end).ok_or_else(|| {
                JiebaError::Api(format!(
                    "token span {start}..{end} is not a valid range of a {}-byte input",
                    text.len()
                ))
            })?;
            Ok(Word {
                word: word.to_string(),
                start,
                end,
            })
        })
        .collect()
}
