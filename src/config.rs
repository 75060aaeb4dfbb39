use std::os::raw::{c_char, c_double, c_int, c_void};

pub(crate) type JiebaHandle = *mut c_void;

/// `TokenizeMode` enum from `jieba.h`.
pub(crate) type JiebaTokenizeMode = c_int;

pub(crate) const JIEBA_DEFAULT_MODE: JiebaTokenizeMode = 0;
pub(crate) const JIEBA_SEARCH_MODE: JiebaTokenizeMode = 1;

/// One positioned token. Arrays end with a record whose `len` is zero.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct JiebaWordRaw {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

/// `struct CWordWeight`. Arrays end with a record whose `word` is null.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct JiebaWordWeightRaw {
    pub(crate) word: *mut c_char,
    pub(crate) weight: c_double,
}
