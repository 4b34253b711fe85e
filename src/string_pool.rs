//! Interns every name and value stored in a document.
//!
//! Strings are copied into a `typed_arena::Arena<u8>`, which never
//! moves or frees an allocation until the arena itself is dropped. That
//! lets the pool hand out `&str` slices whose lifetime is tied to the
//! pool rather than to the borrow of its index.

use std::cell::RefCell;
use std::collections::HashSet;
use std::{fmt, hash, slice, str};

use typed_arena::Arena;

/// A pointer + length pair referring to bytes owned by a `StringPool`.
///
/// It is only valid for as long as the pool that produced it, which
/// the document types enforce by tying every returned `&str` to the
/// lifetime of the owning package.
#[derive(Copy, Clone)]
pub struct InternedString {
    data: *const u8,
    len: usize,
}

impl InternedString {
    fn from_str(s: &str) -> InternedString {
        InternedString {
            data: s.as_ptr(),
            len: s.len(),
        }
    }

    pub fn empty() -> InternedString {
        InternedString::from_str("")
    }

    pub fn as_slice<'s>(&self) -> &'s str {
        // The bytes were copied from a `str` and never mutated.
        unsafe {
            let bytes = slice::from_raw_parts(self.data, self.len);
            str::from_utf8_unchecked(bytes)
        }
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.as_slice().fmt(f)
    }
}

impl PartialEq for InternedString {
    fn eq(&self, other: &InternedString) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for InternedString {}

impl PartialOrd for InternedString {
    fn partial_cmp(&self, other: &InternedString) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InternedString {
    fn cmp(&self, other: &InternedString) -> std::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl hash::Hash for InternedString {
    fn hash<H>(&self, state: &mut H)
        where H: hash::Hasher
    {
        self.as_slice().hash(state)
    }
}

impl std::borrow::Borrow<str> for InternedString {
    fn borrow(&self) -> &str {
        self.as_slice()
    }
}

pub struct StringPool {
    arena: Arena<u8>,
    index: RefCell<HashSet<InternedString>>,
}

impl StringPool {
    pub fn new() -> StringPool {
        StringPool {
            arena: Arena::new(),
            index: RefCell::new(HashSet::new()),
        }
    }

    pub fn intern<'s>(&'s self, s: &str) -> &'s str {
        self.intern_raw(s).as_slice()
    }

    pub(crate) fn intern_raw(&self, s: &str) -> InternedString {
        if s.is_empty() { return InternedString::empty() }

        if let Some(interned) = self.index.borrow().get(s) {
            return *interned;
        }

        let stored: &str = self.arena.alloc_str(s);
        let interned = InternedString::from_str(stored);
        self.index.borrow_mut().insert(interned);
        interned
    }

    pub fn len(&self) -> usize {
        self.index.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringPool {
    fn default() -> StringPool {
        StringPool::new()
    }
}
