//! String interner.
//!
//! Identifiers show up everywhere in an elaborated design, so they are
//! deduplicated once and handled as [`Name`] indices afterwards. Comparing
//! two names is an integer compare; the interner is shared freely because
//! lookups go through a `parking_lot` mutex.

use parking_lot::Mutex;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// An interned string handle.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize)]
pub struct Name(pub u32);

impl Name {
    /// The empty string, pre-interned so anonymous symbols have a name
    /// without touching the interner.
    pub const EMPTY: Name = Name(0);
}

/// Shared immutable string storage.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ArcStr(Arc<str>);

impl ArcStr {
    fn new(value: &str) -> ArcStr {
        ArcStr(Arc::from(value))
    }
}

impl fmt::Display for ArcStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ArcStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl Borrow<str> for ArcStr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for ArcStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<ArcStr, Name>,
    strings: Vec<ArcStr>,
}

/// A thread-safe string interner.
#[derive(Debug)]
pub struct Interner {
    inner: Mutex<Inner>,
}

impl Interner {
    pub fn new() -> Interner {
        let interner = Interner { inner: Mutex::new(Inner::default()) };
        let empty = interner.intern("");
        debug_assert_eq!(empty, Name::EMPTY);
        interner
    }

    /// Intern a string, returning its unique [`Name`]. Interning the same
    /// string twice returns the same handle.
    pub fn intern(&self, text: &str) -> Name {
        let mut inner = self.inner.lock();
        if let Some(&name) = inner.map.get(text) {
            return name;
        }

        let key = ArcStr::new(text);
        let name = Name(inner.strings.len() as u32);
        inner.strings.push(key.clone());
        inner.map.insert(key, name);
        name
    }

    /// Retrieve the string for a previously interned name.
    pub fn resolve(&self, name: Name) -> ArcStr {
        self.inner.lock().strings[name.0 as usize].clone()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
