//! Interned node symbols.
//!
//! Every tree node is labelled with the name of the production or token class
//! it represents. The same handful of names (`expr`, `id`, `literal`, ...)
//! repeat thousands of times in a large template, so they are stored once in a
//! global string interner and nodes carry a copyable [`Symbol`] handle.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for node symbols.
///
/// # Thread Safety
///
/// This uses `Mutex` for thread-safe access to the string interner.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Interned name of a tree node.
///
/// # Examples
///
/// ```
/// use utl_core::Symbol;
///
/// let expr = Symbol::new("expr");
/// assert_eq!(expr, Symbol::new("expr"));
/// assert_eq!(expr, "expr");
/// assert!(!expr.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    /// Creates a `Symbol` from a string slice, interning it on first use.
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Returns `true` if the symbol is the empty string.
    pub fn is_empty(&self) -> bool {
        interner().resolve(self.0).is_none_or(str::is_empty)
    }

    /// Returns an owned copy of the symbol text.
    pub fn to_text(&self) -> String {
        interner()
            .resolve(self.0)
            .map(str::to_owned)
            .unwrap_or_default()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Resolve under the lock, write after releasing it.
        let text = self.to_text();
        f.write_str(&text)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Symbol {
    /// Allows direct comparison with string slices: `symbol == "expr"`
    fn eq(&self, other: &str) -> bool {
        interner().resolve(self.0) == Some(other)
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}
