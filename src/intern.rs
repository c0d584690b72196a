//! Column and source label interning.
//!
//! Column names and source labels are looked up constantly — once per cell
//! per row during a scan, and again on every merge step to resolve an `on`
//! column. Interning them once into `Symbol`s turns those lookups into
//! pointer/integer comparisons instead of string comparisons.
//!
//! The arena backing the interner is process-lifetime (a `lazy_static`), so
//! a `Symbol` is just a `Copy` wrapper around a `&'static str`: cheap to
//! pass around, store in a `Row`, or send across a thread boundary. This
//! leaks the distinct column/source names a process ever sees, which is
//! fine — the universe of such names is fixed at engine-construction time
//! and is never large.
use fnv::FnvHashMap;
use lazy_static::lazy_static;
use std::fmt;
use std::sync::Mutex;
use typed_arena::Arena;

lazy_static! {
    static ref ARENA: Arena<u8> = Arena::new();
    static ref TABLE: Mutex<FnvHashMap<String, Symbol>> = Mutex::new(FnvHashMap::default());
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(&'static str);

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Intern `s`, returning the same `Symbol` for every equal string seen so far.
pub fn intern(s: &str) -> Symbol {
    let mut table = TABLE.lock().unwrap();
    if let Some(sym) = table.get(s) {
        return *sym;
    }
    let owned: &'static str = ARENA.alloc_str(s);
    let sym = Symbol(owned);
    table.insert(s.to_string(), sym);
    sym
}
