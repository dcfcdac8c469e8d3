//! C fragment templates for the two probe families.
//!
//! A fragment is spliced into the judge's skeleton `int main(void) {` ... `}`.
//! It closes `main` early, defines a helper function whose body includes the
//! protected file through a stringizing macro, and leaves a dangling
//! `void trailer(void) {` for the skeleton's closing brace.
//!
//! The protected file holds `<prefix>{...}`. With `<prefix>` defined as
//! `stringize(`, the include expands to `leak("{...}")`, so the secret becomes
//! a string literal the fragment can index at compile time. Out-of-bounds
//! constant indices are diagnosed by `-Warray-bounds`, which the judge turns
//! into a failed build.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Default capacity of a [`PayloadCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

const PRAGMAS: &str = r#"#pragma clang diagnostic ignored "-Wchar-subscripts"
#pragma clang diagnostic ignored "-Wunused-variable"
#pragma clang diagnostic fatal "-Warray-bounds-pointer-arithmetic"
"#;

/// Parameters that fully determine a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Compiles iff `size` indexes the literal (terminator included).
    Length { size: usize },
    /// Compiles iff `literal[index] < threshold`.
    Boundary { threshold: u8, index: usize },
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Length { size } => write!(f, "length[{size}]"),
            ProbeKind::Boundary { threshold, index } => {
                write!(f, "boundary[{index}] < {threshold:#04x}")
            }
        }
    }
}

/// An immutable fragment together with the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub kind: ProbeKind,
    pub source: Arc<str>,
}

/// Template parameters shared by every fragment of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    prefix: String,
    include: String,
}

impl Templates {
    /// `prefix` must be a C identifier; `include` must fit in a quoted
    /// `#include`. Both are checked by the config layer before they get here.
    pub fn new(prefix: impl Into<String>, include: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            include: include.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn include(&self) -> &str {
        &self.include
    }

    pub fn build(&self, kind: ProbeKind) -> String {
        match kind {
            ProbeKind::Length { size } => self.length_probe(size),
            ProbeKind::Boundary { threshold, index } => self.boundary_probe(threshold, index),
        }
    }

    pub fn length_probe(&self, size: usize) -> String {
        self.wrap("", &format!("a[{size}]"))
    }

    /// The threshold is emitted as a decimal array bound, never as a character
    /// literal, so every byte value renders to the same well-formed shape.
    pub fn boundary_probe(&self, threshold: u8, index: usize) -> String {
        self.wrap(
            &format!("    const char window[{threshold}] = {{ 0 }};\n"),
            &format!("window[a[{index}]]"),
        )
    }

    fn wrap(&self, locals: &str, access: &str) -> String {
        format!(
            "int probe(void);\n\
             return probe();\n\
             }}\n\
             {PRAGMAS}\
             int probe(void) {{\n\
             {locals}\
             \x20   #define leak(a) const char leaked = {access};\n\
             \x20   #define stringize(a) leak(#a)\n\
             \x20   #define {prefix} stringize(\n\
             \x20   #include \"{include}\"\n\
             \x20   )\n\
             \x20   return 0;\n\
             }}\n\
             void trailer(void) {{\n",
            prefix = self.prefix,
            include = self.include,
        )
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new("hxp", "flag")
    }
}

/// Memoizes fragments by [`ProbeKind`].
///
/// Only fragment text is cached. Verdicts are never stored here: every ask is
/// a fresh oracle query.
pub struct PayloadCache {
    templates: Templates,
    capacity: usize,
    entries: Mutex<HashMap<ProbeKind, Arc<str>>>,
}

impl PayloadCache {
    pub fn new(templates: Templates) -> Self {
        Self::with_capacity(templates, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(templates: Templates, capacity: usize) -> Self {
        Self {
            templates,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn probe(&self, kind: ProbeKind) -> Probe {
        if let Ok(entries) = self.entries.lock() {
            if let Some(source) = entries.get(&kind) {
                return Probe {
                    kind,
                    source: Arc::clone(source),
                };
            }
        }

        let source: Arc<str> = Arc::from(self.templates.build(kind));
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() < self.capacity {
                entries.insert(kind, Arc::clone(&source));
            }
        }
        Probe { kind, source }
    }

    pub fn length(&self, size: usize) -> Probe {
        self.probe(ProbeKind::Length { size })
    }

    pub fn boundary(&self, threshold: u8, index: usize) -> Probe {
        self.probe(ProbeKind::Boundary { threshold, index })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
