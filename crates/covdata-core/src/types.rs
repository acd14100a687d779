//! Shared type aliases and small value types.

/// A source line number. Line numbers start at 1; 0 is never recorded by a tracer
/// but is representable.
pub type LineNo = u32;

/// A (from, to) transition between lines.
///
/// Negative values are sentinels: `-N` as `from` is entry into the code object
/// starting at line N, `-N` as `to` is exit from the code object starting at line N.
pub type ArcPair = (i32, i32);

/// Whether a data file records lines or arcs. Decided by the first write and
/// fixed until the data is erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    /// Nothing written yet; either kind of data is accepted.
    #[default]
    Empty,
    Lines,
    Arcs,
}

impl DataMode {
    /// Mode recorded by the `has_arcs` metadata flag.
    pub fn from_has_arcs(has_arcs: bool) -> Self {
        if has_arcs {
            Self::Arcs
        } else {
            Self::Lines
        }
    }

    pub fn has_lines(self) -> bool {
        self == Self::Lines
    }

    pub fn has_arcs(self) -> bool {
        self == Self::Arcs
    }

    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }
}

/// How the data file name is extended beyond its base name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Suffix {
    /// Use the base name as-is.
    #[default]
    None,
    /// Append `.<literal>`.
    Literal(String),
    /// Append `.<host>.<pid>.X<random>x`, unique per process.
    Generated,
}
