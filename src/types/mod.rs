//! # Data Type System
//!
//! The canonical `DataType` enum for rlq: the seven scalar kinds a column
//! can declare through its heading type tag, used across the record codec,
//! the expression compiler, and the relational engine.
//!
//! ## Kinds
//!
//! | Tag | Kind | Compared as |
//! |-----|------|-------------|
//! | `string` | case-sensitive string | raw bytes |
//! | `istring` | case-insensitive string | ASCII-folded bytes |
//! | `int` | signed 64-bit integer | sign-and-magnitude on the digits |
//! | `uint` | unsigned 64-bit integer | magnitude on the digits |
//! | `double` | 64-bit float | parsed numeric value |
//! | `bool` | boolean | normalized `0`/`1` |
//! | `ipaddress` | IPv4 address | 32-bit numeric value |
//!
//! Values are stored textually in record fields regardless of kind; the
//! type tag selects which compare/hash/VM-push function a column gets. The
//! selection happens once per operator invocation, never per record.
//!
//! ## Type Tags
//!
//! Heading fields are `tag:name` strings (`int:age`). Tag lookup uses a
//! compile-time perfect hash map, mirroring keyword lookup in the lexer.
//!
//! ## Float Equality Policy
//!
//! `double` columns may be ordered (`order_by`) but never serve as
//! equality keys for group/join/unique: floating-point equality is
//! unreliable, and [`compare::hash_fn`] rejects the kind with exactly that
//! wording before any record is read.

pub mod compare;

pub use compare::{compare_fn, hash_fn, parse_bool, parse_double, parse_ip, CompareFn, HashFn};

use eyre::{bail, Result};
use phf::phf_map;

/// The seven scalar kinds. `#[repr(u8)]` keeps the discriminant small for
/// embedding in compiled programs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Str = 0,
    IStr = 1,
    Int = 2,
    Uint = 3,
    Double = 4,
    Bool = 5,
    IpAddr = 6,
}

static TYPE_TAGS: phf::Map<&'static str, DataType> = phf_map! {
    "string" => DataType::Str,
    "istring" => DataType::IStr,
    "int" => DataType::Int,
    "uint" => DataType::Uint,
    "double" => DataType::Double,
    "bool" => DataType::Bool,
    "ipaddress" => DataType::IpAddr,
};

impl DataType {
    /// Looks up a heading type tag, e.g. `"int"` -> `DataType::Int`.
    pub fn from_tag(tag: &str) -> Option<DataType> {
        TYPE_TAGS.get(tag).copied()
    }

    /// Tag lookup that fails with the list of valid tags, for heading
    /// validation before any record is processed.
    pub fn mandatory_from_tag(tag: &str) -> Result<DataType> {
        match Self::from_tag(tag) {
            Some(dt) => Ok(dt),
            None => bail!(
                "unknown type tag '{}' (valid tags: string, istring, int, uint, double, bool, ipaddress)",
                tag
            ),
        }
    }

    pub fn is_valid_tag(tag: &str) -> bool {
        TYPE_TAGS.contains_key(tag)
    }

    /// The textual tag written into heading fields.
    pub fn tag(&self) -> &'static str {
        match self {
            DataType::Str => "string",
            DataType::IStr => "istring",
            DataType::Int => "int",
            DataType::Uint => "uint",
            DataType::Double => "double",
            DataType::Bool => "bool",
            DataType::IpAddr => "ipaddress",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip() {
        for dt in [
            DataType::Str,
            DataType::IStr,
            DataType::Int,
            DataType::Uint,
            DataType::Double,
            DataType::Bool,
            DataType::IpAddr,
        ] {
            assert_eq!(DataType::from_tag(dt.tag()), Some(dt));
            assert!(DataType::is_valid_tag(dt.tag()));
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(DataType::from_tag("varchar"), None);
        assert!(DataType::mandatory_from_tag("varchar").is_err());
        assert!(!DataType::is_valid_tag(""));
    }
}
