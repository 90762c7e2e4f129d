//! # Operator and Function Registry
//!
//! The single static table behind three consumers:
//!
//! 1. The **lexer** greedily matches multi-character operators against the
//!    registered spellings (longest valid prefix wins, so `<=` never
//!    tokenizes as `<` `=`).
//! 2. The **parser** looks up operator precedence and associativity
//!    (C-family table; lower number binds tighter). All overloads of one
//!    spelling share precedence by construction; precedence lives on the
//!    spelling, not the overload.
//! 3. The **compiler** resolves `(name, arity, argument types)` to one
//!    overload. Table order is the stable registration order: it decides
//!    error-message listings, so entries are grouped by name.
//!
//! Failed resolutions render every overload for the name from this same
//! metadata, which keeps error messages self-documenting.
//!
//! `if`/`then`/`else` are deliberately absent: syntactically they are
//! ordinary one-argument calls, but the compiler lowers them to jumps and
//! never consults the registry.

use crate::types::DataType;
use crate::types::DataType::{Bool, Double, IStr, Int, IpAddr, Str, Uint};

/// VM operation selected by overload resolution. The variant IS the
/// bytecode: the interpreter dispatches on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    AddInt,
    AddUint,
    AddDouble,
    ConcatStr,
    SubInt,
    SubUint,
    SubDouble,
    MulInt,
    MulUint,
    MulDouble,
    DivInt,
    DivUint,
    DivDouble,
    ModInt,
    ModUint,
    NegInt,
    NegDouble,
    NotBool,
    BitNotInt,
    BitNotUint,
    ShlInt,
    ShlUint,
    ShrInt,
    ShrUint,
    BitAndInt,
    BitAndUint,
    BitOrInt,
    BitOrUint,
    BitXorInt,
    BitXorUint,
    LtInt,
    LtUint,
    LtDouble,
    LtStr,
    LtIStr,
    LeInt,
    LeUint,
    LeDouble,
    LeStr,
    LeIStr,
    GtInt,
    GtUint,
    GtDouble,
    GtStr,
    GtIStr,
    GeInt,
    GeUint,
    GeDouble,
    GeStr,
    GeIStr,
    EqInt,
    EqUint,
    EqDouble,
    EqStr,
    EqIStr,
    EqBool,
    EqIp,
    NeInt,
    NeUint,
    NeDouble,
    NeStr,
    NeIStr,
    NeBool,
    NeIp,
    AndBool,
    OrBool,
    StrStartsWith,
    StrEndsWith,
    StrContains,
    StrLen,
    StrLower,
    StrUpper,
    ToIntFromStr,
    ToIntFromUint,
    ToUintFromStr,
    ToUintFromInt,
    ToDoubleFromStr,
    ToDoubleFromInt,
    ToDoubleFromUint,
    ToStringFromInt,
    ToStringFromUint,
    ToStringFromDouble,
    ToStringFromBool,
}

/// One registered overload.
#[derive(Debug, Clone, Copy)]
pub struct OpDef {
    pub name: &'static str,
    pub params: &'static [DataType],
    pub ret: DataType,
    pub code: OpCode,
}

const fn def(
    name: &'static str,
    params: &'static [DataType],
    ret: DataType,
    code: OpCode,
) -> OpDef {
    OpDef {
        name,
        params,
        ret,
        code,
    }
}

/// The registry. Grouped by name; group order is the stable registration
/// order surfaced in overload-resolution error messages.
pub static OPS: &[OpDef] = &[
    // arithmetic / concatenation
    def("+", &[Int, Int], Int, OpCode::AddInt),
    def("+", &[Uint, Uint], Uint, OpCode::AddUint),
    def("+", &[Double, Double], Double, OpCode::AddDouble),
    def("+", &[Str, Str], Str, OpCode::ConcatStr),
    def("-", &[Int, Int], Int, OpCode::SubInt),
    def("-", &[Uint, Uint], Uint, OpCode::SubUint),
    def("-", &[Double, Double], Double, OpCode::SubDouble),
    def("-", &[Int], Int, OpCode::NegInt),
    def("-", &[Double], Double, OpCode::NegDouble),
    def("*", &[Int, Int], Int, OpCode::MulInt),
    def("*", &[Uint, Uint], Uint, OpCode::MulUint),
    def("*", &[Double, Double], Double, OpCode::MulDouble),
    def("/", &[Int, Int], Int, OpCode::DivInt),
    def("/", &[Uint, Uint], Uint, OpCode::DivUint),
    def("/", &[Double, Double], Double, OpCode::DivDouble),
    def("%", &[Int, Int], Int, OpCode::ModInt),
    def("%", &[Uint, Uint], Uint, OpCode::ModUint),
    // unary logical / bitwise
    def("!", &[Bool], Bool, OpCode::NotBool),
    def("~", &[Int], Int, OpCode::BitNotInt),
    def("~", &[Uint], Uint, OpCode::BitNotUint),
    // shifts / bitwise
    def("<<", &[Int, Int], Int, OpCode::ShlInt),
    def("<<", &[Uint, Uint], Uint, OpCode::ShlUint),
    def(">>", &[Int, Int], Int, OpCode::ShrInt),
    def(">>", &[Uint, Uint], Uint, OpCode::ShrUint),
    def("&", &[Int, Int], Int, OpCode::BitAndInt),
    def("&", &[Uint, Uint], Uint, OpCode::BitAndUint),
    def("|", &[Int, Int], Int, OpCode::BitOrInt),
    def("|", &[Uint, Uint], Uint, OpCode::BitOrUint),
    def("^", &[Int, Int], Int, OpCode::BitXorInt),
    def("^", &[Uint, Uint], Uint, OpCode::BitXorUint),
    // ordering comparisons
    def("<", &[Int, Int], Bool, OpCode::LtInt),
    def("<", &[Uint, Uint], Bool, OpCode::LtUint),
    def("<", &[Double, Double], Bool, OpCode::LtDouble),
    def("<", &[Str, Str], Bool, OpCode::LtStr),
    def("<", &[IStr, IStr], Bool, OpCode::LtIStr),
    def("<", &[IStr, Str], Bool, OpCode::LtIStr),
    def("<", &[Str, IStr], Bool, OpCode::LtIStr),
    def("<=", &[Int, Int], Bool, OpCode::LeInt),
    def("<=", &[Uint, Uint], Bool, OpCode::LeUint),
    def("<=", &[Double, Double], Bool, OpCode::LeDouble),
    def("<=", &[Str, Str], Bool, OpCode::LeStr),
    def("<=", &[IStr, IStr], Bool, OpCode::LeIStr),
    def("<=", &[IStr, Str], Bool, OpCode::LeIStr),
    def("<=", &[Str, IStr], Bool, OpCode::LeIStr),
    def(">", &[Int, Int], Bool, OpCode::GtInt),
    def(">", &[Uint, Uint], Bool, OpCode::GtUint),
    def(">", &[Double, Double], Bool, OpCode::GtDouble),
    def(">", &[Str, Str], Bool, OpCode::GtStr),
    def(">", &[IStr, IStr], Bool, OpCode::GtIStr),
    def(">", &[IStr, Str], Bool, OpCode::GtIStr),
    def(">", &[Str, IStr], Bool, OpCode::GtIStr),
    def(">=", &[Int, Int], Bool, OpCode::GeInt),
    def(">=", &[Uint, Uint], Bool, OpCode::GeUint),
    def(">=", &[Double, Double], Bool, OpCode::GeDouble),
    def(">=", &[Str, Str], Bool, OpCode::GeStr),
    def(">=", &[IStr, IStr], Bool, OpCode::GeIStr),
    def(">=", &[IStr, Str], Bool, OpCode::GeIStr),
    def(">=", &[Str, IStr], Bool, OpCode::GeIStr),
    // equality
    def("==", &[Int, Int], Bool, OpCode::EqInt),
    def("==", &[Uint, Uint], Bool, OpCode::EqUint),
    def("==", &[Double, Double], Bool, OpCode::EqDouble),
    def("==", &[Str, Str], Bool, OpCode::EqStr),
    def("==", &[IStr, IStr], Bool, OpCode::EqIStr),
    def("==", &[IStr, Str], Bool, OpCode::EqIStr),
    def("==", &[Str, IStr], Bool, OpCode::EqIStr),
    def("==", &[Bool, Bool], Bool, OpCode::EqBool),
    def("==", &[IpAddr, IpAddr], Bool, OpCode::EqIp),
    def("!=", &[Int, Int], Bool, OpCode::NeInt),
    def("!=", &[Uint, Uint], Bool, OpCode::NeUint),
    def("!=", &[Double, Double], Bool, OpCode::NeDouble),
    def("!=", &[Str, Str], Bool, OpCode::NeStr),
    def("!=", &[IStr, IStr], Bool, OpCode::NeIStr),
    def("!=", &[IStr, Str], Bool, OpCode::NeIStr),
    def("!=", &[Str, IStr], Bool, OpCode::NeIStr),
    def("!=", &[Bool, Bool], Bool, OpCode::NeBool),
    def("!=", &[IpAddr, IpAddr], Bool, OpCode::NeIp),
    // logical
    def("&&", &[Bool, Bool], Bool, OpCode::AndBool),
    def("||", &[Bool, Bool], Bool, OpCode::OrBool),
    // string functions
    def("str.starts_with", &[Str, Str], Bool, OpCode::StrStartsWith),
    def("str.ends_with", &[Str, Str], Bool, OpCode::StrEndsWith),
    def("str.contains", &[Str, Str], Bool, OpCode::StrContains),
    def("str.len", &[Str], Uint, OpCode::StrLen),
    def("str.lower", &[Str], Str, OpCode::StrLower),
    def("str.upper", &[Str], Str, OpCode::StrUpper),
    // conversions
    def("to_int", &[Str], Int, OpCode::ToIntFromStr),
    def("to_int", &[Uint], Int, OpCode::ToIntFromUint),
    def("to_uint", &[Str], Uint, OpCode::ToUintFromStr),
    def("to_uint", &[Int], Uint, OpCode::ToUintFromInt),
    def("to_double", &[Str], Double, OpCode::ToDoubleFromStr),
    def("to_double", &[Int], Double, OpCode::ToDoubleFromInt),
    def("to_double", &[Uint], Double, OpCode::ToDoubleFromUint),
    def("to_string", &[Int], Str, OpCode::ToStringFromInt),
    def("to_string", &[Uint], Str, OpCode::ToStringFromUint),
    def("to_string", &[Double], Str, OpCode::ToStringFromDouble),
    def("to_string", &[Bool], Str, OpCode::ToStringFromBool),
];

/// Operator spellings with C-family precedence. Lower binds tighter.
/// Unary `-`/`!`/`~` are all precedence 2, right-associative; the lexer
/// distinguishes unary from binary `-` by context.
static OPERATOR_PRECEDENCE: &[(&str, u8)] = &[
    ("*", 3),
    ("/", 3),
    ("%", 3),
    ("+", 4),
    ("-", 4),
    ("<<", 5),
    (">>", 5),
    ("<", 6),
    ("<=", 6),
    (">", 6),
    (">=", 6),
    ("==", 7),
    ("!=", 7),
    ("&", 8),
    ("^", 9),
    ("|", 10),
    ("&&", 11),
    ("||", 12),
];

/// Precedence of every unary prefix operator.
pub const UNARY_PRECEDENCE: u8 = 2;

/// Binary precedence lookup; `None` for names that are not binary
/// operators.
pub fn binary_precedence(name: &str) -> Option<u8> {
    OPERATOR_PRECEDENCE
        .iter()
        .find(|(op, _)| *op == name)
        .map(|&(_, prec)| prec)
}

/// Greedy operator match at the front of `input`: the longest registered
/// spelling that is a prefix wins.
pub fn match_operator(input: &str) -> Option<&'static str> {
    const SPELLINGS: &[&str] = &[
        "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "&",
        "|", "^", "!", "~",
    ];
    SPELLINGS
        .iter()
        .find(|op| input.starts_with(**op))
        .copied()
}

/// All overloads registered under `name`, in registration order.
pub fn overloads(name: &str) -> impl Iterator<Item = &'static OpDef> + '_ {
    OPS.iter().filter(move |op| op.name == name)
}

pub fn is_known_name(name: &str) -> bool {
    overloads(name).next().is_some()
}

/// Resolves `(name, argument types)` to the first matching overload.
pub fn resolve(name: &str, args: &[DataType]) -> Option<&'static OpDef> {
    overloads(name).find(|op| op.params == args)
}

/// Renders every overload of `name` for an error message, one per line,
/// from the same metadata that drives resolution.
pub fn render_overloads(name: &str) -> String {
    let mut out = String::new();
    for op in overloads(name) {
        let params: Vec<&str> = op.params.iter().map(|p| p.tag()).collect();
        out.push_str(&format!(
            "  {}({}) -> {}\n",
            op.name,
            params.join(", "),
            op.ret.tag()
        ));
    }
    out
}
