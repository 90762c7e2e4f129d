//! # Expression Virtual Machine
//!
//! Executes a compiled [`Program`] against one record (or a this/other
//! pair). A program is immutable after compilation: a flat instruction
//! list, a literal pool, the declared return type, and a flag telling the
//! caller whether evaluation needs a second record in scope.
//!
//! ## Dispatch
//!
//! A plain `match` inside the program-counter loop. Branching is two
//! pseudo-instructions with absolute targets resolved at compile time:
//! `JumpIfFalse` pops the condition, `Jump` is unconditional.
//!
//! ## Values and the Arena
//!
//! [`Value`] is a tagged scalar. String values are borrowed slices: from
//! the record buffers, from the program's literal pool, or from the bump
//! arena for strings built during evaluation (concatenation, case
//! mapping, `to_string`). The caller owns the arena and resets it once
//! per record, so per-record string work never touches the global
//! allocator after warmup.
//!
//! ## Trust Boundary
//!
//! The compiler's simulated stack guarantees operand counts and types, so
//! the value stack here is popped without checked recovery; the accessors
//! are `unreachable!` on type confusion. Malformed field *values* (a
//! non-numeric int field, a bad octet) are a different matter: those are
//! data errors, fatal at the point of use with the offending value named.

use std::cmp::Ordering;

use bumpalo::collections::String as BumpString;
use bumpalo::Bump;
use smallvec::SmallVec;

use crate::config::VM_STACK_CAPACITY;
use crate::record::RecordView;
use crate::types::compare::{parse_bool, parse_double, parse_ip};
use crate::types::DataType;

use super::registry::OpCode;

/// Which in-scope record a field instruction reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSlot {
    This,
    Other,
    /// The previously emitted output record (`prev.` in select lists).
    Prev,
}

/// Compile-time constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
}

/// One VM instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Push literal pool entry.
    Literal(usize),
    /// Push a record field, converted to its declared kind.
    Field {
        slot: RecordSlot,
        index: usize,
        kind: DataType,
    },
    /// Push the current record's 1-based stream position as uint.
    RowNumber,
    Op(OpCode),
    /// Pop a bool; fall through on true, go to the absolute target on
    /// false.
    JumpIfFalse(usize),
    Jump(usize),
}

/// Runtime scalar. Strings borrow; everything else is inline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'v> {
    Str(&'v str),
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
    /// Numeric ipaddress value.
    Ip(u32),
}

impl<'v> Value<'v> {
    fn str(self) -> &'v str {
        match self {
            Value::Str(s) => s,
            other => unreachable!("expected string value, got {:?}", other),
        }
    }

    fn int(self) -> i64 {
        match self {
            Value::Int(v) => v,
            other => unreachable!("expected int value, got {:?}", other),
        }
    }

    fn uint(self) -> u64 {
        match self {
            Value::Uint(v) => v,
            other => unreachable!("expected uint value, got {:?}", other),
        }
    }

    fn double(self) -> f64 {
        match self {
            Value::Double(v) => v,
            other => unreachable!("expected double value, got {:?}", other),
        }
    }

    pub fn bool(self) -> bool {
        match self {
            Value::Bool(v) => v,
            other => unreachable!("expected bool value, got {:?}", other),
        }
    }

    fn ip(self) -> u32 {
        match self {
            Value::Ip(v) => v,
            other => unreachable!("expected ipaddress value, got {:?}", other),
        }
    }

    /// Renders this value as record field text.
    pub fn write_field(&self, out: &mut Vec<u8>) {
        match self {
            Value::Str(s) => out.extend_from_slice(s.as_bytes()),
            Value::Int(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::Uint(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::Double(v) => out.extend_from_slice(v.to_string().as_bytes()),
            Value::Bool(v) => out.push(if *v { b'1' } else { b'0' }),
            Value::Ip(v) => {
                let [a, b, c, d] = v.to_be_bytes();
                out.extend_from_slice(format!("{}.{}.{}.{}", a, b, c, d).as_bytes());
            }
        }
    }
}

/// The records and scratch heap one evaluation runs against.
#[derive(Clone, Copy)]
pub struct EvalCtx<'v> {
    pub this: RecordView<'v>,
    pub other: Option<RecordView<'v>>,
    /// Previously emitted output record; `None` before the first output,
    /// in which case `prev.` fields read as their kind's zero value.
    pub prev: Option<RecordView<'v>>,
    pub arena: &'v Bump,
}

impl<'v> EvalCtx<'v> {
    pub fn new(this: RecordView<'v>, arena: &'v Bump) -> EvalCtx<'v> {
        EvalCtx {
            this,
            other: None,
            prev: None,
            arena,
        }
    }
}

/// A compiled, immutable expression.
#[derive(Debug, Clone)]
pub struct Program {
    insns: Vec<Insn>,
    literals: Vec<Literal>,
    ret: DataType,
    uses_other: bool,
}

impl Program {
    pub(crate) fn new(
        insns: Vec<Insn>,
        literals: Vec<Literal>,
        ret: DataType,
        uses_other: bool,
    ) -> Program {
        Program {
            insns,
            literals,
            ret,
            uses_other,
        }
    }

    /// Static type of the value [`eval`](Self::eval) returns.
    pub fn return_type(&self) -> DataType {
        self.ret
    }

    /// Whether evaluation reads the `other`/`prev` record. Callers that
    /// see `false` need not retain a second record at all.
    pub fn uses_other(&self) -> bool {
        self.uses_other
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Fast-path detection: a program that is exactly one untransformed
    /// field push. Callers copy the field bytes directly and skip the VM
    /// (and the parse/render round trip) entirely.
    pub fn single_field(&self) -> Option<(RecordSlot, usize)> {
        match self.insns.as_slice() {
            [Insn::Field { slot, index, .. }] => Some((*slot, *index)),
            _ => None,
        }
    }

    /// Runs the program. The returned value borrows from the record
    /// buffers, the literal pool, and the arena; it must be consumed
    /// before the caller resets the arena.
    pub fn eval<'v>(&'v self, ctx: &EvalCtx<'v>) -> Value<'v> {
        let mut stack: SmallVec<[Value<'v>; VM_STACK_CAPACITY]> = SmallVec::new();
        let mut pc = 0;
        while pc < self.insns.len() {
            match &self.insns[pc] {
                Insn::Literal(index) => stack.push(match &self.literals[*index] {
                    Literal::Str(s) => Value::Str(s),
                    Literal::Int(v) => Value::Int(*v),
                    Literal::Uint(v) => Value::Uint(*v),
                    Literal::Double(v) => Value::Double(*v),
                    Literal::Bool(v) => Value::Bool(*v),
                }),
                Insn::Field { slot, index, kind } => {
                    stack.push(push_field(ctx, *slot, *index, *kind))
                }
                Insn::RowNumber => stack.push(Value::Uint(ctx.this.record_number())),
                Insn::JumpIfFalse(target) => {
                    if !pop(&mut stack).bool() {
                        pc = *target;
                        continue;
                    }
                }
                Insn::Jump(target) => {
                    pc = *target;
                    continue;
                }
                Insn::Op(code) => {
                    let result = apply(*code, &mut stack, ctx.arena);
                    stack.push(result);
                }
            }
            pc += 1;
        }
        pop(&mut stack)
    }
}

fn pop<'v>(stack: &mut SmallVec<[Value<'v>; VM_STACK_CAPACITY]>) -> Value<'v> {
    match stack.pop() {
        Some(value) => value,
        None => unreachable!("value stack underflow"),
    }
}

/// Reads and converts one field. Missing `prev` is the documented
/// pre-first-output state and yields the kind's zero value; anything else
/// missing means the compiler resolved against the wrong heading, which
/// the record layer reports fatally.
fn push_field<'v>(ctx: &EvalCtx<'v>, slot: RecordSlot, index: usize, kind: DataType) -> Value<'v> {
    let view = match slot {
        RecordSlot::This => ctx.this,
        RecordSlot::Other => match ctx.other.or(ctx.prev) {
            Some(view) => view,
            None => return zero_value(kind),
        },
        RecordSlot::Prev => match ctx.prev {
            Some(view) => view,
            None => return zero_value(kind),
        },
    };
    let bytes = view.mandatory_field(index);
    match kind {
        DataType::Str | DataType::IStr => match std::str::from_utf8(bytes) {
            Ok(s) => Value::Str(s),
            Err(_) => panic!(
                "record {}: string field {} is not valid UTF-8: {:?}",
                view.record_number(),
                index,
                String::from_utf8_lossy(bytes)
            ),
        },
        DataType::Int => Value::Int(parse_int_field(view.record_number(), index, bytes)),
        DataType::Uint => Value::Uint(parse_uint_field(view.record_number(), index, bytes)),
        DataType::Double => Value::Double(parse_double(bytes)),
        DataType::Bool => Value::Bool(parse_bool(bytes) == 1),
        DataType::IpAddr => Value::Ip(parse_ip(bytes)),
    }
}

fn zero_value(kind: DataType) -> Value<'static> {
    match kind {
        DataType::Str | DataType::IStr => Value::Str(""),
        DataType::Int => Value::Int(0),
        DataType::Uint => Value::Uint(0),
        DataType::Double => Value::Double(0.0),
        DataType::Bool => Value::Bool(false),
        DataType::IpAddr => Value::Ip(0),
    }
}

fn parse_int_field(record_number: u64, index: usize, bytes: &[u8]) -> i64 {
    let text = std::str::from_utf8(bytes).ok().map(str::trim);
    match text.and_then(|t| t.parse::<i64>().ok()) {
        Some(v) => v,
        None => panic!(
            "record {}: int field {} holds '{}', not a valid integer",
            record_number,
            index,
            String::from_utf8_lossy(bytes)
        ),
    }
}

fn parse_uint_field(record_number: u64, index: usize, bytes: &[u8]) -> u64 {
    let text = std::str::from_utf8(bytes).ok().map(str::trim);
    match text.and_then(|t| t.parse::<u64>().ok()) {
        Some(v) => v,
        None => panic!(
            "record {}: uint field {} holds '{}', not a valid unsigned integer",
            record_number,
            index,
            String::from_utf8_lossy(bytes)
        ),
    }
}

fn istr_cmp(a: &str, b: &str) -> Ordering {
    let mut ia = a.bytes().map(|b| b.to_ascii_lowercase());
    let mut ib = b.bytes().map(|b| b.to_ascii_lowercase());
    loop {
        match (ia.next(), ib.next()) {
            (Some(ca), Some(cb)) => match ca.cmp(&cb) {
                Ordering::Equal => continue,
                other => return other,
            },
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

fn alloc_str<'v>(arena: &'v Bump, text: &str) -> &'v str {
    arena.alloc_str(text)
}

fn concat<'v>(arena: &'v Bump, a: &str, b: &str) -> &'v str {
    let mut s = BumpString::with_capacity_in(a.len() + b.len(), arena);
    s.push_str(a);
    s.push_str(b);
    s.into_bump_str()
}

fn apply<'v>(
    code: OpCode,
    stack: &mut SmallVec<[Value<'v>; VM_STACK_CAPACITY]>,
    arena: &'v Bump,
) -> Value<'v> {
    use OpCode::*;
    use Value::{Bool, Double, Int, Str, Uint};

    // Binary operands pop right-then-left.
    macro_rules! bin {
        ($conv:ident) => {{
            let b = pop(stack).$conv();
            let a = pop(stack).$conv();
            (a, b)
        }};
    }

    match code {
        AddInt => {
            let (a, b) = bin!(int);
            Int(a.wrapping_add(b))
        }
        AddUint => {
            let (a, b) = bin!(uint);
            Uint(a.wrapping_add(b))
        }
        AddDouble => {
            let (a, b) = bin!(double);
            Double(a + b)
        }
        ConcatStr => {
            let (a, b) = bin!(str);
            Str(concat(arena, a, b))
        }
        SubInt => {
            let (a, b) = bin!(int);
            Int(a.wrapping_sub(b))
        }
        SubUint => {
            let (a, b) = bin!(uint);
            Uint(a.wrapping_sub(b))
        }
        SubDouble => {
            let (a, b) = bin!(double);
            Double(a - b)
        }
        MulInt => {
            let (a, b) = bin!(int);
            Int(a.wrapping_mul(b))
        }
        MulUint => {
            let (a, b) = bin!(uint);
            Uint(a.wrapping_mul(b))
        }
        MulDouble => {
            let (a, b) = bin!(double);
            Double(a * b)
        }
        DivInt => {
            let (a, b) = bin!(int);
            if b == 0 {
                panic!("division by zero: {} / 0", a);
            }
            Int(a.wrapping_div(b))
        }
        DivUint => {
            let (a, b) = bin!(uint);
            if b == 0 {
                panic!("division by zero: {} / 0", a);
            }
            Uint(a / b)
        }
        DivDouble => {
            let (a, b) = bin!(double);
            Double(a / b)
        }
        ModInt => {
            let (a, b) = bin!(int);
            if b == 0 {
                panic!("modulo by zero: {} % 0", a);
            }
            Int(a.wrapping_rem(b))
        }
        ModUint => {
            let (a, b) = bin!(uint);
            if b == 0 {
                panic!("modulo by zero: {} % 0", a);
            }
            Uint(a % b)
        }
        NegInt => Int(pop(stack).int().wrapping_neg()),
        NegDouble => Double(-pop(stack).double()),
        NotBool => Bool(!pop(stack).bool()),
        BitNotInt => Int(!pop(stack).int()),
        BitNotUint => Uint(!pop(stack).uint()),
        ShlInt => {
            let (a, b) = bin!(int);
            Int(a.wrapping_shl(b as u32))
        }
        ShlUint => {
            let (a, b) = bin!(uint);
            Uint(a.wrapping_shl(b as u32))
        }
        ShrInt => {
            let (a, b) = bin!(int);
            Int(a.wrapping_shr(b as u32))
        }
        ShrUint => {
            let (a, b) = bin!(uint);
            Uint(a.wrapping_shr(b as u32))
        }
        BitAndInt => {
            let (a, b) = bin!(int);
            Int(a & b)
        }
        BitAndUint => {
            let (a, b) = bin!(uint);
            Uint(a & b)
        }
        BitOrInt => {
            let (a, b) = bin!(int);
            Int(a | b)
        }
        BitOrUint => {
            let (a, b) = bin!(uint);
            Uint(a | b)
        }
        BitXorInt => {
            let (a, b) = bin!(int);
            Int(a ^ b)
        }
        BitXorUint => {
            let (a, b) = bin!(uint);
            Uint(a ^ b)
        }
        LtInt => {
            let (a, b) = bin!(int);
            Bool(a < b)
        }
        LtUint => {
            let (a, b) = bin!(uint);
            Bool(a < b)
        }
        LtDouble => {
            let (a, b) = bin!(double);
            Bool(a < b)
        }
        LtStr => {
            let (a, b) = bin!(str);
            Bool(a < b)
        }
        LtIStr => {
            let (a, b) = bin!(str);
            Bool(istr_cmp(a, b) == Ordering::Less)
        }
        LeInt => {
            let (a, b) = bin!(int);
            Bool(a <= b)
        }
        LeUint => {
            let (a, b) = bin!(uint);
            Bool(a <= b)
        }
        LeDouble => {
            let (a, b) = bin!(double);
            Bool(a <= b)
        }
        LeStr => {
            let (a, b) = bin!(str);
            Bool(a <= b)
        }
        LeIStr => {
            let (a, b) = bin!(str);
            Bool(istr_cmp(a, b) != Ordering::Greater)
        }
        GtInt => {
            let (a, b) = bin!(int);
            Bool(a > b)
        }
        GtUint => {
            let (a, b) = bin!(uint);
            Bool(a > b)
        }
        GtDouble => {
            let (a, b) = bin!(double);
            Bool(a > b)
        }
        GtStr => {
            let (a, b) = bin!(str);
            Bool(a > b)
        }
        GtIStr => {
            let (a, b) = bin!(str);
            Bool(istr_cmp(a, b) == Ordering::Greater)
        }
        GeInt => {
            let (a, b) = bin!(int);
            Bool(a >= b)
        }
        GeUint => {
            let (a, b) = bin!(uint);
            Bool(a >= b)
        }
        GeDouble => {
            let (a, b) = bin!(double);
            Bool(a >= b)
        }
        GeStr => {
            let (a, b) = bin!(str);
            Bool(a >= b)
        }
        GeIStr => {
            let (a, b) = bin!(str);
            Bool(istr_cmp(a, b) != Ordering::Less)
        }
        EqInt => {
            let (a, b) = bin!(int);
            Bool(a == b)
        }
        EqUint => {
            let (a, b) = bin!(uint);
            Bool(a == b)
        }
        EqDouble => {
            let (a, b) = bin!(double);
            Bool(a == b)
        }
        EqStr => {
            let (a, b) = bin!(str);
            Bool(a == b)
        }
        EqIStr => {
            let (a, b) = bin!(str);
            Bool(a.eq_ignore_ascii_case(b))
        }
        EqBool => {
            let (a, b) = bin!(bool);
            Bool(a == b)
        }
        EqIp => {
            let (a, b) = bin!(ip);
            Bool(a == b)
        }
        NeInt => {
            let (a, b) = bin!(int);
            Bool(a != b)
        }
        NeUint => {
            let (a, b) = bin!(uint);
            Bool(a != b)
        }
        NeDouble => {
            let (a, b) = bin!(double);
            Bool(a != b)
        }
        NeStr => {
            let (a, b) = bin!(str);
            Bool(a != b)
        }
        NeIStr => {
            let (a, b) = bin!(str);
            Bool(!a.eq_ignore_ascii_case(b))
        }
        NeBool => {
            let (a, b) = bin!(bool);
            Bool(a != b)
        }
        NeIp => {
            let (a, b) = bin!(ip);
            Bool(a != b)
        }
        AndBool => {
            let (a, b) = bin!(bool);
            Bool(a && b)
        }
        OrBool => {
            let (a, b) = bin!(bool);
            Bool(a || b)
        }
        StrStartsWith => {
            let (a, b) = bin!(str);
            Bool(a.starts_with(b))
        }
        StrEndsWith => {
            let (a, b) = bin!(str);
            Bool(a.ends_with(b))
        }
        StrContains => {
            let (a, b) = bin!(str);
            Bool(a.contains(b))
        }
        StrLen => Uint(pop(stack).str().len() as u64),
        StrLower => {
            let s = pop(stack).str();
            let mut out = BumpString::with_capacity_in(s.len(), arena);
            for c in s.chars() {
                out.push(c.to_ascii_lowercase());
            }
            Str(out.into_bump_str())
        }
        StrUpper => {
            let s = pop(stack).str();
            let mut out = BumpString::with_capacity_in(s.len(), arena);
            for c in s.chars() {
                out.push(c.to_ascii_uppercase());
            }
            Str(out.into_bump_str())
        }
        ToIntFromStr => {
            let s = pop(stack).str();
            match s.trim().parse::<i64>() {
                Ok(v) => Int(v),
                Err(_) => panic!("to_int: '{}' is not a valid integer", s),
            }
        }
        ToIntFromUint => {
            let v = pop(stack).uint();
            if v > i64::MAX as u64 {
                panic!("to_int: {} overflows the signed range", v);
            }
            Int(v as i64)
        }
        ToUintFromStr => {
            let s = pop(stack).str();
            match s.trim().parse::<u64>() {
                Ok(v) => Uint(v),
                Err(_) => panic!("to_uint: '{}' is not a valid unsigned integer", s),
            }
        }
        ToUintFromInt => {
            let v = pop(stack).int();
            if v < 0 {
                panic!("to_uint: {} is negative", v);
            }
            Uint(v as u64)
        }
        ToDoubleFromStr => Double(parse_double(pop(stack).str().as_bytes())),
        ToDoubleFromInt => Double(pop(stack).int() as f64),
        ToDoubleFromUint => Double(pop(stack).uint() as f64),
        ToStringFromInt => Str(alloc_str(arena, &pop(stack).int().to_string())),
        ToStringFromUint => Str(alloc_str(arena, &pop(stack).uint().to_string())),
        ToStringFromDouble => Str(alloc_str(arena, &pop(stack).double().to_string())),
        ToStringFromBool => Str(alloc_str(
            arena,
            if pop(stack).bool() { "1" } else { "0" },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::builder::write_record;

    fn record(fields: &[&str]) -> Vec<u8> {
        let bytes: Vec<&[u8]> = fields.iter().map(|f| f.as_bytes()).collect();
        let mut out = Vec::new();
        write_record(&mut out, &bytes);
        out
    }

    fn eval_owned(program: &Program, fields: &[&str], number: u64) -> Vec<u8> {
        let bytes = record(fields);
        let arena = Bump::new();
        let ctx = EvalCtx::new(RecordView::parse(&bytes, number), &arena);
        let mut out = Vec::new();
        program.eval(&ctx).write_field(&mut out);
        out
    }

    #[test]
    fn literal_arithmetic() {
        let program = Program::new(
            vec![Insn::Literal(0), Insn::Literal(1), Insn::Op(OpCode::AddInt)],
            vec![Literal::Int(40), Literal::Int(2)],
            DataType::Int,
            false,
        );
        assert_eq!(eval_owned(&program, &[], 1), b"42");
    }

    #[test]
    fn field_parse_and_compare() {
        let program = Program::new(
            vec![
                Insn::Field {
                    slot: RecordSlot::This,
                    index: 0,
                    kind: DataType::Int,
                },
                Insn::Literal(0),
                Insn::Op(OpCode::LtInt),
            ],
            vec![Literal::Int(1700)],
            DataType::Bool,
            false,
        );
        assert_eq!(eval_owned(&program, &["1685"], 1), b"1");
        assert_eq!(eval_owned(&program, &["1750"], 2), b"0");
    }

    #[test]
    fn jumps_select_a_branch() {
        // if (field0) then ("yes") else ("no")
        let program = Program::new(
            vec![
                Insn::Field {
                    slot: RecordSlot::This,
                    index: 0,
                    kind: DataType::Bool,
                },
                Insn::JumpIfFalse(4),
                Insn::Literal(0),
                Insn::Jump(5),
                Insn::Literal(1),
            ],
            vec![
                Literal::Str("yes".to_string()),
                Literal::Str("no".to_string()),
            ],
            DataType::Str,
            false,
        );
        assert_eq!(eval_owned(&program, &["1"], 1), b"yes");
        assert_eq!(eval_owned(&program, &["0"], 2), b"no");
    }

    #[test]
    fn arena_strings_survive_until_render() {
        let program = Program::new(
            vec![
                Insn::Field {
                    slot: RecordSlot::This,
                    index: 0,
                    kind: DataType::Str,
                },
                Insn::Literal(0),
                Insn::Op(OpCode::ConcatStr),
                Insn::Op(OpCode::StrUpper),
            ],
            vec![Literal::Str(" bach".to_string())],
            DataType::Str,
            false,
        );
        assert_eq!(eval_owned(&program, &["johann"], 1), b"JOHANN BACH");
    }

    #[test]
    fn row_number_reads_stream_position() {
        let program = Program::new(vec![Insn::RowNumber], vec![], DataType::Uint, false);
        assert_eq!(eval_owned(&program, &["x"], 17), b"17");
    }

    #[test]
    fn prev_fields_default_before_first_output() {
        let program = Program::new(
            vec![Insn::Field {
                slot: RecordSlot::Prev,
                index: 0,
                kind: DataType::Uint,
            }],
            vec![],
            DataType::Uint,
            true,
        );
        assert_eq!(eval_owned(&program, &["9"], 1), b"0");
    }

    #[test]
    fn single_field_detection() {
        let fast = Program::new(
            vec![Insn::Field {
                slot: RecordSlot::This,
                index: 2,
                kind: DataType::Str,
            }],
            vec![],
            DataType::Str,
            false,
        );
        assert_eq!(fast.single_field(), Some((RecordSlot::This, 2)));

        let slow = Program::new(
            vec![
                Insn::Field {
                    slot: RecordSlot::This,
                    index: 2,
                    kind: DataType::Str,
                },
                Insn::Op(OpCode::StrLen),
            ],
            vec![],
            DataType::Uint,
            false,
        );
        assert_eq!(slow.single_field(), None);
    }

    #[test]
    fn istring_comparison_folds_case() {
        let program = Program::new(
            vec![
                Insn::Field {
                    slot: RecordSlot::This,
                    index: 0,
                    kind: DataType::IStr,
                },
                Insn::Literal(0),
                Insn::Op(OpCode::EqIStr),
            ],
            vec![Literal::Str("BACH".to_string())],
            DataType::Bool,
            false,
        );
        assert_eq!(eval_owned(&program, &["bach"], 1), b"1");
        assert_eq!(eval_owned(&program, &["handel"], 2), b"0");
    }

    #[test]
    #[should_panic(expected = "not a valid integer")]
    fn malformed_int_field_is_fatal() {
        let program = Program::new(
            vec![Insn::Field {
                slot: RecordSlot::This,
                index: 0,
                kind: DataType::Int,
            }],
            vec![],
            DataType::Int,
            false,
        );
        eval_owned(&program, &["not-a-number"], 3);
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn division_by_zero_is_fatal() {
        let program = Program::new(
            vec![Insn::Literal(0), Insn::Literal(1), Insn::Op(OpCode::DivInt)],
            vec![Literal::Int(1), Literal::Int(0)],
            DataType::Int,
            false,
        );
        eval_owned(&program, &[], 1);
    }

    #[test]
    fn ip_values_render_dotted() {
        let program = Program::new(
            vec![Insn::Field {
                slot: RecordSlot::This,
                index: 0,
                kind: DataType::IpAddr,
            }],
            vec![],
            DataType::IpAddr,
            false,
        );
        assert_eq!(eval_owned(&program, &["2130706433"], 1), b"127.0.0.1");
    }
}
