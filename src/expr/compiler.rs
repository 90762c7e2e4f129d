//! # rlang Compiler
//!
//! Walks postfix tokens with a simulated type stack and emits a
//! [`Program`]. Everything the VM trusts at runtime is proven here: operand
//! counts, operand types, literal/field indices, jump targets, stack depth.
//!
//! ## Field Resolution
//!
//! Identifiers resolve against up to two headings. Bare names and `this.`
//! names resolve against the current record; `other.` against the second
//! record a binary operator has in scope; `prev.` against the previously
//! emitted output record of a select. In a select, `other.` with no second
//! input heading is an alias for `prev.`. `row_number` is a builtin uint
//! pseudo-field.
//!
//! ## `if` / `then` / `else`
//!
//! The parser delivers these as three juxtaposed one-argument calls. The
//! compiler pairs them by postfix position: `then`'s arguments must start
//! exactly where `if` ended, `else`'s exactly where `then` ended. `if`
//! lowers to a conditional jump over the then-branch, `then` appends an
//! unconditional jump over the else-branch, and both targets are
//! backpatched as the branch ends become known. Both branches must yield
//! the same static type.
//!
//! ## Select Fixed Point
//!
//! A select list may reference its own output columns through `prev.`
//! before their types are known. Compilation iterates: every pass attempts
//! each not-yet-compiled column against the currently known output
//! columns, and stops when a pass compiles nothing new. A stalled pass
//! means a circular or ambiguous reference, reported with the column that
//! needs an explicit `as type:name`.

use eyre::{bail, eyre, Report, Result};
use smallvec::SmallVec;

use crate::config::{COMPILE_STACK_CAPACITY, MAX_LITERALS, MAX_PROGRAM_LEN, VM_STACK_CAPACITY};
use crate::record::{Column, Heading};
use crate::types::DataType;

use super::lexer::tokenize;
use super::parser::{parse_expression, split_expressions, strip_as_clause, PostfixItem, PostfixToken};
use super::registry;
use super::vm::{Insn, Literal, Program, RecordSlot};

/// Headings in scope for one compilation.
pub struct CompileCtx<'h> {
    pub this: &'h Heading,
    pub other: Option<&'h Heading>,
    /// Select output columns known so far, by output position. `None`
    /// entries are columns whose type has not been derived yet.
    prev: Option<&'h [Option<Column>]>,
}

impl<'h> CompileCtx<'h> {
    pub fn single(this: &'h Heading) -> CompileCtx<'h> {
        CompileCtx {
            this,
            other: None,
            prev: None,
        }
    }

    pub fn pair(this: &'h Heading, other: &'h Heading) -> CompileCtx<'h> {
        CompileCtx {
            this,
            other: Some(other),
            prev: None,
        }
    }
}

/// Compiles one expression of any result type.
pub fn compile(text: &str, ctx: &CompileCtx<'_>) -> Result<Program> {
    let lexemes = tokenize(text)?;
    let postfix = parse_expression(&lexemes)?;
    compile_postfix(&postfix, ctx).map_err(CompileFail::into_report)
}

/// Compiles a filter expression; the result type must be bool.
pub fn compile_predicate(text: &str, ctx: &CompileCtx<'_>) -> Result<Program> {
    let program = compile(text, ctx)?;
    if program.return_type() != DataType::Bool {
        bail!(
            "filter expression must yield bool, got {}",
            program.return_type()
        );
    }
    Ok(program)
}

/// A compiled select list: one program per output column plus the output
/// heading.
#[derive(Debug)]
pub struct SelectList {
    pub heading: Heading,
    pub programs: Vec<Program>,
}

impl SelectList {
    /// Whether any column reads the previously emitted output record.
    pub fn uses_prev(&self) -> bool {
        self.programs.iter().any(Program::uses_other)
    }
}

/// Compiles a semicolon-separated select list against one input heading.
pub fn compile_select(text: &str, this: &Heading) -> Result<SelectList> {
    let lexemes = tokenize(text)?;
    let segments = split_expressions(&lexemes)?;

    struct Entry {
        postfix: Vec<PostfixToken>,
        name: String,
        declared: Option<DataType>,
        line: u32,
    }

    let mut entries: Vec<Entry> = Vec::with_capacity(segments.len());
    let mut known: Vec<Option<Column>> = Vec::with_capacity(segments.len());

    for segment in &segments {
        let (expr, descriptor) = strip_as_clause(segment)?;
        let line = segment.first().map_or(1, |l| l.line);
        let postfix = parse_expression(expr)?;

        match descriptor {
            Some(descriptor) => {
                let column = Heading::parse_descriptor(descriptor)?;
                let declared = column.tagged.then_some(column.data_type);
                known.push(declared.map(|dt| Column::new(column.name.clone(), dt)));
                entries.push(Entry {
                    postfix,
                    name: column.name,
                    declared,
                    line,
                });
            }
            None => {
                // Without a rename clause the expression must be a plain
                // column copy; the output column inherits name and type.
                let name = match postfix.as_slice() {
                    [PostfixToken {
                        item: PostfixItem::Ident(name),
                        ..
                    }] => bare_name(name).to_string(),
                    _ => bail!(
                        "line {}: select expression needs an 'as [type:]name' clause",
                        line
                    ),
                };
                if name == "row_number" {
                    known.push(Some(Column::new(name.clone(), DataType::Uint)));
                } else {
                    let index = this.mandatory_find(&name)?;
                    let column = this.column(index);
                    known.push(Some(Column::new(name.clone(), column.data_type)));
                }
                entries.push(Entry {
                    postfix,
                    name,
                    declared: None,
                    line,
                });
            }
        }
    }

    for (i, entry) in entries.iter().enumerate() {
        if entries[..i].iter().any(|e| e.name == entry.name) {
            bail!(
                "line {}: duplicate output column '{}'",
                entry.line,
                entry.name
            );
        }
    }

    let mut programs: Vec<Option<Program>> = Vec::new();
    programs.resize_with(entries.len(), || None);

    loop {
        let mut progress = false;
        let mut stalled: Option<&Entry> = None;

        for (i, entry) in entries.iter().enumerate() {
            if programs[i].is_some() {
                continue;
            }
            let ctx = CompileCtx {
                this,
                other: None,
                prev: Some(&known),
            };
            match compile_postfix(&entry.postfix, &ctx) {
                Ok(program) => {
                    if let Some(declared) = entry.declared {
                        if program.return_type() != declared {
                            bail!(
                                "line {}: column '{}' is declared {} but the expression yields {}",
                                entry.line,
                                entry.name,
                                declared,
                                program.return_type()
                            );
                        }
                    }
                    known[i] = Some(Column::new(entry.name.clone(), program.return_type()));
                    programs[i] = Some(program);
                    progress = true;
                }
                Err(CompileFail::Unresolved { .. }) => stalled = Some(entry),
                Err(fail) => return Err(fail.into_report()),
            }
        }

        match stalled {
            None => break,
            Some(entry) if !progress => bail!(
                "line {}: cannot derive the type of select column '{}'; \
                 add an explicit 'as type:name' clause",
                entry.line,
                entry.name
            ),
            Some(_) => {}
        }
    }

    let columns = known
        .into_iter()
        .map(|c| c.unwrap_or_else(|| unreachable!("fixed point left a column untyped")))
        .collect();
    let programs = programs
        .into_iter()
        .map(|p| p.unwrap_or_else(|| unreachable!("fixed point left a column uncompiled")))
        .collect();
    Ok(SelectList {
        heading: Heading::from_columns(columns),
        programs,
    })
}

/// Compilation failure. `Unresolved` marks a `prev.` reference to a
/// column whose type is not known yet; the select fixed point retries
/// those, everything else is final.
enum CompileFail {
    Unresolved { name: String, line: u32 },
    Hard(Report),
}

impl CompileFail {
    fn into_report(self) -> Report {
        match self {
            CompileFail::Unresolved { name, line } => {
                eyre!("line {}: unknown column 'prev.{}'", line, name)
            }
            CompileFail::Hard(report) => report,
        }
    }
}

fn hard(report: Report) -> CompileFail {
    CompileFail::Hard(report)
}

#[derive(Clone, Copy)]
enum IfStage {
    /// `if` seen; holds the index of its placeholder conditional jump.
    AwaitThen { jump_if_false: usize },
    /// `then` seen; holds the index of its placeholder unconditional jump
    /// and the then-branch type.
    AwaitElse { jump: usize, then_type: DataType },
}

struct PendingIf {
    stage: IfStage,
    /// Postfix index the next branch call's arguments must start at.
    next_start: usize,
}

fn bare_name(name: &str) -> &str {
    name.strip_prefix("this.")
        .or_else(|| name.strip_prefix("other."))
        .or_else(|| name.strip_prefix("prev."))
        .unwrap_or(name)
}

fn compile_postfix(items: &[PostfixToken], ctx: &CompileCtx<'_>) -> Result<Program, CompileFail> {
    let mut insns: Vec<Insn> = Vec::with_capacity(items.len());
    let mut literals: Vec<Literal> = Vec::new();
    let mut types: SmallVec<[DataType; COMPILE_STACK_CAPACITY]> = SmallVec::new();
    let mut pending: Vec<PendingIf> = Vec::new();
    let mut uses_other = false;

    let emit = |insns: &mut Vec<Insn>, insn: Insn, line: u32| -> Result<usize, CompileFail> {
        if insns.len() >= MAX_PROGRAM_LEN {
            return Err(hard(eyre!(
                "line {}: expression compiles to more than {} instructions",
                line,
                MAX_PROGRAM_LEN
            )));
        }
        insns.push(insn);
        Ok(insns.len() - 1)
    };

    let push_type = |types: &mut SmallVec<[DataType; COMPILE_STACK_CAPACITY]>,
                     dt: DataType,
                     line: u32|
     -> Result<(), CompileFail> {
        if types.len() >= VM_STACK_CAPACITY {
            return Err(hard(eyre!(
                "line {}: expression nests deeper than {} values",
                line,
                VM_STACK_CAPACITY
            )));
        }
        types.push(dt);
        Ok(())
    };

    for (index, token) in items.iter().enumerate() {
        let line = token.line;
        match &token.item {
            PostfixItem::Str(s) => {
                let slot = add_literal(&mut literals, Literal::Str(s.clone()), line)?;
                emit(&mut insns, Insn::Literal(slot), line)?;
                push_type(&mut types, DataType::Str, line)?;
            }
            PostfixItem::Int(v) => {
                let slot = add_literal(&mut literals, Literal::Int(*v), line)?;
                emit(&mut insns, Insn::Literal(slot), line)?;
                push_type(&mut types, DataType::Int, line)?;
            }
            PostfixItem::Uint(v) => {
                let slot = add_literal(&mut literals, Literal::Uint(*v), line)?;
                emit(&mut insns, Insn::Literal(slot), line)?;
                push_type(&mut types, DataType::Uint, line)?;
            }
            PostfixItem::Double(v) => {
                let slot = add_literal(&mut literals, Literal::Double(*v), line)?;
                emit(&mut insns, Insn::Literal(slot), line)?;
                push_type(&mut types, DataType::Double, line)?;
            }
            PostfixItem::Bool(v) => {
                let slot = add_literal(&mut literals, Literal::Bool(*v), line)?;
                emit(&mut insns, Insn::Literal(slot), line)?;
                push_type(&mut types, DataType::Bool, line)?;
            }
            PostfixItem::Ident(name) => {
                if name == "row_number" {
                    emit(&mut insns, Insn::RowNumber, line)?;
                    push_type(&mut types, DataType::Uint, line)?;
                    continue;
                }
                let (slot, field_index, kind) = resolve_field(name, ctx, line)?;
                if slot != RecordSlot::This {
                    uses_other = true;
                }
                emit(
                    &mut insns,
                    Insn::Field {
                        slot,
                        index: field_index,
                        kind,
                    },
                    line,
                )?;
                push_type(&mut types, kind, line)?;
            }
            PostfixItem::Call {
                name,
                arity,
                out_start,
            } => match name.as_str() {
                "if" => {
                    if *arity != 1 {
                        return Err(hard(eyre!(
                            "line {}: 'if' takes exactly one condition",
                            line
                        )));
                    }
                    match types.pop() {
                        Some(DataType::Bool) => {}
                        Some(other) => {
                            return Err(hard(eyre!(
                                "line {}: 'if' condition must be bool, got {}",
                                line,
                                other
                            )))
                        }
                        None => {
                            return Err(hard(eyre!("line {}: 'if' is missing its condition", line)))
                        }
                    }
                    let jump_if_false = emit(&mut insns, Insn::JumpIfFalse(0), line)?;
                    pending.push(PendingIf {
                        stage: IfStage::AwaitThen { jump_if_false },
                        next_start: index + 1,
                    });
                }
                "then" => {
                    if *arity != 1 {
                        return Err(hard(eyre!(
                            "line {}: 'then' takes exactly one expression",
                            line
                        )));
                    }
                    let Some(top) = pending.last_mut() else {
                        return Err(hard(eyre!("line {}: 'then' without a matching 'if'", line)));
                    };
                    let IfStage::AwaitThen { jump_if_false } = top.stage else {
                        return Err(hard(eyre!(
                            "line {}: 'then' where 'else' was expected",
                            line
                        )));
                    };
                    if *out_start != top.next_start {
                        return Err(hard(eyre!(
                            "line {}: 'then' must immediately follow its 'if'",
                            line
                        )));
                    }
                    let then_type = types.pop().unwrap_or_else(|| {
                        unreachable!("then argument type missing from simulated stack")
                    });
                    let jump = emit(&mut insns, Insn::Jump(0), line)?;
                    insns[jump_if_false] = Insn::JumpIfFalse(insns.len());
                    top.stage = IfStage::AwaitElse { jump, then_type };
                    top.next_start = index + 1;
                }
                "else" => {
                    if *arity != 1 {
                        return Err(hard(eyre!(
                            "line {}: 'else' takes exactly one expression",
                            line
                        )));
                    }
                    let Some(top) = pending.pop() else {
                        return Err(hard(eyre!("line {}: 'else' without a matching 'if'", line)));
                    };
                    let IfStage::AwaitElse { jump, then_type } = top.stage else {
                        return Err(hard(eyre!(
                            "line {}: 'else' before its 'then' branch",
                            line
                        )));
                    };
                    if *out_start != top.next_start {
                        return Err(hard(eyre!(
                            "line {}: 'else' must immediately follow its 'then'",
                            line
                        )));
                    }
                    let else_type = types.pop().unwrap_or_else(|| {
                        unreachable!("else argument type missing from simulated stack")
                    });
                    if else_type != then_type {
                        return Err(hard(eyre!(
                            "line {}: 'if' branches disagree: then yields {}, else yields {}",
                            line,
                            then_type,
                            else_type
                        )));
                    }
                    insns[jump] = Insn::Jump(insns.len());
                    push_type(&mut types, then_type, line)?;
                }
                _ => {
                    let ret = apply_registered(name, *arity, &mut types, &mut insns, line)?;
                    push_type(&mut types, ret, line)?;
                }
            },
            PostfixItem::Op { name, arity } => {
                let ret = apply_registered(name, *arity, &mut types, &mut insns, line)?;
                push_type(&mut types, ret, line)?;
            }
        }
    }

    if let Some(unclosed) = pending.last() {
        let what = match unclosed.stage {
            IfStage::AwaitThen { .. } => "'then'",
            IfStage::AwaitElse { .. } => "'else'",
        };
        return Err(hard(eyre!("'if' is missing its {} branch", what)));
    }
    match types.len() {
        1 => {}
        0 => return Err(hard(eyre!("expression produces no value"))),
        n => {
            return Err(hard(eyre!(
                "expression leaves {} values; terms cannot be juxtaposed",
                n
            )))
        }
    }

    Ok(Program::new(insns, literals, types[0], uses_other))
}

fn add_literal(
    literals: &mut Vec<Literal>,
    literal: Literal,
    line: u32,
) -> Result<usize, CompileFail> {
    if literals.len() >= MAX_LITERALS {
        return Err(hard(eyre!(
            "line {}: expression has more than {} literals",
            line,
            MAX_LITERALS
        )));
    }
    literals.push(literal);
    Ok(literals.len() - 1)
}

fn resolve_field(
    name: &str,
    ctx: &CompileCtx<'_>,
    line: u32,
) -> Result<(RecordSlot, usize, DataType), CompileFail> {
    if let Some(rest) = name.strip_prefix("prev.") {
        return resolve_prev(rest, ctx, line).map(|(i, dt)| (RecordSlot::Prev, i, dt));
    }
    if let Some(rest) = name.strip_prefix("other.") {
        return match ctx.other {
            Some(other) => {
                let index = other
                    .mandatory_find(rest)
                    .map_err(|e| hard(e.wrap_err(format!("line {}", line))))?;
                Ok((RecordSlot::Other, index, other.column(index).data_type))
            }
            // In a select there is no second input; `other.` reads the
            // previous output record.
            None if ctx.prev.is_some() => {
                resolve_prev(rest, ctx, line).map(|(i, dt)| (RecordSlot::Other, i, dt))
            }
            None => Err(hard(eyre!(
                "line {}: no second record in scope for 'other.{}'",
                line,
                rest
            ))),
        };
    }
    let rest = name.strip_prefix("this.").unwrap_or(name);
    let index = ctx
        .this
        .mandatory_find(rest)
        .map_err(|e| hard(e.wrap_err(format!("line {}", line))))?;
    Ok((RecordSlot::This, index, ctx.this.column(index).data_type))
}

fn resolve_prev(
    name: &str,
    ctx: &CompileCtx<'_>,
    line: u32,
) -> Result<(usize, DataType), CompileFail> {
    let Some(columns) = ctx.prev else {
        return Err(hard(eyre!(
            "line {}: no previous output record in scope for 'prev.{}'",
            line,
            name
        )));
    };
    for (index, column) in columns.iter().enumerate() {
        if let Some(column) = column {
            if column.name == name {
                return Ok((index, column.data_type));
            }
        }
    }
    Err(CompileFail::Unresolved {
        name: name.to_string(),
        line,
    })
}

fn apply_registered(
    name: &str,
    arity: usize,
    types: &mut SmallVec<[DataType; COMPILE_STACK_CAPACITY]>,
    insns: &mut Vec<Insn>,
    line: u32,
) -> Result<DataType, CompileFail> {
    if types.len() < arity {
        return Err(hard(eyre!(
            "line {}: '{}' needs {} arguments, {} available",
            line,
            name,
            arity,
            types.len()
        )));
    }
    let args = &types[types.len() - arity..];
    let def = match registry::resolve(name, args) {
        Some(def) => def,
        None if !registry::is_known_name(name) => {
            return Err(hard(eyre!(
                "line {}: unknown function or operator '{}'",
                line,
                name
            )))
        }
        None => {
            let given: Vec<&str> = args.iter().map(|dt| dt.tag()).collect();
            return Err(hard(eyre!(
                "line {}: no overload of '{}' matches ({}); known overloads:\n{}",
                line,
                name,
                given.join(", "),
                registry::render_overloads(name)
            )));
        }
    };
    types.truncate(types.len() - arity);
    if insns.len() >= MAX_PROGRAM_LEN {
        return Err(hard(eyre!(
            "line {}: expression compiles to more than {} instructions",
            line,
            MAX_PROGRAM_LEN
        )));
    }
    insns.push(Insn::Op(def.code));
    Ok(def.ret)
}
