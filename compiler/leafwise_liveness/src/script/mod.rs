//! Textual self-test scripts.
//!
//! A script is a list of commands, one per line, run against a [`Function`].
//! Each command builds a live range, feeds it the defs and uses named on
//! the line, and renders the liveness dump followed by the boundary.
//!
//! ```text
//! fs_ssa_use_liveness %3 0 2 uses: bb1[0] ending 0 1 bb2[1] non-use 1 2
//! fieldsensitive-multidefuse-liverange %1 defs: bb0[2] 0 2 %4 0 1 uses: bb3[0] true 0 2
//! ```
//!
//! `%N` names a value; `bbB[I]` names the `I`-th instruction of block `B`.
//! Blank lines and lines starting with `//` are skipped.

use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::SplitWhitespace;

use thiserror::Error;

use leafwise_ir::{BlockId, Function, InstId, ValueId};

use crate::boundary::Boundary;
use crate::leaf_count::LeafCounter;
use crate::live_range::{MultiDefLiveRange, SsaLiveRange};
use crate::range::LeafRange;

/// Single-def command: `<value> <begin> <end> uses: (<inst> <kind> <begin> <end>)*`.
pub const SSA_USE_LIVENESS: &str = "fs_ssa_use_liveness";

/// Multi-def command:
/// `<value> defs: (<ref> <begin> <end>)* uses: (<inst> <bool> <begin> <end>)*`.
pub const MULTI_DEF_USE_LIVE_RANGE: &str = "fieldsensitive-multidefuse-liverange";

/// Malformed script input.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unknown test command `{0}`")]
    UnknownCommand(String),

    #[error("expected the `{expected}` label, found `{found}`")]
    MissingLabel {
        expected: &'static str,
        found: String,
    },

    #[error("unknown use kind `{0}`: expected `non-use`, `ending` or `non-ending`")]
    UnknownUseKind(String),

    #[error("`{0}` does not name a value or instruction of the function")]
    BadReference(String),

    #[error("expected an unsigned integer, found `{0}`")]
    BadInteger(String),

    #[error("expected `true` or `false`, found `{0}`")]
    BadBool(String),

    #[error("leaf range [{begin}, {end}) does not fit in {num_leaves} leaves")]
    BadRange {
        begin: usize,
        end: usize,
        num_leaves: usize,
    },

    #[error("unexpected end of command: expected {0}")]
    UnexpectedEnd(&'static str),
}

/// Run every command in `script` and return the concatenated dumps.
pub fn run_script(
    func: &Function,
    counter: &LeafCounter<'_>,
    script: &str,
) -> Result<String, ScriptError> {
    crate::init_tracing();
    let mut out = String::new();
    for line in script.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let mut args = Args::new(func, line);
        let command = args.take("a command name")?;
        tracing::debug!(command, func = %func.name, "running script command");
        match command {
            SSA_USE_LIVENESS => run_ssa(&mut args, counter, &mut out)?,
            MULTI_DEF_USE_LIVE_RANGE => run_multi_def(&mut args, counter, &mut out)?,
            other => return Err(ScriptError::UnknownCommand(other.to_owned())),
        }
    }
    Ok(out)
}

/// How a use line registers its instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UseTag {
    NonUse,
    Ending,
    NonEnding,
}

impl UseTag {
    fn parse(token: &str) -> Result<Self, ScriptError> {
        match token {
            "non-use" => Ok(UseTag::NonUse),
            "ending" => Ok(UseTag::Ending),
            "non-ending" => Ok(UseTag::NonEnding),
            other => Err(ScriptError::UnknownUseKind(other.to_owned())),
        }
    }
}

/// A parsed `%N` or `bbB[I]` reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ref {
    Value(ValueId),
    Inst(InstId),
}

fn run_ssa(
    args: &mut Args<'_>,
    counter: &LeafCounter<'_>,
    out: &mut String,
) -> Result<(), ScriptError> {
    let func = args.func;
    let value = args.take_value()?;
    let mut range = SsaLiveRange::for_root(func, counter, value);
    let def_range = args.take_range(range.num_sub_elements())?;
    range.initialize_def(value, def_range);

    args.take_label("uses:")?;
    while args.has_untaken() {
        let inst = args.take_inst()?;
        let tag = UseTag::parse(args.take("a use kind")?)?;
        let leaves = args.take_range(range.num_sub_elements())?;
        match tag {
            UseTag::NonUse => range.extend_to_non_use(inst, leaves),
            UseTag::Ending => range.update_for_use(inst, leaves, true),
            UseTag::NonEnding => range.update_for_use(inst, leaves, false),
        }
    }

    let mut boundary = Boundary::new(range.num_sub_elements());
    range.compute_boundary(&mut boundary);
    write_dump(out, &range, &boundary, func);
    Ok(())
}

fn run_multi_def(
    args: &mut Args<'_>,
    counter: &LeafCounter<'_>,
    out: &mut String,
) -> Result<(), ScriptError> {
    let func = args.func;
    let value = args.take_value()?;
    let mut range = MultiDefLiveRange::for_root(func, counter, value);
    let num_leaves = range.num_sub_elements();

    out.push_str("FieldSensitive MultiDef lifetime analysis:\n");
    args.take_label("defs:")?;
    loop {
        let token = args.take("the `uses:` label")?;
        if token == "uses:" {
            break;
        }
        let Some(def) = parse_ref(func, token)? else {
            return Err(ScriptError::MissingLabel {
                expected: "uses:",
                found: token.to_owned(),
            });
        };
        let leaves = args.take_range(num_leaves)?;
        match def {
            Ref::Inst(inst) => {
                let _ = writeln!(
                    out,
                    "  def in range {leaves} instruction: {}",
                    func.display_inst(inst)
                );
                range.initialize_def_inst(inst, leaves);
            }
            Ref::Value(def_value) => {
                let _ = writeln!(out, "  def in range {leaves} value: {def_value}");
                range.initialize_def_value(def_value, leaves);
            }
        }
    }
    range.finished_initialization_of_defs();

    while args.has_untaken() {
        let inst = args.take_inst()?;
        let lifetime_ending = args.take_bool()?;
        let leaves = args.take_range(num_leaves)?;
        range.update_for_use(inst, leaves, lifetime_ending);
    }

    let mut boundary = Boundary::new(num_leaves);
    range.compute_boundary(&mut boundary);
    write_dump(out, &range, &boundary, func);
    Ok(())
}

fn write_dump(out: &mut String, range: &impl std::fmt::Display, boundary: &Boundary, func: &Function) {
    // Writing into a String cannot fail.
    let _ = write!(out, "{range}{}", boundary.display(func));
}

/// Parse `token` as a reference. `Ok(None)` if it does not look like one.
fn parse_ref(func: &Function, token: &str) -> Result<Option<Ref>, ScriptError> {
    let bad = || ScriptError::BadReference(token.to_owned());

    if let Some(raw) = token.strip_prefix('%') {
        let index: u32 = raw.parse().map_err(|_| bad())?;
        if index as usize >= func.num_values() {
            return Err(bad());
        }
        return Ok(Some(Ref::Value(ValueId::new(index))));
    }

    if let Some(rest) = token.strip_prefix("bb") {
        let (block, index) = rest
            .strip_suffix(']')
            .and_then(|rest| rest.split_once('['))
            .ok_or_else(bad)?;
        let block: u32 = block.parse().map_err(|_| bad())?;
        let index: usize = index.parse().map_err(|_| bad())?;
        if block as usize >= func.num_blocks() {
            return Err(bad());
        }
        let inst = func.inst_at(BlockId::new(block), index).ok_or_else(bad)?;
        return Ok(Some(Ref::Inst(inst)));
    }

    Ok(None)
}

/// Whitespace-separated arguments of one command line.
struct Args<'a> {
    func: &'a Function,
    tokens: Peekable<SplitWhitespace<'a>>,
}

impl<'a> Args<'a> {
    fn new(func: &'a Function, line: &'a str) -> Self {
        Self {
            func,
            tokens: line.split_whitespace().peekable(),
        }
    }

    fn has_untaken(&mut self) -> bool {
        self.tokens.peek().is_some()
    }

    fn take(&mut self, what: &'static str) -> Result<&'a str, ScriptError> {
        self.tokens.next().ok_or(ScriptError::UnexpectedEnd(what))
    }

    fn take_label(&mut self, label: &'static str) -> Result<(), ScriptError> {
        let found = self.take(label)?;
        if found == label {
            Ok(())
        } else {
            Err(ScriptError::MissingLabel {
                expected: label,
                found: found.to_owned(),
            })
        }
    }

    fn take_uint(&mut self) -> Result<usize, ScriptError> {
        let token = self.take("an unsigned integer")?;
        token
            .parse()
            .map_err(|_| ScriptError::BadInteger(token.to_owned()))
    }

    fn take_bool(&mut self) -> Result<bool, ScriptError> {
        match self.take("`true` or `false`")? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ScriptError::BadBool(other.to_owned())),
        }
    }

    /// `<begin> <end>`, checked against the tracked leaf count.
    fn take_range(&mut self, num_leaves: usize) -> Result<LeafRange, ScriptError> {
        let begin = self.take_uint()?;
        let end = self.take_uint()?;
        if begin > end || end > num_leaves {
            return Err(ScriptError::BadRange {
                begin,
                end,
                num_leaves,
            });
        }
        Ok(LeafRange::new(begin, end))
    }

    fn take_ref(&mut self, what: &'static str) -> Result<Ref, ScriptError> {
        let token = self.take(what)?;
        parse_ref(self.func, token)?.ok_or_else(|| ScriptError::BadReference(token.to_owned()))
    }

    fn take_value(&mut self) -> Result<ValueId, ScriptError> {
        match self.take_ref("a value")? {
            Ref::Value(value) => Ok(value),
            Ref::Inst(inst) => self
                .func
                .result(inst)
                .ok_or_else(|| ScriptError::BadReference(inst.to_string())),
        }
    }

    fn take_inst(&mut self) -> Result<InstId, ScriptError> {
        match self.take_ref("an instruction")? {
            Ref::Inst(inst) => Ok(inst),
            Ref::Value(value) => self
                .func
                .defining_inst(value)
                .ok_or_else(|| ScriptError::BadReference(value.to_string())),
        }
    }
}
