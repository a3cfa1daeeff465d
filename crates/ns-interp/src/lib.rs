// NS interpreter -- values, environments and the tree-walking evaluator.

mod builtins;
mod env;
mod error;
mod eval;
mod ops;
mod value;

pub use env::{Frame, SetOutcome, Vars};
pub use error::{Flow, RuntimeError};
pub use value::{Args, ClassDef, Func, TraitDef, Value, ValueKind};

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use ns_common::source::Source;
use ns_parser::{NodeId, NodeKind, ParseTree};

use builtins::Builtins;

/// The interpreter: built-in classes and traits, the locked globals, and
/// the output sink `print` writes to.
///
/// One interpreter runs one main program; imported modules are evaluated
/// through the same instance with their own isolated root frames.
pub struct Interp {
    pub(crate) globals: Vars,
    pub(crate) builtins: Builtins,
    main_dir: PathBuf,
    out: Box<dyn Write>,
    /// Root scopes of the programs currently being evaluated, innermost
    /// last. `export` re-binds into the top entry.
    root_stack: Vec<Vars>,
}

impl Interp {
    /// An interpreter printing to stdout. `main_dir` is the directory
    /// module imports resolve against.
    pub fn new(main_dir: impl Into<PathBuf>) -> Self {
        Self::with_output(main_dir, Box::new(std::io::stdout()))
    }

    /// An interpreter with a custom output sink for `print`.
    pub fn with_output(main_dir: impl Into<PathBuf>, out: Box<dyn Write>) -> Self {
        let (builtins, globals) = Builtins::install();
        Self {
            globals,
            builtins,
            main_dir: main_dir.into(),
            out,
            root_stack: Vec::new(),
        }
    }

    /// Run a parsed program to completion and produce its top-level
    /// value (the value of the last statement).
    pub fn run(&mut self, tree: &Rc<ParseTree>) -> Result<Value, RuntimeError> {
        let vars = self.globals.extend();
        let frame = Frame::root(vars.clone());
        self.root_stack.push(vars);
        let result = self.eval_program(tree, &frame);
        self.root_stack.pop();
        result
    }

    /// Evaluate a program's root block in the given frame. Unlike inner
    /// blocks, the root shares the frame it is given, and any non-local
    /// unwind reaching it is an error.
    fn eval_program(&mut self, tree: &Rc<ParseTree>, frame: &Frame) -> Result<Value, RuntimeError> {
        let NodeKind::Block { children } = tree.ast.kind(tree.root) else {
            unreachable!("the parse root is always a block");
        };
        let mut last = Value::null();
        for &child in children {
            match self.eval(tree, child, frame)? {
                Flow::Value(v) => last = v,
                Flow::Return(_) => {
                    return Err(RuntimeError::at_node(
                        "Illegal `return` outside of a function",
                        tree,
                        child,
                    ));
                }
                Flow::Break(_) => {
                    return Err(RuntimeError::at_node(
                        "Illegal `break` outside of a loop",
                        tree,
                        child,
                    ));
                }
                Flow::Continue(_) => {
                    return Err(RuntimeError::at_node(
                        "Illegal `continue` outside of a loop",
                        tree,
                        child,
                    ));
                }
            }
        }
        Ok(last)
    }

    /// Load, parse and evaluate a module file (relative to the main
    /// program's directory) in an isolated root frame, producing a
    /// Module value over its scope.
    pub(crate) fn load_module(
        &mut self,
        tree: &Rc<ParseTree>,
        node: NodeId,
        rel_path: &str,
    ) -> Result<Value, RuntimeError> {
        let path = self.main_dir.join(rel_path);
        let source = Source::from_file(&path).map_err(|e| {
            RuntimeError::at_node(
                format!("Cannot read module `{}`: {e}", path.display()),
                tree,
                node,
            )
        })?;
        let tokens = ns_lexer::tokenize(&source).map_err(|e| RuntimeError {
            label: "Syntax error",
            message: e.to_string(),
            span: e.span,
            line: e.line,
            column: e.column,
            source: source.clone(),
        })?;
        let module_tree = ns_parser::parse(tokens).map_err(|e| RuntimeError {
            label: "Syntax error",
            message: e.message.clone(),
            span: e.span,
            line: e.line,
            column: e.column,
            source: source.clone(),
        })?;
        let module_tree = Rc::new(module_tree);

        let vars = self.globals.extend();
        let frame = Frame::root(vars.clone());
        self.root_stack.push(vars.clone());
        let result = self.eval_program(&module_tree, &frame);
        self.root_stack.pop();
        result?;
        Ok(Value::module(vars))
    }

    /// Bind a name into the current program's root scope (the `export`
    /// decorator's job).
    pub(crate) fn export_binding(&mut self, name: String, value: Value) {
        if let Some(root) = self.root_stack.last() {
            root.define(name, value);
        }
    }

    pub(crate) fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }
}
