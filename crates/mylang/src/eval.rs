//! The evaluator.
//!
//! [`Interp`] owns the heap, the interner, the frame stack and the module
//! cache, and implements the core algorithms: statement-list execution
//! (keyed-only statements dispatch to `set`, everything else to `call`),
//! callee resolution and invocation, `get`/`set` path walking, operator
//! application, and repr/str dispatch.
//!
//! Control flow never uses the error path: `return` fills the frame's
//! return-value slot checked after every statement, and `break`/`continue`/
//! `while` flip flags on the nearest enclosing loop's data. Only `throw`
//! (and interpreter-raised errors) unwind through `RunResult`, and every
//! call boundary checks the caller frame's catch slot on the way out.

use std::path::PathBuf;

use ahash::AHashMap;

use crate::{
    args::Args,
    builtins::{self, BuiltinFunction, Builtins},
    exception_private::{RunError, RunResult},
    expressions::{ArgsExpr, BlockId, BlockTable, Expr, Operator, Statement},
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StaticStrings, StringId},
    io::PrintWriter,
    modules::LoaderKind,
    scope::{CatchSpec, LexicalScope, StackFrame},
    types::{
        BoundMethod, ErrorObject, Instance, PathValue, Type,
        dict::{Dict, DictKey},
        path::PathSeg,
    },
    value::{Value, format_float, my_eq},
};

/// Frames deeper than this raise a generic error rather than exhausting the
/// native stack.
pub(crate) const MAX_STACK_DEPTH: usize = 500;

const MAX_REPR_DEPTH: usize = 32;

/// Identifies the loop data a loop-body statement walk must consult.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopRef {
    pub scope: HeapId,
    pub index: usize,
}

pub(crate) struct Interp<P: PrintWriter> {
    pub heap: Heap,
    pub interns: Interns,
    pub blocks: BlockTable,
    pub frames: Vec<StackFrame>,
    pub builtins_scope: HeapId,
    pub module_cache: AHashMap<(String, LoaderKind), Value>,
    /// Extra roots searched for third-party modules.
    pub module_paths: Vec<PathBuf>,
    pub print: P,
}

impl<P: PrintWriter> Interp<P> {
    pub fn new(print: P) -> Self {
        let mut heap = Heap::new();
        let mut interns = Interns::new();
        let builtins_scope = builtins::install(&mut heap, &mut interns);
        Self {
            heap,
            interns,
            blocks: BlockTable::default(),
            frames: Vec::new(),
            builtins_scope,
            module_cache: AHashMap::new(),
            module_paths: Vec::new(),
            print,
        }
    }

    // ----- frames -------------------------------------------------------

    pub fn current_frame(&self) -> &StackFrame {
        self.frames.last().expect("frame stack is empty")
    }

    pub fn current_frame_mut(&mut self) -> &mut StackFrame {
        self.frames.last_mut().expect("frame stack is empty")
    }

    pub fn current_scope(&self) -> HeapId {
        self.current_frame().scope
    }

    /// Scope of the frame below the current one. Only meaningful inside a
    /// builtin that received a fresh frame.
    pub fn caller_scope(&self) -> HeapId {
        let n = self.frames.len();
        assert!(n >= 2, "caller_scope needs an enclosing frame");
        self.frames[n - 2].scope
    }

    pub fn push_frame(&mut self, parent: Option<HeapId>, name: Option<StringId>) -> RunResult<()> {
        if self.frames.len() >= MAX_STACK_DEPTH {
            let context = self
                .current_frame()
                .name
                .map_or_else(String::new, |id| format!(" in {}", self.interns.get_str(id)));
            return Err(RunError::generic(format!("maximum recursion depth exceeded{context}")));
        }
        let scope = self.heap.allocate(HeapData::Scope(LexicalScope::new(parent)));
        self.frames.push(StackFrame::new(scope, name));
        Ok(())
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop().expect("frame stack underflow: pop without matching push");
    }

    pub fn bind_local(&mut self, key: DictKey, value: Value) {
        let scope = self.current_scope();
        self.heap.scope_mut(scope).locals.insert(key, value);
    }

    pub fn bind_in_caller(&mut self, key: DictKey, value: Value) {
        let scope = self.caller_scope();
        self.heap.scope_mut(scope).locals.insert(key, value);
    }

    // ----- statement execution ------------------------------------------

    /// Executes a statement list in the current frame.
    ///
    /// Stops early when the frame's return-value slot fills, or - when this
    /// is the top-level walk of a loop body - when the loop's data signals a
    /// break or continue. Nested plain blocks do not consult loop data, so
    /// they run to completion before the enclosing loop notices.
    pub fn exec_block(&mut self, block: BlockId, loop_ref: Option<LoopRef>) -> RunResult<Value> {
        let data = self.blocks.get(block);
        let mut last = Value::Undefined;
        for statement in &data.statements {
            let value = self.exec_statement(statement)?;
            if let Some(return_value) = self.current_frame().return_value {
                return Ok(return_value);
            }
            if let Some(lr) = loop_ref {
                let flags = self.heap.scope(lr.scope).loop_stack[lr.index];
                if flags.broken || flags.should_continue {
                    return Ok(Value::Undefined);
                }
            }
            last = value;
        }
        Ok(last)
    }

    pub fn exec_statement(&mut self, statement: &Statement) -> RunResult<Value> {
        // A lone operation, literal container, call or execution block is
        // its own value; dispatch would try to use the result as a lookup
        // key.
        if statement.args.keyed.is_empty()
            && statement.args.positional.len() == 1
            && statement.args.positional[0].is_self_evaluating()
        {
            return self.eval_expr(&statement.args.positional[0]);
        }
        let args = self.eval_args(&statement.args)?;
        if args.is_keyed_only() {
            self.set_values(&args)?;
            Ok(Value::Undefined)
        } else {
            self.call_args(args)
        }
    }

    // ----- expression evaluation ----------------------------------------

    pub fn eval_args(&mut self, args: &ArgsExpr) -> RunResult<Args> {
        let mut out = Args::new();
        for expr in &args.positional {
            let value = self.eval_expr(expr)?;
            out.push_positional(value);
        }
        for (key_expr, value_expr) in &args.keyed {
            let key_value = self.eval_expr(key_expr)?;
            let value = self.eval_expr(value_expr)?;
            let key = DictKey::from_value(key_value, &self.heap, &mut self.interns);
            out.insert_keyed(key, value);
        }
        Ok(out)
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> RunResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(*value),
            Expr::Path(segments) => {
                let path = PathValue::new(segments.clone());
                Ok(Value::Ref(self.heap.allocate(HeapData::Path(path))))
            }
            Expr::Dict(pairs) => {
                let mut dict = Dict::new();
                for (key_expr, value_expr) in pairs {
                    let key_value = self.eval_expr(key_expr)?;
                    let value = self.eval_expr(value_expr)?;
                    let key = DictKey::from_value(key_value, &self.heap, &mut self.interns);
                    dict.insert(key, value);
                }
                Ok(Value::Ref(self.heap.allocate(HeapData::Dict(dict))))
            }
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element)?);
                }
                let array = crate::types::Array::from_vec(values);
                Ok(Value::Ref(self.heap.allocate(HeapData::Array(array))))
            }
            Expr::Unary { op, operand } => match op {
                Operator::Get => {
                    let key = self.eval_expr(operand)?;
                    self.get_value(key)
                }
                Operator::Ref => {
                    let key = self.eval_expr(operand)?;
                    self.make_ref(key)
                }
                _ => {
                    let value = self.eval_expr(operand)?;
                    self.apply_unary(*op, value)
                }
            },
            Expr::Binary { op, left, right } => {
                let lhs = self.eval_expr(left)?;
                let rhs = self.eval_expr(right)?;
                self.apply_binary(*op, lhs, rhs)
            }
            Expr::Call { callee, args } => {
                let callee_value = self.eval_expr(callee)?;
                let call_args = self.eval_args(args)?;
                let resolved = if callee.is_self_evaluating() {
                    // A computed callee is already the value to invoke.
                    self.deref(callee_value)
                } else {
                    self.resolve_callee(callee_value)?
                };
                self.invoke(resolved, call_args)
            }
            Expr::CallArgs(args) => {
                let args = self.eval_args(args)?;
                if args.is_keyed_only() {
                    self.set_values(&args)?;
                    Ok(Value::Undefined)
                } else {
                    self.call_args(args)
                }
            }
            Expr::ExecBlock(block) => {
                let parent = self.current_scope();
                self.push_frame(Some(parent), None)?;
                let result = self.exec_block(*block, None);
                self.pop_frame();
                result
            }
        }
    }

    // ----- call dispatch ------------------------------------------------

    /// Dispatches an evaluated argument list: the first positional value is
    /// the callee specifier.
    pub fn call_args(&mut self, args: Args) -> RunResult<Value> {
        let Some((callee_spec, rest)) = args.split_callee() else {
            return Err(RunError::arity("a call requires a callee"));
        };
        let callee = self.resolve_callee(callee_spec)?;
        self.invoke(callee, rest)
    }

    /// Resolves a callee specifier: a ref passes its referent through,
    /// anything else is a lookup key.
    pub fn resolve_callee(&mut self, spec: Value) -> RunResult<Value> {
        if let Value::Ref(id) = spec
            && let HeapData::ValueRef(referent) = self.heap.get(id)
        {
            return Ok(*referent);
        }
        self.get_value(spec)
    }

    /// Collapses ref indirections.
    pub fn deref(&self, value: Value) -> Value {
        let mut current = value;
        while let Value::Ref(id) = current {
            match self.heap.get(id) {
                HeapData::ValueRef(referent) => current = *referent,
                _ => break,
            }
        }
        current
    }

    /// Invokes a callee and routes errors through the caller frame's catch
    /// slot.
    pub fn invoke(&mut self, callee: Value, args: Args) -> RunResult<Value> {
        match self.invoke_inner(callee, args) {
            Err(error) => {
                if let Some(spec) = self.current_frame_mut().catch_spec.take() {
                    self.run_catch(&spec, error)
                } else {
                    Err(error)
                }
            }
            ok => ok,
        }
    }

    fn invoke_inner(&mut self, callee: Value, args: Args) -> RunResult<Value> {
        match callee {
            Value::Builtin(Builtins::Function(function)) => {
                if function.wants_frame() {
                    let name: &'static str = function.into();
                    let name_id = self.interns.intern(name);
                    self.push_frame(None, Some(name_id))?;
                    let result = builtins::dispatch(self, function, args);
                    self.pop_frame();
                    result.map_err(|mut error| {
                        error.push_trace(name);
                        error
                    })
                } else {
                    builtins::dispatch(self, function, args)
                }
            }
            Value::Builtin(Builtins::Type(ty)) => builtins::call_type(self, ty, &args),
            Value::Builtin(Builtins::Operator(op)) => builtins::call_operator(self, op, &args),
            Value::Builtin(Builtins::Module(function)) => crate::modules::call_module_function(self, function, &args),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Function(_) => self.invoke_function(id, None, &args),
                HeapData::BoundMethod(method) => {
                    let (receiver, function) = (method.receiver, method.function);
                    self.invoke_function(function, Some(receiver), &args)
                }
                HeapData::Class(_) => self.instantiate(id, &args),
                HeapData::NativeMethod(native) => {
                    let (receiver, method) = (native.receiver, native.method);
                    builtins::methods::call(self, receiver, method, &args)
                }
                HeapData::ValueRef(referent) => {
                    let referent = *referent;
                    self.invoke_inner(referent, args)
                }
                _ => Err(self.not_callable(callee)),
            },
            _ => Err(self.not_callable(callee)),
        }
    }

    fn not_callable(&self, value: Value) -> RunError {
        RunError::type_error(format!("a {} value is not callable", value.type_of(&self.heap)))
    }

    /// Regular user-function entry: fresh frame whose lexical parent is the
    /// captured scope, `self` injection for methods, parameter binding, then
    /// the body.
    pub fn invoke_function(&mut self, function: HeapId, receiver: Option<Value>, args: &Args) -> RunResult<Value> {
        let (parameters, body, closure, name_value) = match self.heap.get(function) {
            HeapData::Function(f) => (f.parameters.clone(), f.body, f.closure_scope, f.name),
            other => panic!("invoke_function on a non-function slot: {other:?}"),
        };
        let name_id = match name_value {
            Value::InternString(id) => Some(id),
            _ => None,
        };
        let name = name_id.map(|id| self.interns.get_str(id).to_owned());
        self.push_frame(Some(closure), name_id)?;
        let result = self.run_function_body(receiver, &parameters, body, args, name.as_deref());
        self.pop_frame();
        result.map_err(|mut error| {
            error.push_trace(name.unwrap_or_else(|| "<fun>".to_owned()));
            error
        })
    }

    fn run_function_body(
        &mut self,
        receiver: Option<Value>,
        parameters: &Args,
        body: BlockId,
        args: &Args,
        name: Option<&str>,
    ) -> RunResult<Value> {
        if let Some(receiver) = receiver {
            self.bind_local(DictKey::Str(StaticStrings::SelfName.into()), receiver);
        }
        for (index, &parameter) in parameters.positional().iter().enumerate() {
            let Some(&value) = args.positional().get(index) else {
                return Err(RunError::arity(format!(
                    "{} missing positional argument {}",
                    name.unwrap_or("function"),
                    self.describe(parameter),
                )));
            };
            let key = DictKey::from_value(parameter, &self.heap, &mut self.interns);
            self.bind_local(key, value);
        }
        for (&key, &default) in parameters.keyed() {
            let value = args.keyed().get(&key).copied().unwrap_or(default);
            self.bind_local(key, value);
        }
        self.exec_block(body, None)
    }

    /// Calling a class allocates an instance and runs the initializer bound
    /// to it. Error classes produce throwable error values directly.
    pub(crate) fn instantiate(&mut self, class: HeapId, args: &Args) -> RunResult<Value> {
        let (initializer, is_error, error_message) = match self.heap.get(class) {
            HeapData::Class(c) => (c.initializer, c.is_error, c.error_message),
            other => panic!("instantiate on a non-class slot: {other:?}"),
        };
        if is_error {
            let message = args
                .positional()
                .first()
                .copied()
                .or(error_message.map(Value::InternString))
                .unwrap_or(Value::InternString(StaticStrings::Empty.into()));
            let error = ErrorObject::new(Some(class), message);
            return Ok(Value::Ref(self.heap.allocate(HeapData::Error(error))));
        }
        let instance = self.heap.allocate(HeapData::Instance(Instance::new(class)));
        if let Some(initializer) = initializer {
            self.invoke_function(initializer, Some(Value::Ref(instance)), args)?;
        }
        Ok(Value::Ref(instance))
    }

    // ----- catch matching -----------------------------------------------

    /// Runs the catch body against an unwinding error. Each catch statement
    /// is `Class1 Class2 ... clause-body`; the first statement whose head
    /// list matches the error executes its clause in a fresh frame, with
    /// the error bound under the spec's key.
    pub(crate) fn run_catch(&mut self, spec: &CatchSpec, error: RunError) -> RunResult<Value> {
        let body = self.blocks.get(spec.catch_body);
        for clause in &body.statements {
            let (heads, clause_body) = match clause.args.positional.split_last() {
                Some((last, heads)) if !heads.is_empty() && clause.args.keyed.is_empty() => (heads, last),
                _ => {
                    return Err(RunError::type_error(format!(
                        "line {}: each catch clause must be `ErrorClass ... body` with a statement-list body",
                        clause.line,
                    )));
                }
            };
            let Expr::Literal(Value::Block(clause_block)) = clause_body else {
                return Err(RunError::type_error(format!(
                    "line {}: a catch clause must end with a statement list",
                    clause.line,
                )));
            };
            let mut matched = false;
            for head in heads {
                let head_value = self.eval_expr(head)?;
                let class_value = match self.deref(head_value) {
                    v @ Value::Builtin(Builtins::Type(Type::Error)) => v,
                    Value::Ref(class_id) if matches!(self.heap.get(class_id), HeapData::Class(_)) => {
                        Value::Ref(class_id)
                    }
                    other => self.get_value(other)?,
                };
                if self.error_matches(&error, class_value) {
                    matched = true;
                    break;
                }
            }
            if matched {
                let caller = self.current_scope();
                self.push_frame(Some(caller), None)?;
                if let Some(error_key) = spec.error_key {
                    let value = self.error_value(&error);
                    let key = DictKey::from_value(error_key, &self.heap, &mut self.interns);
                    self.bind_local(key, value);
                }
                let result = self.exec_block(*clause_block, None);
                self.pop_frame();
                return result;
            }
        }
        Err(error)
    }

    /// The `isinstance` rule for catch matching: the bare `Error` head
    /// matches everything that unwinds; a user class head matches thrown
    /// errors whose class is an ancestor-or-self of it. Interpreter-raised
    /// kinds are generic errors and match only the bare `Error` head.
    fn error_matches(&self, error: &RunError, class_value: Value) -> bool {
        match class_value {
            Value::Builtin(Builtins::Type(Type::Error)) => true,
            Value::Ref(class_id) => match (&error.raised, self.heap.get(class_id)) {
                (crate::exception_private::Raised::Thrown(error_id), HeapData::Class(_)) => {
                    match self.heap.get(*error_id) {
                        HeapData::Error(e) => match e.class {
                            Some(actual) => match self.heap.get(actual) {
                                HeapData::Class(c) => c.descends_from(actual, class_id, &self.heap),
                                _ => false,
                            },
                            None => false,
                        },
                        _ => false,
                    }
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// The error value bound in a catch clause. Interpreter-raised kinds
    /// surface as generic error values with an opaque message.
    fn error_value(&mut self, error: &RunError) -> Value {
        match &error.raised {
            crate::exception_private::Raised::Thrown(id) => Value::Ref(*id),
            crate::exception_private::Raised::Kind { message, .. } => {
                let message = self.alloc_str(message.clone());
                Value::Ref(self.heap.allocate(HeapData::Error(ErrorObject::new(None, message))))
            }
        }
    }

    // ----- get / set ----------------------------------------------------

    /// `get`: refs pass through, paths walk segment by segment, any other
    /// key resolves through the lexical scope chain.
    pub fn get_value(&mut self, key: Value) -> RunResult<Value> {
        if let Value::Ref(id) = key {
            match self.heap.get(id) {
                HeapData::ValueRef(referent) => return Ok(*referent),
                HeapData::Path(path) => {
                    let segments: Vec<PathSeg> = path.segments().to_vec();
                    return self.walk_path(&segments);
                }
                _ => {}
            }
        }
        self.scope_lookup(key)
    }

    /// `ref key`: resolves the key and wraps the result; nested refs
    /// collapse to the referent.
    pub fn make_ref(&mut self, key: Value) -> RunResult<Value> {
        let value = self.get_value(key)?;
        let value = self.deref(value);
        Ok(Value::Ref(self.heap.allocate(HeapData::ValueRef(value))))
    }

    fn scope_lookup(&mut self, key: Value) -> RunResult<Value> {
        let k = DictKey::from_value(key, &self.heap, &mut self.interns);
        let mut scope_id = Some(self.current_scope());
        while let Some(id) = scope_id {
            let scope = self.heap.scope(id);
            if let Some(&value) = scope.locals.get(&k) {
                return Ok(value);
            }
            scope_id = scope.parent;
        }
        Err(RunError::lookup(format!("key {} not found", self.describe(key))))
    }

    /// Walks a full path and returns the terminal value.
    pub fn walk_path(&mut self, segments: &[PathSeg]) -> RunResult<Value> {
        let (mut current, rest) = self.walk_path_head(segments)?;
        for segment in rest {
            let PathSeg::Key(key) = segment else {
                return Err(RunError::type_error("dots are only valid at the start of a path"));
            };
            current = self.attr_get(current, *key)?;
        }
        Ok(current)
    }

    /// Resolves the first path segment: either a chain lookup, or - after a
    /// leading dots run - an anchored lookup in a specific scope.
    fn walk_path_head<'s>(&mut self, segments: &'s [PathSeg]) -> RunResult<(Value, &'s [PathSeg])> {
        match segments {
            [PathSeg::Dots(n), PathSeg::Key(key), rest @ ..] => {
                let scope = self.anchored_scope(*n)?;
                let value = self.anchored_lookup(scope, *key)?;
                Ok((value, rest))
            }
            [PathSeg::Key(key), rest @ ..] => {
                let value = self.scope_lookup(*key)?;
                Ok((value, rest))
            }
            _ => Err(RunError::type_error("a path cannot consist of dots alone")),
        }
    }

    /// The scope `n` dots anchor to: one dot is the innermost scope, each
    /// further dot climbs one parent.
    fn anchored_scope(&self, dots: u32) -> RunResult<HeapId> {
        let mut scope = self.current_scope();
        for _ in 1..dots {
            match self.heap.scope(scope).parent {
                Some(parent) => scope = parent,
                None => return Err(RunError::lookup("relative anchor escapes the scope chain")),
            }
        }
        Ok(scope)
    }

    fn anchored_lookup(&mut self, scope: HeapId, key: Value) -> RunResult<Value> {
        let k = DictKey::from_value(key, &self.heap, &mut self.interns);
        self.heap
            .scope(scope)
            .locals
            .get(&k)
            .copied()
            .ok_or_else(|| RunError::lookup(format!("key {} not found in anchored scope", self.describe(key))))
    }

    /// `set`: each keyed entry assigns; a path key navigates to its
    /// penultimate segment, anything else binds in the innermost locals.
    pub fn set_values(&mut self, args: &Args) -> RunResult<()> {
        if !args.positional().is_empty() {
            return Err(RunError::type_error("set accepts only keyed arguments"));
        }
        for (&key, &value) in args.keyed() {
            if let DictKey::Ident(id) = key
                && let HeapData::Path(path) = self.heap.get(id)
            {
                let segments: Vec<PathSeg> = path.segments().to_vec();
                self.set_path(&segments, value)?;
            } else {
                self.bind_local(key, value);
            }
        }
        Ok(())
    }

    fn set_path(&mut self, segments: &[PathSeg], value: Value) -> RunResult<()> {
        let (last, init) = segments.split_last().expect("paths have at least two segments");
        let PathSeg::Key(last_key) = last else {
            return Err(RunError::type_error("a path used with set cannot end with dots"));
        };
        // `.k=v` and `..k=v` assign directly into an anchored scope.
        if let [PathSeg::Dots(n)] = init {
            let scope = self.anchored_scope(*n)?;
            let key = DictKey::from_value(*last_key, &self.heap, &mut self.interns);
            self.heap.scope_mut(scope).locals.insert(key, value);
            return Ok(());
        }
        let container = self.walk_path(init)?;
        self.attr_set(container, *last_key, value)
    }

    /// Attribute access for one `get` path segment.
    pub fn attr_get(&mut self, obj: Value, key: Value) -> RunResult<Value> {
        let k = DictKey::from_value(key, &self.heap, &mut self.interns);

        // `ref.of` is the only attribute on a builtin callable.
        if let Value::Builtin(Builtins::Function(BuiltinFunction::Ref)) = obj {
            if k == DictKey::Str(StaticStrings::Of.into()) {
                return Ok(Value::Builtin(Builtins::Function(BuiltinFunction::RefOf)));
            }
            return Err(self.no_attribute(obj, key));
        }

        // Interned strings are not heap values but still carry methods.
        if matches!(obj, Value::InternString(_)) {
            if let Some(method) = self.native_method(obj, k) {
                return Ok(method);
            }
            return Err(self.no_attribute(obj, key));
        }

        let Value::Ref(id) = obj else {
            return Err(RunError::type_error(format!(
                "cannot access attribute {} on a {} value",
                self.describe(key),
                obj.type_of(&self.heap),
            )));
        };

        enum Found {
            Value(Value),
            /// A prototype function accessed through an instance: bind it.
            Bind(HeapId),
            Deref(Value),
            /// A function's parameter container, materialized on access.
            AllocArgs(Args),
            Missing,
        }

        let found = match self.heap.get(id) {
            HeapData::Dict(dict) => dict.get(k).map_or(Found::Missing, Found::Value),
            HeapData::Args(args) => match k {
                DictKey::Int(index) => args
                    .positional()
                    .get(usize::try_from(index).unwrap_or(usize::MAX))
                    .copied()
                    .map_or(Found::Missing, Found::Value),
                other => args.keyed().get(&other).copied().map_or(Found::Missing, Found::Value),
            },
            HeapData::Array(array) => match k {
                DictKey::Int(index) => array.get(index).map_or(Found::Missing, Found::Value),
                _ => {
                    return Err(RunError::type_error("array access requires an integer index"));
                }
            },
            HeapData::Instance(instance) => {
                if let Some(&value) = instance.attrs.get(&k) {
                    Found::Value(value)
                } else {
                    let member = match self.heap.get(instance.class) {
                        HeapData::Class(class) => class.lookup_member(k, &self.heap),
                        other => panic!("instance class slot holds {other:?}"),
                    };
                    match member {
                        Some(Value::Ref(member_id)) if matches!(self.heap.get(member_id), HeapData::Function(_)) => {
                            Found::Bind(member_id)
                        }
                        Some(value) => Found::Value(value),
                        None => Found::Missing,
                    }
                }
            }
            HeapData::Class(class) => {
                if k == DictKey::Str(StaticStrings::Name.into()) {
                    Found::Value(Value::InternString(class.name))
                } else {
                    class.lookup_member(k, &self.heap).map_or(Found::Missing, Found::Value)
                }
            }
            HeapData::Error(error) => {
                if k == DictKey::Str(StaticStrings::Message.into()) {
                    Found::Value(error.message)
                } else {
                    Found::Missing
                }
            }
            HeapData::Context(_) => {
                let mut context_id = id;
                loop {
                    let HeapData::Context(context) = self.heap.get(context_id) else {
                        panic!("context parent slot holds a non-context");
                    };
                    if let Some(value) = context.entries.get(k) {
                        break Found::Value(value);
                    }
                    match context.parent {
                        Some(parent) => context_id = parent,
                        None => break Found::Missing,
                    }
                }
            }
            HeapData::ValueRef(referent) => {
                if k == DictKey::Str(StaticStrings::Obj.into()) {
                    Found::Value(*referent)
                } else {
                    Found::Deref(*referent)
                }
            }
            HeapData::Function(function) => {
                if k == DictKey::Str(StaticStrings::Name.into()) {
                    Found::Value(function.name)
                } else if k == DictKey::Str(StaticStrings::Parameters.into()) {
                    Found::AllocArgs(function.parameters.clone())
                } else if k == DictKey::Str(StaticStrings::Body.into()) {
                    Found::Value(Value::Block(function.body))
                } else {
                    Found::Missing
                }
            }
            HeapData::Str(_) => Found::Missing,
            HeapData::Path(_) | HeapData::BoundMethod(_) | HeapData::NativeMethod(_) | HeapData::Scope(_) => {
                return Err(RunError::type_error(format!(
                    "cannot access attribute {} on a {} value",
                    self.describe(key),
                    obj.type_of(&self.heap),
                )));
            }
        };

        match found {
            Found::Value(value) => Ok(value),
            Found::Bind(function) => {
                let method = BoundMethod { receiver: obj, function };
                Ok(Value::Ref(self.heap.allocate(HeapData::BoundMethod(method))))
            }
            Found::Deref(referent) => self.attr_get(referent, key),
            Found::AllocArgs(parameters) => Ok(Value::Ref(self.heap.allocate(HeapData::Args(parameters)))),
            Found::Missing => match self.native_method(obj, k) {
                Some(method) => Ok(method),
                None => Err(self.no_attribute(obj, key)),
            },
        }
    }

    /// Falls back to the native-method table for a container attribute
    /// whose key is not data.
    fn native_method(&mut self, obj: Value, key: DictKey) -> Option<Value> {
        let DictKey::Str(name_id) = key else {
            return None;
        };
        let ty = obj.type_of(&self.heap);
        let method = builtins::methods::lookup(ty, self.interns.get_str(name_id))?;
        let native = crate::types::NativeMethod { receiver: obj, method };
        Some(Value::Ref(self.heap.allocate(HeapData::NativeMethod(native))))
    }

    fn no_attribute(&self, obj: Value, key: Value) -> RunError {
        RunError::lookup(format!(
            "{} value has no attribute {}",
            obj.type_of(&self.heap),
            self.describe(key),
        ))
    }

    /// Attribute assignment for the final `set` path segment. Instance
    /// writes land in the per-instance dictionary, never the prototype.
    pub fn attr_set(&mut self, obj: Value, key: Value, value: Value) -> RunResult<()> {
        let k = DictKey::from_value(key, &self.heap, &mut self.interns);
        let Value::Ref(id) = obj else {
            return Err(RunError::type_error(format!(
                "cannot assign attribute {} on a {} value",
                self.describe(key),
                obj.type_of(&self.heap),
            )));
        };
        match self.heap.get_mut(id) {
            HeapData::Dict(dict) => {
                dict.insert(k, value);
                Ok(())
            }
            HeapData::Args(args) => {
                match k {
                    DictKey::Int(index) => {
                        // Writes stay within or directly extend the
                        // gap-free positional prefix.
                        let index = usize::try_from(index).unwrap_or(usize::MAX);
                        if index == args.positional().len() {
                            args.push_positional(value);
                        } else if !args.set_positional(index, value) {
                            return Err(RunError::lookup("positional index out of range"));
                        }
                    }
                    other => args.insert_keyed(other, value),
                }
                Ok(())
            }
            HeapData::Array(array) => match k {
                DictKey::Int(index) => {
                    if array.set(index, value) {
                        Ok(())
                    } else {
                        Err(RunError::lookup("array index out of range"))
                    }
                }
                _ => Err(RunError::type_error("array assignment requires an integer index")),
            },
            HeapData::Instance(instance) => {
                instance.attrs.insert(k, value);
                Ok(())
            }
            HeapData::Context(context) => {
                context.entries.insert(k, value);
                Ok(())
            }
            HeapData::ValueRef(referent) => {
                let referent = *referent;
                self.attr_set(referent, key, value)
            }
            _ => Err(RunError::type_error(format!(
                "cannot assign attribute {} on a {} value",
                self.describe(key),
                obj.type_of(&self.heap),
            ))),
        }
    }

    // ----- operators ----------------------------------------------------

    pub fn apply_unary(&mut self, op: Operator, value: Value) -> RunResult<Value> {
        match op {
            Operator::Not => Ok(Value::Bool(!value.truthy(&self.heap, &self.interns))),
            Operator::Neg => match value {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| RunError::arithmetic("integer overflow")),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(RunError::type_error(format!(
                    "cannot negate a {} value",
                    other.type_of(&self.heap)
                ))),
            },
            other => Err(RunError::arity(format!("operator {} takes two operands", other.as_str()))),
        }
    }

    pub fn apply_binary(&mut self, op: Operator, lhs: Value, rhs: Value) -> RunResult<Value> {
        match op {
            Operator::Eq => Ok(Value::Bool(my_eq(lhs, rhs, &self.heap, &self.interns))),
            Operator::Ne => Ok(Value::Bool(!my_eq(lhs, rhs, &self.heap, &self.interns))),
            Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le => self.compare(op, lhs, rhs),
            Operator::Add => self.add(lhs, rhs),
            Operator::Sub => self.numeric(op, lhs, rhs, i64::checked_sub, |a, b| a - b),
            Operator::Mul => self.numeric(op, lhs, rhs, i64::checked_mul, |a, b| a * b),
            Operator::Div => self.divide(lhs, rhs),
            Operator::Mod => match (lhs, rhs) {
                (Value::Int(_), Value::Int(0)) => Err(RunError::arithmetic("division by zero")),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.rem_euclid(b))),
                _ => Err(self.operand_error(op, lhs, rhs)),
            },
            other => Err(RunError::arity(format!("operator {} takes one operand", other.as_str()))),
        }
    }

    fn compare(&mut self, op: Operator, lhs: Value, rhs: Value) -> RunResult<Value> {
        let ordering = match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(&b),
            _ => match (lhs.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => match (lhs.as_str(&self.heap, &self.interns), rhs.as_str(&self.heap, &self.interns)) {
                    (Some(a), Some(b)) => a.partial_cmp(b),
                    _ => return Err(self.operand_error(op, lhs, rhs)),
                },
            },
        };
        let Some(ordering) = ordering else {
            return Ok(Value::Bool(false));
        };
        let result = match op {
            Operator::Gt => ordering.is_gt(),
            Operator::Ge => ordering.is_ge(),
            Operator::Lt => ordering.is_lt(),
            Operator::Le => ordering.is_le(),
            _ => unreachable!("compare is only called for comparison operators"),
        };
        Ok(Value::Bool(result))
    }

    fn add(&mut self, lhs: Value, rhs: Value) -> RunResult<Value> {
        if lhs.as_str(&self.heap, &self.interns).is_some() {
            let mut text = lhs.as_str(&self.heap, &self.interns).expect("checked above").to_owned();
            let rhs_text = self.str_value(rhs)?;
            text.push_str(&rhs_text);
            return Ok(self.alloc_str(text));
        }
        if let (Value::Ref(a), Value::Ref(b)) = (lhs, rhs)
            && let (HeapData::Array(x), HeapData::Array(y)) = (self.heap.get(a), self.heap.get(b))
        {
            let mut elements: Vec<Value> = x.as_slice().to_vec();
            elements.extend_from_slice(y.as_slice());
            let array = crate::types::Array::from_vec(elements);
            return Ok(Value::Ref(self.heap.allocate(HeapData::Array(array))));
        }
        self.numeric(Operator::Add, lhs, rhs, i64::checked_add, |a, b| a + b)
    }

    fn divide(&mut self, lhs: Value, rhs: Value) -> RunResult<Value> {
        match (lhs.as_float(), rhs.as_float()) {
            (Some(_), Some(b)) if b == 0.0 => Err(RunError::arithmetic("division by zero")),
            (Some(a), Some(b)) => {
                if let (Value::Int(x), Value::Int(y)) = (lhs, rhs)
                    && x % y == 0
                {
                    Ok(Value::Int(x / y))
                } else {
                    Ok(Value::Float(a / b))
                }
            }
            _ => Err(self.operand_error(Operator::Div, lhs, rhs)),
        }
    }

    fn numeric(
        &mut self,
        op: Operator,
        lhs: Value,
        rhs: Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> RunResult<Value> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_op(a, b)
                .map(Value::Int)
                .ok_or_else(|| RunError::arithmetic("integer overflow")),
            _ => match (lhs.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
                _ => Err(self.operand_error(op, lhs, rhs)),
            },
        }
    }

    fn operand_error(&self, op: Operator, lhs: Value, rhs: Value) -> RunError {
        RunError::type_error(format!(
            "unsupported operand types for {}: {} and {}",
            op.as_str(),
            lhs.type_of(&self.heap),
            rhs.type_of(&self.heap),
        ))
    }

    // ----- repr / str ---------------------------------------------------

    pub fn alloc_str(&mut self, text: String) -> Value {
        Value::Ref(self.heap.allocate(HeapData::Str(text)))
    }

    pub fn str_value(&mut self, value: Value) -> RunResult<String> {
        self.format_value(value, false, 0)
    }

    pub fn repr_value(&mut self, value: Value) -> RunResult<String> {
        self.format_value(value, true, 0)
    }

    fn format_value(&mut self, value: Value, repr: bool, depth: usize) -> RunResult<String> {
        if depth > MAX_REPR_DEPTH {
            return Ok("...".to_owned());
        }
        match value {
            Value::Undefined => Ok("undefined".to_owned()),
            Value::Null => Ok("null".to_owned()),
            Value::Bool(b) => Ok(if b { "true" } else { "false" }.to_owned()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(format_float(f)),
            Value::InternString(id) => {
                let text = self.interns.get_str(id);
                Ok(if repr { quote(text) } else { text.to_owned() })
            }
            Value::Symbol(id) => {
                let name = self.interns.get_str(self.interns.symbol_name(id));
                Ok(format!("<symbol {name}>"))
            }
            Value::Dots(n) => Ok(".".repeat(n as usize)),
            Value::Builtin(builtin) => Ok(match builtin {
                Builtins::Function(f) => {
                    let name: &'static str = f.into();
                    format!("{{fun '{name}'}}")
                }
                Builtins::Type(t) => format!("<class {t}>"),
                Builtins::Operator(op) => format!("{{fun '{}'}}", op.as_str()),
                Builtins::Module(f) => format!("{{fun '{}'}}", f.name()),
            }),
            Value::Block(_) => Ok("{block}".to_owned()),
            Value::Ref(id) => self.format_heap_value(id, repr, depth),
        }
    }

    fn format_heap_value(&mut self, id: HeapId, repr: bool, depth: usize) -> RunResult<String> {
        match self.heap.get(id) {
            HeapData::Str(text) => {
                let text = text.clone();
                Ok(if repr { quote(&text) } else { text })
            }
            HeapData::Dict(dict) => {
                let entries: Vec<(DictKey, Value)> = dict.iter().collect();
                self.format_entries(&entries, depth)
            }
            HeapData::Context(context) => {
                let entries: Vec<(DictKey, Value)> = context.entries.iter().collect();
                self.format_entries(&entries, depth)
            }
            HeapData::Args(args) => {
                let positional: Vec<Value> = args.positional().to_vec();
                let keyed: Vec<(DictKey, Value)> = args.keyed().iter().map(|(&k, &v)| (k, v)).collect();
                let mut parts = Vec::with_capacity(positional.len() + keyed.len());
                for value in &positional {
                    parts.push(self.format_value(*value, true, depth + 1)?);
                }
                for (key, value) in keyed {
                    let key_text = self.format_value(key.to_value(), true, depth + 1)?;
                    let value_text = self.format_value(value, true, depth + 1)?;
                    parts.push(format!("{key_text}={value_text}"));
                }
                let mut text = parts.join(", ");
                if positional.len() == 1 && parts.len() == 1 {
                    text.push(',');
                }
                Ok(text)
            }
            HeapData::Array(array) => {
                let elements: Vec<Value> = array.as_slice().to_vec();
                let mut parts = Vec::with_capacity(elements.len());
                for element in elements {
                    parts.push(self.format_value(element, true, depth + 1)?);
                }
                Ok(format!("[{}]", parts.join(" ")))
            }
            HeapData::Path(path) => {
                let segments: Vec<PathSeg> = path.segments().to_vec();
                let mut text = String::new();
                for (index, segment) in segments.iter().enumerate() {
                    match segment {
                        PathSeg::Dots(n) => text.push_str(&".".repeat(*n as usize)),
                        PathSeg::Key(key) => {
                            if index > 0 {
                                text.push('.');
                            }
                            text.push_str(&self.format_value(*key, false, depth + 1)?);
                        }
                    }
                }
                Ok(text)
            }
            HeapData::Function(function) => {
                let name = function.name;
                let name_text = self.format_value(name, false, depth + 1)?;
                Ok(format!("{{fun '{name_text}'}}"))
            }
            HeapData::BoundMethod(method) => {
                let function = method.function;
                let name = match self.heap.get(function) {
                    HeapData::Function(f) => f.name,
                    other => panic!("bound method target holds {other:?}"),
                };
                let name_text = self.format_value(name, false, depth + 1)?;
                Ok(format!("{{fun '{name_text}'}}"))
            }
            HeapData::NativeMethod(native) => {
                let name: &'static str = native.method.into();
                Ok(format!("{{fun '{name}'}}"))
            }
            HeapData::Class(class) => Ok(format!("<class {}>", self.interns.get_str(class.name))),
            HeapData::Instance(_) => self.format_instance(id, repr, depth),
            HeapData::ValueRef(referent) => {
                let referent = *referent;
                self.format_value(referent, repr, depth + 1)
            }
            HeapData::Error(error) => {
                let message = error.message;
                let class = error.class;
                let message_text = self.format_value(message, false, depth + 1)?;
                if repr {
                    let name = match class {
                        Some(class_id) => match self.heap.get(class_id) {
                            HeapData::Class(c) => self.interns.get_str(c.name).to_owned(),
                            other => panic!("error class slot holds {other:?}"),
                        },
                        None => "Error".to_owned(),
                    };
                    Ok(format!("<error {name}: {message_text}>"))
                } else {
                    Ok(message_text)
                }
            }
            HeapData::Scope(_) => panic!("scopes are not first-class values"),
        }
    }

    fn format_entries(&mut self, entries: &[(DictKey, Value)], depth: usize) -> RunResult<String> {
        let mut parts = Vec::with_capacity(entries.len());
        for &(key, value) in entries {
            let key_text = self.format_value(key.to_value(), true, depth + 1)?;
            let value_text = self.format_value(value, true, depth + 1)?;
            parts.push(format!("{key_text}={value_text}"));
        }
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    /// Repr/str for instances prefers an instance-provided method, then a
    /// class-provided one, then the default.
    fn format_instance(&mut self, id: HeapId, repr: bool, depth: usize) -> RunResult<String> {
        let preferred = if repr { StaticStrings::ReprName } else { StaticStrings::StrName };
        for method_name in [preferred, if repr { StaticStrings::StrName } else { StaticStrings::ReprName }] {
            let key = DictKey::Str(method_name.into());
            let member = {
                let HeapData::Instance(instance) = self.heap.get(id) else {
                    panic!("format_instance on a non-instance slot");
                };
                instance.attrs.get(&key).copied().or_else(|| match self.heap.get(instance.class) {
                    HeapData::Class(class) => class.lookup_member(key, &self.heap),
                    other => panic!("instance class slot holds {other:?}"),
                })
            };
            if let Some(Value::Ref(function)) = member
                && matches!(self.heap.get(function), HeapData::Function(_))
            {
                let result = self.invoke_function(function, Some(Value::Ref(id)), &Args::new())?;
                return match result.as_str(&self.heap, &self.interns) {
                    Some(text) => Ok(text.to_owned()),
                    None => self.format_value(result, repr, depth + 1),
                };
            }
        }
        let HeapData::Instance(instance) = self.heap.get(id) else {
            panic!("format_instance on a non-instance slot");
        };
        let name = match self.heap.get(instance.class) {
            HeapData::Class(class) => self.interns.get_str(class.name),
            other => panic!("instance class slot holds {other:?}"),
        };
        Ok(format!("<{name} object>"))
    }

    /// Short description of a value for error messages; never dispatches
    /// user code.
    pub fn describe(&self, value: Value) -> String {
        match value {
            Value::InternString(id) => quote(self.interns.get_str(id)),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(f),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_owned(),
            Value::Undefined => "undefined".to_owned(),
            Value::Symbol(id) => {
                format!("<symbol {}>", self.interns.get_str(self.interns.symbol_name(id)))
            }
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Str(s) => quote(s),
                _ => format!("<{}>", value.type_of(&self.heap)),
            },
            other => format!("<{}>", other.type_of(&self.heap)),
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}
