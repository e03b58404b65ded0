//! Scripted stub engine
//!
//! A tree-walking interpreter over [`crate::syntax`] that implements the
//! jsbridge engine seam. Objects live in one arena per engine, so values
//! flow freely between realms of the same instance, and counters expose
//! how often the bridge compiled, ran or allocated.
//!
//! Two globals are installed in every realm to provoke failures that real
//! engines produce through property descriptors:
//! - `freeze(obj)` makes every later assignment to `obj` throw a `TypeError`
//! - `poison()` returns an object whose property reads and string
//!   conversion throw

use std::cell::Cell;
use std::rc::Rc;

use jsbridge::config::InstanceOptions;
use jsbridge::engine::{Engine, EngineResult, IcuData, Raised, ValueKind};
use jsbridge::host::{self, Completion, HostLink};
use jsbridge::marshal;
use rustc_hash::FxHashMap;

use crate::syntax::{self, BinaryOp, Expr, FunctionDef, Program, Stmt, UnaryOp};

const MAX_CALL_DEPTH: usize = 64;

/// Index into the engine's object arena
pub type ObjectId = usize;

/// Script value
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObjectId),
}

impl JsValue {
    fn string(text: impl Into<Rc<str>>) -> Self {
        JsValue::Str(text.into())
    }
}

#[derive(Clone)]
enum Callable {
    Script {
        def: Rc<FunctionDef>,
        global: ObjectId,
    },
    Host {
        name: String,
        link: HostLink,
    },
    Freeze,
    Poison,
}

#[derive(Default)]
struct ObjectData {
    props: FxHashMap<String, JsValue>,
    callable: Option<Callable>,
    frozen: bool,
    poisoned: bool,
}

/// A realm: one global object
pub struct ScriptedRealm {
    global: ObjectId,
    live: Rc<Cell<usize>>,
}

impl ScriptedRealm {
    /// Global object of this realm
    pub fn global(&self) -> ObjectId {
        self.global
    }
}

impl Drop for ScriptedRealm {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

enum Flow {
    Normal(Option<JsValue>),
    Return(JsValue),
}

type Eval<T> = Result<T, JsValue>;

/// Interpreter implementing [`Engine`]
pub struct ScriptedEngine {
    objects: Vec<ObjectData>,
    frames: Vec<FxHashMap<String, JsValue>>,
    live_realms: Rc<Cell<usize>>,
    compiles: usize,
    runs: usize,
    host_functions: usize,
}

impl ScriptedEngine {
    /// Number of successful and failed compilations
    pub fn compile_count(&self) -> usize {
        self.compiles
    }

    /// Number of script runs
    pub fn run_count(&self) -> usize {
        self.runs
    }

    /// Realms not yet dropped
    pub fn live_realms(&self) -> usize {
        self.live_realms.get()
    }

    /// Objects ever allocated, functions included
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Host functions ever created
    pub fn host_function_count(&self) -> usize {
        self.host_functions
    }

    /// Own property names of `object`, sorted
    pub fn property_names(&self, object: ObjectId) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .get(object)
            .map(|data| data.props.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn alloc(&mut self, data: ObjectData) -> ObjectId {
        self.objects.push(data);
        self.objects.len() - 1
    }

    fn alloc_function(&mut self, callable: Callable) -> ObjectId {
        self.alloc(ObjectData {
            callable: Some(callable),
            ..ObjectData::default()
        })
    }

    fn error(kind: &str, message: impl AsRef<str>) -> JsValue {
        JsValue::string(format!("{}: {}", kind, message.as_ref()))
    }

    fn raised(&self, thrown: JsValue) -> Raised {
        Raised::Exception {
            message: self.stringify(&thrown),
            detail: None,
        }
    }

    // ===== Conversions =====

    fn stringify(&self, value: &JsValue) -> Option<String> {
        Some(match value {
            JsValue::Undefined => "undefined".to_string(),
            JsValue::Null => "null".to_string(),
            JsValue::Bool(b) => b.to_string(),
            JsValue::Number(n) => format_number(*n),
            JsValue::Str(s) => s.to_string(),
            JsValue::Object(id) => {
                let data = &self.objects[*id];
                if data.poisoned {
                    return None;
                }
                match &data.callable {
                    Some(Callable::Script { def, .. }) => format!(
                        "function {}({}) {{ [script code] }}",
                        def.name.as_deref().unwrap_or(""),
                        def.params.join(", ")
                    ),
                    Some(Callable::Host { name, .. }) => {
                        format!("function {}() {{ [native code] }}", name)
                    }
                    Some(Callable::Freeze) => "function freeze() { [native code] }".to_string(),
                    Some(Callable::Poison) => "function poison() { [native code] }".to_string(),
                    None => "[object Object]".to_string(),
                }
            }
        })
    }

    fn to_text(&self, value: &JsValue) -> Eval<String> {
        self.stringify(value)
            .ok_or_else(|| Self::error("Error", "poisoned object cannot be converted"))
    }

    fn to_number(&self, value: &JsValue) -> f64 {
        match value {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Bool(b) => f64::from(u8::from(*b)),
            JsValue::Number(n) => *n,
            JsValue::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            JsValue::Object(_) => f64::NAN,
        }
    }

    fn truthy(value: &JsValue) -> bool {
        match value {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Bool(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::Str(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    fn type_of(&self, value: &JsValue) -> &'static str {
        match value {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Bool(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::Str(_) => "string",
            JsValue::Object(id) if self.objects[*id].callable.is_some() => "function",
            JsValue::Object(_) => "object",
        }
    }

    // ===== Properties =====

    fn get_property(&self, target: &JsValue, key: &str) -> Eval<JsValue> {
        match target {
            JsValue::Undefined | JsValue::Null => Err(Self::error(
                "TypeError",
                format!(
                    "Cannot read properties of {} (reading '{}')",
                    self.stringify(target).unwrap_or_default(),
                    key
                ),
            )),
            JsValue::Str(s) if key == "length" => Ok(JsValue::Number(s.chars().count() as f64)),
            JsValue::Object(id) => {
                let data = &self.objects[*id];
                if data.poisoned {
                    return Err(Self::error("Error", format!("poisoned property '{}'", key)));
                }
                Ok(data.props.get(key).cloned().unwrap_or(JsValue::Undefined))
            }
            _ => Ok(JsValue::Undefined),
        }
    }

    fn set_property(&mut self, target: &JsValue, key: &str, value: JsValue) -> Eval<()> {
        match target {
            JsValue::Undefined | JsValue::Null => Err(Self::error(
                "TypeError",
                format!(
                    "Cannot set properties of {} (setting '{}')",
                    self.stringify(target).unwrap_or_default(),
                    key
                ),
            )),
            JsValue::Object(id) => {
                let data = &mut self.objects[*id];
                if data.frozen {
                    return Err(Self::error(
                        "TypeError",
                        format!("Cannot assign to read only property '{}' of object", key),
                    ));
                }
                data.props.insert(key.to_string(), value);
                Ok(())
            }
            // Primitives silently drop property writes.
            _ => Ok(()),
        }
    }

    fn lookup(&self, global: ObjectId, name: &str) -> Eval<Option<JsValue>> {
        if let Some(value) = self.frames.last().and_then(|frame| frame.get(name)) {
            return Ok(Some(value.clone()));
        }
        let data = &self.objects[global];
        match data.props.get(name) {
            Some(value) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    fn bind(&mut self, global: ObjectId, name: &str, value: JsValue) -> Eval<()> {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.to_string(), value);
                Ok(())
            }
            None => self.set_property(&JsValue::Object(global), name, value),
        }
    }

    // ===== Execution =====

    fn hoist(&mut self, global: ObjectId, body: &[Stmt]) -> Eval<()> {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                let function = self.alloc_function(Callable::Script {
                    def: Rc::clone(def),
                    global,
                });
                if let Some(name) = &def.name {
                    self.bind(global, name, JsValue::Object(function))?;
                }
            }
        }
        Ok(())
    }

    fn exec_program(&mut self, global: ObjectId, program: &Program) -> Eval<JsValue> {
        self.hoist(global, &program.body)?;
        let mut last = JsValue::Undefined;
        for stmt in &program.body {
            match self.exec(global, stmt)? {
                Flow::Normal(Some(value)) => last = value,
                Flow::Normal(None) => {}
                Flow::Return(_) => {
                    return Err(Self::error("SyntaxError", "Illegal return statement"))
                }
            }
        }
        Ok(last)
    }

    fn exec(&mut self, global: ObjectId, stmt: &Stmt) -> Eval<Flow> {
        match stmt {
            Stmt::Declare(bindings) => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(expr) => self.eval(global, expr)?,
                        None => match self.lookup(global, name)? {
                            Some(_) => continue,
                            None => JsValue::Undefined,
                        },
                    };
                    self.bind(global, name, value)?;
                }
                Ok(Flow::Normal(None))
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal(None)),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(global, expr)?,
                    None => JsValue::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr) => Err(self.eval(global, expr)?),
            Stmt::Block(body) => {
                let mut last = None;
                for stmt in body {
                    match self.exec(global, stmt)? {
                        Flow::Normal(Some(value)) => last = Some(value),
                        Flow::Normal(None) => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal(last))
            }
            Stmt::Expr(expr) => Ok(Flow::Normal(Some(self.eval(global, expr)?))),
        }
    }

    fn eval(&mut self, global: ObjectId, expr: &Expr) -> Eval<JsValue> {
        match expr {
            Expr::Number(n) => Ok(JsValue::Number(*n)),
            Expr::Str(s) => Ok(JsValue::string(s.as_str())),
            Expr::Bool(b) => Ok(JsValue::Bool(*b)),
            Expr::Null => Ok(JsValue::Null),
            Expr::Undefined => Ok(JsValue::Undefined),
            Expr::Ident(name) => self
                .lookup(global, name)?
                .ok_or_else(|| Self::error("ReferenceError", format!("{} is not defined", name))),
            Expr::Member(object, key) => {
                let object = self.eval(global, object)?;
                self.get_property(&object, key)
            }
            Expr::Index(object, index) => {
                let object = self.eval(global, object)?;
                let index = self.eval(global, index)?;
                let key = self.to_text(&index)?;
                self.get_property(&object, &key)
            }
            Expr::Call(callee, args) => {
                let function = self.eval(global, callee)?;
                let argv = args
                    .iter()
                    .map(|arg| self.eval(global, arg))
                    .collect::<Eval<Vec<_>>>()?;
                self.call_value(&function, &argv)
            }
            Expr::Object(props) => {
                let mut data = ObjectData::default();
                for (key, value) in props {
                    let value = self.eval(global, value)?;
                    data.props.insert(key.clone(), value);
                }
                Ok(JsValue::Object(self.alloc(data)))
            }
            Expr::Function(def) => Ok(JsValue::Object(self.alloc_function(Callable::Script {
                def: Rc::clone(def),
                global,
            }))),
            Expr::Assign(target, value) => self.assign(global, target, value),
            Expr::Unary(op, operand) => self.unary(global, *op, operand),
            Expr::Binary(op, left, right) => {
                let left = self.eval(global, left)?;
                let right = self.eval(global, right)?;
                self.binary(*op, &left, &right)
            }
        }
    }

    fn assign(&mut self, global: ObjectId, target: &Expr, value: &Expr) -> Eval<JsValue> {
        match target {
            Expr::Ident(name) => {
                let value = self.eval(global, value)?;
                match self.frames.last_mut() {
                    Some(frame) if frame.contains_key(name) => {
                        frame.insert(name.clone(), value.clone());
                    }
                    _ => self.set_property(&JsValue::Object(global), name, value.clone())?,
                }
                Ok(value)
            }
            Expr::Member(object, key) => {
                let object = self.eval(global, object)?;
                let value = self.eval(global, value)?;
                self.set_property(&object, key, value.clone())?;
                Ok(value)
            }
            Expr::Index(object, index) => {
                let object = self.eval(global, object)?;
                let index = self.eval(global, index)?;
                let key = self.to_text(&index)?;
                let value = self.eval(global, value)?;
                self.set_property(&object, &key, value.clone())?;
                Ok(value)
            }
            _ => Err(Self::error("SyntaxError", "Invalid left-hand side in assignment")),
        }
    }

    fn unary(&mut self, global: ObjectId, op: UnaryOp, operand: &Expr) -> Eval<JsValue> {
        // `typeof undeclared` does not throw
        if let (UnaryOp::Typeof, Expr::Ident(name)) = (op, operand) {
            if self.lookup(global, name)?.is_none() {
                return Ok(JsValue::string("undefined"));
            }
        }

        let value = self.eval(global, operand)?;
        Ok(match op {
            UnaryOp::Neg => JsValue::Number(-self.to_number(&value)),
            UnaryOp::Not => JsValue::Bool(!Self::truthy(&value)),
            UnaryOp::Typeof => JsValue::string(self.type_of(&value)),
        })
    }

    fn binary(&self, op: BinaryOp, left: &JsValue, right: &JsValue) -> Eval<JsValue> {
        let textual = |v: &JsValue| matches!(v, JsValue::Str(_) | JsValue::Object(_));
        if op == BinaryOp::Add && (textual(left) || textual(right)) {
            let mut text = self.to_text(left)?;
            text.push_str(&self.to_text(right)?);
            return Ok(JsValue::string(text));
        }

        let (l, r) = (self.to_number(left), self.to_number(right));
        Ok(JsValue::Number(match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => l / r,
        }))
    }

    fn call_value(&mut self, function: &JsValue, args: &[JsValue]) -> Eval<JsValue> {
        let callable = match function {
            JsValue::Object(id) => self.objects[*id].callable.clone(),
            _ => None,
        };
        let Some(callable) = callable else {
            return Err(Self::error(
                "TypeError",
                format!("{} is not a function", self.type_of(function)),
            ));
        };

        match callable {
            Callable::Script { def, global } => {
                if self.frames.len() >= MAX_CALL_DEPTH {
                    return Err(Self::error("RangeError", "Maximum call stack size exceeded"));
                }
                let mut frame = FxHashMap::default();
                for (i, param) in def.params.iter().enumerate() {
                    frame.insert(
                        param.clone(),
                        args.get(i).cloned().unwrap_or(JsValue::Undefined),
                    );
                }
                self.frames.push(frame);
                let result = self.run_body(global, &def.body);
                self.frames.pop();
                result
            }
            Callable::Host { link, .. } => {
                let argv: Vec<String> = args
                    .iter()
                    .map(|arg| {
                        let kind = self.kind_of(arg);
                        marshal::render(kind, || self.stringify(arg))
                    })
                    .collect();
                match host::dispatch(Some(&link), argv) {
                    Completion::Return(Some(text)) => Ok(JsValue::string(text)),
                    Completion::Return(None) => Ok(JsValue::Undefined),
                    Completion::Throw(message) => Err(JsValue::string(message)),
                }
            }
            Callable::Freeze => {
                let target = args.first().cloned().unwrap_or(JsValue::Undefined);
                if let JsValue::Object(id) = target {
                    self.objects[id].frozen = true;
                }
                Ok(target)
            }
            Callable::Poison => Ok(JsValue::Object(self.alloc(ObjectData {
                poisoned: true,
                ..ObjectData::default()
            }))),
        }
    }

    fn run_body(&mut self, global: ObjectId, body: &[Stmt]) -> Eval<JsValue> {
        self.hoist(global, body)?;
        for stmt in body {
            if let Flow::Return(value) = self.exec(global, stmt)? {
                return Ok(value);
            }
        }
        Ok(JsValue::Undefined)
    }

    fn kind_of(&self, value: &JsValue) -> ValueKind {
        match value {
            JsValue::Undefined => ValueKind::Undefined,
            JsValue::Null => ValueKind::Null,
            JsValue::Object(id) if self.objects[*id].callable.is_some() => ValueKind::Function,
            JsValue::Object(_) => ValueKind::Object,
            _ => ValueKind::Primitive,
        }
    }
}

/// Number to string the way scripts print them
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

impl Engine for ScriptedEngine {
    type Realm = ScriptedRealm;
    type Unbound = Rc<Program>;
    type Value = JsValue;
    type Object = ObjectId;

    fn initialize_platform(_icu: IcuData) -> Result<(), String> {
        Ok(())
    }

    fn new_instance(options: &InstanceOptions) -> Result<Self, String> {
        if options.max_heap_bytes == Some(0) {
            return Err("heap limit must be non-zero".to_string());
        }
        Ok(Self {
            objects: Vec::new(),
            frames: Vec::new(),
            live_realms: Rc::new(Cell::new(0)),
            compiles: 0,
            runs: 0,
            host_functions: 0,
        })
    }

    fn new_realm(&mut self) -> EngineResult<ScriptedRealm> {
        let global = self.alloc(ObjectData::default());
        let freeze = self.alloc_function(Callable::Freeze);
        let poison = self.alloc_function(Callable::Poison);
        let props = &mut self.objects[global].props;
        props.insert("freeze".to_string(), JsValue::Object(freeze));
        props.insert("poison".to_string(), JsValue::Object(poison));

        self.live_realms.set(self.live_realms.get() + 1);
        Ok(ScriptedRealm {
            global,
            live: Rc::clone(&self.live_realms),
        })
    }

    fn global(&mut self, realm: &ScriptedRealm) -> ObjectId {
        realm.global
    }

    fn compile(&mut self, _realm: Option<&ScriptedRealm>, source: &str) -> EngineResult<Rc<Program>> {
        self.compiles += 1;
        syntax::parse(source).map(Rc::new).map_err(|err| {
            let (line, column) = err.location(source);
            Raised::Exception {
                message: Some(err.to_string()),
                detail: Some(format!("at line {}, column {}", line, column)),
            }
        })
    }

    fn run(&mut self, realm: &ScriptedRealm, script: &Rc<Program>) -> EngineResult<JsValue> {
        self.runs += 1;
        self.exec_program(realm.global, script)
            .map_err(|thrown| self.raised(thrown))
    }

    fn get(&mut self, _realm: &ScriptedRealm, object: &ObjectId, key: &str) -> EngineResult<JsValue> {
        self.get_property(&JsValue::Object(*object), key)
            .map_err(|thrown| self.raised(thrown))
    }

    fn set(
        &mut self,
        _realm: &ScriptedRealm,
        object: &ObjectId,
        key: &str,
        value: &JsValue,
    ) -> EngineResult<()> {
        self.set_property(&JsValue::Object(*object), key, value.clone())
            .map_err(|thrown| self.raised(thrown))
    }

    fn new_object(&mut self, _realm: &ScriptedRealm) -> ObjectId {
        self.alloc(ObjectData::default())
    }

    fn string(&mut self, text: &str) -> JsValue {
        JsValue::string(text)
    }

    fn number(&mut self, value: f64) -> JsValue {
        JsValue::Number(value)
    }

    fn undefined(&mut self) -> JsValue {
        JsValue::Undefined
    }

    fn kind(&mut self, value: &JsValue) -> ValueKind {
        self.kind_of(value)
    }

    fn as_object(&mut self, value: &JsValue) -> Option<ObjectId> {
        match value {
            JsValue::Object(id) => Some(*id),
            _ => None,
        }
    }

    fn object_value(&mut self, object: &ObjectId) -> JsValue {
        JsValue::Object(*object)
    }

    fn to_utf8(&mut self, _realm: &ScriptedRealm, value: &JsValue) -> Option<String> {
        self.stringify(value)
    }

    fn new_host_function(
        &mut self,
        _realm: &ScriptedRealm,
        name: &str,
        link: HostLink,
    ) -> EngineResult<JsValue> {
        self.host_functions += 1;
        let function = self.alloc_function(Callable::Host {
            name: name.to_string(),
            link,
        });
        Ok(JsValue::Object(function))
    }

    fn call(
        &mut self,
        _realm: &ScriptedRealm,
        function: &JsValue,
        _receiver: &ObjectId,
        args: &[JsValue],
    ) -> EngineResult<JsValue> {
        self.call_value(function, args)
            .map_err(|thrown| self.raised(thrown))
    }
}
