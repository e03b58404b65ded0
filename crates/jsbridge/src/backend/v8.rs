//! V8 backend
//!
//! Maps the engine seam onto the `v8` crate. An [`V8Engine`] owns one
//! isolate. The isolate is only entered for the duration of a single
//! operation, so any number of instances can live on one thread and be
//! disposed in any order.
//!
//! Host functions carry a boxed [`HostLink`] in an `External`. The boxes
//! are owned by the realm that created the function and live exactly as
//! long as it does.

use std::cell::RefCell;
use std::ffi::c_void;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::config::InstanceOptions;
use crate::engine::{Engine, EngineResult, IcuData, Raised, ValueKind};
use crate::host::{self, Completion, HostLink};
use crate::marshal;

/// One V8 isolate
pub struct V8Engine {
    isolate: v8::OwnedIsolate,
}

/// Persistent context plus the host links its functions point at
pub struct V8Realm {
    context: v8::Global<v8::Context>,
    links: RefCell<Vec<Box<HostLink>>>,
}

/// Enters the isolate on creation and exits it on drop.
struct Entered<'a>(&'a mut v8::OwnedIsolate);

impl<'a> Entered<'a> {
    fn new(isolate: &'a mut v8::OwnedIsolate) -> Self {
        // SAFETY: paired with the exit in Drop; nested entries unwind in
        // reverse order because guards are stack-scoped.
        unsafe { isolate.enter() };
        Self(isolate)
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        // SAFETY: entered in `new`
        unsafe { self.0.exit() };
    }
}

impl Deref for Entered<'_> {
    type Target = v8::OwnedIsolate;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for Entered<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl V8Engine {
    /// Run `f` with a handle scope but no context.
    fn bare<R>(&mut self, f: impl for<'s> FnOnce(&mut v8::HandleScope<'s, ()>) -> R) -> R {
        let mut isolate = Entered::new(&mut self.isolate);
        let scope = &mut v8::HandleScope::new(&mut *isolate);
        f(scope)
    }

    /// Run `f` inside `realm`'s context.
    fn within<R>(
        &mut self,
        realm: &V8Realm,
        f: impl for<'s> FnOnce(&mut v8::HandleScope<'s>) -> R,
    ) -> R {
        let mut isolate = Entered::new(&mut self.isolate);
        let scope = &mut v8::HandleScope::new(&mut *isolate);
        let context = v8::Local::new(scope, &realm.context);
        let scope = &mut v8::ContextScope::new(scope, context);
        f(scope)
    }
}

impl Drop for V8Engine {
    fn drop(&mut self) {
        // OwnedIsolate expects to be the current isolate when disposed.
        // SAFETY: its Drop performs the matching exit.
        unsafe { self.isolate.enter() };
    }
}

/// Pending exception of a try-catch block
fn raised(tc: &mut v8::TryCatch<'_, v8::HandleScope<'_>>) -> Raised {
    let Some(exception) = tc.exception() else {
        return Raised::NotPending;
    };
    let message = exception
        .to_string(tc)
        .map(|text| text.to_rust_string_lossy(tc));
    let detail = tc.message().map(|m| m.get(tc).to_rust_string_lossy(tc));
    Raised::Exception { message, detail }
}

fn new_string<'s>(scope: &mut v8::HandleScope<'s, ()>, text: &str) -> v8::Local<'s, v8::String> {
    v8::String::new(scope, text).unwrap_or_else(|| v8::String::empty(scope))
}

fn kind_of(value: v8::Local<'_, v8::Value>) -> ValueKind {
    if value.is_undefined() {
        ValueKind::Undefined
    } else if value.is_null() {
        ValueKind::Null
    } else if value.is_function() {
        ValueKind::Function
    } else if value.is_object() {
        ValueKind::Object
    } else {
        ValueKind::Primitive
    }
}

fn render(scope: &mut v8::HandleScope<'_>, value: v8::Local<'_, v8::Value>) -> String {
    marshal::render(kind_of(value), || {
        let tc = &mut v8::TryCatch::new(scope);
        value.to_string(tc).map(|text| text.to_rust_string_lossy(tc))
    })
}

fn trampoline(
    scope: &mut v8::HandleScope<'_>,
    args: v8::FunctionCallbackArguments<'_>,
    mut rv: v8::ReturnValue<'_>,
) {
    let link = v8::Local::<v8::External>::try_from(args.data())
        .ok()
        .map(|external| external.value() as *const HostLink)
        .filter(|ptr| !ptr.is_null())
        // SAFETY: the pointer comes from a Box owned by the realm that
        // created this function, which outlives every call into it.
        .map(|ptr| unsafe { &*ptr });

    let argv: Vec<String> = (0..args.length()).map(|i| render(scope, args.get(i))).collect();

    match host::dispatch(link, argv) {
        Completion::Return(Some(text)) => {
            let value = new_string(scope, &text);
            rv.set(value.into());
        }
        Completion::Return(None) => rv.set_undefined(),
        Completion::Throw(message) => {
            let value = new_string(scope, &message);
            scope.throw_exception(value.into());
        }
    }
}

impl Engine for V8Engine {
    type Realm = V8Realm;
    type Unbound = Rc<v8::Global<v8::UnboundScript>>;
    type Value = v8::Global<v8::Value>;
    type Object = v8::Global<v8::Object>;

    fn initialize_platform(icu: IcuData) -> Result<(), String> {
        if let IcuData::Bytes(data) = icu {
            v8::icu::set_common_data_74(data)
                .map_err(|code| format!("ICU initialization failed (code {})", code))?;
        }
        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform);
        v8::V8::initialize();
        Ok(())
    }

    fn new_instance(options: &InstanceOptions) -> Result<Self, String> {
        let mut params = v8::CreateParams::default();
        if let Some(max) = options.max_heap_bytes {
            params = params.heap_limits(options.initial_heap_bytes.unwrap_or(0), max);
        }
        let mut isolate = v8::Isolate::new(params);
        // SAFETY: a new isolate is entered on creation; leave it so other
        // instances can be created and dropped independently.
        unsafe { isolate.exit() };
        Ok(Self { isolate })
    }

    fn new_realm(&mut self) -> EngineResult<V8Realm> {
        let context = self.bare(|scope| {
            let context = v8::Context::new(scope);
            v8::Global::new(scope, context)
        });
        Ok(V8Realm {
            context,
            links: RefCell::new(Vec::new()),
        })
    }

    fn global(&mut self, realm: &V8Realm) -> Self::Object {
        self.within(realm, |scope| {
            let global = scope.get_current_context().global(scope);
            v8::Global::new(scope, global)
        })
    }

    fn compile(&mut self, realm: Option<&V8Realm>, source: &str) -> EngineResult<Self::Unbound> {
        let compile_in = |scope: &mut v8::HandleScope<'_>| {
            let tc = &mut v8::TryCatch::new(scope);
            let text = v8::String::new(tc, source).ok_or(Raised::NotPending)?;
            let mut source = v8::script_compiler::Source::new(text, None);
            match v8::script_compiler::compile_unbound_script(
                tc,
                &mut source,
                v8::script_compiler::CompileOptions::NoCompileOptions,
                v8::script_compiler::NoCacheReason::NoReason,
            ) {
                Some(unbound) => Ok(Rc::new(v8::Global::new(tc, unbound))),
                None => Err(raised(tc)),
            }
        };

        match realm {
            Some(realm) => self.within(realm, compile_in),
            None => self.bare(|scope| {
                let context = v8::Context::new(scope);
                let scope = &mut v8::ContextScope::new(scope, context);
                compile_in(scope)
            }),
        }
    }

    fn run(&mut self, realm: &V8Realm, script: &Self::Unbound) -> EngineResult<Self::Value> {
        self.within(realm, |scope| {
            let tc = &mut v8::TryCatch::new(scope);
            let unbound = v8::Local::new(tc, &**script);
            let bound = unbound.bind_to_current_context(tc);
            match bound.run(tc) {
                Some(value) => Ok(v8::Global::new(tc, value)),
                None => Err(raised(tc)),
            }
        })
    }

    fn get(&mut self, realm: &V8Realm, object: &Self::Object, key: &str) -> EngineResult<Self::Value> {
        self.within(realm, |scope| {
            let tc = &mut v8::TryCatch::new(scope);
            let object = v8::Local::new(tc, object);
            let key = new_string(tc, key);
            match object.get(tc, key.into()) {
                Some(value) => Ok(v8::Global::new(tc, value)),
                None => Err(raised(tc)),
            }
        })
    }

    fn set(
        &mut self,
        realm: &V8Realm,
        object: &Self::Object,
        key: &str,
        value: &Self::Value,
    ) -> EngineResult<()> {
        self.within(realm, |scope| {
            let tc = &mut v8::TryCatch::new(scope);
            let object = v8::Local::new(tc, object);
            let key = new_string(tc, key);
            let value = v8::Local::new(tc, value);
            match object.set(tc, key.into(), value) {
                Some(true) => Ok(()),
                _ => Err(raised(tc)),
            }
        })
    }

    fn new_object(&mut self, realm: &V8Realm) -> Self::Object {
        self.within(realm, |scope| {
            let object = v8::Object::new(scope);
            v8::Global::new(scope, object)
        })
    }

    fn string(&mut self, text: &str) -> Self::Value {
        self.bare(|scope| {
            let value: v8::Local<'_, v8::Value> = new_string(scope, text).into();
            v8::Global::new(scope, value)
        })
    }

    fn number(&mut self, value: f64) -> Self::Value {
        self.bare(|scope| {
            let value: v8::Local<'_, v8::Value> = v8::Number::new(scope, value).into();
            v8::Global::new(scope, value)
        })
    }

    fn undefined(&mut self) -> Self::Value {
        self.bare(|scope| {
            let value: v8::Local<'_, v8::Value> = v8::undefined(scope).into();
            v8::Global::new(scope, value)
        })
    }

    fn kind(&mut self, value: &Self::Value) -> ValueKind {
        self.bare(|scope| kind_of(v8::Local::new(scope, value)))
    }

    fn as_object(&mut self, value: &Self::Value) -> Option<Self::Object> {
        self.bare(|scope| {
            let value = v8::Local::new(scope, value);
            let object = v8::Local::<v8::Object>::try_from(value).ok()?;
            Some(v8::Global::new(scope, object))
        })
    }

    fn object_value(&mut self, object: &Self::Object) -> Self::Value {
        self.bare(|scope| {
            let value: v8::Local<'_, v8::Value> = v8::Local::new(scope, object).into();
            v8::Global::new(scope, value)
        })
    }

    fn to_utf8(&mut self, realm: &V8Realm, value: &Self::Value) -> Option<String> {
        self.within(realm, |scope| {
            let tc = &mut v8::TryCatch::new(scope);
            let value = v8::Local::new(tc, value);
            value.to_string(tc).map(|text| text.to_rust_string_lossy(tc))
        })
    }

    fn new_host_function(
        &mut self,
        realm: &V8Realm,
        name: &str,
        link: HostLink,
    ) -> EngineResult<Self::Value> {
        let mut boxed = Box::new(link);
        let ptr = &mut *boxed as *mut HostLink as *mut c_void;

        let function = self.within(realm, |scope| {
            let tc = &mut v8::TryCatch::new(scope);
            let external = v8::External::new(tc, ptr);
            let template = v8::FunctionTemplate::builder(trampoline)
                .data(external.into())
                .build(tc);
            let Some(function) = template.get_function(tc) else {
                return Err(raised(tc));
            };
            let name = new_string(tc, name);
            function.set_name(name);
            let value: v8::Local<'_, v8::Value> = function.into();
            Ok(v8::Global::new(tc, value))
        })?;

        realm.links.borrow_mut().push(boxed);
        Ok(function)
    }

    fn call(
        &mut self,
        realm: &V8Realm,
        function: &Self::Value,
        receiver: &Self::Object,
        args: &[Self::Value],
    ) -> EngineResult<Self::Value> {
        self.within(realm, |scope| {
            let tc = &mut v8::TryCatch::new(scope);
            let function = v8::Local::new(tc, function);
            let function =
                v8::Local::<v8::Function>::try_from(function).map_err(|_| Raised::NotPending)?;
            let receiver: v8::Local<'_, v8::Value> = v8::Local::new(tc, receiver).into();
            let argv: Vec<v8::Local<'_, v8::Value>> =
                args.iter().map(|arg| v8::Local::new(tc, arg)).collect();
            match function.call(tc, receiver, &argv) {
                Some(value) => Ok(v8::Global::new(tc, value)),
                None => Err(raised(tc)),
            }
        })
    }
}
