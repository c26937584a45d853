//! Scope registry.
//!
//! A realm owns every scope (sandbox) and every function defined in one.
//! Function definitions are keyed by their literal and scope, so evaluating
//! the same function expression twice yields the same [`FunctionId`].

use std::fmt;
use std::rc::Rc;

use lamtrace_script::{FunctionLiteral, SourceLocation};
use lamtrace_value::{FunctionId, FunctionValue, Value};
use rustc_hash::FxHashMap;

use crate::natives::Native;
use crate::{HostError, Result};

/// Identifier of a scope inside a [`Realm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A sandbox with its own global bindings.
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub name: Rc<str>,
    globals: FxHashMap<Rc<str>, Value>,
}

impl Scope {
    /// Global binding names, unordered.
    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.globals.keys().map(AsRef::as_ref)
    }
}

/// What runs when a function is called.
#[derive(Debug)]
pub enum FunctionBody {
    Script {
        literal: Rc<FunctionLiteral>,
        /// Where a call into the function is first reported.
        entry: SourceLocation,
    },
    Native(Native),
}

/// A function registered in the realm.
#[derive(Debug)]
pub struct FunctionDef {
    pub id: FunctionId,
    pub name: Option<Rc<str>>,
    pub scope: ScopeId,
    pub url: Rc<str>,
    pub body: FunctionBody,
}

impl FunctionDef {
    /// The value that refers to this function.
    pub fn value(&self) -> Value {
        Value::Function(FunctionValue {
            name: self.name.clone(),
            id: self.id,
        })
    }

    /// Entry location of a script function.
    pub const fn entry(&self) -> Option<&SourceLocation> {
        match &self.body {
            FunctionBody::Script { entry, .. } => Some(entry),
            FunctionBody::Native(_) => None,
        }
    }
}

/// Registry of scopes and functions.
#[derive(Debug, Default)]
pub struct Realm {
    scopes: Vec<Scope>,
    functions: Vec<Rc<FunctionDef>>,
    by_literal: FxHashMap<(*const FunctionLiteral, ScopeId), FunctionId>,
}

impl Realm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scope with the native globals installed.
    pub fn create_scope(&mut self, name: &str) -> ScopeId {
        #[allow(clippy::cast_possible_truncation)]
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            name: Rc::from(name),
            globals: FxHashMap::default(),
        });
        for native in Native::ALL {
            let value = self.register(FunctionDef {
                id: FunctionId(0),
                name: Some(Rc::from(native.name())),
                scope: id,
                url: Rc::from("native"),
                body: FunctionBody::Native(native),
            });
            if let Some(scope) = self.scopes.last_mut() {
                scope.globals.insert(Rc::from(native.name()), value);
            }
        }
        id
    }

    pub fn scope(&self, id: ScopeId) -> Result<&Scope> {
        self.scopes
            .get(id.0 as usize)
            .ok_or(HostError::UnknownScope(id))
    }

    fn scope_mut(&mut self, id: ScopeId) -> Result<&mut Scope> {
        self.scopes
            .get_mut(id.0 as usize)
            .ok_or(HostError::UnknownScope(id))
    }

    /// All scopes, in creation order.
    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn global(&self, scope: ScopeId, name: &str) -> Result<Option<Value>> {
        Ok(self.scope(scope)?.globals.get(name).cloned())
    }

    pub fn set_global(&mut self, scope: ScopeId, name: &str, value: Value) -> Result<()> {
        self.scope_mut(scope)?.globals.insert(Rc::from(name), value);
        Ok(())
    }

    /// Whether `name` is bound in the scope's globals.
    pub fn has_global(&self, scope: ScopeId, name: &str) -> bool {
        self.scope(scope)
            .is_ok_and(|scope| scope.globals.contains_key(name))
    }

    /// Register a script function defined in `scope` and return its value.
    ///
    /// Defining the same literal twice in one scope returns the existing
    /// function.
    pub fn define_function(
        &mut self,
        scope: ScopeId,
        url: &Rc<str>,
        literal: &Rc<FunctionLiteral>,
    ) -> Result<Value> {
        self.scope(scope)?;
        let key = (Rc::as_ptr(literal), scope);
        if let Some(id) = self.by_literal.get(&key) {
            return Ok(self.functions[id.0 as usize].value());
        }
        let entry = SourceLocation::new(Rc::clone(url), literal.entry_pos());
        let value = self.register(FunctionDef {
            id: FunctionId(0),
            name: literal.name.clone(),
            scope,
            url: Rc::clone(url),
            body: FunctionBody::Script {
                literal: Rc::clone(literal),
                entry,
            },
        });
        if let Value::Function(func) = &value {
            self.by_literal.insert(key, func.id);
        }
        Ok(value)
    }

    fn register(&mut self, mut def: FunctionDef) -> Value {
        #[allow(clippy::cast_possible_truncation)]
        let id = FunctionId(self.functions.len() as u32);
        def.id = id;
        let value = def.value();
        self.functions.push(Rc::new(def));
        value
    }

    pub fn function(&self, id: FunctionId) -> Option<Rc<FunctionDef>> {
        self.functions.get(id.0 as usize).cloned()
    }

    /// Script functions defined in `scope`, in definition order.
    pub fn functions_in(&self, scope: ScopeId) -> impl Iterator<Item = &FunctionDef> {
        self.functions
            .iter()
            .map(AsRef::as_ref)
            .filter(move |def| def.scope == scope && def.entry().is_some())
    }
}
