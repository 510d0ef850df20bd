//! Evaluation context for CQL execution
//!
//! The context carries everything an expression needs at evaluation time that
//! isn't part of the expression tree itself: the current context resource
//! (e.g. `Patient`), parameter bindings, the alias/let/special-variable scope
//! stack introduced by queries and iteration operators, the data and
//! terminology providers, the "now" timestamp (captured once so a whole
//! evaluation run sees a single, stable point in time), and bookkeeping for
//! definition memoization and recursion detection.

use chrono::{Datelike, Local, Timelike};
use octofhir_cql_elm::Library;
use octofhir_cql_types::{CqlDate, CqlDateTime, CqlTime, CqlValue};
use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;

/// Maximum expression evaluation depth before a recursive definition is
/// assumed to have gone infinite.
const MAX_RECURSION_DEPTH: usize = 256;

/// Provides access to external clinical data for `Retrieve` expressions and
/// for navigating properties of model-defined resources.
pub trait DataProvider: Send + Sync {
    /// Retrieve resources of the given type matching the supplied filters.
    #[allow(clippy::too_many_arguments)]
    fn retrieve(
        &self,
        data_type: &str,
        context_type: Option<&str>,
        context_value: Option<&CqlValue>,
        template_id: Option<&str>,
        code_property: Option<&str>,
        codes: Option<&CqlValue>,
        date_property: Option<&str>,
        date_range: Option<&CqlValue>,
    ) -> Vec<CqlValue>;

    /// Resolve a property path against a resource the model knows how to
    /// navigate (e.g. a FHIR resource) that isn't a plain Tuple or List.
    fn get_property(&self, resource: &CqlValue, path: &str) -> Option<CqlValue>;
}

/// Provides access to terminology services for `InValueSet`, `InCodeSystem`
/// and related clinical operators.
///
/// Each method returns `None` when membership/lookup cannot be determined
/// (no provider configured, or the service call failed) so callers can fall
/// back to CQL `Null` rather than raising.
pub trait TerminologyProvider: Send + Sync {
    /// Whether `code` is a member of the given value set.
    fn in_value_set(&self, code: &CqlValue, value_set_id: &str) -> Option<bool>;
    /// Whether `code` belongs to the given code system.
    fn in_code_system(&self, code: &CqlValue, code_system_id: &str) -> Option<bool>;
    /// Expand a value set to its member codes.
    fn expand_value_set(&self, value_set_id: &str) -> Option<Vec<CqlValue>>;
    /// Look up the display string for a code.
    fn lookup_display(&self, code: &CqlValue) -> Option<String>;
}

/// Resolves cross-library references (`"Lib"."Def"`) declared via an
/// `include` statement.
///
/// Implementations are free to back this with a file-system library loader,
/// a pre-registered in-memory map, or a network fetch; the evaluator only
/// needs a name/version in, compiled [`Library`] out.
pub trait LibraryManager: Send + Sync {
    /// Look up a previously compiled library by name and optional version.
    /// Returns `None` if it is not registered with this manager.
    fn get_library(&self, name: &str, version: Option<&str>) -> Option<Arc<Library>>;
}

/// A simple in-memory [`LibraryManager`] keyed by library name.
///
/// When a version is requested but the registered library carries a
/// different (or no) version, the lookup still succeeds on name alone: the
/// core engine does not enforce version matching, leaving that policy to
/// richer implementations.
#[derive(Default)]
pub struct InMemoryLibraryManager {
    libraries: RwLock<HashMap<String, Arc<Library>>>,
}

impl InMemoryLibraryManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled library, keyed by its declared name.
    pub fn add_library(&self, library: Arc<Library>) {
        self.libraries
            .write()
            .insert(library.identifier.id.clone(), library);
    }
}

impl LibraryManager for InMemoryLibraryManager {
    fn get_library(&self, name: &str, _version: Option<&str>) -> Option<Arc<Library>> {
        self.libraries.read().get(name).cloned()
    }
}

/// A single frame of the scope stack.
///
/// Queries and iteration operators (`Filter`, `ForEach`, `Sort`, ...) push a
/// fresh scope before binding their alias/`$this`/`$index` values and pop it
/// when done, so bindings never leak past the construct that introduced them.
/// Lookups still see enclosing scopes: a nested query's `where` clause can
/// reference an outer query's alias.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    aliases: HashMap<String, CqlValue>,
    lets: HashMap<String, CqlValue>,
    specials: HashMap<String, CqlValue>,
}

/// Evaluation context for CQL expression execution
pub struct EvaluationContext {
    /// Current context type (e.g., "Patient")
    context_type: Option<String>,
    /// Current context value (e.g., Patient resource)
    context_value: Option<CqlValue>,
    /// Parameter values, keyed by `"Library.name"` when qualified or plain
    /// `"name"` for the current library.
    parameters: HashMap<String, CqlValue>,
    /// Alias/let/special variable scope stack.
    scopes: Vec<Scope>,
    /// The library being evaluated, if any, used to resolve `ExpressionRef`.
    main_library: Option<Arc<Library>>,
    /// External data access.
    data_provider: Option<Arc<dyn DataProvider>>,
    /// External terminology access.
    terminology_provider: Option<Arc<dyn TerminologyProvider>>,
    /// Cross-library definition resolution.
    library_manager: Option<Arc<dyn LibraryManager>>,
    /// `Now()` captured once for the whole evaluation.
    now: CqlDateTime,
    /// Memoized results of `evaluate_expression`, keyed by `"library:name"`.
    definition_cache: HashMap<String, CqlValue>,
    /// Names of definitions currently being evaluated, for recursion
    /// detection (distinct from the depth counter below).
    active_definitions: std::collections::HashSet<String>,
    /// Current expression-evaluation depth.
    recursion_depth: usize,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationContext {
    /// Create a new empty context with `now` captured at the local time.
    pub fn new() -> Self {
        let now = Local::now();
        let naive = now.naive_local();
        let offset_minutes = (now.offset().local_minus_utc() / 60) as i16;

        Self {
            context_type: None,
            context_value: None,
            parameters: HashMap::new(),
            scopes: vec![Scope::default()],
            main_library: None,
            data_provider: None,
            terminology_provider: None,
            library_manager: None,
            now: CqlDateTime::new(
                naive.year(),
                naive.month() as u8,
                naive.day() as u8,
                naive.hour() as u8,
                naive.minute() as u8,
                naive.second() as u8,
                (naive.nanosecond() / 1_000_000) as u16,
                Some(offset_minutes),
            ),
            definition_cache: HashMap::new(),
            active_definitions: std::collections::HashSet::new(),
            recursion_depth: 0,
        }
    }

    /// Set the context type and value
    pub fn with_context(mut self, context_type: impl Into<String>, value: CqlValue) -> Self {
        let context_type = context_type.into();
        // Registered as a base-scope alias so Property nodes carrying a
        // `scope` of the context type name (e.g. "Patient") - the shape the
        // converter emits for unqualified context-resource access such as
        // `AgeInYears()` - resolve without a dedicated node kind.
        self.scopes[0].aliases.insert(context_type.clone(), value.clone());
        self.context_type = Some(context_type);
        self.context_value = Some(value);
        self
    }

    /// Attach the library being evaluated (used to resolve `ExpressionRef`).
    pub fn with_library(mut self, library: Arc<Library>) -> Self {
        self.main_library = Some(library);
        self
    }

    /// Attach a data provider for `Retrieve` and property navigation.
    pub fn with_data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = Some(provider);
        self
    }

    /// Attach a terminology provider for clinical operators.
    pub fn with_terminology_provider(mut self, provider: Arc<dyn TerminologyProvider>) -> Self {
        self.terminology_provider = Some(provider);
        self
    }

    /// Attach a library manager for cross-library reference resolution.
    pub fn with_library_manager(mut self, manager: Arc<dyn LibraryManager>) -> Self {
        self.library_manager = Some(manager);
        self
    }

    /// Current context type, e.g. `"Patient"`.
    pub fn context_type(&self) -> Option<&str> {
        self.context_type.as_deref()
    }

    /// Current context resource value.
    pub fn context_value(&self) -> Option<&CqlValue> {
        self.context_value.as_ref()
    }

    /// The library currently being evaluated, if attached.
    pub fn main_library_arc(&self) -> Option<Arc<Library>> {
        self.main_library.clone()
    }

    /// The configured data provider, if any.
    pub fn data_provider(&self) -> Option<&Arc<dyn DataProvider>> {
        self.data_provider.as_ref()
    }

    /// The configured terminology provider, if any.
    pub fn terminology_provider(&self) -> Option<&Arc<dyn TerminologyProvider>> {
        self.terminology_provider.as_ref()
    }

    /// The configured library manager, if any.
    pub fn library_manager(&self) -> Option<&Arc<dyn LibraryManager>> {
        self.library_manager.as_ref()
    }

    /// The timestamp captured for `Now()`.
    pub fn now(&self) -> CqlDateTime {
        self.now.clone()
    }

    /// The date captured for `Today()`.
    pub fn today(&self) -> CqlDate {
        CqlDate {
            year: self.now.year,
            month: self.now.month,
            day: self.now.day,
        }
    }

    /// The time captured for `TimeOfDay()`.
    pub fn time_of_day(&self) -> CqlTime {
        CqlTime {
            hour: self.now.hour.unwrap_or(0),
            minute: self.now.minute,
            second: self.now.second,
            millisecond: self.now.millisecond,
        }
    }

    /// Set an unqualified parameter value.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: CqlValue) {
        self.parameters.insert(name.into(), value);
    }

    /// Get an unqualified parameter value.
    pub fn get_parameter(&self, name: &str) -> Option<&CqlValue> {
        self.parameters.get(name)
    }

    /// Get a parameter, optionally qualified by the library it was declared
    /// in (`library.ParamName`), falling back to the unqualified name.
    pub fn get_parameter_qualified(&self, library_name: Option<&str>, name: &str) -> Option<&CqlValue> {
        if let Some(lib) = library_name {
            if let Some(v) = self.parameters.get(&format!("{lib}.{name}")) {
                return Some(v);
            }
        }
        self.parameters.get(name)
    }

    /// Push a new (empty) scope frame.
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope frame.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind an alias in the innermost scope.
    pub fn set_alias(&mut self, name: impl Into<String>, value: CqlValue) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.aliases.insert(name.into(), value);
        }
    }

    /// Look up an alias, searching from the innermost scope outward.
    pub fn get_alias(&self, name: &str) -> Option<&CqlValue> {
        self.scopes.iter().rev().find_map(|s| s.aliases.get(name))
    }

    /// Bind a query `let` variable in the innermost scope.
    pub fn set_let(&mut self, name: impl Into<String>, value: CqlValue) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.lets.insert(name.into(), value);
        }
    }

    /// Look up a `let` variable, searching from the innermost scope outward.
    pub fn get_let(&self, name: &str) -> Option<&CqlValue> {
        self.scopes.iter().rev().find_map(|s| s.lets.get(name))
    }

    /// Bind a special iteration variable (`$this`, `$index`, `$total`) in the
    /// innermost scope.
    pub fn set_special(&mut self, name: impl Into<String>, value: CqlValue) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.specials.insert(name.into(), value);
        }
    }

    /// Look up a special iteration variable, searching from the innermost
    /// scope outward.
    pub fn get_special(&self, name: &str) -> Option<&CqlValue> {
        self.scopes.iter().rev().find_map(|s| s.specials.get(name))
    }

    /// Set a local variable (alias for `set_let`, kept for compatibility with
    /// code written against a flat-scope mental model).
    pub fn set_local(&mut self, name: impl Into<String>, value: CqlValue) {
        self.set_let(name, value);
    }

    /// Get a local variable (alias for `get_let`).
    pub fn get_local(&self, name: &str) -> Option<&CqlValue> {
        self.get_let(name)
    }

    /// Look up a memoized definition result.
    pub fn get_cached(&self, key: &str) -> Option<CqlValue> {
        self.definition_cache.get(key).cloned()
    }

    /// Memoize a definition result.
    pub fn cache_result(&mut self, key: impl Into<String>, value: CqlValue) {
        self.definition_cache.insert(key.into(), value);
    }

    /// Mark entry into a named definition's evaluation; returns `false` if
    /// the definition is already being evaluated (direct or indirect
    /// recursion), which should be reported as a `RecursionError`.
    pub fn enter_definition(&mut self, key: &str) -> bool {
        self.active_definitions.insert(key.to_string())
    }

    /// Mark exit from a named definition's evaluation.
    pub fn exit_definition(&mut self, key: &str) {
        self.active_definitions.remove(key);
    }

    /// Increment the expression recursion depth; returns `false` once the
    /// limit is exceeded.
    pub fn enter_recursion(&mut self) -> bool {
        if self.recursion_depth >= MAX_RECURSION_DEPTH {
            return false;
        }
        self.recursion_depth += 1;
        true
    }

    /// Decrement the expression recursion depth.
    pub fn exit_recursion(&mut self) {
        self.recursion_depth = self.recursion_depth.saturating_sub(1);
    }
}

/// Builder for [`EvaluationContext`], mirroring the `with_*` methods but
/// usable where a fluent construction-then-finalize style reads better (for
/// example when wiring several optional providers from CLI arguments).
#[derive(Default)]
pub struct EvaluationContextBuilder {
    context_type: Option<String>,
    context_value: Option<CqlValue>,
    parameters: HashMap<String, CqlValue>,
    main_library: Option<Arc<Library>>,
    data_provider: Option<Arc<dyn DataProvider>>,
    terminology_provider: Option<Arc<dyn TerminologyProvider>>,
    library_manager: Option<Arc<dyn LibraryManager>>,
}

impl EvaluationContextBuilder {
    /// Start a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context type and value.
    pub fn context(mut self, context_type: impl Into<String>, value: CqlValue) -> Self {
        self.context_type = Some(context_type.into());
        self.context_value = Some(value);
        self
    }

    /// Add a parameter binding.
    pub fn parameter(mut self, name: impl Into<String>, value: CqlValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Attach the library being evaluated.
    pub fn library(mut self, library: Arc<Library>) -> Self {
        self.main_library = Some(library);
        self
    }

    /// Attach a data provider.
    pub fn data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = Some(provider);
        self
    }

    /// Attach a terminology provider.
    pub fn terminology_provider(mut self, provider: Arc<dyn TerminologyProvider>) -> Self {
        self.terminology_provider = Some(provider);
        self
    }

    /// Attach a library manager.
    pub fn library_manager(mut self, manager: Arc<dyn LibraryManager>) -> Self {
        self.library_manager = Some(manager);
        self
    }

    /// Finalize the context.
    pub fn build(self) -> EvaluationContext {
        let mut ctx = EvaluationContext::new();
        if let (Some(ty), Some(val)) = (self.context_type, self.context_value) {
            ctx = ctx.with_context(ty, val);
        }
        if let Some(lib) = self.main_library {
            ctx = ctx.with_library(lib);
        }
        if let Some(p) = self.data_provider {
            ctx = ctx.with_data_provider(p);
        }
        if let Some(p) = self.terminology_provider {
            ctx = ctx.with_terminology_provider(p);
        }
        if let Some(m) = self.library_manager {
            ctx = ctx.with_library_manager(m);
        }
        ctx.parameters = self.parameters;
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_lookup_sees_enclosing_scopes() {
        let mut ctx = EvaluationContext::new();
        ctx.set_alias("Outer", CqlValue::Integer(1));
        ctx.push_scope();
        ctx.set_alias("Inner", CqlValue::Integer(2));
        assert_eq!(ctx.get_alias("Outer"), Some(&CqlValue::Integer(1)));
        assert_eq!(ctx.get_alias("Inner"), Some(&CqlValue::Integer(2)));
        ctx.pop_scope();
        assert_eq!(ctx.get_alias("Inner"), None);
    }

    #[test]
    fn recursion_limit_is_enforced() {
        let mut ctx = EvaluationContext::new();
        for _ in 0..MAX_RECURSION_DEPTH {
            assert!(ctx.enter_recursion());
        }
        assert!(!ctx.enter_recursion());
    }

    #[test]
    fn definition_recursion_is_detected() {
        let mut ctx = EvaluationContext::new();
        assert!(ctx.enter_definition("Lib:Foo"));
        assert!(!ctx.enter_definition("Lib:Foo"));
        ctx.exit_definition("Lib:Foo");
        assert!(ctx.enter_definition("Lib:Foo"));
    }
}
