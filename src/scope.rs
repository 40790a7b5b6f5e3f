use oxc_semantic::Scoping;
use oxc_syntax::scope::ScopeId;
use std::collections::{HashMap, HashSet};

lazy_static::lazy_static! {
    /// Names a generated binding may never take.
    pub static ref BLACKLIST: HashSet<&'static str> = {
        let reserved = "process location abstract arguments await boolean break byte case catch char \
            class const continue debugger default delete do double else enum eval export \
            extends false final finally float for from function goto if implements import in \
            instanceof int interface let long native new null package private protected public \
            return short static super switch synchronized this throw throws transient true try \
            typeof var void volatile while with yield";
        let mut s: HashSet<&'static str> = reserved.split_whitespace().collect();
        s.insert("__esModule");
        s
    };
}

/// Lexical scopes of one module with the names generated into them so far.
///
/// Declarations come from the semantic analysis; names handed out by
/// [`deconflict`] are layered on top so later calls see them.
pub struct ScopeTree<'s> {
    scoping: &'s Scoping,
    generated: HashMap<ScopeId, HashSet<String>>,
}

impl<'s> ScopeTree<'s> {
    pub fn new(scoping: &'s Scoping) -> Self {
        Self {
            scoping,
            generated: HashMap::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        self.scoping.root_scope_id()
    }

    pub fn scoping(&self) -> &'s Scoping {
        self.scoping
    }

    /// Whether `name` is visible from `scope`, walking up to the root.
    pub fn contains(&self, scope: ScopeId, name: &str) -> bool {
        if self.scoping.find_binding(scope, name).is_some() {
            return true;
        }
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.generated.get(&id).is_some_and(|names| names.contains(name)) {
                return true;
            }
            current = self.scoping.scope_parent_id(id);
        }
        false
    }

    pub fn declare(&mut self, scope: ScopeId, name: &str) {
        self.generated
            .entry(scope)
            .or_default()
            .insert(name.to_string());
    }
}

fn is_taken(scopes: &ScopeTree, scope: ScopeId, globals: &HashSet<String>, name: &str) -> bool {
    scopes.contains(scope, name) || globals.contains(name) || BLACKLIST.contains(name)
}

/// First of `candidate`, `candidate_1`, `candidate_2`, … that is free in `scope`.
pub fn find_free_name(
    scopes: &ScopeTree,
    scope: ScopeId,
    globals: &HashSet<String>,
    candidate: &str,
) -> String {
    let mut name = candidate.to_string();
    let mut suffix = 1;
    while is_taken(scopes, scope, globals, &name) {
        name = format!("{}_{}", candidate, suffix);
        suffix += 1;
    }
    name
}

/// Picks a collision-free name for `candidate` and registers it in `scope`.
pub fn deconflict(
    scopes: &mut ScopeTree,
    scope: ScopeId,
    globals: &HashSet<String>,
    candidate: &str,
) -> String {
    let name = find_free_name(scopes, scope, globals, candidate);
    scopes.declare(scope, &name);
    name
}
