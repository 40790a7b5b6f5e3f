//! Reference classification.
//!
//! A name occurrence is a value reference unless its syntactic parent puts it
//! in a key position: the property side of `obj.require`, the key of
//! `{ require: 1 }`, a class member name, or the alias of `export { a as b }`.

use oxc_ast::AstKind;
use oxc_span::{GetSpan, Span};

/// The syntactic parent of a name, reduced to what matters for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Member { computed: bool, object: Span },
    Property {
        computed: bool,
        shorthand: bool,
        value: Span,
    },
    ClassMember { computed: bool, value: Option<Span> },
    ExportSpecifier { local: Span },
    ExpressionStatement(Span),
    /// A node whose body is a statement list.
    StatementList,
    ExportDeclaration,
    Other,
}

impl Parent {
    pub fn from_kind(kind: AstKind<'_>) -> Parent {
        match kind {
            AstKind::StaticMemberExpression(member) => Parent::Member {
                computed: false,
                object: member.object.span(),
            },
            AstKind::ComputedMemberExpression(member) => Parent::Member {
                computed: true,
                object: member.object.span(),
            },
            AstKind::ObjectProperty(prop) => Parent::Property {
                computed: prop.computed,
                shorthand: prop.shorthand,
                value: prop.value.span(),
            },
            // `({ global } = o)` and `({ global = 1 } = o)`
            AstKind::AssignmentTargetPropertyIdentifier(prop) => Parent::Property {
                computed: false,
                shorthand: true,
                value: prop.binding.span,
            },
            AstKind::MethodDefinition(method) => Parent::ClassMember {
                computed: method.computed,
                value: None,
            },
            AstKind::PropertyDefinition(prop) => Parent::ClassMember {
                computed: prop.computed,
                value: prop.value.as_ref().map(|v| v.span()),
            },
            AstKind::ExportSpecifier(spec) => Parent::ExportSpecifier {
                local: spec.local.span(),
            },
            AstKind::ExpressionStatement(stmt) => Parent::ExpressionStatement(stmt.span),
            AstKind::Program(_)
            | AstKind::BlockStatement(_)
            | AstKind::FunctionBody(_)
            | AstKind::StaticBlock(_)
            | AstKind::SwitchCase(_) => Parent::StatementList,
            AstKind::ExportNamedDeclaration(_) | AstKind::ExportDefaultDeclaration(_) => {
                Parent::ExportDeclaration
            }
            _ => Parent::Other,
        }
    }
}

/// Whether the name spanning `node` is a value reference inside `parent`.
pub fn is_reference(node: Span, parent: Parent) -> bool {
    match parent {
        Parent::Member { computed, object } => computed || node == object,
        Parent::Property {
            computed, value, ..
        } => computed || node == value,
        Parent::ClassMember { computed, value } => computed || value == Some(node),
        Parent::ExportSpecifier { local } => node == local,
        _ => true,
    }
}

/// Ancestor chain maintained from `enter_node` / `leave_node`.
///
/// Wrapper nodes that share their child's span carry no information and are
/// looked through when asking for a node's parent.
#[derive(Debug, Default)]
pub struct ParentStack {
    frames: Vec<(Span, Parent)>,
}

impl ParentStack {
    pub fn push(&mut self, kind: AstKind<'_>) {
        self.frames.push((kind.span(), Parent::from_kind(kind)));
    }

    /// Records a frame for a node whose children are walked by hand.
    pub fn push_frame(&mut self, span: Span, parent: Parent) {
        self.frames.push((span, parent));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Parent of the node spanning `span`, with its index in the stack.
    ///
    /// Must be called before the node's own frame is pushed.
    pub fn enclosing(&self, span: Span) -> (usize, Parent) {
        self.enclosing_below(self.frames.len(), span)
    }

    /// Like [`enclosing`](Self::enclosing), considering only frames below `depth`.
    pub fn enclosing_below(&self, depth: usize, span: Span) -> (usize, Parent) {
        let depth = depth.min(self.frames.len());
        self.frames[..depth]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (frame_span, parent))| !(*parent == Parent::Other && *frame_span == span))
            .map(|(index, (_, parent))| (index, *parent))
            .unwrap_or((0, Parent::Other))
    }

    pub fn parent_of(&self, span: Span) -> Parent {
        self.enclosing(span).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::{IdentifierName, IdentifierReference};
    use oxc_ast_visit::Visit;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    #[derive(Default)]
    struct Collector {
        parents: ParentStack,
        seen: Vec<(String, bool)>,
    }

    impl<'a> Visit<'a> for Collector {
        fn enter_node(&mut self, kind: AstKind<'a>) {
            self.parents.push(kind);
        }

        fn leave_node(&mut self, _kind: AstKind<'a>) {
            self.parents.pop();
        }

        fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
            let parent = self.parents.parent_of(it.span);
            self.seen.push((it.name.to_string(), is_reference(it.span, parent)));
        }

        fn visit_identifier_name(&mut self, it: &IdentifierName<'a>) {
            let parent = self.parents.parent_of(it.span);
            self.seen.push((it.name.to_string(), is_reference(it.span, parent)));
        }
    }

    fn classify(src: &str, name: &str) -> Vec<bool> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, src, SourceType::mjs()).parse();
        assert!(ret.errors.is_empty(), "parse errors in {}", src);
        let mut collector = Collector::default();
        collector.visit_program(&ret.program);
        collector
            .seen
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, is_ref)| is_ref)
            .collect()
    }

    #[test]
    fn test_member_property_is_not_reference() {
        assert_eq!(classify("obj.require;", "require"), vec![false]);
        assert_eq!(classify("require.cache;", "require"), vec![true]);
        assert_eq!(classify("obj[require];", "require"), vec![true]);
    }

    #[test]
    fn test_object_key_is_not_reference() {
        assert_eq!(classify("x = { require: 1 };", "require"), vec![false]);
        assert_eq!(classify("x = { a: require };", "require"), vec![true]);
        assert_eq!(classify("x = { [require]: 1 };", "require"), vec![true]);
    }

    #[test]
    fn test_shorthand_assignment_target_is_reference() {
        assert_eq!(classify("({ global } = o);", "global"), vec![true]);
        assert_eq!(classify("({ global = 1 } = o);", "global"), vec![true]);
    }

    #[test]
    fn test_class_member_name_is_not_reference() {
        assert_eq!(classify("class A { require() {} }", "require"), vec![false]);
        assert_eq!(classify("class A { field = module; }", "module"), vec![true]);
    }

    #[test]
    fn test_export_alias_is_not_reference() {
        let seen = classify("const a = 1; export { a as exports };", "exports");
        assert_eq!(seen, vec![false]);
    }

    #[test]
    fn test_is_reference_direct() {
        let object = Span::new(0, 3);
        let property = Span::new(4, 11);
        let member = Parent::Member {
            computed: false,
            object,
        };
        assert!(is_reference(object, member));
        assert!(!is_reference(property, member));
        assert!(is_reference(Span::new(0, 1), Parent::Other));
    }
}
