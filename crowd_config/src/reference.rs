//! `ref:` path expressions and their resolution against the root node.

use crate::compiler::CompileEnv;
use crate::error::CompileError;
use crate::node::SectionNode;
use crate::value::Value;

pub const REFERENCE_PREFIX: &str = "ref:";

pub fn is_reference(text: &str) -> bool {
    text.starts_with(REFERENCE_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Child section, field or stashed value.
    Field(String),
    /// `[tag]`: first tuple carrying `tag` in a tagged sequence.
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    segments: Vec<Segment>,
}

impl Reference {
    /// Returns `None` for anything that is not a well formed `ref:` path.
    pub fn parse(expr: &str) -> Option<Self> {
        let body = expr.strip_prefix(REFERENCE_PREFIX)?;
        let segments = body
            .split('.')
            .map(|segment| {
                if let Some(rest) = segment.strip_prefix('[') {
                    let tag = rest.strip_suffix(']')?;
                    (!tag.is_empty()).then(|| Segment::Tag(tag.to_string()))
                } else if segment.is_empty() || segment.contains(']') {
                    None
                } else {
                    Some(Segment::Field(segment.to_string()))
                }
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// Resolves references from the root of one compilation tree.
pub struct Resolver<'a> {
    root: &'a SectionNode<'a>,
    env: CompileEnv<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a SectionNode<'a>, env: CompileEnv<'a>) -> Self {
        Self { root, env }
    }

    pub fn env(&self) -> &CompileEnv<'a> {
        &self.env
    }

    pub fn try_resolve(&self, expr: &str) -> Result<Option<Value>, CompileError> {
        self.try_resolve_from(expr, "<document>")
    }

    pub fn must_resolve(&self, expr: &str) -> Result<Value, CompileError> {
        self.must_resolve_from(expr, "<document>")
    }

    pub(crate) fn must_resolve_from(&self, expr: &str, origin: &str) -> Result<Value, CompileError> {
        self.try_resolve_from(expr, origin)?
            .ok_or_else(|| CompileError::UnresolvedReference {
                expr: expr.to_string(),
                path: origin.to_string(),
            })
    }

    /// `origin` is the path of the field holding the expression, for errors.
    pub(crate) fn try_resolve_from(
        &self,
        expr: &str,
        origin: &str,
    ) -> Result<Option<Value>, CompileError> {
        let reference = Reference::parse(expr).ok_or_else(|| CompileError::MalformedReference {
            expr: expr.to_string(),
            path: origin.to_string(),
        })?;
        self.walk(&reference)
    }

    fn walk(&self, reference: &Reference) -> Result<Option<Value>, CompileError> {
        enum Cursor<'n> {
            Node(&'n SectionNode<'n>),
            Value(Value),
        }

        let mut cursor = Cursor::Node(self.root);
        for segment in reference.segments() {
            cursor = match (cursor, segment) {
                (Cursor::Node(node), Segment::Field(name)) => match node.child(name) {
                    Some(child) => Cursor::Node(child),
                    None => match node.lookup(name, self)? {
                        Some(value) => Cursor::Value(value),
                        None => return Ok(None),
                    },
                },
                (Cursor::Value(value), Segment::Tag(tag)) => match value.select_tag(tag) {
                    Some(selected) => Cursor::Value(selected),
                    None => return Ok(None),
                },
                _ => return Ok(None),
            };
        }

        match cursor {
            Cursor::Value(value) => Ok(Some(value)),
            Cursor::Node(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fields_and_tags() {
        let reference = Reference::parse("ref:scene.geometry.[wall]").expect("well formed");
        assert_eq!(
            reference.segments(),
            &[
                Segment::Field("scene".to_string()),
                Segment::Field("geometry".to_string()),
                Segment::Tag("wall".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        for expr in [
            "ref:",
            "ref:time..end_time",
            "ref:scene.[]",
            "ref:scene.[wall",
            "ref:scene.wall]",
            "time.end_time",
        ] {
            assert_eq!(Reference::parse(expr), None, "{expr}");
        }
    }

    #[test]
    fn detects_prefix() {
        assert!(is_reference("ref:time.end_time"));
        assert!(!is_reference("reference"));
    }
}
