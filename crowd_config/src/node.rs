//! Section tree built from the author's description.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::distribution::DistributionNode;
use crate::error::{field_path, CompileError};
use crate::reference::Resolver;
use crate::schema::{DefaultValue, FieldDescriptor, FieldKind, SchemaRegistry, SectionSchema};
use crate::value::{Raw, Value};

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Resolving,
    Ready(Value),
}

/// Nested block owned by the field that declared it.
#[derive(Debug)]
pub enum Child<'a> {
    Section(SectionNode<'a>),
    Distribution(DistributionNode<'a>),
}

/// One section of the description with its lazily resolved fields.
///
/// Every declared field is resolved at most once; the cached value is
/// returned on later reads without re-running defaults, references or custom
/// parsers.
#[derive(Debug)]
pub struct SectionNode<'a> {
    schema: &'a SectionSchema,
    path: String,
    input: Cow<'a, JsonMap<String, JsonValue>>,
    fallbacks: &'a [(&'static str, DefaultValue)],
    slots: Vec<RefCell<Slot>>,
    stash: RefCell<BTreeMap<&'static str, Value>>,
    children: Vec<Option<Child<'a>>>,
}

impl<'a> SectionNode<'a> {
    /// Build the node and, recursively, every nested block the author supplied.
    pub(crate) fn build(
        registry: &'a SchemaRegistry,
        schema: &'a SectionSchema,
        path: String,
        input: Cow<'a, JsonMap<String, JsonValue>>,
        fallbacks: &'a [(&'static str, DefaultValue)],
    ) -> Result<Self, CompileError> {
        if let Some(unknown) = input.keys().find(|key| schema.field(key).is_none()) {
            return Err(CompileError::UnknownField {
                field: unknown.clone(),
                section: display_path(&path, schema),
            });
        }

        // Synthesised blocks are never nested, so only borrowed input can own children.
        let borrowed: Option<&'a JsonMap<String, JsonValue>> = match &input {
            Cow::Borrowed(map) => Some(*map),
            Cow::Owned(_) => None,
        };

        let mut children = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let supplied = borrowed
                .and_then(|map| map.get(field.name))
                .filter(|value| !value.is_null());
            let child = match (&field.kind, supplied) {
                (FieldKind::Descendant(type_name), Some(block)) => {
                    let child_path = field_path(&path, field.name);
                    let nested = registry.schema(type_name).ok_or_else(|| {
                        CompileError::UnknownSectionType {
                            name: type_name.to_string(),
                            path: child_path.clone(),
                        }
                    })?;
                    let block = block.as_object().ok_or_else(|| CompileError::InvalidValue {
                        path: child_path.clone(),
                        expected: "section block",
                        found: block.to_string(),
                    })?;
                    Some(Child::Section(SectionNode::build(
                        registry,
                        nested,
                        child_path,
                        Cow::Borrowed(block),
                        &[],
                    )?))
                }
                (FieldKind::Distribution(slot), Some(raw)) => Some(Child::Distribution(
                    DistributionNode::build(registry, slot, field_path(&path, field.name), raw)?,
                )),
                _ => None,
            };
            children.push(child);
        }

        Ok(Self {
            schema,
            path,
            input,
            fallbacks,
            slots: schema
                .fields()
                .iter()
                .map(|_| RefCell::new(Slot::Pending))
                .collect(),
            stash: RefCell::new(BTreeMap::new()),
            children,
        })
    }

    pub fn schema(&self) -> &'a SectionSchema {
        self.schema
    }

    /// Dotted path from the root; empty for the root itself.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn field_path(&self, name: &str) -> String {
        field_path(&self.path, name)
    }

    /// Nested section (or the node behind a distribution) supplied for `name`.
    pub fn child(&self, name: &str) -> Option<&SectionNode<'a>> {
        let (index, _) = self.schema.field(name)?;
        match self.children[index].as_ref()? {
            Child::Section(node) => Some(node),
            Child::Distribution(distribution) => Some(distribution.node()),
        }
    }

    /// Supplied children in declaration order.
    pub fn children(&self) -> impl Iterator<Item = &Child<'a>> {
        self.children.iter().flatten()
    }

    /// Resolve a declared scalar field.
    pub fn resolve(&self, name: &str, resolver: &Resolver<'_>) -> Result<Value, CompileError> {
        let (index, _) = self
            .schema
            .field(name)
            .ok_or_else(|| CompileError::UnknownField {
                field: name.to_string(),
                section: display_path(&self.path, self.schema),
            })?;
        self.resolve_index(index, resolver)
    }

    /// Resolve a scalar field or answer a stashed side value; `None` when the
    /// name is neither.
    pub fn lookup(&self, name: &str, resolver: &Resolver<'_>) -> Result<Option<Value>, CompileError> {
        if let Some((index, field)) = self.schema.field(name) {
            if field.kind.is_nested() {
                return Ok(None);
            }
            return self.resolve_index(index, resolver).map(Some);
        }
        if let Some(owner) = self.schema.stash_owner(name) {
            self.resolve_index(owner, resolver)?;
            return Ok(self.stashed(name));
        }
        Ok(None)
    }

    pub fn stashed(&self, name: &str) -> Option<Value> {
        self.stash.borrow().get(name).cloned()
    }

    pub(crate) fn resolve_index(
        &self,
        index: usize,
        resolver: &Resolver<'_>,
    ) -> Result<Value, CompileError> {
        let field = &self.schema.fields()[index];
        let path = self.field_path(field.name);
        if field.kind.is_nested() {
            return Err(CompileError::InvalidValue {
                path,
                expected: "scalar field",
                found: "nested section".to_string(),
            });
        }

        let slot = &self.slots[index];
        match &*slot.borrow() {
            Slot::Ready(value) => return Ok(value.clone()),
            Slot::Resolving => return Err(CompileError::CyclicReference { path }),
            Slot::Pending => {}
        }

        slot.replace(Slot::Resolving);
        let outcome = self
            .raw_input(field, &path, resolver)
            .and_then(|raw| self.coerce(field, &path, raw, resolver));
        match &outcome {
            Ok(value) => {
                tracing::trace!(
                    target: "crowd_sim::compiler",
                    field = %path,
                    value = %value,
                    "field.resolved"
                );
                slot.replace(Slot::Ready(value.clone()));
            }
            Err(_) => {
                slot.replace(Slot::Pending);
            }
        }
        outcome
    }

    /// Author input, then the slot fallback, then the declared default.
    fn raw_input(
        &self,
        field: &FieldDescriptor,
        path: &str,
        resolver: &Resolver<'_>,
    ) -> Result<Option<Raw<'_>>, CompileError> {
        // `null` counts as absent.
        if let Some(json) = self.input.get(field.name).filter(|json| !json.is_null()) {
            let raw = Raw::Json(json);
            let Some(expr) = raw.reference_expr() else {
                return Ok(Some(raw));
            };
            if resolver.env().settings.references.strict {
                return resolver.must_resolve_from(expr, path).map(|value| Some(Raw::Value(value)));
            }
            match resolver.try_resolve_from(expr, path)? {
                Some(value) => return Ok(Some(Raw::Value(value))),
                None => tracing::warn!(
                    target: "crowd_sim::compiler",
                    field = %path,
                    reference = expr,
                    "reference.unresolved"
                ),
            }
        }

        let fallback = self
            .fallbacks
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, default)| default);
        for default in fallback.into_iter().chain(field.default.as_ref()) {
            if let Some(literal) = default.literal() {
                return Ok(Some(Raw::Value(literal)));
            }
            if let DefaultValue::Reference(expr) = default {
                if let Some(value) = resolver.try_resolve_from(expr, path)? {
                    return Ok(Some(Raw::Value(value)));
                }
            }
        }
        Ok(None)
    }

    fn coerce(
        &self,
        field: &FieldDescriptor,
        path: &str,
        raw: Option<Raw<'_>>,
        resolver: &Resolver<'_>,
    ) -> Result<Value, CompileError> {
        let invalid = |expected: &'static str, raw: &Raw<'_>| CompileError::InvalidValue {
            path: path.to_string(),
            expected,
            found: raw.describe(),
        };

        match &field.kind {
            FieldKind::Int => match raw {
                None => Ok(Value::Int(0)),
                Some(raw) => raw.to_int().map(Value::Int).ok_or_else(|| invalid("integer", &raw)),
            },
            FieldKind::Float => match raw {
                None => Ok(Value::Float(0.0)),
                Some(raw) => raw
                    .to_float()
                    .map(Value::Float)
                    .ok_or_else(|| invalid("number", &raw)),
            },
            FieldKind::String => match raw {
                None => Ok(Value::Str(String::new())),
                Some(raw) => raw.to_text().map(Value::Str).ok_or_else(|| invalid("string", &raw)),
            },
            FieldKind::Bool => match raw {
                None => Ok(Value::Bool(false)),
                Some(raw) => raw.to_bool().map(Value::Bool).ok_or_else(|| invalid("boolean", &raw)),
            },
            FieldKind::Enum(table) => {
                let raw = raw.ok_or_else(|| CompileError::MissingField {
                    path: path.to_string(),
                })?;
                let name = raw.enum_name().ok_or_else(|| invalid("enum name", &raw))?;
                table
                    .iter()
                    .find(|variant| variant.name == name)
                    .map(|variant| Value::Enum {
                        name: variant.name.to_string(),
                        code: variant.code,
                    })
                    .ok_or(CompileError::UnknownEnumValue {
                        value: name,
                        path: path.to_string(),
                    })
            }
            FieldKind::Custom(parser) => {
                let raw = raw.ok_or_else(|| CompileError::MissingField {
                    path: path.to_string(),
                })?;
                let output = parser.invoke(path, &raw, resolver.env())?;
                let mut stash = self.stash.borrow_mut();
                for (name, value) in output.stash {
                    stash.insert(name, value);
                }
                Ok(output.value)
            }
            FieldKind::Descendant(_) | FieldKind::Distribution(_) => Err(CompileError::InvalidValue {
                path: path.to_string(),
                expected: "scalar field",
                found: "nested section".to_string(),
            }),
        }
    }
}

fn display_path(path: &str, schema: &SectionSchema) -> String {
    if path.is_empty() {
        format!("<{}>", schema.name())
    } else {
        path.to_string()
    }
}
