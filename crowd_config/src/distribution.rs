use std::borrow::Cow;

use crowd_schema::{DistributionKind, DistributionValue, RecordWriter};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::CompileError;
use crate::node::SectionNode;
use crate::reference::Resolver;
use crate::schema::{DistributionSlot, SchemaRegistry};
use crate::sections::DISTRIBUTION;

/// A `distribution` section bound to its binary slot.
#[derive(Debug)]
pub struct DistributionNode<'a> {
    node: SectionNode<'a>,
    slot: &'a DistributionSlot,
}

impl<'a> DistributionNode<'a> {
    /// A bare number, numeric string or reference is a fixed value: a normal
    /// distribution with no deviation whose `mean` resolves like any float.
    pub(crate) fn build(
        registry: &'a SchemaRegistry,
        slot: &'a DistributionSlot,
        path: String,
        raw: &'a JsonValue,
    ) -> Result<Self, CompileError> {
        let schema = registry
            .schema(DISTRIBUTION)
            .ok_or_else(|| CompileError::UnknownSectionType {
                name: DISTRIBUTION.to_string(),
                path: path.clone(),
            })?;
        let input = match raw {
            JsonValue::Object(block) => Cow::Borrowed(block),
            JsonValue::Number(_) | JsonValue::String(_) => Cow::Owned(fixed_block(raw.clone())),
            other => {
                return Err(CompileError::InvalidValue {
                    path,
                    expected: "distribution block, number or reference",
                    found: other.to_string(),
                })
            }
        };
        let node = SectionNode::build(registry, schema, path, input, &slot.fallbacks)?;
        Ok(Self { node, slot })
    }

    pub fn node(&self) -> &SectionNode<'a> {
        &self.node
    }

    pub fn kind(&self, resolver: &Resolver<'_>) -> Result<DistributionKind, CompileError> {
        let value = self.node.resolve(DISTRIBUTION, resolver)?;
        let name = value.as_str().unwrap_or_default();
        DistributionKind::from_name(name).ok_or_else(|| CompileError::UnknownDistribution {
            kind: name.to_string(),
            path: self.node.path().to_string(),
        })
    }

    pub fn value(&self, resolver: &Resolver<'_>) -> Result<DistributionValue, CompileError> {
        let kind = self.kind(resolver)?;
        let [first, second] = kind.parameters();
        Ok(DistributionValue::new(
            kind,
            self.parameter(first, resolver)?,
            self.parameter(second, resolver)?,
        ))
    }

    pub fn encode(
        &self,
        resolver: &Resolver<'_>,
        writer: &mut RecordWriter,
    ) -> Result<(), CompileError> {
        let value = self.value(resolver)?;
        writer.distribution(self.slot.section, self.slot.element, &value);
        Ok(())
    }

    fn parameter(&self, name: &str, resolver: &Resolver<'_>) -> Result<f64, CompileError> {
        let value = self.node.resolve(name, resolver)?;
        value.as_float().ok_or_else(|| CompileError::InvalidValue {
            path: self.node.field_path(name),
            expected: "number",
            found: value.to_string(),
        })
    }
}

fn fixed_block(mean: JsonValue) -> JsonMap<String, JsonValue> {
    let mut block = JsonMap::new();
    block.insert(
        DISTRIBUTION.to_string(),
        JsonValue::from(DistributionKind::Normal.name()),
    );
    block.insert("mean".to_string(), mean);
    block.insert("std_deviation".to_string(), JsonValue::from(0.0));
    block
}
