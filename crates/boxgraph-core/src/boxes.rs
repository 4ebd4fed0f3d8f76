//! Boxes: the persisted entities of the graph
//!
//! A [`GraphBox`] owns a fixed field tree, an address and the rules for
//! pointers targeting it. Box kinds are supplied by the domain through a
//! [`BoxFactory`]; the engine has no built-in knowledge of them.

use crate::address::{Address, FieldKey};
use crate::codec::{ByteReader, ByteWriter};
use crate::error::DecodeError;
use crate::field::{
    field_map_to_json, read_field_map, read_field_map_json, write_field_map, Field, FieldSpec,
    PointerField, PointerRules, PrimitiveValue, Remap,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// How a box's UUID is treated when a sub-graph is copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Content-addressable: the UUID is kept so copies share the resource
    Preserved,
    /// Regular owned resource: fresh UUID on copy
    Internal,
    /// Fresh UUID on copy; structural edges into its ownership fields are not followed
    Shared,
}

/// Persisted entity
#[derive(Debug, Clone, PartialEq)]
pub struct GraphBox {
    address: Address,
    name: &'static str,
    rules: PointerRules,
    resource: Option<ResourceKind>,
    ephemeral: bool,
    creation_index: u32,
    fields: BTreeMap<FieldKey, Field>,
}

impl GraphBox {
    /// Start declaring a box of kind `name`
    #[inline]
    #[must_use]
    pub fn builder(name: &'static str, uuid: Uuid) -> BoxBuilder {
        BoxBuilder {
            name,
            uuid,
            rules: PointerRules::none(),
            resource: None,
            ephemeral: false,
            fields: Vec::new(),
        }
    }

    /// Box address (empty path)
    #[inline]
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Box UUID
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.address.uuid()
    }

    /// Kind name used for factory dispatch
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rules for pointers targeting the box itself
    #[inline]
    #[must_use]
    pub fn pointer_rules(&self) -> &PointerRules {
        &self.rules
    }

    /// Resource classification
    #[inline]
    #[must_use]
    pub fn resource(&self) -> Option<ResourceKind> {
        self.resource
    }

    /// Whether the box is classified as any kind of resource
    #[inline]
    #[must_use]
    pub fn is_resource(&self) -> bool {
        self.resource.is_some()
    }

    /// Transient box (e.g. UI-only)
    #[inline]
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Position in the graph's staging order
    #[inline]
    #[must_use]
    pub fn creation_index(&self) -> u32 {
        self.creation_index
    }

    pub(crate) fn set_creation_index(&mut self, index: u32) {
        self.creation_index = index;
    }

    /// Top-level fields in key order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<FieldKey, Field> {
        &self.fields
    }

    /// Top-level field by key
    #[inline]
    #[must_use]
    pub fn field(&self, key: FieldKey) -> Option<&Field> {
        self.fields.get(&key)
    }

    /// Nested field by path
    #[must_use]
    pub fn find_field(&self, keys: &[FieldKey]) -> Option<&Field> {
        let (first, rest) = keys.split_first()?;
        self.fields.get(first)?.descend(rest)
    }

    pub(crate) fn find_field_mut(&mut self, keys: &[FieldKey]) -> Option<&mut Field> {
        let (first, rest) = keys.split_first()?;
        self.fields.get_mut(first)?.descend_mut(rest)
    }

    /// The box itself or one of its fields
    #[must_use]
    pub fn vertex(&self, keys: &[FieldKey]) -> Option<Vertex<'_>> {
        if keys.is_empty() {
            return Some(Vertex {
                owner: self,
                field: None,
            });
        }
        self.find_field(keys).map(|field| Vertex {
            owner: self,
            field: Some(field),
        })
    }

    /// The box and every nested field, box first
    #[must_use]
    pub fn vertices(&self) -> Vec<Vertex<'_>> {
        let mut vertices = vec![Vertex {
            owner: self,
            field: None,
        }];
        for field in self.fields.values() {
            field.walk(&mut |field| {
                vertices.push(Vertex {
                    owner: self,
                    field: Some(field),
                });
            });
        }
        vertices
    }

    /// All pointer fields, recursively
    #[must_use]
    pub fn pointer_fields(&self) -> Vec<&PointerField> {
        let mut pointers = Vec::new();
        for field in self.fields.values() {
            field.walk(&mut |field| {
                if let Field::Pointer(pointer) = field {
                    pointers.push(pointer);
                }
            });
        }
        pointers
    }

    /// Primitive value by path
    #[must_use]
    pub fn primitive(&self, keys: &[FieldKey]) -> Option<&PrimitiveValue> {
        self.find_field(keys)
            .and_then(Field::as_primitive)
            .map(|field| field.value())
    }

    /// Pointer target by path
    #[must_use]
    pub fn pointer_target(&self, keys: &[FieldKey]) -> Option<&Address> {
        self.find_field(keys)
            .and_then(Field::as_pointer)
            .and_then(PointerField::target)
    }

    /// Set a primitive while the box is being constructed
    ///
    /// Staged boxes are only reachable through shared references; their
    /// fields change through [`crate::BoxGraph::set_primitive`].
    ///
    /// # Panics
    /// Panics if no primitive field exists at `keys` or the variant differs.
    pub fn set_primitive(&mut self, keys: &[FieldKey], value: impl Into<PrimitiveValue>) {
        match self.find_field_mut(keys) {
            Some(Field::Primitive(field)) => {
                let _ = field.replace(value.into());
            }
            _ => panic!("{} has no primitive field at {keys:?}", self.name),
        }
    }

    /// Set a pointer while the box is being constructed
    ///
    /// # Panics
    /// Panics if no pointer field exists at `keys`.
    pub fn set_pointer(&mut self, keys: &[FieldKey], target: Option<Address>) {
        match self.find_field_mut(keys) {
            Some(Field::Pointer(field)) => {
                let _ = field.replace(target);
            }
            _ => panic!("{} has no pointer field at {keys:?}", self.name),
        }
    }

    /// Check the box's own mandatory pointers (recursively)
    #[must_use]
    pub fn has_empty_mandatory_pointer(&self) -> bool {
        self.pointer_fields()
            .iter()
            .any(|pointer| pointer.is_mandatory() && pointer.is_empty())
    }

    /// Binary field payload
    #[must_use]
    pub fn field_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        self.write_fields(&mut writer);
        writer.into_bytes()
    }

    /// Write the field payload
    pub fn write_fields(&self, writer: &mut ByteWriter) {
        write_field_map(&self.fields, writer);
    }

    /// Read a field payload, rewriting pointer targets through `remap`
    ///
    /// # Errors
    /// Returns error on malformed input or schema mismatch
    pub fn read_fields(&mut self, reader: &mut ByteReader<'_>, remap: Remap<'_>) -> Result<(), DecodeError> {
        read_field_map(&mut self.fields, &self.address, reader, remap)
    }

    /// JSON field payload
    #[must_use]
    pub fn fields_to_json(&self) -> Value {
        field_map_to_json(&self.fields)
    }

    /// Read a JSON field payload, rewriting pointer targets through `remap`
    ///
    /// # Errors
    /// Returns error on malformed input or schema mismatch
    pub fn read_fields_json(&mut self, value: &Value, remap: Remap<'_>) -> Result<(), DecodeError> {
        read_field_map_json(&mut self.fields, &self.address, value, remap)
    }
}

/// Builder for [`GraphBox`] declarations
#[derive(Debug)]
pub struct BoxBuilder {
    name: &'static str,
    uuid: Uuid,
    rules: PointerRules,
    resource: Option<ResourceKind>,
    ephemeral: bool,
    fields: Vec<(FieldKey, FieldSpec)>,
}

impl BoxBuilder {
    /// Rules for pointers targeting the box
    #[inline]
    #[must_use]
    pub fn rules(mut self, rules: PointerRules) -> Self {
        self.rules = rules;
        self
    }

    /// Resource classification
    #[inline]
    #[must_use]
    pub fn resource(mut self, resource: ResourceKind) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Mark as ephemeral
    #[inline]
    #[must_use]
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Declare a top-level field
    #[inline]
    #[must_use]
    pub fn field(mut self, key: FieldKey, spec: FieldSpec) -> Self {
        self.fields.push((key, spec));
        self
    }

    /// Materialize the box
    #[must_use]
    pub fn build(self) -> GraphBox {
        let address = Address::of_box(self.uuid);
        let fields = self
            .fields
            .into_iter()
            .map(|(key, spec)| (key, spec.materialize(address.append(key))))
            .collect();
        GraphBox {
            address,
            name: self.name,
            rules: self.rules,
            resource: self.resource,
            ephemeral: self.ephemeral,
            creation_index: 0,
            fields,
        }
    }
}

/// A box or one of its fields, seen as a pointer target
#[derive(Debug, Clone, Copy)]
pub struct Vertex<'a> {
    owner: &'a GraphBox,
    field: Option<&'a Field>,
}

impl<'a> Vertex<'a> {
    /// Vertex address
    #[must_use]
    pub fn address(&self) -> &'a Address {
        match self.field {
            Some(field) => field.address(),
            None => self.owner.address(),
        }
    }

    /// Rules for pointers targeting this vertex
    #[must_use]
    pub fn rules(&self) -> &'a PointerRules {
        match self.field {
            Some(field) => field.rules(),
            None => self.owner.pointer_rules(),
        }
    }

    /// Box owning the vertex
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &'a GraphBox {
        self.owner
    }

    /// The field, unless the vertex is the box itself
    #[inline]
    #[must_use]
    pub fn field(&self) -> Option<&'a Field> {
        self.field
    }

    /// Whether the vertex is a box
    #[inline]
    #[must_use]
    pub fn is_box(&self) -> bool {
        self.field.is_none()
    }
}

/// Maps kind names to box constructors
///
/// Supplied by the domain layer when a graph is created.
pub trait BoxFactory {
    /// Create an unstaged box of kind `name`, or `None` if the kind is unknown
    fn create(&self, name: &str, uuid: Uuid) -> Option<GraphBox>;
}

impl<F> BoxFactory for F
where
    F: Fn(&str, Uuid) -> Option<GraphBox>,
{
    fn create(&self, name: &str, uuid: Uuid) -> Option<GraphBox> {
        self(name, uuid)
    }
}
