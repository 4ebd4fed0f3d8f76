//! Field hierarchy
//!
//! A box owns a fixed tree of [`Field`]s. Leaves are primitive values or
//! typed pointers; [`ArrayField`] and [`ObjectField`] compose nested fields.
//! Every field is itself a vertex: it has an address and [`PointerRules`]
//! describing which pointers may target it.

use crate::address::{Address, FieldKey};
use crate::codec::{ByteReader, ByteWriter};
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Rewrites pointer targets while decoding
///
/// Transfers pass a UUID map through this; plain loads pass [`keep_address`].
pub type Remap<'a> = &'a dyn Fn(&Address) -> Address;

/// Identity remap
#[inline]
#[must_use]
pub fn keep_address(address: &Address) -> Address {
    address.clone()
}

/// Domain-defined pointer discriminator
///
/// A target only accepts pointers whose type is listed in its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointerType(u16);

impl PointerType {
    /// Create a pointer type from its numeric id
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Numeric id
    #[inline]
    #[must_use]
    pub const fn id(self) -> u16 {
        self.0
    }
}

impl Display for PointerType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "pointer-type#{}", self.0)
    }
}

/// Rules for pointers targeting a vertex
///
/// - `accepts`: pointer types allowed to target the vertex
/// - `mandatory`: the vertex needs at least one incoming pointer to be valid
/// - `exclusive`: the vertex accepts at most one incoming pointer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointerRules {
    accepts: Vec<PointerType>,
    mandatory: bool,
    exclusive: bool,
}

impl PointerRules {
    /// Rules accepting no pointers at all
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Rules accepting the given pointer types
    #[must_use]
    pub fn accepting(types: impl IntoIterator<Item = PointerType>) -> Self {
        Self {
            accepts: types.into_iter().collect(),
            mandatory: false,
            exclusive: false,
        }
    }

    /// Require at least one incoming pointer
    #[inline]
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Allow at most one incoming pointer
    #[inline]
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Check if a pointer type may target the vertex
    #[inline]
    #[must_use]
    pub fn accepts(&self, pointer_type: PointerType) -> bool {
        self.accepts.contains(&pointer_type)
    }

    /// Accepted pointer types
    #[inline]
    #[must_use]
    pub fn accepted_types(&self) -> &[PointerType] {
        &self.accepts
    }

    /// Whether at least one incoming pointer is required
    #[inline]
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Whether at most one incoming pointer is allowed
    #[inline]
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Whether the requirement sweep has to look at this vertex
    #[inline]
    #[must_use]
    pub fn is_watched(&self) -> bool {
        self.mandatory || self.exclusive
    }
}

/// Scalar value held by a primitive field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PrimitiveValue {
    /// Boolean
    Bool(bool),
    /// Signed 32-bit integer
    Int32(i32),
    /// 32-bit float
    Float32(f32),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl PrimitiveValue {
    /// Name of the variant
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Float32(_) => "float32",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Check if both values are the same variant
    #[inline]
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Boolean payload
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer payload
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(value) => Some(*value),
            _ => None,
        }
    }

    /// Float payload
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float32(value) => Some(*value),
            _ => None,
        }
    }

    /// String payload
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Byte payload
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Write in natural binary encoding
    pub fn write(&self, writer: &mut ByteWriter) {
        match self {
            Self::Bool(value) => writer.write_bool(*value),
            Self::Int32(value) => writer.write_i32(*value),
            Self::Float32(value) => writer.write_f32(*value),
            Self::String(value) => writer.write_string(value),
            Self::Bytes(value) => writer.write_bytes(value),
        }
    }

    /// Read a value of the same variant as `self`
    ///
    /// # Errors
    /// Returns error on malformed input
    pub fn read_same_kind(&self, reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(match self {
            Self::Bool(_) => Self::Bool(reader.read_bool()?),
            Self::Int32(_) => Self::Int32(reader.read_i32()?),
            Self::Float32(_) => Self::Float32(reader.read_f32()?),
            Self::String(_) => Self::String(reader.read_string()?),
            Self::Bytes(_) => Self::Bytes(reader.read_bytes()?),
        })
    }

    /// JSON representation
    ///
    /// Bytes are written as hex. Non-finite floats have no JSON number form
    /// and are written as `"inf"`, `"-inf"` or `"nan"`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Int32(value) => Value::from(*value),
            Self::Float32(value) => Number::from_f64(f64::from(*value)).map_or_else(
                || Value::String(non_finite_name(*value).to_owned()),
                Value::Number,
            ),
            Self::String(value) => Value::String(value.clone()),
            Self::Bytes(value) => Value::String(hex::encode(value)),
        }
    }

    /// Parse a JSON value as the same variant as `self`
    ///
    /// # Errors
    /// Returns error if the JSON value does not fit the variant
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_json_same_kind(&self, value: &Value, address: &Address) -> Result<Self, DecodeError> {
        let mismatch = || DecodeError::TypeMismatch {
            address: address.clone(),
            expected: self.kind_name(),
        };
        Ok(match self {
            Self::Bool(_) => Self::Bool(value.as_bool().ok_or_else(mismatch)?),
            Self::Int32(_) => {
                let wide = value.as_i64().ok_or_else(mismatch)?;
                Self::Int32(i32::try_from(wide).map_err(|_| mismatch())?)
            }
            Self::Float32(_) => Self::Float32(match value {
                Value::String(name) => parse_non_finite(name).ok_or_else(mismatch)?,
                _ => value.as_f64().ok_or_else(mismatch)? as f32,
            }),
            Self::String(_) => Self::String(value.as_str().ok_or_else(mismatch)?.to_string()),
            Self::Bytes(_) => Self::Bytes(hex::decode(value.as_str().ok_or_else(mismatch)?)?),
        })
    }
}

fn non_finite_name(value: f32) -> &'static str {
    if value.is_nan() {
        "nan"
    } else if value.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

fn parse_non_finite(name: &str) -> Option<f32> {
    match name {
        "inf" => Some(f32::INFINITY),
        "-inf" => Some(f32::NEG_INFINITY),
        "nan" => Some(f32::NAN),
        _ => None,
    }
}

impl From<bool> for PrimitiveValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PrimitiveValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<f32> for PrimitiveValue {
    fn from(value: f32) -> Self {
        Self::Float32(value)
    }
}

impl From<&str> for PrimitiveValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Field holding a scalar value
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveField {
    address: Address,
    name: &'static str,
    rules: PointerRules,
    value: PrimitiveValue,
}

impl PrimitiveField {
    /// Current value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &PrimitiveValue {
        &self.value
    }

    /// Replace the value, returning the previous one if it changed
    ///
    /// # Panics
    /// Panics if `value` is a different variant than the field's.
    pub(crate) fn replace(&mut self, value: PrimitiveValue) -> Option<PrimitiveValue> {
        assert!(
            self.value.same_kind(&value),
            "field {} holds {} but got {}",
            self.address,
            self.value.kind_name(),
            value.kind_name()
        );
        if self.value == value {
            return None;
        }
        Some(std::mem::replace(&mut self.value, value))
    }
}

/// Field holding a typed reference to another vertex
#[derive(Debug, Clone, PartialEq)]
pub struct PointerField {
    address: Address,
    name: &'static str,
    rules: PointerRules,
    pointer_type: PointerType,
    mandatory: bool,
    target: Option<Address>,
}

impl PointerField {
    /// Address of this pointer field
    #[inline]
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Pointer type tag
    #[inline]
    #[must_use]
    pub fn pointer_type(&self) -> PointerType {
        self.pointer_type
    }

    /// Whether the owning box is invalid while the pointer is empty
    #[inline]
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Current target
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&Address> {
        self.target.as_ref()
    }

    /// Whether the pointer is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    /// Replace the target, returning the previous one if it changed
    pub(crate) fn replace(&mut self, target: Option<Address>) -> Option<Option<Address>> {
        if self.target == target {
            return None;
        }
        Some(std::mem::replace(&mut self.target, target))
    }
}

/// Fixed-length list of nested fields
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayField {
    address: Address,
    name: &'static str,
    rules: PointerRules,
    elements: Vec<Field>,
}

impl ArrayField {
    /// Elements in index order
    #[inline]
    #[must_use]
    pub fn elements(&self) -> &[Field] {
        &self.elements
    }
}

/// Keyed record of nested fields
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    address: Address,
    name: &'static str,
    rules: PointerRules,
    fields: BTreeMap<FieldKey, Field>,
}

impl ObjectField {
    /// Nested fields in key order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<FieldKey, Field> {
        &self.fields
    }
}

/// A typed slot inside a box
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Scalar value
    Primitive(PrimitiveField),
    /// Typed pointer
    Pointer(PointerField),
    /// Fixed-length list
    Array(ArrayField),
    /// Keyed record
    Object(ObjectField),
}

impl Field {
    /// Address of the field
    #[must_use]
    pub fn address(&self) -> &Address {
        match self {
            Self::Primitive(field) => &field.address,
            Self::Pointer(field) => &field.address,
            Self::Array(field) => &field.address,
            Self::Object(field) => &field.address,
        }
    }

    /// Schema name of the field
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primitive(field) => field.name,
            Self::Pointer(field) => field.name,
            Self::Array(field) => field.name,
            Self::Object(field) => field.name,
        }
    }

    /// Rules for pointers targeting this field
    #[must_use]
    pub fn rules(&self) -> &PointerRules {
        match self {
            Self::Primitive(field) => &field.rules,
            Self::Pointer(field) => &field.rules,
            Self::Array(field) => &field.rules,
            Self::Object(field) => &field.rules,
        }
    }

    /// Variant name
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Pointer(_) => "pointer",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Primitive view
    #[must_use]
    pub fn as_primitive(&self) -> Option<&PrimitiveField> {
        match self {
            Self::Primitive(field) => Some(field),
            _ => None,
        }
    }

    /// Pointer view
    #[must_use]
    pub fn as_pointer(&self) -> Option<&PointerField> {
        match self {
            Self::Pointer(field) => Some(field),
            _ => None,
        }
    }

    /// Direct child by key (array index or object key)
    #[must_use]
    pub fn child(&self, key: FieldKey) -> Option<&Field> {
        match self {
            Self::Array(field) => field.elements.get(usize::from(key)),
            Self::Object(field) => field.fields.get(&key),
            Self::Primitive(_) | Self::Pointer(_) => None,
        }
    }

    pub(crate) fn child_mut(&mut self, key: FieldKey) -> Option<&mut Field> {
        match self {
            Self::Array(field) => field.elements.get_mut(usize::from(key)),
            Self::Object(field) => field.fields.get_mut(&key),
            Self::Primitive(_) | Self::Pointer(_) => None,
        }
    }

    /// Descend along `keys`
    #[must_use]
    pub fn descend(&self, keys: &[FieldKey]) -> Option<&Field> {
        keys.iter().try_fold(self, |field, key| field.child(*key))
    }

    pub(crate) fn descend_mut(&mut self, keys: &[FieldKey]) -> Option<&mut Field> {
        keys.iter().try_fold(self, |field, key| field.child_mut(*key))
    }

    /// Pre-order walk over this field and all nested fields
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Field)) {
        visit(self);
        match self {
            Self::Array(field) => {
                for child in &field.elements {
                    child.walk(visit);
                }
            }
            Self::Object(field) => {
                for child in field.fields.values() {
                    child.walk(visit);
                }
            }
            Self::Primitive(_) | Self::Pointer(_) => {}
        }
    }

    /// Write binary payload
    ///
    /// # Panics
    /// Panics if an array or object has more than `u16::MAX` entries.
    pub fn write(&self, writer: &mut ByteWriter) {
        match self {
            Self::Primitive(field) => field.value.write(writer),
            Self::Pointer(field) => match &field.target {
                Some(target) => {
                    writer.write_bool(true);
                    writer.write_address(target);
                }
                None => writer.write_bool(false),
            },
            Self::Array(field) => {
                writer.write_u16(u16::try_from(field.elements.len()).expect("array too long"));
                field.elements.iter().for_each(|element| element.write(writer));
            }
            Self::Object(field) => write_field_map(&field.fields, writer),
        }
    }

    /// Read binary payload into this field
    ///
    /// # Errors
    /// Returns error on malformed input or schema mismatch
    pub fn read(&mut self, reader: &mut ByteReader<'_>, remap: Remap<'_>) -> Result<(), DecodeError> {
        match self {
            Self::Primitive(field) => {
                field.value = field.value.read_same_kind(reader)?;
            }
            Self::Pointer(field) => {
                field.target = if reader.read_bool()? {
                    Some(remap(&reader.read_address()?))
                } else {
                    None
                };
            }
            Self::Array(field) => {
                let count = usize::from(reader.read_u16()?);
                if count != field.elements.len() {
                    return Err(DecodeError::CountMismatch {
                        address: field.address.clone(),
                        expected: field.elements.len(),
                        actual: count,
                    });
                }
                for element in &mut field.elements {
                    element.read(reader, remap)?;
                }
            }
            Self::Object(field) => read_field_map(&mut field.fields, &field.address, reader, remap)?,
        }
        Ok(())
    }

    /// JSON representation
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Primitive(field) => field.value.to_json(),
            Self::Pointer(field) => field
                .target
                .as_ref()
                .map_or(Value::Null, |target| Value::String(target.to_string())),
            Self::Array(field) => Value::Array(field.elements.iter().map(Field::to_json).collect()),
            Self::Object(field) => field_map_to_json(&field.fields),
        }
    }

    /// Read a JSON representation into this field
    ///
    /// # Errors
    /// Returns error on malformed input or schema mismatch
    pub fn read_json(&mut self, value: &Value, remap: Remap<'_>) -> Result<(), DecodeError> {
        match self {
            Self::Primitive(field) => {
                field.value = field.value.from_json_same_kind(value, &field.address)?;
            }
            Self::Pointer(field) => {
                field.target = match value {
                    Value::Null => None,
                    Value::String(text) => Some(remap(&text.parse::<Address>()?)),
                    _ => {
                        return Err(DecodeError::TypeMismatch {
                            address: field.address.clone(),
                            expected: "address or null",
                        })
                    }
                };
            }
            Self::Array(field) => {
                let values = value.as_array().ok_or_else(|| DecodeError::TypeMismatch {
                    address: field.address.clone(),
                    expected: "array",
                })?;
                if values.len() != field.elements.len() {
                    return Err(DecodeError::CountMismatch {
                        address: field.address.clone(),
                        expected: field.elements.len(),
                        actual: values.len(),
                    });
                }
                for (element, value) in field.elements.iter_mut().zip(values) {
                    element.read_json(value, remap)?;
                }
            }
            Self::Object(field) => read_field_map_json(&mut field.fields, &field.address, value, remap)?,
        }
        Ok(())
    }
}

pub(crate) fn write_field_map(fields: &BTreeMap<FieldKey, Field>, writer: &mut ByteWriter) {
    writer.write_u16(u16::try_from(fields.len()).expect("too many fields"));
    for (key, field) in fields {
        writer.write_u16(*key);
        field.write(writer);
    }
}

pub(crate) fn read_field_map(
    fields: &mut BTreeMap<FieldKey, Field>,
    parent: &Address,
    reader: &mut ByteReader<'_>,
    remap: Remap<'_>,
) -> Result<(), DecodeError> {
    let count = reader.read_u16()?;
    for _ in 0..count {
        let key = reader.read_u16()?;
        let field = fields.get_mut(&key).ok_or_else(|| DecodeError::UnknownField {
            parent: parent.clone(),
            key,
        })?;
        field.read(reader, remap)?;
    }
    Ok(())
}

pub(crate) fn field_map_to_json(fields: &BTreeMap<FieldKey, Field>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, field)| (key.to_string(), field.to_json()))
            .collect::<Map<_, _>>(),
    )
}

pub(crate) fn read_field_map_json(
    fields: &mut BTreeMap<FieldKey, Field>,
    parent: &Address,
    value: &Value,
    remap: Remap<'_>,
) -> Result<(), DecodeError> {
    let entries = value.as_object().ok_or_else(|| DecodeError::TypeMismatch {
        address: parent.clone(),
        expected: "object",
    })?;
    for (key, value) in entries {
        let key: FieldKey = key
            .parse()
            .map_err(|_| DecodeError::Json(format!("invalid field key '{key}' in {parent}")))?;
        let field = fields.get_mut(&key).ok_or_else(|| DecodeError::UnknownField {
            parent: parent.clone(),
            key,
        })?;
        field.read_json(value, remap)?;
    }
    Ok(())
}

/// Address-free description of a field
///
/// Box kinds declare their fields as specs; [`crate::GraphBox::builder`]
/// materializes them under the box's address.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    /// Scalar field with its default value
    Primitive {
        /// Schema name
        name: &'static str,
        /// Incoming pointer rules
        rules: PointerRules,
        /// Default value
        value: PrimitiveValue,
    },
    /// Pointer field, initially empty
    Pointer {
        /// Schema name
        name: &'static str,
        /// Incoming pointer rules
        rules: PointerRules,
        /// Type tag carried by the pointer
        pointer_type: PointerType,
        /// Owner is invalid while empty
        mandatory: bool,
    },
    /// Fixed-length list
    Array {
        /// Schema name
        name: &'static str,
        /// Incoming pointer rules
        rules: PointerRules,
        /// Element specs in index order
        elements: Vec<FieldSpec>,
    },
    /// Keyed record
    Object {
        /// Schema name
        name: &'static str,
        /// Incoming pointer rules
        rules: PointerRules,
        /// Keyed member specs
        fields: Vec<(FieldKey, FieldSpec)>,
    },
}

impl FieldSpec {
    /// Primitive field with a default value
    #[must_use]
    pub fn primitive(name: &'static str, value: impl Into<PrimitiveValue>) -> Self {
        Self::Primitive {
            name,
            rules: PointerRules::none(),
            value: value.into(),
        }
    }

    /// Pointer field of the given type
    #[must_use]
    pub fn pointer(name: &'static str, pointer_type: PointerType, mandatory: bool) -> Self {
        Self::Pointer {
            name,
            rules: PointerRules::none(),
            pointer_type,
            mandatory,
        }
    }

    /// Array of nested fields
    #[must_use]
    pub fn array(name: &'static str, elements: impl IntoIterator<Item = FieldSpec>) -> Self {
        Self::Array {
            name,
            rules: PointerRules::none(),
            elements: elements.into_iter().collect(),
        }
    }

    /// Object of keyed nested fields
    #[must_use]
    pub fn object(name: &'static str, fields: impl IntoIterator<Item = (FieldKey, FieldSpec)>) -> Self {
        Self::Object {
            name,
            rules: PointerRules::none(),
            fields: fields.into_iter().collect(),
        }
    }

    /// Set the rules for pointers targeting the field
    #[must_use]
    pub fn with_rules(mut self, new_rules: PointerRules) -> Self {
        match &mut self {
            Self::Primitive { rules, .. }
            | Self::Pointer { rules, .. }
            | Self::Array { rules, .. }
            | Self::Object { rules, .. } => *rules = new_rules,
        }
        self
    }

    /// Materialize under `address`
    ///
    /// # Panics
    /// Panics if an array spec has more than `u16::MAX` elements.
    #[must_use]
    pub fn materialize(self, address: Address) -> Field {
        match self {
            Self::Primitive { name, rules, value } => Field::Primitive(PrimitiveField {
                address,
                name,
                rules,
                value,
            }),
            Self::Pointer {
                name,
                rules,
                pointer_type,
                mandatory,
            } => Field::Pointer(PointerField {
                address,
                name,
                rules,
                pointer_type,
                mandatory,
                target: None,
            }),
            Self::Array { name, rules, elements } => {
                let elements = elements
                    .into_iter()
                    .enumerate()
                    .map(|(index, spec)| {
                        let key = FieldKey::try_from(index).expect("array too long");
                        spec.materialize(address.append(key))
                    })
                    .collect();
                Field::Array(ArrayField {
                    address,
                    name,
                    rules,
                    elements,
                })
            }
            Self::Object { name, rules, fields } => {
                let fields = fields
                    .into_iter()
                    .map(|(key, spec)| (key, spec.materialize(address.append(key))))
                    .collect();
                Field::Object(ObjectField {
                    address,
                    name,
                    rules,
                    fields,
                })
            }
        }
    }
}
