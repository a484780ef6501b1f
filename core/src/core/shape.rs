// conflux/src/core/shape.rs

//! Describes the structure of data flowing at a point in a flow.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key carrying a variant's name.
pub const VARIANT_NAME_KEY: &str = "name";

/// Metadata key marking a shape built by merging incompatible shapes.
pub const UNION_KEY: &str = "conflux.union";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
  /// No data at all.
  None,
  /// Unconstrained; the top element of the merge lattice.
  Any,
  JsonInstance,
  JsonSchema,
  XmlInstance,
  XmlSchema,
  Java,
  Primitive,
}

impl ShapeKind {
  pub fn is_json(self) -> bool {
    matches!(self, ShapeKind::JsonInstance | ShapeKind::JsonSchema)
  }
}

impl fmt::Display for ShapeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ShapeKind::None => "none",
      ShapeKind::Any => "any",
      ShapeKind::JsonInstance => "json-instance",
      ShapeKind::JsonSchema => "json-schema",
      ShapeKind::XmlInstance => "xml-instance",
      ShapeKind::XmlSchema => "xml-schema",
      ShapeKind::Java => "java",
      ShapeKind::Primitive => "primitive",
    };
    f.write_str(s)
  }
}

/// An immutable description of data: kind, specification, description and
/// an ordered list of named variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
  pub kind: ShapeKind,
  #[serde(default)]
  pub specification: String,
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metadata: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub variants: Vec<Shape>,
}

/// "This step declares no shape."
pub const NO_SHAPE: Shape = Shape {
  kind: ShapeKind::None,
  specification: String::new(),
  description: String::new(),
  name: None,
  metadata: BTreeMap::new(),
  variants: Vec::new(),
};

/// Addressable `NO_SHAPE`, for accessors that hand out a reference.
pub(crate) static NONE_SHAPE: Shape = NO_SHAPE;

/// "This step accepts or produces anything."
pub const ANY_SHAPE: Shape = Shape {
  kind: ShapeKind::Any,
  specification: String::new(),
  description: String::new(),
  name: None,
  metadata: BTreeMap::new(),
  variants: Vec::new(),
};

impl Shape {
  /// Builds a shape. A `None` kind always yields an empty specification.
  pub fn new(kind: ShapeKind, specification: impl Into<String>) -> Self {
    let specification = if kind == ShapeKind::None {
      String::new()
    } else {
      specification.into()
    };
    Shape {
      kind,
      specification,
      ..NO_SHAPE
    }
  }

  pub fn json_instance(specification: impl Into<String>) -> Self {
    Shape::new(ShapeKind::JsonInstance, specification)
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }

  /// Appends a variant. Ignored on a `None` shape.
  pub fn with_variant(mut self, variant: Shape) -> Self {
    if self.kind != ShapeKind::None {
      self.variants.push(variant);
    }
    self
  }

  pub fn with_variants(mut self, variants: impl IntoIterator<Item = Shape>) -> Self {
    if self.kind != ShapeKind::None {
      self.variants.extend(variants);
    }
    self
  }

  pub fn is_none(&self) -> bool {
    self.kind == ShapeKind::None
  }

  pub fn is_any(&self) -> bool {
    self.kind == ShapeKind::Any
  }

  /// Neither `None` nor `Any`.
  pub fn is_concrete(&self) -> bool {
    !self.is_none() && !self.is_any()
  }

  /// Built by merging incompatible shapes. A declared shape that merely
  /// carries variants is not a union.
  pub fn is_union(&self) -> bool {
    !self.is_none() && self.metadata.contains_key(UNION_KEY)
  }

  /// Same kind and same specification.
  pub fn same_structure(&self, other: &Shape) -> bool {
    self.kind == other.kind && self.specification == other.specification
  }

  pub fn variant_name(&self) -> Option<&str> {
    self.metadata.get(VARIANT_NAME_KEY).map(String::as_str)
  }

  pub fn variant_names(&self) -> Vec<&str> {
    self.variants.iter().filter_map(Shape::variant_name).collect()
  }
}

impl Default for Shape {
  fn default() -> Self {
    NO_SHAPE
  }
}

impl fmt::Display for Shape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.kind)?;
    if !self.description.is_empty() {
      write!(f, " ({})", self.description)?;
    }
    if !self.variants.is_empty() {
      write!(f, " [{} variants]", self.variants.len())?;
    }
    Ok(())
  }
}
