// conflux/src/core/merge.rs

//! Shape merging primitives.
//!
//! `NONE` contributes nothing, the `ANY` sentinel absorbs everything else,
//! structurally identical shapes collapse into one, and anything that cannot be
//! unified is collected into a variants-bearing union whose variant order follows
//! the order in which the shapes were supplied. Unions built here are marked
//! with `UNION_KEY` and flattened when merged again; a declared shape that
//! carries variants stays a single variant.

use super::shape::{Shape, ShapeKind, ANY_SHAPE, NO_SHAPE, UNION_KEY, VARIANT_NAME_KEY};
use std::collections::HashSet;

/// Merges two shapes.
pub fn merge(a: &Shape, b: &Shape) -> Shape {
  merge_all([a, b])
}

/// Merges an ordered sequence of shapes.
///
/// An empty sequence, or one made only of `NONE` shapes, yields `NO_SHAPE`.
/// Any plain `ANY` contributor yields `ANY_SHAPE`.
pub fn merge_all<'a, I>(shapes: I) -> Shape
where
  I: IntoIterator<Item = &'a Shape>,
{
  let contributors: Vec<&Shape> = shapes.into_iter().filter(|s| !s.is_none()).collect();

  if contributors.is_empty() {
    return NO_SHAPE;
  }
  if contributors.iter().any(|s| absorbs(s)) {
    return ANY_SHAPE;
  }
  if let [single] = contributors.as_slice() {
    return (*single).clone();
  }

  let mut distinct: Vec<Shape> = Vec::new();
  for shape in contributors {
    if shape.is_union() {
      for variant in &shape.variants {
        absorb_into(&mut distinct, variant);
      }
    } else {
      absorb_into(&mut distinct, shape);
    }
  }

  if distinct.len() == 1 {
    return distinct.remove(0);
  }
  union_of(distinct)
}

/// The plain `ANY` sentinel absorbs; an `ANY`-kinded union still carries variants.
fn absorbs(shape: &Shape) -> bool {
  shape.is_any() && shape.variants.is_empty()
}

fn absorb_into(distinct: &mut Vec<Shape>, shape: &Shape) {
  match distinct.iter_mut().find(|existing| existing.same_structure(shape)) {
    Some(existing) => {
      if existing.description.is_empty() && !shape.description.is_empty() {
        existing.description = shape.description.clone();
      }
      if existing.variants.is_empty() && !shape.variants.is_empty() {
        existing.variants = shape.variants.clone();
      }
    }
    None => distinct.push(shape.clone()),
  }
}

fn union_of(members: Vec<Shape>) -> Shape {
  let kind = common_kind(&members);
  let mut taken = HashSet::new();
  let variants: Vec<Shape> = members
    .into_iter()
    .enumerate()
    .map(|(idx, member)| tag_variant(member, idx + 1, &mut taken))
    .collect();
  Shape::new(kind, "")
    .with_metadata(UNION_KEY, "true")
    .with_variants(variants)
}

fn common_kind(members: &[Shape]) -> ShapeKind {
  match members.split_first() {
    Some((first, rest)) if rest.iter().all(|m| m.kind == first.kind) => first.kind,
    _ => ShapeKind::Any,
  }
}

/// Names a variant after its existing name, its description or its position,
/// suffixing `-2`, `-3`, ... until the name is unique within the union.
fn tag_variant(member: Shape, position: usize, taken: &mut HashSet<String>) -> Shape {
  let base = match (member.variant_name(), &member.name, member.description.is_empty()) {
    (Some(name), _, _) => name.to_string(),
    (None, Some(name), _) => name.clone(),
    (None, None, false) => member.description.clone(),
    (None, None, true) => format!("variant{}", position),
  };
  let mut name = base.clone();
  let mut suffix = 2;
  while taken.contains(&name) {
    name = format!("{}-{}", base, suffix);
    suffix += 1;
  }
  taken.insert(name.clone());
  member.with_metadata(VARIANT_NAME_KEY, name)
}
