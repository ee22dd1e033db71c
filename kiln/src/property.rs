//! Named properties for reflection-style access.
//!
//! A [`PropertyRegistry`] lists the properties a type publishes, each one being read-only or
//! read-write. Script bridges and inspectors go through it instead of knowing the concrete type.
//! Unknown names, writes to read-only properties and values of the wrong kind are logged and
//! ignored.

use glam::Vec3;
use std::fmt;

/// Value of a property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
  Bool(bool),
  Int(i64),
  Float(f32),
  Vec3(Vec3),
  Color([f32; 4]),
  String(String),
}

impl PropertyValue {
  /// Name of the kind of value, for diagnostics.
  pub fn kind(&self) -> &'static str {
    match self {
      PropertyValue::Bool(_) => "bool",
      PropertyValue::Int(_) => "int",
      PropertyValue::Float(_) => "float",
      PropertyValue::Vec3(_) => "vec3",
      PropertyValue::Color(_) => "color",
      PropertyValue::String(_) => "string",
    }
  }
}

impl fmt::Display for PropertyValue {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match self {
      PropertyValue::Bool(b) => write!(f, "{}", b),
      PropertyValue::Int(i) => write!(f, "{}", i),
      PropertyValue::Float(x) => write!(f, "{}", x),
      PropertyValue::Vec3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
      PropertyValue::Color([r, g, b, a]) => write!(f, "rgba({}, {}, {}, {})", r, g, b, a),
      PropertyValue::String(s) => write!(f, "{:?}", s),
    }
  }
}

/// Reads a property out of its owner.
pub type Getter<T> = fn(&T) -> PropertyValue;

/// Writes a property; returns `false` if the value is of the wrong kind.
pub type Setter<T> = fn(&mut T, &PropertyValue) -> bool;

struct Property<T> {
  name: &'static str,
  get: Getter<T>,
  set: Option<Setter<T>>,
}

/// Properties published by `T`.
pub struct PropertyRegistry<T> {
  type_name: &'static str,
  properties: Vec<Property<T>>,
}

impl<T> fmt::Debug for PropertyRegistry<T> {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.debug_struct("PropertyRegistry")
      .field("type_name", &self.type_name)
      .field("properties", &self.names().collect::<Vec<_>>())
      .finish()
  }
}

impl<T> PropertyRegistry<T> {
  pub fn new(type_name: &'static str) -> Self {
    PropertyRegistry {
      type_name,
      properties: Vec::new(),
    }
  }

  pub fn read_only(mut self, name: &'static str, get: Getter<T>) -> Self {
    self.properties.push(Property {
      name,
      get,
      set: None,
    });
    self
  }

  pub fn read_write(mut self, name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
    self.properties.push(Property {
      name,
      get,
      set: Some(set),
    });
    self
  }

  pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.properties.iter().map(|p| p.name)
  }

  /// Whether the property exists and can be written.
  pub fn is_writable(&self, name: &str) -> bool {
    self.find(name).map_or(false, |p| p.set.is_some())
  }

  /// Read a property; `None` if it doesn’t exist.
  pub fn get(&self, target: &T, name: &str) -> Option<PropertyValue> {
    match self.find(name) {
      Some(p) => Some((p.get)(target)),
      None => {
        log::warn!("{} has no property {:?}", self.type_name, name);
        None
      }
    }
  }

  /// Write a property; returns whether the value was taken.
  pub fn set(&self, target: &mut T, name: &str, value: PropertyValue) -> bool {
    let Some(p) = self.find(name) else {
      log::warn!("{} has no property {:?}; ignoring", self.type_name, name);
      return false;
    };

    let Some(set) = p.set else {
      log::warn!("{}.{} is read-only; ignoring", self.type_name, name);
      return false;
    };

    let accepted = set(target, &value);

    if !accepted {
      log::warn!(
        "{}.{} cannot be set from a {} value; ignoring",
        self.type_name,
        name,
        value.kind()
      );
    }

    accepted
  }

  fn find(&self, name: &str) -> Option<&Property<T>> {
    self.properties.iter().find(|p| p.name == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Default)]
  struct Light {
    intensity: f32,
    id: i64,
  }

  fn registry() -> PropertyRegistry<Light> {
    PropertyRegistry::<Light>::new("Light")
      .read_write(
        "intensity",
        |l| PropertyValue::Float(l.intensity),
        |l, v| match *v {
          PropertyValue::Float(x) => {
            l.intensity = x;
            true
          }
          _ => false,
        },
      )
      .read_only("id", |l| PropertyValue::Int(l.id))
  }

  #[test]
  fn reads_and_writes() {
    let props = registry();
    let mut light = Light { intensity: 1., id: 7 };

    assert!(props.set(&mut light, "intensity", PropertyValue::Float(0.5)));
    assert_eq!(props.get(&light, "intensity"), Some(PropertyValue::Float(0.5)));
    assert_eq!(props.get(&light, "id"), Some(PropertyValue::Int(7)));
    assert_eq!(props.names().collect::<Vec<_>>(), vec!["intensity", "id"]);
  }

  #[test]
  fn soft_failures_are_no_ops() {
    let props = registry();
    let mut light = Light::default();

    assert!(!props.set(&mut light, "id", PropertyValue::Int(3)));
    assert!(!props.set(&mut light, "color", PropertyValue::Bool(true)));
    assert!(!props.set(&mut light, "intensity", PropertyValue::Bool(true)));
    assert_eq!(props.get(&light, "color"), None);

    assert_eq!(light.id, 0);
    assert_eq!(light.intensity, 0.);
    assert!(!props.is_writable("id"));
  }
}
