//! Geometry types.
//!
//! - `Vector2`: a copyable value type with field access and arithmetic
//! - `Shape`: a base type with a read-only `area` and `scale(factor)`
//! - `Circle`: derived from `Shape`, adds `radius` and overloads `scale`

use std::f64::consts::PI;

use classbind_core::{CallError, RegistrationError};
use classbind_registry::{Derives, Owned, TypeRegistry, field};

/// Factor used by `Circle.scale()` when called without arguments.
pub const DEFAULT_SCALE: f64 = 2.0;

// =============================================================================
// VECTOR2
// =============================================================================

/// Two-component vector, duplicated by value through `_cloned`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(&self, other: &Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction.
    pub fn normalized(&self) -> Result<Vector2, CallError> {
        let length = self.length();
        if length == 0.0 {
            return Err(CallError::native("cannot normalize a zero-length vector"));
        }
        Ok(Vector2::new(self.x / length, self.y / length))
    }

    pub fn scale_by(&mut self, factor: f64) {
        self.x *= factor;
        self.y *= factor;
    }
}

impl std::ops::Add for Vector2 {
    type Output = Vector2;

    fn add(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

// =============================================================================
// SHAPE / CIRCLE
// =============================================================================

/// Base shape. Only its area is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    area: f64,
}

impl Shape {
    pub fn new(area: f64) -> Self {
        Self { area }
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Scale linear dimensions by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.area *= factor * factor;
    }
}

/// A circle. Keeps its `Shape` part's area in step with its radius.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    shape: Shape,
    radius: f64,
}

impl Circle {
    pub fn new(radius: f64) -> Result<Self, CallError> {
        let radius = checked_radius(radius)?;
        Ok(Self {
            shape: Shape::new(PI * radius * radius),
            radius,
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Rejects the same radii as [`Circle::new`] and leaves the circle unchanged.
    pub fn set_radius(&mut self, radius: f64) -> Result<(), CallError> {
        let radius = checked_radius(radius)?;
        self.radius = radius;
        self.shape.area = PI * radius * radius;
        Ok(())
    }

    pub fn scale(&mut self, factor: f64) -> Result<(), CallError> {
        self.set_radius(self.radius * factor)
    }
}

fn checked_radius(radius: f64) -> Result<f64, CallError> {
    if radius < 0.0 || !radius.is_finite() {
        return Err(CallError::native(format!("invalid radius {radius}")));
    }
    Ok(radius)
}

impl Derives<Shape> for Circle {
    fn base(&self) -> &Shape {
        &self.shape
    }

    fn base_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Register `Vector2`, `Shape` and `Circle`.
pub fn register(registry: &mut TypeRegistry) -> Result<(), RegistrationError> {
    registry
        .define_type::<Vector2>("Vector2")?
        .ctor(Vector2::default)?
        .ctor(Vector2::new)?
        .var("x", field!(Vector2, x: f64))
        .var("y", field!(Vector2, y: f64))
        .method("length", Vector2::length)
        .method("dot", |v: &Vector2, other: Owned<Vector2>| v.dot(&other))
        .method("add", |v: &Vector2, other: Owned<Vector2>| {
            Owned(*v + other.into_inner())
        })
        .method("normalized", |v: &Vector2| v.normalized().map(Owned))
        .method("scale", Vector2::scale_by)
        .static_method("zero", || Owned(Vector2::default()))
        .static_value("Dimensions", 2i64)
        .copyable();

    registry
        .define_type::<Shape>("Shape")?
        .ctor(Shape::new)?
        .property_get("area", Shape::area)
        .method("scale", Shape::scale);

    registry
        .define_derived_type::<Circle, Shape>("Circle")?
        .ctor(Circle::new)?
        .property("radius", Circle::radius, Circle::set_radius)
        .overload("scale", |c: &mut Circle| c.scale(DEFAULT_SCALE))?
        .overload("scale", Circle::scale)?
        .copyable();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classbind_registry::{CONSTRUCTOR, Slot};

    #[test]
    fn circle_keeps_area_in_step() {
        let mut circle = Circle::new(1.0).unwrap();
        assert!((circle.base().area() - PI).abs() < 1e-12);
        circle.scale(2.0).unwrap();
        assert_eq!(circle.radius(), 2.0);
        assert!((circle.base().area() - 4.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn negative_radius_is_rejected() {
        assert!(Circle::new(-1.0).is_err());
        assert!(Circle::new(f64::NAN).is_err());
    }

    #[test]
    fn setter_and_scale_keep_the_radius_valid() {
        let mut circle = Circle::new(2.0).unwrap();
        assert!(circle.set_radius(-1.0).is_err());
        assert!(circle.set_radius(f64::NAN).is_err());
        assert!(circle.scale(-1.0).is_err());
        assert!(circle.scale(f64::INFINITY).is_err());
        assert_eq!(circle, Circle::new(2.0).unwrap());
    }

    #[test]
    fn zero_vector_cannot_be_normalized() {
        assert!(Vector2::default().normalized().is_err());
        let unit = Vector2::new(3.0, 4.0).normalized().unwrap();
        assert!((unit.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn registers_expected_members() {
        let mut registry = TypeRegistry::new();
        register(&mut registry).unwrap();

        let vector = registry.by_name("Vector2").unwrap();
        assert!(vector.is_copyable());
        assert_eq!(
            vector.members().overloads().available(CONSTRUCTOR),
            vec![0, 2]
        );
        assert_eq!(vector.set_table().names(), vec!["x", "y"]);

        let circle = registry.by_name("Circle").unwrap();
        assert_eq!(circle.base_name(), Some("Shape"));
        assert!(circle.getter("area").unwrap().is_inherited());
        assert!(circle.setter("area").is_none());
        assert!(matches!(circle.members().slot("scale"), Some(Slot::Overloaded)));
        assert_eq!(circle.members().overloads().available("scale"), vec![0, 1]);
        assert_eq!(
            circle.members().overloads().available(CONSTRUCTOR),
            vec![1]
        );

        let shape = registry.by_name("Shape").unwrap();
        assert!(matches!(shape.members().slot("scale"), Some(Slot::Function(_))));
    }

    #[test]
    fn registering_twice_fails() {
        let mut registry = TypeRegistry::new();
        register(&mut registry).unwrap();
        assert!(matches!(
            register(&mut registry),
            Err(RegistrationError::DuplicateType { .. })
        ));
    }
}
