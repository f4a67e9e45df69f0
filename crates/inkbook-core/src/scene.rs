//! Page scene: an ordered set of shapes plus page properties.

use crate::portable::{PortableScene, Revived, Reviver};
use crate::shapes::{SerializableColor, Shape, ShapeId};
use kurbo::Point;
use std::collections::HashMap;

/// The shapes on one page, back to front.
#[derive(Debug, Clone)]
pub struct Scene {
    /// All shapes in the scene, keyed by ID.
    shapes: HashMap<ShapeId, Shape>,
    /// Z-order of shapes (back to front).
    z_order: Vec<ShapeId>,
    pub background: SerializableColor,
    pub width: f64,
    pub height: f64,
}

impl Default for Scene {
    fn default() -> Self {
        let size = crate::config::PageSize::default();
        Self::new(size.width(), size.height(), SerializableColor::white())
    }
}

impl Scene {
    /// Create a new empty scene.
    pub fn new(width: f64, height: f64, background: SerializableColor) -> Self {
        Self {
            shapes: HashMap::new(),
            z_order: Vec::new(),
            background,
            width,
            height,
        }
    }

    /// Add a shape on top of the scene.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id();
        if self.shapes.insert(id, shape).is_none() {
            self.z_order.push(id);
        }
        id
    }

    /// Remove a shape from the scene.
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Shape> {
        let shape = self.shapes.remove(&id)?;
        self.z_order.retain(|&shape_id| shape_id != id);
        Some(shape)
    }

    /// Swap a shape for another in the same z position.
    pub fn replace_shape(&mut self, id: ShapeId, shape: Shape) -> Option<Shape> {
        let old = self.shapes.remove(&id)?;
        let new_id = shape.id();
        if let Some(slot) = self.z_order.iter_mut().find(|s| **s == id) {
            *slot = new_id;
        }
        self.shapes.insert(new_id, shape);
        Some(old)
    }

    /// Clear all shapes from the scene.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.z_order.clear();
    }

    /// Get a shape by ID.
    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Get a mutable shape by ID.
    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(&id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.z_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z_order.is_empty()
    }

    /// Shapes in z-order (back to front).
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    /// Shapes under a point, topmost first. Only evented shapes are reported.
    pub fn shapes_at_point(&self, point: Point, tolerance: f64) -> Vec<ShapeId> {
        self.z_order
            .iter()
            .rev()
            .filter(|id| {
                self.shapes
                    .get(*id)
                    .is_some_and(|s| s.flags().evented && s.hit_test(point, tolerance))
            })
            .copied()
            .collect()
    }

    /// Encode the scene. Temporary shapes are left out.
    ///
    /// Derived geometry (arrow leaves) is recomputed from the authoritative
    /// fields on every call, so nothing stale can be written.
    pub fn to_portable(&self) -> Result<PortableScene, serde_json::Error> {
        let objects = self
            .shapes()
            .filter(|s| !s.is_temporary() && !s.flags().laser)
            .map(Shape::to_portable)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PortableScene {
            objects,
            background: self.background.to_hex(),
            canvas_width: self.width,
            canvas_height: self.height,
        })
    }

    /// Rebuild a scene, skipping every record the reviver rejects.
    pub fn from_portable(portable: &PortableScene, reviver: &dyn Reviver) -> Self {
        let background = SerializableColor::parse(&portable.background).unwrap_or_else(|| {
            log::warn!("Unknown page background '{}', using white", portable.background);
            SerializableColor::white()
        });
        let mut scene = Scene::new(portable.canvas_width, portable.canvas_height, background);
        for record in &portable.objects {
            if let Revived::Shape(shape) = reviver.revive(record) {
                scene.add_shape(shape);
            }
        }
        let skipped = portable.objects.len() - scene.len();
        if skipped > 0 {
            log::debug!("Revived {} shapes, skipped {}", scene.len(), skipped);
        }
        scene
    }
}
