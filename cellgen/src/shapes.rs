//! Drawn layout geometry.

use arcstr::ArcStr;
use geometry::bbox::bounding_union;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::tech::Layer;

/// A rectangle on some layer, optionally tagged with the net it carries.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// The drawn rectangle.
    pub rect: Rect,
    /// The net carried by the shape.
    pub net: Option<ArcStr>,
}

impl Shape {
    /// Creates a shape carrying `net`.
    pub fn new(rect: Rect, net: impl Into<ArcStr>) -> Self {
        Self {
            rect,
            net: Some(net.into()),
        }
    }

    /// Returns `true` if the shape carries `net`.
    #[inline]
    pub fn is_net(&self, net: &str) -> bool {
        self.net.as_deref() == Some(net)
    }
}

/// A text annotation naming the net at a point.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// The layer the label is attached to.
    pub layer: Layer,
    /// The net name.
    pub text: ArcStr,
    /// The label location.
    pub at: Point,
    /// Whether the label marks a cell pin.
    pub pin: bool,
}

/// The layout of a cell, by layer.
///
/// Layers iterate in the order in which they were first drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shapes {
    layers: IndexMap<Layer, Vec<Shape>>,
    labels: Vec<Label>,
}

impl Shapes {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shape to `layer`.
    pub fn add(&mut self, layer: Layer, shape: Shape) {
        self.layers.entry(layer).or_default().push(shape);
    }

    /// Adds a net-tagged rectangle to `layer`.
    #[inline]
    pub fn add_rect(&mut self, layer: Layer, rect: Rect, net: impl Into<ArcStr>) {
        self.add(layer, Shape::new(rect, net));
    }

    /// Adds a label.
    pub fn add_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    /// The shapes on `layer`.
    pub fn shapes(&self, layer: Layer) -> &[Shape] {
        self.layers.get(&layer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Mutable access to the shapes on `layer`.
    pub fn shapes_mut(&mut self, layer: Layer) -> &mut Vec<Shape> {
        self.layers.entry(layer).or_default()
    }

    /// Iterates over every non-empty layer and its shapes.
    pub fn layers(&self) -> impl Iterator<Item = (Layer, &[Shape])> {
        self.layers
            .iter()
            .filter(|(_, shapes)| !shapes.is_empty())
            .map(|(layer, shapes)| (*layer, shapes.as_slice()))
    }

    /// All labels.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Replaces all labels.
    pub fn set_labels(&mut self, labels: Vec<Label>) {
        self.labels = labels;
    }

    /// The region covered by `layer`.
    pub fn region(&self, layer: Layer) -> Region {
        Region::from_rects(self.shapes(layer).iter().map(|s| s.rect)).merged()
    }

    /// The region covered by shapes of `net` on `layer`.
    pub fn net_region(&self, layer: Layer, net: &str) -> Region {
        Region::from_rects(
            self.shapes(layer)
                .iter()
                .filter(|s| s.is_net(net))
                .map(|s| s.rect),
        )
        .merged()
    }

    /// The nets drawn on `layer`, in drawing order.
    pub fn nets(&self, layer: Layer) -> Vec<ArcStr> {
        let mut nets: Vec<ArcStr> = Vec::new();
        for net in self.shapes(layer).iter().filter_map(|s| s.net.as_ref()) {
            if !nets.contains(net) {
                nets.push(net.clone());
            }
        }
        nets
    }

    /// The number of shapes on all layers.
    pub fn len(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing has been drawn.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Bbox for Shapes {
    fn bbox(&self) -> Option<Rect> {
        self.layers
            .values()
            .flatten()
            .fold(None, |acc, s| bounding_union(acc, Some(s.rect)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_regions_are_merged() {
        let mut shapes = Shapes::new();
        shapes.add_rect(Layer::Metal1, Rect::from_sides(0, 0, 50, 20), "a");
        shapes.add_rect(Layer::Metal1, Rect::from_sides(40, 0, 100, 20), "a");
        shapes.add_rect(Layer::Metal1, Rect::from_sides(0, 40, 100, 60), "b");
        assert_eq!(shapes.net_region(Layer::Metal1, "a").area(), 2000);
        assert_eq!(shapes.region(Layer::Metal1).area(), 4000);
        assert_eq!(shapes.nets(Layer::Metal1), vec!["a", "b"]);
        assert!(shapes.shapes(Layer::Metal2).is_empty());
        assert_eq!(shapes.bbox(), Some(Rect::from_sides(0, 0, 100, 60)));
        assert_eq!(shapes.len(), 3);
    }
}
