use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Inclusive containment: points on the border count as inside.
    pub fn contains(&self, point: [f32; 2]) -> bool {
        point[0] >= self.x
            && point[0] <= self.x + self.width
            && point[1] >= self.y
            && point[1] <= self.y + self.height
    }
}

/// A titled bounding box on the canvas. Membership is geometric and computed
/// on demand; groups never store the nodes they contain.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub title: String,
    pub bounding: Rect,
}

impl Group {
    pub fn new(title: &str, bounding: Rect) -> Self {
        Self {
            title: title.to_string(),
            bounding,
        }
    }
}
