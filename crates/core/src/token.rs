use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page pixel coordinates. Serialized on the
/// wire as `[x1, y1, x2, y2]`, matching the OCR collaborator's output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Whether the vertical extents of two boxes intersect.
    pub fn overlaps_vertically(&self, other: &BBox) -> bool {
        !(self.y2 < other.y1 || other.y2 < self.y1)
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One OCR-recognized word: the only primitive the extraction core consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub bbox: BBox,
    /// 1-based page number.
    pub page: u32,
    /// Recognition confidence (0.0 = unreadable, 1.0 = certain).
    pub confidence: f32,
}

impl Token {
    pub fn new(text: impl Into<String>, bbox: BBox, page: u32, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            page,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
