use std::ops::{Add, AddAssign, Mul};

pub const NUM_COMPONENTS: usize = 3;

/// An RGB color. Components are stored linearly; conversion for display
/// is the image's problem, not the pipeline's.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Color { r, g, b }
    }

    pub fn black() -> Self {
        Color {
            r: 0.0,
            g: 0.0,
            b: 0.0,
        }
    }

    pub fn gray(v: f32) -> Self {
        Color { r: v, g: v, b: v }
    }

    pub fn scale(self, s: f32) -> Self {
        Color {
            r: self.r * s,
            g: self.g * s,
            b: self.b * s,
        }
    }

    // Rec. 601 weights, same as the original used for importance cutoffs.
    pub fn luminance(self) -> f32 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }

    pub fn component(self, i: usize) -> f32 {
        match i {
            0 => self.r,
            1 => self.g,
            _ => self.b,
        }
    }
}

impl Add for Color {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Color {
            r: self.r + o.r,
            g: self.g + o.g,
            b: self.b + o.b,
        }
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, o: Self) {
        self.r += o.r;
        self.g += o.g;
        self.b += o.b;
    }
}

impl Mul for Color {
    type Output = Self;

    fn mul(self, o: Self) -> Self {
        Color {
            r: self.r * o.r,
            g: self.g * o.g,
            b: self.b * o.b,
        }
    }
}
