use crate::color::{Color, NUM_COMPONENTS};

use bitflags::bitflags;

pub const FRAGMENT_MAX_SIZE: usize = 64;

bitflags! {
    pub struct FragmentFlags: u32 {
        /// Pixels are consecutive in x (which implies a constant y).
        const CONSECUTIVE_X   = 0x01;
        const CONSTANT_EYE    = 0x02;
        const UNIFORM_SPACING = 0x04;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FragmentShape {
    Line,
    Square,
    Unknown,
}

/// A batch of pixels on the image side of the pipeline: the traverser
/// fills in positions, the pixel sampler fills in colors and depths,
/// and the image ingests the result. Fixed-size arrays so no fragment
/// ever allocates.
#[repr(align(16))]
pub struct Fragment {
    pub color: [[f32; FRAGMENT_MAX_SIZE]; NUM_COMPONENTS],
    pub depth: [f32; FRAGMENT_MAX_SIZE],
    pub pixel: [[i32; FRAGMENT_MAX_SIZE]; 2],
    pub which_eye: [u32; FRAGMENT_MAX_SIZE],

    pub shape: FragmentShape,
    pub flags: FragmentFlags,

    pixel_begin: usize,
    pixel_end: usize,
}

impl Fragment {
    pub fn new(shape: FragmentShape, flags: FragmentFlags) -> Self {
        Fragment {
            color: [[0.0; FRAGMENT_MAX_SIZE]; NUM_COMPONENTS],
            depth: [0.0; FRAGMENT_MAX_SIZE],
            pixel: [[0; FRAGMENT_MAX_SIZE]; 2],
            which_eye: [0; FRAGMENT_MAX_SIZE],
            shape,
            flags,
            pixel_begin: 0,
            pixel_end: 0,
        }
    }

    /// Builds a scan-line fragment covering `[xstart, xend)` at row `y`.
    pub fn consecutive_x(xstart: i32, xend: i32, y: i32, eye: u32) -> Self {
        let mut fragment = Fragment::new(FragmentShape::Line, FragmentFlags::empty());
        fragment.set_consecutive_x(xstart, xend, y, eye);
        fragment
    }

    pub fn set_consecutive_x(&mut self, xstart: i32, xend: i32, y: i32, eye: u32) {
        let nx = (xend - xstart) as usize;
        assert!(nx <= FRAGMENT_MAX_SIZE);
        for i in 0..nx {
            self.pixel[0][i] = xstart + i as i32;
            self.pixel[1][i] = y;
            self.which_eye[i] = eye;
        }
        self.shape = FragmentShape::Line;
        self.flags =
            FragmentFlags::CONSECUTIVE_X | FragmentFlags::CONSTANT_EYE | FragmentFlags::UNIFORM_SPACING;
        self.pixel_begin = 0;
        self.pixel_end = nx;
    }

    pub fn add_element(&mut self, x: i32, y: i32, eye: u32) {
        assert!(self.pixel_end < FRAGMENT_MAX_SIZE);
        self.pixel[0][self.pixel_end] = x;
        self.pixel[1][self.pixel_end] = y;
        self.which_eye[self.pixel_end] = eye;
        self.pixel_end += 1;
    }

    pub fn set_size(&mut self, size: usize) {
        debug_assert!(size <= FRAGMENT_MAX_SIZE);
        self.pixel_begin = 0;
        self.pixel_end = size;
    }

    pub fn reset_size(&mut self) {
        self.pixel_begin = 0;
        self.pixel_end = 0;
    }

    pub fn begin(&self) -> usize {
        self.pixel_begin
    }

    pub fn end(&self) -> usize {
        self.pixel_end
    }

    pub fn size(&self) -> usize {
        self.pixel_end - self.pixel_begin
    }

    pub fn get_flag(&self, flag: FragmentFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn x(&self, which: usize) -> i32 {
        self.pixel[0][which]
    }

    pub fn y(&self, which: usize) -> i32 {
        self.pixel[1][which]
    }

    pub fn eye(&self, which: usize) -> u32 {
        self.which_eye[which]
    }

    pub fn set_color(&mut self, which: usize, color: Color) {
        for i in 0..NUM_COMPONENTS {
            self.color[i][which] = color.component(i);
        }
    }

    pub fn get_color(&self, which: usize) -> Color {
        Color::new(self.color[0][which], self.color[1][which], self.color[2][which])
    }

    pub fn add_color(&mut self, which: usize, add: Color) {
        for i in 0..NUM_COMPONENTS {
            self.color[i][which] += add.component(i);
        }
    }

    pub fn scale_colors(&mut self, scale: f32) {
        for j in self.pixel_begin..self.pixel_end {
            for i in 0..NUM_COMPONENTS {
                self.color[i][j] *= scale;
            }
        }
    }

    pub fn set_depth(&mut self, which: usize, z: f32) {
        self.depth[which] = z;
    }

    /// Re-derives the CONSECUTIVE_X flag from the stored pixels, for
    /// fragments assembled element by element.
    pub fn test_set_consecutive_x(&mut self) {
        let mut passed = FragmentFlags::CONSECUTIVE_X;
        for i in self.pixel_begin + 1..self.pixel_end {
            if self.pixel[1][i] != self.pixel[1][i - 1] || self.pixel[0][i] - self.pixel[0][i - 1] != 1
            {
                passed = FragmentFlags::empty();
                break;
            }
        }
        self.flags = passed | (self.flags - FragmentFlags::CONSECUTIVE_X);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_x_fills_row() {
        let fragment = Fragment::consecutive_x(10, 14, 3, 0);
        assert_eq!(fragment.size(), 4);
        for i in 0..4 {
            assert_eq!(fragment.x(i), 10 + i as i32);
            assert_eq!(fragment.y(i), 3);
        }
        assert!(fragment.get_flag(FragmentFlags::CONSECUTIVE_X | FragmentFlags::CONSTANT_EYE));
    }

    #[test]
    fn test_set_consecutive_x_detects_gaps() {
        let mut fragment = Fragment::new(FragmentShape::Unknown, FragmentFlags::empty());
        fragment.add_element(0, 0, 0);
        fragment.add_element(1, 0, 0);
        fragment.add_element(3, 0, 0);
        fragment.test_set_consecutive_x();
        assert!(!fragment.get_flag(FragmentFlags::CONSECUTIVE_X));

        let mut fragment = Fragment::new(FragmentShape::Unknown, FragmentFlags::empty());
        fragment.add_element(5, 2, 0);
        fragment.add_element(6, 2, 0);
        fragment.test_set_consecutive_x();
        assert!(fragment.get_flag(FragmentFlags::CONSECUTIVE_X));
    }
}
