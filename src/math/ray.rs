use crate::math::vector::Vec3f;

/// A single ray. The packet stores rays in structure-of-arrays form;
/// this is the convenience type for moving one in or out.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub org: Vec3f,
    pub dir: Vec3f,
}

impl Ray {
    pub fn new(org: Vec3f, dir: Vec3f) -> Self {
        Ray { org, dir }
    }

    pub fn point_at(self, t: f32) -> Vec3f {
        self.org + self.dir.scale(t)
    }
}
