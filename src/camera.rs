use crate::context::RenderContext;
use crate::math::vector::Vec3f;
use crate::packet::{PacketFlags, RayPacket};

/// Generates world-space rays from the image coordinates a pixel
/// sampler wrote into the packet.
pub trait Camera: Send + Sync {
    /// Requires `HAVE_IMAGE_COORDINATES`; fills origins and directions
    /// for all active lanes.
    fn make_rays(&self, context: &RenderContext, rays: &mut RayPacket);
}

/// Classic pinhole projection. The basis is fixed at construction; an
/// interactive camera would rebuild it on navigation transactions,
/// which live outside the pipeline core.
pub struct PinholeCamera {
    eye: Vec3f,
    direction: Vec3f,
    u: Vec3f,
    v: Vec3f,
}

impl PinholeCamera {
    pub fn new(eye: Vec3f, lookat: Vec3f, up: Vec3f, hfov_degrees: f32, aspect: f32) -> Self {
        let direction = (lookat - eye).normalize();
        let half_width = (hfov_degrees.to_radians() / 2.0).tan();
        let u = direction.cross(up).normalize().scale(half_width);
        let v = u.cross(direction).normalize().scale(half_width / aspect);
        PinholeCamera {
            eye,
            direction,
            u,
            v,
        }
    }
}

impl Camera for PinholeCamera {
    fn make_rays(&self, _context: &RenderContext, rays: &mut RayPacket) {
        debug_assert!(rays.get_flag(PacketFlags::HAVE_IMAGE_COORDINATES));
        for i in rays.begin()..rays.end() {
            let x = rays.image_coordinates(i, 0);
            let y = rays.image_coordinates(i, 1);
            let dir = self.direction + self.u.scale(x) + self.v.scale(y);
            rays.set_origin(i, self.eye);
            rays.set_direction(i, dir);
        }
        // One eye point for the whole packet; directions are not unit.
        rays.set_flag(PacketFlags::CONSTANT_ORIGIN);
        rays.reset_flag(PacketFlags::NORMALIZED_DIRECTIONS);
    }
}
