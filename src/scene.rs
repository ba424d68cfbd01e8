//! The pipeline's view of scene content. Geometry, materials, lights
//! and backgrounds are opaque capabilities behind narrow traits; the
//! small concrete types here exist so the demo and the tests have
//! something to trace, not to be a real shading system.

use crate::color::Color;
use crate::context::RenderContext;
use crate::math::vector::Vec3f;
use crate::packet::{PacketFlags, PacketShape, RayPacket, RayPacketData};

/// Anything that can be intersected by a ray packet. Implementations
/// record hits with `RayPacket::hit` and fill the normal lane for hits
/// they accept.
pub trait Object: Send + Sync {
    fn intersect(&self, context: &RenderContext, rays: &mut RayPacket);
}

/// Shades a run of lanes that all hit this material.
pub trait Material: Send + Sync {
    fn shade(&self, context: &RenderContext, rays: &mut RayPacket);
}

/// Shades lanes that hit nothing.
pub trait Background: Send + Sync {
    fn shade(&self, context: &RenderContext, rays: &mut RayPacket);
}

/// A light source: given a point, reports incoming radiance, the unit
/// direction toward the light and the distance to it.
pub trait Light: Send + Sync {
    fn compute_light(&self, context: &RenderContext, from: Vec3f) -> (Color, Vec3f, f32);
}

/// Aggregate handed to the pipeline. Materials live in a table so the
/// packet can record hits as plain indices instead of carrying
/// lifetimes through every stage.
pub struct Scene {
    object: Box<dyn Object>,
    materials: Vec<Box<dyn Material>>,
    lights: Vec<Box<dyn Light>>,
    background: Box<dyn Background>,
}

impl Scene {
    pub fn new(object: Box<dyn Object>, background: Box<dyn Background>) -> Self {
        Scene {
            object,
            materials: Vec::new(),
            lights: Vec::new(),
            background,
        }
    }

    pub fn add_material(&mut self, material: Box<dyn Material>) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_light(&mut self, light: Box<dyn Light>) {
        self.lights.push(light);
    }

    pub fn object(&self) -> &dyn Object {
        &*self.object
    }

    pub fn material(&self, id: usize) -> &dyn Material {
        &*self.materials[id]
    }

    pub fn lights(&self) -> &[Box<dyn Light>] {
        &self.lights
    }

    pub fn background(&self) -> &dyn Background {
        &*self.background
    }
}

// Concrete collaborators used by the demo scene and the tests.

/// A group of objects, intersected in order.
pub struct Group {
    objects: Vec<Box<dyn Object>>,
}

impl Group {
    pub fn new(objects: Vec<Box<dyn Object>>) -> Self {
        Group { objects }
    }
}

impl Object for Group {
    fn intersect(&self, context: &RenderContext, rays: &mut RayPacket) {
        for object in &self.objects {
            object.intersect(context, rays);
        }
    }
}

/// An object that is never hit. Handy for exercising the pipeline
/// without any geometry.
pub struct EmptyObject;

impl Object for EmptyObject {
    fn intersect(&self, _: &RenderContext, _: &mut RayPacket) {}
}

pub struct Sphere {
    pub center: Vec3f,
    pub radius: f32,
    pub material: usize,
}

impl Object for Sphere {
    fn intersect(&self, _context: &RenderContext, rays: &mut RayPacket) {
        for i in rays.begin()..rays.end() {
            let org = rays.origin(i) - self.center;
            let dir = rays.direction(i);
            let a = dir.length2();
            let b = org.dot(dir);
            let c = org.length2() - self.radius * self.radius;
            let disc = b * b - a * c;
            if disc < 0.0 {
                continue;
            }
            let sqrt_disc = disc.sqrt();
            // Near root first, far root if we start inside.
            for &t in &[(-b - sqrt_disc) / a, (-b + sqrt_disc) / a] {
                if rays.hit(i, t, self.material) {
                    let n = (org + dir.scale(t)).scale(1.0 / self.radius);
                    rays.set_normal(i, n);
                    break;
                }
            }
        }
    }
}

/// Uniform background color.
pub struct ConstantBackground {
    pub color: Color,
}

impl Background for ConstantBackground {
    fn shade(&self, _context: &RenderContext, rays: &mut RayPacket) {
        for i in rays.begin()..rays.end() {
            rays.set_color(i, self.color);
        }
    }
}

/// Flat shading: the hit color is the material color, no lights.
pub struct FlatMaterial {
    pub color: Color,
}

impl Material for FlatMaterial {
    fn shade(&self, _context: &RenderContext, rays: &mut RayPacket) {
        for i in rays.begin()..rays.end() {
            rays.set_color(i, self.color);
        }
    }
}

/// Diffuse shading with shadow rays toward every scene light. The
/// shadow rays go out as their own any-hit packet, one batch per
/// light, which is what keeps this on the packet fast path.
pub struct LambertianMaterial {
    pub albedo: Color,
}

impl Material for LambertianMaterial {
    fn shade(&self, context: &RenderContext, rays: &mut RayPacket) {
        rays.normalize_directions();
        rays.compute_hit_positions();

        let begin = rays.begin();
        let end = rays.end();
        let mut result = [Color::black(); crate::packet::PACKET_MAX_SIZE];

        for light in context.scene.lights() {
            let mut shadow_data = RayPacketData::new();
            let mut shadow = RayPacket::new(
                &mut shadow_data,
                PacketShape::Unknown,
                begin,
                end,
                rays.depth() + 1,
                PacketFlags::ANY_HIT,
            );
            let mut contribution = [Color::black(); crate::packet::PACKET_MAX_SIZE];
            for i in begin..end {
                let hit_pos = rays.hit_position(i);
                let normal = rays.normal(i);
                let (light_color, to_light, dist) = light.compute_light(context, hit_pos);
                let cosine = normal.dot(to_light);
                shadow.set_origin(i, hit_pos);
                shadow.set_direction(i, to_light);
                if cosine > 0.0 {
                    shadow.reset_hit_to(i, dist);
                    contribution[i] = (self.albedo * light_color).scale(cosine);
                } else {
                    // Facing away; mask the lane by giving it nothing
                    // to hit.
                    shadow.reset_hit_to(i, 0.0);
                }
            }
            context.scene.object().intersect(context, &mut shadow);
            for i in begin..end {
                if !shadow.was_hit(i) {
                    result[i] += contribution[i];
                }
            }
        }

        for i in begin..end {
            rays.set_color(i, result[i]);
        }
    }
}

pub struct PointLight {
    pub position: Vec3f,
    pub color: Color,
}

impl Light for PointLight {
    fn compute_light(&self, _context: &RenderContext, from: Vec3f) -> (Color, Vec3f, f32) {
        let to_light = self.position - from;
        let dist = to_light.length();
        (self.color, to_light.scale(1.0 / dist), dist)
    }
}
