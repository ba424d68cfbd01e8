use crate::color::Color;
use crate::math::ray::Ray;
use crate::math::vector::Vec3f;

use bitflags::bitflags;

/// Number of rays a packet can carry. Sized so the hot arrays fit in a
/// few cache lines per field and SIMD-width loops divide it evenly.
pub const PACKET_MAX_SIZE: usize = 64;

/// Sentinel for a lane that hasn't hit anything.
pub const NO_MATERIAL: usize = usize::MAX;

/// Intersections closer than this are rejected (self-intersection guard).
pub const T_EPSILON: f32 = 1e-4;

/// The "no hit yet" distance.
pub const MAX_T: f32 = f32::INFINITY;

bitflags! {
    /// Records which optional per-ray fields currently hold valid data.
    /// Producers set the flags they fill, consumers assert the flags
    /// they need; the compute_* methods are no-ops when the flag is set.
    pub struct PacketFlags: u32 {
        const CONSTANT_ORIGIN          = 0x0000_0001;
        const CONSTANT_EYE             = 0x0000_0002;
        const HAVE_IMAGE_COORDINATES   = 0x0000_0004;
        const NORMALIZED_DIRECTIONS    = 0x0000_0008;
        const HAVE_HIT_POSITIONS       = 0x0000_0010;
        const ANY_HIT                  = 0x0000_0020;
        const HAVE_TEXCOORDS           = 0x0000_0040;
        const HAVE_INVERSE_DIRECTIONS  = 0x0000_0080;
        const HAVE_SIGNS               = 0x0000_0100;
        const CONSTANT_SIGNS           = 0x0000_0200;
        const HAVE_NORMALS             = 0x0000_0400;
        const DEBUG_PACKET             = 0x8000_0000;
    }
}

/// Whether the rays in a packet are known to come from a contiguous
/// scan line, a square tile, or some arbitrary grouping. Fast paths in
/// intersectors are only legal for the known shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PacketShape {
    Line,
    Square,
    Unknown,
}

/// The structure-of-arrays backing store for a ray packet. One of these
/// lives on each worker's stack per pipeline stage; a `RayPacket` is a
/// ranged view into it. Alignment keeps each lane array addressable by
/// aligned vector loads.
#[repr(align(16))]
pub struct RayPacketData {
    pub origin: [[f32; PACKET_MAX_SIZE]; 3],
    pub direction: [[f32; PACKET_MAX_SIZE]; 3],
    pub inverse_direction: [[f32; PACKET_MAX_SIZE]; 3],
    pub min_t: [f32; PACKET_MAX_SIZE],
    pub time: [f32; PACKET_MAX_SIZE],
    pub image: [[f32; PACKET_MAX_SIZE]; 2],
    pub hit_position: [[f32; PACKET_MAX_SIZE]; 3],
    pub normal: [[f32; PACKET_MAX_SIZE]; 3],
    pub tex_coords: [[f32; PACKET_MAX_SIZE]; 3],
    pub color: [[f32; PACKET_MAX_SIZE]; 3],
    pub importance: [[f32; PACKET_MAX_SIZE]; 3],
    pub which_eye: [u32; PACKET_MAX_SIZE],
    pub signs: [[u32; PACKET_MAX_SIZE]; 3],
    pub hit_matl: [usize; PACKET_MAX_SIZE],
}

impl RayPacketData {
    pub fn new() -> Self {
        RayPacketData {
            origin: [[0.0; PACKET_MAX_SIZE]; 3],
            direction: [[0.0; PACKET_MAX_SIZE]; 3],
            inverse_direction: [[0.0; PACKET_MAX_SIZE]; 3],
            min_t: [MAX_T; PACKET_MAX_SIZE],
            time: [0.0; PACKET_MAX_SIZE],
            image: [[0.0; PACKET_MAX_SIZE]; 2],
            hit_position: [[0.0; PACKET_MAX_SIZE]; 3],
            normal: [[0.0; PACKET_MAX_SIZE]; 3],
            tex_coords: [[0.0; PACKET_MAX_SIZE]; 3],
            color: [[0.0; PACKET_MAX_SIZE]; 3],
            importance: [[0.0; PACKET_MAX_SIZE]; 3],
            which_eye: [0; PACKET_MAX_SIZE],
            signs: [[0; PACKET_MAX_SIZE]; 3],
            hit_matl: [NO_MATERIAL; PACKET_MAX_SIZE],
        }
    }
}

/// A batch of rays moving through the pipeline together. Owned by one
/// worker for the duration of a render call; only lanes in
/// `[begin, end)` are live. Per-lane accessors do not bounds check
/// beyond the debug assertions -- staying in range is the caller's
/// contract.
pub struct RayPacket<'a> {
    pub data: &'a mut RayPacketData,
    shape: PacketShape,
    begin: usize,
    end: usize,
    depth: usize,
    flags: PacketFlags,
}

impl<'a> RayPacket<'a> {
    pub fn new(
        data: &'a mut RayPacketData,
        shape: PacketShape,
        begin: usize,
        end: usize,
        depth: usize,
        flags: PacketFlags,
    ) -> Self {
        assert!(begin <= end && end <= PACKET_MAX_SIZE);
        RayPacket {
            data,
            shape,
            begin,
            end,
            depth,
            flags,
        }
    }

    /// Re-borrows the same backing data over a sub-range. Used to shade
    /// runs of lanes that hit the same material. A subset of a square
    /// packet is not necessarily square, so the shape degrades.
    pub fn subset(&mut self, begin: usize, end: usize) -> RayPacket<'_> {
        debug_assert!(self.begin <= begin && begin <= end && end <= self.end);
        let shape = match self.shape {
            PacketShape::Square => PacketShape::Unknown,
            s => s,
        };
        RayPacket {
            data: self.data,
            shape,
            begin,
            end,
            depth: self.depth,
            flags: self.flags,
        }
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub fn shape(&self) -> PacketShape {
        self.shape
    }

    /// Narrows (or clears) the active range.
    pub fn resize(&mut self, begin: usize, end: usize) {
        assert!(begin <= end && end <= PACKET_MAX_SIZE);
        self.begin = begin;
        self.end = end;
    }

    // Flags:

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn get_flag(&self, flag: PacketFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: PacketFlags) {
        self.flags |= flag;
    }

    pub fn reset_flag(&mut self, flag: PacketFlags) {
        self.flags &= !flag;
    }

    pub fn set_all_flags(&mut self, flags: PacketFlags) {
        self.flags = flags;
    }

    // Image space:

    pub fn set_pixel(&mut self, which: usize, eye: u32, image_x: f32, image_y: f32) {
        self.data.image[0][which] = image_x;
        self.data.image[1][which] = image_y;
        self.data.which_eye[which] = eye;
    }

    pub fn image_coordinates(&self, which: usize, dim: usize) -> f32 {
        self.data.image[dim][which]
    }

    pub fn which_eye(&self, which: usize) -> u32 {
        self.data.which_eye[which]
    }

    // Rays:

    pub fn set_ray(&mut self, which: usize, ray: Ray) {
        self.set_origin(which, ray.org);
        self.set_direction(which, ray.dir);
    }

    pub fn ray(&self, which: usize) -> Ray {
        Ray::new(self.origin(which), self.direction(which))
    }

    pub fn set_origin(&mut self, which: usize, origin: Vec3f) {
        for i in 0..3 {
            self.data.origin[i][which] = origin[i];
        }
    }

    pub fn origin(&self, which: usize) -> Vec3f {
        Vec3f::new(
            self.data.origin[0][which],
            self.data.origin[1][which],
            self.data.origin[2][which],
        )
    }

    pub fn set_direction(&mut self, which: usize, direction: Vec3f) {
        for i in 0..3 {
            self.data.direction[i][which] = direction[i];
        }
        // Derived fields no longer match the stored direction.
        self.flags &= !(PacketFlags::NORMALIZED_DIRECTIONS
            | PacketFlags::HAVE_INVERSE_DIRECTIONS
            | PacketFlags::HAVE_SIGNS);
    }

    pub fn direction(&self, which: usize) -> Vec3f {
        Vec3f::new(
            self.data.direction[0][which],
            self.data.direction[1][which],
            self.data.direction[2][which],
        )
    }

    pub fn inverse_direction(&self, which: usize) -> Vec3f {
        Vec3f::new(
            self.data.inverse_direction[0][which],
            self.data.inverse_direction[1][which],
            self.data.inverse_direction[2][which],
        )
    }

    pub fn normalize_directions(&mut self) {
        if self.flags.contains(PacketFlags::NORMALIZED_DIRECTIONS) {
            return;
        }
        for i in self.begin..self.end {
            let len2 = self.data.direction[0][i] * self.data.direction[0][i]
                + self.data.direction[1][i] * self.data.direction[1][i]
                + self.data.direction[2][i] * self.data.direction[2][i];
            let scale = 1.0 / len2.sqrt();
            for j in 0..3 {
                self.data.direction[j][i] *= scale;
            }
            // Hit distances are parametric in the direction length, so
            // they must be rescaled along with it.
            self.data.min_t[i] /= scale;
        }
        self.flags |= PacketFlags::NORMALIZED_DIRECTIONS;
        self.flags &= !PacketFlags::HAVE_INVERSE_DIRECTIONS;
    }

    pub fn compute_inverse_directions(&mut self) {
        if self.flags.contains(PacketFlags::HAVE_INVERSE_DIRECTIONS) {
            return;
        }
        for i in self.begin..self.end {
            for j in 0..3 {
                self.data.inverse_direction[j][i] = 1.0 / self.data.direction[j][i];
            }
        }
        self.flags |= PacketFlags::HAVE_INVERSE_DIRECTIONS;
    }

    pub fn compute_signs(&mut self) {
        if self.flags.contains(PacketFlags::HAVE_SIGNS) || self.begin == self.end {
            return;
        }
        for i in self.begin..self.end {
            for j in 0..3 {
                self.data.signs[j][i] = (self.data.direction[j][i] < 0.0) as u32;
            }
        }
        self.flags |= PacketFlags::HAVE_SIGNS;
        self.flags &= !PacketFlags::CONSTANT_SIGNS;
        let first = [
            self.data.signs[0][self.begin],
            self.data.signs[1][self.begin],
            self.data.signs[2][self.begin],
        ];
        for i in self.begin + 1..self.end {
            for j in 0..3 {
                if self.data.signs[j][i] != first[j] {
                    return;
                }
            }
        }
        self.flags |= PacketFlags::CONSTANT_SIGNS;
    }

    pub fn sign(&self, which: usize, dim: usize) -> u32 {
        self.data.signs[dim][which]
    }

    // Hit state:

    pub fn reset_hits(&mut self) {
        self.reset_hits_to(MAX_T);
    }

    pub fn reset_hits_to(&mut self, max_t: f32) {
        for i in self.begin..self.end {
            self.data.hit_matl[i] = NO_MATERIAL;
            self.data.min_t[i] = max_t;
        }
        self.flags &= !PacketFlags::HAVE_HIT_POSITIONS;
    }

    pub fn reset_hit(&mut self, which: usize) {
        self.reset_hit_to(which, MAX_T);
    }

    pub fn reset_hit_to(&mut self, which: usize, max_t: f32) {
        self.data.hit_matl[which] = NO_MATERIAL;
        self.data.min_t[which] = max_t;
    }

    /// Records a hit if it is the closest seen so far for this lane.
    /// Returns whether the hit was taken.
    pub fn hit(&mut self, which: usize, t: f32, material: usize) -> bool {
        if t > T_EPSILON && t < self.data.min_t[which] {
            self.data.min_t[which] = t;
            self.data.hit_matl[which] = material;
            true
        } else {
            false
        }
    }

    pub fn was_hit(&self, which: usize) -> bool {
        self.data.hit_matl[which] != NO_MATERIAL
    }

    pub fn hit_material(&self, which: usize) -> usize {
        self.data.hit_matl[which]
    }

    pub fn min_t(&self, which: usize) -> f32 {
        self.data.min_t[which]
    }

    pub fn override_min_t(&mut self, which: usize, min_t: f32) {
        self.data.min_t[which] = min_t;
        self.flags &= !PacketFlags::HAVE_HIT_POSITIONS;
    }

    /// Derives hit point coordinates from origin + direction * min_t.
    /// Safe to call more than once; the flag memoizes the work.
    pub fn compute_hit_positions(&mut self) {
        if self.flags.contains(PacketFlags::HAVE_HIT_POSITIONS) {
            return;
        }
        for i in self.begin..self.end {
            for j in 0..3 {
                self.data.hit_position[j][i] =
                    self.data.origin[j][i] + self.data.direction[j][i] * self.data.min_t[i];
            }
        }
        self.flags |= PacketFlags::HAVE_HIT_POSITIONS;
    }

    pub fn hit_position(&self, which: usize) -> Vec3f {
        Vec3f::new(
            self.data.hit_position[0][which],
            self.data.hit_position[1][which],
            self.data.hit_position[2][which],
        )
    }

    // Normals (unit length; written by whatever accepted the hit):

    pub fn set_normal(&mut self, which: usize, normal: Vec3f) {
        for i in 0..3 {
            self.data.normal[i][which] = normal[i];
        }
    }

    pub fn normal(&self, which: usize) -> Vec3f {
        Vec3f::new(
            self.data.normal[0][which],
            self.data.normal[1][which],
            self.data.normal[2][which],
        )
    }

    // Texture coordinates:

    pub fn set_tex_coords(&mut self, which: usize, tc: Vec3f) {
        for i in 0..3 {
            self.data.tex_coords[i][which] = tc[i];
        }
    }

    pub fn tex_coords(&self, which: usize) -> Vec3f {
        Vec3f::new(
            self.data.tex_coords[0][which],
            self.data.tex_coords[1][which],
            self.data.tex_coords[2][which],
        )
    }

    // Final colors:

    pub fn set_color(&mut self, which: usize, color: Color) {
        self.data.color[0][which] = color.r;
        self.data.color[1][which] = color.g;
        self.data.color[2][which] = color.b;
    }

    pub fn color(&self, which: usize) -> Color {
        Color::new(
            self.data.color[0][which],
            self.data.color[1][which],
            self.data.color[2][which],
        )
    }

    // Importance (1 - attenuation) for ray tree pruning:

    pub fn set_importance(&mut self, which: usize, importance: Color) {
        self.data.importance[0][which] = importance.r;
        self.data.importance[1][which] = importance.g;
        self.data.importance[2][which] = importance.b;
    }

    pub fn importance(&self, which: usize) -> Color {
        Color::new(
            self.data.importance[0][which],
            self.data.importance[1][which],
            self.data.importance[2][which],
        )
    }

    /// Eye rays start with full importance.
    pub fn initialize_importance(&mut self) {
        for j in 0..3 {
            for i in self.begin..self.end {
                self.data.importance[j][i] = 1.0;
            }
        }
    }

    pub fn set_time(&mut self, which: usize, time: f32) {
        self.data.time[which] = time;
    }

    pub fn time(&self, which: usize) -> f32 {
        self.data.time[which]
    }
}
