use crate::context::{RenderContext, SetupContext};
use crate::packet::RayPacket;

pub mod null;
pub mod raytracer;

pub use null::NullRenderer;
pub use raytracer::Raytracer;

/// Turns rays into colors. The sampler hands a renderer eye rays;
/// materials hand it secondary rays through the same interface.
pub trait Renderer: Send + Sync {
    fn setup_begin(&mut self, context: &SetupContext, num_channels: usize);
    fn setup_display_channel(&mut self, context: &SetupContext);
    fn setup_frame(&self, context: &RenderContext);

    /// Primary rays: the packet carries image coordinates, the camera
    /// has not run yet.
    fn trace_eye_rays(&self, context: &RenderContext, rays: &mut RayPacket);

    /// Secondary rays with directions already set.
    fn trace_rays(&self, context: &RenderContext, rays: &mut RayPacket);

    /// Secondary rays, skipping lanes whose importance has fallen to
    /// `cutoff` or below; those come back black.
    fn trace_rays_cutoff(&self, context: &RenderContext, rays: &mut RayPacket, cutoff: f32);
}
