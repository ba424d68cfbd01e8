//! Pixel samplers turn fragments of pixel positions into eye rays and
//! fold the traced colors back into the fragment. They own the mapping
//! from integer pixels to the [-1, 1] image space cameras consume.

use crate::color::Color;
use crate::context::{RenderContext, SetupContext};
use crate::fragment::{Fragment, FragmentFlags};
use crate::math::vector::Vec2f;
use crate::packet::{PacketFlags, PacketShape, RayPacket, RayPacketData, PACKET_MAX_SIZE};

use rand::Rng;

pub mod fast;
pub mod jittered;
pub mod regular;
pub mod single;

pub use fast::FastSampler;
pub use jittered::JitteredSampler;
pub use regular::RegularSampler;
pub use single::SingleSampler;

pub trait PixelSampler: Send + Sync {
    /// Allocates per-channel state. Serial phase.
    fn setup_begin(&mut self, context: &SetupContext, num_channels: usize);

    /// Recomputes the image-space mapping for one channel's current
    /// resolution. Serial phase.
    fn setup_display_channel(&mut self, context: &SetupContext);

    /// Per-frame hook; forwards to the renderer so the whole chain gets
    /// its frame setup.
    fn setup_frame(&self, context: &RenderContext);

    /// Traces one fragment's worth of pixels and writes the resulting
    /// colors (and depths, where the sampler produces them) back.
    fn render_fragment(&self, context: &RenderContext, fragment: &mut Fragment);
}

/// Pixel-to-image-space mapping for one channel.
#[derive(Clone, Copy)]
pub(crate) struct ChannelScale {
    scale: Vec2f,
    offset: Vec2f,
}

impl Default for ChannelScale {
    fn default() -> Self {
        ChannelScale {
            scale: Vec2f::zero(),
            offset: Vec2f::zero(),
        }
    }
}

impl ChannelScale {
    fn with_scale(scale: Vec2f, xres: usize, yres: usize) -> Self {
        ChannelScale {
            scale,
            // Offset to the pixel center:
            offset: Vec2f {
                x: (-(xres as f32) / 2.0 + 0.5) * scale.x,
                y: (-(yres as f32) / 2.0 + 0.5) * scale.y,
            },
        }
    }

    /// Both axes span [-1, 1] independently; pixels are only square if
    /// the resolution is.
    pub fn rectangular(context: &SetupContext) -> Self {
        let (_stereo, xres, yres) = context.resolution();
        let scale = Vec2f {
            x: 2.0 / xres as f32,
            y: 2.0 / yres as f32,
        };
        Self::with_scale(scale, xres, yres)
    }

    /// Square pixels: x spans [-1, 1] and y takes whatever extent the
    /// aspect ratio gives it.
    pub fn square(context: &SetupContext) -> Self {
        let (_stereo, xres, yres) = context.resolution();
        let xscale = 2.0 / xres as f32;
        let scale = Vec2f {
            x: xscale,
            y: xscale,
        };
        Self::with_scale(scale, xres, yres)
    }

    pub fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale.x + self.offset.x,
            y * self.scale.y + self.offset.y,
        )
    }

    pub fn xscale(&self) -> f32 {
        self.scale.x
    }
}

/// Splits `n` into two factors as close to sqrt(n) as possible, for
/// laying a sample count out as a grid. Returns (nx, ny) with nx <= ny.
pub(crate) fn factors_near_root(n: usize) -> (usize, usize) {
    let mut nx = (n as f64).sqrt().floor() as usize;
    while nx > 1 && n % nx != 0 {
        nx -= 1;
    }
    (nx.max(1), n / nx.max(1))
}

fn eye_ray_flags(fragment: &Fragment) -> PacketFlags {
    let mut flags = PacketFlags::HAVE_IMAGE_COORDINATES;
    if fragment.get_flag(FragmentFlags::CONSTANT_EYE) {
        flags |= PacketFlags::CONSTANT_EYE;
    }
    flags
}

/// One centered sample per pixel, a packet's worth of pixels at a
/// time. `copy_depth` controls whether the traced minT lands in the
/// fragment's depth plane.
pub(crate) fn render_single_fragment(
    scale: &ChannelScale,
    context: &RenderContext,
    fragment: &mut Fragment,
    copy_depth: bool,
) {
    let flags = eye_ray_flags(fragment);
    let mut f = fragment.begin();
    while f < fragment.end() {
        let size = PACKET_MAX_SIZE.min(fragment.end() - f);
        let mut data = RayPacketData::new();
        let mut rays = RayPacket::new(&mut data, PacketShape::Unknown, 0, size, 0, flags);

        if fragment.get_flag(FragmentFlags::CONSECUTIVE_X | FragmentFlags::CONSTANT_EYE) {
            // Walk the scan line relative to the first pixel:
            let (mut px, py) = scale.to_image(fragment.x(f) as f32, fragment.y(f) as f32);
            let eye = fragment.eye(f);
            for i in 0..size {
                rays.set_pixel(i, eye, px, py);
                px += scale.xscale();
            }
        } else {
            for i in 0..size {
                let (px, py) = scale.to_image(
                    fragment.x(f + i) as f32,
                    fragment.y(f + i) as f32,
                );
                rays.set_pixel(i, fragment.eye(f + i), px, py);
            }
        }

        context.renderer.trace_eye_rays(context, &mut rays);

        for i in 0..size {
            fragment.set_color(f + i, rays.color(i));
            if copy_depth {
                fragment.set_depth(f + i, rays.min_t(i));
            }
        }
        f += size;
    }
}

/// Folds a packet of traced samples into per-pixel averages. A pixel's
/// samples may straddle a packet boundary; the partial sum carries over
/// through `samples_collected` and `current_fragment`.
fn accumulate_averages(
    fragment: &mut Fragment,
    rays: &RayPacket,
    num_samples: usize,
    samples_collected: &mut usize,
    current_fragment: &mut usize,
) {
    let inv = 1.0 / num_samples as f32;
    let mut collected = *samples_collected;
    let mut current = *current_fragment;
    let mut sum = Color::black();
    for i in rays.begin()..rays.end() {
        sum += rays.color(i);
        collected += 1;
        if collected == num_samples {
            fragment.add_color(current, sum.scale(inv));
            sum = Color::black();
            collected = 0;
            current += 1;
        }
    }
    // A partial sum is fine, the rest arrives with the next packet.
    if collected > 0 {
        fragment.add_color(current, sum.scale(inv));
    }
    *samples_collected = collected;
    *current_fragment = current;
}

/// An nx by ny grid of samples per pixel, optionally jittered within
/// each grid cell, averaged into the fragment color.
pub(crate) fn render_sampled_fragment(
    scale: &ChannelScale,
    nx: usize,
    ny: usize,
    context: &RenderContext,
    fragment: &mut Fragment,
    jitter: bool,
) {
    let flags = eye_ray_flags(fragment);
    let num_samples = nx * ny;
    let inx = 1.0 / nx as f32;
    let iny = 1.0 / ny as f32;

    let mut data = RayPacketData::new();
    let mut rays = RayPacket::new(&mut data, PacketShape::Unknown, 0, PACKET_MAX_SIZE, 0, flags);

    let mut sample_count = 0;
    let mut samples_collected = 0;
    let mut current_fragment = fragment.begin();

    for frag_index in fragment.begin()..fragment.end() {
        // Colors accumulate, so start from zero.
        fragment.set_color(frag_index, Color::black());
        let fx = fragment.x(frag_index) as f32;
        let fy = fragment.y(frag_index) as f32;
        let eye = fragment.eye(frag_index);

        for xs in 0..nx {
            for ys in 0..ny {
                let (jx, jy) = if jitter {
                    let mut rng = context.rng.borrow_mut();
                    (rng.gen::<f32>(), rng.gen::<f32>())
                } else {
                    (0.0, 0.0)
                };
                let (px, py) = scale.to_image(
                    fx + (xs as f32 + jx) * inx,
                    fy + (ys as f32 + jy) * iny,
                );
                rays.set_pixel(sample_count, eye, px, py);
                sample_count += 1;

                if sample_count == PACKET_MAX_SIZE {
                    rays.resize(0, sample_count);
                    context.renderer.trace_eye_rays(context, &mut rays);
                    accumulate_averages(
                        fragment,
                        &rays,
                        num_samples,
                        &mut samples_collected,
                        &mut current_fragment,
                    );
                    sample_count = 0;
                    rays.reset_hits();
                    rays.set_all_flags(flags);
                }
            }
        }
    }

    // Straggling samples:
    if sample_count > 0 {
        rays.resize(0, sample_count);
        context.renderer.trace_eye_rays(context, &mut rays);
        accumulate_averages(
            fragment,
            &rays,
            num_samples,
            &mut samples_collected,
            &mut current_fragment,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SetupContext;

    #[test]
    fn rectangular_scale_spans_minus_one_to_one() {
        let ctx = SetupContext::new(0, 1, 0, 1, false, 4, 2);
        let scale = ChannelScale::rectangular(&ctx);
        assert_eq!(scale.to_image(0.0, 0.0), (-0.75, -0.5));
        assert_eq!(scale.to_image(3.0, 1.0), (0.75, 0.5));
    }

    #[test]
    fn square_scale_uses_x_axis_for_both() {
        let ctx = SetupContext::new(0, 1, 0, 1, false, 4, 2);
        let scale = ChannelScale::square(&ctx);
        let (_, y0) = scale.to_image(0.0, 0.0);
        let (_, y1) = scale.to_image(0.0, 1.0);
        assert_eq!(y1 - y0, scale.xscale());
    }

    #[test]
    fn factors_near_root_prefers_square_grids() {
        assert_eq!(factors_near_root(1), (1, 1));
        assert_eq!(factors_near_root(4), (2, 2));
        assert_eq!(factors_near_root(6), (2, 3));
        assert_eq!(factors_near_root(7), (1, 7));
        assert_eq!(factors_near_root(12), (3, 4));
        assert_eq!(factors_near_root(16), (4, 4));
    }
}
