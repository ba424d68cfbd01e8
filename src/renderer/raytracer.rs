use crate::color::Color;
use crate::context::{RenderContext, SetupContext};
use crate::packet::{PacketFlags, RayPacket};
use crate::renderer::Renderer;

use log::trace;
use simple_error::{bail, SimpleResult};

/// The classic recursive ray tracer: intersect, group by material,
/// shade, with the background filling the misses.
pub struct Raytracer;

impl Raytracer {
    pub fn new() -> Self {
        Raytracer
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn Renderer>> {
        if let Some(arg) = args.first() {
            bail!("unknown option for raytracer: {}", arg);
        }
        Ok(Box::new(Raytracer::new()))
    }

    fn trace(&self, context: &RenderContext, rays: &mut RayPacket) {
        let debug = rays.get_flag(PacketFlags::DEBUG_PACKET);
        rays.reset_hits();
        context.scene.object().intersect(context, rays);

        // Shade runs of lanes that hit the same material with a single
        // call so packet-wide shaders stay packet-wide.
        let mut i = rays.begin();
        while i < rays.end() {
            if rays.was_hit(i) {
                let hit_matl = rays.hit_material(i);
                let mut end = i + 1;
                while end < rays.end() && rays.was_hit(end) && rays.hit_material(end) == hit_matl {
                    end += 1;
                }
                if debug {
                    rays.compute_hit_positions();
                    for j in i..end {
                        trace!(
                            "raytree: ray_index {} depth {} origin {:?} direction {:?} hitpos {:?}",
                            j,
                            rays.depth(),
                            rays.origin(j),
                            rays.direction(j),
                            rays.hit_position(j)
                        );
                    }
                }
                let mut sub = rays.subset(i, end);
                context.scene.material(hit_matl).shade(context, &mut sub);
                i = end;
            } else {
                let mut end = i + 1;
                while end < rays.end() && !rays.was_hit(end) {
                    end += 1;
                }
                if debug {
                    for j in i..end {
                        trace!(
                            "raytree: ray_index {} depth {} origin {:?} direction {:?} image ({}, {})",
                            j,
                            rays.depth(),
                            rays.origin(j),
                            rays.direction(j),
                            rays.image_coordinates(j, 0),
                            rays.image_coordinates(j, 1)
                        );
                    }
                }
                let mut sub = rays.subset(i, end);
                context.scene.background().shade(context, &mut sub);
                i = end;
            }
        }
    }
}

impl Renderer for Raytracer {
    fn setup_begin(&mut self, _context: &SetupContext, _num_channels: usize) {}

    fn setup_display_channel(&mut self, _context: &SetupContext) {}

    fn setup_frame(&self, _context: &RenderContext) {}

    fn trace_eye_rays(&self, context: &RenderContext, rays: &mut RayPacket) {
        debug_assert!(rays.get_flag(PacketFlags::HAVE_IMAGE_COORDINATES));
        context.camera.make_rays(context, rays);
        rays.initialize_importance();
        self.trace_rays(context, rays);
    }

    fn trace_rays(&self, context: &RenderContext, rays: &mut RayPacket) {
        // A zero cutoff still culls lanes whose importance has decayed
        // to nothing, so everything funnels through one path.
        self.trace_rays_cutoff(context, rays, 0.0);
    }

    fn trace_rays_cutoff(&self, context: &RenderContext, rays: &mut RayPacket, cutoff: f32) {
        let mut i = rays.begin();
        while i < rays.end() {
            if rays.importance(i).luminance() > cutoff {
                let mut end = i + 1;
                while end < rays.end() && rays.importance(end).luminance() > cutoff {
                    end += 1;
                }
                let mut sub = rays.subset(i, end);
                self.trace(context, &mut sub);
                i = end;
            } else {
                rays.set_color(i, Color::black());
                let mut end = i + 1;
                while end < rays.end() && rays.importance(end).luminance() <= cutoff {
                    rays.set_color(end, Color::black());
                    end += 1;
                }
                i = end;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeCamera;
    use crate::color::Color;
    use crate::context::{FrameState, RenderContext};
    use crate::load_balancer::SimpleLoadBalancer;
    use crate::math::vector::Vec3f;
    use crate::packet::{PacketFlags, PacketShape, RayPacket, RayPacketData};
    use crate::pixel_sampler::SingleSampler;
    use crate::scene::{ConstantBackground, FlatMaterial, Scene, Sphere};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::cell::RefCell;

    struct Fixture {
        scene: Scene,
        camera: PinholeCamera,
        load_balancer: SimpleLoadBalancer,
        pixel_sampler: SingleSampler,
        renderer: Raytracer,
    }

    // A sphere dead ahead with a flat red material over a blue
    // background.
    fn fixture() -> Fixture {
        let mut scene = Scene::new(
            Box::new(Sphere {
                center: Vec3f::zero(),
                radius: 1.0,
                material: 0,
            }),
            Box::new(ConstantBackground {
                color: Color::new(0.0, 0.0, 1.0),
            }),
        );
        scene.add_material(Box::new(FlatMaterial {
            color: Color::new(1.0, 0.0, 0.0),
        }));
        Fixture {
            scene,
            camera: PinholeCamera::new(
                Vec3f::new(0.0, 0.0, -5.0),
                Vec3f::zero(),
                Vec3f::new(0.0, 1.0, 0.0),
                60.0,
                1.0,
            ),
            load_balancer: SimpleLoadBalancer::new(),
            pixel_sampler: SingleSampler::new(),
            renderer: Raytracer::new(),
        }
    }

    fn context<'a>(
        fx: &'a Fixture,
        frame: &'a FrameState,
        rng: &'a RefCell<Pcg32>,
    ) -> RenderContext<'a> {
        RenderContext {
            channel_index: 0,
            proc: 0,
            num_procs: 1,
            frame_state: frame,
            load_balancer: &fx.load_balancer,
            pixel_sampler: &fx.pixel_sampler,
            renderer: &fx.renderer,
            camera: &fx.camera,
            scene: &fx.scene,
            rng,
        }
    }

    #[test]
    fn hits_shade_with_material_and_misses_with_background() {
        let fx = fixture();
        let frame = FrameState {
            frame_serial_number: 0,
            frame_time: 0.0,
        };
        let rng = RefCell::new(Pcg32::seed_from_u64(0));
        let ctx = context(&fx, &frame, &rng);

        let mut data = RayPacketData::new();
        let mut rays = RayPacket::new(
            &mut data,
            PacketShape::Unknown,
            0,
            2,
            0,
            PacketFlags::HAVE_IMAGE_COORDINATES,
        );
        // Lane 0 looks at the sphere, lane 1 looks off to the side.
        rays.set_pixel(0, 0, 0.0, 0.0);
        rays.set_pixel(1, 0, 0.95, 0.95);
        fx.renderer.trace_eye_rays(&ctx, &mut rays);

        assert_eq!(rays.color(0), Color::new(1.0, 0.0, 0.0));
        assert_eq!(rays.color(1), Color::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn cutoff_blacks_out_unimportant_lanes() {
        let fx = fixture();
        let frame = FrameState {
            frame_serial_number: 0,
            frame_time: 0.0,
        };
        let rng = RefCell::new(Pcg32::seed_from_u64(0));
        let ctx = context(&fx, &frame, &rng);

        let mut data = RayPacketData::new();
        let mut rays = RayPacket::new(&mut data, PacketShape::Unknown, 0, 3, 0, PacketFlags::empty());
        for i in 0..3 {
            rays.set_origin(i, Vec3f::new(0.0, 0.0, -5.0));
            rays.set_direction(i, Vec3f::new(0.0, 0.0, 1.0));
            rays.set_color(i, Color::new(0.5, 0.5, 0.5));
        }
        rays.set_importance(0, Color::gray(1.0));
        rays.set_importance(1, Color::gray(0.01));
        rays.set_importance(2, Color::gray(1.0));
        fx.renderer.trace_rays_cutoff(&ctx, &mut rays, 0.1);

        assert_eq!(rays.color(0), Color::new(1.0, 0.0, 0.0));
        assert_eq!(rays.color(1), Color::black());
        assert_eq!(rays.color(2), Color::new(1.0, 0.0, 0.0));
    }
}
