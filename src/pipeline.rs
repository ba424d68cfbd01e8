//! The frame pipeline: serial setup of the rendering stack, then a
//! barrier-synchronized worker pool that renders frames until told to
//! stop. One frame, per channel: everyone resets frame state, everyone
//! crosses the barrier, everyone pulls assignments until the channel is
//! drained.

use crate::camera::Camera;
use crate::context::{FrameState, RenderContext, SetupContext};
use crate::image::SimpleImage;
use crate::image_traverser::ImageTraverser;
use crate::load_balancer::LoadBalancer;
use crate::pixel_sampler::PixelSampler;
use crate::registry;
use crate::renderer::Renderer;
use crate::scene::Scene;

use core_affinity;
use crossbeam::thread;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use simple_error::{bail, SimpleResult};

use std::cell::RefCell;
use std::sync::Barrier;
use std::time::Instant;

// Nominal animation clock; interactive transactions would drive this
// from wall time instead.
const FRAME_RATE: f64 = 30.0;

/// The four swappable stages, picked by name through the registry or
/// assembled directly.
pub struct RenderStack {
    pub load_balancer: Box<dyn LoadBalancer>,
    pub pixel_sampler: Box<dyn PixelSampler>,
    pub renderer: Box<dyn Renderer>,
    pub image_traverser: Box<dyn ImageTraverser>,
}

impl RenderStack {
    pub fn from_specs(
        load_balancer: &str,
        pixel_sampler: &str,
        renderer: &str,
        image_traverser: &str,
    ) -> SimpleResult<Self> {
        Ok(RenderStack {
            load_balancer: registry::create_load_balancer(load_balancer)?,
            pixel_sampler: registry::create_pixel_sampler(pixel_sampler)?,
            renderer: registry::create_renderer(renderer)?,
            image_traverser: registry::create_image_traverser(image_traverser)?,
        })
    }
}

#[derive(Clone, Copy)]
pub struct Channel {
    pub stereo: bool,
    pub xres: usize,
    pub yres: usize,
}

pub struct PipelineParam {
    pub num_threads: usize,
    pub num_frames: u64,
    pub channels: Vec<Channel>,
}

/// Renders `num_frames` frames of every channel and returns the final
/// images, one per channel.
pub fn render(
    scene: &Scene,
    camera: &dyn Camera,
    stack: &mut RenderStack,
    param: &PipelineParam,
) -> SimpleResult<Vec<SimpleImage>> {
    if param.num_threads == 0 {
        bail!("need at least one worker");
    }
    if param.channels.is_empty() {
        bail!("need at least one display channel");
    }
    let num_procs = param.num_threads;
    let num_channels = param.channels.len();

    // Serial setup phase. Begin first, then per-channel geometry; the
    // traverser decides how much work each channel is, the load
    // balancer hears about it from us.
    let mut images = Vec::with_capacity(num_channels);
    for (channel_index, channel) in param.channels.iter().enumerate() {
        let context = SetupContext::new(
            channel_index,
            num_channels,
            0,
            num_procs,
            channel.stereo,
            channel.xres,
            channel.yres,
        );
        if channel_index == 0 {
            stack.image_traverser.setup_begin(&context, num_channels);
            stack.load_balancer.setup_begin(&context, num_channels);
            stack.pixel_sampler.setup_begin(&context, num_channels);
            stack.renderer.setup_begin(&context, num_channels);
        }
        let num_assignments = stack.image_traverser.setup_display_channel(&context);
        stack
            .load_balancer
            .setup_display_channel(&context, num_assignments);
        stack.pixel_sampler.setup_display_channel(&context);
        stack.renderer.setup_display_channel(&context);
        debug!(
            "channel {}: {}x{}{}, {} assignments",
            channel_index,
            channel.xres,
            channel.yres,
            if channel.stereo { " stereo" } else { "" },
            num_assignments
        );
        images.push(SimpleImage::new(channel.stereo, channel.xres, channel.yres));
    }

    let start = Instant::now();
    let barrier = Barrier::new(num_procs);

    // Thread binding, if the machine has a core per worker:
    let (bind_threads, core_ids) = match core_affinity::get_core_ids() {
        Some(ids) if ids.len() >= num_procs => (true, ids),
        _ => {
            if num_procs > 1 {
                warn!("not binding workers to cores ({} workers)", num_procs);
            }
            (false, Vec::new())
        }
    };
    let core_ids_ref = &core_ids;

    let stack_ref = &*stack;
    let images_ref = &images;

    if num_procs == 1 {
        if bind_threads {
            core_affinity::set_for_current(core_ids_ref[0]);
        }
        worker_loop(0, num_procs, scene, camera, stack_ref, images_ref, param, &barrier);
    } else {
        let barrier_ref = &barrier;
        thread::scope(move |s| {
            if bind_threads {
                core_affinity::set_for_current(core_ids_ref[0]);
            }
            for proc in 1..num_procs {
                s.spawn(move |_| {
                    if bind_threads {
                        core_affinity::set_for_current(core_ids_ref[proc]);
                    }
                    worker_loop(
                        proc,
                        num_procs,
                        scene,
                        camera,
                        stack_ref,
                        images_ref,
                        param,
                        barrier_ref,
                    );
                });
            }
            // The main thread is always worker 0:
            worker_loop(
                0,
                num_procs,
                scene,
                camera,
                stack_ref,
                images_ref,
                param,
                barrier_ref,
            );
        })
        .unwrap();
    }

    info!(
        "rendered {} frame(s) of {} channel(s) on {} worker(s) in {:.3?}",
        param.num_frames,
        num_channels,
        num_procs,
        start.elapsed()
    );
    Ok(images)
}

fn worker_loop(
    proc: usize,
    num_procs: usize,
    scene: &Scene,
    camera: &dyn Camera,
    stack: &RenderStack,
    images: &[SimpleImage],
    param: &PipelineParam,
    barrier: &Barrier,
) {
    let rng = RefCell::new(Pcg32::seed_from_u64(proc as u64));
    for frame in 0..param.num_frames {
        let frame_state = FrameState {
            frame_serial_number: frame,
            frame_time: frame as f64 / FRAME_RATE,
        };
        for (channel_index, image) in images.iter().enumerate() {
            let context = RenderContext {
                channel_index,
                proc,
                num_procs,
                frame_state: &frame_state,
                load_balancer: &*stack.load_balancer,
                pixel_sampler: &*stack.pixel_sampler,
                renderer: &*stack.renderer,
                camera,
                scene,
                rng: &rng,
            };
            // Nobody resets cursors while a straggler still claims
            // work from the previous frame.
            barrier.wait();
            stack.image_traverser.setup_frame(&context);
            // And nobody claims until every cursor is reset.
            barrier.wait();
            stack.image_traverser.render_image(&context, image);
        }
        if proc == 0 {
            debug!("frame {} done", frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeCamera;
    use crate::color::Color;
    use crate::image::Image;
    use crate::math::vector::Vec3f;
    use crate::renderer::NullRenderer;
    use crate::scene::{ConstantBackground, EmptyObject, FlatMaterial, Scene, Sphere};

    fn flat_scene() -> Scene {
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
        scene
    }

    fn camera() -> PinholeCamera {
        PinholeCamera::new(
            Vec3f::new(0.0, 0.0, -5.0),
            Vec3f::zero(),
            Vec3f::new(0.0, 1.0, 0.0),
            60.0,
            1.0,
        )
    }

    #[test]
    fn multithreaded_null_render_paints_everything() {
        let scene = Scene::new(
            Box::new(EmptyObject),
            Box::new(ConstantBackground {
                color: Color::black(),
            }),
        );
        let fill = Color::new(0.25, 0.5, 0.75);
        let mut stack = RenderStack::from_specs(
            "workqueue(-granularity 2)",
            "singlesample",
            "null",
            "tiled(-tilesize 8x8)",
        )
        .unwrap();
        stack.renderer = Box::new(NullRenderer::new(fill));
        let param = PipelineParam {
            num_threads: 4,
            num_frames: 3,
            channels: vec![Channel {
                stereo: false,
                xres: 40,
                yres: 24,
            }],
        };
        let images = render(&scene, &camera(), &mut stack, &param).unwrap();
        assert_eq!(images.len(), 1);
        let image = &images[0];
        assert!(image.is_valid());
        for y in 0..24 {
            for x in 0..40 {
                assert_eq!(image.pixel(x, y, 0), [fill.r, fill.g, fill.b]);
            }
        }
    }

    #[test]
    fn raytraced_sphere_lands_in_the_middle_of_the_image() {
        let scene = flat_scene();
        let mut stack =
            RenderStack::from_specs("simple", "singlesample", "raytracer", "tiled").unwrap();
        let param = PipelineParam {
            num_threads: 2,
            num_frames: 1,
            channels: vec![Channel {
                stereo: false,
                xres: 32,
                yres: 32,
            }],
        };
        let images = render(&scene, &camera(), &mut stack, &param).unwrap();
        let image = &images[0];
        // Center pixel sees the sphere, the corner sees background.
        assert_eq!(image.pixel(16, 16, 0), [1.0, 0.0, 0.0]);
        assert_eq!(image.pixel(0, 0, 0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn rejects_empty_configurations() {
        let scene = flat_scene();
        let mut stack =
            RenderStack::from_specs("simple", "singlesample", "null", "tiled").unwrap();
        let no_workers = PipelineParam {
            num_threads: 0,
            num_frames: 1,
            channels: vec![Channel {
                stereo: false,
                xres: 8,
                yres: 8,
            }],
        };
        assert!(render(&scene, &camera(), &mut stack, &no_workers).is_err());
        let no_channels = PipelineParam {
            num_threads: 1,
            num_frames: 1,
            channels: Vec::new(),
        };
        assert!(render(&scene, &camera(), &mut stack, &no_channels).is_err());
    }

    #[test]
    fn renders_multiple_channels_at_different_resolutions() {
        let scene = flat_scene();
        let fill = Color::gray(0.5);
        let mut stack =
            RenderStack::from_specs("cyclic", "fastsample", "null", "tiled(-tilesize 4x4)")
                .unwrap();
        stack.renderer = Box::new(NullRenderer::new(fill));
        let param = PipelineParam {
            num_threads: 3,
            num_frames: 2,
            channels: vec![
                Channel {
                    stereo: false,
                    xres: 16,
                    yres: 16,
                },
                Channel {
                    stereo: true,
                    xres: 12,
                    yres: 8,
                },
            ],
        };
        let images = render(&scene, &camera(), &mut stack, &param).unwrap();
        assert_eq!(images.len(), 2);
        for image in &images {
            let (stereo, xres, yres) = image.resolution();
            let num_eyes = if stereo { 2 } else { 1 };
            for eye in 0..num_eyes {
                for y in 0..yres {
                    for x in 0..xres {
                        assert_eq!(image.pixel(x, y, eye), [fill.r, fill.g, fill.b]);
                    }
                }
            }
        }
    }
}
