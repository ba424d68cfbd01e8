//! Shared scaffolding for unit tests: a minimal scene/camera/component
//! stack so contexts can be built without standing up the whole
//! pipeline.

use crate::camera::PinholeCamera;
use crate::color::Color;
use crate::context::{FrameState, RenderContext, SetupContext};
use crate::load_balancer::{LoadBalancer, SimpleLoadBalancer};
use crate::math::vector::Vec3f;
use crate::pixel_sampler::{PixelSampler, SingleSampler};
use crate::renderer::{NullRenderer, Renderer};
use crate::scene::{ConstantBackground, EmptyObject, Scene};

use rand_pcg::Pcg32;

use std::cell::RefCell;

pub struct TestHarness {
    scene: Scene,
    camera: PinholeCamera,
    load_balancer: Box<dyn LoadBalancer>,
    pixel_sampler: Box<dyn PixelSampler>,
    renderer: Box<dyn Renderer>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_fill_color(Color::gray(0.25))
    }

    /// Same stack, but the renderer paints this color instead of the
    /// default gray.
    pub fn with_fill_color(fill: Color) -> Self {
        TestHarness {
            scene: Scene::new(
                Box::new(EmptyObject),
                Box::new(ConstantBackground {
                    color: Color::black(),
                }),
            ),
            camera: PinholeCamera::new(
                Vec3f::new(0.0, 0.0, -5.0),
                Vec3f::zero(),
                Vec3f::new(0.0, 1.0, 0.0),
                60.0,
                1.0,
            ),
            load_balancer: Box::new(SimpleLoadBalancer::new()),
            pixel_sampler: Box::new(SingleSampler::new()),
            renderer: Box::new(NullRenderer::new(fill)),
        }
    }

    pub fn setup_context(
        &self,
        channel_index: usize,
        num_channels: usize,
        num_procs: usize,
        xres: usize,
        yres: usize,
    ) -> SetupContext {
        SetupContext::new(channel_index, num_channels, 0, num_procs, false, xres, yres)
    }

    /// Runs the serial setup phase over the harness stack for a single
    /// channel with the given amount of load balancer work.
    pub fn setup_stack(
        &mut self,
        num_procs: usize,
        xres: usize,
        yres: usize,
        num_assignments: usize,
    ) -> SetupContext {
        let ctx = self.setup_context(0, 1, num_procs, xres, yres);
        self.load_balancer.setup_begin(&ctx, 1);
        self.load_balancer.setup_display_channel(&ctx, num_assignments);
        self.pixel_sampler.setup_begin(&ctx, 1);
        self.pixel_sampler.setup_display_channel(&ctx);
        self.renderer.setup_begin(&ctx, 1);
        self.renderer.setup_display_channel(&ctx);
        ctx
    }

    pub fn frame_state(&self, frame: u64) -> FrameState {
        FrameState {
            frame_serial_number: frame,
            frame_time: frame as f64 / 30.0,
        }
    }

    pub fn render_context<'a>(
        &'a self,
        proc: usize,
        num_procs: usize,
        frame_state: &'a FrameState,
        rng: &'a RefCell<Pcg32>,
    ) -> RenderContext<'a> {
        RenderContext {
            channel_index: 0,
            proc,
            num_procs,
            frame_state,
            load_balancer: &*self.load_balancer,
            pixel_sampler: &*self.pixel_sampler,
            renderer: &*self.renderer,
            camera: &self.camera,
            scene: &self.scene,
            rng,
        }
    }
}
