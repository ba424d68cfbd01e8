use crate::camera::Camera;
use crate::load_balancer::LoadBalancer;
use crate::pixel_sampler::PixelSampler;
use crate::renderer::Renderer;
use crate::scene::Scene;

use rand_pcg::Pcg32;

use std::cell::RefCell;

/// Per-frame bookkeeping. Every worker derives its own copy from the
/// frame loop index after the frame barrier, so nothing here is shared
/// or mutated concurrently.
#[derive(Clone, Copy, Debug)]
pub struct FrameState {
    pub frame_serial_number: u64,
    pub frame_time: f64,
}

/// Configuration-time context, threaded through the setup_begin /
/// setup_display_channel calls. Built by the driver whenever the
/// pipeline or a channel's geometry changes.
pub struct SetupContext {
    pub channel_index: usize,
    pub num_channels: usize,
    pub proc: usize,
    pub num_procs: usize,

    stereo: bool,
    xres: usize,
    yres: usize,
    changed: bool,
}

impl SetupContext {
    pub fn new(
        channel_index: usize,
        num_channels: usize,
        proc: usize,
        num_procs: usize,
        stereo: bool,
        xres: usize,
        yres: usize,
    ) -> Self {
        SetupContext {
            channel_index,
            num_channels,
            proc,
            num_procs,
            stereo,
            xres,
            yres,
            changed: false,
        }
    }

    pub fn resolution(&self) -> (bool, usize, usize) {
        (self.stereo, self.xres, self.yres)
    }

    pub fn change_resolution(&mut self, stereo: bool, xres: usize, yres: usize) {
        if stereo != self.stereo || xres != self.xres || yres != self.yres {
            self.stereo = stereo;
            self.xres = xres;
            self.yres = yres;
            self.changed = true;
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn set_changed(&mut self, to: bool) {
        self.changed = to;
    }
}

/// Everything a worker needs while rendering one frame of one channel.
/// Immutable for the duration of the frame; constructed per worker by
/// the driver and passed by reference through every pipeline call. The
/// RNG cell is per-worker state (never crosses threads), reseeded by
/// the traverser per tile so results don't depend on tile order.
pub struct RenderContext<'a> {
    pub channel_index: usize,
    pub proc: usize,
    pub num_procs: usize,
    pub frame_state: &'a FrameState,
    pub load_balancer: &'a dyn LoadBalancer,
    pub pixel_sampler: &'a dyn PixelSampler,
    pub renderer: &'a dyn Renderer,
    pub camera: &'a dyn Camera,
    pub scene: &'a Scene,
    pub rng: &'a RefCell<Pcg32>,
}
