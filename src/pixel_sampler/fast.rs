use crate::context::{RenderContext, SetupContext};
use crate::fragment::Fragment;
use crate::pixel_sampler::{render_single_fragment, ChannelScale, PixelSampler};

use simple_error::{bail, SimpleResult};

/// Like the single sampler but with square pixels and no depth output.
/// Cameras that assume a uniform image-space metric want this one.
pub struct FastSampler {
    channels: Vec<ChannelScale>,
}

impl FastSampler {
    pub fn new() -> Self {
        FastSampler {
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn PixelSampler>> {
        if let Some(arg) = args.first() {
            bail!("unknown option for fast sampler: {}", arg);
        }
        Ok(Box::new(FastSampler::new()))
    }
}

impl PixelSampler for FastSampler {
    fn setup_begin(&mut self, _context: &SetupContext, num_channels: usize) {
        self.channels = vec![ChannelScale::default(); num_channels];
    }

    fn setup_display_channel(&mut self, context: &SetupContext) {
        self.channels[context.channel_index] = ChannelScale::square(context);
    }

    fn setup_frame(&self, context: &RenderContext) {
        context.renderer.setup_frame(context);
    }

    fn render_fragment(&self, context: &RenderContext, fragment: &mut Fragment) {
        let scale = &self.channels[context.channel_index];
        render_single_fragment(scale, context, fragment, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::testutil::TestHarness;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::cell::RefCell;

    #[test]
    fn paints_pixels_without_touching_depth() {
        let fill = Color::gray(0.75);
        let harness = TestHarness::with_fill_color(fill);
        let mut sampler = FastSampler::new();
        let setup = harness.setup_context(0, 1, 1, 8, 8);
        sampler.setup_begin(&setup, 1);
        sampler.setup_display_channel(&setup);

        let frame = harness.frame_state(0);
        let rng = RefCell::new(Pcg32::seed_from_u64(0));
        let ctx = harness.render_context(0, 1, &frame, &rng);

        let mut fragment = Fragment::consecutive_x(0, 8, 2, 0);
        for i in fragment.begin()..fragment.end() {
            fragment.set_depth(i, -1.0);
        }
        sampler.render_fragment(&ctx, &mut fragment);
        for i in fragment.begin()..fragment.end() {
            assert_eq!(fragment.get_color(i), fill);
            assert_eq!(fragment.depth[i], -1.0);
        }
    }
}
