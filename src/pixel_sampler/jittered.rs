use crate::context::{RenderContext, SetupContext};
use crate::fragment::Fragment;
use crate::pixel_sampler::regular::parse_num_samples;
use crate::pixel_sampler::{factors_near_root, render_sampled_fragment, ChannelScale, PixelSampler};

use simple_error::SimpleResult;

/// The regular grid with each sample jittered inside its cell, trading
/// aliasing for noise. Randomness comes from the per-worker stream so
/// frames stay reproducible for a given seed.
pub struct JitteredSampler {
    nx: usize,
    ny: usize,
    channels: Vec<ChannelScale>,
}

impl JitteredSampler {
    pub fn new(num_samples: usize) -> Self {
        let (nx, ny) = factors_near_root(num_samples);
        JitteredSampler {
            nx,
            ny,
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn PixelSampler>> {
        let num_samples = parse_num_samples(args, "jittered sampler")?;
        Ok(Box::new(JitteredSampler::new(num_samples)))
    }
}

impl PixelSampler for JitteredSampler {
    fn setup_begin(&mut self, _context: &SetupContext, num_channels: usize) {
        self.channels = vec![ChannelScale::default(); num_channels];
    }

    fn setup_display_channel(&mut self, context: &SetupContext) {
        self.channels[context.channel_index] = ChannelScale::rectangular(context);
    }

    fn setup_frame(&self, context: &RenderContext) {
        context.renderer.setup_frame(context);
    }

    fn render_fragment(&self, context: &RenderContext, fragment: &mut Fragment) {
        let scale = &self.channels[context.channel_index];
        render_sampled_fragment(scale, self.nx, self.ny, context, fragment, true);
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
    fn constant_scene_still_averages_to_the_constant() {
        let fill = Color::gray(0.3);
        let harness = TestHarness::with_fill_color(fill);
        let mut sampler = JitteredSampler::new(4);
        let setup = harness.setup_context(0, 1, 1, 16, 16);
        sampler.setup_begin(&setup, 1);
        sampler.setup_display_channel(&setup);

        let frame = harness.frame_state(0);
        let rng = RefCell::new(Pcg32::seed_from_u64(17));
        let ctx = harness.render_context(0, 1, &frame, &rng);

        let mut fragment = Fragment::consecutive_x(0, 8, 0, 0);
        sampler.render_fragment(&ctx, &mut fragment);
        for i in fragment.begin()..fragment.end() {
            let got = fragment.get_color(i);
            assert!((got.r - fill.r).abs() < 1e-5);
        }
    }
}
