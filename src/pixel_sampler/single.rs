use crate::context::{RenderContext, SetupContext};
use crate::fragment::Fragment;
use crate::pixel_sampler::{render_single_fragment, ChannelScale, PixelSampler};

use simple_error::{bail, SimpleResult};

/// One ray through the center of each pixel. The workhorse sampler for
/// interactive use.
pub struct SingleSampler {
    channels: Vec<ChannelScale>,
}

impl SingleSampler {
    pub fn new() -> Self {
        SingleSampler {
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn PixelSampler>> {
        if let Some(arg) = args.first() {
            bail!("unknown option for single sampler: {}", arg);
        }
        Ok(Box::new(SingleSampler::new()))
    }
}

impl PixelSampler for SingleSampler {
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
        render_single_fragment(scale, context, fragment, true);
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
    fn paints_every_pixel_of_the_fragment() {
        let fill = Color::new(0.1, 0.6, 0.9);
        let harness = TestHarness::with_fill_color(fill);
        let mut sampler = SingleSampler::new();
        let setup = harness.setup_context(0, 1, 1, 16, 16);
        sampler.setup_begin(&setup, 1);
        sampler.setup_display_channel(&setup);

        let frame = harness.frame_state(0);
        let rng = RefCell::new(Pcg32::seed_from_u64(0));
        let ctx = harness.render_context(0, 1, &frame, &rng);

        let mut fragment = Fragment::consecutive_x(0, 16, 5, 0);
        for i in fragment.begin()..fragment.end() {
            fragment.set_color(i, Color::new(1.0, 0.0, 0.0));
        }
        sampler.render_fragment(&ctx, &mut fragment);
        for i in fragment.begin()..fragment.end() {
            assert_eq!(fragment.get_color(i), fill);
        }
    }

    #[test]
    fn handles_scattered_fragments() {
        let fill = Color::gray(0.5);
        let harness = TestHarness::with_fill_color(fill);
        let mut sampler = SingleSampler::new();
        let setup = harness.setup_context(0, 1, 1, 8, 8);
        sampler.setup_begin(&setup, 1);
        sampler.setup_display_channel(&setup);

        let frame = harness.frame_state(0);
        let rng = RefCell::new(Pcg32::seed_from_u64(0));
        let ctx = harness.render_context(0, 1, &frame, &rng);

        use crate::fragment::{FragmentFlags, FragmentShape};
        let mut fragment = Fragment::new(FragmentShape::Unknown, FragmentFlags::empty());
        fragment.add_element(1, 1, 0);
        fragment.add_element(7, 3, 0);
        fragment.add_element(0, 6, 0);
        sampler.render_fragment(&ctx, &mut fragment);
        for i in fragment.begin()..fragment.end() {
            assert_eq!(fragment.get_color(i), fill);
        }
    }
}
