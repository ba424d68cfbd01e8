use crate::context::{RenderContext, SetupContext};
use crate::fragment::Fragment;
use crate::pixel_sampler::{factors_near_root, render_sampled_fragment, ChannelScale, PixelSampler};

use simple_error::{bail, SimpleResult};

/// A fixed grid of samples per pixel, averaged. Deterministic
/// antialiasing at a fixed cost.
pub struct RegularSampler {
    nx: usize,
    ny: usize,
    channels: Vec<ChannelScale>,
}

impl RegularSampler {
    pub fn new(num_samples: usize) -> Self {
        let (nx, ny) = factors_near_root(num_samples);
        RegularSampler {
            nx,
            ny,
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn PixelSampler>> {
        let num_samples = parse_num_samples(args, "regular sampler")?;
        Ok(Box::new(RegularSampler::new(num_samples)))
    }
}

pub(crate) fn parse_num_samples(args: &[String], who: &str) -> SimpleResult<usize> {
    let mut num_samples = 4;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-numberOfSamples" => {
                let value = match iter.next() {
                    Some(value) => value,
                    None => bail!("-numberOfSamples needs a value"),
                };
                num_samples = match value.parse() {
                    Ok(n) if n > 0 => n,
                    _ => bail!("bad sample count: {}", value),
                };
            }
            _ => bail!("unknown option for {}: {}", who, arg),
        }
    }
    Ok(num_samples)
}

impl PixelSampler for RegularSampler {
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
        render_sampled_fragment(scale, self.nx, self.ny, context, fragment, false);
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

    // A constant renderer makes the average trivially checkable even
    // when a pixel's samples straddle a packet boundary.
    #[test]
    fn averages_to_the_constant_color_across_packet_boundaries() {
        let fill = Color::new(0.2, 0.4, 0.8);
        let harness = TestHarness::with_fill_color(fill);
        // 4 samples over a 20 pixel fragment is 80 rays, which does not
        // fit one packet.
        let mut sampler = RegularSampler::new(4);
        let setup = harness.setup_context(0, 1, 1, 32, 32);
        sampler.setup_begin(&setup, 1);
        sampler.setup_display_channel(&setup);

        let frame = harness.frame_state(0);
        let rng = RefCell::new(Pcg32::seed_from_u64(0));
        let ctx = harness.render_context(0, 1, &frame, &rng);

        let mut fragment = Fragment::consecutive_x(0, 20, 7, 0);
        sampler.render_fragment(&ctx, &mut fragment);
        for i in fragment.begin()..fragment.end() {
            let got = fragment.get_color(i);
            assert!((got.r - fill.r).abs() < 1e-5);
            assert!((got.g - fill.g).abs() < 1e-5);
            assert!((got.b - fill.b).abs() < 1e-5);
        }
    }

    #[test]
    fn parses_sample_count() {
        let args = vec!["-numberOfSamples".to_string(), "9".to_string()];
        assert!(RegularSampler::create(&args).is_ok());
        let args = vec!["-numberOfSamples".to_string(), "0".to_string()];
        assert!(RegularSampler::create(&args).is_err());
        assert!(RegularSampler::create(&["-bogus".to_string()]).is_err());
    }
}
