use crate::context::{RenderContext, SetupContext};
use crate::packet::RayPacket;
use crate::renderer::Renderer;

use crate::color::Color;

use simple_error::{bail, SimpleResult};

/// Paints every ray a constant color without touching the scene.
/// Benchmarks the pipeline overhead and anchors tests that only care
/// about which pixels got traced.
pub struct NullRenderer {
    color: Color,
}

impl NullRenderer {
    pub fn new(color: Color) -> Self {
        NullRenderer { color }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn Renderer>> {
        let mut color = Color::gray(0.5);
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-color" => {
                    let mut component = || -> SimpleResult<f32> {
                        match iter.next().map(|v| v.parse()) {
                            Some(Ok(c)) => Ok(c),
                            _ => bail!("-color needs three numbers"),
                        }
                    };
                    color = Color::new(component()?, component()?, component()?);
                }
                _ => bail!("unknown option for null renderer: {}", arg),
            }
        }
        Ok(Box::new(NullRenderer::new(color)))
    }

    fn fill(&self, rays: &mut RayPacket) {
        for i in rays.begin()..rays.end() {
            rays.set_color(i, self.color);
        }
    }
}

impl Renderer for NullRenderer {
    fn setup_begin(&mut self, _context: &SetupContext, _num_channels: usize) {}

    fn setup_display_channel(&mut self, _context: &SetupContext) {}

    fn setup_frame(&self, _context: &RenderContext) {}

    fn trace_eye_rays(&self, _context: &RenderContext, rays: &mut RayPacket) {
        self.fill(rays);
    }

    fn trace_rays(&self, _context: &RenderContext, rays: &mut RayPacket) {
        self.fill(rays);
    }

    fn trace_rays_cutoff(&self, _context: &RenderContext, rays: &mut RayPacket, _cutoff: f32) {
        self.fill(rays);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_parses_color() {
        let args: Vec<String> = ["-color", "0.1", "0.2", "0.3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(NullRenderer::create(&args).is_ok());
        let args: Vec<String> = ["-color", "0.1"].iter().map(|s| s.to_string()).collect();
        assert!(NullRenderer::create(&args).is_err());
        assert!(NullRenderer::create(&["-bogus".to_string()]).is_err());
    }
}
