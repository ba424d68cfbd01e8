use crate::context::{RenderContext, SetupContext};
use crate::fragment::{Fragment, FragmentFlags, FragmentShape, FRAGMENT_MAX_SIZE};
use crate::image::Image;
use crate::image_traverser::ImageTraverser;
use crate::packet::PACKET_MAX_SIZE;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use simple_error::{bail, SimpleResult};

#[derive(Default)]
struct ChannelTiles {
    xtiles: usize,
    ytiles: usize,
}

/// Splits the image into rectangular tiles, one tile per load balancer
/// assignment, and renders each tile as scan-line (or small square)
/// fragments.
pub struct TiledImageTraverser {
    xtilesize: usize,
    ytilesize: usize,
    shape: FragmentShape,
    channels: Vec<ChannelTiles>,
}

impl TiledImageTraverser {
    pub fn new(xtilesize: usize, ytilesize: usize) -> Self {
        TiledImageTraverser {
            xtilesize,
            ytilesize,
            shape: FragmentShape::Line,
            channels: Vec::new(),
        }
    }

    pub fn create(args: &[String]) -> SimpleResult<Box<dyn ImageTraverser>> {
        // Default keeps a tile at a few packets' worth of pixels.
        let default = 64.min(8 * (FRAGMENT_MAX_SIZE as f64).sqrt() as usize);
        let mut traverser = TiledImageTraverser::new(default, default);
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-tilesize" => {
                    let value = match iter.next() {
                        Some(value) => value,
                        None => bail!("-tilesize needs a WxH value"),
                    };
                    let (x, y) = parse_tile_size(value)?;
                    traverser.xtilesize = x;
                    traverser.ytilesize = y;
                }
                "-square" => traverser.shape = FragmentShape::Square,
                _ => bail!("unknown option for tiled image traverser: {}", arg),
            }
        }
        Ok(Box::new(traverser))
    }

    fn render_line_tile(
        &self,
        context: &RenderContext,
        image: &dyn Image,
        (xstart, xend): (usize, usize),
        (ystart, yend): (usize, usize),
        xres: usize,
        num_eyes: usize,
    ) {
        let mut frag = Fragment::new(
            FragmentShape::Line,
            FragmentFlags::CONSECUTIVE_X | FragmentFlags::CONSTANT_EYE,
        );
        let fsize = FRAGMENT_MAX_SIZE.min(xend - xstart);
        for eye in 0..num_eyes {
            for i in 0..fsize {
                frag.which_eye[i] = eye as u32;
            }
            if xend - xstart <= FRAGMENT_MAX_SIZE {
                // Common case, one fragment spans the tile's width; the
                // x row only needs writing once.
                let size = xend - xstart;
                for i in 0..size {
                    frag.pixel[0][i] = (xstart + i) as i32;
                }
                frag.set_size(size);
                for y in ystart..yend {
                    for i in 0..fsize {
                        frag.pixel[1][i] = y as i32;
                    }
                    reseed(context, xstart * xres + y);
                    context.pixel_sampler.render_fragment(context, &mut frag);
                    image.set(&frag);
                }
            } else {
                for y in ystart..yend {
                    for i in 0..fsize {
                        frag.pixel[1][i] = y as i32;
                    }
                    let mut x = xstart;
                    while x < xend {
                        let size = FRAGMENT_MAX_SIZE.min(xend - x);
                        for i in 0..size {
                            frag.pixel[0][i] = (x + i) as i32;
                        }
                        frag.set_size(size);
                        reseed(context, x * xres + y);
                        context.pixel_sampler.render_fragment(context, &mut frag);
                        image.set(&frag);
                        x += size;
                    }
                }
            }
        }
    }

    fn render_square_tile(
        &self,
        context: &RenderContext,
        image: &dyn Image,
        (xstart, xend): (usize, usize),
        (ystart, yend): (usize, usize),
        xres: usize,
        num_eyes: usize,
    ) {
        // Square fragments of about a packet's worth of pixels each.
        let sqrt_size = (PACKET_MAX_SIZE as f64).sqrt() as usize;
        let mut frag = Fragment::new(FragmentShape::Square, FragmentFlags::CONSTANT_EYE);
        for eye in 0..num_eyes {
            for i in 0..sqrt_size * sqrt_size {
                frag.which_eye[i] = eye as u32;
            }
            let mut y = ystart;
            while y < yend {
                let j_end = sqrt_size.min(yend - y);
                let mut x = xstart;
                while x < xend {
                    let i_end = sqrt_size.min(xend - x);
                    for j in 0..j_end {
                        for i in 0..i_end {
                            frag.pixel[0][j * i_end + i] = (x + i) as i32;
                            frag.pixel[1][j * i_end + i] = (y + j) as i32;
                        }
                    }
                    // A clipped block is no longer square.
                    frag.shape = if i_end == sqrt_size && j_end == sqrt_size {
                        FragmentShape::Square
                    } else {
                        FragmentShape::Unknown
                    };
                    frag.set_size(j_end * i_end);
                    reseed(context, x * xres + y);
                    context.pixel_sampler.render_fragment(context, &mut frag);
                    image.set(&frag);
                    x += sqrt_size;
                }
                y += sqrt_size;
            }
        }
    }
}

fn parse_tile_size(value: &str) -> SimpleResult<(usize, usize)> {
    let mut parts = value.splitn(2, 'x');
    let parse = |part: Option<&str>| -> SimpleResult<usize> {
        match part.map(|p| p.parse()) {
            Some(Ok(n)) if n > 0 => Ok(n),
            _ => bail!("bad tile size: {}", value),
        }
    };
    let x = parse(parts.next())?;
    let y = parse(parts.next())?;
    Ok((x, y))
}

// Per-tile reseed so a pixel's sample pattern does not depend on which
// worker drew it.
fn reseed(context: &RenderContext, seed: usize) {
    *context.rng.borrow_mut() = Pcg32::seed_from_u64(seed as u64);
}

impl ImageTraverser for TiledImageTraverser {
    fn setup_begin(&mut self, _context: &SetupContext, num_channels: usize) {
        self.channels = (0..num_channels).map(|_| ChannelTiles::default()).collect();
    }

    fn setup_display_channel(&mut self, context: &SetupContext) -> usize {
        let (_stereo, xres, yres) = context.resolution();
        let tiles = &mut self.channels[context.channel_index];
        tiles.xtiles = (xres + self.xtilesize - 1) / self.xtilesize;
        tiles.ytiles = (yres + self.ytilesize - 1) / self.ytilesize;
        tiles.xtiles * tiles.ytiles
    }

    fn setup_frame(&self, context: &RenderContext) {
        context.load_balancer.setup_frame(context);
        context.pixel_sampler.setup_frame(context);
    }

    fn render_image(&self, context: &RenderContext, image: &dyn Image) {
        let (stereo, xres, yres) = image.resolution();
        let num_eyes = if stereo { 2 } else { 1 };
        let ytiles = self.channels[context.channel_index].ytiles;

        while let Some(range) = context.load_balancer.next_assignment(context) {
            for assignment in range {
                let xtile = assignment / ytiles;
                let ytile = assignment % ytiles;
                let xstart = xtile * self.xtilesize;
                let xend = ((xtile + 1) * self.xtilesize).min(xres);
                let ystart = ytile * self.ytilesize;
                let yend = ((ytile + 1) * self.ytilesize).min(yres);

                match self.shape {
                    FragmentShape::Square => self.render_square_tile(
                        context,
                        image,
                        (xstart, xend),
                        (ystart, yend),
                        xres,
                        num_eyes,
                    ),
                    _ => self.render_line_tile(
                        context,
                        image,
                        (xstart, xend),
                        (ystart, yend),
                        xres,
                        num_eyes,
                    ),
                }
            }
        }
        // The frame barrier keeps this from being observed before the
        // other workers finish their tiles.
        if context.proc == 0 {
            image.set_valid(true);
        }
    }
}
