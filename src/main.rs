mod camera;
mod color;
mod context;
mod fragment;
mod image;
mod image_traverser;
mod load_balancer;
mod math;
mod packet;
mod pipeline;
mod pixel_sampler;
mod registry;
mod renderer;
mod scene;
mod task;
#[cfg(test)]
mod testutil;

use crate::camera::PinholeCamera;
use crate::color::Color;
use crate::image::Image;
use crate::math::vector::Vec3f;
use crate::pipeline::{Channel, PipelineParam, RenderStack};
use crate::scene::{
    ConstantBackground, FlatMaterial, Group, LambertianMaterial, PointLight, Scene, Sphere,
};

use log::{error, info};
use simple_error::{bail, SimpleResult};

struct Options {
    num_threads: usize,
    num_frames: u64,
    xres: usize,
    yres: usize,
    stereo: bool,
    load_balancer: String,
    pixel_sampler: String,
    renderer: String,
    image_traverser: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            num_threads: 1,
            num_frames: 1,
            xres: 512,
            yres: 512,
            stereo: false,
            load_balancer: "workqueue".to_string(),
            pixel_sampler: "singlesample".to_string(),
            renderer: "raytracer".to_string(),
            image_traverser: "tiled".to_string(),
        }
    }
}

fn usage() -> &'static str {
    "options:\n\
     \t-np <threads>            worker thread count\n\
     \t-frames <count>          frames to render\n\
     \t-res <WxH>               image resolution\n\
     \t-stereo                  render both eyes\n\
     \t-loadbalancer <spec>     cyclic | simple | workqueue(-granularity N)\n\
     \t-pixelsampler <spec>     singlesample | fastsample | regularsample | jittersample\n\
     \t-renderer <spec>         raytracer | null(-color r g b)\n\
     \t-imagetraverser <spec>   tiled(-tilesize WxH) (-square)"
}

fn parse_options(args: &[String]) -> SimpleResult<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = || -> SimpleResult<&String> {
            match iter.next() {
                Some(v) => Ok(v),
                None => bail!("{} needs a value", arg),
            }
        };
        match arg.as_str() {
            "-np" => {
                options.num_threads = match value()?.parse() {
                    Ok(n) if n > 0 => n,
                    _ => bail!("bad thread count"),
                }
            }
            "-frames" => {
                options.num_frames = match value()?.parse() {
                    Ok(n) if n > 0 => n,
                    _ => bail!("bad frame count"),
                }
            }
            "-res" => {
                let value = value()?;
                let mut parts = value.splitn(2, 'x');
                let mut dim = || -> SimpleResult<usize> {
                    match parts.next().map(|p| p.parse()) {
                        Some(Ok(n)) if n > 0 => Ok(n),
                        _ => bail!("bad resolution: {}", value),
                    }
                };
                options.xres = dim()?;
                options.yres = dim()?;
            }
            "-stereo" => options.stereo = true,
            "-loadbalancer" => options.load_balancer = value()?.clone(),
            "-pixelsampler" => options.pixel_sampler = value()?.clone(),
            "-renderer" => options.renderer = value()?.clone(),
            "-imagetraverser" => options.image_traverser = value()?.clone(),
            _ => bail!("unknown option: {}\n{}", arg, usage()),
        }
    }
    Ok(options)
}

// A couple of spheres on a big floor sphere, one point light. Enough
// to tell at a glance whether shading and shadows work.
fn demo_scene() -> Scene {
    let mut scene = Scene::new(
        Box::new(Group::new(vec![
            Box::new(Sphere {
                center: Vec3f::new(0.0, -1001.0, 0.0),
                radius: 1000.0,
                material: 0,
            }),
            Box::new(Sphere {
                center: Vec3f::new(-1.2, 0.0, 0.0),
                radius: 1.0,
                material: 1,
            }),
            Box::new(Sphere {
                center: Vec3f::new(1.2, 0.0, 0.0),
                radius: 1.0,
                material: 2,
            }),
        ])),
        Box::new(ConstantBackground {
            color: Color::new(0.3, 0.5, 0.9),
        }),
    );
    scene.add_material(Box::new(LambertianMaterial {
        albedo: Color::gray(0.6),
    }));
    scene.add_material(Box::new(LambertianMaterial {
        albedo: Color::new(0.8, 0.2, 0.2),
    }));
    scene.add_material(Box::new(FlatMaterial {
        color: Color::new(0.2, 0.8, 0.3),
    }));
    scene.add_light(Box::new(PointLight {
        position: Vec3f::new(5.0, 8.0, -6.0),
        color: Color::gray(1.0),
    }));
    scene
}

fn run(options: &Options) -> SimpleResult<()> {
    let scene = demo_scene();
    let camera = PinholeCamera::new(
        Vec3f::new(0.0, 1.5, -6.0),
        Vec3f::new(0.0, 0.0, 0.0),
        Vec3f::new(0.0, 1.0, 0.0),
        60.0,
        options.xres as f32 / options.yres as f32,
    );
    let mut stack = RenderStack::from_specs(
        &options.load_balancer,
        &options.pixel_sampler,
        &options.renderer,
        &options.image_traverser,
    )?;
    let param = PipelineParam {
        num_threads: options.num_threads,
        num_frames: options.num_frames,
        channels: vec![Channel {
            stereo: options.stereo,
            xres: options.xres,
            yres: options.yres,
        }],
    };
    let images = pipeline::render(&scene, &camera, &mut stack, &param)?;
    for (i, image) in images.iter().enumerate() {
        let (stereo, xres, yres) = image.resolution();
        // Mean luminance as a cheap sanity readout until a display
        // backend is wired up.
        let num_eyes = if stereo { 2 } else { 1 };
        let mut sum = 0.0;
        for eye in 0..num_eyes {
            for y in 0..yres {
                for x in 0..xres {
                    let p = image.pixel(x, y, eye);
                    sum += Color::new(p[0], p[1], p[2]).luminance() as f64;
                }
            }
        }
        info!(
            "channel {}: {}x{}, mean luminance {:.4}",
            i,
            xres,
            yres,
            sum / (xres * yres * num_eyes) as f64
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_options(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}\n{}", err, usage());
            std::process::exit(1);
        }
    };
    if let Err(err) = run(&options) {
        error!("{}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_command_line() {
        let args: Vec<String> = [
            "-np",
            "8",
            "-frames",
            "10",
            "-res",
            "640x480",
            "-loadbalancer",
            "workqueue(-granularity 4)",
            "-pixelsampler",
            "jittersample(-numberOfSamples 16)",
            "-imagetraverser",
            "tiled(-tilesize 16x16)",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let options = parse_options(&args).unwrap();
        assert_eq!(options.num_threads, 8);
        assert_eq!(options.num_frames, 10);
        assert_eq!(options.xres, 640);
        assert_eq!(options.yres, 480);
        assert_eq!(options.load_balancer, "workqueue(-granularity 4)");
    }

    #[test]
    fn rejects_nonsense() {
        let bad = |args: &[&str]| {
            let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            assert!(parse_options(&args).is_err());
        };
        bad(&["-np", "0"]);
        bad(&["-res", "640"]);
        bad(&["-frames"]);
        bad(&["--help"]);
    }
}
