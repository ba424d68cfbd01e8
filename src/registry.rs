//! Name-to-factory tables for the swappable pipeline components, so
//! the command line can pick implementations with strings like
//! `workqueue(-granularity 16)`.

use crate::image_traverser::{ImageTraverser, TiledImageTraverser};
use crate::load_balancer::{
    CyclicLoadBalancer, LoadBalancer, SimpleLoadBalancer, WorkQueueLoadBalancer,
};
use crate::pixel_sampler::{FastSampler, JitteredSampler, PixelSampler, RegularSampler, SingleSampler};
use crate::renderer::{NullRenderer, Raytracer, Renderer};

use once_cell::sync::Lazy;
use simple_error::{bail, SimpleResult};

use std::collections::HashMap;

type Factory<T> = fn(&[String]) -> SimpleResult<Box<T>>;

static LOAD_BALANCERS: Lazy<HashMap<&'static str, Factory<dyn LoadBalancer>>> = Lazy::new(|| {
    let mut map: HashMap<_, Factory<dyn LoadBalancer>> = HashMap::new();
    map.insert("cyclic", CyclicLoadBalancer::create as _);
    map.insert("simple", SimpleLoadBalancer::create as _);
    map.insert("workqueue", WorkQueueLoadBalancer::create as _);
    map
});

static PIXEL_SAMPLERS: Lazy<HashMap<&'static str, Factory<dyn PixelSampler>>> = Lazy::new(|| {
    let mut map: HashMap<_, Factory<dyn PixelSampler>> = HashMap::new();
    map.insert("singlesample", SingleSampler::create as _);
    map.insert("fastsample", FastSampler::create as _);
    map.insert("regularsample", RegularSampler::create as _);
    map.insert("jittersample", JitteredSampler::create as _);
    map
});

static RENDERERS: Lazy<HashMap<&'static str, Factory<dyn Renderer>>> = Lazy::new(|| {
    let mut map: HashMap<_, Factory<dyn Renderer>> = HashMap::new();
    map.insert("raytracer", Raytracer::create as _);
    map.insert("null", NullRenderer::create as _);
    map
});

static IMAGE_TRAVERSERS: Lazy<HashMap<&'static str, Factory<dyn ImageTraverser>>> =
    Lazy::new(|| {
        let mut map: HashMap<_, Factory<dyn ImageTraverser>> = HashMap::new();
        map.insert("tiled", TiledImageTraverser::create as _);
        map
    });

/// Splits `name(-opt value ...)` into the name and its argument list.
/// A bare `name` is fine too.
fn parse_spec(spec: &str) -> SimpleResult<(&str, Vec<String>)> {
    let spec = spec.trim();
    match spec.find('(') {
        None => Ok((spec, Vec::new())),
        Some(open) => {
            if !spec.ends_with(')') {
                bail!("unbalanced parentheses in spec: {}", spec);
            }
            let name = &spec[..open];
            let args = spec[open + 1..spec.len() - 1]
                .split_whitespace()
                .map(|s| s.to_string())
                .collect();
            Ok((name, args))
        }
    }
}

fn create_from<T: ?Sized>(
    table: &HashMap<&'static str, Factory<T>>,
    kind: &str,
    spec: &str,
) -> SimpleResult<Box<T>> {
    let (name, args) = parse_spec(spec)?;
    match table.get(name) {
        Some(factory) => factory(&args),
        None => {
            let mut known: Vec<_> = table.keys().copied().collect();
            known.sort_unstable();
            bail!("unknown {} \"{}\" (have: {})", kind, name, known.join(", "))
        }
    }
}

pub fn create_load_balancer(spec: &str) -> SimpleResult<Box<dyn LoadBalancer>> {
    create_from(&LOAD_BALANCERS, "load balancer", spec)
}

pub fn create_pixel_sampler(spec: &str) -> SimpleResult<Box<dyn PixelSampler>> {
    create_from(&PIXEL_SAMPLERS, "pixel sampler", spec)
}

pub fn create_renderer(spec: &str) -> SimpleResult<Box<dyn Renderer>> {
    create_from(&RENDERERS, "renderer", spec)
}

pub fn create_image_traverser(spec: &str) -> SimpleResult<Box<dyn ImageTraverser>> {
    create_from(&IMAGE_TRAVERSERS, "image traverser", spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_by_bare_name() {
        assert!(create_load_balancer("cyclic").is_ok());
        assert!(create_pixel_sampler("singlesample").is_ok());
        assert!(create_renderer("raytracer").is_ok());
        assert!(create_image_traverser("tiled").is_ok());
    }

    #[test]
    fn creates_with_argument_lists() {
        assert!(create_load_balancer("workqueue(-granularity 16)").is_ok());
        assert!(create_pixel_sampler("regularsample(-numberOfSamples 9)").is_ok());
        assert!(create_image_traverser("tiled(-tilesize 16x16)").is_ok());
    }

    #[test]
    fn unknown_names_and_bad_args_error_out() {
        assert!(create_load_balancer("roundrobin").is_err());
        assert!(create_renderer("pathtracer").is_err());
        assert!(create_load_balancer("workqueue(-granularity juice)").is_err());
        assert!(create_pixel_sampler("singlesample(-numberOfSamples 4)").is_err());
        assert!(create_image_traverser("tiled(-tilesize 16x16").is_err());
    }
}
