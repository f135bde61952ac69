use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::info;

use vertex_lighting::{build_draw_calls, LightingMode, Scene};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read scene {}", options.path.display()))?;
    let mut scene = Scene::from_xml(&xml)
        .with_context(|| format!("failed to parse scene {}", options.path.display()))?;
    if let Some(mode) = options.mode {
        scene = scene.with_mode(mode);
    }
    info!(
        "loaded {} with {} objects",
        options.path.display(),
        scene.objects.len()
    );

    let base_dir = options.path.parent().unwrap_or(Path::new("."));
    let calls = build_draw_calls(&scene, base_dir)?;

    println!(
        "Scene: {} objects, lighting={}",
        calls.len(),
        scene.light.mode
    );
    for call in &calls {
        let shaded = call.execute();
        let avg = shaded.average_color();
        println!(
            " - {}: {} vertices, {} triangles, avg color=({:.2}, {:.2}, {:.2}, {:.2})",
            call.name,
            shaded.vertices.len(),
            shaded.triangle_count(),
            avg.x,
            avg.y,
            avg.z,
            avg.w
        );
        if options.verbose {
            for (index, vertex) in shaded.vertices.iter().enumerate() {
                let clip = vertex.clip_position;
                let color = vertex.shaded_color;
                println!(
                    "   [{index}] clip=({:.3}, {:.3}, {:.3}, {:.3}) color=({:.3}, {:.3}, {:.3}, {:.3})",
                    clip.x, clip.y, clip.z, clip.w, color.x, color.y, color.z, color.w
                );
            }
        }
    }
    Ok(())
}

struct CliOptions {
    path: PathBuf,
    mode: Option<LightingMode>,
    verbose: bool,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut path = None;
        let mut mode = None;
        let mut verbose = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--mode" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--mode expects directional, point or unlit"))?;
                    mode = Some(value.parse()?);
                }
                "--verbose" => verbose = true,
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --mode or --verbose"
                    ));
                }
                other => {
                    if path.replace(PathBuf::from(other)).is_some() {
                        return Err(anyhow!("only one scene file may be given"));
                    }
                }
            }
        }
        let Some(path) = path else {
            return Err(anyhow!(
                "Usage: vertex-lighting <scene.xml> [--mode directional|point|unlit] [--verbose]"
            ));
        };
        Ok(Self {
            path,
            mode,
            verbose,
        })
    }
}
