//! scriptrace CLI - drive the worker pool and BVH builder from the shell.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use scriptrace::bvh::{build, split_sah, Ray};
use scriptrace::geom::{quad_triangles, Material, Model};
use scriptrace::jobs::{Batch, Job, Scheduler, ShadeSource, Status};
use scriptrace::resources::{Image, Resources};
use scriptrace::script::NativeHost;
use scriptrace::util::{Error, Vec3};
use scriptrace::Config;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut config_path: Option<PathBuf> = None;
    let mut filtered_args: Vec<&str> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            "--config" => match iter.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("Error: --config needs a path");
                    std::process::exit(1);
                }
            },
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let config = match &config_path {
        Some(path) => Config::load_or_default(path),
        None => {
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };

    let result = match filtered_args[0] {
        "bvh" | "b" => cmd_bvh(&config, filtered_args.get(1).copied()),

        "shade" | "s" => {
            if filtered_args.len() < 3 {
                eprintln!("Error: missing arguments");
                eprintln!("Usage: scriptrace-cli shade <width> <height>");
                std::process::exit(1);
            }
            cmd_shade(&config, filtered_args[1], filtered_args[2])
        }

        "run" | "r" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing script argument");
                eprintln!("Usage: scriptrace-cli run <script>");
                std::process::exit(1);
            }
            cmd_run(&config, Path::new(filtered_args[1]))
        }

        "config" | "c" => cmd_config(&config, filtered_args.get(1).map(Path::new)),

        "version" | "--version" => {
            print_version();
            Ok(())
        }

        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_thread_names(true));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Tracing subscriber already installed");
    }
}

fn print_version() {
    println!(
        "scriptrace {} (built {} {}, {})",
        env!("CARGO_PKG_VERSION"),
        scriptrace::BUILD_DATE,
        scriptrace::BUILD_TIME,
        scriptrace::BUILD_PROFILE
    );
}

fn print_help() {
    println!("scriptrace - worker pool and BVH toolkit");
    println!();
    println!("USAGE:");
    println!("    scriptrace-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    b, bvh    [n]                 Build a BVH over an n x n quad grid (default 8)");
    println!("    s, shade  <w> <h>             Shade a gradient on the worker pool");
    println!("    r, run    <script>            Run a command script on the worker pool");
    println!("    c, config [path]              Print effective config (and write it to path)");
    println!("    version                       Show version and build date");
    println!("    h, help                       Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose        Show debug output");
    println!("    -vv, --trace         Show trace output (very verbose)");
    println!("    -q, --quiet          Only show warnings and errors");
    println!("    --config <path>      Load config from a JSON file");
    println!();
    println!("SCRIPT COMMANDS:");
    println!("    echo <text>                   Print a line");
    println!("    set <key> <value>             Set a shared variable");
    println!("    grid <n>                      Build and report a BVH over an n x n grid");
    println!("    shade <w> <h> <shader>        Nested blocking batch (needs 2+ workers)");
    println!("    sleep <ms>                    Sleep on the worker");
    println!("    fail <message>                Raise a script error");
    println!();
    println!("SHADERS: gradient, uv, checker");
    println!();
    println!("ENVIRONMENT:");
    println!("    SCRIPTRACE_WORKERS   Worker count override");
    println!("    RUST_LOG             Log filter, overrides -v/-q");
}

// ============================================================================
// Scene helpers
// ============================================================================

/// `n x n` unit quads in the z=0 plane with an emissive patch in the middle.
fn quad_grid(n: usize) -> Model {
    let materials = vec![Material::named("floor"), Material::emissive("light", Vec3::splat(4.0))];
    let light = n / 2;

    let mut triangles = Vec::with_capacity(n * n * 2);
    for y in 0..n {
        for x in 0..n {
            let min = Vec3::new(x as f32, y as f32, 0.0);
            let material_id = if x == light && y == light { 1 } else { 0 };
            triangles.extend(quad_triangles(min, min + Vec3::new(1.0, 1.0, 0.0), material_id));
        }
    }
    Model::new(triangles, materials)
}

fn parse_arg<T: FromStr>(args: &[&str], index: usize, name: &str) -> scriptrace::Result<T> {
    let raw = args.get(index).ok_or_else(|| Error::script(format!("missing <{name}>")))?;
    raw.parse().map_err(|_| Error::script(format!("invalid <{name}>: {raw}")))
}

fn native_host() -> NativeHost {
    NativeHost::new()
        .shader("gradient", |p, ctx| {
            if let Some(img) = p.image.and_then(|h| ctx.resources().image(h)) {
                img.set_color(p.x, p.y, Vec3::new(p.u, p.v, 0.5));
            }
            Ok(())
        })
        .shader("uv", |p, ctx| {
            if let Some(img) = p.image.and_then(|h| ctx.resources().image(h)) {
                img.set_color(p.x, p.y, Vec3::new(p.u, p.v, 0.0));
            }
            Ok(())
        })
        .shader("checker", |p, ctx| {
            if let Some(img) = p.image.and_then(|h| ctx.resources().image(h)) {
                let on = ((p.x / 8) + (p.y / 8)) % 2 == 0;
                img.set_color(p.x, p.y, if on { Vec3::ONE } else { Vec3::ZERO });
            }
            Ok(())
        })
        .command("echo", |args, ctx| {
            println!("[worker {}] {}", ctx.worker(), args.join(" "));
            Ok(())
        })
        .command("sleep", |args, _| {
            let ms: u64 = parse_arg(args, 0, "ms")?;
            std::thread::sleep(Duration::from_millis(ms));
            Ok(())
        })
        .command("fail", |args, _| Err(Error::script(args.join(" "))))
        .command("grid", |args, ctx| {
            let n: usize = parse_arg(args, 0, "n")?;
            let resources = ctx.resources();
            let model = resources.add_model(quad_grid(n));
            let Some(handle) = resources.make_bvh(model, Default::default()) else {
                return Ok(());
            };
            if let Some(bvh) = resources.bvh(handle) {
                let mut bvh = bvh.write();
                let stats = split_sah(&mut bvh, &Default::default());
                println!(
                    "[worker {}] grid {n}: BVH {handle}, {} triangles, {} nodes, {} emitters",
                    ctx.worker(),
                    bvh.num_triangles(),
                    stats.nodes,
                    bvh.num_emitters()
                );
            }
            Ok(())
        })
        .command("shade", |args, ctx| {
            let w: u32 = parse_arg(args, 0, "w")?;
            let h: u32 = parse_arg(args, 1, "h")?;
            let shader = args.get(2).copied().unwrap_or("gradient");

            let image = ctx.resources().add_image(Image::rgb(w, h));
            ctx.shade(w, h, ShadeSource::Code(shader.to_string()), Some(image))?;
            if let Some(img) = ctx.resources().image(image) {
                println!("[worker {}] shaded {w}x{h} '{shader}', mean {:?}", ctx.worker(), img.mean());
            }
            Ok(())
        })
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_bvh(config: &Config, n: Option<&str>) -> anyhow::Result<()> {
    let n: usize = match n {
        Some(s) => s.parse().with_context(|| format!("invalid grid size: {s}"))?,
        None => 8,
    };

    let resources = Resources::new(config.error_log_capacity);
    let model = resources.add_model(quad_grid(n));

    let start = Instant::now();
    let handle = resources
        .make_bvh(model, config.bvh_options())
        .context("model vanished before BVH construction")?;
    let bvh = resources.bvh(handle).context("BVH vanished after construction")?;
    let mut bvh = bvh.write();
    let root_area = build::total_area(&bvh);
    let stats = split_sah(&mut bvh, &config.build);
    let elapsed = start.elapsed();

    println!("Grid:        {n} x {n}");
    println!("Triangles:   {}", bvh.num_triangles());
    println!("Emitters:    {}", bvh.num_emitters());
    println!("Nodes:       {}", stats.nodes);
    println!("Leaves:      {}", stats.leaves);
    println!("Max depth:   {}", stats.max_depth);
    println!("Root bbox:   {:?}", bvh.node(0).bbox);
    println!("Area ratio:  {:.2}", build::total_area(&bvh) / root_area.max(f32::EPSILON));
    println!("Build time:  {:.2?}", elapsed);

    let center = n as f32 * 0.5 + 0.25;
    let probe = Ray::new(Vec3::new(center, center, 5.0), Vec3::NEG_Z);
    match bvh.intersect(&probe, 0.0, f32::INFINITY) {
        Some(hit) => println!("Probe hit:   triangle {} at t={:.3}", hit.triangle, hit.t),
        None => println!("Probe hit:   none"),
    }
    Ok(())
}

fn cmd_shade(config: &Config, width: &str, height: &str) -> anyhow::Result<()> {
    let width: u32 = width.parse().with_context(|| format!("invalid width: {width}"))?;
    let height: u32 = height.parse().with_context(|| format!("invalid height: {height}"))?;

    let resources = Arc::new(Resources::new(config.error_log_capacity));
    let image = resources.add_image(Image::rgb(width, height));
    let pool = Scheduler::new(Arc::new(native_host()), Arc::clone(&resources), config)?;

    let start = Instant::now();
    pool.submit_batch(Batch::from_code(width, height, "gradient").with_image(image))?;

    let mut last = String::new();
    loop {
        let status = pool.status();
        if status == Status::Idle {
            break;
        }
        let line = status.to_string();
        if line != last {
            tracing::info!("{line}");
            last = line;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let img = resources.image(image).context("image vanished")?;
    println!("Shaded {width}x{height} on {} workers in {:.2?}", pool.num_workers(), start.elapsed());
    println!("Mean color: {:?}", img.mean());
    for stats in pool.worker_stats() {
        println!("  worker {:>2}: {} jobs", stats.id, stats.jobs_done);
    }
    report_errors(&resources)
}

fn cmd_run(config: &Config, script: &Path) -> anyhow::Result<()> {
    let resources = Arc::new(Resources::new(config.error_log_capacity));
    let pool = Scheduler::new(Arc::new(native_host()), Arc::clone(&resources), config)?;

    pool.submit_single(Job::run_script(script))?;
    pool.wait_idle();
    report_errors(&resources)
}

fn cmd_config(config: &Config, path: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    println!("Effective workers: {}", config.worker_count());
    if let Some(path) = path {
        config.save(path).with_context(|| format!("writing {}", path.display()))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn report_errors(resources: &Resources) -> anyhow::Result<()> {
    let errors = resources.errors();
    if errors.is_empty() {
        return Ok(());
    }
    for e in &errors {
        eprintln!("  {e}");
    }
    anyhow::bail!("{} script error(s)", errors.len())
}
