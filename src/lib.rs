//! # scriptrace
//!
//! Execution core of a scriptable path tracer: a fixed pool of worker
//! threads draining one FIFO job queue, and a bounding volume hierarchy
//! whose construction is driven step by step from outside.
//!
//! ## Modules
//!
//! - [`util`] - Errors, bounding boxes, id allocation
//! - [`geom`] - Triangles, materials and models
//! - [`bvh`] - BVH primitives, ray queries and a reference SAH splitter
//! - [`jobs`] - Jobs, batches and the worker pool
//! - [`script`] - Script host seam and a closure-backed host
//! - [`resources`] - Handle-keyed store, error log and inventory
//! - [`config`] - JSON configuration
//!
//! ## Example
//!
//! ```ignore
//! use scriptrace::prelude::*;
//!
//! let host = NativeHost::new().shader("flat", |p, ctx| {
//!     if let Some(img) = p.image.and_then(|h| ctx.resources().image(h)) {
//!         img.set_color(p.x, p.y, Vec3::new(p.u, p.v, 0.0));
//!     }
//!     Ok(())
//! });
//! let resources = Arc::new(Resources::default());
//! let image = resources.add_image(Image::rgb(64, 64));
//! let pool = Scheduler::new(Arc::new(host), resources, &Config::default())?;
//! pool.submit_batch(Batch::from_code(64, 64, "flat").with_image(image))?;
//! pool.wait_idle();
//! ```

pub mod bvh;
pub mod config;
pub mod geom;
pub mod jobs;
pub mod resources;
pub mod script;
pub mod util;

// Re-export commonly used types
pub use config::Config;
pub use util::{Error, Handle, Result};

/// Build date stamped by the build script.
pub const BUILD_DATE: &str = match option_env!("SCRIPTRACE_BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};
/// Build time stamped by the build script.
pub const BUILD_TIME: &str = match option_env!("SCRIPTRACE_BUILD_TIME") {
    Some(time) => time,
    None => "unknown",
};
/// Cargo profile the crate was built with.
pub const BUILD_PROFILE: &str = match option_env!("SCRIPTRACE_BUILD_PROFILE") {
    Some(profile) => profile,
    None => "unknown",
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bvh::{split_sah, BuildSettings, Bvh, BvhOptions, Hit, Node, PartitionTable, Ray};
    pub use crate::config::Config;
    pub use crate::geom::{Material, Model, Triangle, Vertex};
    pub use crate::jobs::{Batch, Dispatcher, Job, JobKind, ParallelParams, Scheduler, ShadeSource, Status};
    pub use crate::resources::{Image, Resources};
    pub use crate::script::{JobContext, NativeHost, ScriptHost, ShadeEnv};
    pub use crate::util::{BBox, Error, Handle, Result, Vec2, Vec3};
    pub use std::sync::Arc;
}
