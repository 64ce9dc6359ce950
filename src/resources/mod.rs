//! Handle-keyed store shared by the control thread and every job.
//!
//! - [`Image`] - f32 render targets
//! - models and [`Bvh`]s built over them
//! - [`ErrorLog`] - bounded list of script errors
//! - inventory - opaque byte blobs keyed by name
//!
//! Each table has its own lock. Lookups that miss report
//! `Nonexistent <kind>: <handle>` to the error log and return `None`.

mod error_log;
mod image;

pub use error_log::{ErrorLog, DEFAULT_ERROR_LOG_CAPACITY};
pub use image::Image;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::bvh::{Bvh, BvhOptions};
use crate::geom::Model;
use crate::util::{Error, Handle};

type Table<T> = RwLock<HashMap<Handle, T>>;

pub struct Resources {
    images: Table<Arc<Image>>,
    models: Table<Arc<Model>>,
    bvhs: Table<Arc<RwLock<Bvh>>>,
    inventory: RwLock<HashMap<String, Arc<[u8]>>>,
    errors: Mutex<ErrorLog>,
}

impl Resources {
    pub fn new(error_log_capacity: usize) -> Self {
        Self {
            images: RwLock::default(),
            models: RwLock::default(),
            bvhs: RwLock::default(),
            inventory: RwLock::default(),
            errors: Mutex::new(ErrorLog::new(error_log_capacity)),
        }
    }

    fn lookup<T: Clone>(&self, table: &Table<T>, kind: &'static str, handle: Handle) -> Option<T> {
        let found = table.read().get(&handle).cloned();
        if found.is_none() {
            self.report_error(Error::UnknownHandle { kind, handle }.to_string());
        }
        found
    }

    fn handles<T>(table: &Table<T>) -> Vec<Handle> {
        let mut handles: Vec<Handle> = table.read().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    pub fn add_image(&self, image: Image) -> Handle {
        let handle = image.id();
        self.images.write().insert(handle, Arc::new(image));
        handle
    }

    pub fn image(&self, handle: Handle) -> Option<Arc<Image>> {
        self.lookup(&self.images, "image", handle)
    }

    pub fn remove_image(&self, handle: Handle) -> bool {
        self.images.write().remove(&handle).is_some()
    }

    pub fn image_handles(&self) -> Vec<Handle> {
        Self::handles(&self.images)
    }

    // ------------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------------

    pub fn add_model(&self, model: Model) -> Handle {
        self.add_shared_model(Arc::new(model))
    }

    pub fn add_shared_model(&self, model: Arc<Model>) -> Handle {
        let handle = model.id();
        self.models.write().insert(handle, model);
        handle
    }

    pub fn model(&self, handle: Handle) -> Option<Arc<Model>> {
        self.lookup(&self.models, "model", handle)
    }

    /// Forget a model. BVHs built over it keep their own reference.
    pub fn remove_model(&self, handle: Handle) -> bool {
        self.models.write().remove(&handle).is_some()
    }

    pub fn model_handles(&self) -> Vec<Handle> {
        Self::handles(&self.models)
    }

    // ------------------------------------------------------------------------
    // BVHs
    // ------------------------------------------------------------------------

    /// Build a root-only BVH over a stored model.
    pub fn make_bvh(&self, model: Handle, options: BvhOptions) -> Option<Handle> {
        let model = self.lookup(&self.models, "model", model)?;
        Some(self.add_bvh(Bvh::with_options(model, options)))
    }

    pub fn add_bvh(&self, bvh: Bvh) -> Handle {
        let handle = bvh.id();
        self.bvhs.write().insert(handle, Arc::new(RwLock::new(bvh)));
        handle
    }

    pub fn bvh(&self, handle: Handle) -> Option<Arc<RwLock<Bvh>>> {
        self.lookup(&self.bvhs, "BVH", handle)
    }

    pub fn remove_bvh(&self, handle: Handle) -> bool {
        self.bvhs.write().remove(&handle).is_some()
    }

    pub fn bvh_handles(&self) -> Vec<Handle> {
        Self::handles(&self.bvhs)
    }

    // ------------------------------------------------------------------------
    // Error log
    // ------------------------------------------------------------------------

    /// Append to the error log. Empty messages are ignored; once the log is
    /// full further messages are dropped.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        tracing::error!("{message}");
        self.errors.lock().push(message);
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().entries().to_vec()
    }

    pub fn num_errors(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn clear_errors(&self) {
        self.errors.lock().clear();
    }

    pub fn error_log_capacity(&self) -> usize {
        self.errors.lock().capacity()
    }

    // ------------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------------

    /// Store a blob under `key`, replacing any previous one.
    pub fn inventory_add(&self, key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.inventory.write().insert(key.into(), bytes.into());
    }

    pub fn inventory_get(&self, key: &str) -> Option<Arc<[u8]>> {
        let found = self.inventory.read().get(key).cloned();
        if found.is_none() {
            self.report_error(format!("Nonexistent inventory item: {key}"));
        }
        found
    }

    pub fn inventory_contains(&self, key: &str) -> bool {
        self.inventory.read().contains_key(key)
    }

    pub fn inventory_clear(&self) {
        self.inventory.write().clear();
    }

    pub fn inventory_len(&self) -> usize {
        self.inventory.read().len()
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    #[test]
    fn test_miss_reports() {
        let res = Resources::new(8);
        assert!(res.image(424242).is_none());
        assert!(res.bvh(7).is_none());
        assert_eq!(res.errors(), vec!["Nonexistent image: 424242", "Nonexistent BVH: 7"]);
    }

    #[test]
    fn test_make_bvh() {
        let res = Resources::default();
        let model = res.add_model(Model::quad(Vec3::ZERO, Vec3::ONE, -1));
        let handle = res.make_bvh(model, BvhOptions::default()).unwrap();

        let bvh = res.bvh(handle).unwrap();
        assert_eq!(bvh.read().num_triangles(), 2);
        assert_eq!(bvh.read().id(), handle);

        // The BVH outlives the model's store entry.
        assert!(res.remove_model(model));
        assert_eq!(bvh.read().model().num_triangles(), 2);
        assert!(res.remove_bvh(handle));
        assert!(res.bvh_handles().is_empty());
    }

    #[test]
    fn test_make_bvh_unknown_model() {
        let res = Resources::default();
        assert!(res.make_bvh(99999, BvhOptions::default()).is_none());
        assert_eq!(res.num_errors(), 1);
    }

    #[test]
    fn test_inventory() {
        let res = Resources::default();
        res.inventory_add("seed", vec![1u8, 2, 3]);
        assert_eq!(res.inventory_get("seed").as_deref(), Some(&[1u8, 2, 3][..]));
        assert!(res.inventory_get("nope").is_none());
        assert_eq!(res.num_errors(), 1);

        res.inventory_clear();
        assert_eq!(res.inventory_len(), 0);
    }
}
