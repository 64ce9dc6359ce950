//! Float image written concurrently by pixel jobs.

use parking_lot::RwLock;

use crate::util::{next_id, Handle, Vec3};

/// `width x height` image with `channels` f32 values per pixel.
///
/// Each row sits behind its own lock, so pixel jobs writing different rows
/// through a shared `Arc<Image>` never contend. Out-of-range coordinates panic.
#[derive(Debug)]
pub struct Image {
    id: Handle,
    width: u32,
    height: u32,
    channels: u32,
    rows: Vec<RwLock<Vec<f32>>>,
}

impl Image {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        let stride = width as usize * channels as usize;
        Self {
            id: next_id(),
            width,
            height,
            channels,
            rows: (0..height).map(|_| RwLock::new(vec![0.0; stride])).collect(),
        }
    }

    /// Three-channel image.
    pub fn rgb(width: u32, height: u32) -> Self {
        Self::new(width, height, 3)
    }

    #[inline]
    pub fn id(&self) -> Handle {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Row lock and offset within the row for `(x, y)`.
    fn locate(&self, x: u32, y: u32) -> (&RwLock<Vec<f32>>, usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}x{} image",
            self.width,
            self.height
        );
        (&self.rows[y as usize], x as usize * self.channels as usize)
    }

    /// Write up to `channels` values at `(x, y)`; extra values are ignored.
    pub fn set_pixel(&self, x: u32, y: u32, values: &[f32]) {
        let (row, start) = self.locate(x, y);
        let n = values.len().min(self.channels as usize);
        row.write()[start..start + n].copy_from_slice(&values[..n]);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec<f32> {
        let (row, start) = self.locate(x, y);
        row.read()[start..start + self.channels as usize].to_vec()
    }

    pub fn set_color(&self, x: u32, y: u32, color: Vec3) {
        self.set_pixel(x, y, &color.to_array());
    }

    /// First three channels as a color; missing channels read as zero.
    pub fn color(&self, x: u32, y: u32) -> Vec3 {
        let px = self.pixel(x, y);
        Vec3::new(
            px.first().copied().unwrap_or(0.0),
            px.get(1).copied().unwrap_or(0.0),
            px.get(2).copied().unwrap_or(0.0),
        )
    }

    /// Per-channel mean over the whole image.
    pub fn mean(&self) -> Vec<f32> {
        let channels = self.channels as usize;
        let mut sums = vec![0.0f64; channels];
        for row in &self.rows {
            for px in row.read().chunks_exact(channels.max(1)) {
                for (sum, &v) in sums.iter_mut().zip(px) {
                    *sum += v as f64;
                }
            }
        }
        let count = (self.width as usize * self.height as usize).max(1) as f64;
        sums.into_iter().map(|s| (s / count) as f32).collect()
    }

    /// Copy of the raw interleaved data, row by row.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.height as usize * self.width as usize * self.channels as usize);
        for row in &self.rows {
            out.extend_from_slice(&row.read());
        }
        out
    }
}
