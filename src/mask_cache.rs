//! Time-bounded cache of decoded segmentation masks.
//!
//! Overlay requests for consecutive slices of one sample all need the same segmentation mask.
//! Masks are kept for a fixed lifespan after insertion, with no explicit invalidation.
//!
//! Loads are single-flight per key: each key maps to a [OnceCell] and concurrent misses on the
//! same key wait for one download and decode. A failed load leaves the cell empty so the next
//! request for the key tries again.

use crate::error::FetcherError;
use crate::metrics::{MASK_CACHE_HITS, MASK_CACHE_MISSES};

use cached::{Cached, TimedCache};
use ndarray::Array3;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// A decoded mask volume shared between requests.
pub type Mask = Arc<Array3<u8>>;

/// Key of a mask: segmentation file link, `(rows, columns)` of one slice, number of slices.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MaskKey {
    /// Link to the segmentation file
    pub link: String,
    /// Shape of one slice
    pub output_shape: (usize, usize),
    /// Number of slices in the stack
    pub num_stacks: usize,
}

/// Outcome of a lookup. Waiting on another request's load counts as a hit.
#[derive(Debug, PartialEq)]
enum Lookup {
    Hit,
    Miss,
}

/// Cache of segmentation masks.
pub struct MaskCache {
    entries: Mutex<TimedCache<MaskKey, Arc<OnceCell<Mask>>>>,
}

impl MaskCache {
    /// Create an empty cache.
    ///
    /// # Arguments
    ///
    /// * `lifespan`: Seconds an entry is kept after insertion
    pub fn new(lifespan: u64) -> Self {
        Self {
            entries: Mutex::new(TimedCache::with_lifespan(lifespan)),
        }
    }

    /// Return the mask for a key, loading it on a miss.
    ///
    /// Expired entries of every key are evicted on each lookup.
    ///
    /// # Arguments
    ///
    /// * `key`: Mask key
    /// * `load`: Produces the mask when it is not cached
    pub async fn get_or_load<F, Fut>(&self, key: MaskKey, load: F) -> Result<Mask, FetcherError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Array3<u8>, FetcherError>>,
    {
        let (mask, lookup) = self.lookup(key, load).await?;
        match lookup {
            Lookup::Hit => MASK_CACHE_HITS.inc(),
            Lookup::Miss => MASK_CACHE_MISSES.inc(),
        }
        Ok(mask)
    }

    async fn lookup<F, Fut>(&self, key: MaskKey, load: F) -> Result<(Mask, Lookup), FetcherError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Array3<u8>, FetcherError>>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.flush();
            entries
                .cache_get_or_set_with(key, || Arc::new(OnceCell::new()))
                .clone()
        };
        let mut lookup = Lookup::Hit;
        let mask = cell
            .get_or_try_init(|| {
                lookup = Lookup::Miss;
                async move { load().await.map(Arc::new) }
            })
            .await?;
        Ok((mask.clone(), lookup))
    }

    /// Number of unexpired keys.
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.flush();
        entries.cache_size()
    }

    /// Whether the cache holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
