pub mod palette;

use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;

pub use palette::ThemeColor;

const CACHE_ENTRIES: usize = 64;

/// Palettes already computed, keyed by cover path.
pub struct PaletteCache {
    entries: LruCache<String, Vec<ThemeColor>>,
}

impl Default for PaletteCache {
    fn default() -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(CACHE_ENTRIES).unwrap_or(NonZeroUsize::MIN)),
        }
    }
}

impl PaletteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached palette of at least `count` colours, trimmed to `count`.
    pub fn get(&mut self, cover: &str, count: usize) -> Option<Vec<ThemeColor>> {
        self.entries
            .get(cover)
            .filter(|colors| colors.len() >= count)
            .map(|colors| colors[..count].to_vec())
    }

    pub fn put(&mut self, cover: impl Into<String>, colors: Vec<ThemeColor>) {
        self.entries.put(cover.into(), colors);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Extract a palette off the async runtime. A cover of `None` or a failed
/// worker yields the fallback palette.
pub async fn extract(cover: Option<String>, count: usize) -> Vec<ThemeColor> {
    let Some(cover) = cover.filter(|c| !c.is_empty()) else {
        return palette::fallback(count);
    };
    let path = PathBuf::from(cover);
    tokio::task::spawn_blocking(move || palette::extract_from_path(&path, count))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("palette worker failed: {e}");
            palette::fallback(count)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use palette::FALLBACK;

    #[test]
    fn cache_trims_and_evicts() {
        let mut cache = PaletteCache::new();
        cache.put("/c/a.jpg", FALLBACK.to_vec());
        assert_eq!(cache.get("/c/a.jpg", 2).unwrap(), FALLBACK[..2].to_vec());
        assert!(cache.get("/c/a.jpg", 5).is_none());

        for i in 0..64 {
            cache.put(format!("/c/{i}.jpg"), vec![FALLBACK[0]]);
        }
        assert_eq!(cache.len(), 64);
        assert!(cache.get("/c/a.jpg", 1).is_none());
    }

    #[tokio::test]
    async fn no_cover_is_fallback() {
        assert_eq!(extract(None, 4).await, FALLBACK.to_vec());
        assert_eq!(extract(Some(String::new()), 2).await, FALLBACK[..2].to_vec());
        assert_eq!(extract(Some("/does/not/exist.png".into()), 4).await, FALLBACK.to_vec());
    }
}
