use std::collections::HashMap;
use std::sync::Arc;

use crate::generation::GenerateOptions;
use crate::nested::Extraction;

struct CachedExtraction {
    version: u64,
    extraction: Arc<Extraction>,
}

/// Extractions keyed by document, rebuilt whenever the version changes.
///
/// Nothing depends on the cache for correctness; a miss rebuilds from text.
#[derive(Default)]
pub struct ExtractionCache {
    options: GenerateOptions,
    entries: HashMap<String, CachedExtraction>,
}

impl ExtractionCache {
    pub fn new(options: GenerateOptions) -> Self {
        ExtractionCache {
            options,
            entries: HashMap::new(),
        }
    }

    /// The cached extraction for `key` at exactly `version`.
    pub fn get(&self, key: &str, version: u64) -> Option<Arc<Extraction>> {
        self.entries
            .get(key)
            .filter(|entry| entry.version == version)
            .map(|entry| Arc::clone(&entry.extraction))
    }

    /// Return the extraction for `key` at `version`, building it from `text`
    /// if the cached one is missing or stale.
    pub fn get_or_build(&mut self, key: &str, version: u64, text: &str) -> Arc<Extraction> {
        if let Some(hit) = self.get(key, version) {
            tracing::trace!(key, version, "extraction cache hit");
            return hit;
        }

        tracing::debug!(key, version, "rebuilding extraction");
        let extraction = Arc::new(Extraction::build(text, key, &self.options));
        self.entries.insert(
            key.to_string(),
            CachedExtraction {
                version,
                extraction: Arc::clone(&extraction),
            },
        );
        extraction
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: &str = "<!-- @codeblock a.ts -->\n```\none\n```\n";
    const V2: &str = "<!-- @codeblock a.ts -->\n```\ntwo\n```\n";

    fn content(extraction: &Extraction) -> &str {
        &extraction.generation.files[0].content
    }

    #[test]
    fn same_version_reuses_extraction() {
        let mut cache = ExtractionCache::default();
        let first = cache.get_or_build("doc.md", 1, V1);
        // Text is ignored while the version is unchanged.
        let second = cache.get_or_build("doc.md", 1, V2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(content(&second), "one");
    }

    #[test]
    fn new_version_rebuilds() {
        let mut cache = ExtractionCache::default();
        cache.get_or_build("doc.md", 1, V1);
        let rebuilt = cache.get_or_build("doc.md", 2, V2);
        assert_eq!(content(&rebuilt), "two");
        assert!(cache.get("doc.md", 1).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_drops_entry() {
        let mut cache = ExtractionCache::default();
        cache.get_or_build("doc.md", 1, V1);
        assert!(cache.invalidate("doc.md"));
        assert!(!cache.invalidate("doc.md"));
        assert!(cache.is_empty());
    }
}
