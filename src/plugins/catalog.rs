use std::sync::Arc;

use tracing::debug;

use super::Transform;
use super::geolocation::IpApiLocator;
use super::grayscale::Grayscale;
use super::median::MatrixMedian;
use super::overlay::MetadataOverlay;
use crate::ops::text::resolve_font;
use crate::settings::Settings;

struct Entry {
    transform: Arc<dyn Transform>,
    enabled: bool,
}

/// Named registry of transforms, each with an enable flag. Registration
/// order is preserved for listing.
#[derive(Default)]
pub struct TransformCatalog {
    entries: Vec<Entry>,
}

impl TransformCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the bundled transforms, with enable flags taken from
    /// `settings`.
    pub fn with_builtin(settings: &Settings) -> Self {
        let locator = IpApiLocator::new(settings.geolocation_url.clone(), settings.geolocation_timeout);
        let font = resolve_font(settings.font_path.as_deref());

        let mut catalog = Self::new();
        catalog.register(Arc::new(Grayscale));
        catalog.register(Arc::new(MatrixMedian));
        catalog.register(Arc::new(MetadataOverlay::new(Arc::new(locator), font)));
        for (name, &enabled) in &settings.transforms {
            if !catalog.set_enabled(name, enabled) {
                debug!(transform = %name, "setting refers to an unknown transform");
            }
        }
        catalog
    }

    /// Add a transform, enabled. A transform with the same name is replaced.
    pub fn register(&mut self, transform: Arc<dyn Transform>) {
        let entry = Entry {
            transform,
            enabled: true,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.transform.name() == entry.transform.name())
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Look up a registered transform regardless of its enable flag.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.entries
            .iter()
            .find(|e| e.transform.name() == name)
            .map(|e| e.transform.clone())
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.enabled && e.transform.name() == name)
    }

    /// Returns false when no transform has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.transform.name() == name) {
            Some(e) => {
                e.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.transform.name()).collect()
    }

    /// Enabled transforms in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = &Arc<dyn Transform>> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| &e.transform)
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

    #[test]
    fn builtin_catalog_lists_the_bundled_transforms() {
        let catalog = TransformCatalog::with_builtin(&Settings::default());
        assert_eq!(
            catalog.names(),
            vec!["Black&White", "MatrixMedian", "Data&Geolocation"]
        );
        assert_eq!(catalog.enabled().count(), 3);
        assert_eq!(catalog.get("MatrixMedian").unwrap().author(), "Vladimir");
        assert!(catalog.get("Sepia").is_none());
    }

    #[test]
    fn settings_disable_transforms() {
        let mut settings = Settings::default();
        settings.apply_override("transform.Black&White=false").unwrap();
        let mut catalog = TransformCatalog::with_builtin(&settings);
        assert!(!catalog.is_enabled("Black&White"));
        assert!(catalog.get("Black&White").is_some());
        assert_eq!(catalog.enabled().count(), 2);

        assert!(catalog.set_enabled("Black&White", true));
        assert!(catalog.is_enabled("Black&White"));
        assert!(!catalog.set_enabled("Sepia", true));
    }

    #[test]
    fn registering_a_duplicate_name_replaces() {
        let mut catalog = TransformCatalog::new();
        catalog.register(Arc::new(Grayscale));
        catalog.set_enabled("Black&White", false);
        catalog.register(Arc::new(Grayscale));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.is_enabled("Black&White"));
    }
}
