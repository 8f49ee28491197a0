// src/catalog.rs - Products supplied by the storefront
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TryOnError};

/// Time each product image stays on the sprite before the next one.
pub const IMAGE_CYCLE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub price: String,
}

impl Product {
    /// Image for the carousel position at `elapsed` since selection.
    pub fn image_at(&self, elapsed: Duration) -> Option<&str> {
        if self.images.is_empty() {
            return None;
        }
        let index = (elapsed.as_millis() / IMAGE_CYCLE.as_millis()) as usize % self.images.len();
        self.images.get(index).map(String::as_str)
    }
}

/// URI the image loaders understand for a catalog image reference. URLs
/// pass through; file paths become `file://` URIs, relative ones resolved
/// against `base_dir`.
pub fn image_uri(reference: &str, base_dir: Option<&Path>) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if reference.contains("://") {
        return Some(reference.to_string());
    }
    let path = Path::new(reference);
    let path = match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    };
    Some(format!("file://{}", path.display()))
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    selected: Option<usize>,
    /// Directory relative image paths are resolved against.
    base_dir: Option<PathBuf>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        let selected = if products.is_empty() { None } else { Some(0) };
        Self {
            products,
            selected,
            base_dir: None,
        }
    }

    /// Reads a JSON array of products.
    pub fn load(path: &Path) -> Result<Self> {
        let catalog_error = |reason: String| TryOnError::Catalog {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| catalog_error(e.to_string()))?;
        let products: Vec<Product> = serde_json::from_str(&content).map_err(|e| catalog_error(e.to_string()))?;
        info!("Loaded {} products from {}", products.len(), path.display());
        let mut catalog = Self::new(products);
        catalog.base_dir = path.parent().map(Path::to_path_buf);
        Ok(catalog)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn selected(&self) -> Option<&Product> {
        self.selected.and_then(|i| self.products.get(i))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Loader URI of the selected product's carousel image at `elapsed`.
    pub fn selected_image_uri(&self, elapsed: Duration) -> Option<String> {
        let reference = self.selected()?.image_at(elapsed)?;
        image_uri(reference, self.base_dir.as_deref())
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.products.len() {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(images: &[&str]) -> Product {
        Product {
            id: "alyans-1".into(),
            name: "Gold Band".into(),
            images: images.iter().map(|s| s.to_string()).collect(),
            price: "2,850.00".into(),
        }
    }

    #[test]
    fn carousel_cycles_every_three_seconds() {
        let product = ring(&["a.png", "b.png", "c.png"]);
        assert_eq!(product.image_at(Duration::from_millis(0)), Some("a.png"));
        assert_eq!(product.image_at(Duration::from_millis(2999)), Some("a.png"));
        assert_eq!(product.image_at(Duration::from_secs(3)), Some("b.png"));
        assert_eq!(product.image_at(Duration::from_secs(9)), Some("a.png"));
        assert_eq!(ring(&[]).image_at(Duration::from_secs(1)), None);
    }

    #[test]
    fn parses_product_list() {
        let products: Vec<Product> = serde_json::from_str(
            r#"[{"id": "1", "name": "Solitaire", "images": ["ring.png"], "price": "3,299.00"},
                {"id": "2", "name": "Band"}]"#,
        )
        .unwrap();
        let mut catalog = Catalog::new(products);
        assert_eq!(catalog.selected().map(|p| p.name.as_str()), Some("Solitaire"));
        assert!(catalog.select(1));
        assert!(catalog.selected().unwrap().images.is_empty());
        assert!(!catalog.select(5));
        assert_eq!(catalog.selected_index(), Some(1));
    }

    #[test]
    fn image_urls_reach_the_loader_unchanged() {
        let url = "https://cdn.example.com/rings/solitaire-1.png";
        assert_eq!(image_uri(url, Some(Path::new("/catalogs"))).as_deref(), Some(url));
        assert_eq!(image_uri("  ", None), None);
    }

    #[test]
    fn local_images_become_file_uris() {
        let base = Path::new("/catalogs");
        assert_eq!(
            image_uri("rings/band.png", Some(base)),
            Some(format!("file://{}", base.join("rings/band.png").display()))
        );
        assert_eq!(image_uri("/srv/band.png", Some(base)).as_deref(), Some("file:///srv/band.png"));
        assert_eq!(image_uri("band.png", None).as_deref(), Some("file://band.png"));
    }

    #[test]
    fn loaded_catalog_resolves_images_next_to_it() {
        let dir = std::env::temp_dir().join(format!("ring_tryon_catalog_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id": "1", "name": "Band", "images": ["band.png", "https://cdn.example.com/band-2.png"]}]"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(
            catalog.selected_image_uri(Duration::ZERO),
            Some(format!("file://{}", dir.join("band.png").display()))
        );
        assert_eq!(
            catalog.selected_image_uri(IMAGE_CYCLE).as_deref(),
            Some("https://cdn.example.com/band-2.png")
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_a_catalog_error() {
        let err = Catalog::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, TryOnError::Catalog { .. }));
    }
}
