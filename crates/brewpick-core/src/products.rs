use serde::{Deserialize, Serialize};

/// Placeholder title used when the upstream record carries no usable name.
pub const PLACEHOLDER_TITLE: &str = "商品";

/// Upstream product identifier. Youzan returns numeric ids from most
/// endpoints but some list shapes carry them as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductId::Int(id) => write!(f, "{id}"),
            ProductId::Text(id) => f.write_str(id),
        }
    }
}

/// A product normalized from one of the heterogeneous upstream list shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Option<ProductId>,
    /// Never empty; falls back to [`PLACEHOLDER_TITLE`].
    pub title: String,
    pub desc: String,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    /// Display price exactly as upstream rendered it, e.g. `"12.00"`.
    pub price: Option<String>,
    /// Upstream SKU slug used to build in-app page paths.
    pub alias: Option<String>,
}

impl Product {
    /// The image URL, if present and non-blank. Products without one are
    /// never written to the catalog.
    #[must_use]
    pub fn usable_image_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// One persisted catalog record: the product plus local archive and
/// deep-link state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: Option<ProductId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    /// Empty only in hand-edited files; such entries are dropped on load.
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Local archived image name; absent when the download failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Resolved mini-program deep link, empty when unresolved.
    #[serde(default)]
    pub mini_program_url: String,
}

impl CatalogEntry {
    /// Builds an entry from a normalized product.
    ///
    /// Returns `None` if the product has no usable image URL.
    #[must_use]
    pub fn from_product(
        product: Product,
        filename: Option<String>,
        mini_program_url: String,
    ) -> Option<Self> {
        let image_url = product.usable_image_url()?.to_string();
        Some(Self {
            id: product.id,
            title: product.title,
            desc: product.desc,
            product_url: product.product_url,
            image_url,
            price: product.price,
            filename,
            alias: product.alias,
            mini_program_url,
        })
    }
}

/// On-disk shape of the catalog file: `{"products": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub products: Vec<CatalogEntry>,
}

impl CatalogDocument {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
