use std::path::{Path, PathBuf};

use crate::coords::check_variant_name;
use crate::error::Error;

/// Background page files at `{root}/{variant}/page{N}.pdf`. Templates are
/// only ever read.
pub struct TemplateStore {
    root: PathBuf,
}

pub fn template_path(root: &Path, variant: &str, page: u32) -> PathBuf {
    root.join(variant).join(format!("page{page}.pdf"))
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes of one background page. A missing or unreadable file is a
    /// configuration error.
    pub fn load(&self, variant: &str, page: u32) -> Result<Vec<u8>, Error> {
        check_variant_name(variant)?;
        let path = template_path(&self.root, variant, page);
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::config(format!(
                "missing background template {variant}/page{page} ({}): {e}",
                path.display()
            ))
        })?;
        if !bytes.starts_with(b"%PDF") {
            return Err(Error::config(format!(
                "background template {} is not a PDF",
                path.display()
            )));
        }
        Ok(bytes)
    }

    pub fn load_variant(&self, variant: &str, pages: u32) -> Result<Vec<Vec<u8>>, Error> {
        (1..=pages).map(|p| self.load(variant, p)).collect()
    }
}
