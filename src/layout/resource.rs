use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::layout::css;
use crate::layout::{LayoutId, ViewportSize};
use crate::midi::control::ControlId;

pub type SharedResolver = Arc<dyn ResourceResolver + Send + Sync + 'static>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stylesheet {
    pub layout: LayoutId,
    pub source: String,
}

impl Stylesheet {
    /// Declared size of the layout root (`#main`).
    pub fn root_size(&self) -> Option<ViewportSize> {
        css::root_size(&self.source)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ControlSpec {
    pub id: ControlId,
    pub name: String,
}

/// Layout markup: the controls it places and whether it wants a status line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Markup {
    #[serde(default)]
    pub show_status: bool,
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
}

/// Resolves a layout id to exactly one stylesheet and one markup resource.
#[async_trait]
pub trait ResourceResolver {
    async fn stylesheet(&self, layout: &LayoutId) -> anyhow::Result<Stylesheet>;
    async fn markup(&self, layout: &LayoutId) -> anyhow::Result<Markup>;
}

/// Reads `<dir>/<id>.css` and `<dir>/<id>.yaml`.
pub struct DirectoryResolver {
    dir: PathBuf,
}

impl DirectoryResolver {
    pub fn new(dir: impl Into<PathBuf>) -> DirectoryResolver {
        DirectoryResolver { dir: dir.into() }
    }

    fn path(&self, layout: &LayoutId, ext: &str) -> anyhow::Result<PathBuf> {
        let name = layout.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            anyhow::bail!("`{name}` is not a valid layout id");
        }
        Ok(self.dir.join(format!("{name}.{ext}")))
    }
}

#[async_trait]
impl ResourceResolver for DirectoryResolver {
    async fn stylesheet(&self, layout: &LayoutId) -> anyhow::Result<Stylesheet> {
        let source = tokio::fs::read_to_string(self.path(layout, "css")?).await?;
        Ok(Stylesheet {
            layout: layout.clone(),
            source,
        })
    }

    async fn markup(&self, layout: &LayoutId) -> anyhow::Result<Markup> {
        let source = tokio::fs::read_to_string(self.path(layout, "yaml")?).await?;
        Ok(serde_yaml::from_str(&source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_resource_pair_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("mixer.css"),
            "#main { width: 800px; height: 540px; }",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("mixer.yaml"),
            "show_status: true\ncontrols:\n  - { id: k-01, name: Gain }\n",
        )
        .unwrap();

        let resolver = DirectoryResolver::new(dir.path());
        let id = LayoutId::from("mixer");
        let sheet = resolver.stylesheet(&id).await.unwrap();
        assert_eq!(
            sheet.root_size(),
            Some(ViewportSize {
                width: 800,
                height: 540
            })
        );
        let markup = resolver.markup(&id).await.unwrap();
        assert!(markup.show_status);
        assert_eq!(markup.controls[0].id, ControlId::from("k-01"));

        assert!(resolver.stylesheet(&LayoutId::from("missing")).await.is_err());
        assert!(resolver.markup(&LayoutId::from("../mixer")).await.is_err());
    }
}
