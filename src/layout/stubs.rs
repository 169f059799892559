use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::layout::resource::{ControlSpec, Markup, ResourceResolver, Stylesheet};
use crate::layout::LayoutId;
use crate::midi::control::DescriptorTable;

/// In-memory layouts, with load counting and failure injection.
#[derive(Default)]
pub struct StaticResolver {
    layouts: HashMap<LayoutId, (String, Markup)>,
    broken: Mutex<HashSet<LayoutId>>,
    stylesheet_loads: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> StaticResolver {
        StaticResolver::default()
    }

    pub fn with_layout(mut self, id: &str, css: &str, markup: Markup) -> StaticResolver {
        self.layouts
            .insert(LayoutId::from(id), (css.to_string(), markup));
        self
    }

    /// A layout of `width` x `height` showing every control of `descriptors`.
    pub fn with_full_layout(
        self,
        id: &str,
        width: u32,
        height: u32,
        descriptors: &DescriptorTable,
        show_status: bool,
    ) -> StaticResolver {
        let controls = descriptors
            .descriptors()
            .iter()
            .flat_map(|desc| {
                desc.control_ids().map(move |(i, id)| ControlSpec {
                    id,
                    name: desc.label(i),
                })
            })
            .collect();
        let css = format!("#main {{ width: {width}px; height: {height}px; }}");
        self.with_layout(
            id,
            &css,
            Markup {
                show_status,
                controls,
            },
        )
    }

    pub fn break_layout(&self, id: &str) {
        if let Ok(mut broken) = self.broken.lock() {
            broken.insert(LayoutId::from(id));
        }
    }

    pub fn stylesheet_loads(&self) -> usize {
        self.stylesheet_loads.load(Ordering::SeqCst)
    }

    fn lookup(&self, layout: &LayoutId) -> anyhow::Result<&(String, Markup)> {
        let broken = self
            .broken
            .lock()
            .map(|broken| broken.contains(layout))
            .unwrap_or(false);
        if broken {
            anyhow::bail!("resource for `{layout}` is unavailable");
        }
        self.layouts
            .get(layout)
            .ok_or_else(|| anyhow::anyhow!("no such layout `{layout}`"))
    }
}

#[async_trait]
impl ResourceResolver for StaticResolver {
    async fn stylesheet(&self, layout: &LayoutId) -> anyhow::Result<Stylesheet> {
        self.stylesheet_loads.fetch_add(1, Ordering::SeqCst);
        let (css, _) = self.lookup(layout)?;
        Ok(Stylesheet {
            layout: layout.clone(),
            source: css.clone(),
        })
    }

    async fn markup(&self, layout: &LayoutId) -> anyhow::Result<Markup> {
        Ok(self.lookup(layout)?.1.clone())
    }
}
