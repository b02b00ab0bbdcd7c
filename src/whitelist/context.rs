//! Tab and frame context tracking
//!
//! Sub-resource requests only carry tab and frame ids. To decide whether a
//! request happens on a whitelisted page, the URLs of the tab and of every
//! ancestor frame are remembered as navigations pass through the
//! interceptor.

use std::collections::{HashMap, HashSet};

/// Maximum number of ancestor frames walked for one request
pub const MAX_FRAME_DEPTH: usize = 16;

/// Default number of tabs remembered before the least recently active one
/// is forgotten
pub const MAX_TRACKED_TABS: usize = 512;

/// Frame id of a tab's top-level document
const TOP_FRAME: i64 = 0;

#[derive(Debug, Clone)]
struct FrameInfo {
    url: String,
    parent_frame_id: i64,
}

/// Known document URLs, per tab and frame
///
/// Hosts that never report closed tabs are covered by a cap on the number
/// of tracked tabs.
#[derive(Debug, Clone)]
pub struct FrameTree {
    frames: HashMap<(i64, i64), FrameInfo>,
    /// Tab id to the tick of its latest document load
    last_active: HashMap<i64, u64>,
    tick: u64,
    max_tabs: usize,
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::with_max_tabs(MAX_TRACKED_TABS)
    }
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tabs(max_tabs: usize) -> Self {
        Self {
            frames: HashMap::new(),
            last_active: HashMap::new(),
            tick: 0,
            max_tabs: max_tabs.max(1),
        }
    }

    /// Records a document load in a frame
    ///
    /// Loading a new top-level document forgets every frame of the tab.
    pub fn record(&mut self, tab_id: i64, frame_id: i64, parent_frame_id: i64, url: &str) {
        if tab_id < 0 {
            return;
        }
        if frame_id == TOP_FRAME {
            self.frames.retain(|(tab, _), _| *tab != tab_id);
        }
        self.frames.insert(
            (tab_id, frame_id),
            FrameInfo {
                url: url.to_string(),
                parent_frame_id,
            },
        );

        self.tick += 1;
        self.last_active.insert(tab_id, self.tick);
        if self.last_active.len() > self.max_tabs {
            self.evict_idle_tab();
        }
    }

    /// Forgets a closed tab
    pub fn remove_tab(&mut self, tab_id: i64) {
        self.frames.retain(|(tab, _), _| *tab != tab_id);
        self.last_active.remove(&tab_id);
    }

    /// Number of tabs with a known document
    pub fn tab_count(&self) -> usize {
        self.last_active.len()
    }

    fn evict_idle_tab(&mut self) {
        let idle = self
            .last_active
            .iter()
            .min_by_key(|(_, tick)| **tick)
            .map(|(tab, _)| *tab);
        if let Some(tab_id) = idle {
            tracing::debug!("Forgetting idle tab {}", tab_id);
            self.remove_tab(tab_id);
        }
    }

    /// URL of a tab's top-level document
    pub fn tab_url(&self, tab_id: i64) -> Option<&str> {
        self.frames
            .get(&(tab_id, TOP_FRAME))
            .map(|info| info.url.as_str())
    }

    /// Context URLs for a request: the tab document, the requesting frame
    /// and its ancestors
    ///
    /// The walk stops at a missing parent, a cycle, or after
    /// [`MAX_FRAME_DEPTH`] frames.
    pub fn context_urls(&self, tab_id: i64, frame_id: i64, parent_frame_id: i64) -> Vec<String> {
        let mut urls = Vec::new();
        if tab_id < 0 {
            return urls;
        }

        if let Some(url) = self.tab_url(tab_id) {
            urls.push(url.to_string());
        }

        let mut visited = HashSet::new();
        let mut current = if self.frames.contains_key(&(tab_id, frame_id)) {
            frame_id
        } else {
            parent_frame_id
        };

        for _ in 0..MAX_FRAME_DEPTH {
            if current < 0 || !visited.insert(current) {
                break;
            }
            let Some(info) = self.frames.get(&(tab_id, current)) else {
                break;
            };
            if !urls.contains(&info.url) {
                urls.push(info.url.clone());
            }
            current = info.parent_frame_id;
        }

        urls
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
