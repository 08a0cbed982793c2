//! Re-entrancy guards for filter passes
//!
//! A pass over a surface may suspend while it waits for storage. A second pass
//! triggered meanwhile on the same surface is dropped, not queued.

use std::cell::Cell;

use crate::types::Surface;

#[derive(Debug, Default)]
pub struct FilterGuards {
    directory: Cell<bool>,
    sidebar: Cell<bool>,
}

impl FilterGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `surface`. Returns `None` if a pass is already running there.
    pub fn try_acquire(&self, surface: Surface) -> Option<FilterPassToken<'_>> {
        let flag = self.flag(surface);
        if flag.replace(true) {
            log::debug!("Filter pass on {surface:?} already running, skipping");
            return None;
        }
        Some(FilterPassToken { flag })
    }

    pub fn is_running(&self, surface: Surface) -> bool {
        self.flag(surface).get()
    }

    fn flag(&self, surface: Surface) -> &Cell<bool> {
        match surface {
            Surface::Directory => &self.directory,
            Surface::Sidebar => &self.sidebar,
        }
    }
}

/// Releases its surface when dropped.
#[derive(Debug)]
pub struct FilterPassToken<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for FilterPassToken<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
