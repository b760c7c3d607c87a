#![forbid(unsafe_code)]

//! Ordered collection of named canvases.
//!
//! Panes are kept in a `Vec` in insertion order with a name→slot index on
//! the side. Removal shifts later panes left by one, so survivors keep their
//! relative order but slot numbers are not stable; the index is rebuilt
//! from the removed slot onwards.

use ahash::AHashMap;
use paneflip_canvas::Canvas;

use crate::error::PaneError;

/// A named, independently drawable surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    name: String,
    canvas: Canvas,
}

impl Pane {
    #[must_use]
    pub fn new(name: impl Into<String>, canvas: Canvas) -> Self {
        Self {
            name: name.into(),
            canvas,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    #[inline]
    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }
}

/// `true` if `name` may identify a pane.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(':')
}

/// Insertion-ordered panes with unique names.
#[derive(Debug, Default)]
pub struct PaneSet {
    panes: Vec<Pane>,
    index: AHashMap<String, usize>,
}

impl PaneSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.panes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Append `pane`. Fails without side effects if the name is taken.
    pub fn insert(&mut self, pane: Pane) -> Result<(), PaneError> {
        if self.index.contains_key(pane.name()) {
            return Err(PaneError::Duplicate);
        }
        self.index.insert(pane.name.clone(), self.panes.len());
        self.panes.push(pane);
        Ok(())
    }

    /// Remove and return the pane called `name`.
    pub fn remove(&mut self, name: &str) -> Result<Pane, PaneError> {
        let slot = self.index.remove(name).ok_or(PaneError::NotFound)?;
        let pane = self.panes.remove(slot);
        for (i, p) in self.panes.iter().enumerate().skip(slot) {
            if let Some(entry) = self.index.get_mut(p.name()) {
                *entry = i;
            }
        }
        Ok(pane)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Pane> {
        self.index.get(name).map(|&i| &self.panes[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Pane> {
        self.index.get(name).map(|&i| &mut self.panes[i])
    }

    /// Pane at slot `n`, in insertion order.
    #[must_use]
    pub fn nth(&self, n: usize) -> Option<&Pane> {
        self.panes.get(n)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.panes.iter().map(Pane::name)
    }

    pub fn clear(&mut self) {
        self.panes.clear();
        self.index.clear();
    }
}
