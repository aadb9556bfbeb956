//! The shared library context.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::rc::Rc;

use placegeom::bbox::Bbox;

use super::design::Design;
use super::kernel::GeomKernel;
use super::scratch::ScratchArena;
use crate::config::LibraryConfig;
use crate::deps::arcstr::ArcStr;
use crate::error::Result;

/// A collection of designs sharing one geometry kernel and configuration.
///
/// Cloning a [`Library`] is cheap; clones refer to the same designs.
#[derive(Clone)]
pub struct Library {
    inner: Rc<LibraryData>,
}

struct LibraryData {
    config: LibraryConfig,
    kernel: RefCell<GeomKernel>,
    /// Names of live designs.
    names: RefCell<HashSet<ArcStr>>,
}

impl Default for Library {
    fn default() -> Self {
        Self::with_checked_config(LibraryConfig::default())
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Library {
    /// Creates a library with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a library with the given configuration.
    pub fn from_config(config: LibraryConfig) -> Result<Self> {
        config.check()?;
        Ok(Self::with_checked_config(config))
    }

    fn with_checked_config(config: LibraryConfig) -> Self {
        Self {
            inner: Rc::new(LibraryData {
                config,
                kernel: RefCell::new(GeomKernel::new()),
                names: RefCell::new(HashSet::new()),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &LibraryConfig {
        &self.inner.config
    }

    /// Creates an empty design.
    ///
    /// If `name` is already in use, a numeric suffix makes it unique.
    pub fn design(&self, name: impl Into<ArcStr>) -> Design {
        Design::new(self, name)
    }

    /// Creates a holding area for instances that have no owner yet.
    pub fn scratch(&self) -> ScratchArena {
        ScratchArena::new(self)
    }

    /// Returns `true` if both handles refer to the same library.
    #[inline]
    pub fn ptr_eq(&self, other: &Library) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Snaps `bbox` to the database unit if snapping is enabled.
    pub fn snap(&self, bbox: Bbox) -> Bbox {
        if self.inner.config.snap_bbox() {
            bbox.snapped(self.inner.config.dbu())
        } else {
            bbox
        }
    }

    pub(crate) fn kernel(&self) -> Ref<'_, GeomKernel> {
        self.inner.kernel.borrow()
    }

    pub(crate) fn kernel_mut(&self) -> RefMut<'_, GeomKernel> {
        self.inner.kernel.borrow_mut()
    }

    /// Used from destructors, which must never panic.
    pub(crate) fn try_kernel_mut(&self) -> Option<RefMut<'_, GeomKernel>> {
        self.inner.kernel.try_borrow_mut().ok()
    }

    /// Allocates an unused name derived from the given base name.
    pub(crate) fn alloc_name(&self, base_name: impl Into<ArcStr>) -> ArcStr {
        let base_name = base_name.into();
        let mut names = self.inner.names.borrow_mut();
        let mut name = base_name.clone();
        let mut i = 1;
        while names.contains(&name) {
            name = ArcStr::from(format!("{base_name}_{i}"));
            i += 1;
        }
        names.insert(name.clone());
        name
    }

    pub(crate) fn release_name(&self, name: &ArcStr) {
        if let Ok(mut names) = self.inner.names.try_borrow_mut() {
            names.remove(name);
        }
    }
}
