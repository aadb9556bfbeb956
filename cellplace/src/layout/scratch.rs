//! Holding areas for instances without an owner.

use super::context::Library;
use super::design::{Design, Ownership};
use super::instance::{Instance, InstanceOpts};
use crate::deps::arcstr::ArcStr;
use crate::error::{with_err_context, ErrorContext, Result};

/// A caller-owned holding area for instances that have no owner yet.
///
/// Instances created here can be moved and connected like any other, and
/// are later adopted with [`Design::insert`]. Dropping the arena
/// invalidates every instance still held in it.
#[derive(Debug)]
pub struct ScratchArena {
    design: Design,
}

impl ScratchArena {
    pub(crate) fn new(lib: &Library) -> Self {
        Self {
            design: Design::new(lib, lib.config().scratch_name().clone()),
        }
    }

    /// The name of the backing design.
    pub fn name(&self) -> ArcStr {
        self.design.name()
    }

    /// Creates an ownerless instance of `template`.
    pub fn instance(&self, template: &Design, opts: InstanceOpts) -> Result<Instance> {
        with_err_context(
            self.design
                .place(template, opts.transformation(), &opts, Ownership::Unowned),
            || ErrorContext::Insert {
                design: self.name(),
                template: template.name(),
            },
        )
    }

    /// The number of instances still held.
    pub fn len(&self) -> usize {
        self.design.0.borrow().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
