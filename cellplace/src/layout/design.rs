//! Designs: named containers of geometry, ports, and instances.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::{Rc, Weak};

use derivative::Derivative;
use placegeom::bbox::{Bbox, SizeInfo};
use placegeom::transform::Transformation;
use placegeom::{Point, Polygon, Rect, Shape};

use super::context::Library;
use super::instance::{Instance, InstanceData, InstanceOpts};
use super::kernel::{CellKey, Element};
use super::layers::LayerSpec;
use super::port::{select_ports, Port, PortConflictStrategy, PortFilter, PortMap};
use super::validation::{validate_design, DesignValidatorOutput};
use crate::deps::arcstr::ArcStr;
use crate::error::{with_err_context, ErrorContext, ErrorSource, Result};
use crate::log::{debug, warn};

/// A named container of geometry, ports, and placed instances.
///
/// [`Design`] is a shared handle: clones refer to the same design.
/// The backing kernel cell is released when the last handle, and the last
/// instance using the design as its template, are dropped. Every instance
/// placed inside a released design becomes invalid.
#[derive(Clone)]
pub struct Design(pub(crate) Rc<RefCell<DesignData>>);

/// A non-owning reference to a [`Design`].
#[derive(Clone, Debug, Default)]
pub(crate) struct WeakDesign(Weak<RefCell<DesignData>>);

impl WeakDesign {
    pub(crate) fn upgrade(&self) -> Option<Design> {
        self.0.upgrade().map(Design)
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct DesignData {
    pub(crate) name: ArcStr,
    #[derivative(Debug = "ignore")]
    pub(crate) lib: Library,
    pub(crate) cell: CellKey,
    pub(crate) ports: PortMap,
    pub(crate) children: Vec<Instance>,
    /// Names of named child instances.
    pub(crate) instance_names: HashSet<ArcStr>,
}

impl Drop for DesignData {
    fn drop(&mut self) {
        self.lib.release_name(&self.name);
        match self.lib.try_kernel_mut() {
            Some(mut kernel) => {
                let _ = kernel.delete_cell(self.cell);
            }
            None => warn!("geometry kernel busy; leaking cell of design {}", self.name),
        }
    }
}

impl std::fmt::Debug for Design {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => data.fmt(f),
            Err(_) => f.write_str("Design(<borrowed>)"),
        }
    }
}

impl PartialEq for Design {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Design {}

/// Whether a newly placed instance is owned by the design that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ownership {
    Owned,
    Unowned,
}

impl Design {
    pub(crate) fn new(lib: &Library, name: impl Into<ArcStr>) -> Self {
        let name = lib.alloc_name(name);
        let cell = lib.kernel_mut().create_cell(name.clone());
        debug!("created design {name}");
        Self(Rc::new(RefCell::new(DesignData {
            name,
            lib: lib.clone(),
            cell,
            ports: PortMap::new(),
            children: Vec::new(),
            instance_names: HashSet::new(),
        })))
    }

    #[inline]
    pub fn name(&self) -> ArcStr {
        self.0.borrow().name.clone()
    }

    #[inline]
    pub fn library(&self) -> Library {
        self.0.borrow().lib.clone()
    }

    #[inline]
    pub(crate) fn cell(&self) -> CellKey {
        self.0.borrow().cell
    }

    pub(crate) fn downgrade(&self) -> WeakDesign {
        WeakDesign(Rc::downgrade(&self.0))
    }

    /// Returns `true` if both handles refer to the same design.
    #[inline]
    pub fn ptr_eq(&self, other: &Design) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Adds a port. Fails if a port with the same name exists.
    pub fn add_port(&self, port: Port) -> Result<()> {
        self.add_port_with_strategy(port, PortConflictStrategy::default())
    }

    pub fn add_port_with_strategy(
        &self,
        port: Port,
        port_conflict_strategy: PortConflictStrategy,
    ) -> Result<()> {
        self.0
            .borrow_mut()
            .ports
            .add_port_with_strategy(port, port_conflict_strategy)?;
        Ok(())
    }

    /// Removes a port. Instances of this design drop it on their next port access.
    pub fn remove_port(&self, name: &str) -> Result<Port> {
        Ok(self.0.borrow_mut().ports.remove_port(name)?)
    }

    pub fn port(&self, name: &str) -> Result<Port> {
        Ok(self.0.borrow().ports.port(name)?.clone())
    }

    /// Returns the design's ports in its own frame, keyed by name.
    pub fn ports(&self) -> BTreeMap<ArcStr, Port> {
        self.0.borrow().ports.as_map().clone()
    }

    pub fn select_ports(&self, filter: &PortFilter) -> Vec<Port> {
        select_ports(self.0.borrow().ports.ports(), filter)
    }

    pub fn add_element(&self, elem: Element) -> Result<()> {
        let data = self.0.borrow();
        data.lib.kernel_mut().add_element(data.cell, elem)?;
        Ok(())
    }

    /// Adds a polygon with at least three vertices.
    pub fn add_polygon(
        &self,
        layer: impl Into<LayerSpec>,
        points: impl IntoIterator<Item = impl Into<Point>>,
    ) -> Result<()> {
        let polygon = Polygon::new(points);
        if polygon.points.len() < 3 {
            return Err(ErrorSource::InvalidArgs(format!(
                "a polygon needs at least 3 points, got {}",
                polygon.points.len()
            ))
            .into());
        }
        self.add_element(Element::new(layer, polygon))
    }

    pub fn add_rect(&self, layer: impl Into<LayerSpec>, rect: Rect) -> Result<()> {
        self.add_element(Element::new(layer, rect))
    }

    /// Places `template` inside this design with the given transformation.
    pub fn add_instance(&self, template: &Design, transform: Transformation) -> Result<Instance> {
        with_err_context(
            self.place(template, transform, &InstanceOpts::default(), Ownership::Owned),
            || self.insert_context(template),
        )
    }

    /// Places `template` inside this design, possibly as an array.
    pub fn add_instance_with(&self, template: &Design, opts: InstanceOpts) -> Result<Instance> {
        with_err_context(
            self.place(template, opts.transformation(), &opts, Ownership::Owned),
            || self.insert_context(template),
        )
    }

    fn insert_context(&self, template: &Design) -> ErrorContext {
        ErrorContext::Insert {
            design: self.name(),
            template: template.name(),
        }
    }

    pub(crate) fn place(
        &self,
        template: &Design,
        transform: Transformation,
        opts: &InstanceOpts,
        ownership: Ownership,
    ) -> Result<Instance> {
        self.check_placeable(template)?;
        let owned = ownership == Ownership::Owned;
        if owned {
            if let Some(name) = opts.name() {
                self.check_name_free(name)?;
            }
        }

        let lib = self.library();
        let spacing = opts.spacing();
        let handle = lib.kernel_mut().insert_instance(
            self.cell(),
            template.cell(),
            transform,
            Point::new(spacing.x, 0.),
            Point::new(0., spacing.y),
            opts.columns(),
            opts.rows(),
        )?;

        let instance = Instance::from_data(InstanceData {
            template: template.clone(),
            lib,
            handle,
            owner: owned.then(|| self.downgrade()),
            holder: self.downgrade(),
            holder_name: self.name(),
            local_ports: BTreeMap::new(),
            name: opts.name().cloned(),
            columns: opts.columns(),
            rows: opts.rows(),
            spacing,
        });

        let mut data = self.0.borrow_mut();
        if owned {
            if let Some(name) = opts.name() {
                data.instance_names.insert(name.clone());
            }
        }
        data.children.push(instance.clone());
        debug!(
            "placed {} of {} in {}",
            instance.label(),
            template.name(),
            data.name
        );
        Ok(instance)
    }

    /// Adopts an unowned instance, typically one created in a
    /// [`ScratchArena`](super::scratch::ScratchArena).
    ///
    /// An instance's owner can only be set once. Inserting an instance into
    /// the design that already owns it does nothing.
    pub fn insert(&self, instance: &Instance) -> Result<()> {
        with_err_context(self.insert_inner(instance), || {
            self.insert_context(&instance.template())
        })
    }

    fn insert_inner(&self, instance: &Instance) -> Result<()> {
        instance.ensure_valid()?;
        if let Some(current) = instance.owner() {
            if current.ptr_eq(self) {
                return Ok(());
            }
            return Err(ErrorSource::OwnerReassignment {
                instance: instance.label(),
                current: current.name(),
                attempted: self.name(),
            }
            .into());
        }

        let template = instance.template();
        self.check_placeable(&template)?;
        let name = instance.name();
        if let Some(ref name) = name {
            self.check_name_free(name)?;
        }

        let lib = self.library();
        let (old_handle, holder) = {
            let inner = instance.0.borrow();
            (inner.handle, inner.holder.clone())
        };
        let new_handle = {
            let mut kernel = lib.kernel_mut();
            let array = kernel.instance(old_handle)?;
            let new_handle = kernel.insert_instance(
                self.cell(),
                array.template,
                array.trans,
                array.a,
                array.b,
                array.na,
                array.nb,
            )?;
            kernel.destroy(old_handle);
            new_handle
        };

        {
            let mut inner = instance.0.borrow_mut();
            inner.handle = new_handle;
            inner.owner = Some(self.downgrade());
            inner.holder = self.downgrade();
            inner.holder_name = self.name();
        }
        if let Some(holder) = holder.upgrade() {
            holder.detach(instance);
        }

        let mut data = self.0.borrow_mut();
        if let Some(name) = name {
            data.instance_names.insert(name);
        }
        data.children.push(instance.clone());
        debug!("inserted {} into {}", instance.label(), data.name);
        Ok(())
    }

    /// Removes an instance from the child list without touching its kernel handle.
    fn detach(&self, instance: &Instance) {
        let removed = {
            let mut data = self.0.borrow_mut();
            data.children
                .iter()
                .position(|child| child.ptr_eq(instance))
                .map(|pos| data.children.remove(pos))
        };
        drop(removed);
    }

    /// Removes and destroys a child instance. The instance becomes invalid.
    pub fn remove_instance(&self, instance: &Instance) -> Result<()> {
        let removed = {
            let mut data = self.0.borrow_mut();
            let pos = data
                .children
                .iter()
                .position(|child| child.ptr_eq(instance))
                .ok_or_else(|| {
                    ErrorSource::InvalidArgs(format!(
                        "instance is not a child of design `{}`",
                        data.name
                    ))
                })?;
            let removed = data.children.remove(pos);
            if let Some(name) = removed.name() {
                data.instance_names.remove(&name);
            }
            removed
        };
        self.library().kernel_mut().destroy(removed.handle());
        debug!("removed {} from {}", removed.label(), self.name());
        Ok(())
    }

    /// Returns the child instances in placement order.
    pub fn instances(&self) -> Vec<Instance> {
        self.0.borrow().children.clone()
    }

    pub fn named_instance(&self, name: &str) -> Option<Instance> {
        self.0
            .borrow()
            .children
            .iter()
            .find(|child| child.name().as_deref() == Some(name))
            .cloned()
    }

    /// Moves an instance name registration from `old` to `new`.
    pub(crate) fn rename_instance(&self, old: Option<&ArcStr>, new: &ArcStr) -> Result<()> {
        self.check_name_free(new)?;
        let mut data = self.0.borrow_mut();
        if let Some(old) = old {
            data.instance_names.remove(old);
        }
        data.instance_names.insert(new.clone());
        Ok(())
    }

    fn check_name_free(&self, name: &ArcStr) -> Result<()> {
        let data = self.0.borrow();
        if data.instance_names.contains(name) {
            return Err(ErrorSource::DuplicateName {
                name: name.clone(),
                owner: data.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn check_placeable(&self, template: &Design) -> Result<()> {
        let lib = self.library();
        if !lib.ptr_eq(&template.library()) {
            return Err(ErrorSource::InvalidArgs(format!(
                "design `{}` belongs to a different library than `{}`",
                template.name(),
                self.name()
            ))
            .into());
        }
        let recursive = lib.kernel().contains_cell(template.cell(), self.cell());
        if recursive {
            return Err(ErrorSource::RecursiveInstance {
                parent: self.name(),
                template: template.name(),
            }
            .into());
        }
        Ok(())
    }

    /// The bounding box of everything in the design, in its own frame.
    pub fn bbox(&self) -> Bbox {
        let data = self.0.borrow();
        let bbox = match data.lib.kernel().cell_bbox(data.cell) {
            Ok(bbox) => bbox,
            Err(err) => {
                warn!("cannot compute bbox of design {}: {err}", data.name);
                Bbox::empty()
            }
        };
        data.lib.snap(bbox)
    }

    pub fn size_info(&self) -> SizeInfo {
        SizeInfo::new(self.bbox())
    }

    /// Flattened geometry of the whole hierarchy, grouped by layer.
    pub fn polygons(&self) -> Result<BTreeMap<LayerSpec, Vec<Shape>>> {
        let data = self.0.borrow();
        let elems = data
            .lib
            .kernel()
            .polygons(data.cell, Transformation::identity())?;
        Ok(group_by_layer(elems))
    }

    /// Replaces every child instance with its geometry.
    ///
    /// Every child instance becomes invalid.
    pub fn flatten(&self) -> Result<()> {
        let lib = self.library();
        let count = lib.kernel_mut().flatten(self.cell())?;
        let children = {
            let mut data = self.0.borrow_mut();
            data.instance_names.clear();
            std::mem::take(&mut data.children)
        };
        debug!("flattened {} instance arrays in {}", count, self.name());
        drop(children);
        Ok(())
    }

    /// Validates the design and logs the results.
    pub fn validate(&self) -> DesignValidatorOutput {
        let output = validate_design(self);
        output.log();
        output
    }

    /// Returns an error if validation finds any errors.
    pub fn check(&self) -> Result<()> {
        let output = self.validate();
        match output.first_error() {
            Some(err) => Err(ErrorSource::InvalidDesign(err).into()),
            None => Ok(()),
        }
    }
}

pub(crate) fn group_by_layer(elems: Vec<Element>) -> BTreeMap<LayerSpec, Vec<Shape>> {
    let mut map: BTreeMap<LayerSpec, Vec<Shape>> = BTreeMap::new();
    for elem in elems {
        map.entry(elem.layer).or_default().push(elem.inner);
    }
    map
}
