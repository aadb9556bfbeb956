//! Placed instances of designs.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use derive_builder::Builder;
use placegeom::bbox::{Bbox, SizeInfo};
use placegeom::transform::{Transformation, Translate};
use placegeom::{Point, Shape};

use super::context::Library;
use super::design::{group_by_layer, Design, WeakDesign};
use super::kernel::InstKey;
use super::layers::LayerSpec;
use super::port::{select_ports, transform_port, Port, PortFilter};
use crate::deps::arcstr::ArcStr;
use crate::error::{CellplaceError, ErrorSource, Result};
use crate::log::trace;

/// Placement options for a new instance.
///
/// The transformation mirrors about the x-axis, scales, rotates, and then
/// translates to `origin`, in that order. `columns` by `rows` copies are
/// placed `spacing` apart.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct InstanceOpts {
    #[builder(setter(into), default)]
    origin: Point,
    /// Counter-clockwise rotation in degrees.
    #[builder(default)]
    rotation: f64,
    #[builder(default)]
    mirror: bool,
    #[builder(default = "1.")]
    magnification: f64,
    #[builder(default = "1")]
    columns: usize,
    #[builder(default = "1")]
    rows: usize,
    #[builder(setter(into), default = "Point::new(100., 100.)")]
    spacing: Point,
    #[builder(setter(into, strip_option), default)]
    name: Option<ArcStr>,
}

impl InstanceOptsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(mag) = self.magnification {
            if !(mag.is_finite() && mag > 0.) {
                return Err(format!("magnification must be positive, got `{mag}`"));
            }
        }
        if self.columns == Some(0) || self.rows == Some(0) {
            return Err("instance arrays need at least one row and one column".to_string());
        }
        if let Some(rotation) = self.rotation {
            if !rotation.is_finite() {
                return Err("rotation is not finite".to_string());
            }
        }
        for p in [self.origin, self.spacing].into_iter().flatten() {
            if !(p.x.is_finite() && p.y.is_finite()) {
                return Err(format!("point {p} is not finite"));
            }
        }
        Ok(())
    }
}

impl Default for InstanceOpts {
    fn default() -> Self {
        Self {
            origin: Point::zero(),
            rotation: 0.,
            mirror: false,
            magnification: 1.,
            columns: 1,
            rows: 1,
            spacing: Point::new(100., 100.),
            name: None,
        }
    }
}

impl InstanceOpts {
    #[inline]
    pub fn builder() -> InstanceOptsBuilder {
        InstanceOptsBuilder::default()
    }

    pub fn transformation(&self) -> Transformation {
        Transformation::builder()
            .point(self.origin)
            .reflect_vert(self.mirror)
            .angle(self.rotation)
            .mag(self.magnification)
            .build()
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn spacing(&self) -> Point {
        self.spacing
    }

    #[inline]
    pub fn name(&self) -> Option<&ArcStr> {
        self.name.as_ref()
    }
}

/// A placement of a template [`Design`] inside another design.
///
/// [`Instance`] is a shared handle: clones refer to the same placement.
/// The placement stays in its owner until the owner removes it, is
/// flattened, or is dropped. After that, every operation on the instance
/// fails with [`ErrorSource::InvalidReference`].
#[derive(Clone)]
pub struct Instance(pub(crate) Rc<RefCell<InstanceData>>);

pub(crate) struct InstanceData {
    pub(crate) template: Design,
    pub(crate) lib: Library,
    pub(crate) handle: InstKey,
    /// Set at most once.
    pub(crate) owner: Option<WeakDesign>,
    /// The design whose child list holds this instance: the owner or a scratch arena.
    pub(crate) holder: WeakDesign,
    pub(crate) holder_name: ArcStr,
    /// World-space ports, refreshed from the template on every access.
    pub(crate) local_ports: BTreeMap<ArcStr, Port>,
    pub(crate) name: Option<ArcStr>,
    pub(crate) columns: usize,
    pub(crate) rows: usize,
    pub(crate) spacing: Point,
}

impl InstanceData {
    fn invalid_reference(&self) -> CellplaceError {
        ErrorSource::InvalidReference {
            owner: self.holder_name.clone(),
            template: self.template.name(),
        }
        .into()
    }
}

impl Drop for InstanceData {
    fn drop(&mut self) {
        if let Some(mut kernel) = self.lib.try_kernel_mut() {
            kernel.destroy(self.handle);
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Ok(inner) = self.0.try_borrow() else {
            return f.write_str("Instance(<borrowed>)");
        };
        f.debug_struct("Instance")
            .field("name", &inner.name)
            .field("template", &inner.template.name())
            .field("holder", &inner.holder_name)
            .field("handle", &inner.handle)
            .finish()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Instance {}

impl Instance {
    pub(crate) fn from_data(data: InstanceData) -> Self {
        Self(Rc::new(RefCell::new(data)))
    }

    /// Returns `true` if both handles refer to the same instance.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn template(&self) -> Design {
        self.0.borrow().template.clone()
    }

    /// The design that owns this instance, if any.
    pub fn owner(&self) -> Option<Design> {
        self.0.borrow().owner.as_ref().and_then(WeakDesign::upgrade)
    }

    pub fn name(&self) -> Option<ArcStr> {
        self.0.borrow().name.clone()
    }

    /// Names the instance.
    ///
    /// Fails with [`ErrorSource::DuplicateName`] if the owner already has
    /// another instance with this name. The name is checked again when an
    /// unowned instance is inserted into an owner.
    pub fn set_name(&self, name: impl Into<ArcStr>) -> Result<()> {
        let name = name.into();
        self.ensure_valid()?;
        let (owner, old) = {
            let inner = self.0.borrow();
            (
                inner.owner.as_ref().and_then(WeakDesign::upgrade),
                inner.name.clone(),
            )
        };
        if old.as_ref() == Some(&name) {
            return Ok(());
        }
        if let Some(owner) = owner {
            owner.rename_instance(old.as_ref(), &name)?;
        }
        self.0.borrow_mut().name = Some(name);
        Ok(())
    }

    /// A short description for logs and errors.
    pub(crate) fn label(&self) -> ArcStr {
        let inner = self.0.borrow();
        match inner.name {
            Some(ref name) => name.clone(),
            None => ArcStr::from(format!("<instance of {}>", inner.template.name())),
        }
    }

    pub(crate) fn handle(&self) -> InstKey {
        self.0.borrow().handle
    }

    /// Returns `false` once the backing kernel instance has been destroyed.
    pub fn is_valid(&self) -> bool {
        let inner = self.0.borrow();
        let valid = inner.lib.kernel().is_valid(inner.handle);
        valid
    }

    pub(crate) fn ensure_valid(&self) -> Result<()> {
        let inner = self.0.borrow();
        let valid = inner.lib.kernel().is_valid(inner.handle);
        if valid {
            Ok(())
        } else {
            Err(inner.invalid_reference())
        }
    }

    /// Applies each transformation in turn on top of the current one.
    ///
    /// Either every step is applied or, for an invalid instance, none is.
    pub(crate) fn apply(&self, steps: &[Transformation]) -> Result<()> {
        let inner = self.0.borrow();
        let mut kernel = inner.lib.kernel_mut();
        if !kernel.is_valid(inner.handle) {
            return Err(inner.invalid_reference());
        }
        for step in steps {
            kernel.transform(inner.handle, *step)?;
        }
        Ok(())
    }

    /// Rigidly shifts every cached port.
    pub(crate) fn shift_cached_ports(&self, delta: Point) {
        let mut inner = self.0.borrow_mut();
        for port in inner.local_ports.values_mut() {
            port.translate(delta);
        }
    }

    pub fn transformation(&self) -> Result<Transformation> {
        let inner = self.0.borrow();
        let trans = inner.lib.kernel().transformation(inner.handle);
        trans.map_err(|_| inner.invalid_reference())
    }

    /// The translation component of the transformation.
    pub fn origin(&self) -> Result<Point> {
        Ok(self.transformation()?.offset_point())
    }

    /// The rotation in degrees, in `[0, 360)`.
    pub fn rotation(&self) -> Result<f64> {
        Ok(self.transformation()?.angle())
    }

    /// Whether the template is mirrored about its x-axis before rotating.
    pub fn is_mirrored(&self) -> Result<bool> {
        Ok(self.transformation()?.is_mirrored())
    }

    pub fn magnification(&self) -> Result<f64> {
        Ok(self.transformation()?.magnification())
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.0.borrow().columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.0.borrow().rows
    }

    #[inline]
    pub fn spacing(&self) -> Point {
        self.0.borrow().spacing
    }

    /// Returns the instance's ports in the owner's frame, keyed by name.
    ///
    /// Recomputed from the template's current ports on every call:
    /// new template ports appear with a fresh `uid`, and ports removed from
    /// the template disappear. Each call is linear in the number of
    /// template ports. For arrays, these are the ports of the origin copy.
    pub fn ports(&self) -> Result<BTreeMap<ArcStr, Port>> {
        let trans = self.transformation()?;
        let template_ports = self.template().ports();
        let origin = trans.offset_point();
        let rotation = trans.angle();
        let mirror = trans.is_mirrored();
        let mag = trans.magnification();

        let mut inner = self.0.borrow_mut();
        for (name, port) in template_ports.iter() {
            let (center, orientation) = transform_port(
                port.center(),
                port.orientation(),
                origin,
                rotation,
                mirror,
                mag,
            );
            let local = inner.local_ports.entry(name.clone()).or_insert_with(|| {
                trace!("deriving instance port {name}");
                port.copy_with_new_uid()
            });
            local.sync_from(port);
            local.set_center(center);
            local.set_orientation(orientation);
        }
        inner.local_ports.retain(|name, _| {
            let keep = template_ports.contains_key(name);
            if !keep {
                trace!("pruning instance port {name}");
            }
            keep
        });
        Ok(inner.local_ports.clone())
    }

    /// Returns a single refreshed port.
    pub fn port(&self, name: &str) -> Result<Port> {
        let mut ports = self.ports()?;
        match ports.remove(name) {
            Some(port) => Ok(port),
            None => Err(ErrorSource::UnknownPort {
                name: name.into(),
                available: ports.into_keys().collect(),
            }
            .into()),
        }
    }

    pub fn select_ports(&self, filter: &PortFilter) -> Result<Vec<Port>> {
        Ok(select_ports(self.ports()?.values(), filter))
    }

    /// The bounding box of every copy, in the owner's frame.
    pub fn bbox(&self) -> Result<Bbox> {
        let inner = self.0.borrow();
        let bbox = inner.lib.kernel().bbox(inner.handle);
        let bbox = bbox.map_err(|_| inner.invalid_reference())?;
        Ok(inner.lib.snap(bbox))
    }

    pub fn size_info(&self) -> Result<SizeInfo> {
        Ok(SizeInfo::new(self.bbox()?))
    }

    /// Flattened geometry of every copy in the owner's frame, grouped by layer.
    pub fn polygons(&self) -> Result<BTreeMap<LayerSpec, Vec<Shape>>> {
        let inner = self.0.borrow();
        let elems = inner
            .lib
            .kernel()
            .instance_polygons(inner.handle, Transformation::identity());
        let elems = elems.map_err(|_| inner.invalid_reference())?;
        Ok(group_by_layer(elems))
    }
}
