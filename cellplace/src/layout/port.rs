//! Named, oriented connection points.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use derive_builder::Builder;
use itertools::Itertools;
use placegeom::orientation::{is_manhattan, wrap_angle};
use placegeom::transform::{rotate_point, Translate};
use placegeom::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::layers::LayerSpec;
use crate::deps::arcstr::ArcStr;
use crate::log::warn;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> u64 {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// The kind of connection a port represents.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    #[default]
    Optical,
    Electrical,
    Placement,
    VerticalTe,
    VerticalTm,
    Custom(ArcStr),
}

impl Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optical => write!(f, "optical"),
            Self::Electrical => write!(f, "electrical"),
            Self::Placement => write!(f, "placement"),
            Self::VerticalTe => write!(f, "vertical_te"),
            Self::VerticalTm => write!(f, "vertical_tm"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// A named, oriented anchor point.
///
/// Every port carries a process-unique `uid`. Copies made for instances
/// receive a fresh one, so ports of two instances of the same design
/// are never confused.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Port {
    #[builder(setter(skip), default = "next_uid()")]
    uid: u64,
    #[builder(setter(into))]
    name: ArcStr,
    #[builder(setter(into), default)]
    center: Point,
    /// Direction the port faces, in degrees in `[0, 360)`.
    #[builder(setter(custom), default)]
    orientation: f64,
    #[builder(default = "0.5")]
    width: f64,
    #[builder(setter(into), default)]
    layer: LayerSpec,
    #[builder(default)]
    port_type: PortType,
}

impl PortBuilder {
    /// Sets the orientation in degrees. The angle is wrapped to `[0, 360)`.
    pub fn orientation(&mut self, angle: f64) -> &mut Self {
        self.orientation = Some(wrap_angle(angle));
        self
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(ref name) = self.name {
            if name.is_empty() {
                return Err("port name must not be empty".to_string());
            }
        }
        if let Some(center) = self.center {
            if !(center.x.is_finite() && center.y.is_finite()) {
                return Err(format!("port center {center} is not finite"));
            }
        }
        if let Some(orientation) = self.orientation {
            if !orientation.is_finite() {
                return Err("port orientation is not finite".to_string());
            }
        }
        Ok(())
    }
}

impl Port {
    #[inline]
    pub fn builder() -> PortBuilder {
        PortBuilder::default()
    }

    /// Creates a port on the default layer with the default type.
    pub fn new(
        name: impl Into<ArcStr>,
        center: impl Into<Point>,
        orientation: f64,
        width: f64,
    ) -> Self {
        Self {
            uid: next_uid(),
            name: name.into(),
            center: center.into(),
            orientation: wrap_angle(orientation),
            width,
            layer: LayerSpec::default(),
            port_type: PortType::default(),
        }
    }

    #[inline]
    pub fn with_layer(mut self, layer: impl Into<LayerSpec>) -> Self {
        self.layer = layer.into();
        self
    }

    #[inline]
    pub fn with_port_type(mut self, port_type: PortType) -> Self {
        self.port_type = port_type;
        self
    }

    /// Returns a copy of this port with a fresh `uid`.
    pub fn copy_with_new_uid(&self) -> Self {
        Self {
            uid: next_uid(),
            ..self.clone()
        }
    }

    #[inline]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.center
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.center.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.center.y
    }

    #[inline]
    pub fn orientation(&self) -> f64 {
        self.orientation
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn layer(&self) -> LayerSpec {
        self.layer
    }

    #[inline]
    pub fn port_type(&self) -> &PortType {
        &self.port_type
    }

    pub fn set_center(&mut self, center: impl Into<Point>) {
        self.center = center.into();
    }

    /// Sets the orientation, wrapping it to `[0, 360)`.
    pub fn set_orientation(&mut self, orientation: f64) {
        self.orientation = wrap_angle(orientation);
    }

    /// Copies everything except the `uid` from `other`.
    pub(crate) fn sync_from(&mut self, other: &Port) {
        self.name = other.name.clone();
        self.center = other.center;
        self.orientation = other.orientation;
        self.width = other.width;
        self.layer = other.layer;
        self.port_type = other.port_type.clone();
    }
}

impl Translate for Port {
    fn translate(&mut self, p: Point) {
        self.center.translate(p);
    }
}

impl Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {} facing {} (width {}, layer {}, {})",
            self.name, self.center, self.orientation, self.width, self.layer, self.port_type
        )
    }
}

/// Maps a port from a template's frame into a placed frame.
///
/// The port is mirrored about the x-axis (if `mirror` is set), scaled by
/// `mag`, rotated about the origin by `rotation` degrees, and finally
/// translated by `origin`. This is the same order in which a
/// [`Transformation`](placegeom::transform::Transformation) built from
/// these components acts on points. The returned orientation is in `[0, 360)`.
pub fn transform_port(
    center: Point,
    orientation: f64,
    origin: Point,
    rotation: f64,
    mirror: bool,
    mag: f64,
) -> (Point, f64) {
    let mut point = center;
    let mut angle = orientation;
    if mirror {
        point.y = -point.y;
        angle = -angle;
    }
    if mag != 1. {
        point = point * mag;
    }
    point = rotate_point(point, rotation, Point::zero());
    angle += rotation;
    (point + origin, wrap_angle(angle))
}

/// An enumeration of port-related errors.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum PortError {
    /// The desired port was not found.
    #[error("port not found: {0}")]
    PortNotFound(ArcStr),

    /// Port already exists.
    #[error("port already exists: {0}")]
    PortAlreadyExists(ArcStr),
}

/// Strategy for resolving conflicts in port names.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortConflictStrategy {
    /// Overwrite conflicting port, will never error.
    Overwrite,
    /// Return an error on conflicting ports.
    #[default]
    Error,
}

/// Ports keyed by name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PortMap {
    ports: BTreeMap<ArcStr, Port>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_port(&mut self, port: Port) -> Result<(), PortError> {
        self.add_port_with_strategy(port, PortConflictStrategy::default())
    }

    pub fn add_port_with_strategy(
        &mut self,
        port: Port,
        port_conflict_strategy: PortConflictStrategy,
    ) -> Result<(), PortError> {
        match self.ports.entry(port.name.clone()) {
            Entry::Occupied(mut o) => match port_conflict_strategy {
                PortConflictStrategy::Error => {
                    return Err(PortError::PortAlreadyExists(port.name));
                }
                PortConflictStrategy::Overwrite => {
                    warn!("overwriting existing port {}", port.name);
                    *o.get_mut() = port;
                }
            },
            Entry::Vacant(v) => {
                v.insert(port);
            }
        }
        Ok(())
    }

    pub fn remove_port(&mut self, name: &str) -> Result<Port, PortError> {
        self.ports
            .remove(name)
            .ok_or_else(|| PortError::PortNotFound(name.into()))
    }

    pub fn port(&self, name: &str) -> Result<&Port, PortError> {
        self.ports
            .get(name)
            .ok_or_else(|| PortError::PortNotFound(name.into()))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.ports.contains_key(name)
    }

    /// Returns an iterator over the ports, ordered by name.
    #[inline]
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<ArcStr, Port> {
        &self.ports
    }
}

/// Criteria for [`select_ports`]. Unset fields match every port.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PortFilter {
    pub layer: Option<LayerSpec>,
    /// Keep ports whose name starts with this prefix.
    pub prefix: Option<ArcStr>,
    /// Keep ports facing this direction, in degrees.
    pub orientation: Option<f64>,
    pub width: Option<f64>,
    pub port_type: Option<PortType>,
    pub layers_excluded: Vec<LayerSpec>,
    /// Sort clockwise (`Some(true)`) or counter-clockwise (`Some(false)`)
    /// instead of by name.
    pub clockwise: Option<bool>,
}

const ANGLE_TOL: f64 = 1e-9;

fn same_angle(a: f64, b: f64) -> bool {
    let d = (wrap_angle(a) - wrap_angle(b)).abs();
    d < ANGLE_TOL || (360. - d) < ANGLE_TOL
}

impl PortFilter {
    /// Returns `true` if `port` passes every set criterion.
    pub fn matches(&self, port: &Port) -> bool {
        self.layer.map_or(true, |l| port.layer == l)
            && self
                .prefix
                .as_ref()
                .map_or(true, |p| port.name.starts_with(p.as_str()))
            && self
                .orientation
                .map_or(true, |o| same_angle(port.orientation, o))
            && self.width.map_or(true, |w| port.width == w)
            && self.port_type.as_ref().map_or(true, |t| port.port_type == *t)
            && !self.layers_excluded.contains(&port.layer)
    }
}

/// Position of a port when walking the boundary clockwise from the west side.
///
/// Returns the side rank and a coordinate that increases along the walk.
fn clockwise_key(port: &Port) -> Option<(u8, f64)> {
    if !is_manhattan(port.orientation) {
        return None;
    }
    let key = match port.orientation as u32 {
        180 => (0, port.center.y),
        90 => (1, port.center.x),
        0 => (2, -port.center.y),
        _ => (3, -port.center.x),
    };
    Some(key)
}

/// Selects the ports matching `filter`.
///
/// Ports are returned by name unless `filter.clockwise` is set. Clockwise
/// order starts with west-facing ports from south to north, then
/// north-facing ports from west to east, then east-facing ports from north
/// to south, then south-facing ports from east to west. Counter-clockwise
/// order is the reverse. Ports that do not face a manhattan direction come
/// last, by name.
pub fn select_ports<'a>(
    ports: impl IntoIterator<Item = &'a Port>,
    filter: &PortFilter,
) -> Vec<Port> {
    let selected = ports
        .into_iter()
        .filter(|p| filter.matches(p))
        .sorted_by(|a, b| a.name.cmp(&b.name));
    let Some(clockwise) = filter.clockwise else {
        return selected.cloned().collect();
    };

    let (manhattan, other): (Vec<_>, Vec<_>) =
        selected.partition(|p| clockwise_key(p).is_some());
    let mut manhattan: Vec<&Port> = manhattan
        .into_iter()
        .sorted_by(|a, b| {
            let (ra, ca) = clockwise_key(a).unwrap_or_default();
            let (rb, cb) = clockwise_key(b).unwrap_or_default();
            ra.cmp(&rb).then(ca.total_cmp(&cb))
        })
        .collect();
    if !clockwise {
        manhattan.reverse();
    }
    manhattan.into_iter().chain(other).cloned().collect()
}
