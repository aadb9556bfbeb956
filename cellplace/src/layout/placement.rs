//! Moving, rotating, mirroring, and connecting instances.
//!
//! Every operation resolves all of its inputs before touching the
//! instance, so a failed call leaves the instance unchanged.

use std::collections::BTreeMap;
use std::fmt::Display;

use placegeom::orientation::wrap_angle;
use placegeom::transform::Transformation;
use placegeom::Point;

use super::instance::Instance;
use super::port::Port;
use crate::deps::arcstr::ArcStr;
use crate::error::{with_err_context, ErrorContext, ErrorSource, Result};
use crate::log::debug;

pub use placegeom::Axis;

/// A location used by placement operations.
///
/// Names are looked up among the ports of the instance being placed.
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    Coord(Point),
    /// The port's center. A port of the instance itself is matched by uid,
    /// so stale copies resolve to the current location.
    Port(Port),
    Name(ArcStr),
}

impl From<Point> for Anchor {
    fn from(value: Point) -> Self {
        Self::Coord(value)
    }
}

impl From<(f64, f64)> for Anchor {
    fn from(value: (f64, f64)) -> Self {
        Self::Coord(value.into())
    }
}

impl From<Port> for Anchor {
    fn from(value: Port) -> Self {
        Self::Port(value)
    }
}

impl From<&Port> for Anchor {
    fn from(value: &Port) -> Self {
        Self::Port(value.clone())
    }
}

impl From<&str> for Anchor {
    fn from(value: &str) -> Self {
        Self::Name(value.into())
    }
}

impl From<String> for Anchor {
    fn from(value: String) -> Self {
        Self::Name(value.into())
    }
}

impl From<ArcStr> for Anchor {
    fn from(value: ArcStr) -> Self {
        Self::Name(value)
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coord(p) => write!(f, "{p}"),
            Self::Port(port) => write!(f, "port {}", port.name()),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Origin,
    Destination,
}

impl Anchor {
    fn resolve(&self, ports: &BTreeMap<ArcStr, Port>, role: Role) -> Result<Point> {
        match self {
            Self::Coord(p) => Ok(*p),
            Self::Port(port) => Ok(ports
                .values()
                .find(|p| p.uid() == port.uid())
                .map_or(port.center(), Port::center)),
            Self::Name(name) => match ports.get(name) {
                Some(port) => Ok(port.center()),
                None => {
                    let anchor = name.to_string();
                    let available = ports.keys().cloned().collect();
                    Err(match role {
                        Role::Origin => ErrorSource::AmbiguousOrigin { anchor, available },
                        Role::Destination => {
                            ErrorSource::AmbiguousDestination { anchor, available }
                        }
                    }
                    .into())
                }
            },
        }
    }
}

/// The port of an instance to connect.
#[derive(Debug, Clone, PartialEq)]
pub enum PortRef {
    Name(ArcStr),
    /// Matched against the instance's ports by uid, then by name.
    Port(Port),
}

impl PortRef {
    fn label(&self) -> ArcStr {
        match self {
            Self::Name(name) => name.clone(),
            Self::Port(port) => port.name().clone(),
        }
    }

    fn resolve(&self, ports: &BTreeMap<ArcStr, Port>) -> Result<Port> {
        match self {
            Self::Name(name) => ports.get(name).cloned().ok_or_else(|| {
                ErrorSource::UnknownPort {
                    name: name.clone(),
                    available: ports.keys().cloned().collect(),
                }
                .into()
            }),
            Self::Port(port) => Ok(ports
                .values()
                .find(|p| p.uid() == port.uid())
                .or_else(|| ports.get(port.name()))
                .unwrap_or(port)
                .clone()),
        }
    }
}

impl From<&str> for PortRef {
    fn from(value: &str) -> Self {
        Self::Name(value.into())
    }
}

impl From<String> for PortRef {
    fn from(value: String) -> Self {
        Self::Name(value.into())
    }
}

impl From<ArcStr> for PortRef {
    fn from(value: ArcStr) -> Self {
        Self::Name(value)
    }
}

impl From<Port> for PortRef {
    fn from(value: Port) -> Self {
        Self::Port(value)
    }
}

impl From<&Port> for PortRef {
    fn from(value: &Port) -> Self {
        Self::Port(value.clone())
    }
}

impl Instance {
    fn move_context(&self) -> ErrorContext {
        ErrorContext::Move {
            template: self.template().name(),
        }
    }

    /// Moves the instance so that the point `(0, 0)` lands on `destination`.
    pub fn move_to(&self, destination: impl Into<Anchor>) -> Result<&Self> {
        self.move_along(Point::zero(), destination, None)
    }

    /// Moves the instance so that `origin` lands on `destination`.
    pub fn move_from_to(
        &self,
        origin: impl Into<Anchor>,
        destination: impl Into<Anchor>,
    ) -> Result<&Self> {
        self.move_along(origin, destination, None)
    }

    /// Moves the instance by `destination - origin`.
    ///
    /// With an axis, only the displacement along that axis is applied.
    pub fn move_along(
        &self,
        origin: impl Into<Anchor>,
        destination: impl Into<Anchor>,
        axis: Option<Axis>,
    ) -> Result<&Self> {
        let (origin, destination) = (origin.into(), destination.into());
        with_err_context(self.move_inner(&origin, &destination, axis), || {
            self.move_context()
        })?;
        Ok(self)
    }

    fn move_inner(&self, origin: &Anchor, destination: &Anchor, axis: Option<Axis>) -> Result<()> {
        let ports = self.ports()?;
        let o = origin.resolve(&ports, Role::Origin)?;
        let mut d = destination.resolve(&ports, Role::Destination)?;
        match axis {
            Some(Axis::X) => d.y = o.y,
            Some(Axis::Y) => d.x = o.x,
            None => {}
        }
        ensure_finite("move origin", o)?;
        ensure_finite("move destination", d)?;
        let delta = d - o;
        self.apply(&[Transformation::translate(delta.x, delta.y)])?;
        self.shift_cached_ports(delta);
        debug!("moved {} by {delta}", self.label());
        Ok(())
    }

    /// Rotates the instance counter-clockwise by `angle` degrees about `center`.
    ///
    /// A zero angle leaves the transformation untouched.
    pub fn rotate(&self, angle: f64, center: impl Into<Anchor>) -> Result<&Self> {
        let center = center.into();
        with_err_context(self.rotate_inner(angle, &center), || self.move_context())?;
        Ok(self)
    }

    fn rotate_inner(&self, angle: f64, center: &Anchor) -> Result<()> {
        if !angle.is_finite() {
            return Err(
                ErrorSource::InvalidArgs(format!("rotation angle `{angle}` is not finite")).into(),
            );
        }
        if angle == 0. {
            return self.ensure_valid();
        }
        let ports = self.ports()?;
        let c = center.resolve(&ports, Role::Origin)?;
        ensure_finite("rotation center", c)?;
        self.apply(&[Transformation::rotate_about(angle, c)])?;
        debug!("rotated {} by {angle} about {c}", self.label());
        Ok(())
    }

    /// Mirrors the instance about the line through `p1` and `p2`.
    pub fn mirror(&self, p1: impl Into<Point>, p2: impl Into<Point>) -> Result<&Self> {
        let (p1, p2) = (p1.into(), p2.into());
        with_err_context(self.mirror_inner(p1, p2), || self.move_context())?;
        Ok(self)
    }

    /// Mirrors the instance about the vertical line `x = x0`.
    pub fn mirror_x(&self, x0: f64) -> Result<&Self> {
        self.mirror((x0, 0.), (x0, 1.))
    }

    /// Mirrors the instance about the horizontal line `y = y0`.
    pub fn mirror_y(&self, y0: f64) -> Result<&Self> {
        self.mirror((0., y0), (1., y0))
    }

    fn mirror_inner(&self, p1: Point, p2: Point) -> Result<()> {
        self.ensure_valid()?;
        ensure_finite("mirror point", p1)?;
        ensure_finite("mirror point", p2)?;
        if p1 == p2 {
            return Err(ErrorSource::InvalidArgs(format!(
                "cannot mirror about the line through {p1} and itself"
            ))
            .into());
        }
        self.apply(&[Transformation::reflect_about(p1, p2)])?;
        debug!("mirrored {} about {p1} -> {p2}", self.label());
        Ok(())
    }

    /// Rotates and moves the instance so that `port` faces `destination` and
    /// sits on its center.
    ///
    /// A positive `overlap` pushes the instance that far past the destination
    /// port, into the design it belongs to. A negative one leaves a gap.
    pub fn connect(
        &self,
        port: impl Into<PortRef>,
        destination: &Port,
        overlap: f64,
    ) -> Result<&Self> {
        let port = port.into();
        with_err_context(self.connect_inner(&port, destination, overlap), || {
            ErrorContext::Connect {
                port: port.label(),
                template: self.template().name(),
            }
        })?;
        Ok(self)
    }

    fn connect_inner(&self, port: &PortRef, destination: &Port, overlap: f64) -> Result<()> {
        let ports = self.ports()?;
        let p = port.resolve(&ports)?;
        ensure_finite("destination port center", destination.center())?;
        if !destination.orientation().is_finite() || !overlap.is_finite() {
            return Err(ErrorSource::InvalidArgs(format!(
                "cannot connect to orientation `{}` with overlap `{overlap}`",
                destination.orientation()
            ))
            .into());
        }

        let mut steps = Vec::with_capacity(3);
        let angle = wrap_angle(180. + destination.orientation() - p.orientation());
        if angle != 0. {
            steps.push(Transformation::rotate_about(angle, p.center()));
        }
        let delta = destination.center() - p.center();
        steps.push(Transformation::translate(delta.x, delta.y));
        if overlap != 0. {
            let shift = Point::unit(destination.orientation()) * -overlap;
            steps.push(Transformation::translate(shift.x, shift.y));
        }
        self.apply(&steps)?;
        debug!(
            "connected {} of {} to {}",
            p.name(),
            self.label(),
            destination
        );
        Ok(())
    }
}

fn ensure_finite(what: &str, pt: Point) -> Result<()> {
    if pt.x.is_finite() && pt.y.is_finite() {
        Ok(())
    } else {
        Err(ErrorSource::InvalidArgs(format!("{what} {pt} is not finite")).into())
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::layout::context::Library;
    use crate::layout::design::Design;
    use crate::layout::instance::InstanceOpts;

    fn straight(lib: &Library) -> Design {
        let d = lib.design("straight");
        d.add_port(Port::new("o1", (0., 0.), 180., 0.5)).unwrap();
        d.add_port(Port::new("o2", (10., 0.), 0., 0.5)).unwrap();
        d
    }

    fn placed() -> (Library, Design, Instance) {
        let lib = Library::new();
        let wg = straight(&lib);
        let top = lib.design("top");
        let inst = top.add_instance(&wg, Transformation::identity()).unwrap();
        (lib, top, inst)
    }

    #[test]
    fn connect_docks_port_on_destination() {
        let (_lib, _top, inst) = placed();
        let dest = Port::new("dest", (5., 5.), 90., 0.5);
        inst.connect("o1", &dest, 0.).unwrap();

        let o1 = inst.port("o1").unwrap();
        let o2 = inst.port("o2").unwrap();
        assert_float_eq!(o1.x(), 5., abs <= 1e-9);
        assert_float_eq!(o1.y(), 5., abs <= 1e-9);
        assert_eq!(o1.orientation(), 270.);
        assert_float_eq!(o2.x(), 5., abs <= 1e-9);
        assert_float_eq!(o2.y(), 15., abs <= 1e-9);
        assert_eq!(o2.orientation(), 90.);
    }

    #[test]
    fn connect_overlap_pushes_into_destination() {
        let (_lib, _top, inst) = placed();
        let dest = Port::new("dest", (0., 0.), 0., 0.5);
        inst.connect("o1", &dest, 1.).unwrap();
        assert_float_eq!(inst.port("o1").unwrap().x(), -1., abs <= 1e-9);

        inst.connect("o1", &dest, -1.).unwrap();
        assert_float_eq!(inst.port("o1").unwrap().x(), 1., abs <= 1e-9);
    }

    #[test]
    fn connect_accepts_port_values() {
        let (lib, top, inst) = placed();
        let o2 = inst.port("o2").unwrap();
        let dest = Port::new("dest", (0., 0.), 180., 0.5);
        inst.connect(&o2, &dest, 0.).unwrap();
        assert_float_eq!(inst.port("o2").unwrap().x(), 0., abs <= 1e-9);
        assert_eq!(inst.port("o2").unwrap().orientation(), 0.);

        // A template port matches by name.
        let other = top
            .add_instance(&straight(&lib), Transformation::identity())
            .unwrap();
        let template_port = other.template().port("o2").unwrap();
        other.connect(template_port, &inst.port("o1").unwrap(), 0.).unwrap();
        let docked = other.port("o2").unwrap();
        assert_float_eq!(docked.x(), -10., abs <= 1e-9);
        assert_eq!(docked.orientation(), 0.);
    }

    #[test]
    fn connect_unknown_port_lists_names() {
        let (_lib, _top, inst) = placed();
        let before = inst.transformation().unwrap();
        let err = inst
            .connect("o3", &Port::new("dest", (5., 5.), 90., 0.5), 0.)
            .unwrap_err();
        match err.source() {
            ErrorSource::UnknownPort { name, available } => {
                assert_eq!(name.as_str(), "o3");
                assert_eq!(available.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.context(), [ErrorContext::Connect { .. }]));
        assert_eq!(inst.transformation().unwrap(), before);
    }

    #[test]
    fn move_resolves_anchors() {
        let (_lib, _top, inst) = placed();
        inst.move_to((3., 4.)).unwrap();
        assert_eq!(inst.origin().unwrap(), Point::new(3., 4.));

        inst.move_from_to("o2", (0., 0.)).unwrap();
        assert_eq!(inst.port("o2").unwrap().center(), Point::zero());

        let o1 = inst.port("o1").unwrap();
        inst.move_along(&o1, (100., 100.), Some(Axis::X)).unwrap();
        assert_eq!(inst.port("o1").unwrap().center(), Point::new(100., 0.));
        inst.move_along("o1", (0., -7.), Some(Axis::Y)).unwrap();
        assert_eq!(inst.port("o1").unwrap().center(), Point::new(100., -7.));
    }

    #[test]
    fn move_rejects_unknown_names() {
        let (_lib, _top, inst) = placed();
        let err = inst.move_from_to("nope", (0., 0.)).unwrap_err();
        assert!(matches!(err.source(), ErrorSource::AmbiguousOrigin { .. }));
        let err = inst.move_from_to((0., 0.), "nope").unwrap_err();
        assert!(matches!(
            err.source(),
            ErrorSource::AmbiguousDestination { available, .. } if available.len() == 2
        ));
        assert_eq!(inst.origin().unwrap(), Point::zero());
    }

    #[test]
    fn rotate_zero_is_noop() {
        let (_lib, _top, inst) = placed();
        inst.move_to((1.5, -2.)).unwrap();
        let trans = inst.transformation().unwrap();
        let ports = inst.ports().unwrap();
        inst.rotate(0., (7., 7.)).unwrap();
        assert_eq!(inst.transformation().unwrap(), trans);
        assert_eq!(inst.ports().unwrap(), ports);
    }

    #[test]
    fn rotate_about_port() {
        let (_lib, _top, inst) = placed();
        inst.rotate(90., "o2").unwrap();
        assert_eq!(inst.port("o2").unwrap().center(), Point::new(10., 0.));
        assert_eq!(inst.port("o1").unwrap().center(), Point::new(10., -10.));
        assert_eq!(inst.port("o1").unwrap().orientation(), 270.);
        assert_eq!(inst.rotation().unwrap(), 90.);
    }

    #[test]
    fn mirror_axis_helpers() {
        let (_lib, _top, inst) = placed();
        inst.mirror_x(20.).unwrap();
        let o2 = inst.port("o2").unwrap();
        assert_float_eq!(o2.x(), 30., abs <= 1e-9);
        assert_float_eq!(o2.orientation(), 180., abs <= 1e-9);
        assert!(inst.is_mirrored().unwrap());

        inst.mirror_y(1.).unwrap();
        let o2 = inst.port("o2").unwrap();
        assert_float_eq!(o2.y(), 2., abs <= 1e-9);
        assert!(!inst.is_mirrored().unwrap());
    }

    #[test]
    fn mirror_rejects_degenerate_line() {
        let (_lib, _top, inst) = placed();
        let err = inst.mirror((1., 1.), (1., 1.)).unwrap_err();
        assert!(matches!(err.source(), ErrorSource::InvalidArgs(_)));
    }

    #[test]
    fn non_finite_inputs_leave_instance_unchanged() {
        let (_lib, _top, inst) = placed();
        inst.move_to((2., 3.)).unwrap();
        let before = inst.transformation().unwrap();
        let ports = inst.ports().unwrap();
        let dest = Port::new("dest", (5., 5.), 90., 0.5);
        for err in [
            inst.move_to((f64::NAN, 0.)).unwrap_err(),
            inst.move_from_to((0., f64::INFINITY), (1., 1.)).unwrap_err(),
            inst.move_along("o1", (f64::NAN, 0.), Some(Axis::X)).unwrap_err(),
            inst.rotate(f64::NAN, (0., 0.)).unwrap_err(),
            inst.rotate(90., (f64::NAN, 0.)).unwrap_err(),
            inst.mirror((f64::NAN, 0.), (1., 1.)).unwrap_err(),
            inst.mirror_x(f64::INFINITY).unwrap_err(),
            inst.connect("o1", &dest, f64::NAN).unwrap_err(),
            inst.connect("o1", &Port::new("dest", (f64::NAN, 5.), 90., 0.5), 0.)
                .unwrap_err(),
            inst.connect("o1", &Port::new("dest", (5., 5.), f64::NAN, 0.5), 0.)
                .unwrap_err(),
        ] {
            assert!(matches!(err.source(), ErrorSource::InvalidArgs(_)), "{err}");
        }
        assert_eq!(inst.transformation().unwrap(), before);
        assert_eq!(inst.ports().unwrap(), ports);
    }

    #[test]
    fn placement_on_invalid_instance_fails() {
        let (_lib, top, inst) = placed();
        top.remove_instance(&inst).unwrap();
        let dest = Port::new("dest", (5., 5.), 90., 0.5);
        for err in [
            inst.move_to((1., 1.)).unwrap_err(),
            inst.rotate(0., (0., 0.)).unwrap_err(),
            inst.rotate(45., (0., 0.)).unwrap_err(),
            inst.mirror_x(0.).unwrap_err(),
            inst.connect("o1", &dest, 0.).unwrap_err(),
        ] {
            assert!(matches!(err.source(), ErrorSource::InvalidReference { .. }));
        }
    }

    #[test]
    fn arrays_keep_their_pitch_when_rotated() {
        let lib = Library::new();
        let wg = straight(&lib);
        wg.add_rect((1, 0), placegeom::Rect::new(Point::new(0., -1.), Point::new(10., 1.)))
            .unwrap();
        let top = lib.design("top");
        let inst = top
            .add_instance_with(
                &wg,
                InstanceOpts::builder()
                    .columns(2)
                    .spacing((20., 0.))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        inst.rotate(90., (0., 0.)).unwrap();
        let bbox = inst.bbox().unwrap();
        assert_float_eq!(bbox.p0.x, -1., abs <= 1e-9);
        assert_float_eq!(bbox.p1.y, 30., abs <= 1e-9);
    }
}
