#![allow(dead_code)]

use cellplace::deps::placegeom::{Point, Rect};
use cellplace::{Design, Library, Port};
use float_eq::assert_float_eq;

pub const WG_LAYER: (i32, i32) = (1, 0);

/// A 10um straight waveguide with `o1` facing west at the origin and `o2`
/// facing east at `(10, 0)`.
pub fn straight(lib: &Library) -> Design {
    let d = lib.design("straight");
    d.add_rect(
        WG_LAYER,
        Rect::new(Point::new(0., -0.25), Point::new(10., 0.25)),
    )
    .unwrap();
    d.add_port(Port::new("o1", (0., 0.), 180., 0.5).with_layer(WG_LAYER))
        .unwrap();
    d.add_port(Port::new("o2", (10., 0.), 0., 0.5).with_layer(WG_LAYER))
        .unwrap();
    d
}

/// A 90 degree bend turning left with a 10um radius.
pub fn bend(lib: &Library) -> Design {
    let d = lib.design("bend");
    d.add_polygon(
        WG_LAYER,
        [(0., -0.25), (10.25, -0.25), (10.25, 10.), (9.75, 10.), (9.75, 0.25), (0., 0.25)],
    )
    .unwrap();
    d.add_port(Port::new("o1", (0., 0.), 180., 0.5).with_layer(WG_LAYER))
        .unwrap();
    d.add_port(Port::new("o2", (10., 10.), 90., 0.5).with_layer(WG_LAYER))
        .unwrap();
    d
}

/// Angles are compared on the circle so that `359.999...` matches `0`.
pub fn assert_angle_eq(a: f64, b: f64) {
    let d = (a - b).rem_euclid(360.);
    assert!(
        d < 1e-9 || 360. - d < 1e-9,
        "angles differ: {a} != {b}"
    );
}

pub fn assert_port_eq(a: &Port, b: &Port) {
    assert_eq!(a.name(), b.name());
    assert_float_eq!(a.x(), b.x(), abs <= 1e-9);
    assert_float_eq!(a.y(), b.y(), abs <= 1e-9);
    assert_angle_eq(a.orientation(), b.orientation());
}

pub fn assert_ports_eq<'a>(
    a: impl IntoIterator<Item = &'a Port>,
    b: impl IntoIterator<Item = &'a Port>,
) {
    let a: Vec<_> = a.into_iter().collect();
    let b: Vec<_> = b.into_iter().collect();
    assert_eq!(a.len(), b.len());
    for (a, b) in a.into_iter().zip(b) {
        assert_port_eq(a, b);
    }
}
