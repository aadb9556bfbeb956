mod common;

use cellplace::deps::placegeom::transform::Transformation;
use cellplace::deps::placegeom::Point;
use cellplace::layout::port::{PortConflictStrategy, PortFilter};
use cellplace::{ErrorSource, Library, Port, PortType};
use common::straight;

#[test]
fn template_changes_show_up_on_next_access() {
    let lib = Library::new();
    let wg = straight(&lib);
    let top = lib.design("top");
    let inst = top
        .add_instance(&wg, Transformation::translate(0., 5.))
        .unwrap();
    let o1_uid = inst.port("o1").unwrap().uid();

    wg.remove_port("o2").unwrap();
    let ports = inst.ports().unwrap();
    assert_eq!(ports.len(), 1);
    assert!(!ports.contains_key("o2"));

    wg.add_port(Port::new("o3", (5., 1.), 90., 0.5)).unwrap();
    let o3 = inst.port("o3").unwrap();
    assert_eq!(o3.center(), Point::new(5., 6.));
    assert_ne!(o3.uid(), wg.port("o3").unwrap().uid());

    // Edits to an existing template port propagate without changing the uid.
    wg.add_port_with_strategy(
        Port::new("o1", (-1., 0.), 180., 2.).with_port_type(PortType::Electrical),
        PortConflictStrategy::Overwrite,
    )
    .unwrap();
    let o1 = inst.port("o1").unwrap();
    assert_eq!(o1.uid(), o1_uid);
    assert_eq!(o1.center(), Point::new(-1., 5.));
    assert_eq!(o1.width(), 2.);
    assert_eq!(o1.port_type(), &PortType::Electrical);
}

#[test]
fn removed_port_is_reported_as_unknown() {
    let lib = Library::new();
    let wg = straight(&lib);
    let top = lib.design("top");
    let inst = top.add_instance(&wg, Transformation::identity()).unwrap();
    inst.ports().unwrap();
    wg.remove_port("o1").unwrap();

    let err = inst.port("o1").unwrap_err();
    assert!(matches!(err.source(), ErrorSource::UnknownPort { .. }));
    let err = inst.move_from_to("o1", (0., 0.)).unwrap_err();
    assert!(matches!(err.source(), ErrorSource::AmbiguousOrigin { .. }));
}

#[test]
fn instances_of_one_template_have_distinct_ports() {
    let lib = Library::new();
    let wg = straight(&lib);
    let top = lib.design("top");
    let a = top.add_instance(&wg, Transformation::identity()).unwrap();
    let b = top.add_instance(&wg, Transformation::identity()).unwrap();

    // A port of `a` handed to `b` resolves by name, not to `a`'s location.
    a.move_to((0., 50.)).unwrap();
    let a_o2 = a.port("o2").unwrap();
    b.connect(&a_o2, &Port::new("dest", (0., 0.), 180., 0.5), 0.)
        .unwrap();
    assert_eq!(b.port("o2").unwrap().center(), Point::zero());
    assert_eq!(a.port("o2").unwrap().center(), Point::new(10., 50.));
}

#[test]
fn select_ports_walks_clockwise() {
    let lib = Library::new();
    let d = lib.design("box");
    d.add_port(Port::new("w0", (0., 1.), 180., 0.5)).unwrap();
    d.add_port(Port::new("w1", (0., 3.), 180., 0.5)).unwrap();
    d.add_port(Port::new("n0", (2., 4.), 90., 0.5)).unwrap();
    d.add_port(Port::new("e0", (4., 3.), 0., 0.5)).unwrap();
    d.add_port(Port::new("e1", (4., 1.), 0., 0.5)).unwrap();
    d.add_port(Port::new("s0", (2., 0.), 270., 0.5).with_layer((2, 0)))
        .unwrap();
    d.add_port(Port::new("diag", (4., 4.), 45., 0.5)).unwrap();

    let names = |ports: Vec<Port>| {
        ports
            .iter()
            .map(|p| p.name().to_string())
            .collect::<Vec<_>>()
    };

    let cw = d.select_ports(&PortFilter {
        clockwise: Some(true),
        ..Default::default()
    });
    assert_eq!(names(cw), ["w0", "w1", "n0", "e0", "e1", "s0", "diag"]);

    let ccw = d.select_ports(&PortFilter {
        clockwise: Some(false),
        layers_excluded: vec![(2, 0).into()],
        ..Default::default()
    });
    assert_eq!(names(ccw), ["e1", "e0", "n0", "w1", "w0", "diag"]);

    let east = d.select_ports(&PortFilter {
        orientation: Some(360.),
        ..Default::default()
    });
    assert_eq!(names(east), ["e0", "e1"]);

    // Instance selection works on world coordinates.
    let top = lib.design("top");
    let inst = top.add_instance(&d, Transformation::rotate(90.)).unwrap();
    let north = inst
        .select_ports(&PortFilter {
            orientation: Some(90.),
            prefix: Some("e".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(names(north), ["e0", "e1"]);
}

#[test]
fn port_orientation_is_normalized() {
    for (input, expected) in [(-90., 270.), (360., 0.), (725., 5.), (-0., 0.), (-360.5, 359.5)] {
        assert_eq!(Port::new("p", (0., 0.), input, 0.5).orientation(), expected);
    }
}
