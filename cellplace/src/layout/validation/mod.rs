use std::fmt::Display;

use super::design::Design;
use super::instance::Instance;
use super::port::Port;
use crate::deps::arcstr::ArcStr;
use crate::log::Log;
use crate::validation::ValidatorOutput;

/// Validates a design's ports and child instances.
pub fn validate_design(design: &Design) -> DesignValidatorOutput {
    DesignValidator { design }.validate()
}

pub struct DesignValidator<'a> {
    design: &'a Design,
}

pub type DesignValidatorOutput = ValidatorOutput<Warning, Error>;

/// An error location.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Location {
    design: ArcStr,
    item: Item,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum Item {
    Port(ArcStr),
    Instance(ArcStr),
}

impl Location {
    /// Creates a [`Location`] pointing at a port.
    pub fn port(design: impl Into<ArcStr>, port: impl Into<ArcStr>) -> Self {
        Self {
            design: design.into(),
            item: Item::Port(port.into()),
        }
    }

    /// Creates a [`Location`] pointing at a child instance.
    pub fn instance(design: impl Into<ArcStr>, instance: impl Into<ArcStr>) -> Self {
        Self {
            design: design.into(),
            item: Item::Instance(instance.into()),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.item {
            Item::Port(ref port) => write!(f, "design {}, port {}", self.design, port),
            Item::Instance(ref inst) => write!(f, "design {}, instance {}", self.design, inst),
        }
    }
}

/// Data for a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    loc: Location,
    cause: WarningCause,
}

/// An enumeration of causes for a warning.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum WarningCause {
    /// A port whose width is zero or negative.
    NonPositiveWidth(f64),
    /// A port whose center is not on the database grid.
    OffGrid { dbu: f64 },
}

impl Warning {
    /// Creates a new [`Warning`].
    pub fn new(loc: Location, cause: WarningCause) -> Self {
        Self { loc, cause }
    }

    #[inline]
    pub fn cause(&self) -> &WarningCause {
        &self.cause
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cause {
            WarningCause::NonPositiveWidth(width) => {
                write!(f, "port has non-positive width {width}: {}", self.loc)
            }
            WarningCause::OffGrid { dbu } => {
                write!(f, "port center is off the {dbu} grid: {}", self.loc)
            }
        }
    }
}

impl Log for Warning {
    fn log(&self) {
        use crate::log::warn;
        warn!("{self}");
    }
}

/// Data for an error.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Error {
    loc: Location,
    cause: ErrorCause,
}

/// An enumeration of causes for an error.
#[non_exhaustive]
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ErrorCause {
    /// A child instance whose kernel handle was destroyed.
    InvalidInstance,
    /// A child instance whose transformation is not finite.
    NonFiniteTransformation,
}

impl Error {
    /// Creates a new [`Error`].
    pub fn new(loc: Location, cause: ErrorCause) -> Self {
        Self { loc, cause }
    }

    #[inline]
    pub fn cause(&self) -> &ErrorCause {
        &self.cause
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cause {
            ErrorCause::InvalidInstance => {
                write!(f, "child instance is no longer valid: {}", self.loc)
            }
            ErrorCause::NonFiniteTransformation => {
                write!(f, "child instance has a non-finite transformation: {}", self.loc)
            }
        }
    }
}

impl Log for Error {
    fn log(&self) {
        use crate::log::error;
        error!("{self}");
    }
}

impl<'a> DesignValidator<'a> {
    fn validate(&self) -> DesignValidatorOutput {
        let mut output = DesignValidatorOutput::default();
        let name = self.design.name();
        for port in self.design.ports().values() {
            self.validate_port(&name, port, &mut output);
        }
        for inst in self.design.instances() {
            self.validate_instance(&name, &inst, &mut output);
        }
        output
    }

    fn validate_port(&self, design: &ArcStr, port: &Port, output: &mut DesignValidatorOutput) {
        if port.width() <= 0. {
            output.warnings.push(Warning::new(
                Location::port(design.clone(), port.name().clone()),
                WarningCause::NonPositiveWidth(port.width()),
            ));
        }
        let dbu = self.design.library().config().dbu();
        if port.center().snap_to_grid(dbu).distance(port.center()) > dbu * 1e-6 {
            output.warnings.push(Warning::new(
                Location::port(design.clone(), port.name().clone()),
                WarningCause::OffGrid { dbu },
            ));
        }
    }

    fn validate_instance(
        &self,
        design: &ArcStr,
        inst: &Instance,
        output: &mut DesignValidatorOutput,
    ) {
        let loc = Location::instance(design.clone(), inst.label());
        match inst.transformation() {
            Err(_) => output
                .errors
                .push(Error::new(loc, ErrorCause::InvalidInstance)),
            Ok(trans) => {
                let finite = trans
                    .a
                    .iter()
                    .flatten()
                    .chain(trans.b.iter())
                    .all(|v| v.is_finite());
                if !finite {
                    output
                        .errors
                        .push(Error::new(loc, ErrorCause::NonFiniteTransformation));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use placegeom::transform::Transformation;

    use super::*;
    use crate::error::ErrorSource;
    use crate::layout::context::Library;

    #[test]
    fn reports_suspicious_ports() {
        let lib = Library::new();
        let d = lib.design("d");
        d.add_port(Port::new("ok", (1., 2.), 0., 0.5)).unwrap();
        d.add_port(Port::new("thin", (0., 0.), 0., 0.)).unwrap();
        d.add_port(Port::new("off", (0.0004, 0.), 0., 0.5)).unwrap();

        let output = d.validate();
        assert!(!output.has_errors());
        assert_eq!(output.warnings().len(), 2);
        assert!(output
            .warnings()
            .iter()
            .any(|w| matches!(w.cause(), WarningCause::NonPositiveWidth(_))));
        assert!(output
            .warnings()
            .iter()
            .any(|w| matches!(w.cause(), WarningCause::OffGrid { .. })));
        d.check().unwrap();
    }

    #[test]
    fn reports_broken_instances() {
        let lib = Library::new();
        let leaf = lib.design("leaf");
        let top = lib.design("top");
        let a = top.add_instance(&leaf, Transformation::identity()).unwrap();
        let b = top.add_instance(&leaf, Transformation::identity()).unwrap();
        assert!(!top.validate().has_errors());

        // Placement rejects non-finite input, so corrupt the kernel directly.
        lib.kernel_mut()
            .set_transformation(a.handle(), Transformation::translate(f64::NAN, 0.))
            .unwrap();
        lib.kernel_mut().destroy(b.handle());

        let output = top.validate();
        let causes: Vec<_> = output.errors().iter().map(|e| e.cause().clone()).collect();
        assert_eq!(
            causes,
            [ErrorCause::NonFiniteTransformation, ErrorCause::InvalidInstance]
        );
        let err = top.check().unwrap_err();
        assert!(matches!(err.source(), ErrorSource::InvalidDesign(_)));
    }
}
