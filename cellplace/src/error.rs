use std::fmt::{Debug, Display};

use itertools::Itertools;
use thiserror::Error;

use crate::deps::arcstr::ArcStr;
use crate::layout::kernel::KernelError;
use crate::layout::port::PortError;

pub type Result<T> = std::result::Result<T, CellplaceError>;

pub struct CellplaceError {
    pub(crate) source: ErrorSource,
    pub(crate) context: Vec<ErrorContext>,
}

impl CellplaceError {
    pub fn source(&self) -> &ErrorSource {
        &self.source
    }

    pub fn context(&self) -> &[ErrorContext] {
        &self.context
    }
}

impl std::error::Error for CellplaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl Display for CellplaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Error:\n{}", self.source)?;
        if !self.context.is_empty() {
            writeln!(f, "\nError occurred:")?;
            for item in self.context.iter() {
                writeln!(f, "\twhile {}", item)?;
            }
        }
        Ok(())
    }
}

impl Debug for CellplaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.source)?;
        if !self.context.is_empty() {
            writeln!(f, "\nError occurred:")?;
            for (i, item) in self.context.iter().enumerate() {
                writeln!(f, "\t{}: {:?}", i, item)?;
            }
        }
        Ok(())
    }
}

impl<T> From<T> for CellplaceError
where
    T: Into<ErrorSource>,
{
    fn from(value: T) -> Self {
        Self {
            source: value.into(),
            context: Vec::new(),
        }
    }
}

impl CellplaceError {
    pub fn new(source: impl Into<ErrorSource>) -> Self {
        Self {
            source: source.into(),
            context: Vec::new(),
        }
    }

    pub fn from_context(source: impl Into<ErrorSource>, ctx: impl Into<ErrorContext>) -> Self {
        Self {
            source: source.into(),
            context: vec![ctx.into()],
        }
    }

    pub fn with_context(mut self, ctx: impl Into<ErrorContext>) -> Self {
        self.context.push(ctx.into());
        self
    }

    #[inline]
    pub fn into_inner(self) -> ErrorSource {
        self.source
    }
}

#[inline]
pub fn with_err_context<T, E, C>(result: std::result::Result<T, E>, ctx: C) -> Result<T>
where
    C: FnOnce() -> ErrorContext,
    E: Into<CellplaceError>,
{
    result.map_err(|err| err.into().with_context(ctx()))
}

/// What the library was doing when an error occurred.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ErrorContext {
    Connect {
        port: ArcStr,
        template: ArcStr,
    },
    Move {
        template: ArcStr,
    },
    Insert {
        design: ArcStr,
        template: ArcStr,
    },
    LoadConfig,
    Task(ArcStr),
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorContext::*;
        match self {
            Connect { port, template } => {
                write!(f, "connecting port {port} of an instance of {template}")
            }
            Move { template } => write!(f, "moving an instance of {template}"),
            Insert { design, template } => {
                write!(f, "inserting an instance of {template} into {design}")
            }
            LoadConfig => write!(f, "loading library configuration"),
            Task(task) => write!(f, "{task}"),
        }
    }
}

/// Formats a list of port names for diagnostics.
pub(crate) struct PortNames<'a>(pub(crate) &'a [ArcStr]);

impl Display for PortNames<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorSource {
    #[error(
        "the instance in design `{owner}` (referencing design `{template}`) is no longer valid; \
         it has been removed or its owner has been flattened or dropped"
    )]
    InvalidReference { owner: ArcStr, template: ArcStr },

    #[error("origin `{anchor}` is not a coordinate, a port, or one of the port names {}", PortNames(.available))]
    AmbiguousOrigin {
        anchor: String,
        available: Vec<ArcStr>,
    },

    #[error("destination `{anchor}` is not a coordinate, a port, or one of the port names {}", PortNames(.available))]
    AmbiguousDestination {
        anchor: String,
        available: Vec<ArcStr>,
    },

    #[error("no port named `{name}`; ports available are {}", PortNames(.available))]
    UnknownPort { name: ArcStr, available: Vec<ArcStr> },

    #[error("design `{owner}` already has an instance named `{name}`")]
    DuplicateName { name: ArcStr, owner: ArcStr },

    #[error("instance `{instance}` is already owned by design `{current}` and cannot be moved to `{attempted}`")]
    OwnerReassignment {
        instance: ArcStr,
        current: ArcStr,
        attempted: ArcStr,
    },

    #[error("design `{template}` cannot be placed inside `{parent}`, which it already contains")]
    RecursiveInstance { parent: ArcStr, template: ArcStr },

    #[error("invalid design (enable logging for details): {0}")]
    InvalidDesign(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("error accessing port: {0}")]
    Port(#[from] PortError),

    #[error("geometry kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("error parsing TOML: {0}")]
    TomlParsing(#[from] toml::de::Error),
}
