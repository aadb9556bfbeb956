use std::fmt::Display;

use crate::log::Log;

/// The output of a validator.
#[derive(Debug)]
pub struct ValidatorOutput<W, E> {
    pub(crate) warnings: Vec<W>,
    pub(crate) errors: Vec<E>,
}

impl<W, E> Default for ValidatorOutput<W, E> {
    fn default() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<W, E> ValidatorOutput<W, E>
where
    W: Log,
    E: Log + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs all stored warning and error messages.
    pub fn log(&self) {
        for warning in self.warnings.iter() {
            warning.log();
        }
        for error in self.errors.iter() {
            error.log();
        }
    }

    #[inline]
    pub fn warnings(&self) -> &[W] {
        &self.warnings
    }

    #[inline]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    /// Returns `true` is any errors were encountered.
    #[inline]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the first encountered error as a [`String`], if any.
    pub fn first_error(&self) -> Option<String> {
        self.errors.first().map(|err| format!("{err}"))
    }
}
