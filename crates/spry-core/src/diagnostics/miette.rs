//! Miette diagnostic conversion for build errors.

use miette::Diagnostic;
use std::fmt::Display;

use super::{BuildError, BuildStage};

impl Diagnostic for BuildError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let code = match self.stage {
            BuildStage::Resolve => "spry::resolve",
            BuildStage::Load => "spry::load",
            BuildStage::Transform => "spry::transform",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        match (&self.hint, &self.code_frame) {
            (Some(hint), Some(frame)) => Some(Box::new(format!("{frame}\n\n{hint}"))),
            (Some(hint), None) => Some(Box::new(hint)),
            (None, Some(frame)) => Some(Box::new(frame)),
            (None, None) => None,
        }
    }
}
