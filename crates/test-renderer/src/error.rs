use smol_str::SmolStr;
use thiserror::Error;

use crate::context::format_component_list;

/// Coarse classification of [`RendererError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The driver asked for something the host tree forbids, such as raw text
    /// outside of a text component.
    ProtocolViolation,
    /// The renderer was used after `unmount`.
    InvalidState,
    /// The tree does not have the shape the caller asked for.
    StructuralError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RendererError {
    #[error(
        "Invariant Violation: Text strings must be rendered within a {} component. Detected attempt to render \"{text}\" string within a <{parent_type}> component.",
        format_component_list(allowed)
    )]
    TextOutsideTextComponent {
        allowed: Vec<SmolStr>,
        parent_type: SmolStr,
        text: String,
    },
    #[error("Can't access .{0} on unmounted test renderer")]
    AccessAfterUnmount(&'static str),
    #[error("Cannot render after unmount")]
    RenderAfterUnmount,
    #[error("Cannot render text as root element")]
    TextAsRoot,
    #[error("Container has no children")]
    EmptyContainer,
}

impl RendererError {
    #[cold]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RendererError::TextOutsideTextComponent { .. } => ErrorKind::ProtocolViolation,
            RendererError::AccessAfterUnmount(_) => ErrorKind::InvalidState,
            RendererError::RenderAfterUnmount => ErrorKind::InvalidState,
            RendererError::TextAsRoot => ErrorKind::StructuralError,
            RendererError::EmptyContainer => ErrorKind::StructuralError,
        }
    }
}
