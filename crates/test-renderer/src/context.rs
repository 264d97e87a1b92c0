use std::rc::Rc;

use itertools::Itertools;
use smol_str::SmolStr;

use crate::{config::ContainerConfig, error::RendererError};

pub const ROOT_CONTEXT_TYPE: &str = "ROOT";

/// Ancestry information threaded through a construction pass.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub element_type: SmolStr,
    pub is_inside_text: bool,
    pub config: Rc<ContainerConfig>,
}

impl HostContext {
    pub fn root(config: Rc<ContainerConfig>) -> Self {
        Self {
            element_type: SmolStr::new_static(ROOT_CONTEXT_TYPE),
            is_inside_text: false,
            config,
        }
    }

    /// Context for the children of an element of `element_type`.
    pub fn child(&self, element_type: &str) -> Self {
        Self {
            element_type: element_type.into(),
            is_inside_text: self.config.is_text_component(element_type),
            config: Rc::clone(&self.config),
        }
    }

    /// Checks that raw `text` may be placed here.
    pub fn validate_text(&self, text: &str) -> Result<(), RendererError> {
        if self.config.text_components.is_some() && !self.is_inside_text {
            return Err(RendererError::TextOutsideTextComponent {
                allowed: self.config.display_text_components().to_vec(),
                parent_type: self.element_type.clone(),
                text: text.to_string(),
            });
        }

        Ok(())
    }
}

/// Joins component names for diagnostics: `<A>`, `<A> or <B>`, `<A>, <B>, or <C>`.
pub fn format_component_list<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [only] => format!("<{}>", only.as_ref()),
        [first, second] => format!("<{}> or <{}>", first.as_ref(), second.as_ref()),
        [rest @ .., last] => format!(
            "{}, or <{}>",
            rest.iter().map(|name| format!("<{}>", name.as_ref())).join(", "),
            last.as_ref()
        ),
    }
}
