//! Environment properties attached to every screenshot
//!
//! Properties come from the browser capabilities through a layered extractor.
//! The innermost layer is the built-in default; each override (global, suite,
//! call) receives the capabilities together with a callable producing the
//! result of the layer just outside it, so it can adjust that result instead
//! of rebuilding it.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::browser::Capabilities;

/// Free-form property map sent with a screenshot
pub type Properties = Map<String, Value>;

type OverrideFn = dyn Fn(&Capabilities, &dyn Fn(&Capabilities) -> Properties) -> Properties + Send + Sync;

/// A properties override; receives the capabilities and the next-outer extractor
#[derive(Clone)]
pub struct PropertiesFn(Arc<OverrideFn>);

impl PropertiesFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Capabilities, &dyn Fn(&Capabilities) -> Properties) -> Properties + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Override that ignores the outer layer entirely
    pub fn replace<F>(f: F) -> Self
    where
        F: Fn(&Capabilities) -> Properties + Send + Sync + 'static,
    {
        Self::new(move |caps, _outer| f(caps))
    }
}

impl fmt::Debug for PropertiesFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PropertiesFn(..)")
    }
}

/// Default extractor composed with zero or more overrides, outermost first
#[derive(Debug, Clone, Default)]
pub struct PropertiesExtractor {
    layers: Vec<PropertiesFn>,
}

impl PropertiesExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an inner override layer; `None` leaves the extractor unchanged
    pub fn with_override(mut self, layer: Option<&PropertiesFn>) -> Self {
        if let Some(layer) = layer {
            self.layers.push(layer.clone());
        }
        self
    }

    pub fn extract(&self, capabilities: &Capabilities) -> Properties {
        self.extract_layer(self.layers.len(), capabilities)
    }

    fn extract_layer(&self, depth: usize, capabilities: &Capabilities) -> Properties {
        match depth.checked_sub(1) {
            None => default_properties(capabilities),
            Some(index) => {
                let outer = |caps: &Capabilities| self.extract_layer(index, caps);
                (self.layers[index].0)(capabilities, &outer)
            }
        }
    }
}

/// Built-in extractor: operating system, browser name and browser version
pub fn default_properties(capabilities: &Capabilities) -> Properties {
    let mut properties = Properties::new();
    let fields: [(&str, &[&str]); 3] = [
        ("os", &["platform", "platformName"]),
        ("browser", &["browserName"]),
        ("version", &["version", "browserVersion"]),
    ];
    for (property, keys) in fields {
        if let Some(value) = keys.iter().find_map(|key| capabilities.get(*key)) {
            properties.insert(property.to_string(), value.clone());
        }
    }
    properties
}
