/*!
 * Type/attribute classifier.
 *
 * Builds a fully populated [`DeviceNode`] from a raw discovery record: the
 * subsystem label selects the kind, the kind's decoder fills in IDs and bits,
 * and the hwdb properties provide vendor and name.
 */
use std::collections::HashMap;

use tracing::trace;

use ldm_core::error::Result;

use crate::decoders::{self, KindDecoder, RawDevice};
use crate::device::{Decoded, DeviceNode};
use crate::kind::Subsystem;

/// Classifier with one decoder per device kind
#[derive(Debug)]
pub struct Classifier {
    decoders: HashMap<Subsystem, Box<dyn KindDecoder>>,
}

impl Classifier {
    /// A classifier with the built-in decoders installed
    pub fn new() -> Self {
        decoders::builtin()
            .into_iter()
            .fold(Self::empty(), |classifier, decoder| classifier.with_decoder(decoder))
    }

    /// A classifier without any decoders; every node only gets its
    /// properties and the fallback name
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Install a decoder, replacing the one registered for the same kind
    pub fn with_decoder(mut self, decoder: Box<dyn KindDecoder>) -> Self {
        self.decoders.insert(decoder.subsystem(), decoder);
        self
    }

    /// Pick the kind for a raw subsystem label
    pub fn specialize(&self, label: &str) -> Subsystem {
        Subsystem::specialize(label)
    }

    /// Build the node for a raw record.
    ///
    /// `parent` must be the node the result will be attached to, if any.
    pub fn classify(&self, parent: Option<&DeviceNode>, raw: &RawDevice) -> Result<DeviceNode> {
        let subsystem = self.specialize(&raw.subsystem);

        let mut node = DeviceNode::new(
            parent,
            raw.path.clone(),
            raw.modalias.clone(),
            raw.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )?;

        let decoded = match (subsystem, self.decoders.get(&subsystem)) {
            (Subsystem::Generic, _) | (_, None) => Decoded::default(),
            (_, Some(decoder)) => decoder.decode(raw),
        };
        node.apply(subsystem, decoded);

        trace!(
            path = %node.path(),
            subsystem = ?subsystem,
            device_type = ?node.device_type(),
            attributes = ?node.attributes(),
            "Classified device"
        );

        Ok(node)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
