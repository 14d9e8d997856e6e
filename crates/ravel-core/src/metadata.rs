//! Message structure as it was opened.
//!
//! [`MessageMetadata`] is a tree that mirrors the nesting of the message:
//! an encryption layer contains what it decrypted to, a compression layer
//! what it expanded to. Signatures sit next to the data they cover, at the
//! level where they appeared.
//!
//! # Invariants
//!
//! - Only layers that were successfully opened are recorded
//! - Metadata is handed out only for a fully consumed, grammatically valid
//!   message

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ravel_proto::{
    AeadAlgorithm, CompressionAlgorithm, KeyIdentifier, LiteralData, LiteralFormat,
    SymmetricAlgorithm,
};
use serde::{Deserialize, Serialize};

use crate::{error::Error, resolver::KeySource, signatures::SignatureVerification};

/// Path from the root to a node, as child indices.
///
/// The empty path is the top level of the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerPosition(Vec<usize>);

impl LayerPosition {
    /// Top level of the message.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Number of enclosing layers.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Child indices from the root.
    pub fn path(&self) -> &[usize] {
        &self.0
    }
}

/// How decrypted data was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityProtection {
    /// SHA-1 modification detection code (version 1 encrypted data).
    Mdc,
    /// Chunked AEAD (version 2 encrypted data).
    Aead(AeadAlgorithm),
}

/// An opened encryption layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionLayer {
    /// Data cipher.
    pub algorithm: SymmetricAlgorithm,
    /// Integrity mechanism.
    pub integrity: IntegrityProtection,
    /// Credential that produced the session key.
    pub key_source: KeySource,
}

/// An expanded compression layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLayer {
    /// Compression algorithm.
    pub algorithm: CompressionAlgorithm,
}

/// Header of the literal data packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralDataInfo {
    /// File name hint, lossily decoded as UTF-8.
    pub filename: String,
    /// Data format hint.
    pub format: LiteralFormat,
    /// Modification time. `None` when the packet carries zero.
    pub modification_time: Option<SystemTime>,
}

impl From<&LiteralData> for LiteralDataInfo {
    fn from(packet: &LiteralData) -> Self {
        let modification_time = (packet.modification_time != 0)
            .then(|| UNIX_EPOCH + Duration::from_secs(u64::from(packet.modification_time)));
        Self {
            filename: String::from_utf8_lossy(&packet.filename).into_owned(),
            format: packet.format,
            modification_time,
        }
    }
}

/// One node of the metadata tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    /// Encrypted data, children are the decrypted message.
    Encryption(EncryptionLayer),
    /// Compressed data, children are the expanded message.
    Compression(CompressionLayer),
    /// The payload.
    Literal(LiteralDataInfo),
    /// A signature and the outcome of verifying it.
    Signature(SignatureVerification),
}

impl Layer {
    /// Whether the layer encloses a nested message.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Encryption(_) | Self::Compression(_))
    }
}

/// A layer and what it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerNode {
    /// This layer.
    pub layer: Layer,
    /// Nested layers, in message order.
    pub children: Vec<LayerNode>,
}

/// Structure and verification results of a consumed message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    layers: Vec<LayerNode>,
}

impl MessageMetadata {
    /// Top-level layers.
    pub fn layers(&self) -> &[LayerNode] {
        &self.layers
    }

    /// Every layer, depth first in message order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        let mut stack: Vec<&LayerNode> = self.layers.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(&node.layer)
        })
    }

    /// Whether any layer was encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption().is_some()
    }

    /// Whether the message carries at least one signature.
    pub fn is_signed(&self) -> bool {
        self.iter().any(|layer| matches!(layer, Layer::Signature(_)))
    }

    /// True if there is at least one signature and every signature verified.
    pub fn is_verified(&self) -> bool {
        let signatures = self.signatures();
        !signatures.is_empty() && signatures.iter().all(|s| s.verified)
    }

    /// Whether a verified signature was made by the key `id`.
    pub fn is_verified_signed_by(&self, id: &KeyIdentifier) -> bool {
        self.verified_signatures()
            .iter()
            .any(|s| s.signer.is_some_and(|signer| id.matches_fingerprint(&signer)))
    }

    /// Every signature, in message order.
    pub fn signatures(&self) -> Vec<&SignatureVerification> {
        self.iter()
            .filter_map(|layer| match layer {
                Layer::Signature(verification) => Some(verification),
                _ => None,
            })
            .collect()
    }

    /// Signatures that verified.
    pub fn verified_signatures(&self) -> Vec<&SignatureVerification> {
        self.signatures().into_iter().filter(|s| s.verified).collect()
    }

    /// Signatures that did not verify.
    pub fn rejected_signatures(&self) -> Vec<&SignatureVerification> {
        self.signatures().into_iter().filter(|s| !s.verified).collect()
    }

    /// Literal data header.
    pub fn literal_data(&self) -> Option<&LiteralDataInfo> {
        self.iter().find_map(|layer| match layer {
            Layer::Literal(info) => Some(info),
            _ => None,
        })
    }

    /// File name hint of the literal data.
    pub fn filename(&self) -> Option<&str> {
        self.literal_data().map(|info| info.filename.as_str())
    }

    /// Outermost encryption layer.
    pub fn encryption(&self) -> Option<&EncryptionLayer> {
        self.iter().find_map(|layer| match layer {
            Layer::Encryption(encryption) => Some(encryption),
            _ => None,
        })
    }

    /// Compression algorithms, outermost first.
    pub fn compression_algorithms(&self) -> Vec<CompressionAlgorithm> {
        self.iter()
            .filter_map(|layer| match layer {
                Layer::Compression(compression) => Some(compression.algorithm),
                _ => None,
            })
            .collect()
    }
}

/// Builds [`MessageMetadata`] while a message is consumed.
#[derive(Debug, Default)]
pub struct MetadataAggregator {
    metadata: MessageMetadata,
    current: Vec<usize>,
}

impl MetadataAggregator {
    /// Empty tree positioned at the top level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container the next layer is recorded into.
    pub fn position(&self) -> LayerPosition {
        LayerPosition(self.current.clone())
    }

    /// Records a layer at the current position. Containers become the new
    /// current position.
    pub fn record(&mut self, layer: Layer) {
        let container = layer.is_container();
        let children = children_at(&mut self.metadata.layers, &self.current);
        children.push(LayerNode { layer, children: Vec::new() });
        if container {
            self.current.push(children.len() - 1);
        }
    }

    /// Records a leaf layer under the container at `position`.
    pub fn record_at(&mut self, position: &LayerPosition, layer: Layer) {
        children_at(&mut self.metadata.layers, &position.0)
            .push(LayerNode { layer, children: Vec::new() });
    }

    /// Leaves the current container.
    pub fn close_layer(&mut self) {
        self.current.pop();
    }

    /// Hands out the tree of a message whose grammar was accepted.
    pub fn finalize(self, syntax_valid: bool) -> Result<MessageMetadata, Error> {
        if !syntax_valid {
            return Err(Error::Incomplete);
        }
        Ok(self.metadata)
    }
}

/// Children of the node at `path`, stopping early at an out-of-range index.
fn children_at<'t>(layers: &'t mut Vec<LayerNode>, path: &[usize]) -> &'t mut Vec<LayerNode> {
    match path.split_first() {
        Some((&index, rest)) if index < layers.len() => {
            children_at(&mut layers[index].children, rest)
        },
        _ => layers,
    }
}
