//! The decryption and verification pipeline.
//!
//! [`DecryptionStream`] pulls packets from a [`PacketSource`], validates
//! every layer with its own grammar automaton, opens encrypted and
//! compressed layers as they are reached and hands out the literal data
//! through [`Read`].
//!
//! # Design
//!
//! - **Frame stack**: Each open layer is a frame holding its packet source
//!   and automaton. Opening a container pushes a frame over the container's
//!   plaintext; the end of a frame's packets feeds
//!   [`InputSymbol::EndOfSequence`] to its automaton and pops it.
//! - **Open primes**: [`DecryptionStream::open`] advances until the first
//!   literal octet is available, so session key trial and every structural
//!   check before the payload happen there.
//!
//! # Invariants
//!
//! - A packet is fed to its layer's automaton before it is acted on, so no
//!   payload octet of a layer is produced before the layer's boundary was
//!   accepted
//! - Nesting never exceeds `max_nesting_depth` containers
//! - After the first error every operation fails with [`Error::Poisoned`]
//!
//! # Security Properties
//!
//! - **Authenticate before release**: Encrypted layers are decrypted and
//!   authenticated whole before their first packet is parsed.
//! - **Plaintext hygiene**: Decrypted and decompressed layer buffers are
//!   zeroized when their frame is dropped, including on error. Literal
//!   bodies are parsed out of those buffers into plain [`Bytes`] and belong
//!   to the caller once read.

use std::{
    fmt,
    io::{self, Cursor, Read},
};

use bytes::Bytes;
use ravel_crypto::{CryptoBackend, RustCrypto};
use ravel_proto::{
    CompressedData, IntegrityProtectedData, Packet, PacketReader, PacketSource, Unsupported,
};
use tracing::{debug, trace};

use crate::{
    config::DecryptionConfig,
    credentials::{CertificateProvider, CredentialProvider},
    env::{Environment, SystemEnv},
    error::Error,
    layer::{Plaintext, decompress::decompress},
    metadata::{
        CompressionLayer, EncryptionLayer, IntegrityProtection, Layer, MessageMetadata,
        MetadataAggregator,
    },
    resolver::{EncryptedSessionKey, ResolvedSessionKey, SessionKeyResolver},
    signatures::SignatureCorrelation,
    syntax::{InputSymbol, Pda, State, classify},
};

/// Collaborators and limits for consuming one message.
pub struct ConsumerOptions<'a> {
    /// Primitive cryptography.
    pub backend: &'a dyn CryptoBackend,
    /// Secrets that may open the message.
    pub credentials: &'a dyn CredentialProvider,
    /// Keys that may have signed the message.
    pub certificates: &'a dyn CertificateProvider,
    /// Clock.
    pub env: &'a dyn Environment,
    /// Limits and algorithm policy.
    pub config: DecryptionConfig,
}

impl<'a> ConsumerOptions<'a> {
    /// Options with the [`RustCrypto`] backend, the system clock and the
    /// default configuration.
    pub fn new(
        credentials: &'a dyn CredentialProvider,
        certificates: &'a dyn CertificateProvider,
    ) -> Self {
        Self {
            backend: &RustCrypto,
            credentials,
            certificates,
            env: &SystemEnv,
            config: DecryptionConfig::default(),
        }
    }

    /// Replaces the crypto backend.
    #[must_use]
    pub fn with_backend(mut self, backend: &'a dyn CryptoBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Replaces the environment.
    #[must_use]
    pub fn with_env(mut self, env: &'a dyn Environment) -> Self {
        self.env = env;
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: DecryptionConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for ConsumerOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerOptions").field("config", &self.config).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    Compressed,
    Encrypted,
}

/// One open message layer.
struct Frame<'a> {
    source: Box<dyn PacketSource + 'a>,
    pda: Pda,
    esks: Vec<EncryptedSessionKey>,
    kind: FrameKind,
}

impl<'a> Frame<'a> {
    fn new(source: Box<dyn PacketSource + 'a>, kind: FrameKind) -> Self {
        Self { source, pda: Pda::new(), esks: Vec::new(), kind }
    }
}

/// Streaming consumer of one OpenPGP message.
pub struct DecryptionStream<'a> {
    backend: &'a dyn CryptoBackend,
    credentials: &'a dyn CredentialProvider,
    config: DecryptionConfig,
    frames: Vec<Frame<'a>>,
    correlation: SignatureCorrelation<'a>,
    metadata: MetadataAggregator,
    literal: Bytes,
    poisoned: bool,
    finished: Option<MessageMetadata>,
}

impl<'a> DecryptionStream<'a> {
    /// Opens a message read from `reader`.
    pub fn open<R: Read + 'a>(reader: R, options: ConsumerOptions<'a>) -> Result<Self, Error> {
        let source =
            PacketReader::new(reader).with_max_body_length(options.config.max_packet_length);
        Self::open_packets(source, options)
    }

    /// Opens a message from already-decoded packets.
    pub fn open_packets(
        source: impl PacketSource + 'a,
        options: ConsumerOptions<'a>,
    ) -> Result<Self, Error> {
        let ConsumerOptions { backend, credentials, certificates, env, config } = options;
        let correlation =
            SignatureCorrelation::new(backend, certificates, env, config.policy.clone());
        let mut stream = Self {
            backend,
            credentials,
            config,
            frames: vec![Frame::new(Box::new(source), FrameKind::Root)],
            correlation,
            metadata: MetadataAggregator::new(),
            literal: Bytes::new(),
            poisoned: false,
            finished: None,
        };
        stream.prime()?;
        Ok(stream)
    }

    /// Advances until literal data is available or the message ends.
    fn prime(&mut self) -> Result<(), Error> {
        while self.literal.is_empty() && self.advance()? {}
        Ok(())
    }

    /// Number of layers currently open, the message itself included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Metadata of the fully consumed message.
    ///
    /// Fails with [`Error::Incomplete`] while literal data is unread; the
    /// stream stays usable. Packets that follow the literal data are
    /// processed here if `read` has not reached them yet.
    pub fn finish(&mut self) -> Result<MessageMetadata, Error> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        if let Some(metadata) = &self.finished {
            return Ok(metadata.clone());
        }
        if !self.literal.is_empty() {
            return Err(Error::Incomplete);
        }
        while self.advance()? {
            if !self.literal.is_empty() {
                return Err(Error::Incomplete);
            }
        }

        let metadata = std::mem::take(&mut self.metadata).finalize(self.frames.is_empty())?;
        self.finished = Some(metadata.clone());
        Ok(metadata)
    }

    /// One step, poisoning the stream on failure.
    fn advance(&mut self) -> Result<bool, Error> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        self.step().inspect_err(|err| {
            debug!(%err, depth = self.frames.len(), "message rejected");
            self.poisoned = true;
            self.frames.clear();
            self.literal = Bytes::new();
        })
    }

    /// Processes one packet or one end of layer. Returns false once every
    /// layer is closed.
    fn step(&mut self) -> Result<bool, Error> {
        let depth = self.frames.len().saturating_sub(1);
        let Some(frame) = self.frames.last_mut() else {
            return Ok(false);
        };
        let Some(packet) = frame.source.next_packet()? else {
            self.end_frame()?;
            return Ok(true);
        };
        let Some(symbol) = classify(&packet) else {
            trace!(tag = packet.tag(), depth, "skipping transparent packet");
            return Ok(true);
        };

        let prefixed = frame.pda.state().state == State::OpenPgpMessage;
        frame.pda.next(symbol)?;
        trace!(%symbol, depth, "packet accepted");

        match packet {
            Packet::PublicKeyEncryptedSessionKey(pkesk) => {
                frame.esks.push(EncryptedSessionKey::PublicKey(pkesk));
            },
            Packet::PassphraseEncryptedSessionKey(skesk) => {
                frame.esks.push(EncryptedSessionKey::Passphrase(skesk));
            },
            Packet::IntegrityProtectedData(data) => {
                let esks = std::mem::take(&mut frame.esks);
                self.enter_encrypted(&data, &esks, depth)?;
            },
            Packet::SymmetricallyEncryptedData(_) => {
                return Err(Error::MissingIntegrityProtection);
            },
            Packet::CompressedData(compressed) => self.enter_compressed(&compressed, depth)?,
            Packet::OnePassSignature(ops) => {
                self.correlation.on_one_pass_signature(ops, self.metadata.position());
            },
            Packet::Signature(signature) if prefixed => {
                let position = self.metadata.position();
                self.correlation.on_prefixed_signature(signature, position, depth);
            },
            Packet::Signature(signature) => {
                if let Some((position, verification)) = self.correlation.on_signature(&signature) {
                    self.metadata.record_at(&position, Layer::Signature(verification));
                }
            },
            Packet::LiteralData(literal) => {
                debug!(depth, len = literal.body.len(), format = %literal.format, "literal data");
                self.metadata.record(Layer::Literal((&literal).into()));
                self.literal = literal.body;
            },
            Packet::Marker | Packet::Padding { .. } | Packet::Unknown(_) => {},
        }
        Ok(true)
    }

    fn end_frame(&mut self) -> Result<(), Error> {
        let depth = self.frames.len().saturating_sub(1);
        let Some(mut frame) = self.frames.pop() else {
            return Ok(());
        };
        frame.pda.next(InputSymbol::EndOfSequence)?;
        frame.pda.assert_valid()?;

        for (position, verification) in self.correlation.finish_prefixed(depth) {
            self.metadata.record_at(&position, Layer::Signature(verification));
        }
        if frame.kind != FrameKind::Root {
            self.metadata.close_layer();
        }
        debug!(depth, kind = ?frame.kind, "layer closed");
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<(), Error> {
        let limit = self.config.max_nesting_depth;
        if depth + 1 > limit {
            return Err(Error::NestingTooDeep { limit });
        }
        Ok(())
    }

    fn push_frame(&mut self, plaintext: Plaintext, kind: FrameKind) {
        let reader = PacketReader::new(Cursor::new(plaintext))
            .with_max_body_length(self.config.max_packet_length);
        self.frames.push(Frame::new(Box::new(reader), kind));
    }

    fn enter_compressed(&mut self, packet: &CompressedData, depth: usize) -> Result<(), Error> {
        self.check_depth(depth)?;
        let algorithm = packet.algorithm;
        if !self.config.policy.is_compression_algorithm_acceptable(algorithm) {
            return Err(Error::UnsupportedAlgorithm(Unsupported::Compression(algorithm)));
        }

        let plaintext = decompress(packet, self.config.max_decompressed_length)?;
        debug!(depth = depth + 1, %algorithm, len = plaintext.len(), "entered compressed layer");
        self.metadata.record(Layer::Compression(CompressionLayer { algorithm }));
        self.push_frame(Plaintext::new(plaintext), FrameKind::Compressed);
        Ok(())
    }

    fn enter_encrypted(
        &mut self,
        data: &IntegrityProtectedData,
        esks: &[EncryptedSessionKey],
        depth: usize,
    ) -> Result<(), Error> {
        self.check_depth(depth)?;
        let integrity = match data {
            IntegrityProtectedData::V1 { .. } => IntegrityProtection::Mdc,
            IntegrityProtectedData::V2 { symmetric_algorithm, aead_algorithm, .. } => {
                let policy = &self.config.policy;
                if !policy.is_symmetric_algorithm_acceptable(*symmetric_algorithm) {
                    return Err(Error::UnsupportedAlgorithm(Unsupported::Symmetric(
                        *symmetric_algorithm,
                    )));
                }
                if !policy.is_aead_algorithm_acceptable(*aead_algorithm) {
                    return Err(Error::UnsupportedAlgorithm(Unsupported::Aead(*aead_algorithm)));
                }
                IntegrityProtection::Aead(*aead_algorithm)
            },
        };

        let ResolvedSessionKey { algorithm, source, plaintext, .. } =
            SessionKeyResolver::new(self.backend, self.credentials, &self.config.policy)
                .resolve(esks, data)?;
        debug!(
            depth = depth + 1,
            %algorithm,
            ?source,
            len = plaintext.len(),
            "entered encrypted layer"
        );

        self.metadata.record(Layer::Encryption(EncryptionLayer {
            algorithm,
            integrity,
            key_source: source,
        }));
        self.push_frame(plaintext, FrameKind::Encrypted);
        Ok(())
    }
}

impl Read for DecryptionStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.poisoned {
            return Err(Error::Poisoned.into());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if !self.literal.is_empty() {
                let n = buf.len().min(self.literal.len());
                let chunk = self.literal.split_to(n);
                self.correlation.update(&chunk);
                buf[..n].copy_from_slice(&chunk);
                return Ok(n);
            }
            if !self.advance()? {
                return Ok(0);
            }
        }
    }
}

impl fmt::Debug for DecryptionStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionStream")
            .field("depth", &self.frames.len())
            .field("literal_remaining", &self.literal.len())
            .field("pending_signatures", &self.correlation.pending())
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
