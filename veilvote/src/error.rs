use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("veilvote: channel integrity: MAC verification failed")]
    ChannelIntegrity,

    #[error("veilvote: channel closed by peer")]
    ChannelClosed,

    #[error("veilvote: symmetric decryption failed")]
    Decryption,

    #[error("veilvote: handshake: server signature invalid or our public value was not echoed")]
    HandshakeSignature,

    #[error("veilvote: {0}")]
    ZkpInvalid(#[from] ProofError),

    #[error("veilvote: blind signature verification failed")]
    BlindSignatureInvalid,

    #[error("veilvote: tally recovery failed: combined decryptions match no tally in range")]
    TallyRecoveryFailure,

    #[error("veilvote: malformed circuit: {0}")]
    CircuitMalformed(String),

    #[error("veilvote: unexpected message: expected {expected}")]
    UnexpectedMessage { expected: &'static str },

    #[error("veilvote: RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("veilvote: CBOR serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("veilvote: key material error: {0}")]
    Key(String),

    #[error("veilvote: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-clause rejection surface for proof verification.
///
/// Each failed equation names itself so a test (or an operator reading the
/// adjudication log) can see which part of a transcript went wrong.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProofError {
    #[error("ballot proof: challenge split does not match the transcript hash")]
    ChallengeSum,

    #[error("ballot proof: zero-branch generator equation failed")]
    ZeroBranchGenerator,

    #[error("ballot proof: zero-branch public-key equation failed")]
    ZeroBranchKey,

    #[error("ballot proof: one-branch generator equation failed")]
    OneBranchGenerator,

    #[error("ballot proof: one-branch public-key equation failed")]
    OneBranchKey,

    #[error("decryption proof: aggregate-ciphertext equation failed")]
    DecryptionAggregate,

    #[error("decryption proof: public-share equation failed")]
    DecryptionShare,
}
