use thiserror::Error;

/// Errors from key handling, message compilation and signing.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("invalid secret key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid base58 address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("cannot compile transaction: {0}")]
    TransactionBuildError(String),

    #[error("signing failed: {0}")]
    SigningError(String),

    #[error("wire encoding: {0}")]
    SerializationError(String),

    #[error("keypair file: {0}")]
    KeypairFile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_stage() {
        let cases = [
            (SolError::InvalidAddress("bad decode".into()), "invalid base58 address: bad decode"),
            (SolError::SigningError("missing signer".into()), "signing failed: missing signer"),
            (SolError::KeypairFile("no such file".into()), "keypair file: no such file"),
            (
                SolError::TransactionBuildError("too many keys".into()),
                "cannot compile transaction: too many keys",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }
}
