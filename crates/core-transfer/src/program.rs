//! Metaplex Core program constants.

use sol_wire::Pubkey;

/// Metaplex Core program: `CoREENxT6tW1HoK8ypY1SxRMZTcVPm7R94rH4PZNhX7d`
///
/// Also stands in for optional accounts that are not supplied (no delegate,
/// no collection), following the Metaplex optional-account convention.
pub const MPL_CORE_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0xaf, 0x54, 0xab, 0x10, 0xbd, 0x97, 0xa5, 0x42, 0xa0, 0x9e, 0xf7, 0xb3, 0x98, 0x89, 0xdd,
    0x0c, 0xd3, 0x94, 0xa4, 0xcc, 0xe9, 0xdf, 0xa6, 0xcd, 0xc9, 0x7e, 0xbe, 0x2d, 0x23, 0x5b,
    0xa7, 0x48,
]);

/// `sha256("global:transfer")[..8]`
pub const TRANSFER_DISCRIMINATOR: [u8; 8] = [163, 52, 200, 231, 140, 3, 69, 186];

#[cfg(test)]
mod tests {
    use sha2::{Digest, Sha256};

    use super::*;

    #[test]
    fn program_id_roundtrip() {
        assert_eq!(
            MPL_CORE_PROGRAM_ID.to_string(),
            "CoREENxT6tW1HoK8ypY1SxRMZTcVPm7R94rH4PZNhX7d"
        );
    }

    #[test]
    fn discriminator_matches_namespaced_hash() {
        let digest = Sha256::digest(b"global:transfer");
        assert_eq!(&digest[..8], &TRANSFER_DISCRIMINATOR);
    }
}
