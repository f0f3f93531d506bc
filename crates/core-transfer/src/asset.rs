//! Decoding of Metaplex Core `AssetV1` account data.
//!
//! Borsh layout of the fixed prefix (plugins follow and are ignored):
//!
//! ```text
//! key               u8          1 = AssetV1
//! owner             [u8; 32]
//! update_authority  u8 tag      0 = None, 1 = Address, 2 = Collection
//!                   [u8; 32]    present for tags 1 and 2
//! name              u32 LE len + UTF-8
//! uri               u32 LE len + UTF-8
//! seq               Option<u64> absent in accounts created before it existed
//! ```

use serde::Serialize;
use sol_wire::Pubkey;

use crate::error::TransferError;

/// Account discriminator byte of an asset record.
pub const ASSET_V1_KEY: u8 = 1;

/// Who may update the asset's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "address", rename_all = "snake_case")]
pub enum UpdateAuthority {
    None,
    Address(Pubkey),
    /// The asset belongs to this collection; the collection's authority rules.
    Collection(Pubkey),
}

/// The decoded fixed prefix of an asset account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    pub owner: Pubkey,
    pub update_authority: UpdateAuthority,
    pub name: String,
    pub uri: String,
    pub seq: Option<u64>,
}

impl AssetRecord {
    pub fn decode(data: &[u8]) -> Result<Self, TransferError> {
        let mut reader = Reader { data, pos: 0 };

        let key = reader.u8()?;
        if key != ASSET_V1_KEY {
            return Err(TransferError::Verification(format!(
                "account is not an asset record (key byte {key})"
            )));
        }

        let owner = reader.pubkey()?;
        let update_authority = match reader.u8()? {
            0 => UpdateAuthority::None,
            1 => UpdateAuthority::Address(reader.pubkey()?),
            2 => UpdateAuthority::Collection(reader.pubkey()?),
            tag => {
                return Err(TransferError::Verification(format!(
                    "unknown update authority tag {tag}"
                )))
            }
        };
        let name = reader.string()?;
        let uri = reader.string()?;
        let seq = reader.trailing_seq();

        Ok(Self {
            owner,
            update_authority,
            name,
            uri,
            seq,
        })
    }

    /// The collection the asset is a member of, if any.
    pub fn collection(&self) -> Option<Pubkey> {
        match self.update_authority {
            UpdateAuthority::Collection(collection) => Some(collection),
            _ => None,
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], TransferError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(TransferError::Verification(format!(
                "asset data truncated at offset {} (need {len} more bytes)",
                self.pos
            )));
        };
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, TransferError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, TransferError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64, TransferError> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(arr))
    }

    fn pubkey(&mut self) -> Result<Pubkey, TransferError> {
        let bytes = self.take(32)?;
        Pubkey::try_from_slice(bytes).map_err(|e| TransferError::Verification(e.to_string()))
    }

    fn string(&mut self) -> Result<String, TransferError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TransferError::Verification(format!("invalid utf-8 in asset data: {e}")))
    }

    /// `seq` is optional on the wire: older accounts go straight from `uri`
    /// to the plugin header, whose key byte is never 0 or 1.
    fn trailing_seq(&mut self) -> Option<u64> {
        match self.data.get(self.pos) {
            Some(1) if self.data.len() - self.pos >= 9 => {
                self.pos += 1;
                self.u64().ok()
            }
            _ => None,
        }
    }
}

/// Encode the fixed prefix, used to fabricate account data in tests.
#[cfg(test)]
pub(crate) fn encode_asset(record: &AssetRecord) -> Vec<u8> {
    let mut data = vec![ASSET_V1_KEY];
    data.extend_from_slice(record.owner.as_ref());
    match record.update_authority {
        UpdateAuthority::None => data.push(0),
        UpdateAuthority::Address(key) => {
            data.push(1);
            data.extend_from_slice(key.as_ref());
        }
        UpdateAuthority::Collection(key) => {
            data.push(2);
            data.extend_from_slice(key.as_ref());
        }
    }
    for s in [&record.name, &record.uri] {
        data.extend_from_slice(&(s.len() as u32).to_le_bytes());
        data.extend_from_slice(s.as_bytes());
    }
    match record.seq {
        Some(seq) => {
            data.push(1);
            data.extend_from_slice(&seq.to_le_bytes());
        }
        None => data.push(0),
    }
    data
}
