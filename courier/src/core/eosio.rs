//! EOSIO binary encoding for transactions and their signing digest.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::types::{Action, ActionData};

const NAME_MAX_LEN: usize = 13;

/// Encode an account or action name as its 64-bit on-chain value.
pub fn name_to_u64(name: &str) -> Result<u64> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > NAME_MAX_LEN {
        bail!("invalid name {name:?}: length must be 1..={NAME_MAX_LEN}");
    }
    let mut value = 0u64;
    for (i, &c) in bytes.iter().enumerate() {
        let symbol = char_to_symbol(c)
            .ok_or_else(|| anyhow!("invalid name {name:?}: bad char {:?}", c as char))?;
        if i < 12 {
            value |= (symbol & 0x1f) << (64 - 5 * (i as u64 + 1));
        } else {
            if symbol > 0x0f {
                bail!("invalid name {name:?}: 13th char must be one of .1-5a-j");
            }
            value |= symbol;
        }
    }
    Ok(value)
}

pub fn is_valid_name(name: &str) -> bool {
    name_to_u64(name).is_ok()
}

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'.' => Some(0),
        b'1'..=b'5' => Some(u64::from(c - b'1') + 1),
        b'a'..=b'z' => Some(u64::from(c - b'a') + 6),
        _ => None,
    }
}

/// Fixed transaction header fields, including the TaPoS reference block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHeader {
    /// Seconds since the Unix epoch.
    pub expiration: u32,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
}

impl TransactionHeader {
    /// Reference `block_id` (hex) and expire at `expiration`.
    pub fn new(expiration: DateTime<Utc>, block_id: &str) -> Result<Self> {
        let id = hex::decode(block_id).with_context(|| format!("decode block id {block_id}"))?;
        if id.len() != 32 {
            bail!("block id must be 32 bytes, got {}", id.len());
        }
        let block_num = u32::from_be_bytes([id[0], id[1], id[2], id[3]]);
        let ref_block_prefix = u32::from_le_bytes([id[8], id[9], id[10], id[11]]);
        let expiration = u32::try_from(expiration.timestamp())
            .map_err(|_| anyhow!("expiration {expiration} out of range"))?;
        Ok(Self {
            expiration,
            ref_block_num: (block_num & 0xffff) as u16,
            ref_block_prefix,
        })
    }
}

/// Serialize a transaction whose action data has already been ABI-encoded.
pub fn pack_transaction(header: &TransactionHeader, actions: &[Action]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(&header.expiration.to_le_bytes());
    buf.extend_from_slice(&header.ref_block_num.to_le_bytes());
    buf.extend_from_slice(&header.ref_block_prefix.to_le_bytes());
    push_varuint32(&mut buf, 0); // max_net_usage_words
    buf.push(0); // max_cpu_usage_ms
    push_varuint32(&mut buf, 0); // delay_sec
    push_varuint32(&mut buf, 0); // context_free_actions
    push_varuint32(&mut buf, len_u32(actions.len())?);
    for action in actions {
        pack_action(&mut buf, action)?;
    }
    push_varuint32(&mut buf, 0); // transaction_extensions
    Ok(buf)
}

fn pack_action(buf: &mut Vec<u8>, action: &Action) -> Result<()> {
    let ActionData::Packed(data) = &action.data else {
        bail!(
            "action {}::{} has not been ABI-encoded",
            action.account,
            action.name
        );
    };
    buf.extend_from_slice(&name_to_u64(&action.account)?.to_le_bytes());
    buf.extend_from_slice(&name_to_u64(&action.name)?.to_le_bytes());
    push_varuint32(buf, len_u32(action.authorization.len())?);
    for auth in &action.authorization {
        buf.extend_from_slice(&name_to_u64(&auth.actor)?.to_le_bytes());
        buf.extend_from_slice(&name_to_u64(&auth.permission)?.to_le_bytes());
    }
    push_varuint32(buf, len_u32(data.len())?);
    buf.extend_from_slice(data);
    Ok(())
}

/// `sha256(chain_id || packed_trx || sha256-of-no-context-free-data)`.
///
/// Transactions without context-free data sign over 32 zero bytes in the
/// last slot.
pub fn signing_digest(chain_id: &[u8; 32], packed_trx: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(chain_id);
    hasher.update(packed_trx);
    hasher.update([0u8; 32]);
    hasher.finalize().into()
}

pub fn parse_chain_id(chain_id: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(chain_id).with_context(|| format!("decode chain id {chain_id}"))?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow!("chain id must be 32 bytes, got {}", bytes.len()))
}

fn push_varuint32(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| anyhow!("length {len} exceeds varuint32"))
}
