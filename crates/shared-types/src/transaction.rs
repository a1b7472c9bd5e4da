//! # Transactions
//!
//! One flat struct carries every EIP-2718 type; `tx_type` decides which
//! fields are encoded. Legacy and EIP-2930 transactions price gas through
//! `gas_price`; later types use `max_fee_per_gas` and
//! `max_priority_fee_per_gas`.
//!
//! A transaction is either signed, or carries an impersonated sender for
//! local simulation. The impersonated form is never broadcast.

use crate::errors::TxError;
use crate::primitives::{u256_to_be, Address, Bytes, Hash, U256};
use crate::rlp::{self, RlpItem};
use serde::{Deserialize, Serialize};
use shared_crypto::{recover_address, RecoverableSignature, Secp256k1KeyPair};

/// Prefix byte of an EIP-7702 authorization signing payload.
pub const AUTHORIZATION_MAGIC: u8 = 0x05;

/// EIP-2718 transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    /// Pre-2718 transaction, optionally EIP-155 replay protected
    #[default]
    Legacy = 0,
    /// EIP-2930 access list transaction
    AccessList = 1,
    /// EIP-1559 dynamic fee transaction
    DynamicFee = 2,
    /// EIP-4844 blob transaction
    Blob = 3,
    /// EIP-7702 set-code transaction
    SetCode = 4,
}

impl TxType {
    /// Parse an envelope type byte.
    pub fn from_byte(byte: u8) -> Result<Self, TxError> {
        match byte {
            1 => Ok(TxType::AccessList),
            2 => Ok(TxType::DynamicFee),
            3 => Ok(TxType::Blob),
            4 => Ok(TxType::SetCode),
            other => Err(TxError::UnsupportedType(other)),
        }
    }

    /// True for types priced by `max_fee_per_gas` / `max_priority_fee_per_gas`.
    pub fn is_dynamic_fee(self) -> bool {
        matches!(self, TxType::DynamicFee | TxType::Blob | TxType::SetCode)
    }
}

/// EIP-2930 access list entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    /// Pre-warmed account
    pub address: Address,
    /// Pre-warmed storage slots of that account
    pub storage_keys: Vec<Hash>,
}

/// EIP-7702 authorization tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Chain the authorization is valid on (0 = any)
    pub chain_id: U256,
    /// Delegation target
    pub address: Address,
    /// Expected authority nonce
    pub nonce: u64,
    /// Signature parity
    pub y_parity: u8,
    /// Signature r
    pub r: U256,
    /// Signature s
    pub s: U256,
}

impl Authorization {
    /// `keccak256(0x05 || rlp([chain_id, address, nonce]))`.
    pub fn signing_hash(&self) -> Hash {
        let mut payload = vec![AUTHORIZATION_MAGIC];
        payload.extend(rlp::encode_list(&[
            rlp::encode_u256(self.chain_id),
            rlp::encode_address(&self.address),
            rlp::encode_u64(self.nonce),
        ]));
        Hash::keccak(&payload)
    }

    /// Sign an authorization with `key`.
    pub fn signed(
        key: &Secp256k1KeyPair,
        chain_id: U256,
        address: Address,
        nonce: u64,
    ) -> Result<Self, TxError> {
        let mut auth = Self {
            chain_id,
            address,
            nonce,
            y_parity: 0,
            r: U256::zero(),
            s: U256::zero(),
        };
        let sig = key.sign_prehash(auth.signing_hash().as_bytes())?;
        auth.y_parity = sig.y_parity;
        auth.r = U256::from_big_endian(&sig.r);
        auth.s = U256::from_big_endian(&sig.s);
        Ok(auth)
    }

    /// Recover the authority that signed this tuple.
    pub fn authority(&self) -> Result<Address, TxError> {
        let sig = RecoverableSignature::new(self.y_parity, u256_to_be(self.r), u256_to_be(self.s));
        if !sig.is_low_s() {
            return Err(TxError::Crypto(shared_crypto::CryptoError::InvalidSignature));
        }
        let address = recover_address(self.signing_hash().as_bytes(), &sig)?;
        Ok(Address(address))
    }

    fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_u256(self.chain_id),
            rlp::encode_address(&self.address),
            rlp::encode_u64(self.nonce),
            rlp::encode_u64(u64::from(self.y_parity)),
            rlp::encode_u256(self.r),
            rlp::encode_u256(self.s),
        ])
    }

    fn rlp_decode(item: &RlpItem<'_>) -> Result<Self, TxError> {
        let f = item.as_fields(6)?;
        let y_parity = f[3].as_u64()?;
        Ok(Self {
            chain_id: f[0].as_u256()?,
            address: f[1].as_address()?,
            nonce: f[2].as_u64()?,
            y_parity: u8::try_from(y_parity).map_err(|_| TxError::InvalidV(y_parity))?,
            r: f[4].as_u256()?,
            s: f[5].as_u256()?,
        })
    }
}

/// Signature fields as carried by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxSignature {
    /// Parity of R's y coordinate
    pub y_parity: u8,
    /// Signature r
    pub r: U256,
    /// Signature s
    pub s: U256,
}

impl TxSignature {
    fn to_recoverable(self) -> RecoverableSignature {
        RecoverableSignature::new(self.y_parity, u256_to_be(self.r), u256_to_be(self.s))
    }
}

/// A typed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Envelope type
    pub tx_type: TxType,
    /// Chain id (`None` only for pre-EIP-155 legacy transactions)
    pub chain_id: Option<u64>,
    /// Sender nonce
    pub nonce: u64,
    /// Legacy / 2930 gas price
    pub gas_price: U256,
    /// EIP-1559 tip cap
    pub max_priority_fee_per_gas: U256,
    /// EIP-1559 fee cap
    pub max_fee_per_gas: U256,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient, `None` for contract creation
    pub to: Option<Address>,
    /// Wei transferred
    pub value: U256,
    /// Calldata or init code
    #[serde(with = "crate::quantity::bytes_hex")]
    pub data: Bytes,
    /// EIP-2930 access list
    pub access_list: Vec<AccessListItem>,
    /// EIP-4844 blob fee cap
    pub max_fee_per_blob_gas: U256,
    /// EIP-4844 versioned hashes
    pub blob_versioned_hashes: Vec<Hash>,
    /// EIP-7702 authorizations
    pub authorization_list: Vec<Authorization>,
    /// Signature, absent for impersonated transactions
    pub signature: Option<TxSignature>,
    /// Sender override for unsigned local transactions
    pub impersonated_sender: Option<Address>,
}

impl Transaction {
    // =========================================================================
    // FEES
    // =========================================================================

    /// Fee cap per gas: `max_fee_per_gas`, or `gas_price` for legacy types.
    pub fn max_fee(&self) -> U256 {
        if self.tx_type.is_dynamic_fee() {
            self.max_fee_per_gas
        } else {
            self.gas_price
        }
    }

    /// Tip cap per gas: `max_priority_fee_per_gas`, or `gas_price` for legacy types.
    pub fn tip(&self) -> U256 {
        if self.tx_type.is_dynamic_fee() {
            self.max_priority_fee_per_gas
        } else {
            self.gas_price
        }
    }

    /// Priority fee actually paid per gas at `base_fee`.
    ///
    /// Saturates at zero when the fee cap is below the base fee.
    pub fn effective_priority_fee(&self, base_fee: U256) -> U256 {
        let headroom = self.max_fee().saturating_sub(base_fee);
        self.tip().min(headroom)
    }

    /// Price per gas charged to the sender at `base_fee`.
    pub fn effective_gas_price(&self, base_fee: U256) -> U256 {
        if self.tx_type.is_dynamic_fee() {
            base_fee.saturating_add(self.effective_priority_fee(base_fee))
        } else {
            self.gas_price
        }
    }

    /// Upper bound on the wei this transaction can spend:
    /// `value + max_fee * gas_limit (+ blob gas * blob fee cap)`.
    pub fn max_cost(&self) -> U256 {
        let gas_cost = self.max_fee().saturating_mul(U256::from(self.gas_limit));
        let blob_cost = self
            .max_fee_per_blob_gas
            .saturating_mul(U256::from(self.blob_gas()));
        self.value.saturating_add(gas_cost).saturating_add(blob_cost)
    }

    /// Blob gas consumed (`131072` per versioned hash).
    pub fn blob_gas(&self) -> u64 {
        crate::block::GAS_PER_BLOB * self.blob_versioned_hashes.len() as u64
    }

    /// True for contract creation.
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    // =========================================================================
    // SIGNING
    // =========================================================================

    /// True when the transaction carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Unsigned transaction that executes as `sender`.
    pub fn impersonated(mut self, sender: Address) -> Self {
        self.signature = None;
        self.impersonated_sender = Some(sender);
        self
    }

    /// Sign with `key`, replacing any previous signature or impersonation.
    pub fn sign(mut self, key: &Secp256k1KeyPair) -> Result<Self, TxError> {
        let sig = key.sign_prehash(self.signing_hash().as_bytes())?;
        self.signature = Some(TxSignature {
            y_parity: sig.y_parity,
            r: U256::from_big_endian(&sig.r),
            s: U256::from_big_endian(&sig.s),
        });
        self.impersonated_sender = None;
        Ok(self)
    }

    /// Hash the signer commits to.
    pub fn signing_hash(&self) -> Hash {
        let mut fields = self.payload_fields();
        if self.tx_type == TxType::Legacy {
            if let Some(chain_id) = self.chain_id {
                fields.push(rlp::encode_u64(chain_id));
                fields.push(rlp::encode_u64(0));
                fields.push(rlp::encode_u64(0));
            }
            Hash::keccak(&rlp::encode_list(&fields))
        } else {
            let mut payload = vec![self.tx_type as u8];
            payload.extend(rlp::encode_list(&fields));
            Hash::keccak(&payload)
        }
    }

    /// Recover the sender, or return the impersonated sender.
    ///
    /// # Errors
    ///
    /// `MissingSignature` when neither is present; crypto errors when the
    /// signature does not recover, including high-S signatures (EIP-2).
    pub fn sender(&self) -> Result<Address, TxError> {
        if let Some(sender) = self.impersonated_sender {
            return Ok(sender);
        }
        let sig = self.signature.ok_or(TxError::MissingSignature)?.to_recoverable();
        if !sig.is_low_s() {
            return Err(TxError::Crypto(shared_crypto::CryptoError::InvalidSignature));
        }
        let address = recover_address(self.signing_hash().as_bytes(), &sig)?;
        Ok(Address(address))
    }

    /// Transaction hash: keccak256 of the signed envelope. Impersonated
    /// transactions hash their signing payload together with the sender.
    pub fn hash(&self) -> Hash {
        match (self.signature, self.impersonated_sender) {
            (Some(_), _) => Hash::keccak(&self.encode()),
            (None, Some(sender)) => {
                let signing = self.signing_hash();
                Hash(shared_crypto::keccak256_many(&[
                    signing.as_bytes(),
                    sender.as_bytes(),
                ]))
            }
            (None, None) => self.signing_hash(),
        }
    }

    // =========================================================================
    // ENVELOPE
    // =========================================================================

    fn payload_fields(&self) -> Vec<Vec<u8>> {
        let chain_id = rlp::encode_u64(self.chain_id.unwrap_or_default());
        let common_tail = |fields: &mut Vec<Vec<u8>>| {
            fields.push(rlp::encode_u64(self.gas_limit));
            fields.push(rlp::encode_optional_address(self.to.as_ref()));
            fields.push(rlp::encode_u256(self.value));
            fields.push(rlp::encode_bytes(&self.data));
        };
        let mut fields = Vec::with_capacity(14);
        match self.tx_type {
            TxType::Legacy => {
                fields.push(rlp::encode_u64(self.nonce));
                fields.push(rlp::encode_u256(self.gas_price));
                common_tail(&mut fields);
            }
            TxType::AccessList => {
                fields.push(chain_id);
                fields.push(rlp::encode_u64(self.nonce));
                fields.push(rlp::encode_u256(self.gas_price));
                common_tail(&mut fields);
                fields.push(encode_access_list(&self.access_list));
            }
            TxType::DynamicFee | TxType::Blob | TxType::SetCode => {
                fields.push(chain_id);
                fields.push(rlp::encode_u64(self.nonce));
                fields.push(rlp::encode_u256(self.max_priority_fee_per_gas));
                fields.push(rlp::encode_u256(self.max_fee_per_gas));
                common_tail(&mut fields);
                fields.push(encode_access_list(&self.access_list));
                if self.tx_type == TxType::Blob {
                    fields.push(rlp::encode_u256(self.max_fee_per_blob_gas));
                    let hashes: Vec<Vec<u8>> =
                        self.blob_versioned_hashes.iter().map(rlp::encode_hash).collect();
                    fields.push(rlp::encode_list(&hashes));
                }
                if self.tx_type == TxType::SetCode {
                    let auths: Vec<Vec<u8>> =
                        self.authorization_list.iter().map(Authorization::rlp_encode).collect();
                    fields.push(rlp::encode_list(&auths));
                }
            }
        }
        fields
    }

    /// EIP-2718 envelope. Unsigned transactions encode zeroed signature fields.
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = self.payload_fields();
        let sig = self.signature.unwrap_or(TxSignature {
            y_parity: 0,
            r: U256::zero(),
            s: U256::zero(),
        });
        let v = if self.tx_type == TxType::Legacy {
            match self.chain_id {
                Some(chain_id) => chain_id * 2 + 35 + u64::from(sig.y_parity),
                None => 27 + u64::from(sig.y_parity),
            }
        } else {
            u64::from(sig.y_parity)
        };
        fields.push(rlp::encode_u64(v));
        fields.push(rlp::encode_u256(sig.r));
        fields.push(rlp::encode_u256(sig.s));
        let body = rlp::encode_list(&fields);
        if self.tx_type == TxType::Legacy {
            body
        } else {
            let mut out = Vec::with_capacity(body.len() + 1);
            out.push(self.tx_type as u8);
            out.extend(body);
            out
        }
    }

    /// Decode a signed EIP-2718 envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        let first = *bytes
            .first()
            .ok_or(TxError::Rlp(crate::errors::RlpError::UnexpectedEnd))?;
        if first >= 0xc0 {
            return Self::decode_legacy(bytes);
        }
        let tx_type = TxType::from_byte(first)?;
        let item = rlp::decode(&bytes[1..])?;
        let expected = match tx_type {
            TxType::AccessList => 11,
            TxType::DynamicFee => 12,
            TxType::Blob => 14,
            TxType::SetCode => 13,
            TxType::Legacy => return Err(TxError::UnsupportedType(0)),
        };
        let f = item.as_fields(expected)?;
        let mut tx = Transaction {
            tx_type,
            chain_id: Some(f[0].as_u64()?),
            nonce: f[1].as_u64()?,
            ..Default::default()
        };
        let mut i = 2;
        if tx_type == TxType::AccessList {
            tx.gas_price = f[i].as_u256()?;
            i += 1;
        } else {
            tx.max_priority_fee_per_gas = f[i].as_u256()?;
            tx.max_fee_per_gas = f[i + 1].as_u256()?;
            i += 2;
        }
        tx.gas_limit = f[i].as_u64()?;
        tx.to = f[i + 1].as_optional_address()?;
        tx.value = f[i + 2].as_u256()?;
        tx.data = f[i + 3].as_bytes()?.to_vec();
        tx.access_list = decode_access_list(&f[i + 4])?;
        i += 5;
        if tx_type == TxType::Blob {
            tx.max_fee_per_blob_gas = f[i].as_u256()?;
            tx.blob_versioned_hashes = f[i + 1]
                .as_list()?
                .iter()
                .map(RlpItem::as_hash)
                .collect::<Result<_, _>>()?;
            i += 2;
        }
        if tx_type == TxType::SetCode {
            tx.authorization_list = f[i]
                .as_list()?
                .iter()
                .map(Authorization::rlp_decode)
                .collect::<Result<_, _>>()?;
            i += 1;
        }
        let y_parity = f[i].as_u64()?;
        if y_parity > 1 {
            return Err(TxError::InvalidV(y_parity));
        }
        tx.signature = Some(TxSignature {
            y_parity: y_parity as u8,
            r: f[i + 1].as_u256()?,
            s: f[i + 2].as_u256()?,
        });
        Ok(tx)
    }

    fn decode_legacy(bytes: &[u8]) -> Result<Self, TxError> {
        let item = rlp::decode(bytes)?;
        let f = item.as_fields(9)?;
        let v = f[6].as_u64()?;
        let (chain_id, y_parity) = match v {
            27 | 28 => (None, (v - 27) as u8),
            v if v >= 35 => (Some((v - 35) / 2), ((v - 35) % 2) as u8),
            other => return Err(TxError::InvalidV(other)),
        };
        Ok(Transaction {
            tx_type: TxType::Legacy,
            chain_id,
            nonce: f[0].as_u64()?,
            gas_price: f[1].as_u256()?,
            gas_limit: f[2].as_u64()?,
            to: f[3].as_optional_address()?,
            value: f[4].as_u256()?,
            data: f[5].as_bytes()?.to_vec(),
            signature: Some(TxSignature {
                y_parity,
                r: f[7].as_u256()?,
                s: f[8].as_u256()?,
            }),
            ..Default::default()
        })
    }
}

fn encode_access_list(list: &[AccessListItem]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = list
        .iter()
        .map(|item| {
            let keys: Vec<Vec<u8>> = item.storage_keys.iter().map(rlp::encode_hash).collect();
            rlp::encode_list(&[rlp::encode_address(&item.address), rlp::encode_list(&keys)])
        })
        .collect();
    rlp::encode_list(&entries)
}

fn decode_access_list(item: &RlpItem<'_>) -> Result<Vec<AccessListItem>, TxError> {
    item.as_list()?
        .iter()
        .map(|entry| {
            let f = entry.as_fields(2)?;
            Ok(AccessListItem {
                address: f[0].as_address()?,
                storage_keys: f[1]
                    .as_list()?
                    .iter()
                    .map(RlpItem::as_hash)
                    .collect::<Result<_, _>>()?,
            })
        })
        .collect()
}
