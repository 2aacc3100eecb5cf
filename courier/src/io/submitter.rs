//! Encode, sign, and broadcast transactions.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::eosio::{TransactionHeader, pack_transaction, parse_chain_id, signing_digest};
use crate::core::keys::{PrivateKey, PublicKey};
use crate::core::types::{Action, ActionData, Authorization, Transaction};
use crate::io::chain::{ChainApi, PackedTransaction, PushOutcome};
use crate::io::config::CourierConfig;

/// An account together with the key that signs for its `active` permission.
#[derive(Debug, Clone)]
pub struct AccountKey {
    pub account: String,
    pub key: PrivateKey,
}

/// Turns built transactions into signed broadcasts.
///
/// When a fee payer is configured it authorizes and signs ahead of the acting
/// account, so the node bills resources to it.
pub struct TransactionSubmitter<C: ChainApi> {
    chain: C,
    actor: AccountKey,
    fee_payer: Option<AccountKey>,
}

impl<C: ChainApi> TransactionSubmitter<C> {
    pub fn new(chain: C, actor: AccountKey, fee_payer: Option<AccountKey>) -> Self {
        Self {
            chain,
            actor,
            fee_payer,
        }
    }

    pub fn from_config(chain: C, cfg: &CourierConfig) -> Result<Self> {
        let actor = AccountKey {
            account: cfg.account.clone(),
            key: cfg.signing_key()?,
        };
        let fee_payer = cfg
            .fee_payer
            .as_ref()
            .map(|payer| -> Result<AccountKey> {
                Ok(AccountKey {
                    account: payer.account.clone(),
                    key: payer.private_key.parse().context("fee_payer.private_key")?,
                })
            })
            .transpose()?;
        Ok(Self::new(chain, actor, fee_payer))
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    fn signers(&self) -> impl Iterator<Item = &AccountKey> {
        self.fee_payer.iter().chain(std::iter::once(&self.actor))
    }

    /// Authorization applied to every action: fee payer first, then actor.
    pub fn authorization(&self) -> Vec<Authorization> {
        self.signers()
            .map(|signer| Authorization::active(&signer.account))
            .collect()
    }

    /// Accounts and public keys that sign, in signing order.
    pub fn public_keys(&self) -> Vec<(String, PublicKey)> {
        self.signers()
            .map(|signer| (signer.account.clone(), signer.key.public_key()))
            .collect()
    }

    /// Encode each action's arguments, sign, and broadcast.
    ///
    /// Encoding and chain-info failures are returned as errors; a broadcast
    /// that the node refuses (or that never reaches it) is a
    /// [`PushOutcome::Rejected`]. A rejected transaction must not be replayed:
    /// build a new one from a fresh scan instead.
    #[instrument(
        skip_all,
        fields(actions = transaction.actions.len(), expiration = %transaction.expiration)
    )]
    pub fn submit(&self, transaction: &Transaction) -> Result<PushOutcome> {
        let authorization = self.authorization();
        let mut actions = Vec::with_capacity(transaction.actions.len());
        for action in &transaction.actions {
            let data = match &action.data {
                ActionData::Args(args) => self
                    .chain
                    .abi_json_to_bin(&action.account, &action.name, args)
                    .with_context(|| format!("encode {}::{}", action.account, action.name))?,
                ActionData::Packed(data) => data.clone(),
            };
            actions.push(Action {
                account: action.account.clone(),
                name: action.name.clone(),
                authorization: authorization.clone(),
                data: ActionData::Packed(data),
            });
        }

        let info = self.chain.get_info().context("fetch chain info")?;
        let header =
            TransactionHeader::new(transaction.expiration, &info.last_irreversible_block_id)?;
        let packed = pack_transaction(&header, &actions)?;
        let chain_id = parse_chain_id(&info.chain_id)?;
        let digest = signing_digest(&chain_id, &packed);
        let signatures = self
            .signers()
            .map(|signer| {
                signer
                    .key
                    .sign_digest(&digest)
                    .with_context(|| format!("sign as {}", signer.account))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            ref_block_num = header.ref_block_num,
            bytes = packed.len(),
            signatures = signatures.len(),
            "transaction packed and signed"
        );

        let outcome = self
            .chain
            .push_transaction(&PackedTransaction::new(signatures, &packed));
        if let PushOutcome::Accepted { transaction_id } = &outcome {
            info!(%transaction_id, "transaction accepted");
        }
        Ok(outcome)
    }
}
