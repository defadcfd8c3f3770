//! Signer: scoped secret handling and transaction signing.
//!
//! Secret material stays base58 text inside [`SecretMaterial`] until the moment
//! it is needed. Decoding happens inside [`with_keypair`]; the decoded bytes and
//! the keypair live only for that call and are wiped when it returns, on the
//! error path as well.

use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::types::{SignedTransaction, TransactionPlan};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use solana_sdk::{
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    signer::keypair::keypair_from_seed,
    transaction::Transaction,
};
use tracing::{debug, instrument};
use zeroize::{Zeroize, Zeroizing};

const SEED_LEN: usize = 32;
const KEYPAIR_LEN: usize = 64;

/// Base58 secret supplied by a caller or by configuration.
///
/// Redacted in `Debug`, not serializable, zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretMaterial(Zeroizing<String>);

impl SecretMaterial {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(Zeroizing::new(encoded.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn expose(&self) -> &str {
        self.0.trim()
    }
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretMaterial(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for SecretMaterial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = String::deserialize(deserializer)?;
        let secret = SecretMaterial::new(raw.as_str());
        raw.zeroize();
        Ok(secret)
    }
}

/// Keypair decoded for the duration of one call.
struct ScopedKeypair {
    keypair: Keypair,
}

impl ScopedKeypair {
    fn decode(secret: &SecretMaterial) -> LaunchpadResult<Self> {
        if secret.is_empty() {
            return Err(LaunchpadError::InvalidKeypair("secret is empty".to_string()));
        }
        let bytes = Zeroizing::new(
            bs58::decode(secret.expose())
                .into_vec()
                .map_err(|_| LaunchpadError::InvalidKeypair("secret is not valid base58".to_string()))?,
        );

        let keypair = match bytes.len() {
            SEED_LEN => keypair_from_seed(&bytes[..])
                .map_err(|_| LaunchpadError::InvalidKeypair("secret is not a valid ed25519 seed".to_string()))?,
            KEYPAIR_LEN => {
                let keypair = keypair_from_seed(&bytes[..SEED_LEN]).map_err(|_| {
                    LaunchpadError::InvalidKeypair("secret is not a valid ed25519 keypair".to_string())
                })?;
                // the public half must belong to the secret half
                if keypair.pubkey().to_bytes()[..] != bytes[SEED_LEN..] {
                    return Err(LaunchpadError::InvalidKeypair(
                        "public key half does not match the secret key".to_string(),
                    ));
                }
                keypair
            }
            other => {
                return Err(LaunchpadError::InvalidKeypair(format!(
                    "secret decodes to {} bytes, expected 32 or 64",
                    other
                )))
            }
        };
        Ok(Self { keypair })
    }
}

/// Decodes `secret`, runs `f` with the keypair, and drops both before returning.
pub fn with_keypair<T>(
    secret: &SecretMaterial,
    f: impl FnOnce(&Keypair) -> LaunchpadResult<T>,
) -> LaunchpadResult<T> {
    let scoped = ScopedKeypair::decode(secret)?;
    f(&scoped.keypair)
}

/// Public key of `secret`, without keeping the secret around.
pub fn resolve_pubkey(secret: &SecretMaterial) -> LaunchpadResult<Pubkey> {
    with_keypair(secret, |keypair| Ok(keypair.pubkey()))
}

/// Signs a built plan with the fee payer's secret plus any co-signers the plan carries.
#[instrument(skip(plan, secret), fields(fee_payer = %plan.fee_payer))]
pub fn sign(plan: TransactionPlan, secret: &SecretMaterial, plan_ttl_secs: u64) -> LaunchpadResult<SignedTransaction> {
    if plan.instructions.is_empty() {
        return Err(LaunchpadError::internal("refusing to sign a plan without instructions"));
    }
    if plan.is_stale(Utc::now(), plan_ttl_secs) {
        return Err(LaunchpadError::Expired {
            signature: "<unsigned>".to_string(),
        });
    }

    with_keypair(secret, |payer| {
        if payer.pubkey() != plan.fee_payer {
            return Err(LaunchpadError::InvalidKeypair(format!(
                "keypair does not match fee payer {}",
                plan.fee_payer
            )));
        }

        let message = Message::new_with_blockhash(
            &plan.instructions,
            Some(&plan.fee_payer),
            &plan.blockhash.hash,
        );
        let mut transaction = Transaction::new_unsigned(message);

        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(1 + plan.co_signers.len());
        signers.push(payer);
        for co_signer in &plan.co_signers {
            signers.push(co_signer);
        }
        transaction
            .try_sign(&signers, plan.blockhash.hash)
            .map_err(|e| LaunchpadError::internal(format!("signing failed: {}", e)))?;

        let signature = transaction.signatures[0];
        debug!(%signature, signers = signers.len(), "Transaction signed");

        Ok(SignedTransaction {
            transaction,
            signature,
            fee_payer: plan.fee_payer,
            last_valid_block_height: plan.blockhash.last_valid_block_height,
        })
    })
}
