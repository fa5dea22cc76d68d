//! Decryption key custody.
//!
//! The documents table only ever holds the nonce and tag. The key is either
//! handed back to the uploader once, or written to the separate key vault.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scribe_types::document::EncryptionMaterial;
use scribe_types::DocumentId;

use crate::{Result, SharedConnection};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyMode {
    #[default]
    ClientHeld,
    Vault,
}

#[derive(Clone)]
pub enum KeyCustody {
    /// Key is returned in the ingestion receipt and never stored.
    ClientHeld,
    /// Key is stored in the vault database and never returned.
    Vault(SharedConnection),
}

impl KeyCustody {
    pub fn mode(&self) -> CustodyMode {
        match self {
            KeyCustody::ClientHeld => CustodyMode::ClientHeld,
            KeyCustody::Vault(_) => CustodyMode::Vault,
        }
    }

    /// Take custody of a freshly generated key. Returns the key if the
    /// caller must hold it.
    pub async fn take(
        &self,
        document_id: &DocumentId,
        material: &EncryptionMaterial,
    ) -> Result<Option<String>> {
        match self {
            KeyCustody::ClientHeld => Ok(Some(material.key.clone())),
            KeyCustody::Vault(vault) => {
                let conn = vault.lock().await;
                scribe_db::vault::store_key(&conn, document_id, &material.key, scribe_db::unix_now())?;
                debug!(document_id = %document_id, "key stored in vault");
                Ok(None)
            }
        }
    }

    /// Drop a key taken for a document that was never recorded. Best-effort.
    pub async fn release(&self, document_id: &DocumentId) {
        if let KeyCustody::Vault(vault) = self {
            let conn = vault.lock().await;
            if let Err(e) = scribe_db::vault::delete_key(&conn, document_id) {
                warn!(document_id = %document_id, error = %e, "failed to release vaulted key");
            }
        }
    }

    /// Look up a vaulted key. Always `None` for client-held custody.
    pub async fn lookup(&self, document_id: &DocumentId) -> Result<Option<String>> {
        match self {
            KeyCustody::ClientHeld => Ok(None),
            KeyCustody::Vault(vault) => {
                let conn = vault.lock().await;
                Ok(scribe_db::vault::load_key(&conn, document_id)?)
            }
        }
    }
}
