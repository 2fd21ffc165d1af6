//! Privileged bulk erase.
//!
//! Logically part of the engine's action surface but kept apart from the
//! per-record state machine: the sweep runs no lifecycle checks and moves
//! no funds. An emergency reset, not a normal-path operation.

use crate::collaborators::AuthContext;
use crate::error::EscrowError;
use crate::store::EscrowStore;
use crate::types::AccountId;
use tracing::warn;

pub struct AdminSweep;

impl AdminSweep {
    /// Erase every live record. Only the governing `authority` may run it.
    pub fn run(
        auth: &dyn AuthContext,
        authority: &AccountId,
        store: &mut EscrowStore,
    ) -> Result<usize, EscrowError> {
        auth.require_auth(authority)?;

        let keys = store.keys();
        let erased = keys.len();
        for key in keys {
            store.erase(key)?;
        }

        warn!(erased, "escrow store swept clean");
        Ok(erased)
    }
}
