//! Access control
//!
//! One administrator, fixed at creation, maintains the allow-list of
//! submitters. The administrator is not a submitter unless it authorizes
//! itself.

use census_fhe::{CipherBackend, DecryptionOracle};
use tracing::{info, warn};

use crate::contract::CensusContract;
use crate::errors::{CensusError, CensusResult};
use crate::types::{CallContext, Identity};

impl<B, O> CensusContract<B, O>
where
    B: CipherBackend,
    O: DecryptionOracle<B::Ciphertext>,
{
    /// Add `identity` to the authorized submitters. Admin only, idempotent.
    pub fn authorize(&mut self, ctx: &CallContext, identity: Identity) -> CensusResult<()> {
        if ctx.caller != self.state.admin {
            warn!("Rejected authorize from non-admin {}", ctx.caller.short());
            return Err(CensusError::Authorization(format!(
                "{} is not the administrator",
                ctx.caller.short()
            )));
        }

        if self.state.authorized.insert(identity) {
            info!("Authorized submitter {}", identity.short());
            self.changes.authorized.insert(identity);
        }
        Ok(())
    }

    pub fn admin(&self) -> Identity {
        self.state.admin()
    }

    pub fn is_authorized(&self, identity: &Identity) -> bool {
        self.state.is_authorized(identity)
    }

    pub fn authorized(&self) -> Vec<Identity> {
        self.state.authorized()
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::test_support::*;
    use crate::errors::CensusError;
    use crate::types::{CallContext, Identity};

    #[test]
    fn test_admin_not_implicitly_authorized() {
        let (contract, _) = setup();
        assert!(!contract.is_authorized(&admin()));
        assert!(contract.is_authorized(&alice()));
    }

    #[test]
    fn test_authorize_idempotent() {
        let (mut contract, _) = setup();
        let ctx = CallContext::at(admin(), 0);
        contract.authorize(&ctx, alice()).unwrap();
        contract.authorize(&ctx, alice()).unwrap();
        assert_eq!(contract.authorized(), vec![alice()]);
    }

    #[test]
    fn test_non_admin_cannot_authorize() {
        let (mut contract, _) = setup();
        let mallory = Identity::from_label("mallory");
        let result = contract.authorize(&CallContext::at(alice(), 0), mallory);
        assert!(matches!(result, Err(CensusError::Authorization(_))));
        assert!(!contract.is_authorized(&mallory));
    }

    #[test]
    fn test_admin_can_authorize_itself() {
        let (mut contract, _) = setup();
        contract.authorize(&CallContext::at(admin(), 0), admin()).unwrap();
        assert!(contract.is_authorized(&admin()));
    }
}
