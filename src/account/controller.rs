use std::sync::Arc;

use super::{
    model::{AccountRef, AdminCredit, Balance, OpenAccount},
    service::AccountStore,
};
use crate::{
    auth::Caller,
    constants::CREATED,
    utils::{ok, parse_body, respond},
};

pub struct AccountController {
    store: Arc<AccountStore>,
}

impl AccountController {
    pub fn new(store: Arc<AccountStore>) -> Self {
        AccountController { store }
    }

    /// Called by the registration flow once a user exists.
    pub async fn open(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            caller.require_admin()?;
            let req: OpenAccount = parse_body(body)?;
            self.store.open(req.account_id).await
        }
        .await;
        respond(result, CREATED)
    }

    pub async fn me(&self, caller: &Caller) -> (String, String) {
        ok(self.store.get(caller.account_id).await)
    }

    pub async fn balance(&self, caller: &Caller) -> (String, String) {
        let result = self
            .store
            .get_balance(caller.account_id)
            .await
            .map(|balance| Balance {
                account_id: caller.account_id,
                balance,
            });
        ok(result)
    }

    pub async fn admin_credit(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: AdminCredit = parse_body(body)?;
            self.store.admin_credit(caller, req.account_id, req.amount).await
        }
        .await;
        ok(result)
    }

    pub async fn restrict(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: AccountRef = parse_body(body)?;
            self.store.restrict(caller, req.account_id).await
        }
        .await;
        ok(result)
    }

    pub async fn unrestrict(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: AccountRef = parse_body(body)?;
            self.store.unrestrict(caller, req.account_id).await
        }
        .await;
        ok(result)
    }

    pub async fn restricted(&self, caller: &Caller) -> (String, String) {
        ok(self.store.list_restricted(caller).await)
    }
}
