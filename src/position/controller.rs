use std::sync::Arc;

use super::{
    model::{Investment, MatchRef, NewMatch},
    service::PositionLedger,
};
use crate::{
    account::model::AccountRef,
    auth::Caller,
    constants::CREATED,
    utils::{ok, parse_body, respond},
};

pub struct PositionController {
    ledger: Arc<PositionLedger>,
}

impl PositionController {
    pub fn new(ledger: Arc<PositionLedger>) -> Self {
        PositionController { ledger }
    }

    pub async fn create_match(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: NewMatch = parse_body(body)?;
            self.ledger.create_match(caller, req).await
        }
        .await;
        respond(result, CREATED)
    }

    pub async fn list_matches(&self) -> (String, String) {
        ok(self.ledger.list_matches().await)
    }

    pub async fn get_match(&self, body: &str) -> (String, String) {
        let result = async {
            let req: MatchRef = parse_body(body)?;
            self.ledger.get_match(req.match_id).await
        }
        .await;
        ok(result)
    }

    pub async fn invest(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: Investment = parse_body(body)?;
            self.ledger.invest(caller, req.match_id, req.amount).await
        }
        .await;
        respond(result, CREATED)
    }

    pub async fn my_positions(&self, caller: &Caller) -> (String, String) {
        ok(self.ledger.positions_for_account(caller, caller.account_id).await)
    }

    pub async fn account_positions(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: AccountRef = parse_body(body)?;
            self.ledger.positions_for_account(caller, req.account_id).await
        }
        .await;
        ok(result)
    }

    pub async fn match_investments(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: MatchRef = parse_body(body)?;
            self.ledger.match_investments(caller, req.match_id).await
        }
        .await;
        ok(result)
    }
}
