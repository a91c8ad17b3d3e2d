use std::sync::Arc;

use super::{
    model::{ApplyMultiplier, ResumeSettlement},
    service::SettlementEngine,
};
use crate::{
    auth::Caller,
    utils::{ok, parse_body},
};

pub struct SettlementController {
    engine: Arc<SettlementEngine>,
}

impl SettlementController {
    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        SettlementController { engine }
    }

    pub async fn apply_multiplier(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: ApplyMultiplier = parse_body(body)?;
            self.engine
                .apply_multiplier(caller, req.match_id, req.multiplier)
                .await
        }
        .await;
        ok(result)
    }

    pub async fn resume(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: ResumeSettlement = parse_body(body)?;
            self.engine.resume(caller, req.match_id).await
        }
        .await;
        ok(result)
    }
}
