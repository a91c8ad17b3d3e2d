use std::sync::Arc;

use super::{
    model::{PlanPurchase, PlanRef},
    service::PlanManager,
};
use crate::{
    auth::Caller,
    constants::CREATED,
    utils::{ok, parse_body, respond},
};

pub struct PlanController {
    plans: Arc<PlanManager>,
}

impl PlanController {
    pub fn new(plans: Arc<PlanManager>) -> Self {
        PlanController { plans }
    }

    pub async fn purchase(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: PlanPurchase = parse_body(body)?;
            self.plans
                .purchase(caller, &req.plan_name, req.price, req.expiry_date, &req.evidence)
                .await
        }
        .await;
        respond(result, CREATED)
    }

    pub async fn approve(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: PlanRef = parse_body(body)?;
            self.plans.approve(caller, req.account_id).await
        }
        .await;
        ok(result)
    }

    pub async fn reject(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: PlanRef = parse_body(body)?;
            self.plans.reject(caller, req.account_id).await
        }
        .await;
        ok(result)
    }

    pub async fn mine(&self, caller: &Caller) -> (String, String) {
        ok(self.plans.plan_for(caller).await)
    }

    pub async fn pending(&self, caller: &Caller) -> (String, String) {
        ok(self.plans.pending(caller).await)
    }
}
