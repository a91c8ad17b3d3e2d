use std::sync::Arc;

use super::{
    model::{Decision, DepositSubmission, RequestKind, RequestRef, WithdrawalSubmission},
    service::RequestWorkflow,
};
use crate::{
    auth::Caller,
    constants::CREATED,
    utils::{ok, parse_body, respond},
};

pub struct WorkflowController {
    workflow: Arc<RequestWorkflow>,
}

impl WorkflowController {
    pub fn new(workflow: Arc<RequestWorkflow>) -> Self {
        WorkflowController { workflow }
    }

    pub async fn submit_deposit(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: DepositSubmission = parse_body(body)?;
            self.workflow
                .submit_deposit(caller, req.amount, &req.evidence)
                .await
        }
        .await;
        respond(result, CREATED)
    }

    pub async fn submit_withdrawal(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: WithdrawalSubmission = parse_body(body)?;
            self.workflow
                .submit_withdrawal(caller, req.amount, &req.currency, req.destination)
                .await
        }
        .await;
        respond(result, CREATED)
    }

    pub async fn decide(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: Decision = parse_body(body)?;
            self.workflow
                .decide(caller, req.request_id, req.outcome, req.reason.as_deref())
                .await
        }
        .await;
        ok(result)
    }

    pub async fn get(&self, caller: &Caller, body: &str) -> (String, String) {
        let result = async {
            let req: RequestRef = parse_body(body)?;
            self.workflow.get(caller, req.request_id).await
        }
        .await;
        ok(result)
    }

    pub async fn history(&self, caller: &Caller, kind: RequestKind) -> (String, String) {
        ok(self.workflow.history(caller, kind).await)
    }

    pub async fn pending(&self, caller: &Caller, kind: RequestKind) -> (String, String) {
        ok(self.workflow.pending(caller, kind).await)
    }
}
