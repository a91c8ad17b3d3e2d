use crate::account::controller::AccountController;
use crate::auth::{Caller, jwt::TokenVerifier};
use crate::constants::{NOT_FOUND, UNAUTHORIZED};
use crate::plan::controller::PlanController;
use crate::position::controller::PositionController;
use crate::req::Method::{GET, POST};
use crate::req::Request;
use crate::settlement::controller::SettlementController;
use crate::utils::extract_token;
use crate::workflow::{controller::WorkflowController, model::RequestKind};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot::Receiver;
use tracing::{debug, info, warn};

/// Everything a route needs: the controllers and the token verifier.
pub struct Api {
    pub accounts: AccountController,
    pub workflow: WorkflowController,
    pub plans: PlanController,
    pub positions: PositionController,
    pub settlement: SettlementController,
    pub verifier: TokenVerifier,
}

pub struct Server {
    api: Arc<Api>,
    bind_addr: String,
}

impl Server {
    pub fn new(api: Arc<Api>, bind_addr: impl Into<String>) -> Self {
        Self {
            api,
            bind_addr: bind_addr.into(),
        }
    }

    pub async fn start(&self, mut shutdown_rx: Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.bind_addr))?;
        info!(addr = %self.bind_addr, "server running");

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    let (mut stream, peer) = conn?;

                    let api = Arc::clone(&self.api);

                    tokio::spawn(async move {
                        let (reader, writer) = stream.split();
                        if let Err(e) = Self::handle_client(reader, writer, &api).await {
                            warn!(%peer, error = ?e, "connection error");
                        }
                    });
                }
                // Shutdown signal check
                _ = &mut shutdown_rx => {
                    info!("shutting down server");
                    break;
                }
            }
        }
        Ok(())
    }

    pub async fn handle_client<Reader, Writer>(
        reader: Reader,
        mut writer: Writer,
        api: &Arc<Api>,
    ) -> Result<()>
    where
        Reader: AsyncRead + Unpin,
        Writer: AsyncWrite + Unpin,
    {
        let request = Request::new(reader)
            .await
            .context("Failed to read request")?;
        debug!(path = %request.path, "request received");

        let (status_line, content) = match Self::authenticate(&request, api) {
            Some(caller) => Self::route(&request, &caller, api).await,
            None => (UNAUTHORIZED.to_string(), "".to_string()),
        };

        writer
            .write_all(format!("{}{}", status_line, content).as_bytes())
            .await
            .context("Failed to write")
    }

    fn authenticate(request: &Request, api: &Api) -> Option<Caller> {
        let token = match extract_token(&request.headers) {
            Some(token) => token,
            None => {
                debug!("missing authorization header");
                return None;
            }
        };
        match api.verifier.verify(&token) {
            Ok(caller) => Some(caller),
            Err(e) => {
                warn!(error = ?e, "token verification failed");
                None
            }
        }
    }

    async fn route(request: &Request, caller: &Caller, api: &Api) -> (String, String) {
        let body = request.body.as_str();
        match (&request.method, request.path.as_str()) {
            // Accounts
            (POST, "/accounts") => api.accounts.open(caller, body).await,
            (GET, "/accounts/me") => api.accounts.me(caller).await,
            (GET, "/accounts/balance") => api.accounts.balance(caller).await,
            (POST, "/accounts/credit") => api.accounts.admin_credit(caller, body).await,
            (POST, "/accounts/restrict") => api.accounts.restrict(caller, body).await,
            (POST, "/accounts/unrestrict") => api.accounts.unrestrict(caller, body).await,
            (GET, "/accounts/restricted") => api.accounts.restricted(caller).await,

            // Deposit and withdrawal requests
            (POST, "/deposits") => api.workflow.submit_deposit(caller, body).await,
            (GET, "/deposits") => api.workflow.history(caller, RequestKind::Deposit).await,
            (GET, "/deposits/pending") => api.workflow.pending(caller, RequestKind::Deposit).await,
            (POST, "/withdrawals") => api.workflow.submit_withdrawal(caller, body).await,
            (GET, "/withdrawals") => api.workflow.history(caller, RequestKind::Withdrawal).await,
            (GET, "/withdrawals/pending") => {
                api.workflow.pending(caller, RequestKind::Withdrawal).await
            }
            (POST, "/requests/get") => api.workflow.get(caller, body).await,
            (POST, "/requests/decide") => api.workflow.decide(caller, body).await,

            // Plans
            (POST, "/plans") => api.plans.purchase(caller, body).await,
            (GET, "/plans/me") => api.plans.mine(caller).await,
            (GET, "/plans/pending") => api.plans.pending(caller).await,
            (POST, "/plans/approve") => api.plans.approve(caller, body).await,
            (POST, "/plans/reject") => api.plans.reject(caller, body).await,

            // Matches and positions
            (POST, "/matches") => api.positions.create_match(caller, body).await,
            (GET, "/matches") => api.positions.list_matches().await,
            (POST, "/matches/get") => api.positions.get_match(body).await,
            (POST, "/matches/investments") => api.positions.match_investments(caller, body).await,
            (POST, "/positions") => api.positions.invest(caller, body).await,
            (GET, "/positions/me") => api.positions.my_positions(caller).await,
            (POST, "/positions/account") => api.positions.account_positions(caller, body).await,

            // Settlement
            (POST, "/settlements") => api.settlement.apply_multiplier(caller, body).await,
            (POST, "/settlements/resume") => api.settlement.resume(caller, body).await,

            _ => (NOT_FOUND.to_string(), "404 Not Found".to_string()),
        }
    }
}
