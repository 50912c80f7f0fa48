//! The engine: parse, plan, execute, stream.
//!
//! One engine serves many concurrent requests against a shared catalog
//! site. Each request gets its own pipeline, stop channel, and optional
//! deadline; cancellation and timeouts drain the pipeline and join every
//! operator task before the request completes.

use crate::error::{Error, Result};
use crate::exec;
use crate::parsing::Parser;
use crate::pipeline::SupportMsg;
use crate::planner::{Capabilities, Planner};
use crate::request::{Request, RequestStatus, ResponseSink};
use crate::stmt::Statement;
use quill_catalog::Site;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Engine {
    site: Arc<dyn Site>,
    default_pool: String,
    timeout: Option<Duration>,
    capabilities: Capabilities,
}

impl Engine {
    pub fn new(site: Arc<dyn Site>, default_pool: impl Into<String>) -> Self {
        Engine {
            site,
            default_pool: default_pool.into(),
            timeout: None,
            capabilities: Capabilities::default(),
        }
    }

    /// Engine-wide default timeout; a request's own deadline wins.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Execute a request, streaming into the sink. Always completes the
    /// sink, whatever happens.
    pub async fn execute(&self, request: &Request, sink: &mut dyn ResponseSink) {
        info!(id = %request.id, statement = %request.statement, "executing request");
        match self.run(request, sink).await {
            Ok(status) => sink.complete(status).await,
            Err(error) => {
                warn!(id = %request.id, error = %error, "request failed");
                sink.error(error).await;
                sink.complete(RequestStatus::Errors).await;
            }
        }
    }

    async fn run(&self, request: &Request, sink: &mut dyn ResponseSink) -> Result<RequestStatus> {
        match Parser::parse(&request.statement)? {
            Statement::CreateIndex(create) => {
                let pool_name = create.pool.as_deref().unwrap_or(&self.default_pool);
                let bucket = self.site.pool(pool_name)?.bucket(&create.bucket)?;
                let expressions: Vec<String> = create
                    .expressions
                    .iter()
                    .map(|expr| expr.to_string())
                    .collect();
                bucket
                    .create_index(
                        &create.name,
                        create.method.as_deref().unwrap_or("default"),
                        expressions,
                    )
                    .await?;
                debug!(index = %create.name, bucket = %create.bucket, "index created");
                Ok(RequestStatus::Success)
            }
            statement @ Statement::Select(_) => {
                let plan = Planner::new(self.capabilities).plan(statement, &request.args)?;
                let pool_name = plan.pool.as_deref().unwrap_or(&self.default_pool);
                let pool = self.site.pool(pool_name)?;
                self.stream(&plan, &pool, request, sink).await
            }
        }
    }

    async fn stream(
        &self,
        plan: &crate::plan::Plan,
        pool: &Arc<dyn quill_catalog::Pool>,
        request: &Request,
        sink: &mut dyn ResponseSink,
    ) -> Result<RequestStatus> {
        let mut execution = exec::start(plan, pool)?;

        let timeout = request.timeout.or(self.timeout);
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let mut timed_out = false;

        let mut status = RequestStatus::Success;
        let mut items_open = true;
        let mut support_open = true;
        while items_open || support_open {
            tokio::select! {
                received = execution.items.recv(), if items_open => match received {
                    Some(item) => sink.result(item.into_value()).await,
                    None => items_open = false,
                },
                received = execution.support.recv(), if support_open => match received {
                    Some(SupportMsg::Warning(error)) => sink.warning(error).await,
                    Some(SupportMsg::Fatal(error)) => {
                        status = RequestStatus::Errors;
                        sink.error(error).await;
                    }
                    None => support_open = false,
                },
                _ = wait_until(deadline), if !timed_out && deadline.is_some() => {
                    timed_out = true;
                    status = RequestStatus::Timeout;
                    sink.error(Error::Cancelled).await;
                    execution.stop();
                }
            }
        }
        execution.join().await;
        debug!(id = %request.id, ?status, "request finished");
        Ok(status)
    }
}

async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
