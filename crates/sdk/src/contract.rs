//! A committed chaincode on one channel

use crate::error::Result;
use crate::lifecycle::query_committed;
use crate::proposal::{Invocation, ProposalKind};
use crate::signer::Signer;
use crate::transaction::{endorse, invoke, query, EndorsedProposal, Endpoints, TxResponse};
use std::sync::Arc;
use std::time::Duration;

pub struct Contract {
    signer: Arc<dyn Signer>,
    endpoints: Endpoints,
    channel_id: String,
    name: String,
}

impl Contract {
    /// Bind to `name` on `channel_id`, failing unless its definition is committed
    pub async fn new(
        signer: Arc<dyn Signer>,
        endpoints: Endpoints,
        channel_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let channel_id = channel_id.into();
        let name = name.into();
        let committer = endpoints.committer()?;
        query_committed(
            signer.as_ref(),
            committer.as_ref(),
            &channel_id,
            Some(&name),
            endpoints.timeouts.endorse(),
        )
        .await?;
        tracing::debug!("Chaincode {} is committed on {}", name, channel_id);

        Ok(Self {
            signer,
            endpoints,
            channel_id,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Endorse and order `function(args)`, waiting for commit when `wait` is set
    pub async fn invoke(&self, function: &str, args: &[&str], wait: Option<Duration>) -> Result<TxResponse> {
        let kind = ProposalKind::Invoke(self.invocation(function, args));
        invoke(&self.signer, &self.endpoints, &self.channel_id, &kind, wait).await
    }

    /// Invoke with private data handed to endorsers only
    pub async fn invoke_with_transient(
        &self,
        function: &str,
        args: &[&str],
        transient: &str,
        wait: Option<Duration>,
    ) -> Result<TxResponse> {
        let kind = ProposalKind::Invoke(self.invocation(function, args).with_transient(transient));
        invoke(&self.signer, &self.endpoints, &self.channel_id, &kind, wait).await
    }

    /// Evaluate `function(args)` without ordering
    pub async fn query(&self, function: &str, args: &[&str]) -> Result<TxResponse> {
        let kind = ProposalKind::Query(self.invocation(function, args));
        query(self.signer.as_ref(), &self.endpoints, &self.channel_id, &kind).await
    }

    /// Endorse only; the caller orders the result later with `submit_endorsed`
    pub async fn send_transaction(&self, function: &str, args: &[&str]) -> Result<EndorsedProposal> {
        let kind = ProposalKind::SendOnly(self.invocation(function, args));
        endorse(self.signer.as_ref(), &self.endpoints, &self.channel_id, &kind).await
    }

    fn invocation(&self, function: &str, args: &[&str]) -> Invocation {
        let args = std::iter::once(function)
            .chain(args.iter().copied())
            .map(|arg| arg.as_bytes().to_vec())
            .collect();
        Invocation::new(self.name.clone(), args)
    }
}
