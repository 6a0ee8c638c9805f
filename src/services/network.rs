//! Counter-party session transport
//!
//! Sessions are point-to-point, ordered and reliable once open. Every wait
//! on the far side is bounded by the configured timeout; a timeout, a closed
//! channel or an unknown peer all surface as [`FlowError::SessionFailure`].
//!
//! [`InMemoryNetwork`] connects the nodes of one process. Opening a session
//! to a party spawns that party's registered [`SessionHandler`] on a fresh
//! pair of channels.

use crate::errors::{FlowError, FlowResult};
use crate::ledger::{Party, PublicKey, SignedTransaction, TransactionSignature};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Messages exchanged by the return protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMessage {
    /// Initiator asks for an endorsement
    Propose(SignedTransaction),
    /// Counter-party endorses the proposal
    Endorse(TransactionSignature),
    /// Counter-party declines, with its reason
    Refuse(String),
    /// Notarised transaction for the counter-party to record
    Finalized(SignedTransaction),
    /// Counter-party recorded the finalized transaction
    Ack,
}

impl SessionMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Propose(_) => "propose",
            Self::Endorse(_) => "endorse",
            Self::Refuse(_) => "refuse",
            Self::Finalized(_) => "finalized",
            Self::Ack => "ack",
        }
    }
}

#[async_trait]
pub trait FlowSession: Send {
    fn counterparty(&self) -> &Party;

    async fn send(&mut self, message: SessionMessage) -> FlowResult<()>;

    async fn receive(&mut self) -> FlowResult<SessionMessage>;
}

#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn open(&self, counterparty: &Party) -> FlowResult<Box<dyn FlowSession>>;
}

/// Responder side of a session, spawned once per opened session
#[async_trait]
pub trait SessionHandler: Send + Sync {
    async fn handle(&self, session: Box<dyn FlowSession>);
}

/// One end of an in-process session
pub struct ChannelSession {
    counterparty: Party,
    outbound: mpsc::UnboundedSender<SessionMessage>,
    inbound: mpsc::UnboundedReceiver<SessionMessage>,
    timeout: Duration,
}

impl ChannelSession {
    /// Two connected ends; `a` talks to `b_party`, `b` talks to `a_party`
    pub fn pair(a_party: Party, b_party: Party, timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let a = Self {
            counterparty: b_party,
            outbound: a_tx,
            inbound: a_rx,
            timeout,
        };
        let b = Self {
            counterparty: a_party,
            outbound: b_tx,
            inbound: b_rx,
            timeout,
        };
        (a, b)
    }
}

#[async_trait]
impl FlowSession for ChannelSession {
    fn counterparty(&self) -> &Party {
        &self.counterparty
    }

    async fn send(&mut self, message: SessionMessage) -> FlowResult<()> {
        debug!(to = %self.counterparty, kind = message.kind(), "Session send");
        self.outbound
            .send(message)
            .map_err(|_| FlowError::session(&self.counterparty, "session closed by counter-party"))
    }

    async fn receive(&mut self) -> FlowResult<SessionMessage> {
        match tokio::time::timeout(self.timeout, self.inbound.recv()).await {
            Ok(Some(message)) => {
                debug!(from = %self.counterparty, kind = message.kind(), "Session receive");
                Ok(message)
            }
            Ok(None) => Err(FlowError::session(
                &self.counterparty,
                "session closed by counter-party",
            )),
            Err(_) => Err(FlowError::session(
                &self.counterparty,
                format!("no response within {}ms", self.timeout.as_millis()),
            )),
        }
    }
}

/// Process-local network of nodes
pub struct InMemoryNetwork {
    handlers: DashMap<PublicKey, Arc<dyn SessionHandler>>,
    opened: DashMap<PublicKey, usize>,
    total_opened: AtomicUsize,
    timeout: Duration,
}

impl InMemoryNetwork {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
            opened: DashMap::new(),
            total_opened: AtomicUsize::new(0),
            timeout,
        })
    }

    /// Route sessions addressed to `party` into `handler`
    pub fn register(&self, party: &Party, handler: Arc<dyn SessionHandler>) {
        self.handlers.insert(party.owning_key, handler);
    }

    /// Make `party` unreachable
    pub fn disconnect(&self, party: &Party) {
        self.handlers.remove(&party.owning_key);
    }

    /// Transport used by flows running on `local`
    pub fn transport_for(self: &Arc<Self>, local: Party) -> Arc<dyn SessionTransport> {
        Arc::new(NodeTransport {
            network: Arc::clone(self),
            local,
        })
    }

    pub fn sessions_opened(&self) -> usize {
        self.total_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_opened_to(&self, party: &Party) -> usize {
        self.opened.get(&party.owning_key).map(|c| *c).unwrap_or(0)
    }

    fn connect(&self, local: &Party, counterparty: &Party) -> FlowResult<Box<dyn FlowSession>> {
        let handler = self
            .handlers
            .get(&counterparty.owning_key)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| FlowError::session(counterparty, "party is not reachable"))?;

        self.total_opened.fetch_add(1, Ordering::SeqCst);
        *self.opened.entry(counterparty.owning_key).or_insert(0) += 1;

        let (initiator, responder) =
            ChannelSession::pair(local.clone(), counterparty.clone(), self.timeout);
        tokio::spawn(async move {
            handler.handle(Box::new(responder)).await;
        });
        debug!(from = %local, to = %counterparty, "Session opened");
        Ok(Box::new(initiator))
    }
}

struct NodeTransport {
    network: Arc<InMemoryNetwork>,
    local: Party,
}

#[async_trait]
impl SessionTransport for NodeTransport {
    async fn open(&self, counterparty: &Party) -> FlowResult<Box<dyn FlowSession>> {
        self.network.connect(&self.local, counterparty)
    }
}
