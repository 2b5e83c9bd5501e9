//! Single-resolution response slot for one decorated call.
//!
//! A `Responder` can be used once: `respond` consumes it. `PendingCall`
//! owns the responder while the call is unanswered and gives it up on the
//! first delivery, after which every later outcome is handed back to the
//! caller of `deliver` instead of reaching the waiting `PendingResponse`.

use crate::error::{LocalSyncError, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Sending half of a call's response slot.
#[derive(Debug)]
pub struct Responder {
    key: String,
    tx: oneshot::Sender<Result<Value>>,
}

impl Responder {
    /// Resolve the call. Returns false if the waiting side was dropped.
    pub fn respond(self, result: Result<Value>) -> bool {
        self.tx.send(result).is_ok()
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Receiving half of a call's response slot.
///
/// Resolves to the first delivered outcome. If the call is abandoned without
/// an answer it resolves to `LocalSyncError::ResponseDropped`.
#[derive(Debug)]
pub struct PendingResponse {
    key: String,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingResponse {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Future for PendingResponse {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(LocalSyncError::ResponseDropped {
                key: this.key.clone(),
            }),
        })
    }
}

/// Create a linked responder and pending response for `key`.
pub fn response_slot(key: impl Into<String>) -> (Responder, PendingResponse) {
    let key = key.into();
    let (tx, rx) = oneshot::channel();
    (
        Responder {
            key: key.clone(),
            tx,
        },
        PendingResponse { key, rx },
    )
}

/// Outcome of `PendingCall::deliver`.
#[derive(Debug)]
pub enum Delivery {
    /// The result reached the waiting caller.
    Delivered,
    /// The call was unanswered but the caller stopped waiting.
    CallerGone,
    /// The call was already answered; the result is handed back.
    AlreadyAnswered(Result<Value>),
}

/// Per-call answered/unanswered state.
#[derive(Debug)]
pub struct PendingCall {
    responder: Option<Responder>,
}

impl PendingCall {
    pub fn new(responder: Responder) -> Self {
        Self {
            responder: Some(responder),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.responder.is_none()
    }

    /// Deliver `result` if no answer has been given yet.
    pub fn deliver(&mut self, result: Result<Value>) -> Delivery {
        match self.responder.take() {
            Some(responder) => {
                if responder.respond(result) {
                    Delivery::Delivered
                } else {
                    Delivery::CallerGone
                }
            }
            None => Delivery::AlreadyAnswered(result),
        }
    }
}
