//! Incoming message routing.
//!
//! Responses are matched against the table of pending waiters by `in_response_to`.
//! Everything else is dispatched by [`MessageKind`] to the registered
//! [`MessageProcessAction`].

use crate::error::CoreError;

use models::{CommunicationMessage, EndpointId, MessageId, MessageKind};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::sync::oneshot;

/// Handler for one kind of incoming message.
#[async_trait]
pub trait MessageProcessAction: Send + Sync {
    fn message_type_to_process(&self) -> MessageKind;

    async fn invoke(&self, message: CommunicationMessage) -> Result<(), CoreError>;
}

#[derive(Debug)]
struct PendingResponse {
    endpoint: EndpointId,
    responder: oneshot::Sender<CommunicationMessage>,
}

#[derive(Default)]
pub struct MessageHandler {
    pending: Mutex<HashMap<MessageId, PendingResponse>>,
    actions: RwLock<HashMap<MessageKind, Arc<dyn MessageProcessAction>>>,
}

impl MessageHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the action for its message kind.
    ///
    /// Returns `false` and keeps the existing action if the kind is already handled.
    pub fn register_action(&self, action: Arc<dyn MessageProcessAction>) -> bool {
        let kind = action.message_type_to_process();
        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        if actions.contains_key(&kind) {
            warn!("An action for {kind:?} messages is already registered");
            return false;
        }
        actions.insert(kind, action);
        true
    }

    pub fn handles(&self, kind: MessageKind) -> bool {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }

    /// Register interest in the response to `message_id` from `endpoint`.
    ///
    /// Must be called before the message is sent so a fast response is not lost.
    pub fn forward_after_response(
        &self,
        endpoint: &EndpointId,
        message_id: MessageId,
    ) -> oneshot::Receiver<CommunicationMessage> {
        let (responder, receiver) = oneshot::channel();
        self.lock_pending().insert(
            message_id,
            PendingResponse {
                endpoint: endpoint.clone(),
                responder,
            },
        );
        receiver
    }

    /// Drop the waiter for `message_id`, if any.
    pub fn cancel(&self, message_id: &MessageId) -> bool {
        self.lock_pending().remove(message_id).is_some()
    }

    /// Drop every waiter on `endpoint`. The waiting callers observe a closed channel.
    pub fn on_endpoint_signed_off(&self, endpoint: &EndpointId) {
        let mut pending = self.lock_pending();
        let before = pending.len();
        pending.retain(|_, waiter| &waiter.endpoint != endpoint);
        let dropped = before - pending.len();
        if dropped > 0 {
            debug!("Dropped {dropped} pending responses from {endpoint}");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    pub async fn process_message(&self, message: CommunicationMessage) {
        if let Some(original) = message.in_response_to {
            self.complete_pending(original, message);
            return;
        }

        let kind = message.kind();
        let action = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned();

        match action {
            Some(action) => {
                let id = message.id;
                let sender = message.sender.clone();
                if let Err(e) = action.invoke(message).await {
                    error!("Processing {kind:?} message {id} from {sender} failed: {e}");
                }
            }
            None => warn!(
                "No action registered for {kind:?} message {} from {}",
                message.id, message.sender
            ),
        }
    }

    fn complete_pending(&self, original: MessageId, message: CommunicationMessage) {
        let mut pending = self.lock_pending();
        let expected_sender = pending.get(&original).map(|waiter| waiter.endpoint.clone());
        match expected_sender {
            None => {
                debug!(
                    "Dropping unsolicited response {} to {original} from {}",
                    message.id, message.sender
                );
            }
            Some(expected) if expected != message.sender => {
                warn!(
                    "Response to {original} came from {} instead of {expected}",
                    message.sender
                );
            }
            Some(_) => {
                if let Some(waiter) = pending.remove(&original) {
                    // The waiter may have timed out in the meantime
                    let _ = waiter.responder.send(message);
                }
            }
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<MessageId, PendingResponse>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
