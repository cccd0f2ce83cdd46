//! Session gate: obtain an operator identity before anything touches the
//! network.
//!
//! The gate only delegates to an [`OperatorAuth`] collaborator. It makes no
//! requests of its own.

use std::future::Future;

use tokio::sync::watch;

use safenest_core::{OperatorId, SecretToken};

use crate::cancel::CancelToken;
use crate::error::AuthError;

/// A signed-in operator and the bearer token for operator calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorIdentity {
    /// The operator's account id.
    pub operator_id: OperatorId,
    /// Access token sent as `Authorization: Bearer` on operator calls.
    pub access_token: SecretToken,
}

/// The external authentication collaborator.
pub trait OperatorAuth: Send + Sync {
    /// The identity available right now, if any.
    fn current(&self) -> Option<OperatorIdentity>;

    /// Suspend until an identity is available.
    ///
    /// Returns [`AuthError::SignedOut`] when no identity can ever arrive.
    fn wait_for_identity(&self) -> impl Future<Output = Result<OperatorIdentity, AuthError>> + Send;
}

/// An identity fixed at construction. `None` means signed out.
#[derive(Debug, Clone)]
pub struct StaticOperatorAuth {
    identity: Option<OperatorIdentity>,
}

impl StaticOperatorAuth {
    /// An already signed-in operator.
    pub fn signed_in(identity: OperatorIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// No operator.
    pub fn signed_out() -> Self {
        Self { identity: None }
    }
}

impl OperatorAuth for StaticOperatorAuth {
    fn current(&self) -> Option<OperatorIdentity> {
        self.identity.clone()
    }

    fn wait_for_identity(&self) -> impl Future<Output = Result<OperatorIdentity, AuthError>> + Send {
        let identity = self.identity.clone();
        async move { identity.ok_or(AuthError::SignedOut) }
    }
}

/// Identity published by the host application over a `watch` channel.
///
/// Waiting suspends until the host publishes `Some`. Dropping the sender
/// while nobody is signed in ends the wait with [`AuthError::SignedOut`].
#[derive(Debug, Clone)]
pub struct WatchOperatorAuth {
    rx: watch::Receiver<Option<OperatorIdentity>>,
}

impl WatchOperatorAuth {
    /// Create the auth source and the sender the host publishes through.
    pub fn channel(
        initial: Option<OperatorIdentity>,
    ) -> (Self, watch::Sender<Option<OperatorIdentity>>) {
        let (tx, rx) = watch::channel(initial);
        (Self { rx }, tx)
    }
}

impl OperatorAuth for WatchOperatorAuth {
    fn current(&self) -> Option<OperatorIdentity> {
        self.rx.borrow().clone()
    }

    fn wait_for_identity(&self) -> impl Future<Output = Result<OperatorIdentity, AuthError>> + Send {
        let mut rx = self.rx.clone();
        async move {
            loop {
                if let Some(identity) = rx.borrow_and_update().clone() {
                    return Ok(identity);
                }
                if rx.changed().await.is_err() {
                    return Err(AuthError::SignedOut);
                }
            }
        }
    }
}

/// Wraps the auth collaborator for the workflow.
#[derive(Debug, Clone)]
pub struct SessionGate<A> {
    auth: A,
}

impl<A: OperatorAuth> SessionGate<A> {
    /// Gate backed by `auth`.
    pub fn new(auth: A) -> Self {
        Self { auth }
    }

    /// Wait for an operator identity, or until `cancel` fires.
    pub async fn ensure_authenticated(
        &self,
        cancel: &CancelToken,
    ) -> Result<OperatorIdentity, AuthError> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            identity = self.auth.wait_for_identity() => identity,
        }
    }

    /// Whether the operator is still signed in.
    pub fn is_valid(&self) -> bool {
        self.auth.current().is_some()
    }

    /// The identity the host holds right now, without waiting. Tokens may
    /// have been refreshed since the workflow first signed in.
    pub fn current(&self) -> Option<OperatorIdentity> {
        self.auth.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use std::time::Duration;

    fn identity() -> OperatorIdentity {
        OperatorIdentity {
            operator_id: OperatorId::new("op-1").unwrap(),
            access_token: SecretToken::new("op-token", "operator token").unwrap(),
        }
    }

    #[tokio::test]
    async fn static_signed_in_returns_identity() {
        let gate = SessionGate::new(StaticOperatorAuth::signed_in(identity()));
        let got = gate.ensure_authenticated(&CancelToken::never()).await.unwrap();
        assert_eq!(got.operator_id.as_str(), "op-1");
        assert!(gate.is_valid());
    }

    #[tokio::test]
    async fn static_signed_out_is_auth_error() {
        let gate = SessionGate::new(StaticOperatorAuth::signed_out());
        let err = gate.ensure_authenticated(&CancelToken::never()).await.unwrap_err();
        assert_eq!(err, AuthError::SignedOut);
        assert!(!gate.is_valid());
    }

    #[tokio::test]
    async fn watch_auth_suspends_until_sign_in() {
        let (auth, tx) = WatchOperatorAuth::channel(None);
        let gate = SessionGate::new(auth);
        let waiter = tokio::spawn(async move {
            gate.ensure_authenticated(&CancelToken::never()).await
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tx.send_replace(Some(identity()));
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(got.operator_id.as_str(), "op-1");
    }

    #[test]
    fn current_follows_token_refresh() {
        let (auth, tx) = WatchOperatorAuth::channel(Some(identity()));
        let gate = SessionGate::new(auth);
        tx.send_replace(Some(OperatorIdentity {
            operator_id: OperatorId::new("op-1").unwrap(),
            access_token: SecretToken::new("fresh", "operator token").unwrap(),
        }));
        assert_eq!(gate.current().unwrap().access_token.expose(), "fresh");
        tx.send_replace(None);
        assert!(gate.current().is_none());
        assert!(!gate.is_valid());
    }

    #[tokio::test]
    async fn watch_auth_sender_dropped_is_signed_out() {
        let (auth, tx) = WatchOperatorAuth::channel(None);
        drop(tx);
        let err = SessionGate::new(auth)
            .ensure_authenticated(&CancelToken::never())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::SignedOut);
    }

    #[tokio::test]
    async fn cancel_abandons_the_wait() {
        let (auth, _tx) = WatchOperatorAuth::channel(None);
        let gate = SessionGate::new(auth);
        let handle = CancelHandle::new();
        let token = handle.token();
        let waiter = tokio::spawn(async move { gate.ensure_authenticated(&token).await });
        handle.cancel();
        let err = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert_eq!(err, AuthError::Cancelled);
    }
}
