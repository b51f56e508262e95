use std::sync::Arc;
use tokio::sync::watch;

/// Session token shared with the external auth collaborator.
///
/// The auth side writes it, the API client and the live channel only read it.
#[derive(Clone, Debug)]
pub struct SessionToken {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl SessionToken {
    pub fn new(token: Option<String>) -> Self {
        let (tx, _rx) = watch::channel(token);
        Self { tx: Arc::new(tx) }
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        self.tx.send_replace(Some(token.into()));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_shared_between_clones() {
        let session = SessionToken::anonymous();
        let reader = session.clone();
        assert_eq!(reader.get(), None);

        session.set("abc");
        assert_eq!(reader.get().as_deref(), Some("abc"));

        reader.clear();
        assert_eq!(session.get(), None);
    }
}
