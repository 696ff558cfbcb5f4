use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cardissue_events::MessagePublisher;
use cardissue_infra::{
    AppConfig, CardActivationWorkflow, CardIssuanceWorkflow, ConfigError, DispatcherHandle,
    InMemoryStore, IssuanceRequestedHandler, ListCustomerCards, OutboxDispatcher,
};
use cardissue_vault::{InMemoryTokenVault, PanGenerator, VaultKey};

/// All services sharing one in-memory store and vault.
pub struct App<P> {
    pub store: Arc<InMemoryStore>,
    pub vault: Arc<InMemoryTokenVault>,
    pub issuance: Arc<CardIssuanceWorkflow<InMemoryStore, InMemoryTokenVault>>,
    pub activation: CardActivationWorkflow<InMemoryStore>,
    pub intake: IssuanceRequestedHandler<InMemoryStore, InMemoryTokenVault>,
    pub portfolio: ListCustomerCards<InMemoryStore, InMemoryTokenVault>,
    publisher: Arc<P>,
    config: AppConfig,
}

impl<P: MessagePublisher + 'static> App<P> {
    /// Build from configuration. Fails when the vault key is missing or malformed.
    pub fn build(config: AppConfig, publisher: Arc<P>) -> Result<Self, ConfigError> {
        let key = config.vault.key()?;
        Ok(Self::with_key(config, &key, publisher))
    }

    pub fn with_key(config: AppConfig, key: &VaultKey, publisher: Arc<P>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let vault = Arc::new(InMemoryTokenVault::new(key));
        let issuance = Arc::new(CardIssuanceWorkflow::new(
            store.clone(),
            vault.clone(),
            Arc::new(PanGenerator::from_entropy()),
            config.issuance.clone(),
        ));

        Self {
            activation: CardActivationWorkflow::new(store.clone()),
            intake: IssuanceRequestedHandler::new(
                issuance.clone(),
                store.clone(),
                config.issuance.min_credit_score,
            ),
            portfolio: ListCustomerCards::new(store.clone(), vault.clone()),
            issuance,
            store,
            vault,
            publisher,
            config,
        }
    }

    pub fn dispatcher(&self) -> OutboxDispatcher<InMemoryStore, P> {
        OutboxDispatcher::new(
            self.store.clone(),
            self.publisher.clone(),
            self.config.dispatcher.clone(),
        )
    }

    /// Start the outbox dispatcher on the current runtime.
    pub fn start_dispatcher(&self, cancel: CancellationToken) -> DispatcherHandle {
        self.dispatcher().spawn(cancel)
    }
}
