pub mod availability;
pub mod push;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::api::MessageResponse;
use crate::error::ClientError;
use crate::models::runner::{ProfileFields, RunnerIdentity};
use crate::session::availability::{Availability, AvailabilityEvent};
use crate::session::push::PushRegistrar;
use crate::storage::CredentialStore;

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Restored(RunnerIdentity),
    NoSession,
    /// A token was stored but the server refused it; the session was cleared.
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushRegistration {
    Updated(String),
    AlreadyCurrent,
    Unavailable,
    NotSignedIn,
    Failed,
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    identity: Option<RunnerIdentity>,
}

/// Holds the signed-in runner and their bearer token for the whole app
/// session. The only writer of the persisted credential.
pub struct Session {
    api: ApiClient,
    store: CredentialStore,
    registrar: Arc<dyn PushRegistrar>,
    state: RwLock<SessionState>,
    availability: Mutex<Availability>,
}

impl Session {
    pub fn new(api: ApiClient, store: CredentialStore, registrar: Arc<dyn PushRegistrar>) -> Self {
        Self {
            api,
            store,
            registrar,
            state: RwLock::new(SessionState::default()),
            availability: Mutex::new(Availability::new(false)),
        }
    }

    pub fn identity(&self) -> Option<RunnerIdentity> {
        self.state.read().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let state = self.state.read();
        state.token.is_some() && state.identity.is_some()
    }

    /// Token and identity together, or `Auth` when signed out.
    pub fn credentials(&self) -> Result<(String, RunnerIdentity), ClientError> {
        let state = self.state.read();
        match (&state.token, &state.identity) {
            (Some(token), Some(identity)) => Ok((token.clone(), identity.clone())),
            _ => Err(ClientError::Auth("not signed in".to_string())),
        }
    }

    pub fn availability(&self) -> Availability {
        *self.availability.lock()
    }

    pub async fn sign_in(&self, phone: &str, password: &str) -> Result<RunnerIdentity, ClientError> {
        let login = self
            .api
            .login(phone, password)
            .await
            .map_err(|err| ClientError::Auth(auth_message(err)))?;

        if let Err(err) = self.store.save_token(&login.token) {
            warn!(error = %err, "failed to persist token");
        }
        self.state.write().token = Some(login.token.clone());

        let identity = match self.api.me(&login.token).await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "failed to fetch identity after login");
                self.logout();
                return Err(ClientError::Auth(auth_message(err)));
            }
        };

        self.establish(&login.token, identity.clone());
        info!(runner_id = %identity.id, "runner signed in");

        self.register_push_address().await;
        self.identity().ok_or_else(|| ClientError::Auth("session cleared".to_string()))
    }

    pub async fn send_verification_code(&self, phone: &str) -> Result<MessageResponse, ClientError> {
        self.api.send_code(phone).await
    }

    pub async fn verify_code(&self, phone: &str, code: &str) -> Result<MessageResponse, ClientError> {
        self.api.verify_code(phone, code).await
    }

    /// Merges one signup step into the server-side profile. A rejected field
    /// comes back as `Validation` with the server's message untouched.
    pub async fn complete_profile(
        &self,
        fields: &ProfileFields,
    ) -> Result<RunnerIdentity, ClientError> {
        let response = self.api.complete_profile(fields).await?;
        if let Some(message) = &response.message {
            debug!(message = %message, "profile step accepted");
        }
        self.establish(&response.token, response.runner.clone());
        Ok(response.runner)
    }

    pub async fn complete_campus_profile(
        &self,
        fields: &ProfileFields,
    ) -> Result<RunnerIdentity, ClientError> {
        let response = self.api.complete_campus_profile(fields).await?;
        self.establish(&response.token, response.runner.clone());
        Ok(response.runner)
    }

    /// Startup path. Never fails: a refused token logs the runner out.
    pub async fn restore_session(&self) -> RestoreOutcome {
        let stored = self.store.load();
        let Some(token) = stored.token else {
            return RestoreOutcome::NoSession;
        };

        {
            let mut state = self.state.write();
            state.token = Some(token.clone());
            state.identity = stored.identity;
        }

        match self.api.me(&token).await {
            Ok(identity) => {
                self.establish(&token, identity.clone());
                info!(runner_id = %identity.id, "session restored");
                self.register_push_address().await;
                RestoreOutcome::Restored(self.identity().unwrap_or(identity))
            }
            Err(err) => {
                warn!(error = %err, "stored session rejected; logging out");
                self.logout();
                RestoreOutcome::Expired
            }
        }
    }

    pub fn logout(&self) {
        {
            let mut state = self.state.write();
            state.token = None;
            state.identity = None;
        }
        *self.availability.lock() = Availability::new(false);

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear stored credential");
        }
        info!("runner logged out");
    }

    /// Best-effort: writes the device address only when it differs from the
    /// one the server holds.
    pub async fn register_push_address(&self) -> PushRegistration {
        let address = match self.registrar.device_address().await {
            Ok(address) => address,
            Err(err) => {
                warn!(error = %err, "push notifications unavailable");
                return PushRegistration::Unavailable;
            }
        };

        let Ok((token, identity)) = self.credentials() else {
            warn!("cannot register push address without a session");
            return PushRegistration::NotSignedIn;
        };

        if identity.expo_push_token.as_deref() == Some(address.as_str()) {
            debug!(runner_id = %identity.id, "push address already up to date");
            return PushRegistration::AlreadyCurrent;
        }

        match self
            .api
            .update_push_address(&token, &identity.id, &address)
            .await
        {
            Ok(()) => {
                self.update_identity(|identity| identity.expo_push_token = Some(address.clone()));
                info!(runner_id = %identity.id, "push address updated");
                PushRegistration::Updated(address)
            }
            Err(err) => {
                warn!(error = %err, "failed to update push address");
                PushRegistration::Failed
            }
        }
    }

    /// Flip availability now, confirm with the server, undo on failure.
    /// Returns the value shown once this request settles.
    pub async fn toggle_availability(&self) -> Result<bool, ClientError> {
        let (token, identity) = self.credentials()?;
        if !identity.is_approved {
            return Err(ClientError::NotApproved);
        }

        let requested = self.transition(AvailabilityEvent::Toggle);

        let (event, outcome) = match self.api.toggle_active(&token, &identity.id, requested).await {
            Ok(response) => (AvailabilityEvent::Confirmed(response.confirmed(requested)), Ok(())),
            Err(err) => (AvailabilityEvent::Rejected, Err(err.into_confirmation())),
        };

        let shown = self.transition(event);
        match outcome {
            Ok(()) => {
                info!(runner_id = %identity.id, online = shown, "availability confirmed");
                Ok(shown)
            }
            Err(err) => {
                warn!(runner_id = %identity.id, error = %err, "availability change rolled back");
                Err(err)
            }
        }
    }

    fn transition(&self, event: AvailabilityEvent) -> bool {
        let shown = {
            let mut availability = self.availability.lock();
            *availability = availability.apply(event);
            availability.displayed()
        };
        self.update_identity(|identity| identity.is_active = shown);
        shown
    }

    fn establish(&self, token: &str, identity: RunnerIdentity) {
        if let Err(err) = self.store.save(token, &identity) {
            warn!(error = %err, "failed to persist session");
        }
        *self.availability.lock() = Availability::new(identity.is_active);

        let mut state = self.state.write();
        state.token = Some(token.to_string());
        state.identity = Some(identity);
    }

    fn update_identity(&self, apply: impl FnOnce(&mut RunnerIdentity)) {
        if let Some(identity) = self.state.write().identity.as_mut() {
            apply(identity);
        }
    }
}

fn auth_message(err: ClientError) -> String {
    match err {
        ClientError::Auth(msg)
        | ClientError::Validation(msg)
        | ClientError::NotFound(msg)
        | ClientError::Network(msg) => msg,
        other => other.to_string(),
    }
}
