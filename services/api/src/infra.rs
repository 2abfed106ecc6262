use async_trait::async_trait;
use estate_hub::listings::{
    CounterError, CounterSource, Identity, IdentityError, IdentityProvider, ImageUpload,
    MediaError, MediaUploader, PropertyId, Role, StoredMedia, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Public prefix under which stored images are served.
pub(crate) const MEDIA_ROUTE_PREFIX: &str = "/media";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) media_root: Arc<PathBuf>,
}

/// Bearer tokens issued to the built-in demo accounts.
#[derive(Debug, Default)]
pub(crate) struct TokenRegistry {
    tokens: Mutex<HashMap<String, Identity>>,
}

impl TokenRegistry {
    /// One active account per role, with predictable tokens.
    pub(crate) fn seeded() -> Result<Self, IdentityError> {
        let registry = Self::default();
        for role in [Role::Admin, Role::Owner, Role::User] {
            registry.issue(format!("demo-{}", role.label()), role)?;
        }
        Ok(registry)
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Identity>>, IdentityError> {
        self.tokens
            .lock()
            .map_err(|_| IdentityError::Unavailable("token registry poisoned".to_string()))
    }

    pub(crate) fn issue(
        &self,
        token: impl Into<String>,
        role: Role,
    ) -> Result<Identity, IdentityError> {
        let identity = Identity {
            user_id: UserId::new(),
            role,
            is_active: true,
        };
        self.entries()?.insert(token.into(), identity);
        Ok(identity)
    }

    /// Keep the token resolvable but mark the account inactive.
    pub(crate) fn deactivate(&self, token: &str) -> Result<(), IdentityError> {
        let mut tokens = self.entries()?;
        let identity = tokens.get_mut(token).ok_or(IdentityError::Invalid)?;
        identity.is_active = false;
        Ok(())
    }

    pub(crate) fn tokens(&self) -> Result<Vec<(String, Role)>, IdentityError> {
        let mut tokens: Vec<(String, Role)> = self
            .entries()?
            .iter()
            .map(|(token, identity)| (token.clone(), identity.role))
            .collect();
        tokens.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(tokens)
    }
}

#[async_trait]
impl IdentityProvider for TokenRegistry {
    async fn resolve(&self, token: &str) -> Result<Identity, IdentityError> {
        self.entries()?.get(token).copied().ok_or(IdentityError::Invalid)
    }
}

/// Process-local favorites and message tallies.
#[derive(Debug, Default)]
pub(crate) struct CounterBoard {
    favorites: Mutex<HashMap<PropertyId, u64>>,
    messages: Mutex<HashMap<PropertyId, u64>>,
}

impl CounterBoard {
    pub(crate) fn favorite(&self, property_id: PropertyId) {
        if let Ok(mut favorites) = self.favorites.lock() {
            *favorites.entry(property_id).or_default() += 1;
        }
    }

    pub(crate) fn message(&self, property_id: PropertyId) {
        if let Ok(mut messages) = self.messages.lock() {
            *messages.entry(property_id).or_default() += 1;
        }
    }
}

#[async_trait]
impl CounterSource for CounterBoard {
    async fn count_favorites(&self, property_id: &PropertyId) -> Result<u64, CounterError> {
        let favorites = self
            .favorites
            .lock()
            .map_err(|_| CounterError::Unavailable("favorites poisoned".to_string()))?;
        Ok(favorites.get(property_id).copied().unwrap_or_default())
    }

    async fn count_messages(&self, property_id: &PropertyId) -> Result<u64, CounterError> {
        let messages = self
            .messages
            .lock()
            .map_err(|_| CounterError::Unavailable("messages poisoned".to_string()))?;
        Ok(messages.get(property_id).copied().unwrap_or_default())
    }
}

/// Media host backed by a local directory.
#[derive(Debug, Clone)]
pub(crate) struct DiskMedia {
    root: PathBuf,
}

impl DiskMedia {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaUploader for DiskMedia {
    async fn upload(&self, file: &ImageUpload, folder: &str) -> Result<StoredMedia, MediaError> {
        let extension = match file.content_type.as_str() {
            "image/jpeg" => "jpg",
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|extensions| extensions.first())
                .copied()
                .unwrap_or("bin"),
        };
        let storage_key = format!("{folder}/{}.{extension}", Uuid::new_v4());
        let path = resolve_key(&self.root, &storage_key)
            .ok_or_else(|| MediaError::Rejected(format!("invalid folder '{folder}'")))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| MediaError::Transient(err.to_string()))?;
        }
        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(|err| MediaError::Transient(err.to_string()))?;

        Ok(StoredMedia {
            url: format!("{MEDIA_ROUTE_PREFIX}/{storage_key}"),
            storage_key,
        })
    }

    async fn delete(&self, storage_key: &str) -> Result<(), MediaError> {
        let path = resolve_key(&self.root, storage_key)
            .ok_or_else(|| MediaError::Rejected(format!("invalid storage key '{storage_key}'")))?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaError::Transient(err.to_string())),
        }
    }
}

/// Join a storage key onto `root`, refusing anything that could escape it.
pub(crate) fn resolve_key(root: &Path, key: &str) -> Option<PathBuf> {
    let relative = Path::new(key);
    let mut components = relative.components().peekable();
    components.peek()?;
    if components.all(|component| matches!(component, Component::Normal(_))) {
        Some(root.join(relative))
    } else {
        None
    }
}
