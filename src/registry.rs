use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ConfigError;
use crate::lexicon::{Lexicon, TierSelection};
use crate::resolver::{Collaborators, Resolver, ResolverConfig};
use crate::vocab::Locale;

/// Caller-owned cache of resolvers and lexicons.
///
/// Resolvers are shared per [`ResolverConfig`]; lexicons, the expensive part,
/// are shared per `(locale, tier selection)` so configurations that differ
/// only in rules or fallback settings load dictionaries once.
#[derive(Debug)]
pub struct ResolverRegistry {
    collaborators: Collaborators,
    resolvers: Mutex<HashMap<ResolverConfig, Arc<Resolver>>>,
    lexicons: Mutex<HashMap<(Locale, TierSelection), Arc<Lexicon>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResolverRegistry {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            resolvers: Mutex::new(HashMap::new()),
            lexicons: Mutex::new(HashMap::new()),
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// The resolver for `config`, built on first request.
    pub fn get(&self, config: &ResolverConfig) -> Result<Arc<Resolver>, ConfigError> {
        if let Some(resolver) = lock(&self.resolvers).get(config) {
            return Ok(resolver.clone());
        }

        config.validate()?;
        let lexicon = self.lexicon(config.locale, config.tier_selection())?;
        let resolver = Arc::new(Resolver::with_lexicon(
            config.clone(),
            lexicon,
            &self.collaborators,
        )?);
        log::debug!("Built resolver for {config:?}");

        // Another thread may have won the race; keep its instance.
        Ok(lock(&self.resolvers)
            .entry(config.clone())
            .or_insert(resolver)
            .clone())
    }

    /// The lexicon for `(locale, selection)`, loaded on first request.
    pub fn lexicon(
        &self,
        locale: Locale,
        selection: TierSelection,
    ) -> Result<Arc<Lexicon>, ConfigError> {
        if let Some(lexicon) = lock(&self.lexicons).get(&(locale, selection)) {
            return Ok(lexicon.clone());
        }

        let lexicon = Arc::new(Lexicon::build(
            locale,
            selection,
            self.collaborators.tier_source.as_ref(),
        )?);
        Ok(lock(&self.lexicons)
            .entry((locale, selection))
            .or_insert(lexicon)
            .clone())
    }

    /// Drop every cached resolver and lexicon.
    pub fn clear(&self) {
        lock(&self.resolvers).clear();
        lock(&self.lexicons).clear();
    }

    /// Number of cached resolvers.
    pub fn len(&self) -> usize {
        lock(&self.resolvers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
