//! Process-wide encoding registry.
//!
//! Maps encoding names to constructors and memoizes the constructed engines.
//! The built-in encodings are registered on first access; additional
//! encodings can be registered at startup.

use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use log::debug;
use once_cell::sync::Lazy;

use crate::load::LoadError;
use crate::{presets, Definition, Encoding, InitializationError};

/// Produces the construction arguments for a named encoding.
pub type EncodingConstructor = fn() -> Result<Definition, LoadError>;

/// Errors encountered in the encoding registry.
#[non_exhaustive]
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum RegistryError {
    /// No encoding with the given name is registered.
    #[error("unknown encoding {0:?}")]
    UnknownEncoding(String),
    /// An encoding with the given name is already registered.
    #[error("encoding {0:?} is already registered")]
    DuplicateEncoding(String),
    /// The encoding's constructor failed to load its data.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The encoding failed to initialize.
    #[error(transparent)]
    Initialization(#[from] InitializationError),
}

struct Registry {
    constructors: HashMap<String, EncodingConstructor>,
    encodings:    HashMap<String, Arc<Encoding>>,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| {
    let constructors = presets::builtins()
        .into_iter()
        .map(|(name, constructor)| (name.into(), constructor))
        .collect();
    Mutex::new(Registry {
        constructors,
        encodings: HashMap::new(),
    })
});

/// Registers an encoding constructor under the given name.
///
/// Returns an error if the name is already registered.
pub fn register_encoding(
    name: impl Into<String>, constructor: EncodingConstructor,
) -> Result<(), RegistryError> {
    let name = name.into();
    let mut registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    if registry.constructors.contains_key(&name) {
        return Err(RegistryError::DuplicateEncoding(name));
    }
    registry.constructors.insert(name, constructor);
    Ok(())
}

/// Returns the encoding with the given name, constructing it on first use.
///
/// Construction runs the registered constructor, which may fetch vocabulary
/// data through the loader. Subsequent calls return the same shared instance.
pub fn get_encoding(name: &str) -> Result<Arc<Encoding>, RegistryError> {
    let mut registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(encoding) = registry.encodings.get(name) {
        return Ok(encoding.clone());
    }
    let constructor = registry
        .constructors
        .get(name)
        .copied()
        .ok_or_else(|| RegistryError::UnknownEncoding(name.into()))?;
    debug!("constructing encoding {name}");
    let encoding = Arc::new(Encoding::from_definition(constructor()?)?);
    registry.encodings.insert(name.into(), encoding.clone());
    Ok(encoding)
}

/// Returns the names of all registered encodings.
pub fn list_encoding_names() -> Vec<String> {
    let registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    registry.constructors.keys().cloned().collect()
}
