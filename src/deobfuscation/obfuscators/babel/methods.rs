//! Restoring encrypted Babel.NET methods.
//!
//! Stubs of encrypted methods pass a single string to the runtime: the method's name in the
//! container, optionally prefixed with a feature name (`"feature:name"`). Each feature has its
//! own container, the unnamed feature `""` is the main one.

use std::collections::HashMap;

use crate::{
    deobfuscation::{
        config::BabelConfig,
        obfuscators::babel::image::{ImageReader, RestoredBody, TargetMethod},
    },
    Result,
};

/// Split a stub string into feature and method name.
///
/// # Examples
///
/// ```rust
/// use dotunpack::deobfuscation::obfuscators::babel::split_feature_name;
///
/// assert_eq!(split_feature_name("Licensing:Check"), ("Licensing", "Check"));
/// assert_eq!(split_feature_name("Method12"), ("", "Method12"));
/// ```
#[must_use]
pub fn split_feature_name(name: &str) -> (&str, &str) {
    name.split_once(':').unwrap_or(("", name))
}

/// All method containers of one assembly, by feature name.
#[derive(Debug, Clone, Default)]
pub struct BabelMethodsDecrypter {
    config: BabelConfig,
    readers: HashMap<String, ImageReader>,
}

impl BabelMethodsDecrypter {
    /// Create an empty decrypter.
    #[must_use]
    pub fn new(config: &BabelConfig) -> BabelMethodsDecrypter {
        BabelMethodsDecrypter {
            config: config.clone(),
            readers: HashMap::new(),
        }
    }

    /// Add the decrypted container of `feature`.
    ///
    /// Returns `Ok(false)` and logs a warning if `data` is not a method container.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `feature` already has a container, and
    /// the errors of [`ImageReader::initialize`].
    pub fn add_container(&mut self, feature: &str, data: Vec<u8>) -> Result<bool> {
        if self.readers.contains_key(feature) {
            return Err(invalid_argument!(
                "ImageReader for name '{}' already exists",
                feature
            ));
        }

        let mut reader = ImageReader::new(data, &self.config);
        if !reader.initialize()? {
            log::warn!("Could not read encrypted methods");
            return Ok(false);
        }
        self.readers.insert(feature.to_string(), reader);
        Ok(true)
    }

    /// Restore the method a stub refers to with `stub_name`.
    ///
    /// Returns `Ok(None)` if there is no container for the stub's feature.
    ///
    /// # Errors
    /// See [`ImageReader::restore`].
    pub fn restore(
        &mut self,
        stub_name: &str,
        target: &TargetMethod,
    ) -> Result<Option<RestoredBody>> {
        let (feature, name) = split_feature_name(stub_name);
        match self.readers.get_mut(feature) {
            Some(reader) => {
                log::debug!("Decrypting method {}", stub_name);
                reader.restore(name, target).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Restore every method in `stubs`, keeping the stub names.
    ///
    /// Methods of features without a container are skipped and counted in a warning.
    ///
    /// # Errors
    /// Fails on the first method that cannot be restored.
    pub fn restore_all<'a>(
        &mut self,
        stubs: impl IntoIterator<Item = (&'a str, TargetMethod)>,
    ) -> Result<Vec<(String, RestoredBody)>> {
        let mut restored = Vec::new();
        let mut total = 0;
        for (stub_name, target) in stubs {
            total += 1;
            if let Some(body) = self.restore(stub_name, &target)? {
                restored.push((stub_name.to_string(), body));
            }
        }

        let missing = total - restored.len();
        if missing > 0 {
            log::warn!("{}/{} methods not decrypted", missing, total);
        }
        Ok(restored)
    }

    /// Number of containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Returns `true` if no container was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}
