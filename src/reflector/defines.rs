//! Shader feature flags and per-variant material cache

use crate::options::ReflectorOptions;

bitflags::bitflags! {
    /// Features the surface shader is compiled with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReflectorDefines: u32 {
        /// Blurred reflection is sampled and mixed in
        const USE_BLUR = 1 << 0;
        /// Reflection depth attenuates the blend
        const USE_DEPTH = 1 << 1;
        /// A distortion map offsets the projected UVs
        const USE_DISTORTION = 1 << 2;
    }
}

impl ReflectorDefines {
    pub fn from_options(options: &ReflectorOptions, has_distortion_map: bool) -> Self {
        let mut defines = Self::empty();
        defines.set(Self::USE_BLUR, options.has_blur());
        defines.set(Self::USE_DEPTH, options.depth_scale > 0.0);
        defines.set(Self::USE_DISTORTION, has_distortion_map);
        defines
    }

    /// Space-prefixed define names in fixed order, e.g. `" USE_BLUR USE_DEPTH"`.
    /// Equal keys mean the same shader variant.
    pub fn key(&self) -> String {
        self.iter_names().map(|(name, _)| format!(" {name}")).collect()
    }

    /// WGSL `const` declarations for every flag, set or not.
    pub fn wgsl_constants(&self) -> String {
        Self::all()
            .iter_names()
            .map(|(name, flag)| format!("const {name}: bool = {};\n", self.contains(flag)))
            .collect()
    }
}

/// One built material per shader variant.
///
/// Holds the material for the last key it was asked for and rebuilds only
/// when the key differs.
#[derive(Debug)]
pub struct MaterialVariantCache<M> {
    entry: Option<(String, M)>,
    builds: usize,
}

impl<M> Default for MaterialVariantCache<M> {
    fn default() -> Self {
        Self {
            entry: None,
            builds: 0,
        }
    }
}

impl<M> MaterialVariantCache<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Material for `defines`, built with `build` if the cached one is for a
    /// different variant. A failed build leaves the cache empty.
    pub fn get_or_build<E>(
        &mut self,
        defines: ReflectorDefines,
        build: impl FnOnce(ReflectorDefines) -> Result<M, E>,
    ) -> Result<&M, E> {
        let key = defines.key();
        let entry = match self.entry.take() {
            Some(entry) if entry.0 == key => entry,
            _ => {
                log::debug!("Building reflector material variant '{}'", key.trim());
                let material = build(defines)?;
                self.builds += 1;
                (key, material)
            }
        };
        let (_, material) = self.entry.insert(entry);
        Ok(&*material)
    }

    /// Number of times a material was built
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn current_key(&self) -> Option<&str> {
        self.entry.as_ref().map(|(key, _)| key.as_str())
    }
}
