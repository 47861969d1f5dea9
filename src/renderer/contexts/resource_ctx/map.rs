use std::collections::HashMap;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::assets::AssetHandle;

/// Handle-keyed GPU resources. Collections are closed after upload, so a miss
/// is a programming error and reported as such instead of defaulting.
#[derive(Debug)]
pub struct GpuResourceMap<K, V> {
    kind: &'static str,
    entries: HashMap<AssetHandle<K>, V>,
}

impl<K, V> GpuResourceMap<K, V> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, handle: AssetHandle<K>, value: V) {
        self.entries.insert(handle, value);
    }

    pub fn get(&self, handle: AssetHandle<K>) -> Result<&V> {
        self.entries.get(&handle).ok_or_else(|| {
            eyre!("{} handle {} not uploaded to GPU", self.kind, handle.index())
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Image, Mesh};

    #[test]
    fn missing_handle_is_reported_not_defaulted() {
        let mut map: GpuResourceMap<Mesh, u32> = GpuResourceMap::new("Mesh");
        map.insert(AssetHandle::new(0), 7);

        assert_eq!(*map.get(AssetHandle::new(0)).unwrap(), 7);
        let err = map.get(AssetHandle::new(5)).unwrap_err();
        assert_eq!(err.to_string(), "Mesh handle 5 not uploaded to GPU");
    }

    #[test]
    fn texture_missing_from_upload_is_an_image_miss() {
        let images: GpuResourceMap<Image, ()> = GpuResourceMap::new("Image");
        let err = images.get(AssetHandle::new(2)).unwrap_err();
        assert_eq!(err.to_string(), "Image handle 2 not uploaded to GPU");
    }
}
