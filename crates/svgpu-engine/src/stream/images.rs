use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::backend::{
    BackendError, Handle, RenderBackend, TextureDesc, TextureFormat, TextureRegion,
};

/// Image identifier handed to paints. Allocated from 1, never reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ImageId(NonZeroU32);

impl ImageId {
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Sampling and interpretation flags of an image.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ImageFlags {
    pub nearest: bool,
    pub repeat_x: bool,
    pub repeat_y: bool,
    /// RGBA data is already premultiplied.
    pub premultiplied: bool,
    /// Sample with the vertical axis flipped.
    pub flip_y: bool,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct ImageEntry {
    pub texture: Handle,
    pub format: TextureFormat,
    pub flags: ImageFlags,
    pub width: u32,
    pub height: u32,
}

/// Maps image ids to backend textures.
#[derive(Debug)]
pub(crate) struct ImageRegistry {
    next: NonZeroU32,
    entries: BTreeMap<ImageId, ImageEntry>,
}

impl Default for ImageRegistry {
    fn default() -> Self {
        Self {
            next: NonZeroU32::MIN,
            entries: BTreeMap::new(),
        }
    }
}

impl ImageRegistry {
    pub fn get(&self, id: ImageId) -> Option<&ImageEntry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn create<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        format: TextureFormat,
        width: u32,
        height: u32,
        flags: ImageFlags,
        data: Option<&[u8]>,
    ) -> Result<ImageId, BackendError> {
        let desc = TextureDesc {
            format,
            width,
            height,
            nearest: flags.nearest,
            repeat_x: flags.repeat_x,
            repeat_y: flags.repeat_y,
        };
        let texture = backend.create_texture(&desc)?;
        if let Some(data) = data {
            if let Err(e) = backend.update_texture(texture, desc.full_region(), data) {
                backend.delete_texture(texture)?;
                return Err(e);
            }
        }

        let id = ImageId(self.next);
        self.next = self.next.saturating_add(1);
        self.entries.insert(
            id,
            ImageEntry {
                texture,
                format,
                flags,
                width,
                height,
            },
        );
        log::trace!("image {} -> texture {texture} ({width}x{height} {format:?})", id.get());
        Ok(id)
    }

    /// Returns `Ok(false)` for unknown ids.
    pub fn update<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        id: ImageId,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<bool, BackendError> {
        let Some(entry) = self.entries.get(&id) else { return Ok(false) };
        backend.update_texture(entry.texture, region, data)?;
        Ok(true)
    }

    /// Returns `Ok(false)` for unknown ids.
    pub fn delete<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        id: ImageId,
    ) -> Result<bool, BackendError> {
        let Some(entry) = self.entries.remove(&id) else { return Ok(false) };
        backend.delete_texture(entry.texture)?;
        Ok(true)
    }

    /// Deletes every live texture; the first failure is reported after all
    /// deletions were attempted.
    pub fn clear<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), BackendError> {
        let mut first_err = None;
        for (_, entry) in std::mem::take(&mut self.entries) {
            if let Err(e) = backend.delete_texture(entry.texture) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
