use std::hash::Hash;
use ash::vk;

pub struct Queue {
    pub family: QueueFamily,
    pub handle: vk::Queue,
}

impl Queue {
    pub fn new(
        family: QueueFamily,
        handle: vk::Queue,
    ) -> Self {
        Self {
            family,
            handle,
        }
    }
}

#[derive(Clone, Debug)]
pub struct QueueFamily {
    pub index: u32,
    pub flags: vk::QueueFlags,
    supports_present: bool,
}

impl QueueFamily {
    pub fn new(
        index: u32,
        flags: vk::QueueFlags,
        supports_present: bool,
    ) -> Self {
        Self {
            index,
            flags,
            supports_present,
        }
    }

    pub fn supports_present(&self) -> bool {
        self.supports_present
    }

    pub fn supports_graphics(&self) -> bool {
        self.flags.contains(vk::QueueFlags::GRAPHICS)
    }
}

impl PartialEq for QueueFamily {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for QueueFamily {}

impl Hash for QueueFamily {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

/// The families the renderer submits to. They may be the same family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueFamilySelection {
    pub graphics: QueueFamily,
    pub present: QueueFamily,
}

impl QueueFamilySelection {
    /// Picks the first graphics family, and presents from it too when it can;
    /// otherwise the first family that can present.
    pub fn from_families(families: &[QueueFamily]) -> Option<Self> {
        let graphics = families.iter().find(|f| f.supports_graphics())?;
        let present = if graphics.supports_present() {
            graphics
        } else {
            families.iter().find(|f| f.supports_present())?
        };
        Some(Self {
            graphics: graphics.clone(),
            present: present.clone(),
        })
    }

    /// Distinct family indices, graphics first
    pub fn unique_indices(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics.index]
        } else {
            vec![self.graphics.index, self.present.index]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_a_single_family_for_graphics_and_present() {
        let families = [
            QueueFamily::new(0, vk::QueueFlags::TRANSFER, true),
            QueueFamily::new(1, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, true),
        ];
        let selection = QueueFamilySelection::from_families(&families).unwrap();
        assert_eq!(selection.graphics.index, 1);
        assert_eq!(selection.present.index, 1);
        assert_eq!(selection.unique_indices(), vec![1]);
    }

    #[test]
    fn falls_back_to_separate_present_family() {
        let families = [
            QueueFamily::new(0, vk::QueueFlags::GRAPHICS, false),
            QueueFamily::new(1, vk::QueueFlags::COMPUTE, true),
        ];
        let selection = QueueFamilySelection::from_families(&families).unwrap();
        assert_eq!(selection.unique_indices(), vec![0, 1]);
    }

    #[test]
    fn missing_graphics_or_present_is_unsuitable() {
        let no_graphics = [QueueFamily::new(0, vk::QueueFlags::COMPUTE, true)];
        assert!(QueueFamilySelection::from_families(&no_graphics).is_none());

        let no_present = [QueueFamily::new(0, vk::QueueFlags::GRAPHICS, false)];
        assert!(QueueFamilySelection::from_families(&no_present).is_none());
    }
}
