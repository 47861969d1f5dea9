use std::path::{Path, PathBuf};
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

/// Written by build.rs
const SHADERS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders-built");

pub struct GraphicsShader {
    pub vert_mod: vk::ShaderModule,
    pub frag_mod: vk::ShaderModule,
    device: Arc<ash::Device>,
}

impl GraphicsShader {
    /// Loads `<name>.vert.spv` and `<name>.frag.spv`
    pub fn new(shader_name: &str, device: Arc<ash::Device>) -> Result<Self> {
        let vert_mod = create_shader_module(&shader_path(shader_name, "vert"), &device)?;
        let frag_mod = match create_shader_module(&shader_path(shader_name, "frag"), &device) {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.destroy_shader_module(vert_mod, None) };
                return Err(e);
            }
        };
        Ok(Self { vert_mod, frag_mod, device })
    }
}

impl Drop for GraphicsShader {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.vert_mod, None);
            self.device.destroy_shader_module(self.frag_mod, None);
        }
    }
}

fn shader_path(shader_name: &str, stage: &str) -> PathBuf {
    Path::new(SHADERS_DIR).join(format!("{}.{}.spv", shader_name, stage))
}

fn create_shader_module(filepath: &Path, device: &ash::Device) -> Result<vk::ShaderModule> {
    let bytes = std::fs::read(filepath)
        .wrap_err_with(|| format!("Failed to read shader {}", filepath.display()))?;
    let code = spirv_words(&bytes)
        .ok_or_else(|| eyre!("{} is not a SPIR-V binary", filepath.display()))?;

    let shader_module_info = vk::ShaderModuleCreateInfo::default()
        .code(&code);

    let shader_module = unsafe {
        device.create_shader_module(&shader_module_info, None)?
    };

    Ok(shader_module)
}

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Reinterprets a little-endian SPIR-V file as words. `None` if it is misaligned or lacks the magic number.
fn spirv_words(bytes: &[u8]) -> Option<Vec<u32>> {
    if bytes.len() % 4 != 0 || bytes.len() < 4 {
        return None;
    }
    // `std::fs::read` gives no alignment guarantee, so copy instead of casting in place
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect();
    (words[0] == SPIRV_MAGIC).then_some(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spirv_words_checks_magic_and_length() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 0, 0, 0]);
        assert_eq!(spirv_words(&bytes), Some(vec![SPIRV_MAGIC, 1]));

        assert_eq!(spirv_words(&bytes[..6]), None);
        assert_eq!(spirv_words(&[0, 0, 0, 0]), None);
    }

    #[test]
    fn shader_paths_keep_the_stage() {
        let path = shader_path("basic", "vert");
        assert!(path.ends_with("shaders-built/basic.vert.spv"));
    }
}
