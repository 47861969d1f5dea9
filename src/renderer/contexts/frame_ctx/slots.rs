use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::internals::buffer::Buffer;

/// Index of the frame-in-flight currently being prepared
#[derive(Debug, Clone, Copy)]
pub struct FrameSlots {
    index: usize,
    count: usize,
}

impl FrameSlots {
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(eyre!("At least one frame in flight is required"));
        }
        Ok(Self { index: 0, count })
    }

    pub fn current(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.count;
    }
}

/// Host-visible memory a uniform block gets copied into
pub trait UniformTarget {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

impl UniformTarget for Buffer {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() as u64 > self.size {
            return Err(eyre!(
                "Uniform of {} bytes does not fit buffer of {} bytes",
                bytes.len(),
                self.size,
            ));
        }
        self.write(bytes, 0)?;
        Ok(())
    }
}

pub fn write_uniform<T, U>(target: &mut U, value: &T) -> Result<()>
where
    T: bytemuck::Pod,
    U: UniformTarget + ?Sized,
{
    target.write_bytes(bytemuck::bytes_of(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::camera::Camera;
    use crate::renderer::shader_data::CameraUniform;

    impl UniformTarget for Vec<u8> {
        fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
            self.clear();
            self.extend_from_slice(bytes);
            Ok(())
        }
    }

    #[test]
    fn slots_cycle_back_to_zero() {
        for count in 1..=4 {
            let mut slots = FrameSlots::new(count).unwrap();
            assert_eq!(slots.current(), 0);
            for _ in 0..count {
                slots.advance();
            }
            assert_eq!(slots.current(), 0);
        }
    }

    #[test]
    fn zero_slots_are_rejected() {
        assert!(FrameSlots::new(0).is_err());
    }

    #[test]
    fn three_slots_visit_every_index() {
        let mut slots = FrameSlots::new(3).unwrap();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(slots.current());
            slots.advance();
        }
        assert_eq!(seen, [0, 1, 2]);
    }

    #[test]
    fn same_camera_fills_alternating_slots_identically() {
        let camera = Camera::new();
        let mut slots = FrameSlots::new(2).unwrap();
        let mut memory: Vec<Vec<u8>> = vec![Vec::new(); 2];

        for _ in 0..2 {
            write_uniform(&mut memory[slots.current()], &camera.uniform()).unwrap();
            slots.advance();
        }

        assert_eq!(memory[0].len(), size_of::<CameraUniform>());
        assert_eq!(memory[0], memory[1]);
        let uniform: CameraUniform = bytemuck::pod_read_unaligned(&memory[1]);
        assert_eq!(uniform, camera.uniform());
    }
}
