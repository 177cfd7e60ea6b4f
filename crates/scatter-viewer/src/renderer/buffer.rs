use pointstream::DeviceBuffer;
use std::sync::Arc;

/// A vertex buffer written in sub-ranges through the queue.
pub struct GpuBuffer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    label: &'static str,
    buffer: wgpu::Buffer,
    size: u64,
}

/// Rounds up to the copy alignment; wgpu rejects zero-sized vertex buffers.
fn padded_size(size_bytes: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    size_bytes.max(align).div_ceil(align) * align
}

fn create(device: &wgpu::Device, label: &'static str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl GpuBuffer {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, label: &'static str) -> Self {
        let size = padded_size(0);
        let buffer = create(&device, label, size);
        Self {
            device,
            queue,
            label,
            buffer,
            size,
        }
    }

    /// The first `len_bytes` of the buffer, for binding as a vertex stream.
    pub fn slice(&self, len_bytes: u64) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..len_bytes.min(self.size))
    }
}

impl DeviceBuffer for GpuBuffer {
    fn allocate(&mut self, size_bytes: u64) {
        let size = padded_size(size_bytes);
        self.buffer.destroy();
        self.buffer = create(&self.device, self.label, size);
        self.size = size;
    }

    fn write(&mut self, offset_bytes: u64, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.queue.write_buffer(&self.buffer, offset_bytes, bytes);
    }

    fn size_bytes(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_padded_to_copy_alignment() {
        assert_eq!(padded_size(0), 4);
        assert_eq!(padded_size(8), 8);
        assert_eq!(padded_size(9), 12);
        assert_eq!(padded_size(8_000_000), 8_000_000);
    }
}
