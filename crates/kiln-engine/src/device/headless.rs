use anyhow::{Context, Result};

use super::gpu::{create_instance, request_device, GpuInit};

/// Device and queue without a window or surface.
///
/// Used for offscreen rendering and by the GPU integration tests.
pub struct HeadlessGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl HeadlessGpu {
    /// Requests any adapter, preferring a hardware one.
    ///
    /// Fails when the machine exposes no usable adapter.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let instance = create_instance();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter available")?;

        let (device, queue) = request_device(&adapter, &init).await?;

        Ok(Self { device, queue })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
