use anyhow::{Context, Result};

use super::backend::required_features;
use super::WgpuTimingDevice;

/// Parameters for acquiring a device without a window or surface.
#[derive(Debug, Clone)]
pub struct HeadlessInit {
    /// Backends wgpu may pick from.
    pub backends: wgpu::Backends,

    /// Adapter preference. Timing work usually wants the discrete GPU.
    pub power_preference: wgpu::PowerPreference,

    /// Force the software adapter (useful on CI machines).
    pub force_fallback_adapter: bool,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,
}

impl Default for HeadlessInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_limits: wgpu::Limits::default(),
        }
    }
}

/// Owns a wgpu instance/adapter/device triple with no surface attached.
///
/// Timestamp features are requested only when the adapter offers them. When it
/// does not, the device is still created and [`WgpuTimingDevice`] reports
/// itself as unsupported, so drivers degrade instead of failing.
pub struct HeadlessGpu {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    timing: WgpuTimingDevice,
}

impl HeadlessGpu {
    /// Acquires an adapter and device. Asynchronous under wgpu.
    pub async fn new(init: HeadlessInit) -> Result<Self> {
        let HeadlessInit {
            backends,
            power_preference,
            force_fallback_adapter,
            required_limits,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let wanted = required_features();
        let required_features = if adapter.features().contains(wanted) {
            wanted
        } else {
            log::warn!(
                "adapter {:?} lacks timestamp queries inside encoders; GPU timing disabled",
                adapter.get_info().name
            );
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lapse-engine device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        Ok(Self {
            _instance: instance,
            adapter,
            timing: WgpuTimingDevice::new(device, queue),
        })
    }

    /// Blocking variant of [`HeadlessGpu::new`] for synchronous hosts.
    pub fn new_blocking(init: HeadlessInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Returns adapter metadata (name, backend, driver).
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        self.timing.device()
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        self.timing.queue()
    }

    /// Returns a timing device sharing this GPU's device and queue.
    pub fn timing_device(&self) -> WgpuTimingDevice {
        self.timing.clone()
    }
}
