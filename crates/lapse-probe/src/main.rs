use anyhow::{Context, Result};

use lapse_engine::device::{HeadlessGpu, HeadlessInit, WgpuTimingDevice};
use lapse_engine::driver::{DeviceEvent, FrameSession, SessionTimer, TimingDriver};
use lapse_engine::logging::{init_logging, LoggingConfig};
use lapse_engine::timing::TimingConfig;

const TARGET_SIZE: u32 = 2048;
const CLEARS_PER_FRAME: usize = 8;
const DEFAULT_FRAMES: u32 = 60;

fn target_descriptor(label: &str) -> wgpu::TextureDescriptor<'_> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }
}

/// Offscreen workload measured by the probe.
struct Workload {
    source: wgpu::Texture,
    source_view: wgpu::TextureView,
    destination: wgpu::Texture,
}

impl Workload {
    fn new(device: &wgpu::Device) -> Self {
        let source = device.create_texture(&target_descriptor("lapse probe source"));
        let source_view = source.create_view(&wgpu::TextureViewDescriptor::default());
        let destination = device.create_texture(&target_descriptor("lapse probe destination"));

        Self {
            source,
            source_view,
            destination,
        }
    }

    fn clear(&self, gpu: &HeadlessGpu, frame: u32) {
        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lapse probe clear"),
            });

        for pass in 0..CLEARS_PER_FRAME {
            let shade = ((frame as usize + pass) % 16) as f64 / 16.0;
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lapse probe clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.source_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: shade,
                            g: 0.2,
                            b: 1.0 - shade,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        gpu.queue().submit(Some(encoder.finish()));
    }

    fn copy(&self, gpu: &HeadlessGpu) {
        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lapse probe copy"),
            });
        encoder.copy_texture_to_texture(
            self.source.as_image_copy(),
            self.destination.as_image_copy(),
            self.source.size(),
        );
        gpu.queue().submit(Some(encoder.finish()));
    }
}

fn frame_count() -> Result<u32> {
    match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("frame count must be a positive integer, got {arg:?}")),
        None => Ok(DEFAULT_FRAMES),
    }
}

fn report(
    driver: &TimingDriver<WgpuTimingDevice>,
    session: &FrameSession,
    timers: &[(&str, SessionTimer)],
) {
    let frame_ms = session.frame_duration(driver) * 1000.0;
    let parts: Vec<String> = timers
        .iter()
        .map(|(name, timer)| format!("{name} {:.3} ms", session.duration(driver, *timer) * 1000.0))
        .collect();
    log::info!(
        "frame {:.3} ms | {} | readback {:?}",
        frame_ms,
        parts.join(" | "),
        driver.engine().last_readback()
    );
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let frames = frame_count()?;
    let gpu = HeadlessGpu::new_blocking(HeadlessInit::default())
        .context("failed to acquire a headless GPU")?;
    let info = gpu.adapter_info();
    log::info!("adapter: {} ({:?})", info.name, info.backend);

    let mut driver = TimingDriver::new(TimingConfig::default());
    driver.on_device_event(DeviceEvent::Initialize(gpu.timing_device()));
    if !driver.is_ready() {
        log::warn!("GPU timing unavailable on this adapter; durations will read as defaults");
    }

    let workload = Workload::new(gpu.device());
    let mut session = FrameSession::new();
    let clear = session.request_timer();
    let copy = session.request_timer();
    let timers = [("clear", clear), ("copy", copy)];

    session.late_update(&mut driver);

    for frame in 0..frames {
        session.begin(&mut driver, clear);
        workload.clear(&gpu, frame);
        session.end(&mut driver, clear);

        session.begin(&mut driver, copy);
        workload.copy(&gpu);
        session.end(&mut driver, copy);

        session.late_update(&mut driver);

        if frame % 10 == 9 {
            report(&driver, &session, &timers);
        }
    }

    session.shutdown(&mut driver);
    driver.on_device_event(DeviceEvent::Shutdown);
    log::info!("probe finished after {frames} frames");
    Ok(())
}
