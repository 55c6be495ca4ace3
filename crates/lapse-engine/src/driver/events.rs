/// Device lifecycle notifications from the host.
#[derive(Debug)]
pub enum DeviceEvent<D> {
    /// A graphics device became available.
    Initialize(D),
    /// The device is about to go away (shutdown or device loss).
    Shutdown,
}

/// Events issued on the render thread, in command order.
///
/// Timer events carry the timer id as their event id; frame events ignore it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RenderEvent {
    BeginFrame,
    EndFrame,
    BeginTimer,
    EndTimer,
}
