/// Backend a run executes on, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Cpu,
    #[cfg(feature = "backend-wgpu")]
    Accelerator,
}

/// Use the accelerator unless disabled or not compiled in; never fails.
pub fn resolve_backend(no_accel: bool) -> BackendChoice {
    if no_accel {
        tracing::info!("accelerator disabled; using ndarray CPU backend");
        return BackendChoice::Cpu;
    }
    accelerator_or_cpu()
}

#[cfg(feature = "backend-wgpu")]
fn accelerator_or_cpu() -> BackendChoice {
    tracing::info!("using wgpu backend");
    BackendChoice::Accelerator
}

#[cfg(not(feature = "backend-wgpu"))]
fn accelerator_or_cpu() -> BackendChoice {
    tracing::warn!(
        "accelerator requested but backend-wgpu feature not enabled; falling back to ndarray CPU backend"
    );
    BackendChoice::Cpu
}
