//! Execution provider selection for ONNX Runtime.
//!
//! Detects available hardware accelerators (CUDA, CoreML) and maps the
//! configured [`Device`] to ONNX Runtime execution providers.

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::Session;

use crate::config::Device;

/// An execution provider that registered successfully on this machine.
#[derive(Debug, Clone)]
pub struct DetectedProvider {
    /// Human-readable name of the provider.
    pub name: &'static str,
    /// The execution provider dispatch.
    pub provider: ExecutionProviderDispatch,
}

/// Detects usable execution providers, best first.
///
/// Each accelerator is probed by registering it against a throwaway
/// session builder; CPU is always last and always present.
pub fn detect_providers() -> Vec<DetectedProvider> {
    let mut detected = Vec::new();

    if let Ok(mut builder) = Session::builder() {
        let cuda = CUDAExecutionProvider::default();
        if cuda.register(&mut builder).is_ok() {
            detected.push(DetectedProvider {
                name: "CUDA",
                provider: cuda.build(),
            });
        }
    }

    if let Ok(mut builder) = Session::builder() {
        let coreml = CoreMLExecutionProvider::default();
        if coreml.register(&mut builder).is_ok() {
            detected.push(DetectedProvider {
                name: "CoreML",
                provider: coreml.build(),
            });
        }
    }

    detected.push(DetectedProvider {
        name: "CPU",
        provider: CPUExecutionProvider::default().build(),
    });

    detected
}

/// Returns the execution providers for a device configuration.
///
/// Auto picks the best detected provider; explicit modes are passed
/// through without probing.
pub fn providers_for(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Auto => match detect_providers().into_iter().next() {
            Some(first) => vec![first.provider],
            None => vec![CPUExecutionProvider::default().build()],
        },
        Device::Cpu => vec![CPUExecutionProvider::default().build()],
        Device::Cuda => vec![CUDAExecutionProvider::default().build()],
        Device::Metal => vec![CoreMLExecutionProvider::default().build()],
    }
}

/// Human-readable name for a device configuration.
///
/// For Auto, reports the provider that detection would pick.
pub fn device_label(device: Device) -> &'static str {
    match device {
        Device::Auto => detect_providers().first().map(|p| p.name).unwrap_or("CPU"),
        Device::Cpu => "CPU",
        Device::Cuda => "CUDA",
        Device::Metal => "CoreML",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_always_includes_cpu() {
        let detected = detect_providers();
        assert!(detected.iter().any(|p| p.name == "CPU"));
        assert_eq!(detected.last().map(|p| p.name), Some("CPU"));
    }

    #[test]
    fn auto_returns_one_provider() {
        assert_eq!(providers_for(Device::Auto).len(), 1);
    }

    #[test]
    fn explicit_labels() {
        assert_eq!(device_label(Device::Cpu), "CPU");
        assert_eq!(device_label(Device::Cuda), "CUDA");
        assert_eq!(device_label(Device::Metal), "CoreML");
    }

    #[test]
    fn auto_label_is_known() {
        let label = device_label(Device::Auto);
        assert!(matches!(label, "CPU" | "CUDA" | "CoreML"));
    }
}
