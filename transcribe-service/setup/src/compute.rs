use transcribe_configuration::{ComputeConfig, DeviceSelection, PrecisionSetting};
use transcribe_domain::{ComputeDevice, ComputeProfile, Precision};

const CUDA_COMPILED: bool = cfg!(any(feature = "whisper-cuda", feature = "wav2vec2-cuda"));

/// Decide once where inference runs. Every engine receives the same profile.
pub fn resolve_compute_profile(config: &ComputeConfig) -> ComputeProfile {
    resolve_with(config, CUDA_COMPILED)
}

fn resolve_with(config: &ComputeConfig, cuda_compiled: bool) -> ComputeProfile {
    let cuda = ComputeDevice::Cuda {
        ordinal: config.cuda_ordinal,
    };
    let device = match config.device {
        DeviceSelection::Cpu => ComputeDevice::Cpu,
        DeviceSelection::Auto if cuda_compiled => cuda,
        DeviceSelection::Auto => ComputeDevice::Cpu,
        DeviceSelection::Cuda if cuda_compiled => cuda,
        DeviceSelection::Cuda => {
            tracing::warn!("cuda requested but the service was built without cuda support; using cpu");
            ComputeDevice::Cpu
        }
    };

    let precision = match (config.precision, device) {
        (PrecisionSetting::Int8, _) => Precision::Int8,
        (PrecisionSetting::Float32, _) => Precision::Float32,
        (PrecisionSetting::Float16, ComputeDevice::Cuda { .. }) => Precision::Float16,
        (PrecisionSetting::Float16, ComputeDevice::Cpu) => {
            tracing::warn!("float16 is not available on cpu; using int8");
            Precision::Int8
        }
    };

    let profile = ComputeProfile { device, precision };
    tracing::info!(device = ?profile.device, precision = ?profile.precision, "compute profile resolved");
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(device: DeviceSelection, precision: PrecisionSetting) -> ComputeConfig {
        ComputeConfig {
            device,
            cuda_ordinal: 1,
            precision,
        }
    }

    #[test]
    fn auto_prefers_cuda_when_compiled_in() {
        let profile = resolve_with(&config(DeviceSelection::Auto, PrecisionSetting::Float16), true);
        assert_eq!(profile.device, ComputeDevice::Cuda { ordinal: 1 });
        assert_eq!(profile.precision, Precision::Float16);
    }

    #[test]
    fn auto_without_cuda_runs_on_cpu() {
        let profile = resolve_with(&config(DeviceSelection::Auto, PrecisionSetting::Int8), false);
        assert_eq!(profile, ComputeProfile {
            device: ComputeDevice::Cpu,
            precision: Precision::Int8,
        });
    }

    #[test]
    fn explicit_cpu_wins_over_available_cuda() {
        let profile = resolve_with(&config(DeviceSelection::Cpu, PrecisionSetting::Float32), true);
        assert_eq!(profile.device, ComputeDevice::Cpu);
        assert_eq!(profile.precision, Precision::Float32);
    }

    #[test]
    fn float16_on_cpu_falls_back_to_int8() {
        let profile = resolve_with(&config(DeviceSelection::Cuda, PrecisionSetting::Float16), false);
        assert_eq!(profile.device, ComputeDevice::Cpu);
        assert_eq!(profile.precision, Precision::Int8);
    }
}
