//! Compute device selection.

use candle_core::Device;
use tracing::info;

/// Picks Metal or CUDA when compiled in and available, else the CPU.
///
/// `force_cpu` skips accelerator probing entirely.
#[must_use]
pub fn select_device(force_cpu: bool) -> Device {
    if force_cpu {
        info!("Using CPU (forced)");
        return Device::Cpu;
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            info!("Using Metal device");
            return device;
        }
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA device");
            return device;
        }
    }

    info!("Using CPU");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_cpu() {
        assert!(matches!(select_device(true), Device::Cpu));
    }

    #[test]
    fn test_select_device_does_not_panic() {
        let _device = select_device(false);
    }
}
