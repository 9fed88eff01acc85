//! Device selection for inference.

use candle_core::Device;
use once_cell::sync::OnceCell;
use tracing::info;

static DEVICE: OnceCell<Device> = OnceCell::new();

/// Returns the device every model of the run is loaded onto.
///
/// Picks a GPU (Metal or CUDA, when compiled in) on first call and falls back
/// to the CPU. Later calls return the same device.
#[must_use]
pub fn get_device() -> Device {
    DEVICE.get_or_init(select_device).clone()
}

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            info!("Using Metal device for inference");
            return device;
        }
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA device for inference");
            return device;
        }
    }

    info!("Using CPU for inference");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_is_stable_across_calls() {
        let first = get_device();
        let second = get_device();
        assert!(first.same_device(&second));
    }
}
