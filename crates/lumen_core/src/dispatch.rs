//! Compute dispatch grid for the trace kernel.

use crate::config::ConfigError;

/// Work-group size the trace kernel is compiled with (`@workgroup_size(16, 8, 1)`).
pub const WORKGROUP_SIZE: [u32; 3] = [16, 8, 1];

/// Bytes per accumulation texel (one `vec4<f32>`).
pub const ACCUMULATION_TEXEL_BYTES: u64 = 16;

/// Number of work groups dispatched per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Compute and resource limits reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeLimits {
    pub max_workgroups_per_dimension: u32,
    pub max_workgroup_size: [u32; 3],
    pub max_invocations_per_workgroup: u32,
    pub max_texture_dimension_2d: u32,
    /// Largest storage buffer that can be created and bound, in bytes
    pub max_storage_buffer_binding_size: u64,
}

impl DispatchGrid {
    /// Grid that covers a `width` x `height` image exactly.
    ///
    /// Both dimensions must be powers of two and divisible by the
    /// work-group size, so no partial work groups are ever launched.
    pub fn for_image(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroSize { width, height });
        }

        for (axis, value, group) in [
            ("width", width, WORKGROUP_SIZE[0]),
            ("height", height, WORKGROUP_SIZE[1]),
        ] {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { axis, value });
            }
            if value % group != 0 {
                return Err(ConfigError::NotDivisible { axis, value, group });
            }
        }

        Ok(Self {
            x: width / WORKGROUP_SIZE[0],
            y: height / WORKGROUP_SIZE[1],
            z: 1,
        })
    }

    /// Total number of work groups.
    pub fn group_count(&self) -> u64 {
        u64::from(self.x)
            .saturating_mul(u64::from(self.y))
            .saturating_mul(u64::from(self.z))
    }

    /// Image size the grid covers.
    pub fn image_size(&self) -> (u32, u32) {
        (self.x * WORKGROUP_SIZE[0], self.y * WORKGROUP_SIZE[1])
    }

    /// Size of the per-pixel accumulation buffer. Saturates at `u64::MAX`.
    pub fn accumulation_bytes(&self) -> u64 {
        let (width, height) = self.image_size();
        u64::from(width)
            .saturating_mul(u64::from(height))
            .saturating_mul(ACCUMULATION_TEXEL_BYTES)
    }

    /// Check the image, its accumulation storage, the grid and the
    /// work-group size against the device limits.
    pub fn check_limits(&self, limits: &ComputeLimits) -> Result<(), ConfigError> {
        let (width, height) = self.image_size();
        if width > limits.max_texture_dimension_2d || height > limits.max_texture_dimension_2d {
            return Err(ConfigError::ImageExceedsLimit {
                width,
                height,
                limit: limits.max_texture_dimension_2d,
            });
        }

        let bytes = self.accumulation_bytes();
        if bytes > limits.max_storage_buffer_binding_size {
            return Err(ConfigError::StorageExceedsLimit {
                bytes,
                limit: limits.max_storage_buffer_binding_size,
            });
        }

        for (axis, groups) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            if groups > limits.max_workgroups_per_dimension {
                return Err(ConfigError::GridExceedsLimit {
                    axis,
                    groups,
                    limit: limits.max_workgroups_per_dimension,
                });
            }
        }

        let invocations: u32 = WORKGROUP_SIZE.iter().product();
        let size_fits = WORKGROUP_SIZE
            .iter()
            .zip(limits.max_workgroup_size.iter())
            .all(|(size, max)| size <= max);
        if !size_fits || invocations > limits.max_invocations_per_workgroup {
            return Err(ConfigError::WorkgroupExceedsLimit {
                size: WORKGROUP_SIZE,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_limits() -> ComputeLimits {
        ComputeLimits {
            max_workgroups_per_dimension: 65535,
            max_workgroup_size: [256, 256, 64],
            max_invocations_per_workgroup: 256,
            max_texture_dimension_2d: 8192,
            max_storage_buffer_binding_size: 128 << 20,
        }
    }

    #[test]
    fn test_grid_for_1024_square() {
        let grid = DispatchGrid::for_image(1024, 1024).unwrap();

        assert_eq!(grid, DispatchGrid { x: 64, y: 128, z: 1 });
        assert_eq!(grid.group_count(), 64 * 128);
    }

    #[test]
    fn test_grid_covers_image_exactly() {
        let grid = DispatchGrid::for_image(256, 64).unwrap();

        assert_eq!(grid.x * WORKGROUP_SIZE[0], 256);
        assert_eq!(grid.y * WORKGROUP_SIZE[1], 64);
    }

    #[test]
    fn test_rejects_zero_size() {
        assert_eq!(
            DispatchGrid::for_image(0, 512),
            Err(ConfigError::ZeroSize {
                width: 0,
                height: 512
            })
        );
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert_eq!(
            DispatchGrid::for_image(1024, 768),
            Err(ConfigError::NotPowerOfTwo {
                axis: "height",
                value: 768
            })
        );
    }

    #[test]
    fn test_rejects_indivisible() {
        // 8 is a power of two but narrower than one work group.
        assert_eq!(
            DispatchGrid::for_image(8, 1024),
            Err(ConfigError::NotDivisible {
                axis: "width",
                value: 8,
                group: 16
            })
        );
        assert!(DispatchGrid::for_image(1024, 4).is_err());
    }

    #[test]
    fn test_limits_accept_default_grid() {
        let grid = DispatchGrid::for_image(1024, 1024).unwrap();
        assert!(grid.check_limits(&default_limits()).is_ok());
    }

    #[test]
    fn test_limits_reject_large_grid() {
        let grid = DispatchGrid::for_image(1024, 1024).unwrap();
        let limits = ComputeLimits {
            max_workgroups_per_dimension: 100,
            ..default_limits()
        };

        assert_eq!(
            grid.check_limits(&limits),
            Err(ConfigError::GridExceedsLimit {
                axis: "y",
                groups: 128,
                limit: 100
            })
        );
    }

    #[test]
    fn test_limits_reject_small_workgroups() {
        let grid = DispatchGrid::for_image(64, 64).unwrap();
        let limits = ComputeLimits {
            max_invocations_per_workgroup: 64,
            ..default_limits()
        };

        assert!(matches!(
            grid.check_limits(&limits),
            Err(ConfigError::WorkgroupExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_group_count_does_not_overflow() {
        let grid = DispatchGrid::for_image(1 << 31, 1 << 31).unwrap();

        assert_eq!(grid.group_count(), 1 << 55);
        assert_eq!(grid.accumulation_bytes(), u64::MAX);
    }

    #[test]
    fn test_accumulation_bytes() {
        let grid = DispatchGrid::for_image(1024, 1024).unwrap();
        assert_eq!(grid.accumulation_bytes(), 16 << 20);
    }

    #[test]
    fn test_limits_reject_oversized_storage() {
        let grid = DispatchGrid::for_image(8192, 8192).unwrap();

        assert_eq!(
            grid.check_limits(&default_limits()),
            Err(ConfigError::StorageExceedsLimit {
                bytes: 1 << 30,
                limit: 128 << 20
            })
        );
    }

    #[test]
    fn test_limits_reject_oversized_texture() {
        let grid = DispatchGrid::for_image(16384, 16).unwrap();

        assert_eq!(
            grid.check_limits(&default_limits()),
            Err(ConfigError::ImageExceedsLimit {
                width: 16384,
                height: 16,
                limit: 8192
            })
        );
    }

    #[test]
    fn test_huge_image_fails_cleanly() {
        let grid = DispatchGrid::for_image(1 << 31, 1 << 31).unwrap();
        assert!(grid.check_limits(&default_limits()).is_err());
    }
}
