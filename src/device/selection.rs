//! Device and output-size selection heuristics.
//!
//! Pure functions over device metadata. Enumeration order matters: every
//! tie goes to the entry seen first.

use super::{DeviceId, DeviceMetadata, Facing, ImageFormat, Size, StreamConfigurationMap};

/// Returns the first device whose lens faces `facing`.
pub fn choose_device_id(devices: &[(DeviceId, DeviceMetadata)], facing: Facing) -> Option<DeviceId> {
    devices
        .iter()
        .find(|(_, meta)| meta.facing == facing)
        .map(|(id, _)| id.clone())
}

/// Returns the widest output size for `format`.
pub fn choose_still_size(map: &StreamConfigurationMap, format: ImageFormat) -> Option<Size> {
    let sizes = map.output_sizes(format);
    let mut best = *sizes.first()?;
    for size in sizes {
        if size.width > best.width {
            best = *size;
        }
    }
    Some(best)
}

/// Returns the preview size whose aspect ratio is nearest `target_aspect`.
///
/// The scan stops at the first exact match.
pub fn choose_preview_size(map: &StreamConfigurationMap, target_aspect: f32) -> Option<Size> {
    let sizes = map.output_sizes(ImageFormat::Private);
    let mut best = *sizes.first()?;
    let mut min_diff = f32::MAX;
    for size in sizes {
        let diff = (target_aspect - size.aspect()).abs();
        if diff < min_diff {
            best = *size;
            min_diff = diff;
        }
        if diff == 0.0 {
            break;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meta(facing: Facing) -> DeviceMetadata {
        DeviceMetadata {
            facing,
            stream_map: StreamConfigurationMap::new(),
        }
    }

    #[test]
    fn test_device_by_facing() {
        let devices = vec![
            (DeviceId::new("1"), meta(Facing::Front)),
            (DeviceId::new("0"), meta(Facing::Back)),
            (DeviceId::new("2"), meta(Facing::Back)),
        ];

        assert_eq!(choose_device_id(&devices, Facing::Back), Some(DeviceId::new("0")));
        assert_eq!(choose_device_id(&devices, Facing::Front), Some(DeviceId::new("1")));
        assert_eq!(choose_device_id(&devices, Facing::External), None);
    }

    #[test]
    fn test_still_size_widest_first_wins() {
        let map = StreamConfigurationMap::new().with_outputs(
            ImageFormat::Jpeg,
            [
                Size::new(1280, 720),
                Size::new(4000, 3000),
                Size::new(4000, 2250),
                Size::new(640, 480),
            ],
        );

        assert_eq!(choose_still_size(&map, ImageFormat::Jpeg), Some(Size::new(4000, 3000)));
        assert_eq!(choose_still_size(&map, ImageFormat::Yuv420), None);
    }

    #[test]
    fn test_preview_nearest_aspect() {
        let map = StreamConfigurationMap::new().with_outputs(
            ImageFormat::Private,
            [
                Size::new(1920, 1080),
                Size::new(1440, 1080),
                Size::new(1280, 720),
                Size::new(640, 480),
            ],
        );

        // 4:3 target matches 1440x1080 exactly and stops the scan.
        assert_eq!(choose_preview_size(&map, 4.0 / 3.0), Some(Size::new(1440, 1080)));
        // 16:9 ties between 1920x1080 and 1280x720; first wins.
        assert_eq!(choose_preview_size(&map, 16.0 / 9.0), Some(Size::new(1920, 1080)));
    }

    #[test]
    fn test_preview_without_sizes() {
        let map = StreamConfigurationMap::new();
        assert_eq!(choose_preview_size(&map, 1.5), None);
    }

    proptest! {
        #[test]
        fn preview_choice_is_nearest(
            dims in prop::collection::vec((1u32..5000, 1u32..5000), 1..20),
            target in 0.25f32..4.0,
        ) {
            let sizes: Vec<Size> = dims.iter().map(|&(w, h)| Size::new(w, h)).collect();
            let map = StreamConfigurationMap::new().with_outputs(ImageFormat::Private, sizes.clone());

            let chosen = choose_preview_size(&map, target).unwrap();
            let chosen_diff = (target - chosen.aspect()).abs();
            for size in &sizes {
                prop_assert!(chosen_diff <= (target - size.aspect()).abs());
            }
        }
    }
}
